use thiserror::Error;

/// Errors raised while reading or writing a change document.
///
/// Any of these aborts processing of the current input file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    /// The input is not well-formed XML or has no root element.
    #[error("malformed XML document: {message}")]
    Malformed {
        /// Description reported by the XML reader.
        message: String,
    },
    /// The root element is not one the caller accepts.
    #[error("unexpected root element <{found}>, expected {expected}")]
    UnexpectedRoot {
        /// Accepted root element names.
        expected: String,
        /// Root element name encountered.
        found: String,
    },
    /// A required attribute is absent.
    #[error("<{element}> is missing required attribute `{attribute}`")]
    MissingAttribute {
        /// Tag name of the offending element.
        element: String,
        /// Name of the missing attribute.
        attribute: String,
    },
    /// An attribute is present but cannot be interpreted.
    #[error("<{element}> has invalid `{attribute}` value {value:?}")]
    InvalidAttribute {
        /// Tag name of the offending element.
        element: String,
        /// Attribute name.
        attribute: String,
        /// Raw attribute value.
        value: String,
    },
    /// A relation member or element names a type other than node, way or relation.
    #[error("unsupported element type `{found}`")]
    UnsupportedElementType {
        /// Type name encountered.
        found: String,
    },
    /// Serializing a document failed.
    #[error("failed to write XML document: {message}")]
    Write {
        /// Description reported by the XML writer.
        message: String,
    },
}
