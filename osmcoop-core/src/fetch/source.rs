//! Source trait for elements that are not present in the change document.

use async_trait::async_trait;

use crate::model::{Element, ElementId, ElementType};

use super::error::FetchError;

/// Retrieve elements from a remote OpenStreetMap data source.
///
/// Implementations perform no caching; wrap them in a
/// [`FetchCache`](super::FetchCache).
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use osmcoop_core::{Element, ElementId, ElementSource, ElementType, FetchError};
///
/// struct Origin;
///
/// #[async_trait(?Send)]
/// impl ElementSource for Origin {
///     async fn fetch_version(
///         &self,
///         _element_type: ElementType,
///         id: ElementId,
///         version: u32,
///     ) -> Result<Element, FetchError> {
///         Ok(Element::node(id, 0.0, 0.0).with_version(version))
///     }
///
///     async fn fetch_elements(
///         &self,
///         _element_type: ElementType,
///         ids: &[ElementId],
///     ) -> Result<Vec<Element>, FetchError> {
///         Ok(ids.iter().map(|&id| Element::node(id, 0.0, 0.0)).collect())
///     }
/// }
/// ```
#[async_trait(?Send)]
pub trait ElementSource {
    /// Fetch `version` of the element `(element_type, id)`.
    async fn fetch_version(
        &self,
        element_type: ElementType,
        id: ElementId,
        version: u32,
    ) -> Result<Element, FetchError>;

    /// Fetch the latest versions of `ids` in one request.
    ///
    /// Identifiers unknown to the source are absent from the result.
    async fn fetch_elements(
        &self,
        element_type: ElementType,
        ids: &[ElementId],
    ) -> Result<Vec<Element>, FetchError>;
}
