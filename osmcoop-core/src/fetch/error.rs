use thiserror::Error;

use crate::model::{ElementId, ElementType};

/// Errors from an [`ElementSource`](super::ElementSource).
///
/// The type is `Clone` so a single in-flight batch can hand the same failure
/// to every caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum FetchError {
    /// The server answered with a non-success status.
    #[error("fetching {element_type} {ids:?} failed with HTTP status {status}")]
    RemoteFetchFailed {
        /// Type of the requested elements.
        element_type: ElementType,
        /// Identifiers included in the failed request.
        ids: Vec<ElementId>,
        /// HTTP status code returned.
        status: u16,
    },
    /// The request could not be completed.
    #[error("network error requesting {url}: {message}")]
    Network {
        /// Requested URL.
        url: String,
        /// Transport failure description.
        message: String,
    },
    /// The response body could not be interpreted.
    #[error("invalid response from {url}: {message}")]
    InvalidResponse {
        /// Requested URL.
        url: String,
        /// Parse failure description.
        message: String,
    },
    /// The throttled queue was stopped while the request waited for a permit.
    #[error("request queue stopped before the request was dispatched")]
    QueueStopped,
}
