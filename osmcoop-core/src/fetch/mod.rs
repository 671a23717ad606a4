//! Fetch elements missing from a change document.
//!
//! The [`ElementSource`] trait abstracts the remote API. [`FetchCache`]
//! wraps a source for the lifetime of a run, caching every successful result
//! and coalescing concurrent batch requests for the same ids.

mod cache;
mod error;
mod source;

pub use cache::{CacheKey, FetchCache};
pub use error::FetchError;
pub use source::ElementSource;
