//! Remote data access for the osmcoop tools.
//!
//! Responsibilities:
//! - Fetch element versions and element batches from the OpenStreetMap API.
//! - Throttle outgoing requests to a fixed rate.
//!
//! Boundaries:
//! - No change-file semantics (live in `osmcoop-core`).
//! - No caching; callers wrap [`OsmApiSource`] in
//!   [`osmcoop_core::FetchCache`].
//!
//! Invariants:
//! - At most one request leaves per throttle interval, in request order.

pub mod api;
pub mod queue;

pub use api::{
    DEFAULT_THROTTLE, DEFAULT_USER_AGENT, DEVELOPMENT_SERVER, OsmApiConfig, OsmApiSource,
    PRODUCTION_SERVER, SourceBuildError,
};
pub use queue::{QueueStartError, ThrottledQueue};
