//! [`ElementSource`] backed by the OpenStreetMap editing API.
//!
//! [`OsmApiSource`] issues `GET` requests against API v0.6 for single
//! element versions and for multi-element batches. Every request first waits
//! for a permit from the source's [`ThrottledQueue`], so callers must
//! [`start`](OsmApiSource::start) the source inside a Tokio runtime before
//! fetching.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use osmcoop_core::{ElementSource, ElementType};
//! use osmcoop_data::{OsmApiConfig, OsmApiSource};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = OsmApiConfig::development().with_throttle(Duration::from_millis(500));
//! let source = OsmApiSource::new(config)?;
//! source.start()?;
//! let nodes = source.fetch_elements(ElementType::Node, &[1, 2]).await?;
//! source.stop();
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use osmcoop_core::extract::parse_element_response;
use osmcoop_core::{Element, ElementId, ElementSource, ElementType, FetchError};
use reqwest::Client;
use thiserror::Error;

use crate::queue::{QueueStartError, ThrottledQueue};

/// Production OpenStreetMap API server.
pub const PRODUCTION_SERVER: &str = "https://api.openstreetmap.org";

/// Development OpenStreetMap API server.
pub const DEVELOPMENT_SERVER: &str = "https://master.apis.dev.openstreetmap.org";

/// Default user agent for API requests.
pub const DEFAULT_USER_AGENT: &str = "osmcoop/0.1";

/// Default interval between API requests.
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(250);

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

const API_PATH: &str = "api/0.6";

/// Error type for [`OsmApiSource`] construction failures.
#[derive(Debug, Error)]
pub enum SourceBuildError {
    /// Failed to build the HTTP client.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Configuration for [`OsmApiSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsmApiConfig {
    /// Base URL of the API server, without the `/api/0.6` suffix.
    pub base_url: String,
    /// Request timeout duration.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
    /// Minimum interval between requests.
    pub throttle: Duration,
}

impl Default for OsmApiConfig {
    fn default() -> Self {
        Self {
            base_url: PRODUCTION_SERVER.to_owned(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            throttle: DEFAULT_THROTTLE,
        }
    }
}

impl OsmApiConfig {
    /// Create a configuration for the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Configuration for the production server.
    #[must_use]
    pub fn production() -> Self {
        Self::new(PRODUCTION_SERVER)
    }

    /// Configuration for the development server.
    #[must_use]
    pub fn development() -> Self {
        Self::new(DEVELOPMENT_SERVER)
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the minimum interval between requests.
    #[must_use]
    pub const fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }
}

/// OpenStreetMap API client implementing [`ElementSource`].
///
/// The source does not cache. Wrap it in an
/// [`osmcoop_core::FetchCache`] to share results across a run.
#[derive(Debug)]
pub struct OsmApiSource {
    client: Client,
    config: OsmApiConfig,
    queue: ThrottledQueue,
}

impl OsmApiSource {
    /// Build a source with its own request queue.
    ///
    /// # Errors
    ///
    /// Returns [`SourceBuildError::HttpClient`] if the HTTP client fails to
    /// build.
    pub fn new(config: OsmApiConfig) -> Result<Self, SourceBuildError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()
            .map_err(SourceBuildError::HttpClient)?;
        Ok(Self {
            client,
            config,
            queue: ThrottledQueue::new(),
        })
    }

    /// Start dispatching request permits at the configured throttle.
    ///
    /// # Errors
    ///
    /// Returns [`QueueStartError`] outside a Tokio runtime or for a zero
    /// throttle.
    pub fn start(&self) -> Result<(), QueueStartError> {
        self.queue.start(self.config.throttle)
    }

    /// Stop dispatching permits. Requests still waiting fail with
    /// [`FetchError::QueueStopped`].
    pub fn stop(&self) {
        self.queue.stop();
    }

    /// The request queue gating this source.
    #[must_use]
    pub const fn queue(&self) -> &ThrottledQueue {
        &self.queue
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &OsmApiConfig {
        &self.config
    }

    fn api_root(&self) -> String {
        format!("{}/{API_PATH}", self.config.base_url.trim_end_matches('/'))
    }

    /// URL of one element version: `{base}/api/0.6/{type}/{id}/{version}`.
    fn version_url(&self, element_type: ElementType, id: ElementId, version: u32) -> String {
        format!("{}/{element_type}/{id}/{version}", self.api_root())
    }

    /// URL of a multi-fetch: `{base}/api/0.6/{type}s?{type}s=1,2,3`.
    fn batch_url(&self, element_type: ElementType, ids: &[ElementId]) -> String {
        let list = ids
            .iter()
            .map(ElementId::to_string)
            .collect::<Vec<_>>()
            .join(",");
        format!("{}/{element_type}s?{element_type}s={list}", self.api_root())
    }

    /// Wait for a permit, then `GET` `url` and return the body.
    async fn get(
        &self,
        url: &str,
        element_type: ElementType,
        ids: &[ElementId],
    ) -> Result<String, FetchError> {
        self.queue.acquire().await?;
        debug!("GET {url}");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| convert_reqwest_error(&err, url, element_type, ids))?;

        let status = response.status();
        if !status.is_success() {
            warn!("GET {url} returned {status}");
            return Err(FetchError::RemoteFetchFailed {
                element_type,
                ids: ids.to_vec(),
                status: status.as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|err| convert_reqwest_error(&err, url, element_type, ids))
    }
}

/// Convert a reqwest error into a [`FetchError`].
fn convert_reqwest_error(
    error: &reqwest::Error,
    url: &str,
    element_type: ElementType,
    ids: &[ElementId],
) -> FetchError {
    if let Some(status) = error.status() {
        return FetchError::RemoteFetchFailed {
            element_type,
            ids: ids.to_vec(),
            status: status.as_u16(),
        };
    }

    FetchError::Network {
        url: url.to_owned(),
        message: error.to_string(),
    }
}

fn parse_body(
    body: &str,
    url: &str,
    element_type: ElementType,
) -> Result<Vec<Element>, FetchError> {
    parse_element_response(body, element_type).map_err(|err| FetchError::InvalidResponse {
        url: url.to_owned(),
        message: err.to_string(),
    })
}

#[async_trait(?Send)]
impl ElementSource for OsmApiSource {
    async fn fetch_version(
        &self,
        element_type: ElementType,
        id: ElementId,
        version: u32,
    ) -> Result<Element, FetchError> {
        let url = self.version_url(element_type, id, version);
        let body = self.get(&url, element_type, &[id]).await?;
        parse_body(&body, &url, element_type)?
            .into_iter()
            .find(|element| element.id == id)
            .ok_or_else(|| FetchError::InvalidResponse {
                url,
                message: format!("response does not contain {element_type} {id}"),
            })
    }

    async fn fetch_elements(
        &self,
        element_type: ElementType,
        ids: &[ElementId],
    ) -> Result<Vec<Element>, FetchError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.batch_url(element_type, ids);
        let body = self.get(&url, element_type, ids).await?;
        parse_body(&body, &url, element_type)
    }
}
