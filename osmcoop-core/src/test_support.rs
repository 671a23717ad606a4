//! In-memory `ElementSource` used by unit and behaviour tests.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll};

use async_trait::async_trait;

use crate::{CacheKey, Element, ElementId, ElementSource, ElementType, FetchError, Reference};

/// A request received by [`StubElementSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceCall {
    /// A versioned single-element fetch.
    Version {
        /// Requested type.
        element_type: ElementType,
        /// Requested id.
        id: ElementId,
        /// Requested version.
        version: u32,
    },
    /// A latest-version batch fetch.
    Batch {
        /// Requested type.
        element_type: ElementType,
        /// Requested ids in request order.
        ids: Vec<ElementId>,
    },
}

/// Deterministic source serving elements from memory and recording calls.
///
/// Batch fetches suspend once before answering so concurrent callers can
/// observe the batch while it is in flight.
#[derive(Debug, Default)]
pub struct StubElementSource {
    latest: HashMap<Reference, Element>,
    versions: HashMap<CacheKey, Element>,
    failure: Option<FetchError>,
    calls: Mutex<Vec<SourceCall>>,
}

impl StubElementSource {
    /// Create an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `element` as the latest version, and under its own version when
    /// it has one.
    #[must_use]
    pub fn with_element(mut self, element: Element) -> Self {
        let reference = Reference::new(element.element_type(), element.id);
        if let Some(version) = element.version {
            self.versions.insert(
                CacheKey::versioned(reference.element_type, reference.element_id, version),
                element.clone(),
            );
        }
        self.latest.insert(reference, element);
        self
    }

    /// Serve `element` only for versioned requests matching its version.
    ///
    /// # Panics
    ///
    /// Panics if `element` has no version.
    #[must_use]
    pub fn with_version(mut self, element: Element) -> Self {
        let version = element
            .version
            .unwrap_or_else(|| panic!("stub versions need an explicit version"));
        self.versions.insert(
            CacheKey::versioned(element.element_type(), element.id, version),
            element,
        );
        self
    }

    /// Fail every request with `error`.
    #[must_use]
    pub fn with_failure(mut self, error: FetchError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Calls received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<SourceCall> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn record(&self, call: SourceCall) {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(call);
    }
}

#[async_trait(?Send)]
impl ElementSource for StubElementSource {
    async fn fetch_version(
        &self,
        element_type: ElementType,
        id: ElementId,
        version: u32,
    ) -> Result<Element, FetchError> {
        self.record(SourceCall::Version {
            element_type,
            id,
            version,
        });
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        self.versions
            .get(&CacheKey::versioned(element_type, id, version))
            .cloned()
            .ok_or_else(|| FetchError::RemoteFetchFailed {
                element_type,
                ids: vec![id],
                status: 404,
            })
    }

    async fn fetch_elements(
        &self,
        element_type: ElementType,
        ids: &[ElementId],
    ) -> Result<Vec<Element>, FetchError> {
        self.record(SourceCall::Batch {
            element_type,
            ids: ids.to_vec(),
        });
        YieldOnce::default().await;
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        Ok(ids
            .iter()
            .filter_map(|&id| self.latest.get(&Reference::new(element_type, id)))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct YieldOnce {
    yielded: bool,
}

impl Future for YieldOnce {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}
