//! Versioned element cache with single-flight batch fetching.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{FutureExt, LocalBoxFuture, Shared, join_all};
use log::debug;

use crate::model::{Element, ElementId, ElementMaps, ElementType, Reference};

use super::error::FetchError;
use super::source::ElementSource;

/// Key under which a fetched element is cached.
///
/// `version: None` holds the latest known version, populated only by batch
/// fetches. `version: Some(v)` holds a specific version, populated by
/// versioned fetches and by batch results that report their version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Element type.
    pub element_type: ElementType,
    /// Element identifier.
    pub id: ElementId,
    /// Specific version, or `None` for the latest.
    pub version: Option<u32>,
}

impl CacheKey {
    /// Key for the latest version of an element.
    #[must_use]
    pub const fn latest(element_type: ElementType, id: ElementId) -> Self {
        Self {
            element_type,
            id,
            version: None,
        }
    }

    /// Key for a specific version of an element.
    #[must_use]
    pub const fn versioned(element_type: ElementType, id: ElementId, version: u32) -> Self {
        Self {
            element_type,
            id,
            version: Some(version),
        }
    }
}

type BatchResult = Result<Arc<Vec<Element>>, FetchError>;
type BatchFuture = Shared<LocalBoxFuture<'static, BatchResult>>;

#[derive(Clone)]
struct InFlight {
    batch: u64,
    future: BatchFuture,
}

/// Cache of remotely fetched elements shared by every document in a run.
///
/// Entries are only added after a successful fetch and are never evicted.
/// Failures are not cached, so a later call retries.
///
/// # Examples
///
/// ```
/// # use async_trait::async_trait;
/// # use osmcoop_core::{Element, ElementId, ElementSource, ElementType, FetchError};
/// use osmcoop_core::FetchCache;
/// # struct Origin;
/// # #[async_trait(?Send)]
/// # impl ElementSource for Origin {
/// #     async fn fetch_version(&self, _: ElementType, id: ElementId, v: u32) -> Result<Element, FetchError> {
/// #         Ok(Element::node(id, 0.0, 0.0).with_version(v))
/// #     }
/// #     async fn fetch_elements(&self, _: ElementType, ids: &[ElementId]) -> Result<Vec<Element>, FetchError> {
/// #         Ok(ids.iter().map(|&id| Element::node(id, 0.0, 0.0)).collect())
/// #     }
/// # }
/// # futures_util::FutureExt::now_or_never(async {
/// let cache = FetchCache::new(Origin);
/// let first = cache.fetch_versioned(ElementType::Node, 1, 2).await?;
/// let second = cache.fetch_versioned(ElementType::Node, 1, 2).await?;
/// assert_eq!(first, second);
/// assert_eq!(cache.requests_issued(), 1);
/// # Ok::<(), FetchError>(())
/// # }).unwrap().unwrap();
/// ```
pub struct FetchCache<S> {
    source: Arc<S>,
    entries: Mutex<HashMap<CacheKey, Element>>,
    in_flight: Mutex<HashMap<Reference, InFlight>>,
    next_batch: AtomicU64,
    requests: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<S> FetchCache<S>
where
    S: ElementSource + 'static,
{
    /// Wrap `source` in an empty cache.
    pub fn new(source: S) -> Self {
        Self {
            source: Arc::new(source),
            entries: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            next_batch: AtomicU64::new(0),
            requests: AtomicUsize::new(0),
        }
    }

    /// The wrapped source.
    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Number of cached entries across all keys.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// Number of requests issued to the source so far.
    #[must_use]
    pub fn requests_issued(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }

    /// Fetch a specific version of an element, consulting the cache first.
    ///
    /// # Errors
    ///
    /// Propagates the source's [`FetchError`]; failures are not cached.
    pub async fn fetch_versioned(
        &self,
        element_type: ElementType,
        id: ElementId,
        version: u32,
    ) -> Result<Element, FetchError> {
        let key = CacheKey::versioned(element_type, id, version);
        if let Some(element) = lock(&self.entries).get(&key) {
            debug!("cache hit for {element_type}/{id} v{version}");
            return Ok(element.clone());
        }

        debug!("fetching {element_type}/{id} v{version}");
        self.requests.fetch_add(1, Ordering::Relaxed);
        let element = self.source.fetch_version(element_type, id, version).await?;
        lock(&self.entries).insert(key, element.clone());
        Ok(element)
    }

    /// Fetch the latest versions of `ids`.
    ///
    /// Each id is taken from `local` when present there, then from the cache,
    /// then from a batch another caller already has in flight. The remaining
    /// ids are requested in a single batch that concurrent callers may join.
    /// Ids the source does not know are absent from the returned map.
    ///
    /// # Errors
    ///
    /// Returns the [`FetchError`] of any batch this call waited on.
    pub async fn fetch_many(
        &self,
        element_type: ElementType,
        ids: &[ElementId],
        local: Option<&ElementMaps>,
    ) -> Result<HashMap<ElementId, Element>, FetchError> {
        let mut found = HashMap::new();
        let mut pending: Vec<InFlight> = Vec::new();
        let mut residual: Vec<ElementId> = Vec::new();
        {
            let entries = lock(&self.entries);
            let in_flight = lock(&self.in_flight);
            for &id in ids {
                if found.contains_key(&id) || residual.contains(&id) {
                    continue;
                }
                let reference = Reference::new(element_type, id);
                if let Some(element) = local.and_then(|maps| maps.get(reference)) {
                    found.insert(id, element.clone());
                } else if let Some(element) = entries.get(&CacheKey::latest(element_type, id)) {
                    found.insert(id, element.clone());
                } else if let Some(flight) = in_flight.get(&reference) {
                    if pending.iter().all(|waiting| waiting.batch != flight.batch) {
                        pending.push(flight.clone());
                    }
                } else {
                    residual.push(id);
                }
            }
        }

        if !residual.is_empty() {
            pending.push(self.start_batch(element_type, residual));
        }
        if pending.is_empty() {
            return Ok(found);
        }

        let results = join_all(pending.iter().map(|flight| flight.future.clone())).await;
        let mut failure = None;
        for (flight, result) in pending.iter().zip(results) {
            match self.settle(element_type, flight.batch, result) {
                Ok(elements) => {
                    for element in elements.iter() {
                        if ids.contains(&element.id) {
                            found.entry(element.id).or_insert_with(|| element.clone());
                        }
                    }
                }
                Err(err) => {
                    failure.get_or_insert(err);
                }
            }
        }
        failure.map_or(Ok(found), Err)
    }

    fn start_batch(&self, element_type: ElementType, ids: Vec<ElementId>) -> InFlight {
        let batch = self.next_batch.fetch_add(1, Ordering::Relaxed);
        self.requests.fetch_add(1, Ordering::Relaxed);
        debug!(
            "fetching {} {element_type} element(s) in batch {batch}",
            ids.len()
        );

        let source = Arc::clone(&self.source);
        let references: Vec<_> = ids
            .iter()
            .map(|&id| Reference::new(element_type, id))
            .collect();
        let future = async move {
            source
                .fetch_elements(element_type, &ids)
                .await
                .map(Arc::new)
        }
        .boxed_local()
        .shared();
        let flight = InFlight { batch, future };

        let mut in_flight = lock(&self.in_flight);
        for reference in references {
            in_flight.insert(reference, flight.clone());
        }
        flight
    }

    /// Record a finished batch. Any waiter may settle it; repeated settling
    /// is harmless.
    fn settle(&self, element_type: ElementType, batch: u64, result: BatchResult) -> BatchResult {
        lock(&self.in_flight).retain(|_, flight| flight.batch != batch);
        if let Ok(elements) = &result {
            let mut entries = lock(&self.entries);
            for element in elements
                .iter()
                .filter(|element| element.element_type() == element_type)
            {
                entries.insert(CacheKey::latest(element_type, element.id), element.clone());
                if let Some(version) = element.version {
                    entries.insert(
                        CacheKey::versioned(element_type, element.id, version),
                        element.clone(),
                    );
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests;
