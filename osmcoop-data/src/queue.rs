//! Fixed-rate permit queue for throttling API requests.
//!
//! Callers [`acquire`](ThrottledQueue::acquire) a permit before each request.
//! A dispatcher task grants at most one permit per interval tick, in request
//! order, so the remote API never sees more than one request per interval.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use log::debug;
use osmcoop_core::FetchError;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Errors raised by [`ThrottledQueue::start`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueStartError {
    /// `start` was called outside a Tokio runtime.
    #[error("the request queue must be started from within a Tokio runtime")]
    NoRuntime,
    /// The interval was zero.
    #[error("the request queue interval must be greater than zero")]
    ZeroInterval,
}

#[derive(Default)]
struct QueueInner {
    waiters: Mutex<VecDeque<oneshot::Sender<()>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl QueueInner {
    /// Grant the oldest permit whose caller is still waiting.
    fn grant_next(&self) {
        let mut waiters = lock(&self.waiters);
        while let Some(waiter) = waiters.pop_front() {
            if waiter.send(()).is_ok() {
                debug!("granted request permit, {} pending", waiters.len());
                return;
            }
        }
    }
}

impl Drop for QueueInner {
    fn drop(&mut self) {
        if let Some(handle) = self
            .dispatcher
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

/// FIFO permit queue drained at a fixed interval.
///
/// Clones share the same queue. The dispatcher stops when the last clone is
/// dropped.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use osmcoop_data::ThrottledQueue;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let queue = ThrottledQueue::new();
/// queue.start(Duration::from_millis(10))?;
/// queue.acquire().await?;
/// queue.stop();
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct ThrottledQueue {
    inner: Arc<QueueInner>,
}

impl std::fmt::Debug for ThrottledQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThrottledQueue")
            .field("running", &self.is_running())
            .field("pending", &self.pending())
            .finish()
    }
}

impl ThrottledQueue {
    /// Create a stopped queue with no pending permits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start granting one permit per `interval`, the first one `interval`
    /// from now.
    ///
    /// Does nothing if the dispatcher is already running.
    ///
    /// # Errors
    ///
    /// Returns [`QueueStartError::NoRuntime`] outside a Tokio runtime and
    /// [`QueueStartError::ZeroInterval`] for a zero interval.
    pub fn start(&self, interval: Duration) -> Result<(), QueueStartError> {
        if interval.is_zero() {
            return Err(QueueStartError::ZeroInterval);
        }
        let runtime = Handle::try_current().map_err(|_| QueueStartError::NoRuntime)?;
        let mut dispatcher = lock(&self.inner.dispatcher);
        if dispatcher.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(());
        }

        let queue = Arc::downgrade(&self.inner);
        *dispatcher = Some(runtime.spawn(dispatch(queue, interval)));
        debug!("request queue started with {}ms interval", interval.as_millis());
        Ok(())
    }

    /// Stop the dispatcher and reject every pending permit with
    /// [`FetchError::QueueStopped`].
    ///
    /// Does nothing if the queue is not running.
    pub fn stop(&self) {
        if let Some(handle) = lock(&self.inner.dispatcher).take() {
            handle.abort();
        }
        let rejected = std::mem::take(&mut *lock(&self.inner.waiters));
        if !rejected.is_empty() {
            debug!("request queue stopped, rejecting {} pending permits", rejected.len());
        }
    }

    /// Whether the dispatcher is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        lock(&self.inner.dispatcher)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Number of permits waiting to be granted, including abandoned ones not
    /// yet skipped.
    #[must_use]
    pub fn pending(&self) -> usize {
        lock(&self.inner.waiters).len()
    }

    /// Request a permit.
    ///
    /// The permit joins the queue immediately, so requests keep their order
    /// even if the returned futures are polled out of order. Permits requested
    /// before [`start`](Self::start) wait for the dispatcher. Dropping the
    /// future abandons the permit.
    pub fn acquire(&self) -> impl Future<Output = Result<(), FetchError>> + Send + 'static {
        let (sender, receiver) = oneshot::channel();
        lock(&self.inner.waiters).push_back(sender);
        async move { receiver.await.map_err(|_| FetchError::QueueStopped) }
    }
}

async fn dispatch(queue: Weak<QueueInner>, interval: Duration) {
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(inner) = queue.upgrade() else {
            break;
        };
        inner.grant_next();
    }
}
