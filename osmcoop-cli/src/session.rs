//! Runtime and fetch cache shared by every file in a run.

use std::future::Future;

use osmcoop_core::{ElementSource, FetchCache};
use osmcoop_data::{OsmApiConfig, OsmApiSource};
use tokio::runtime::{Builder, Runtime};

use crate::CliError;

/// A current-thread runtime plus the cache wrapping the run's element source.
pub(crate) struct Session<S> {
    runtime: Runtime,
    cache: FetchCache<S>,
}

impl<S: ElementSource + 'static> Session<S> {
    pub(crate) fn new(source: S) -> Result<Self, CliError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(CliError::Runtime)?;
        Ok(Self {
            runtime,
            cache: FetchCache::new(source),
        })
    }

    pub(crate) const fn cache(&self) -> &FetchCache<S> {
        &self.cache
    }

    pub(crate) fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

impl Session<OsmApiSource> {
    /// Build the API source and start its request queue on the session
    /// runtime.
    pub(crate) fn connect(config: &OsmApiConfig) -> Result<Self, CliError> {
        let source =
            OsmApiSource::new(config.clone()).map_err(|source| CliError::BuildSource {
                base_url: config.base_url.clone(),
                source,
            })?;
        let session = Self::new(source)?;
        {
            let _entered = session.runtime.enter();
            session
                .cache
                .source()
                .start()
                .map_err(CliError::StartQueue)?;
        }
        Ok(session)
    }

    /// Stop the request queue.
    pub(crate) fn close(&self) {
        self.cache.source().stop();
    }
}
