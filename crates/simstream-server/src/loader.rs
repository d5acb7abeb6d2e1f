//! Bounded dataset preparation pool.
//!
//! Preparing a dataset can block for a long time, so it runs on tokio's
//! blocking pool. A semaphore caps how many preparations run at once; extra
//! requests queue on the semaphore.

use std::sync::Arc;

use simstream_core::{DatasetDescriptor, DatasetSource, FrameCursor, StreamError};
use tokio::sync::Semaphore;
use tracing::debug;

/// Runs [`DatasetSource::prepare`] off the async executor.
#[derive(Clone)]
pub struct DatasetLoader {
    source: Arc<dyn DatasetSource>,
    permits: Arc<Semaphore>,
}

impl DatasetLoader {
    /// Create a loader allowing `workers` concurrent preparations.
    pub fn new(source: Arc<dyn DatasetSource>, workers: usize) -> Self {
        Self {
            source,
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Whether the source knows this dataset.
    pub fn contains(&self, name: &str) -> bool {
        self.source.contains(name)
    }

    /// Names of all datasets.
    pub fn names(&self) -> Vec<String> {
        self.source.names()
    }

    /// Idle worker slots.
    pub fn available_workers(&self) -> usize {
        self.permits.available_permits()
    }

    /// Prepare `name` and seed a cursor at frame 0.
    pub async fn open(
        &self,
        name: &str,
    ) -> simstream_core::Result<(DatasetDescriptor, FrameCursor)> {
        let _permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| StreamError::Internal("dataset loader is closed".into()))?;

        let source = Arc::clone(&self.source);
        let owned = name.to_owned();
        debug!(dataset = name, "preparing dataset");
        tokio::task::spawn_blocking(move || -> simstream_core::Result<_> {
            let prepared = source.prepare(&owned)?;
            let descriptor = prepared.descriptor.clone();
            let cursor = FrameCursor::from_prepared(prepared)?;
            Ok((descriptor, cursor))
        })
        .await
        .map_err(|e| StreamError::Internal(format!("dataset preparation task failed: {e}")))?
    }
}
