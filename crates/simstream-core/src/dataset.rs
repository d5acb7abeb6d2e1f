//! Dataset descriptors and the sequential generator seam.
//!
//! A [`DatasetSource`] knows which datasets exist and how to prepare one.
//! Preparation may block (loading files, running a simulation setup), so
//! callers run it off the async executor. The result is a
//! [`PreparedDataset`]: an immutable [`DatasetDescriptor`] plus a
//! [`FrameGenerator`] that can only rewind to the start or step forward.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::codec::ELEMENT_BYTES;
use crate::errors::Result;

/// Static description of a dataset, fixed at manifest time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    /// Dataset name as requested by clients.
    pub name: String,
    /// Total frames available.
    pub frame_count: u32,
    /// `f32` elements per frame.
    pub element_count: u32,
    /// One label per element.
    pub element_labels: Vec<String>,
}

impl DatasetDescriptor {
    /// Largest payload a client must be ready to buffer.
    pub fn max_buffer_size(&self) -> usize {
        self.element_count as usize * ELEMENT_BYTES
    }
}

/// Forward-only frame producer.
///
/// Producing frame `i + 1` assumes frame `i` was the last one produced; the
/// only way back is [`reset`](FrameGenerator::reset).
///
/// Generators are parked in the shared session registry until a connection
/// takes them, so they must be `Sync` as well as `Send`.
pub trait FrameGenerator: Send + Sync {
    /// Rewind to the start and produce frame 0.
    fn reset(&mut self) -> Result<Bytes>;

    /// Produce the frame after the most recently produced one.
    ///
    /// Returns `Ok(None)` once the generator is exhausted.
    fn advance(&mut self) -> Result<Option<Bytes>>;
}

/// A dataset ready to stream.
pub struct PreparedDataset {
    /// Immutable description sent in the manifest.
    pub descriptor: DatasetDescriptor,
    /// Generator owned by the session that streams this dataset.
    pub generator: Box<dyn FrameGenerator>,
}

impl std::fmt::Debug for PreparedDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedDataset")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Catalogue of datasets that can be streamed.
pub trait DatasetSource: Send + Sync {
    /// Whether a dataset with this name is available.
    fn contains(&self, name: &str) -> bool;

    /// Names of all available datasets.
    fn names(&self) -> Vec<String>;

    /// Prepare a dataset for one session. May block.
    ///
    /// Fails with [`StreamError::DatasetNotFound`](crate::StreamError::DatasetNotFound)
    /// for unknown names.
    fn prepare(&self, name: &str) -> Result<PreparedDataset>;
}
