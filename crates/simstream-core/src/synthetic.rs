//! Deterministic synthetic datasets.
//!
//! Each frame is `element_count` uniform `f32` values drawn from a
//! [`StdRng`] seeded per dataset. Frame `i` depends on every draw before it,
//! so the generator is genuinely sequential, yet replaying from the seed
//! always reproduces the same bytes.

use std::collections::BTreeMap;

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::codec::pack_elements;
use crate::dataset::{DatasetDescriptor, DatasetSource, FrameGenerator, PreparedDataset};
use crate::errors::{Result, StreamError};

/// Shape of one synthetic dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticDataset {
    /// Dataset name.
    pub name: String,
    /// Total frames.
    pub frame_count: u32,
    /// Elements per frame.
    pub element_count: u32,
    /// Label applied to every element.
    pub label: String,
    /// RNG seed; frames are a pure function of it.
    pub seed: u64,
}

impl SyntheticDataset {
    /// The built-in `test` dataset: 10 frames of 10 elements labelled `O`.
    pub fn test() -> Self {
        Self {
            name: "test".into(),
            frame_count: 10,
            element_count: 10,
            label: "O".into(),
            seed: 0x5eed,
        }
    }

    fn descriptor(&self) -> DatasetDescriptor {
        DatasetDescriptor {
            name: self.name.clone(),
            frame_count: self.frame_count,
            element_count: self.element_count,
            element_labels: vec![self.label.clone(); self.element_count as usize],
        }
    }
}

/// Generator stepping a seeded RNG forward one frame at a time.
pub struct SyntheticGenerator {
    shape: SyntheticDataset,
    rng: StdRng,
    last: Option<u32>,
}

impl SyntheticGenerator {
    /// Create a generator positioned before frame 0.
    pub fn new(shape: SyntheticDataset) -> Self {
        let rng = StdRng::seed_from_u64(shape.seed);
        Self {
            shape,
            rng,
            last: None,
        }
    }

    fn draw(&mut self) -> Bytes {
        let values: Vec<f32> = (0..self.shape.element_count)
            .map(|_| self.rng.random::<f32>())
            .collect();
        pack_elements(&values)
    }
}

impl FrameGenerator for SyntheticGenerator {
    fn reset(&mut self) -> Result<Bytes> {
        self.rng = StdRng::seed_from_u64(self.shape.seed);
        self.last = Some(0);
        Ok(self.draw())
    }

    fn advance(&mut self) -> Result<Option<Bytes>> {
        let next = self.last.map_or(0, |i| i + 1);
        if next >= self.shape.frame_count {
            return Ok(None);
        }
        self.last = Some(next);
        Ok(Some(self.draw()))
    }
}

/// [`DatasetSource`] serving a fixed set of synthetic datasets.
#[derive(Debug, Clone, Default)]
pub struct SyntheticSource {
    datasets: BTreeMap<String, SyntheticDataset>,
}

impl SyntheticSource {
    /// Build a source from dataset shapes. Later duplicates win.
    pub fn new(datasets: impl IntoIterator<Item = SyntheticDataset>) -> Self {
        Self {
            datasets: datasets.into_iter().map(|d| (d.name.clone(), d)).collect(),
        }
    }

    /// Source containing only [`SyntheticDataset::test`].
    pub fn with_test_dataset() -> Self {
        Self::new([SyntheticDataset::test()])
    }
}

impl DatasetSource for SyntheticSource {
    fn contains(&self, name: &str) -> bool {
        self.datasets.contains_key(name)
    }

    fn names(&self) -> Vec<String> {
        self.datasets.keys().cloned().collect()
    }

    fn prepare(&self, name: &str) -> Result<PreparedDataset> {
        let shape = self
            .datasets
            .get(name)
            .ok_or_else(|| StreamError::DatasetNotFound { name: name.into() })?;
        if shape.frame_count == 0 {
            return Err(StreamError::Internal(format!("dataset {name} has no frames")));
        }
        Ok(PreparedDataset {
            descriptor: shape.descriptor(),
            generator: Box::new(SyntheticGenerator::new(shape.clone())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(frames: u32) -> SyntheticDataset {
        SyntheticDataset {
            name: "small".into(),
            frame_count: frames,
            element_count: 3,
            label: "C".into(),
            seed: 42,
        }
    }

    #[test]
    fn reset_reproduces_the_same_sequence() {
        let mut g = SyntheticGenerator::new(small(5));
        let first: Vec<Bytes> = std::iter::once(g.reset().unwrap())
            .chain((0..4).map(|_| g.advance().unwrap().unwrap()))
            .collect();
        let second: Vec<Bytes> = std::iter::once(g.reset().unwrap())
            .chain((0..4).map(|_| g.advance().unwrap().unwrap()))
            .collect();
        assert_eq!(first, second);
        assert_ne!(first[0], first[1]);
    }

    #[test]
    fn generator_is_exhausted_after_frame_count() {
        let mut g = SyntheticGenerator::new(small(2));
        let _ = g.reset().unwrap();
        assert!(g.advance().unwrap().is_some());
        assert!(g.advance().unwrap().is_none());
        assert!(g.advance().unwrap().is_none());
    }

    #[test]
    fn frames_are_element_count_floats() {
        let mut g = SyntheticGenerator::new(small(2));
        let frame = g.reset().unwrap();
        assert_eq!(frame.len(), 12);
    }

    #[test]
    fn prepare_known_dataset() {
        let source = SyntheticSource::with_test_dataset();
        let prepared = source.prepare("test").unwrap();
        assert_eq!(prepared.descriptor.frame_count, 10);
        assert_eq!(prepared.descriptor.element_count, 10);
        assert_eq!(prepared.descriptor.element_labels, vec!["O".to_string(); 10]);
    }

    #[test]
    fn prepare_unknown_dataset_is_not_found() {
        let source = SyntheticSource::with_test_dataset();
        let err = source.prepare("water").unwrap_err();
        assert_eq!(err, StreamError::DatasetNotFound { name: "water".into() });
    }

    #[test]
    fn empty_dataset_cannot_be_prepared() {
        let source = SyntheticSource::new([small(0)]);
        assert_eq!(source.prepare("small").unwrap_err().error_kind(), "internal");
    }

    #[test]
    fn names_are_sorted() {
        let mut other = small(1);
        other.name = "alpha".into();
        let source = SyntheticSource::new([SyntheticDataset::test(), other]);
        assert_eq!(source.names(), vec!["alpha".to_string(), "test".to_string()]);
        assert!(source.contains("alpha"));
        assert!(!source.contains("beta"));
    }
}
