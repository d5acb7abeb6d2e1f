//! Per-session frame cursor.
//!
//! The cursor remembers the last frame it produced and that frame's bytes.
//! A request is resolved with the cheapest move the forward-only generator
//! allows:
//!
//! | request `r` vs cursor `c` | action                                   |
//! |---------------------------|------------------------------------------|
//! | `r == c`                  | return the cached payload                |
//! | `r == c + 1`              | advance one step                         |
//! | anything else             | reset to 0 and replay forward to `r`     |
//!
//! Running off the end of the dataset yields [`Resolution::OutOfRange`],
//! which callers answer with an empty payload.

use bytes::Bytes;

use crate::dataset::{FrameGenerator, PreparedDataset};
use crate::errors::{Result, StreamError};

/// How a frame request was satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Same frame as last time; nothing was recomputed.
    Cached(Bytes),
    /// The next frame, produced with one generator step.
    Advanced(Bytes),
    /// Random access: the generator was rewound and stepped `steps` times.
    Replayed {
        /// Payload of the requested frame.
        payload: Bytes,
        /// Generator advances performed after the rewind.
        steps: u32,
    },
    /// The requested index is not a frame of this dataset.
    OutOfRange,
}

impl Resolution {
    /// Payload to send; empty for [`Resolution::OutOfRange`].
    pub fn payload(&self) -> Bytes {
        match self {
            Self::Cached(p) | Self::Advanced(p) | Self::Replayed { payload: p, .. } => p.clone(),
            Self::OutOfRange => Bytes::new(),
        }
    }

    /// Label for logs and metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Cached(_) => "cached",
            Self::Advanced(_) => "advanced",
            Self::Replayed { .. } => "replayed",
            Self::OutOfRange => "out_of_range",
        }
    }
}

/// Running counters for one cursor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorStats {
    /// Requests served from the cache.
    pub hits: u64,
    /// Single-step sequential advances.
    pub advances: u64,
    /// Rewinds to frame 0.
    pub resets: u64,
    /// Generator steps spent replaying after rewinds.
    pub replay_steps: u64,
    /// Requests resolved as out of range.
    pub out_of_range: u64,
}

/// Cursor over one dataset's frames.
pub struct FrameCursor {
    generator: Box<dyn FrameGenerator>,
    frame_count: u32,
    position: u32,
    cached: Bytes,
    // Set when the generator failed mid-step and may not sit at `position`.
    needs_reset: bool,
    stats: CursorStats,
}

impl std::fmt::Debug for FrameCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameCursor")
            .field("frame_count", &self.frame_count)
            .field("position", &self.position)
            .field("cached_len", &self.cached.len())
            .field("needs_reset", &self.needs_reset)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl FrameCursor {
    /// Seed a cursor at frame 0.
    pub fn new(mut generator: Box<dyn FrameGenerator>, frame_count: u32) -> Result<Self> {
        if frame_count == 0 {
            return Err(StreamError::Internal("cursor over an empty dataset".into()));
        }
        let cached = generator.reset()?;
        Ok(Self {
            generator,
            frame_count,
            position: 0,
            cached,
            needs_reset: false,
            stats: CursorStats::default(),
        })
    }

    /// Seed a cursor from a prepared dataset.
    pub fn from_prepared(prepared: PreparedDataset) -> Result<Self> {
        Self::new(prepared.generator, prepared.descriptor.frame_count)
    }

    /// Index of the frame held in the cache.
    pub fn position(&self) -> u32 {
        self.position
    }

    /// Payload of the frame at [`position`](Self::position).
    pub fn cached(&self) -> &Bytes {
        &self.cached
    }

    /// Total frames in the dataset.
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Counters since creation.
    pub fn stats(&self) -> CursorStats {
        self.stats
    }

    /// Resolve a requested frame index.
    ///
    /// Errors only come from the generator; on error the cursor still holds
    /// the last frame it produced successfully.
    pub fn resolve(&mut self, requested: i32) -> Result<Resolution> {
        let Ok(r) = u32::try_from(requested) else {
            return Ok(self.out_of_range());
        };

        if r == self.position {
            self.stats.hits += 1;
            return Ok(Resolution::Cached(self.cached.clone()));
        }

        if r == self.position + 1 && !self.needs_reset {
            if r >= self.frame_count {
                return Ok(self.out_of_range());
            }
            return match self.step()? {
                Some(payload) => {
                    self.stats.advances += 1;
                    Ok(Resolution::Advanced(payload))
                }
                None => Ok(self.out_of_range()),
            };
        }

        self.replay(r)
    }

    fn replay(&mut self, target: u32) -> Result<Resolution> {
        self.stats.resets += 1;
        self.needs_reset = true;
        self.cached = self.generator.reset()?;
        self.position = 0;
        self.needs_reset = false;

        let mut steps = 0;
        while self.position < target {
            if self.position + 1 >= self.frame_count {
                self.stats.replay_steps += u64::from(steps);
                return Ok(self.out_of_range());
            }
            if self.step()?.is_none() {
                self.stats.replay_steps += u64::from(steps);
                return Ok(self.out_of_range());
            }
            steps += 1;
        }
        self.stats.replay_steps += u64::from(steps);
        Ok(Resolution::Replayed {
            payload: self.cached.clone(),
            steps,
        })
    }

    fn step(&mut self) -> Result<Option<Bytes>> {
        match self.generator.advance() {
            Ok(Some(payload)) => {
                self.position += 1;
                self.cached = payload.clone();
                Ok(Some(payload))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                self.needs_reset = true;
                Err(e)
            }
        }
    }

    fn out_of_range(&mut self) -> Resolution {
        self.stats.out_of_range += 1;
        Resolution::OutOfRange
    }
}
