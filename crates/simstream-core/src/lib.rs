//! # simstream-core
//!
//! Foundation types for the simstream frame relay.
//!
//! - [`codec`]: binary wire format for frame requests and frame messages
//! - [`cursor`]: per-session frame cursor (cache hit, advance, reset-and-replay)
//! - [`dataset`]: dataset descriptors and the sequential frame generator seam
//! - [`synthetic`]: deterministic seeded dataset source
//! - [`ids`]: branded identifiers
//! - [`errors`]: the [`StreamError`] hierarchy
//! - [`logging`]: `tracing` subscriber setup

#![deny(unsafe_code)]

pub mod codec;
pub mod cursor;
pub mod dataset;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod synthetic;

pub use codec::{FrameMessage, decode_frame, decode_request, encode_frame, encode_request};
pub use cursor::{CursorStats, FrameCursor, Resolution};
pub use dataset::{DatasetDescriptor, DatasetSource, FrameGenerator, PreparedDataset};
pub use errors::{Result, StreamError};
pub use ids::SessionId;
pub use synthetic::{SyntheticDataset, SyntheticSource};
