//! Error hierarchy for the streaming core.
//!
//! Out-of-range frame requests are deliberately absent here: they resolve to
//! [`Resolution::OutOfRange`](crate::cursor::Resolution::OutOfRange) and are
//! answered like any other frame.

use thiserror::Error;

/// Errors raised by the registry, codec, and dataset sources.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// No dataset with this name is available.
    #[error("could not find dataset {name}")]
    DatasetNotFound {
        /// Requested dataset name.
        name: String,
    },

    /// No session with this identifier exists.
    #[error("no session {id}")]
    SessionNotFound {
        /// Presented session identifier.
        id: String,
    },

    /// The session is already attached to another streaming connection.
    #[error("session {id} is already attached")]
    SessionInUse {
        /// Presented session identifier.
        id: String,
    },

    /// A wire message could not be decoded.
    #[error("malformed message ({len} bytes): {reason}")]
    Decode {
        /// Length of the offending message.
        len: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// Unexpected failure while preparing a dataset or producing a frame.
    #[error("internal error: {0}")]
    Internal(String),
}

impl StreamError {
    /// Build a decode error.
    pub fn decode(len: usize, reason: impl Into<String>) -> Self {
        Self::Decode {
            len,
            reason: reason.into(),
        }
    }

    /// Whether this error means "the thing you asked for does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::DatasetNotFound { .. } | Self::SessionNotFound { .. } | Self::SessionInUse { .. }
        )
    }

    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::DatasetNotFound { .. } => "dataset_not_found",
            Self::SessionNotFound { .. } => "session_not_found",
            Self::SessionInUse { .. } => "session_in_use",
            Self::Decode { .. } => "decode",
            Self::Internal(_) => "internal",
        }
    }
}

/// Result type for streaming operations.
pub type Result<T> = std::result::Result<T, StreamError>;
