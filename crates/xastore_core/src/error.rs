//! Error types for xastore core.

use std::io;
use thiserror::Error;

use crate::types::ResultCode;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in xastore core operations.
///
/// The first four variants form the transactional taxonomy returned by
/// `prepare`, `commit` and `rollback`. The remaining variants are raised
/// while decoding a snapshot or touching the filesystem.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Referenced transaction name or business key does not exist.
    #[error("not found: {what}")]
    NotFound {
        /// What was looked up.
        what: String,
    },

    /// Competing transaction, version mismatch, name reuse or illegal
    /// state transition.
    #[error("conflict: {reason}")]
    Conflict {
        /// Why the operation conflicts.
        reason: String,
    },

    /// Malformed intent.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// What is wrong with the intent.
        reason: String,
    },

    /// Internal invariant violated while applying a commit.
    #[error("inconsistent state: {reason}")]
    Inconsistent {
        /// Description of the violated invariant.
        reason: String,
    },

    /// CBOR payload could not be encoded or decoded.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the codec failure.
        message: String,
    },

    /// Snapshot header, version or layout is invalid.
    #[error("invalid snapshot format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// Checksum mismatch detected.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Expected checksum.
        expected: u32,
        /// Actual checksum.
        actual: u32,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CoreError {
    /// Creates a not found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Creates a conflict error.
    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict {
            reason: reason.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Creates an inconsistent state error.
    pub fn inconsistent(reason: impl Into<String>) -> Self {
        Self::Inconsistent {
            reason: reason.into(),
        }
    }

    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Returns the transactional result code for this error, or `None` for
    /// decode and I/O failures which sit outside that taxonomy.
    #[must_use]
    pub fn code(&self) -> Option<ResultCode> {
        match self {
            Self::NotFound { .. } => Some(ResultCode::NotFound),
            Self::Conflict { .. } => Some(ResultCode::Conflict),
            Self::InvalidArgument { .. } => Some(ResultCode::InvalidArgument),
            Self::Inconsistent { .. } => Some(ResultCode::Inconsistent),
            Self::Codec { .. }
            | Self::InvalidFormat { .. }
            | Self::ChecksumMismatch { .. }
            | Self::Io(_) => None,
        }
    }

    /// Returns true if this error came from decoding a snapshot.
    #[must_use]
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Self::Codec { .. } | Self::InvalidFormat { .. } | Self::ChecksumMismatch { .. }
        )
    }
}
