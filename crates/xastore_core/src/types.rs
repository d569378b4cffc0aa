//! Core type definitions for xastore.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreResult;

/// Commit serial number.
///
/// Serials provide total ordering of committed transactions. A record that
/// has not been committed carries [`Serial::ZERO`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Serial(pub u64);

impl Serial {
    /// Serial of a record that was never committed.
    pub const ZERO: Self = Self(0);

    /// Reserved upper bound. Never assigned to a record.
    pub const MAX: Self = Self(u64::MAX);

    /// Creates a new serial.
    #[must_use]
    pub const fn new(serial: u64) -> Self {
        Self(serial)
    }

    /// Returns the raw serial value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next serial, or `None` on overflow.
    #[must_use]
    pub const fn checked_next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(next) => Some(Self(next)),
            None => None,
        }
    }

    /// Returns true for the not-yet-committed serial.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "serial:{}", self.0)
    }
}

/// Kind of mutation an intent describes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// No operation. Always rejected by validation.
    #[default]
    Idle,
    /// Create a key that does not exist yet.
    Insert,
    /// Replace the value of an existing key.
    Update,
    /// Remove an existing key.
    Delete,
}

impl Operation {
    /// Returns the display name of this operation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "insert" => Ok(Self::Insert),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(format!("unknown operation: {other}")),
        }
    }
}

/// Lifecycle status of a transaction record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TxnStatus {
    /// No record with the requested name exists. Never stored.
    #[default]
    Unknown,
    /// Validated and waiting for commit or rollback.
    Prepare,
    /// Applied to the materialized store.
    Commited,
}

impl TxnStatus {
    /// Returns the display name of this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Prepare => "prepare",
            Self::Commited => "commited",
        }
    }
}

impl fmt::Display for TxnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TxnStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(Self::Unknown),
            "prepare" => Ok(Self::Prepare),
            "commited" | "committed" => Ok(Self::Commited),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

/// Outcome of a transactional call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    /// Applied, or already satisfied.
    Success,
    /// Referenced name or key does not exist.
    NotFound,
    /// Competing transaction, stale version or illegal transition.
    Conflict,
    /// Commit could not be applied consistently.
    Inconsistent,
    /// Malformed intent.
    InvalidArgument,
}

impl ResultCode {
    /// Maps the result of an engine call onto the result taxonomy.
    ///
    /// Returns `None` for decode and I/O failures, which have no code.
    #[must_use]
    pub fn try_of<T>(result: &CoreResult<T>) -> Option<Self> {
        match result {
            Ok(_) => Some(Self::Success),
            Err(err) => err.code(),
        }
    }

    /// Like [`ResultCode::try_of`], but reports a blob or file the caller
    /// handed in that could not be used as `InvalidArgument`.
    #[must_use]
    pub fn of<T>(result: &CoreResult<T>) -> Self {
        Self::try_of(result).unwrap_or(Self::InvalidArgument)
    }

    /// Returns the display name of this code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NotFound => "not-found",
            Self::Conflict => "conflict",
            Self::Inconsistent => "inconsistent",
            Self::InvalidArgument => "invalid-argument",
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    #[test]
    fn serial_ordering_and_next() {
        let s = Serial::new(5);
        assert_eq!(s.checked_next(), Some(Serial::new(6)));
        assert_eq!(Serial::MAX.checked_next(), None);
        assert!(Serial::ZERO < s);
        assert!(Serial::ZERO.is_zero());
        assert_eq!(format!("{s}"), "serial:5");
    }

    #[test]
    fn operation_names_parse_back() {
        for op in [
            Operation::Idle,
            Operation::Insert,
            Operation::Update,
            Operation::Delete,
        ] {
            assert_eq!(op.as_str().parse::<Operation>().unwrap(), op);
        }
        assert!("upsert".parse::<Operation>().is_err());
    }

    #[test]
    fn status_display_keeps_historic_spelling() {
        assert_eq!(TxnStatus::Commited.to_string(), "commited");
        assert_eq!("committed".parse::<TxnStatus>().unwrap(), TxnStatus::Commited);
    }

    #[test]
    fn result_code_of_results() {
        let ok: CoreResult<()> = Ok(());
        assert_eq!(ResultCode::of(&ok), ResultCode::Success);

        let busy: CoreResult<()> = Err(CoreError::conflict("busy"));
        assert_eq!(ResultCode::of(&busy), ResultCode::Conflict);

        let bad: CoreResult<()> = Err(CoreError::invalid_format("magic"));
        assert_eq!(ResultCode::of(&bad), ResultCode::InvalidArgument);
        assert_eq!(ResultCode::try_of(&bad), None);

        let io: CoreResult<()> = Err(CoreError::from(std::io::Error::other("disk gone")));
        assert_eq!(ResultCode::try_of(&io), None);
        assert_ne!(ResultCode::of(&io), ResultCode::Inconsistent);

        assert_eq!(ResultCode::InvalidArgument.to_string(), "invalid-argument");
        assert_eq!(ResultCode::NotFound.as_str(), "not-found");
    }
}
