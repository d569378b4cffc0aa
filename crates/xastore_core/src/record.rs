//! Changelog records and materialized entries.

use serde::{Deserialize, Serialize};

use crate::intent::Intent;
use crate::types::{Serial, TxnStatus};

/// A changelog entry wrapping an intent with its lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxnRecord {
    /// Commit serial, [`Serial::ZERO`] until committed.
    pub serial: Serial,
    /// Lifecycle status.
    pub status: TxnStatus,
    /// Commit time in milliseconds since the Unix epoch, unset until commit.
    pub commit_timestamp: Option<u64>,
    /// The mutation this record carries.
    pub intent: Intent,
}

impl TxnRecord {
    /// Creates a freshly prepared record.
    #[must_use]
    pub fn prepared(intent: Intent) -> Self {
        Self {
            serial: Serial::ZERO,
            status: TxnStatus::Prepare,
            commit_timestamp: None,
            intent,
        }
    }

    /// Transaction name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.intent.name
    }

    /// Business key the intent targets.
    #[must_use]
    pub fn data_key(&self) -> &str {
        &self.intent.key
    }

    /// Returns true once the record has been committed.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.status == TxnStatus::Commited
    }
}

/// Current materialized value of a business key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Optimistic concurrency counter, bumped on every committed mutation.
    pub version: u64,
    /// Stored value.
    pub data: String,
}

impl Entry {
    /// Creates an entry.
    pub fn new(version: u64, data: impl Into<String>) -> Self {
        Self {
            version,
            data: data.into(),
        }
    }
}
