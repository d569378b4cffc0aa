//! Engine statistics.
//!
//! Counters live for the lifetime of an engine instance. `clear()` and
//! `restore()` replace state but leave the counters alone.

use crate::types::ResultCode;

/// Snapshot of engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Records appended by `prepare`.
    pub prepared: u64,
    /// Records committed (idempotent re-commits excluded).
    pub committed: u64,
    /// Records removed by `rollback`.
    pub rolled_back: u64,
    /// Calls rejected with `Conflict`.
    pub conflicts: u64,
    /// Calls rejected with `NotFound` or `InvalidArgument`.
    pub rejected: u64,
    /// Commits that failed with `Inconsistent`.
    pub inconsistencies: u64,
    /// Records removed by `trim` and `trim_pending`.
    pub trimmed: u64,
    /// Successful restores.
    pub restores: u64,
}

impl EngineStats {
    /// Records a failed transactional call.
    pub(crate) fn record_failure(&mut self, code: ResultCode) {
        match code {
            ResultCode::Success => {}
            ResultCode::Conflict => self.conflicts += 1,
            ResultCode::NotFound | ResultCode::InvalidArgument => self.rejected += 1,
            ResultCode::Inconsistent => self.inconsistencies += 1,
        }
    }
}
