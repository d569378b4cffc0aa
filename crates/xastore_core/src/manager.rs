//! Thread-safe read-modify-write front end.
//!
//! [`Manager`] owns an [`Engine`] behind a mutex and offers
//! [`Manager::perform`], which derives an insert, update or delete from the
//! current value of a key and runs prepare and commit under one lock.

use parking_lot::Mutex;

use crate::backup::RestoreStats;
use crate::engine::Engine;
use crate::error::CoreResult;
use crate::intent::Intent;
use crate::record::Entry;
use crate::stats::EngineStats;
use crate::types::{Operation, Serial, TxnStatus};

/// Serializes access to a single engine.
#[derive(Debug, Default)]
pub struct Manager {
    engine: Mutex<Engine>,
}

impl Manager {
    /// Creates a manager around a fresh engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a manager around an existing engine.
    #[must_use]
    pub fn with_engine(engine: Engine) -> Self {
        Self {
            engine: Mutex::new(engine),
        }
    }

    /// Returns a copy of the current value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Entry> {
        self.engine.lock().get(key).cloned()
    }

    /// Runs `handler` on the current value of `key` and stores its result
    /// as transaction `name`.
    ///
    /// An empty result deletes the key; a non-empty one inserts or updates
    /// it. Returning empty for an absent key does nothing. If `name` was
    /// already committed the call succeeds without running the handler. A
    /// failed prepare records nothing and its error is returned as is.
    ///
    /// # Example
    ///
    /// ```
    /// use xastore_core::Manager;
    ///
    /// let manager = Manager::new();
    /// manager.perform("file1:user1", "user1", |_| "value1".to_string()).unwrap();
    /// manager
    ///     .perform("file2:user1", "user1", |old| format!("{}+", old.unwrap().data))
    ///     .unwrap();
    /// assert_eq!(manager.get("user1").unwrap().data, "value1+");
    /// ```
    pub fn perform<F>(&self, name: &str, key: &str, handler: F) -> CoreResult<Option<Serial>>
    where
        F: FnOnce(Option<&Entry>) -> String,
    {
        let mut engine = self.engine.lock();
        if engine.status(name) == TxnStatus::Commited {
            return Ok(engine.record(name).map(|record| record.serial));
        }

        let current = engine.get(key);
        let version = current.map_or(0, |entry| entry.version);
        let exists = current.is_some();
        let value = handler(current);

        let operation = match (exists, value.is_empty()) {
            (false, false) => Operation::Insert,
            (true, false) => Operation::Update,
            (true, true) => Operation::Delete,
            (false, true) => return Ok(None),
        };

        engine.prepare(Intent::new(name, operation, key, version, value))?;
        engine.commit(name).map(Some)
    }

    /// Returns the status of a transaction.
    #[must_use]
    pub fn status(&self, name: &str) -> TxnStatus {
        self.engine.lock().status(name)
    }

    /// Removes transactions by name prefix.
    pub fn trim(&self, name_prefix: &str) -> usize {
        self.engine.lock().trim(name_prefix)
    }

    /// Removes transactions that were never committed.
    pub fn trim_pending(&self) -> usize {
        self.engine.lock().trim_pending()
    }

    /// Serializes the engine state.
    pub fn backup(&self) -> CoreResult<Vec<u8>> {
        self.engine.lock().backup()
    }

    /// Replaces the engine state from a backup.
    pub fn restore(&self, data: &[u8]) -> CoreResult<RestoreStats> {
        self.engine.lock().restore(data)
    }

    /// Returns the engine counters.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        self.engine.lock().stats()
    }

    /// Runs `f` with exclusive access to the engine.
    pub fn with_engine_mut<R>(&self, f: impl FnOnce(&mut Engine) -> R) -> R {
        let mut engine = self.engine.lock();
        f(&mut engine)
    }

    /// Consumes the manager and returns the engine.
    #[must_use]
    pub fn into_inner(self) -> Engine {
        self.engine.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn create_update_delete() {
        let manager = Manager::new();

        manager.perform("file1:user1", "user1", |_| "value1".into()).unwrap();
        assert_eq!(manager.get("user1").unwrap().data, "value1");

        manager.perform("file2:user1", "user1", |_| "value2".into()).unwrap();
        assert_eq!(manager.get("user1"), Some(Entry::new(2, "value2")));

        manager.perform("file3:user1", "user1", |_| String::new()).unwrap();
        assert!(manager.get("user1").is_none());
    }

    #[test]
    fn empty_value_for_absent_key_is_noop() {
        let manager = Manager::new();
        assert_eq!(manager.perform("t1", "k", |_| String::new()).unwrap(), None);
        assert_eq!(manager.status("t1"), TxnStatus::Unknown);
    }

    #[test]
    fn committed_name_skips_handler() {
        let manager = Manager::new();
        let serial = manager.perform("t1", "k", |_| "a".into()).unwrap();
        assert_eq!(serial, Some(Serial::new(1)));

        let again = manager
            .perform("t1", "k", |_| panic!("handler must not run"))
            .unwrap();
        assert_eq!(again, Some(Serial::new(1)));
        assert_eq!(manager.get("k"), Some(Entry::new(1, "a")));
    }

    #[test]
    fn blocked_key_reports_conflict() {
        let manager = Manager::new();
        manager.with_engine_mut(|engine| {
            engine.prepare(Intent::insert("held", "k", "x")).unwrap();
        });

        let err = manager.perform("t1", "k", |_| "a".into()).unwrap_err();
        assert!(matches!(err, CoreError::Conflict { .. }));
        assert_eq!(manager.status("t1"), TxnStatus::Unknown);
        assert_eq!(manager.status("held"), TxnStatus::Prepare);
    }

    #[test]
    fn name_clash_leaves_other_transaction_alone() {
        let manager = Manager::new();
        manager.with_engine_mut(|engine| {
            engine.prepare(Intent::insert("shared", "a", "x")).unwrap();
        });

        let err = manager.perform("shared", "b", |_| "y".into()).unwrap_err();
        assert!(matches!(err, CoreError::Conflict { .. }));
        assert_eq!(manager.status("shared"), TxnStatus::Prepare);
        assert!(manager.get("b").is_none());
    }

    #[test]
    fn concurrent_increments_serialize() {
        let manager = Arc::new(Manager::new());
        manager.perform("init", "counter", |_| "0".into()).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let manager = Arc::clone(&manager);
                thread::spawn(move || {
                    for j in 0..25 {
                        manager
                            .perform(&format!("inc:{i}:{j}"), "counter", |old| {
                                let n: u64 = old.unwrap().data.parse().unwrap();
                                (n + 1).to_string()
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let entry = manager.get("counter").unwrap();
        assert_eq!(entry.data, "200");
        assert_eq!(entry.version, 201);
        assert_eq!(manager.stats().committed, 201);
    }
}
