//! The transactional engine.
//!
//! [`Engine`] composes the [`Changelog`] and the [`MaterializedStore`] and is
//! the only place where either is mutated. It is a deterministic state
//! machine driven one call at a time: it holds no locks, so callers that
//! share an engine must serialize access themselves (see
//! [`crate::Manager`]).
//!
//! ## Lifecycle
//!
//! ```text
//! prepare(intent) ──> Prepare ──commit(name)──> Commited ──trim(prefix)──> gone
//!                        │
//!                        └──rollback(name) / trim_pending()──> gone
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::{debug, debug_span, info, warn};

use crate::backup::{BackupManager, RestoreStats};
use crate::changelog::Changelog;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::intent::Intent;
use crate::record::{Entry, TxnRecord};
use crate::stats::EngineStats;
use crate::store::MaterializedStore;
use crate::types::{Operation, ResultCode, Serial, TxnStatus};

/// Transactional key-value engine.
///
/// # Example
///
/// ```
/// use xastore_core::{Engine, Intent, TxnStatus};
///
/// let mut engine = Engine::new();
/// engine.prepare(Intent::insert("file1:user1", "user1", "value1")).unwrap();
/// assert!(engine.get("user1").is_none());
///
/// engine.commit("file1:user1").unwrap();
/// assert_eq!(engine.status("file1:user1"), TxnStatus::Commited);
/// assert_eq!(engine.get("user1").unwrap().data, "value1");
/// ```
pub struct Engine {
    config: Config,
    clock: Arc<dyn Clock>,
    changelog: Changelog,
    store: MaterializedStore,
    stats: EngineStats,
}

impl Engine {
    /// Creates an empty engine with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates an empty engine with the given configuration.
    #[must_use]
    pub fn with_config(config: Config) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates an empty engine that stamps commits using `clock`.
    #[must_use]
    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            changelog: Changelog::new(),
            store: MaterializedStore::new(),
            stats: EngineStats::default(),
        }
    }

    /// Returns the current value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.store.get(key)
    }

    /// Validates an intent and records it as prepared.
    ///
    /// Re-preparing an identical intent under a name that is still prepared
    /// succeeds without adding a record. A name that is already committed, or
    /// that was prepared with a different intent, conflicts. Only one
    /// prepared transaction may target a key at a time.
    pub fn prepare(&mut self, intent: Intent) -> CoreResult<()> {
        let span = debug_span!("prepare", name = %intent.name);
        let _enter = span.enter();
        let result = self.prepare_inner(intent);
        self.finish(result)
    }

    fn prepare_inner(&mut self, intent: Intent) -> CoreResult<()> {
        if let Some(existing) = self.changelog.get(&intent.name) {
            if existing.intent != intent {
                warn!("attempt to reuse transaction name");
                return Err(CoreError::conflict(format!(
                    "transaction name {} already used for another intent",
                    intent.name
                )));
            }
            if existing.is_committed() {
                info!("already commited");
                return Err(CoreError::conflict(format!(
                    "transaction {} already commited",
                    intent.name
                )));
            }
            return Ok(());
        }

        if let Some(other) = self.changelog.prepared_for_key(&intent.key) {
            warn!(
                key = %intent.key,
                other = other.name(),
                "key already has a prepared transaction"
            );
            return Err(CoreError::conflict(format!(
                "key {} is held by prepared transaction {}",
                intent.key,
                other.name()
            )));
        }

        self.validate(&intent)?;

        debug!(operation = %intent.operation, key = %intent.key, "prepare");
        self.changelog.insert(TxnRecord::prepared(intent))?;
        self.stats.prepared += 1;
        Ok(())
    }

    /// Checks an intent against the materialized store and configured limits.
    pub fn validate(&self, intent: &Intent) -> CoreResult<()> {
        let current = self.store.get(&intent.key);
        match intent.operation {
            Operation::Insert => {
                if current.is_some() {
                    warn!(key = %intent.key, "key already exists");
                    return Err(CoreError::conflict(format!(
                        "key {} already exists",
                        intent.key
                    )));
                }
                if intent.expected_version != 0 {
                    warn!(key = %intent.key, "version must be 0");
                    return Err(CoreError::invalid_argument(format!(
                        "insert expects version 0, got {}",
                        intent.expected_version
                    )));
                }
            }
            Operation::Update | Operation::Delete => {
                let Some(entry) = current else {
                    warn!(key = %intent.key, "not found");
                    return Err(CoreError::not_found(format!("key {}", intent.key)));
                };
                if entry.version != intent.expected_version {
                    warn!(
                        key = %intent.key,
                        stored = entry.version,
                        expected = intent.expected_version,
                        "version mismatch"
                    );
                    return Err(CoreError::conflict(format!(
                        "key {} is at version {}, expected {}",
                        intent.key, entry.version, intent.expected_version
                    )));
                }
                if intent.operation == Operation::Update && intent.next_version().is_none() {
                    warn!(key = %intent.key, "version exhausted");
                    return Err(CoreError::invalid_argument(format!(
                        "key {} cannot move past version {}",
                        intent.key, intent.expected_version
                    )));
                }
                if intent.operation == Operation::Delete && !intent.value.is_empty() {
                    warn!(key = %intent.key, "value must be empty");
                    return Err(CoreError::invalid_argument("delete must not carry a value"));
                }
            }
            Operation::Idle => {
                return Err(CoreError::invalid_argument("operation is idle"));
            }
        }
        self.check_limits(intent)
    }

    fn check_limits(&self, intent: &Intent) -> CoreResult<()> {
        if intent.name.is_empty() {
            return Err(CoreError::invalid_argument("transaction name is empty"));
        }
        if intent.key.is_empty() {
            return Err(CoreError::invalid_argument("key is empty"));
        }
        if intent.name.len() > self.config.max_name_len {
            return Err(CoreError::invalid_argument(format!(
                "transaction name is {} bytes, limit {}",
                intent.name.len(),
                self.config.max_name_len
            )));
        }
        if intent.key.len() > self.config.max_key_len {
            return Err(CoreError::invalid_argument(format!(
                "key is {} bytes, limit {}",
                intent.key.len(),
                self.config.max_key_len
            )));
        }
        if intent.value.len() > self.config.max_value_len {
            return Err(CoreError::invalid_argument(format!(
                "value is {} bytes, limit {}",
                intent.value.len(),
                self.config.max_value_len
            )));
        }
        Ok(())
    }

    /// Removes a prepared transaction.
    pub fn rollback(&mut self, name: &str) -> CoreResult<()> {
        let span = debug_span!("rollback", name = %name);
        let _enter = span.enter();
        let result = self.rollback_inner(name);
        self.finish(result)
    }

    fn rollback_inner(&mut self, name: &str) -> CoreResult<()> {
        let Some(record) = self.changelog.get(name) else {
            warn!("not found");
            return Err(CoreError::not_found(format!("transaction {name}")));
        };
        if record.is_committed() {
            warn!("already commited");
            return Err(CoreError::conflict(format!(
                "transaction {name} already commited"
            )));
        }
        self.changelog.remove(name);
        self.stats.rolled_back += 1;
        info!("rollback");
        Ok(())
    }

    /// Applies a prepared transaction and assigns it the next serial.
    ///
    /// Committing an already committed transaction is a no-op that returns
    /// its existing serial.
    pub fn commit(&mut self, name: &str) -> CoreResult<Serial> {
        let span = debug_span!("commit", name = %name);
        let _enter = span.enter();
        let result = self.commit_inner(name);
        self.finish(result)
    }

    fn commit_inner(&mut self, name: &str) -> CoreResult<Serial> {
        let Some(record) = self.changelog.get(name) else {
            warn!("not found");
            return Err(CoreError::not_found(format!("transaction {name}")));
        };
        if record.is_committed() {
            info!(serial = record.serial.as_u64(), "already commited");
            return Ok(record.serial);
        }

        let serial = self.changelog.next_serial();
        if serial == Serial::MAX {
            warn!("serial space exhausted");
            return Err(CoreError::inconsistent("no serial left to assign"));
        }
        if let Err(err) = self.store.apply(&record.intent) {
            warn!(error = %err, "internal error");
            return Err(err);
        }

        let now = self.clock.now_millis();
        self.changelog
            .mark_committed(name, serial, now)
            .map_err(|err| CoreError::inconsistent(err.to_string()))?;
        self.stats.committed += 1;
        info!(serial = serial.as_u64(), "commited");
        Ok(serial)
    }

    /// Returns the status of a transaction, `Unknown` if absent.
    #[must_use]
    pub fn status(&self, name: &str) -> TxnStatus {
        self.changelog
            .get(name)
            .map_or(TxnStatus::Unknown, |record| record.status)
    }

    /// Names of every transaction at `status`, ordered by name.
    #[must_use]
    pub fn list(&self, status: TxnStatus) -> Vec<String> {
        self.changelog.names_with_status(status)
    }

    /// Removes every transaction whose name starts with `name_prefix`,
    /// regardless of status. Returns how many were removed.
    pub fn trim(&mut self, name_prefix: &str) -> usize {
        let span = debug_span!("trim", prefix = %name_prefix);
        let _enter = span.enter();
        let removed = self.changelog.remove_prefix(name_prefix);
        for name in &removed {
            debug!(name = %name, "transaction");
        }
        self.stats.trimmed += removed.len() as u64;
        removed.len()
    }

    /// Removes every transaction that was never committed. Returns how many
    /// were removed.
    pub fn trim_pending(&mut self) -> usize {
        let span = debug_span!("trim_pending");
        let _enter = span.enter();
        let removed = self.changelog.remove_pending();
        for name in &removed {
            debug!(name = %name, "transaction");
        }
        self.stats.trimmed += removed.len() as u64;
        removed.len()
    }

    /// Empties both the changelog and the materialized store.
    pub fn clear(&mut self) {
        self.changelog.clear();
        self.store.clear();
    }

    /// Serializes the changelog and the materialized store into one blob.
    pub fn backup(&self) -> CoreResult<Vec<u8>> {
        BackupManager::new().create_backup(&self.changelog, &self.store, self.clock.now_millis())
    }

    /// Replaces all state with the contents of a backup blob.
    ///
    /// The blob is fully decoded and checked before anything is replaced, so
    /// a failed restore leaves the engine untouched.
    pub fn restore(&mut self, data: &[u8]) -> CoreResult<RestoreStats> {
        let snapshot = BackupManager::new().restore_from_backup(data)?;

        let stats = RestoreStats {
            records_restored: snapshot.changelog.len() as u64,
            entries_restored: snapshot.store.len() as u64,
            backup_timestamp: snapshot.metadata.created_at,
            high_water: snapshot.changelog.high_water(),
        };
        self.changelog = snapshot.changelog;
        self.store = snapshot.store;
        self.stats.restores += 1;
        info!(
            records = stats.records_restored,
            entries = stats.entries_restored,
            "restored"
        );
        Ok(stats)
    }

    /// Serial the next commit will receive.
    #[must_use]
    pub fn next_serial(&self) -> Serial {
        self.changelog.next_serial()
    }

    /// Looks up a transaction record.
    #[must_use]
    pub fn record(&self, name: &str) -> Option<&TxnRecord> {
        self.changelog.get(name)
    }

    /// Iterates transaction records in serial order.
    pub fn records(&self) -> impl Iterator<Item = &TxnRecord> {
        self.changelog.iter()
    }

    /// Number of keys in the materialized store.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.store.len()
    }

    /// Returns the engine counters.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn finish<T>(&mut self, result: CoreResult<T>) -> CoreResult<T> {
        if result.is_err() {
            self.stats.record_failure(ResultCode::of(&result));
        }
        result
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("records", &self.changelog.len())
            .field("keys", &self.store.len())
            .field("next_serial", &self.changelog.next_serial())
            .finish_non_exhaustive()
    }
}
