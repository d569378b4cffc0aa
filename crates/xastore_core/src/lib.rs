//! # xastore core
//!
//! A small transactional key-value engine.
//!
//! This crate provides:
//! - Named transactions with prepare/commit/rollback
//! - Optimistic, version-checked mutations on single keys
//! - A changelog indexed by name, by `(status, key)` and by commit serial
//! - Full-snapshot backup and restore
//! - A mutex-guarded [`Manager`] with a read-modify-write helper
//!
//! ## Usage
//!
//! ```
//! use xastore_core::{Engine, Intent, ResultCode, TxnStatus};
//!
//! let mut engine = Engine::new();
//! engine.prepare(Intent::insert("file1:user1", "user1", "value1")).unwrap();
//!
//! // a second transaction on the same key has to wait
//! let busy = engine.prepare(Intent::insert("file2:user1", "user1", "other"));
//! assert_eq!(ResultCode::of(&busy), ResultCode::Conflict);
//!
//! engine.commit("file1:user1").unwrap();
//! assert_eq!(engine.get("user1").unwrap().version, 1);
//!
//! let blob = engine.backup().unwrap();
//! engine.clear();
//! engine.restore(&blob).unwrap();
//! assert_eq!(engine.status("file1:user1"), TxnStatus::Commited);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backup;
mod changelog;
mod clock;
mod config;
mod engine;
mod error;
mod intent;
mod manager;
mod record;
mod stats;
mod store;
mod types;

pub use backup::{BackupManager, BackupMetadata, RestoreStats, Snapshot, BACKUP_MAGIC, BACKUP_VERSION};
pub use changelog::Changelog;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use engine::Engine;
pub use error::{CoreError, CoreResult};
pub use intent::Intent;
pub use manager::Manager;
pub use record::{Entry, TxnRecord};
pub use stats::EngineStats;
pub use store::MaterializedStore;
pub use types::{Operation, ResultCode, Serial, TxnStatus};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
