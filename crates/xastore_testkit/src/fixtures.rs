//! Test fixtures and engine helpers.
//!
//! Provides convenience functions for setting up test engines
//! and common test scenarios.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use xastore_core::{Config, CoreResult, Engine, Intent, ManualClock};

/// Start time of every test clock: 2024-01-01T00:00:00Z in milliseconds.
pub const TEST_EPOCH_MILLIS: u64 = 1_704_067_200_000;

/// An engine driven by a manual clock.
pub struct TestEngine {
    /// The engine instance.
    pub engine: Engine,
    /// Clock used for commit timestamps.
    pub clock: Arc<ManualClock>,
}

impl TestEngine {
    /// Creates an empty engine with default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates an empty engine with the given configuration.
    pub fn with_config(config: Config) -> Self {
        let clock = Arc::new(ManualClock::new(TEST_EPOCH_MILLIS));
        Self {
            engine: Engine::with_clock(config, clock.clone()),
            clock,
        }
    }

    /// Prepares and commits an intent in one step.
    pub fn apply(&mut self, intent: Intent) -> CoreResult<()> {
        let name = intent.name.clone();
        self.engine.prepare(intent)?;
        self.engine.commit(&name)?;
        Ok(())
    }
}

impl Default for TestEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestEngine {
    type Target = Engine;

    fn deref(&self) -> &Self::Target {
        &self.engine
    }
}

impl std::ops::DerefMut for TestEngine {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.engine
    }
}

/// Runs a test with a fresh engine.
///
/// # Example
///
/// ```rust
/// use xastore_testkit::with_test_engine;
/// use xastore_core::Intent;
///
/// with_test_engine(|engine| {
///     engine.prepare(Intent::insert("t1", "k", "v")).unwrap();
///     engine.commit("t1").unwrap();
///     assert_eq!(engine.get("k").unwrap().version, 1);
/// });
/// ```
pub fn with_test_engine<F, R>(f: F) -> R
where
    F: FnOnce(&mut TestEngine) -> R,
{
    let mut engine = TestEngine::new();
    f(&mut engine)
}

/// A backup written to a temporary directory.
pub struct SnapshotFile {
    path: PathBuf,
    _temp_dir: TempDir,
}

impl SnapshotFile {
    /// Writes a backup of `engine` to a fresh temporary file.
    pub fn write(engine: &Engine) -> CoreResult<Self> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("snapshot.xakv");
        fs::write(&path, engine.backup()?)?;
        Ok(Self {
            path,
            _temp_dir: temp_dir,
        })
    }

    /// Path of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Restores the file's contents into `engine`.
    pub fn restore_into(&self, engine: &mut Engine) -> CoreResult<()> {
        let data = fs::read(&self.path)?;
        engine.restore(&data)?;
        Ok(())
    }
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Creates an engine with `count` committed keys `key0..` at version 1.
    pub fn committed_keys(count: usize) -> TestEngine {
        let mut engine = TestEngine::new();
        for i in 0..count {
            engine
                .apply(Intent::insert(
                    format!("seed:{i}"),
                    format!("key{i}"),
                    format!("value{i}"),
                ))
                .expect("Failed to seed key");
        }
        engine
    }

    /// Creates an engine holding committed, updated, deleted and pending
    /// transactions across two name prefixes.
    pub fn mixed_history() -> TestEngine {
        let mut engine = TestEngine::new();
        engine
            .apply(Intent::insert("import1:alice", "alice", "a1"))
            .expect("insert alice");
        engine.clock.advance(1_000);
        engine
            .apply(Intent::insert("import1:bob", "bob", "b1"))
            .expect("insert bob");
        engine.clock.advance(1_000);
        engine
            .apply(Intent::update("import2:alice", "alice", 1, "a2"))
            .expect("update alice");
        engine.clock.advance(1_000);
        engine
            .apply(Intent::delete("import2:bob", "bob", 1))
            .expect("delete bob");
        engine
            .prepare(Intent::insert("import3:carol", "carol", "c1"))
            .expect("prepare carol");
        engine
            .prepare(Intent::update("import3:alice", "alice", 2, "a3"))
            .expect("prepare alice");
        engine
    }
}
