//! Property-based test generators using proptest.
//!
//! Names and keys are drawn from small pools so that random sequences
//! collide often: re-prepares, busy keys, stale versions and commits of
//! unknown names all show up in a few dozen steps.

use proptest::prelude::*;
use xastore_core::{Intent, Operation};

/// Number of distinct transaction names generated.
pub const NAME_POOL: usize = 12;
/// Number of distinct business keys generated.
pub const KEY_POOL: usize = 4;

/// Every transaction name the generators can produce.
pub fn all_names() -> Vec<String> {
    (0..NAME_POOL).map(|i| format!("f{}:t{}", i % 3, i)).collect()
}

/// Every business key the generators can produce.
pub fn all_keys() -> Vec<String> {
    (0..KEY_POOL).map(|i| format!("user{i}")).collect()
}

/// Strategy for transaction names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    (0..NAME_POOL).prop_map(|i| format!("f{}:t{}", i % 3, i))
}

/// Strategy for business keys.
pub fn key_strategy() -> impl Strategy<Value = String> {
    (0..KEY_POOL).prop_map(|i| format!("user{i}"))
}

/// Strategy for name prefixes used by `trim`.
pub fn prefix_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("f0:".to_string()),
        Just("f1:".to_string()),
        Just("f2:t1".to_string()),
        Just("nomatch".to_string()),
    ]
}

/// Strategy for operations, weighted towards the valid ones.
pub fn operation_strategy() -> impl Strategy<Value = Operation> {
    prop_oneof![
        4 => Just(Operation::Insert),
        4 => Just(Operation::Update),
        2 => Just(Operation::Delete),
        1 => Just(Operation::Idle),
    ]
}

/// Strategy for arbitrary intents, valid or not.
pub fn intent_strategy() -> impl Strategy<Value = Intent> {
    (
        name_strategy(),
        operation_strategy(),
        key_strategy(),
        0u64..4,
        prop::string::string_regex("[a-z]{0,6}").expect("Invalid regex"),
    )
        .prop_map(|(name, operation, key, expected_version, value)| {
            let value = if operation == Operation::Delete && value.len() > 4 {
                String::new()
            } else {
                value
            };
            Intent::new(name, operation, key, expected_version, value)
        })
}

/// A single engine command.
#[derive(Debug, Clone)]
pub enum Command {
    /// Prepare an intent.
    Prepare(Intent),
    /// Commit a transaction by name.
    Commit(String),
    /// Roll back a transaction by name.
    Rollback(String),
    /// Remove transactions by name prefix.
    Trim(String),
    /// Remove transactions that were never committed.
    TrimPending,
    /// Backup, clear and restore.
    BackupRestore,
}

/// Strategy for a single command.
pub fn command_strategy() -> impl Strategy<Value = Command> {
    prop_oneof![
        6 => intent_strategy().prop_map(Command::Prepare),
        5 => name_strategy().prop_map(Command::Commit),
        2 => name_strategy().prop_map(Command::Rollback),
        1 => prefix_strategy().prop_map(Command::Trim),
        1 => Just(Command::TrimPending),
        1 => Just(Command::BackupRestore),
    ]
}

/// Strategy for a sequence of commands.
pub fn command_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<Command>> {
    prop::collection::vec(command_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
