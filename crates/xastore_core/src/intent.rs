//! Transaction intents.

use serde::{Deserialize, Serialize};

use crate::types::Operation;

/// An immutable description of one single-key mutation.
///
/// The `name` is the transaction identity chosen by the caller and must be
/// globally unique. Two intents are equal only if all five fields match,
/// which is what makes re-preparing under the same name idempotent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Intent {
    /// Caller-chosen transaction name.
    pub name: String,
    /// Mutation kind.
    pub operation: Operation,
    /// Business key the mutation targets.
    pub key: String,
    /// Version the key must currently have (0 for inserts).
    pub expected_version: u64,
    /// New value (empty for deletes).
    pub value: String,
}

impl Intent {
    /// Creates an intent with every field given explicitly.
    pub fn new(
        name: impl Into<String>,
        operation: Operation,
        key: impl Into<String>,
        expected_version: u64,
        value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            operation,
            key: key.into(),
            expected_version,
            value: value.into(),
        }
    }

    /// Creates an insert of a new key.
    pub fn insert(name: impl Into<String>, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, Operation::Insert, key, 0, value)
    }

    /// Creates an update of a key currently at `expected_version`.
    pub fn update(
        name: impl Into<String>,
        key: impl Into<String>,
        expected_version: u64,
        value: impl Into<String>,
    ) -> Self {
        Self::new(name, Operation::Update, key, expected_version, value)
    }

    /// Creates a delete of a key currently at `expected_version`.
    pub fn delete(name: impl Into<String>, key: impl Into<String>, expected_version: u64) -> Self {
        Self::new(name, Operation::Delete, key, expected_version, String::new())
    }

    /// Version the key will have once this intent is committed.
    ///
    /// `None` when that would reach the reserved version `u64::MAX`.
    #[must_use]
    pub const fn next_version(&self) -> Option<u64> {
        match self.expected_version.checked_add(1) {
            Some(version) if version < u64::MAX => Some(version),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_fill_fields() {
        let insert = Intent::insert("t1", "user1", "v");
        assert_eq!(insert.operation, Operation::Insert);
        assert_eq!(insert.expected_version, 0);

        let delete = Intent::delete("t2", "user1", 3);
        assert_eq!(delete.operation, Operation::Delete);
        assert!(delete.value.is_empty());
        assert_eq!(delete.next_version(), Some(4));
        assert_eq!(Intent::update("t", "k", u64::MAX - 1, "v").next_version(), None);
        assert_eq!(Intent::update("t", "k", u64::MAX, "v").next_version(), None);
    }

    #[test]
    fn equality_covers_every_field() {
        let a = Intent::insert("t1", "user1", "v");
        assert_eq!(a, Intent::insert("t1", "user1", "v"));
        assert_ne!(a, Intent::insert("t1", "user1a", "v"));
        assert_ne!(a, Intent::insert("t1", "user1", "w"));
        assert_ne!(a, Intent::update("t1", "user1", 0, "v"));
    }

    #[test]
    fn default_is_idle() {
        assert_eq!(Intent::default().operation, Operation::Idle);
    }
}
