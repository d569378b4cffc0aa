//! Materialized key-value state.

use std::collections::HashMap;

use crate::error::{CoreError, CoreResult};
use crate::intent::Intent;
use crate::record::Entry;
use crate::types::Operation;

/// Current value of every business key, as produced by committed intents.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MaterializedStore {
    entries: HashMap<String, Entry>,
}

impl MaterializedStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from decoded entries.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, Entry)>) -> CoreResult<Self> {
        let mut store = Self::new();
        for (key, entry) in entries {
            if entry.version == u64::MAX {
                return Err(CoreError::invalid_format(format!(
                    "key {key} carries a reserved version"
                )));
            }
            if store.entries.insert(key.clone(), entry).is_some() {
                return Err(CoreError::invalid_format(format!("duplicate key {key}")));
            }
        }
        Ok(store)
    }

    /// Returns the entry for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key)
    }

    /// Applies a committed intent.
    ///
    /// Inserts and updates set the entry to `expected_version + 1`; deletes
    /// remove it. The entry must still be in the state `prepare` validated,
    /// otherwise nothing changes and `Inconsistent` is returned.
    pub fn apply(&mut self, intent: &Intent) -> CoreResult<()> {
        let current = self.entries.get(&intent.key);
        match intent.operation {
            Operation::Insert => {
                if current.is_some() {
                    return Err(CoreError::inconsistent(format!(
                        "insert of existing key {}",
                        intent.key
                    )));
                }
            }
            Operation::Update | Operation::Delete => match current {
                None => {
                    return Err(CoreError::inconsistent(format!(
                        "{} of missing key {}",
                        intent.operation, intent.key
                    )));
                }
                Some(entry) if entry.version != intent.expected_version => {
                    return Err(CoreError::inconsistent(format!(
                        "key {} moved to version {} after prepare at {}",
                        intent.key, entry.version, intent.expected_version
                    )));
                }
                Some(_) => {}
            },
            Operation::Idle => {
                return Err(CoreError::inconsistent("idle intent reached commit"));
            }
        }

        match intent.operation {
            Operation::Insert | Operation::Update => {
                let version = intent.next_version().ok_or_else(|| {
                    CoreError::inconsistent(format!("key {} has no version left", intent.key))
                })?;
                self.entries
                    .insert(intent.key.clone(), Entry::new(version, intent.value.clone()));
            }
            Operation::Delete => {
                self.entries.remove(&intent.key);
            }
            Operation::Idle => {}
        }
        Ok(())
    }

    /// Iterates entries sorted by key.
    pub fn iter_sorted(&self) -> impl Iterator<Item = (&String, &Entry)> {
        let mut entries: Vec<_> = self.entries.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter()
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no keys exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every key.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
