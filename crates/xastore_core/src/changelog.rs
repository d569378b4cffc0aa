//! Multi-indexed journal of transaction records.
//!
//! The changelog keeps one primary table ordered by transaction name and two
//! auxiliary indexes:
//!
//! - `by_serial`: `(serial, name)` pairs in commit order. Records that were
//!   never committed all sit at [`Serial::ZERO`].
//! - `by_data_key`: `(status, business key)` to the set of names with that
//!   status on that key. This is how `prepare` finds an in-flight
//!   transaction for a key.
//!
//! Only [`Changelog::insert`], [`Changelog::mark_committed`] and
//! [`Changelog::remove`] touch the tables, and each updates all three
//! together.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{CoreError, CoreResult};
use crate::record::TxnRecord;
use crate::types::{Serial, TxnStatus};

type DataKeyIndex = BTreeMap<(TxnStatus, String), BTreeSet<String>>;

/// Journal of live transaction records.
#[derive(Debug, Default, Clone)]
pub struct Changelog {
    records: BTreeMap<String, TxnRecord>,
    by_serial: BTreeSet<(Serial, String)>,
    by_data_key: DataKeyIndex,
    /// Highest serial ever assigned. Survives trimming so serials are
    /// never handed out twice.
    high_water: Serial,
}

impl Changelog {
    /// Creates an empty changelog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a changelog from decoded records.
    ///
    /// Fails if names repeat, a key has two prepared records, or a record's
    /// serial disagrees with its status.
    pub fn from_records(
        records: impl IntoIterator<Item = TxnRecord>,
        high_water: Serial,
    ) -> CoreResult<Self> {
        if high_water == Serial::MAX {
            return Err(CoreError::invalid_format("high-water serial out of range"));
        }
        let mut log = Self {
            high_water,
            ..Self::default()
        };
        let mut committed_serials = BTreeSet::new();

        for record in records {
            match record.status {
                TxnStatus::Unknown => {
                    return Err(CoreError::invalid_format(format!(
                        "record {} has status unknown",
                        record.name()
                    )));
                }
                TxnStatus::Prepare if !record.serial.is_zero() => {
                    return Err(CoreError::invalid_format(format!(
                        "prepared record {} carries {}",
                        record.name(),
                        record.serial
                    )));
                }
                _ if record.serial == Serial::MAX => {
                    return Err(CoreError::invalid_format(format!(
                        "record {} carries a reserved serial",
                        record.name()
                    )));
                }
                TxnStatus::Commited if record.serial.is_zero() => {
                    return Err(CoreError::invalid_format(format!(
                        "committed record {} has no serial",
                        record.name()
                    )));
                }
                TxnStatus::Commited if !committed_serials.insert(record.serial) => {
                    return Err(CoreError::invalid_format(format!(
                        "{} assigned twice",
                        record.serial
                    )));
                }
                _ => {}
            }
            if record.status == TxnStatus::Prepare {
                if let Some(other) = log.prepared_for_key(record.data_key()) {
                    return Err(CoreError::invalid_format(format!(
                        "key {} prepared by both {} and {}",
                        record.data_key(),
                        other.name(),
                        record.name()
                    )));
                }
            }
            if log.records.contains_key(record.name()) {
                return Err(CoreError::invalid_format(format!(
                    "duplicate transaction name {}",
                    record.name()
                )));
            }
            log.insert(record)?;
        }

        log.high_water = log.high_water.max(log.max_serial());
        Ok(log)
    }

    /// Looks up a record by transaction name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TxnRecord> {
        self.records.get(name)
    }

    /// Returns true if a record with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    /// Appends a record. Names are unique.
    pub fn insert(&mut self, record: TxnRecord) -> CoreResult<()> {
        if self.records.contains_key(record.name()) {
            return Err(CoreError::conflict(format!(
                "transaction name {} already in changelog",
                record.name()
            )));
        }
        index(&mut self.by_serial, &mut self.by_data_key, &record);
        if record.serial > self.high_water {
            self.high_water = record.serial;
        }
        self.records.insert(record.name().to_string(), record);
        Ok(())
    }

    /// Flips a record to committed with the given serial and timestamp.
    pub fn mark_committed(
        &mut self,
        name: &str,
        serial: Serial,
        timestamp: u64,
    ) -> CoreResult<&TxnRecord> {
        let record = self
            .records
            .get_mut(name)
            .ok_or_else(|| CoreError::not_found(format!("transaction {name}")))?;

        unindex(&mut self.by_serial, &mut self.by_data_key, record);
        record.serial = serial;
        record.status = TxnStatus::Commited;
        record.commit_timestamp = Some(timestamp);
        index(&mut self.by_serial, &mut self.by_data_key, record);

        if serial > self.high_water {
            self.high_water = serial;
        }
        Ok(record)
    }

    /// Removes a record by name.
    pub fn remove(&mut self, name: &str) -> Option<TxnRecord> {
        let record = self.records.remove(name)?;
        unindex(&mut self.by_serial, &mut self.by_data_key, &record);
        Some(record)
    }

    /// Returns the prepared record targeting `key`, if any.
    #[must_use]
    pub fn prepared_for_key(&self, key: &str) -> Option<&TxnRecord> {
        self.by_data_key
            .get(&(TxnStatus::Prepare, key.to_string()))
            .and_then(|names| names.iter().next())
            .and_then(|name| self.records.get(name))
    }

    /// Names of every record at `status`, ordered by name.
    #[must_use]
    pub fn names_with_status(&self, status: TxnStatus) -> Vec<String> {
        let names: BTreeSet<&String> = self
            .by_data_key
            .range((status, String::new())..)
            .take_while(|((slot_status, _), _)| *slot_status == status)
            .flat_map(|(_, names)| names)
            .collect();
        names.into_iter().cloned().collect()
    }

    /// Largest serial currently present, or zero.
    #[must_use]
    pub fn max_serial(&self) -> Serial {
        self.by_serial
            .iter()
            .next_back()
            .map_or(Serial::ZERO, |(serial, _)| *serial)
    }

    /// Highest serial ever assigned by this changelog.
    #[must_use]
    pub fn high_water(&self) -> Serial {
        self.high_water
    }

    /// Serial the next commit will receive.
    ///
    /// Returns [`Serial::MAX`] once the serial space is used up; `commit`
    /// refuses to assign it.
    #[must_use]
    pub fn next_serial(&self) -> Serial {
        self.high_water
            .max(self.max_serial())
            .checked_next()
            .unwrap_or(Serial::MAX)
    }

    /// Removes every record whose name starts with `prefix`.
    ///
    /// Returns the removed names.
    pub fn remove_prefix(&mut self, prefix: &str) -> Vec<String> {
        let names: Vec<String> = self
            .records
            .range(prefix.to_string()..)
            .map(|(name, _)| name)
            .take_while(|name| name.starts_with(prefix))
            .cloned()
            .collect();
        for name in &names {
            self.remove(name);
        }
        names
    }

    /// Removes every record that was never committed.
    ///
    /// Returns the removed names.
    pub fn remove_pending(&mut self) -> Vec<String> {
        let names: Vec<String> = self
            .by_serial
            .iter()
            .take_while(|(serial, _)| serial.is_zero())
            .map(|(_, name)| name.clone())
            .collect();
        for name in &names {
            self.remove(name);
        }
        names
    }

    /// Iterates records in serial order. Uncommitted records come first.
    pub fn iter(&self) -> impl Iterator<Item = &TxnRecord> {
        self.by_serial
            .iter()
            .filter_map(|(_, name)| self.records.get(name))
    }

    /// Iterates records in name order.
    pub fn iter_by_name(&self) -> impl Iterator<Item = &TxnRecord> {
        self.records.values()
    }

    /// Number of live records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if there are no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drops every record and resets the serial high-water mark.
    pub fn clear(&mut self) {
        self.records.clear();
        self.by_serial.clear();
        self.by_data_key.clear();
        self.high_water = Serial::ZERO;
    }
}

fn index(by_serial: &mut BTreeSet<(Serial, String)>, by_data_key: &mut DataKeyIndex, record: &TxnRecord) {
    by_serial.insert((record.serial, record.name().to_string()));
    by_data_key
        .entry((record.status, record.data_key().to_string()))
        .or_default()
        .insert(record.name().to_string());
}

fn unindex(
    by_serial: &mut BTreeSet<(Serial, String)>,
    by_data_key: &mut DataKeyIndex,
    record: &TxnRecord,
) {
    by_serial.remove(&(record.serial, record.name().to_string()));
    let slot = (record.status, record.data_key().to_string());
    if let Some(names) = by_data_key.get_mut(&slot) {
        names.remove(record.name());
        if names.is_empty() {
            by_data_key.remove(&slot);
        }
    }
}
