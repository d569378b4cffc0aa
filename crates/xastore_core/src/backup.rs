//! Full-snapshot backup and restore.
//!
//! A backup captures the changelog and the materialized store together so
//! that restoring it reproduces every observable query result.
//!
//! ## Backup Format
//!
//! ```text
//! | magic (4) | version (2) | created_at (8) | high_water (8) | record_count (4) | entry_count (4) |
//! | CBOR payload { records, entries } | crc32 (4) |
//! ```
//!
//! All integers are little-endian. The checksum covers every byte before it.
//! Records are written in name order and entries in key order, so equal
//! state always produces an equal payload.
//!
//! ## Usage
//!
//! ```
//! use xastore_core::{BackupManager, Changelog, MaterializedStore};
//!
//! let manager = BackupManager::new();
//! let data = manager
//!     .create_backup(&Changelog::new(), &MaterializedStore::new(), 0)
//!     .unwrap();
//! let snapshot = manager.restore_from_backup(&data).unwrap();
//! assert!(snapshot.changelog.is_empty());
//! ```

use serde::{Deserialize, Serialize};

use crate::changelog::Changelog;
use crate::error::{CoreError, CoreResult};
use crate::record::{Entry, TxnRecord};
use crate::store::MaterializedStore;
use crate::types::Serial;

/// Magic bytes for backup blobs.
pub const BACKUP_MAGIC: [u8; 4] = *b"XAKV";
/// Current backup format version.
pub const BACKUP_VERSION: u16 = 1;
/// Header size (magic + version + created_at + high_water + record_count + entry_count).
const HEADER_SIZE: usize = 4 + 2 + 8 + 8 + 4 + 4;
/// Footer size (checksum).
const FOOTER_SIZE: usize = 4;

fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&data[offset..offset + 4]);
    u32::from_le_bytes(buf)
}

fn read_u64(data: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(buf)
}

/// Header fields of a backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupMetadata {
    /// Format version.
    pub version: u16,
    /// When the backup was created (Unix timestamp in milliseconds).
    pub created_at: u64,
    /// Highest serial the changelog had ever assigned.
    pub high_water: Serial,
    /// Number of changelog records.
    pub record_count: u32,
    /// Number of materialized entries.
    pub entry_count: u32,
    /// Size of the backup in bytes.
    pub size: usize,
}

/// Decoded contents of a backup.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Header fields.
    pub metadata: BackupMetadata,
    /// Rebuilt changelog with all indexes.
    pub changelog: Changelog,
    /// Rebuilt materialized store.
    pub store: MaterializedStore,
}

/// Summary returned after an engine restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreStats {
    /// Changelog records loaded.
    pub records_restored: u64,
    /// Materialized entries loaded.
    pub entries_restored: u64,
    /// Creation time of the backup.
    pub backup_timestamp: u64,
    /// Serial high-water mark carried by the backup.
    pub high_water: Serial,
}

#[derive(Serialize)]
struct PayloadRef<'a> {
    records: Vec<&'a TxnRecord>,
    entries: Vec<(&'a String, &'a Entry)>,
}

#[derive(Deserialize)]
struct Payload {
    records: Vec<TxnRecord>,
    entries: Vec<(String, Entry)>,
}

/// Encodes and decodes backup blobs.
#[derive(Debug, Default, Clone, Copy)]
pub struct BackupManager;

impl BackupManager {
    /// Creates a backup manager.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Serializes the changelog and store into one blob.
    pub fn create_backup(
        &self,
        changelog: &Changelog,
        store: &MaterializedStore,
        created_at: u64,
    ) -> CoreResult<Vec<u8>> {
        let payload = PayloadRef {
            records: changelog.iter_by_name().collect(),
            entries: store.iter_sorted().collect(),
        };
        let record_count = u32::try_from(payload.records.len())
            .map_err(|_| CoreError::codec("too many records for one backup"))?;
        let entry_count = u32::try_from(payload.entries.len())
            .map_err(|_| CoreError::codec("too many entries for one backup"))?;

        let mut data = Vec::with_capacity(HEADER_SIZE + FOOTER_SIZE + 64 * payload.records.len());

        // Write header
        data.extend_from_slice(&BACKUP_MAGIC);
        data.extend_from_slice(&BACKUP_VERSION.to_le_bytes());
        data.extend_from_slice(&created_at.to_le_bytes());
        data.extend_from_slice(&changelog.high_water().as_u64().to_le_bytes());
        data.extend_from_slice(&record_count.to_le_bytes());
        data.extend_from_slice(&entry_count.to_le_bytes());

        // Write payload
        ciborium::into_writer(&payload, &mut data)
            .map_err(|e| CoreError::codec(e.to_string()))?;

        // Write checksum
        let checksum = crc32fast::hash(&data);
        data.extend_from_slice(&checksum.to_le_bytes());

        Ok(data)
    }

    /// Parses a blob back into a changelog and store.
    ///
    /// Nothing is returned unless the whole blob is valid.
    pub fn restore_from_backup(&self, data: &[u8]) -> CoreResult<Snapshot> {
        let metadata = self.read_metadata(data)?;

        // Verify checksum
        let checksum_offset = data.len() - FOOTER_SIZE;
        let stored_checksum = read_u32(data, checksum_offset);
        let computed_checksum = crc32fast::hash(&data[..checksum_offset]);
        if stored_checksum != computed_checksum {
            return Err(CoreError::ChecksumMismatch {
                expected: stored_checksum,
                actual: computed_checksum,
            });
        }

        let payload: Payload = ciborium::from_reader(&data[HEADER_SIZE..checksum_offset])
            .map_err(|e| CoreError::codec(e.to_string()))?;

        if payload.records.len() != metadata.record_count as usize {
            return Err(CoreError::invalid_format(format!(
                "record count mismatch: expected {}, got {}",
                metadata.record_count,
                payload.records.len()
            )));
        }
        if payload.entries.len() != metadata.entry_count as usize {
            return Err(CoreError::invalid_format(format!(
                "entry count mismatch: expected {}, got {}",
                metadata.entry_count,
                payload.entries.len()
            )));
        }

        let changelog = Changelog::from_records(payload.records, metadata.high_water)?;
        let store = MaterializedStore::from_entries(payload.entries)?;

        Ok(Snapshot {
            metadata,
            changelog,
            store,
        })
    }

    /// Reads backup metadata without decoding the payload.
    pub fn read_metadata(&self, data: &[u8]) -> CoreResult<BackupMetadata> {
        if data.len() < HEADER_SIZE + FOOTER_SIZE {
            return Err(CoreError::invalid_format("backup data too small"));
        }

        if data[0..4] != BACKUP_MAGIC {
            return Err(CoreError::invalid_format("invalid backup magic"));
        }

        let version = read_u16(data, 4);
        if version != BACKUP_VERSION {
            return Err(CoreError::invalid_format(format!(
                "unsupported backup version: {version}"
            )));
        }

        Ok(BackupMetadata {
            version,
            created_at: read_u64(data, 6),
            high_water: Serial::new(read_u64(data, 14)),
            record_count: read_u32(data, 22),
            entry_count: read_u32(data, 26),
            size: data.len(),
        })
    }

    /// Checks framing and checksum without decoding the payload.
    #[must_use]
    pub fn validate_backup(&self, data: &[u8]) -> bool {
        if self.read_metadata(data).is_err() {
            return false;
        }
        let checksum_offset = data.len() - FOOTER_SIZE;
        read_u32(data, checksum_offset) == crc32fast::hash(&data[..checksum_offset])
    }
}
