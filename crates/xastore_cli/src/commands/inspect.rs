//! Inspect command implementation.

use std::fs;
use std::path::Path;

use serde::Serialize;
use xastore_core::{BackupManager, TxnRecord};

/// Snapshot inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Snapshot path.
    pub path: String,
    /// File size in bytes.
    pub size: usize,
    /// Format version.
    pub version: u16,
    /// Creation time in milliseconds since the Unix epoch.
    pub created_at: u64,
    /// Highest serial ever assigned.
    pub high_water: u64,
    /// Number of prepared transactions.
    pub prepared_count: usize,
    /// Number of committed transactions.
    pub committed_count: usize,
    /// Number of live keys.
    pub key_count: usize,
    /// Transaction records in serial order (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<RecordSummary>>,
}

/// One transaction record.
#[derive(Debug, Serialize)]
pub struct RecordSummary {
    /// Transaction name.
    pub name: String,
    /// Lifecycle status.
    pub status: String,
    /// Commit serial, 0 while prepared.
    pub serial: u64,
    /// Operation kind.
    pub operation: String,
    /// Business key.
    pub key: String,
    /// Expected version.
    pub expected_version: u64,
    /// Commit time, if committed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_timestamp: Option<u64>,
}

impl From<&TxnRecord> for RecordSummary {
    fn from(record: &TxnRecord) -> Self {
        Self {
            name: record.name().to_string(),
            status: record.status.to_string(),
            serial: record.serial.as_u64(),
            operation: record.intent.operation.to_string(),
            key: record.data_key().to_string(),
            expected_version: record.intent.expected_version,
            commit_timestamp: record.commit_timestamp,
        }
    }
}

/// Runs the inspect command.
pub fn run(path: &Path, show_records: bool, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No snapshot found at {:?}", path).into());
    }

    let data = fs::read(path)?;
    let result = inspect_bytes(&path.display().to_string(), &data, show_records)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Decodes a snapshot and summarizes its contents.
pub fn inspect_bytes(
    path: &str,
    data: &[u8],
    show_records: bool,
) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let snapshot = BackupManager::new().restore_from_backup(data)?;
    let metadata = snapshot.metadata;

    let committed_count = snapshot.changelog.iter().filter(|r| r.is_committed()).count();
    let records = show_records.then(|| {
        snapshot
            .changelog
            .iter()
            .map(RecordSummary::from)
            .collect::<Vec<_>>()
    });

    Ok(InspectResult {
        path: path.to_string(),
        size: metadata.size,
        version: metadata.version,
        created_at: metadata.created_at,
        high_water: metadata.high_water.as_u64(),
        prepared_count: snapshot.changelog.len() - committed_count,
        committed_count,
        key_count: snapshot.store.len(),
        records,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("Snapshot: {}", result.path);
    println!();
    println!("File:");
    println!("  Size:       {} bytes", result.size);
    println!("  Version:    {}", result.version);
    println!("  Created at: {}", result.created_at);
    println!();
    println!("Changelog:");
    println!("  Prepared:   {}", result.prepared_count);
    println!("  Committed:  {}", result.committed_count);
    println!("  High water: {}", result.high_water);
    println!();
    println!("Store:");
    println!("  Keys:       {}", result.key_count);

    if let Some(records) = &result.records {
        println!();
        println!("Records:");
        for record in records {
            println!(
                "  {:>6}  {:<9} {:<7} {} -> {} (v{})",
                record.serial,
                record.status,
                record.operation,
                record.name,
                record.key,
                record.expected_version
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xastore_core::{Engine, Intent};

    fn sample() -> Vec<u8> {
        let mut engine = Engine::new();
        engine.prepare(Intent::insert("t1", "a", "1")).unwrap();
        engine.commit("t1").unwrap();
        engine.prepare(Intent::insert("t2", "b", "2")).unwrap();
        engine.commit("t2").unwrap();
        engine.prepare(Intent::update("t3", "a", 1, "3")).unwrap();
        engine.backup().unwrap()
    }

    #[test]
    fn counts_records_and_keys() {
        let result = inspect_bytes("mem", &sample(), false).unwrap();
        assert_eq!(result.prepared_count, 1);
        assert_eq!(result.committed_count, 2);
        assert_eq!(result.key_count, 2);
        assert_eq!(result.high_water, 2);
        assert!(result.records.is_none());
    }

    #[test]
    fn lists_records_in_serial_order() {
        let result = inspect_bytes("mem", &sample(), true).unwrap();
        let records = result.records.unwrap();
        let serials: Vec<u64> = records.iter().map(|r| r.serial).collect();
        assert_eq!(serials, vec![0, 1, 2]);
        assert_eq!(records[0].name, "t3");
        assert_eq!(records[1].status, "commited");
    }

    #[test]
    fn json_omits_missing_records() {
        let result = inspect_bytes("mem", &sample(), false).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("records").is_none());
        assert_eq!(json["key_count"], 2);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(inspect_bytes("mem", b"garbage", false).is_err());
    }
}
