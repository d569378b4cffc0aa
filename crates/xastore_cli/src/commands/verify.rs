//! Verify command implementation.

use std::fs;
use std::path::Path;

use xastore_core::BackupManager;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of checks run.
    pub checks_run: usize,
    /// List of errors found.
    pub errors: Vec<String>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn check(&mut self, label: &str, outcome: Result<(), String>) {
        self.checks_run += 1;
        match outcome {
            Ok(()) => println!("  {label}: ok"),
            Err(e) => {
                println!("  {label}: FAILED");
                self.errors.push(format!("{label}: {e}"));
            }
        }
    }
}

/// Runs the verify command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying snapshot at {:?}", path);
    println!();

    let data = fs::read(path)?;
    let result = verify_bytes(&data);

    println!();
    if result.is_ok() {
        println!("✓ Snapshot verification passed ({} checks)", result.checks_run);
        Ok(())
    } else {
        for error in &result.errors {
            println!("  {error}");
        }
        println!("✗ Snapshot verification failed");
        Err("Verification failed".into())
    }
}

/// Checks the header, the checksum and the decoded contents of a snapshot.
pub fn verify_bytes(data: &[u8]) -> VerifyResult {
    let manager = BackupManager::new();
    let mut result = VerifyResult::default();

    result.check(
        "header",
        manager.read_metadata(data).map(|_| ()).map_err(|e| e.to_string()),
    );
    if !result.is_ok() {
        return result;
    }

    result.check(
        "checksum",
        if manager.validate_backup(data) {
            Ok(())
        } else {
            Err("checksum does not match contents".to_string())
        },
    );
    if !result.is_ok() {
        return result;
    }

    result.check(
        "contents",
        manager
            .restore_from_backup(data)
            .map(|_| ())
            .map_err(|e| e.to_string()),
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use xastore_core::{Engine, Intent};

    fn sample() -> Vec<u8> {
        let mut engine = Engine::new();
        engine.prepare(Intent::insert("t1", "k", "v")).unwrap();
        engine.commit("t1").unwrap();
        engine.backup().unwrap()
    }

    #[test]
    fn valid_snapshot_passes() {
        let result = verify_bytes(&sample());
        assert!(result.is_ok());
        assert_eq!(result.checks_run, 3);
    }

    #[test]
    fn bad_magic_stops_at_header() {
        let mut data = sample();
        data[0] = b'Z';
        let result = verify_bytes(&data);
        assert!(!result.is_ok());
        assert_eq!(result.checks_run, 1);
    }

    #[test]
    fn flipped_payload_byte_fails_checksum() {
        let mut data = sample();
        let middle = data.len() / 2;
        data[middle] ^= 0xFF;
        let result = verify_bytes(&data);
        assert!(!result.is_ok());
        assert_eq!(result.checks_run, 2);
    }
}
