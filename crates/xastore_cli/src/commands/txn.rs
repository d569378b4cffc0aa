//! Transaction commands.
//!
//! Each command loads the snapshot, runs one engine operation and prints its
//! result code. Commands that change state write the snapshot back when the
//! operation succeeds.

use std::path::Path;

use tracing::info;
use xastore_core::{CoreResult, Intent, Manager, Operation, ResultCode, TxnStatus};

use super::snapshot;

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Prints the result code of `result` and turns a failure into an error.
///
/// Failures without a code are returned as they are.
fn report<T>(result: &CoreResult<T>) -> CliResult {
    let code = ResultCode::try_of(result);
    if let Some(code) = code {
        println!("{code}");
    }
    match (result, code) {
        (Ok(_), _) => Ok(()),
        (Err(err), Some(code)) => Err(format!("{code}: {err}").into()),
        (Err(err), None) => Err(err.to_string().into()),
    }
}

/// Prints the current version and value of a key.
pub fn get(path: &Path, key: &str) -> CliResult {
    let engine = snapshot::load(path)?;
    match engine.get(key) {
        Some(entry) => {
            println!("{}\t{}", entry.version, entry.data);
            Ok(())
        }
        None => Err(format!("{}: no such key: {key}", ResultCode::NotFound).into()),
    }
}

/// Prepares a transaction from its parts.
pub fn prepare(
    path: &Path,
    name: &str,
    operation: &str,
    key: &str,
    expected_version: u64,
    value: &str,
) -> CliResult {
    let operation: Operation = operation.parse()?;
    let mut engine = snapshot::load(path)?;

    let result = engine.prepare(Intent::new(name, operation, key, expected_version, value));
    report(&result)?;
    snapshot::save(path, &engine)
}

/// Commits a prepared transaction and prints its serial.
pub fn commit(path: &Path, name: &str) -> CliResult {
    let mut engine = snapshot::load(path)?;

    let result = engine.commit(name);
    report(&result)?;
    if let Ok(serial) = result {
        println!("{serial}");
    }
    snapshot::save(path, &engine)
}

/// Rolls back a prepared transaction.
pub fn rollback(path: &Path, name: &str) -> CliResult {
    let mut engine = snapshot::load(path)?;

    let result = engine.rollback(name);
    report(&result)?;
    snapshot::save(path, &engine)
}

/// Prints the status of a transaction.
pub fn status(path: &Path, name: &str) -> CliResult {
    let engine = snapshot::load(path)?;
    println!("{}", engine.status(name));
    Ok(())
}

/// Prints the names of all transactions with the given status.
pub fn list(path: &Path, status: &str) -> CliResult {
    let status: TxnStatus = status.parse()?;
    let engine = snapshot::load(path)?;
    for name in engine.list(status) {
        println!("{name}");
    }
    Ok(())
}

/// Sets `key` to `value`, or deletes it when `value` is `None`, in one
/// read-modify-write transaction.
pub fn put(path: &Path, name: &str, key: &str, value: Option<String>) -> CliResult {
    let manager = Manager::with_engine(snapshot::load(path)?);

    let result = manager.perform(name, key, |_| value.unwrap_or_default());
    report(&result)?;
    match result {
        Ok(Some(serial)) => println!("{serial}"),
        Ok(None) => info!(key, "nothing to delete"),
        Err(_) => {}
    }
    snapshot::save(path, &manager.into_inner())
}

/// Removes transactions whose name starts with `prefix`.
pub fn trim(path: &Path, prefix: &str) -> CliResult {
    let mut engine = snapshot::load(path)?;
    let removed = engine.trim(prefix);
    println!("{}", ResultCode::Success);
    println!("removed {removed}");
    snapshot::save(path, &engine)
}

/// Removes transactions that were never committed.
pub fn trim_pending(path: &Path) -> CliResult {
    let mut engine = snapshot::load(path)?;
    let removed = engine.trim_pending();
    println!("{}", ResultCode::Success);
    println!("removed {removed}");
    snapshot::save(path, &engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use xastore_core::Serial;

    fn snapshot_path(dir: &TempDir) -> std::path::PathBuf {
        dir.path().join("store.xakv")
    }

    #[test]
    fn prepare_and_commit_persist() {
        let dir = TempDir::new().unwrap();
        let path = snapshot_path(&dir);

        prepare(&path, "file1:user1", "insert", "user1", 0, "value1").unwrap();
        assert_eq!(snapshot::load(&path).unwrap().status("file1:user1"), TxnStatus::Prepare);

        commit(&path, "file1:user1").unwrap();
        let engine = snapshot::load(&path).unwrap();
        assert_eq!(engine.status("file1:user1"), TxnStatus::Commited);
        assert_eq!(engine.get("user1").unwrap().version, 1);
    }

    #[test]
    fn failed_prepare_leaves_no_file() {
        let dir = TempDir::new().unwrap();
        let path = snapshot_path(&dir);

        assert!(prepare(&path, "t1", "update", "missing", 1, "v").is_err());
        assert!(!path.exists());
    }

    #[test]
    fn unknown_operation_is_rejected() {
        let dir = TempDir::new().unwrap();
        assert!(prepare(&snapshot_path(&dir), "t1", "upsert", "k", 0, "v").is_err());
    }

    #[test]
    fn rollback_removes_prepared() {
        let dir = TempDir::new().unwrap();
        let path = snapshot_path(&dir);

        prepare(&path, "t1", "insert", "k", 0, "v").unwrap();
        rollback(&path, "t1").unwrap();
        assert_eq!(snapshot::load(&path).unwrap().status("t1"), TxnStatus::Unknown);
        assert!(rollback(&path, "t1").is_err());
    }

    #[test]
    fn put_and_delete() {
        let dir = TempDir::new().unwrap();
        let path = snapshot_path(&dir);

        put(&path, "t1", "k", Some("a".to_string())).unwrap();
        put(&path, "t2", "k", Some("b".to_string())).unwrap();
        let engine = snapshot::load(&path).unwrap();
        assert_eq!(engine.get("k").unwrap().version, 2);
        assert_eq!(engine.get("k").unwrap().data, "b");

        put(&path, "t3", "k", None).unwrap();
        let engine = snapshot::load(&path).unwrap();
        assert!(engine.get("k").is_none());
        assert_eq!(engine.next_serial(), Serial::new(4));
    }

    #[test]
    fn trim_commands_persist() {
        let dir = TempDir::new().unwrap();
        let path = snapshot_path(&dir);

        put(&path, "a:1", "k1", Some("v".to_string())).unwrap();
        put(&path, "b:1", "k2", Some("v".to_string())).unwrap();
        prepare(&path, "b:2", "insert", "k3", 0, "v").unwrap();

        trim(&path, "a:").unwrap();
        let engine = snapshot::load(&path).unwrap();
        assert_eq!(engine.status("a:1"), TxnStatus::Unknown);
        assert_eq!(engine.get("k1").unwrap().data, "v");

        trim_pending(&path).unwrap();
        let engine = snapshot::load(&path).unwrap();
        assert_eq!(engine.list(TxnStatus::Prepare), Vec::<String>::new());
        assert_eq!(engine.list(TxnStatus::Commited), vec!["b:1"]);
    }

    #[test]
    fn list_rejects_unknown_status() {
        let dir = TempDir::new().unwrap();
        assert!(list(&snapshot_path(&dir), "done").is_err());
    }

    #[test]
    fn report_keeps_io_failures_uncoded() {
        let io: CoreResult<()> = Err(std::io::Error::other("disk gone").into());
        let err = report(&io).unwrap_err();
        assert_eq!(err.to_string(), "I/O error: disk gone");

        let busy: CoreResult<()> = Err(xastore_core::CoreError::conflict("busy"));
        assert!(report(&busy).unwrap_err().to_string().starts_with("conflict: "));
    }
}
