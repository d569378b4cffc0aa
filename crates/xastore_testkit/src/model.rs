//! Reference model for differential testing.
//!
//! [`ReferenceModel`] restates the transaction rules with linear scans over
//! a flat list and no indexes. [`check_sequence`] drives an [`Engine`] and
//! the model with the same commands and reports the first divergence.

use std::collections::BTreeMap;

use xastore_core::{Engine, Intent, Operation, ResultCode, Serial, TxnStatus};

use crate::generators::{all_keys, all_names, Command};

#[derive(Debug, Clone)]
struct ModelTxn {
    intent: Intent,
    status: TxnStatus,
    serial: u64,
}

/// Straightforward restatement of the engine's semantics.
#[derive(Debug, Default, Clone)]
pub struct ReferenceModel {
    txns: Vec<ModelTxn>,
    data: BTreeMap<String, (u64, String)>,
    high_water: u64,
}

impl ReferenceModel {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    fn find(&self, name: &str) -> Option<&ModelTxn> {
        self.txns.iter().find(|t| t.intent.name == name)
    }

    /// Mirrors `Engine::prepare`.
    pub fn prepare(&mut self, intent: Intent) -> ResultCode {
        if let Some(existing) = self.find(&intent.name) {
            if existing.intent != intent || existing.status == TxnStatus::Commited {
                return ResultCode::Conflict;
            }
            return ResultCode::Success;
        }
        if self
            .txns
            .iter()
            .any(|t| t.status == TxnStatus::Prepare && t.intent.key == intent.key)
        {
            return ResultCode::Conflict;
        }

        let current = self.data.get(&intent.key);
        let code = match intent.operation {
            Operation::Idle => ResultCode::InvalidArgument,
            Operation::Insert if current.is_some() => ResultCode::Conflict,
            Operation::Insert if intent.expected_version != 0 => ResultCode::InvalidArgument,
            Operation::Insert => ResultCode::Success,
            Operation::Update | Operation::Delete => match current {
                None => ResultCode::NotFound,
                Some((version, _)) if *version != intent.expected_version => ResultCode::Conflict,
                Some(_) if intent.operation == Operation::Update && intent.next_version().is_none() => {
                    ResultCode::InvalidArgument
                }
                Some(_) if intent.operation == Operation::Delete && !intent.value.is_empty() => {
                    ResultCode::InvalidArgument
                }
                Some(_) => ResultCode::Success,
            },
        };
        if code == ResultCode::Success && (intent.name.is_empty() || intent.key.is_empty()) {
            return ResultCode::InvalidArgument;
        }
        if code == ResultCode::Success {
            self.txns.push(ModelTxn {
                intent,
                status: TxnStatus::Prepare,
                serial: 0,
            });
        }
        code
    }

    /// Mirrors `Engine::commit`.
    pub fn commit(&mut self, name: &str) -> ResultCode {
        let max_serial = self.txns.iter().map(|t| t.serial).max().unwrap_or(0);
        let next = self.high_water.max(max_serial) + 1;

        let Some(txn) = self.txns.iter_mut().find(|t| t.intent.name == name) else {
            return ResultCode::NotFound;
        };
        if txn.status == TxnStatus::Commited {
            return ResultCode::Success;
        }
        match txn.intent.operation {
            Operation::Insert | Operation::Update => {
                let Some(version) = txn.intent.next_version() else {
                    return ResultCode::Inconsistent;
                };
                self.data
                    .insert(txn.intent.key.clone(), (version, txn.intent.value.clone()));
            }
            Operation::Delete => {
                self.data.remove(&txn.intent.key);
            }
            Operation::Idle => return ResultCode::Inconsistent,
        }
        txn.status = TxnStatus::Commited;
        txn.serial = next;
        self.high_water = next;
        ResultCode::Success
    }

    /// Mirrors `Engine::rollback`.
    pub fn rollback(&mut self, name: &str) -> ResultCode {
        match self.find(name).map(|t| t.status) {
            None => ResultCode::NotFound,
            Some(TxnStatus::Commited) => ResultCode::Conflict,
            Some(_) => {
                self.txns.retain(|t| t.intent.name != name);
                ResultCode::Success
            }
        }
    }

    /// Mirrors `Engine::trim`.
    pub fn trim(&mut self, prefix: &str) -> usize {
        let before = self.txns.len();
        self.txns.retain(|t| !t.intent.name.starts_with(prefix));
        before - self.txns.len()
    }

    /// Mirrors `Engine::trim_pending`.
    pub fn trim_pending(&mut self) -> usize {
        let before = self.txns.len();
        self.txns.retain(|t| t.serial != 0);
        before - self.txns.len()
    }

    /// Mirrors `Engine::status`.
    pub fn status(&self, name: &str) -> TxnStatus {
        self.find(name).map_or(TxnStatus::Unknown, |t| t.status)
    }

    /// Mirrors `Engine::list`, sorted by name.
    pub fn list(&self, status: TxnStatus) -> Vec<String> {
        let mut names: Vec<String> = self
            .txns
            .iter()
            .filter(|t| t.status == status)
            .map(|t| t.intent.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Mirrors `Engine::get`.
    pub fn get(&self, key: &str) -> Option<(u64, String)> {
        self.data.get(key).cloned()
    }

    /// Mirrors `Engine::next_serial`.
    pub fn next_serial(&self) -> u64 {
        let max_serial = self.txns.iter().map(|t| t.serial).max().unwrap_or(0);
        self.high_water.max(max_serial) + 1
    }
}

/// Runs `commands` against a fresh engine and a reference model.
///
/// Returns a description of the first step where they disagree on a result
/// code, a key, a status, a list or the next serial, or where committed
/// serials fail to strictly increase.
pub fn check_sequence(commands: &[Command]) -> Result<(), String> {
    let mut engine = Engine::new();
    let mut model = ReferenceModel::new();
    let mut last_serial = Serial::ZERO;

    for (step, command) in commands.iter().enumerate() {
        let context = || format!("step {step}: {command:?}");
        match command {
            Command::Prepare(intent) => {
                let got = ResultCode::of(&engine.prepare(intent.clone()));
                let want = model.prepare(intent.clone());
                if got != want {
                    return Err(format!("{}: engine {got}, model {want}", context()));
                }
            }
            Command::Commit(name) => {
                let was_committed = engine.status(name) == TxnStatus::Commited;
                let result = engine.commit(name);
                let got = ResultCode::of(&result);
                let want = model.commit(name);
                if got != want {
                    return Err(format!("{}: engine {got}, model {want}", context()));
                }
                if let (Ok(serial), false) = (result, was_committed) {
                    if serial <= last_serial {
                        return Err(format!(
                            "{}: {serial} does not follow {last_serial}",
                            context()
                        ));
                    }
                    last_serial = serial;
                }
            }
            Command::Rollback(name) => {
                let got = ResultCode::of(&engine.rollback(name));
                let want = model.rollback(name);
                if got != want {
                    return Err(format!("{}: engine {got}, model {want}", context()));
                }
            }
            Command::Trim(prefix) => {
                let got = engine.trim(prefix);
                let want = model.trim(prefix);
                if got != want {
                    return Err(format!("{}: engine removed {got}, model {want}", context()));
                }
            }
            Command::TrimPending => {
                let got = engine.trim_pending();
                let want = model.trim_pending();
                if got != want {
                    return Err(format!("{}: engine removed {got}, model {want}", context()));
                }
            }
            Command::BackupRestore => {
                let blob = engine
                    .backup()
                    .map_err(|e| format!("{}: backup failed: {e}", context()))?;
                engine.clear();
                engine
                    .restore(&blob)
                    .map_err(|e| format!("{}: restore failed: {e}", context()))?;
            }
        }
        compare(&engine, &model).map_err(|e| format!("{}: {e}", context()))?;
    }
    Ok(())
}

fn compare(engine: &Engine, model: &ReferenceModel) -> Result<(), String> {
    for key in all_keys() {
        let got = engine.get(&key).map(|e| (e.version, e.data.clone()));
        let want = model.get(&key);
        if got != want {
            return Err(format!("key {key}: engine {got:?}, model {want:?}"));
        }
    }
    for name in all_names() {
        let (got, want) = (engine.status(&name), model.status(&name));
        if got != want {
            return Err(format!("status of {name}: engine {got}, model {want}"));
        }
    }
    for status in [TxnStatus::Prepare, TxnStatus::Commited] {
        let (got, want) = (engine.list(status), model.list(status));
        if got != want {
            return Err(format!("list {status}: engine {got:?}, model {want:?}"));
        }
    }
    if engine.next_serial().as_u64() != model.next_serial() {
        return Err(format!(
            "next serial: engine {}, model {}",
            engine.next_serial(),
            model.next_serial()
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::{command_sequence_strategy, PropTestConfig};
    use proptest::prelude::*;

    #[test]
    fn model_follows_walkthrough() {
        let mut model = ReferenceModel::new();
        assert_eq!(
            model.prepare(Intent::insert("file1:user1", "user1", "value1")),
            ResultCode::Success
        );
        assert_eq!(
            model.prepare(Intent::insert("file1:user1:a", "user1", "value1")),
            ResultCode::Conflict
        );
        assert_eq!(model.next_serial(), 1);
        assert_eq!(model.commit("file1:user1"), ResultCode::Success);
        assert_eq!(model.next_serial(), 2);
        assert_eq!(model.get("user1"), Some((1, "value1".to_string())));
        assert_eq!(model.rollback("file1:user1"), ResultCode::Conflict);
    }

    #[test]
    fn fixed_sequence_agrees() {
        let commands = vec![
            Command::Prepare(Intent::insert("f0:t0", "user0", "a")),
            Command::Prepare(Intent::insert("f1:t1", "user0", "b")),
            Command::Commit("f0:t0".to_string()),
            Command::Prepare(Intent::update("f1:t1", "user0", 1, "b")),
            Command::BackupRestore,
            Command::Commit("f1:t1".to_string()),
            Command::Trim("f0:".to_string()),
            Command::Prepare(Intent::delete("f2:t2", "user0", 2)),
            Command::TrimPending,
            Command::Rollback("f2:t2".to_string()),
        ];
        check_sequence(&commands).unwrap();
    }

    proptest! {
        #![proptest_config(PropTestConfig::default().to_proptest_config())]

        #[test]
        fn engine_matches_model(commands in command_sequence_strategy(1, 60)) {
            if let Err(divergence) = check_sequence(&commands) {
                prop_assert!(false, "{}", divergence);
            }
        }
    }
}
