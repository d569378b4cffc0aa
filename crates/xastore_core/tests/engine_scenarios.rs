//! End-to-end engine scenarios.

use std::sync::Arc;

use xastore_core::{
    Config, CoreError, Engine, Entry, Intent, ManualClock, Operation, ResultCode, Serial,
    TxnStatus,
};

fn code<T>(result: xastore_core::CoreResult<T>) -> ResultCode {
    ResultCode::of(&result)
}

#[test]
fn file_import_walkthrough() {
    let mut engine = Engine::new();

    assert_eq!(
        code(engine.prepare(Intent::insert("file1:user1", "user1", "value1"))),
        ResultCode::Success
    );
    // same name, different body
    assert_eq!(
        code(engine.prepare(Intent::insert("file1:user1", "user1a", "value1"))),
        ResultCode::Conflict
    );
    // different name, same key
    assert_eq!(
        code(engine.prepare(Intent::insert("file1:user1:a", "user1", "value1"))),
        ResultCode::Conflict
    );

    assert_eq!(engine.list(TxnStatus::Prepare), vec!["file1:user1"]);
    assert!(engine.get("user1").is_none());

    assert_eq!(engine.next_serial(), Serial::new(1));
    assert_eq!(code(engine.commit("file1:user1")), ResultCode::Success);
    assert_eq!(engine.status("file1:user1"), TxnStatus::Commited);
    assert_eq!(engine.next_serial(), Serial::new(2));
    assert_eq!(engine.list(TxnStatus::Commited), vec!["file1:user1"]);

    assert_eq!(engine.get("user1"), Some(&Entry::new(1, "value1")));

    let blob = engine.backup().unwrap();
    engine.clear();
    engine.restore(&blob).unwrap();
    assert_eq!(engine.get("user1"), Some(&Entry::new(1, "value1")));

    engine.trim("file1:user1");
    assert_eq!(engine.status("file1:user1"), TxnStatus::Unknown);

    engine
        .prepare(Intent::insert("file1:user2", "user2", "value2"))
        .unwrap();
    assert_eq!(engine.status("file1:user2"), TxnStatus::Prepare);
    engine.trim_pending();
    assert_eq!(engine.status("file1:user2"), TxnStatus::Unknown);
}

#[test]
fn second_prepare_on_busy_key_conflicts_until_resolved() {
    let mut engine = Engine::new();
    engine.prepare(Intent::insert("a", "k", "1")).unwrap();
    assert_eq!(
        code(engine.prepare(Intent::insert("b", "k", "2"))),
        ResultCode::Conflict
    );

    engine.commit("a").unwrap();
    // the key is no longer held, but the insert is now stale
    assert_eq!(
        code(engine.prepare(Intent::insert("b", "k", "2"))),
        ResultCode::Conflict
    );
    assert_eq!(
        code(engine.prepare(Intent::update("b", "k", 1, "2"))),
        ResultCode::Success
    );
}

#[test]
fn commit_twice_changes_nothing() {
    let clock = Arc::new(ManualClock::new(10));
    let mut engine = Engine::with_clock(Config::default(), clock.clone());
    engine.prepare(Intent::insert("t", "k", "v")).unwrap();
    let first = engine.commit("t").unwrap();
    let blob_after_first = engine.backup().unwrap();

    let second = engine.commit("t").unwrap();
    assert_eq!(first, second);
    assert_eq!(engine.backup().unwrap(), blob_after_first);
}

#[test]
fn serials_strictly_increase() {
    let mut engine = Engine::new();
    let mut last = Serial::ZERO;
    for i in 0..20 {
        let name = format!("t{i}");
        let key = format!("k{}", i % 3);
        let intent = match engine.get(&key) {
            None => Intent::insert(&name, &key, "v"),
            Some(entry) => Intent::update(&name, &key, entry.version, format!("v{i}")),
        };
        engine.prepare(intent).unwrap();
        let serial = engine.commit(&name).unwrap();
        assert!(serial > last);
        last = serial;
        if i % 5 == 4 {
            engine.trim("t");
        }
    }
    assert_eq!(last, Serial::new(20));
}

#[test]
fn backup_restore_preserves_queries() {
    let mut engine = Engine::new();
    engine.prepare(Intent::insert("c:1", "a", "1")).unwrap();
    engine.commit("c:1").unwrap();
    engine.prepare(Intent::insert("c:2", "b", "2")).unwrap();
    engine.commit("c:2").unwrap();
    engine.prepare(Intent::delete("c:3", "a", 1)).unwrap();
    engine.commit("c:3").unwrap();
    engine.prepare(Intent::update("p:1", "b", 1, "3")).unwrap();

    let names = ["c:1", "c:2", "c:3", "p:1", "missing"];
    let keys = ["a", "b", "c"];
    let before_status: Vec<_> = names.iter().map(|n| engine.status(n)).collect();
    let before_get: Vec<_> = keys.iter().map(|k| engine.get(k).cloned()).collect();
    let before_lists = (
        engine.list(TxnStatus::Prepare),
        engine.list(TxnStatus::Commited),
    );
    let before_serial = engine.next_serial();

    let blob = engine.backup().unwrap();
    engine.clear();
    assert!(engine.records().next().is_none());
    engine.restore(&blob).unwrap();

    let after_status: Vec<_> = names.iter().map(|n| engine.status(n)).collect();
    let after_get: Vec<_> = keys.iter().map(|k| engine.get(k).cloned()).collect();
    assert_eq!(before_status, after_status);
    assert_eq!(before_get, after_get);
    assert_eq!(
        before_lists,
        (
            engine.list(TxnStatus::Prepare),
            engine.list(TxnStatus::Commited)
        )
    );
    assert_eq!(before_serial, engine.next_serial());

    // the restored prepare still holds its key and can be committed
    assert_eq!(
        code(engine.prepare(Intent::update("p:2", "b", 1, "4"))),
        ResultCode::Conflict
    );
    engine.commit("p:1").unwrap();
    assert_eq!(engine.get("b"), Some(&Entry::new(2, "3")));
}

#[test]
fn trim_touches_only_matching_names() {
    let mut engine = Engine::new();
    for (name, key) in [("f1:a", "a"), ("f1:b", "b"), ("f2:c", "c")] {
        engine.prepare(Intent::insert(name, key, "v")).unwrap();
    }
    engine.commit("f1:a").unwrap();
    engine.commit("f2:c").unwrap();

    assert_eq!(engine.trim("f1:"), 2);
    assert_eq!(engine.status("f1:a"), TxnStatus::Unknown);
    assert_eq!(engine.status("f1:b"), TxnStatus::Unknown);
    assert_eq!(engine.status("f2:c"), TxnStatus::Commited);
    assert_eq!(engine.list(TxnStatus::Commited), vec!["f2:c"]);

    // trimming never touches materialized values
    assert_eq!(engine.get("a"), Some(&Entry::new(1, "v")));
    assert_eq!(engine.trim("nothing-matches"), 0);
}

#[test]
fn restore_rejects_garbage_without_side_effects() {
    let mut engine = Engine::new();
    engine.prepare(Intent::insert("t", "k", "v")).unwrap();
    let mut blob = engine.backup().unwrap();
    let last = blob.len() - 1;
    blob[last] ^= 0x55;

    engine.commit("t").unwrap();
    let err = engine.restore(&blob).unwrap_err();
    assert!(matches!(err, CoreError::ChecksumMismatch { .. }));
    assert_eq!(engine.status("t"), TxnStatus::Commited);

    let mut truncated = engine.backup().unwrap();
    truncated.truncate(12);
    assert!(matches!(
        engine.restore(&truncated),
        Err(CoreError::InvalidFormat { .. })
    ));
}

#[test]
fn idle_operation_is_invalid() {
    let mut engine = Engine::new();
    let intent = Intent::new("t", Operation::Idle, "k", 0, "");
    assert_eq!(code(engine.prepare(intent)), ResultCode::InvalidArgument);
    assert!(engine.records().next().is_none());
}
