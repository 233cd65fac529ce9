//! Restart-from-snapshot specs

use crate::prelude::*;
use std::fs;

fn populate(store: &Store, config: EngineConfig, deposits: i64) {
    let engine = store.start(config);
    engine.execute_action(create_account(1)).unwrap();
    for amount in 1..=deposits {
        engine.execute_action(Deposit { id: 1, amount }).unwrap();
    }
    engine.shutdown().unwrap();
}

fn total(deposits: i64) -> i64 {
    deposits * (deposits + 1) / 2
}

#[test]
fn restart_uses_snapshot_and_journal_tail() {
    let store = Store::empty();
    populate(&store, config().with_snapshot_every(5), 11);

    let engine = store.start(config());
    assert_eq!(engine.last_transaction_id(), 12);
    assert_eq!(balance(&engine, 1), Some(total(11)));
}

#[test]
fn journal_before_the_snapshot_is_not_needed() {
    let store = Store::empty();
    populate(&store, config().with_snapshot_every(4), 7);

    // The first store is fully covered by the snapshot taken at id 4
    let first = store.files("tx-").remove(0);
    fs::remove_file(first).unwrap();

    let engine = store.start(config());
    assert_eq!(engine.last_transaction_id(), 8);
    assert_eq!(balance(&engine, 1), Some(total(7)));
}

#[test]
fn corrupt_newest_snapshot_falls_back_to_older() {
    let store = Store::empty();
    populate(&store, config().with_snapshot_every(5), 11);
    let snapshots = store.files("snp-");
    assert_eq!(snapshots.len(), 2);

    let newest = snapshots.last().unwrap();
    let mut bytes = fs::read(newest).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    fs::write(newest, bytes).unwrap();

    let engine = store.start(config());
    assert_eq!(engine.last_transaction_id(), 12);
    assert_eq!(balance(&engine, 1), Some(total(11)));
}

#[test]
fn leftover_tmp_snapshot_is_discarded() {
    let store = Store::empty();
    populate(&store, config(), 2);
    let stray = store.path().join(
        "tmp_snp-2026_01_01-00000000000000000000-00000000000000000001",
    );
    fs::write(&stray, b"half written").unwrap();

    let engine = store.start(config());
    assert!(!stray.exists());
    assert_eq!(balance(&engine, 1), Some(total(2)));
}

#[test]
fn interval_snapshots_are_restorable() {
    let store = Store::empty();
    {
        let config = config().with_snapshot_interval(std::time::Duration::from_millis(10));
        let engine = store.start(config);
        engine.execute_action(create_account(1)).unwrap();
        engine.execute_action(Deposit { id: 1, amount: 3 }).unwrap();
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while store.files("snp-").is_empty() && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        engine.shutdown().unwrap();
    }
    assert!(!store.files("snp-").is_empty());

    let engine = store.start(config());
    assert_eq!(balance(&engine, 1), Some(3));
}
