//! Snapshot trigger specs
//!
//! With `every = K`, T transactions leave floor(T / K) snapshot files.

use crate::prelude::*;

fn run(store: &Store, config: EngineConfig, transactions: u64) {
    let engine = store.start(config);
    engine.execute_action(create_account(1)).unwrap();
    for _ in 1..transactions {
        engine.execute_action(Deposit { id: 1, amount: 1 }).unwrap();
    }
    engine.shutdown().unwrap();
}

#[test]
fn every_k_transactions_snapshots_floor_t_over_k_times() {
    for (every, transactions) in [(5, 23), (1, 4), (7, 6), (3, 3)] {
        let store = Store::empty();
        run(&store, config().with_snapshot_every(every), transactions);
        assert_eq!(
            store.files("snp-").len() as u64,
            transactions / every,
            "every {every} over {transactions} transactions"
        );
        assert!(store.files("tmp_snp-").is_empty());
    }
}

#[test]
fn snapshot_requests_do_not_count_towards_every() {
    let store = Store::empty();
    let engine = store.start(config().with_snapshot_every(4));
    engine.execute_action(create_account(1)).unwrap();
    engine.snapshot_now().unwrap();
    for _ in 0..3 {
        engine.execute_action(Deposit { id: 1, amount: 1 }).unwrap();
    }
    engine.shutdown().unwrap();
    // One requested, one on the fourth counted transaction
    assert_eq!(store.files("snp-").len(), 2);
}

#[test]
fn counting_starts_over_after_restart() {
    let store = Store::empty();
    run(&store, config().with_snapshot_every(5), 7);
    run(&store, config().with_snapshot_every(5), 7);
    assert_eq!(store.files("snp-").len(), 2);
}

#[test]
fn shutdown_snapshot_is_taken_when_configured() {
    let store = Store::empty();
    run(&store, config().with_snapshot_at_shutdown(true), 3);
    assert_eq!(store.files("snp-").len(), 1);

    let store = Store::empty();
    run(&store, config(), 3);
    assert!(store.files("snp-").is_empty());
}

#[test]
fn snapshots_roll_the_journal() {
    let store = Store::empty();
    run(&store, config().with_snapshot_every(2), 6);
    assert_eq!(store.files("snp-").len(), 3);
    assert_eq!(store.files("tx-").len(), 3);
}
