//! Transaction journal truncation specs
//!
//! Cutting the transaction journal anywhere must leave the state that some
//! prefix of the submitted transactions produces.

use crate::prelude::*;
use std::io::Write;
use std::sync::Arc;

const DEPOSITS: u64 = 20;

/// Two accounts in one transaction, then transactions that credit both
fn populate(store: &Store) {
    let engine = store.start(config());
    engine
        .execute(vec![Arc::new(create_account(1)), Arc::new(create_account(2))])
        .unwrap();
    for _ in 0..DEPOSITS {
        engine
            .execute(vec![
                Arc::new(Deposit { id: 1, amount: 1 }),
                Arc::new(Deposit { id: 2, amount: 1 }),
            ])
            .unwrap();
    }
    engine.shutdown().unwrap();
}

fn assert_prefix(engine: &Engine) {
    let last = engine.last_transaction_id();
    assert!(last <= DEPOSITS + 1, "restored past the end: {last}");
    if last == 0 {
        assert_eq!(accounts(engine), 0);
        return;
    }
    let expected = last as i64 - 1;
    assert_eq!(balance(engine, 1), Some(expected), "after {last} transactions");
    assert_eq!(balance(engine, 2), Some(expected), "after {last} transactions");
}

#[test]
fn any_truncation_restores_a_prefix() {
    let template = Store::empty();
    populate(&template);
    let full = file_len(&template.only("tx-"));
    let step = (full / 40).max(1);

    let mut cuts: Vec<u64> = (0..=full).step_by(step as usize).collect();
    cuts.extend([full - 1, full]);
    cuts.sort_unstable();
    cuts.dedup();

    let mut restored = Vec::new();
    for len in cuts {
        let store = Store::empty();
        store.copy_from(&template);
        truncate(&store.only("tx-"), len);

        let engine = store.start(config());
        assert_prefix(&engine);
        restored.push(engine.last_transaction_id());
    }
    assert!(restored.windows(2).all(|w| w[0] <= w[1]), "{restored:?}");
    assert_eq!(restored.first(), Some(&0));
    assert_eq!(restored.last(), Some(&(DEPOSITS + 1)));
}

#[test]
fn untruncated_journal_restores_everything() {
    let store = Store::empty();
    populate(&store);
    let engine = store.start(config());
    assert_eq!(engine.last_transaction_id(), DEPOSITS + 1);
    assert_eq!(balance(&engine, 1), Some(DEPOSITS as i64));
}

#[test]
fn zeroed_tail_is_ignored() {
    let store = Store::empty();
    populate(&store);
    let journal = store.only("tx-");
    let mut file = std::fs::OpenOptions::new().append(true).open(&journal).unwrap();
    file.write_all(&[0u8; 64]).unwrap();
    drop(file);

    let engine = store.start(config());
    assert_eq!(engine.last_transaction_id(), DEPOSITS + 1);
    assert_prefix(&engine);
}

#[test]
fn work_after_a_truncated_restart_survives_the_next_restart() {
    let store = Store::empty();
    populate(&store);
    let journal = store.only("tx-");
    truncate(&journal, file_len(&journal) / 2);

    let (first, after) = {
        let engine = store.start(config());
        assert_prefix(&engine);
        let first = engine.last_transaction_id();
        for _ in 0..3 {
            engine
                .execute(vec![
                    Arc::new(Deposit { id: 1, amount: 1 }),
                    Arc::new(Deposit { id: 2, amount: 1 }),
                ])
                .unwrap();
        }
        let after = balance(&engine, 1);
        engine.shutdown().unwrap();
        (first, after)
    };

    let engine = store.start(config());
    assert_eq!(engine.last_transaction_id(), first + 3);
    assert_eq!(balance(&engine, 1), after);
    assert_eq!(balance(&engine, 1), balance(&engine, 2));
}

#[test]
fn crash_without_shutdown_keeps_written_transactions() {
    let store = Store::empty();
    {
        let engine = store.start(config());
        engine.execute_action(create_account(1)).unwrap();
        engine.execute_action(Deposit { id: 1, amount: 9 }).unwrap();
        // Skip shutdown: the segments stay under their tmp_ names
        std::mem::forget(engine);
    }
    assert_eq!(store.files("tmp_tx-").len(), 1);

    let engine = store.start(config());
    assert_eq!(balance(&engine, 1), Some(9));
    assert_eq!(engine.last_transaction_id(), 2);
}
