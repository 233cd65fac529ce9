//! Event recovery specs
//!
//! The repository is rebuilt from the transaction journal alone. The
//! events journal only decides which events go out again on restart.

use crate::prelude::*;

const ACCOUNTS: u64 = 300;
const ORDERS: u64 = 300;

fn ids<E, F: Fn(&E) -> u64>(stream: &mut EventStream<E>, id: F) -> Vec<u64>
where
    E: Payload,
{
    stream.drain().iter().map(|e| id(e)).collect()
}

/// Accounts first, then one order per account, one transaction each
fn populate(store: &Store) {
    let engine = store.start(config());
    for id in 1..=ACCOUNTS {
        engine.execute_action(create_account(id)).unwrap();
    }
    for id in 1..=ORDERS {
        engine.execute_action(place_order(id, id)).unwrap();
    }
    engine.shutdown().unwrap();
}

#[test]
fn events_are_not_repeated_after_a_clean_restart() {
    let store = Store::empty();
    let mut created = store.subscribe::<AccountCreated>();
    let mut placed = store.subscribe::<OrderPlaced>();
    populate(&store);
    assert_eq!(created.drain().len(), ACCOUNTS as usize);
    assert_eq!(placed.drain().len(), ORDERS as usize);

    let engine = store.start(config());
    assert_eq!(accounts(&engine), ACCOUNTS as usize);
    assert!(created.drain().is_empty());
    assert!(placed.drain().is_empty());
}

#[test]
fn truncated_events_journal_republishes_only_the_lost_tail() {
    let store = Store::empty();
    let mut created = store.subscribe::<AccountCreated>();
    let mut placed = store.subscribe::<OrderPlaced>();
    populate(&store);
    created.drain();
    placed.drain();

    let events = store.only("evn-");
    truncate(&events, file_len(&events) * 4 / 5);

    {
        let engine = store.start(config());
        // The repository does not depend on the events journal
        assert_eq!(accounts(&engine), ACCOUNTS as usize);
        assert_eq!(orders(&engine), ORDERS as usize);

        assert!(ids(&mut created, |e: &AccountCreated| e.id).is_empty());
        let republished = ids(&mut placed, |e: &OrderPlaced| e.id);
        assert!(!republished.is_empty());
        assert!(republished.len() < ORDERS as usize);
        let first = ORDERS - republished.len() as u64 + 1;
        assert_eq!(republished, (first..=ORDERS).collect::<Vec<_>>());
        engine.shutdown().unwrap();
    }

    // A second restart with no new work emits nothing
    let engine = store.start(config());
    assert_eq!(orders(&engine), ORDERS as usize);
    assert!(created.drain().is_empty());
    assert!(placed.drain().is_empty());
}

#[test]
fn failed_delivery_is_retried_once() {
    let crashed = Store::empty();
    // A closed subscriber makes every OrderPlaced delivery fail
    drop(crashed.subscribe::<OrderPlaced>());
    {
        let engine = crashed.start(config());
        engine.execute_action(create_account(1)).unwrap();
        engine.execute_action(place_order(1, 1)).unwrap();
        engine.execute_action(place_order(2, 1)).unwrap();
        engine.shutdown().unwrap();
    }

    let store = Store::empty();
    store.copy_from(&crashed);
    let mut placed = store.subscribe::<OrderPlaced>();
    {
        let engine = store.start(config());
        assert_eq!(ids(&mut placed, |e: &OrderPlaced| e.id), vec![1, 2]);
        engine.shutdown().unwrap();
    }

    let _engine = store.start(config());
    assert!(placed.drain().is_empty());
}
