//! Journals holding records the running domain cannot read.

use crate::prelude::*;
use serde::{Deserialize, Serialize};

/// Internally tagged, so only a self-describing codec reads it back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
enum Note {
    Memo { text: String },
    Reminder { days: u32 },
}

impl Payload for Note {
    const TYPE_NAME: &'static str = "specs.Note";
}

fn with_notes(store: &Store) -> Engine {
    let engine = store.engine(config());
    engine
        .domain()
        .transaction_action(|_: &Note, _ctx| Ok(()));
    engine.startup().unwrap();
    engine
}

/// Account 1 with a note in between five deposits of 10
fn write_history(store: &Store) {
    let engine = with_notes(store);
    engine.execute_action(create_account(1)).unwrap();
    engine
        .execute_action(Note::Memo {
            text: "opened at the branch".to_string(),
        })
        .unwrap();
    for _ in 0..5 {
        engine.execute_action(Deposit { id: 1, amount: 10 }).unwrap();
    }
    engine
        .execute_action(Note::Reminder { days: 30 })
        .unwrap();
    assert_eq!(engine.last_transaction_id(), 8);
    engine.shutdown().unwrap();
}

#[test]
fn tagged_commands_replay_after_restart() {
    let store = Store::empty();
    write_history(&store);

    let engine = with_notes(&store);
    assert_eq!(balance(&engine, 1), Some(50));
    assert_eq!(engine.last_transaction_id(), 8);
    assert_eq!(engine.execute_action(Deposit { id: 1, amount: 1 }).unwrap(), 9);
}

#[test]
fn unreadable_record_keeps_the_engine_from_starting() {
    let store = Store::empty();
    write_history(&store);

    // Notes are not registered, so record 2 cannot be decoded
    let engine = store.engine(config());
    assert!(matches!(engine.startup(), Err(EngineError::Journal(_))));
    assert_eq!(engine.state(), EngineState::Stopped);
    assert!(matches!(
        engine.execute_action(Deposit { id: 1, amount: 1 }),
        Err(EngineError::NotAccepting(EngineState::Stopped))
    ));
    drop(engine);

    // Nothing was cut: with the type registered again everything comes back
    let engine = with_notes(&store);
    assert_eq!(balance(&engine, 1), Some(50));
    assert_eq!(engine.last_transaction_id(), 8);
}
