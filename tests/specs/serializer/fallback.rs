//! Serializer chain specs
//!
//! Orders carry flattened labels, which the compact codec cannot encode,
//! so they fall back to JSON in the journal and in snapshots.

use crate::prelude::*;
use serde::{Deserialize, Serialize};
use similar_asserts::assert_eq;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Ping;

impl Payload for Ping {
    const TYPE_NAME: &'static str = "specs.Ping";
}

fn stored_order(engine: &Engine, id: u64) -> Option<Order> {
    engine.query(|repo| repo.find::<Order>(id).map(|o| (*o).clone()))
}

fn labelled_order() -> PlaceOrder {
    let mut order = place_order(1, 1);
    order.labels = BTreeMap::from([
        ("channel".to_string(), "phone".to_string()),
        ("gift".to_string(), "yes".to_string()),
    ]);
    order
}

#[test]
fn fallback_values_survive_journal_replay() {
    let store = Store::empty();
    let expected = {
        let engine = store.start(config());
        engine.execute_action(create_account(1)).unwrap();
        engine.execute_action(labelled_order()).unwrap();
        let order = stored_order(&engine, 1);
        engine.shutdown().unwrap();
        order
    };
    assert!(store.files("snp-").is_empty());

    let engine = store.start(config());
    assert_eq!(stored_order(&engine, 1), expected);
    assert_eq!(stored_order(&engine, 1).unwrap().labels.len(), 2);
}

#[test]
fn fallback_values_survive_snapshots() {
    let store = Store::empty();
    {
        let engine = store.start(config().with_snapshot_at_shutdown(true));
        engine.execute_action(create_account(1)).unwrap();
        engine.execute_action(labelled_order()).unwrap();
        engine.shutdown().unwrap();
    }
    // Drop the journals so only the snapshot can restore the order
    for path in store.files("tx-") {
        std::fs::remove_file(path).unwrap();
    }

    let engine = store.start(config());
    let order = stored_order(&engine, 1).unwrap();
    assert_eq!(order.labels["gift"], "yes".to_string());
    assert_eq!(balance(&engine, 1), Some(0));
}

#[test]
fn empty_commands_roundtrip_through_each_codec_order() {
    for codecs in [
        vec![Codec::Bincode, Codec::Json],
        vec![Codec::Json, Codec::Bincode],
        vec![Codec::Json],
    ] {
        let store = Store::empty();
        let start = || {
            let engine = Engine::new(store.path(), config().with_codecs(codecs.clone())).unwrap();
            register(&engine);
            engine
                .domain()
                .transaction_action(|_: &Ping, ctx| {
                    let seen = ctx.repo().get::<Account>(0)?.map_or(0, |a| a.balance);
                    ctx.repo().store(
                        0,
                        Account {
                            owner: "pings".to_string(),
                            balance: seen + 1,
                        },
                    )?;
                    Ok(())
                });
            engine.startup().unwrap();
            engine
        };
        {
            let engine = start();
            engine.execute_action(Ping).unwrap();
            engine.execute_action(Ping).unwrap();
            engine.shutdown().unwrap();
        }
        let engine = start();
        assert_eq!(balance(&engine, 0), Some(2), "{codecs:?}");
    }
}

#[test]
fn unjournalable_command_is_refused_before_it_applies() {
    let store = Store::empty();
    let engine = store.start(config().with_codecs(vec![Codec::Bincode]));
    engine.execute_action(create_account(1)).unwrap();
    assert!(matches!(
        engine.execute_action(labelled_order()),
        Err(EngineError::Journal(_))
    ));
    assert_eq!(orders(&engine), 0);
    assert_eq!(engine.last_transaction_id(), 1);
}
