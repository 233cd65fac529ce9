//! Rollback specs for both domain models

use crate::prelude::*;
use std::sync::Arc;

const MODELS: [ModelType; 2] = [ModelType::Mutable, ModelType::Immutable];

fn funded(store: &Store, model: ModelType) -> Engine {
    let engine = store.start(config().with_model(model));
    engine
        .execute(vec![
            Arc::new(create_account(1)),
            Arc::new(create_account(2)),
            Arc::new(Deposit { id: 1, amount: 10 }),
            Arc::new(Deposit { id: 2, amount: 20 }),
        ])
        .unwrap();
    engine
}

#[test]
fn rejected_transaction_leaves_no_trace() {
    for model in MODELS {
        let store = Store::empty();
        let engine = funded(&store, model);

        let result = engine.execute(vec![
            Arc::new(Deposit { id: 1, amount: 5 }),
            Arc::new(Deposit { id: 1, amount: 5 }),
            Arc::new(create_account(3)),
            Arc::new(Withdraw { id: 2, amount: 50 }),
        ]);
        assert!(
            matches!(result, Err(EngineError::Action(ActionError::Rejected(_)))),
            "{model:?}: {result:?}"
        );
        assert_eq!(balance(&engine, 1), Some(10), "{model:?}");
        assert_eq!(balance(&engine, 2), Some(20), "{model:?}");
        assert_eq!(balance(&engine, 3), None, "{model:?}");
        assert_eq!(accounts(&engine), 2, "{model:?}");
        assert_eq!(engine.last_transaction_id(), 1, "{model:?}");
    }
}

#[test]
fn rejected_transaction_is_not_journaled() {
    for model in MODELS {
        let store = Store::empty();
        {
            let engine = funded(&store, model);
            assert!(engine.execute_action(Withdraw { id: 1, amount: 11 }).is_err());
            engine.execute_action(Withdraw { id: 1, amount: 4 }).unwrap();
            engine.shutdown().unwrap();
        }
        let engine = store.start(config().with_model(model));
        assert_eq!(engine.last_transaction_id(), 2, "{model:?}");
        assert_eq!(balance(&engine, 1), Some(6), "{model:?}");
    }
}

#[test]
fn rollback_does_not_disturb_a_running_snapshot() {
    for model in MODELS {
        let store = Store::empty();
        {
            let engine = store.start(config().with_model(model).with_snapshot_every(1));
            engine.execute_action(create_account(1)).unwrap();
            engine.execute_action(Deposit { id: 1, amount: 7 }).unwrap();
            assert!(engine.execute_action(Withdraw { id: 1, amount: 8 }).is_err());
            engine.shutdown().unwrap();
        }
        let engine = store.start(config().with_model(model));
        assert_eq!(balance(&engine, 1), Some(7), "{model:?}");
    }
}
