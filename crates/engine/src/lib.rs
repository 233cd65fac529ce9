// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cairn transaction engine

mod engine;
mod error;
mod events;
mod interceptor;
mod restorer;
mod snapshotting;

pub use engine::{ActionContext, Domain, Engine};
pub use error::{ActionError, EngineError, EngineState, PublishError};
pub use events::{EventBus, EventPublisher, EventStream, LocalEventBus};
pub use interceptor::{
    InterceptContext, InterceptorCollection, TransactionInterceptor, TransactionStage,
};
pub use restorer::RestorerEventBus;
pub use snapshotting::SnapshottingInterceptor;
