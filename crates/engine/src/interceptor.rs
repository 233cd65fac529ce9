// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hooks run around each transaction

use crate::error::EngineError;
use cairn_core::TxRepository;
use cairn_storage::JournalsManager;

/// Point in the apply path at which interceptors run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionStage {
    /// Repository changes are committed in memory, not yet journaled
    Transaction,
    /// The transaction record has been appended to the journal
    Journaling,
}

pub struct InterceptContext<'a> {
    pub transaction_id: u64,
    pub time: i64,
    pub flag: u64,
    pub stage: TransactionStage,
    pub repository: &'a dyn TxRepository,
    pub journals: &'a mut JournalsManager,
}

pub trait TransactionInterceptor: Send {
    fn intercept(&mut self, ctx: &mut InterceptContext<'_>) -> Result<(), EngineError>;

    /// The transaction seen at TRANSACTION never reached the journal
    fn abort(&mut self, _transaction_id: u64) {}

    /// Release resources, waiting for outstanding work
    fn destroy(&mut self) {}
}

/// Interceptors in registration order, each bound to one or more stages
#[derive(Default)]
pub struct InterceptorCollection {
    entries: Vec<(Vec<TransactionStage>, Box<dyn TransactionInterceptor>)>,
}

impl InterceptorCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, stages: &[TransactionStage], interceptor: Box<dyn TransactionInterceptor>) {
        self.entries.push((stages.to_vec(), interceptor));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run every interceptor bound to `ctx.stage`
    ///
    /// A failing interceptor is logged and does not stop the others; the
    /// transaction is already committed by the time interceptors run.
    pub fn intercept(&mut self, ctx: &mut InterceptContext<'_>) {
        for (stages, interceptor) in &mut self.entries {
            if !stages.contains(&ctx.stage) {
                continue;
            }
            if let Err(e) = interceptor.intercept(ctx) {
                tracing::error!(
                    transaction_id = ctx.transaction_id,
                    stage = ?ctx.stage,
                    error = %e,
                    "interceptor failed"
                );
            }
        }
    }

    pub fn abort(&mut self, transaction_id: u64) {
        for (_, interceptor) in &mut self.entries {
            interceptor.abort(transaction_id);
        }
    }

    pub fn destroy(&mut self) {
        for (_, interceptor) in &mut self.entries {
            interceptor.destroy();
        }
    }
}
