// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot triggering and the background snapshot worker
//!
//! At the TRANSACTION stage a triggered snapshot is prepared and handed to
//! a single background worker. Under the mutable model the apply path
//! waits for it right away; under the immutable model it waits at the
//! JOURNALING stage. Either way, snapshotters are committed at JOURNALING
//! and the journal is rolled afterwards.
//!
//! Waiting on the worker never enters its runtime, so the interceptor can
//! be driven and dropped from inside another tokio runtime.

use crate::error::EngineError;
use crate::interceptor::{InterceptContext, TransactionInterceptor, TransactionStage};
use cairn_core::{
    ModelType, RepositoryData, RepositorySnapshotter, SnapshotIdentifier, SnapshottingConfig,
    SystemInfo, SNAPSHOTTING_FLAG,
};
use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::Arc;
use tokio::runtime::Runtime;

struct InFlight {
    /// Signalled once every snapshotter has written; dropped unsent on panic
    done: Option<mpsc::Receiver<()>>,
    ids: Vec<SnapshotIdentifier>,
}

pub struct SnapshottingInterceptor {
    snapshotters: Vec<Arc<dyn RepositorySnapshotter>>,
    model: ModelType,
    every: u64,
    counter: u64,
    worker: Option<Runtime>,
    in_flight: HashMap<u64, InFlight>,
}

impl SnapshottingInterceptor {
    pub fn new(
        snapshotters: Vec<Arc<dyn RepositorySnapshotter>>,
        config: &SnapshottingConfig,
        model: ModelType,
    ) -> Result<Self, EngineError> {
        let worker = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(1)
            .thread_name("cairn-snapshot")
            .build()?;
        Ok(Self {
            snapshotters,
            model,
            every: config.every,
            counter: 0,
            worker: Some(worker),
            in_flight: HashMap::new(),
        })
    }

    /// Transactions whose snapshot has not been committed yet
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    fn triggered(&mut self, flag: u64) -> bool {
        if flag & SNAPSHOTTING_FLAG == SNAPSHOTTING_FLAG {
            return true;
        }
        if self.every == 0 {
            return false;
        }
        self.counter += 1;
        self.counter % self.every == 0
    }

    fn start(&mut self, ctx: &InterceptContext<'_>) {
        let Some(worker) = &self.worker else {
            return;
        };
        let ids: Vec<SnapshotIdentifier> = self.snapshotters.iter().map(|s| s.prepare()).collect();
        let mut data: RepositoryData = ctx.repository.data();
        data.set_system_info(SystemInfo {
            last_transaction_id: ctx.transaction_id,
        });

        let snapshotters = self.snapshotters.clone();
        let prepared = ids.clone();
        let transaction_id = ctx.transaction_id;
        let (signal, done) = mpsc::sync_channel(1);
        worker.spawn_blocking(move || {
            for (snapshotter, id) in snapshotters.iter().zip(prepared) {
                if let Err(e) = snapshotter.snapshot(&data, id) {
                    tracing::error!(transaction_id, timestamp = id.timestamp, error = %e, "snapshot failed");
                }
            }
            // Receiver is gone only if the interceptor was dropped
            let _ = signal.send(());
        });
        tracing::debug!(transaction_id, snapshotters = ids.len(), "snapshot started");
        self.in_flight.insert(
            transaction_id,
            InFlight {
                done: Some(done),
                ids,
            },
        );
    }

    fn join_now(&mut self, transaction_id: u64) {
        if let Some(flight) = self.in_flight.get_mut(&transaction_id) {
            join(transaction_id, flight);
        }
    }

    /// Wait for the snapshot started by `transaction_id` and leave it
    /// uncommitted; its files stay temporary and are discarded at startup
    fn abandon(&mut self, transaction_id: u64) {
        if let Some(mut flight) = self.in_flight.remove(&transaction_id) {
            join(transaction_id, &mut flight);
            tracing::warn!(transaction_id, "snapshot abandoned");
        }
    }

    fn commit(&mut self, ctx: &mut InterceptContext<'_>) -> Result<(), EngineError> {
        let Some(mut flight) = self.in_flight.remove(&ctx.transaction_id) else {
            return Ok(());
        };
        join(ctx.transaction_id, &mut flight);

        let version = ctx.journals.current_store().map_or(0, |s| s.version);
        for (snapshotter, id) in self.snapshotters.iter().zip(flight.ids) {
            if let Err(e) = snapshotter.commit(version, id) {
                tracing::error!(
                    transaction_id = ctx.transaction_id,
                    timestamp = id.timestamp,
                    error = %e,
                    "snapshot commit failed"
                );
            }
        }
        tracing::info!(transaction_id = ctx.transaction_id, journal_version = version, "snapshot committed");
        ctx.journals.roll(ctx.transaction_id)?;
        Ok(())
    }
}

impl TransactionInterceptor for SnapshottingInterceptor {
    fn intercept(&mut self, ctx: &mut InterceptContext<'_>) -> Result<(), EngineError> {
        match ctx.stage {
            TransactionStage::Transaction => {
                if self.snapshotters.is_empty() || !self.triggered(ctx.flag) {
                    return Ok(());
                }
                self.start(ctx);
                if self.model == ModelType::Mutable {
                    self.join_now(ctx.transaction_id);
                }
                Ok(())
            }
            TransactionStage::Journaling => self.commit(ctx),
        }
    }

    fn abort(&mut self, transaction_id: u64) {
        self.abandon(transaction_id);
    }

    fn destroy(&mut self) {
        for (transaction_id, mut flight) in self.in_flight.drain() {
            join(transaction_id, &mut flight);
        }
    }
}

impl Drop for SnapshottingInterceptor {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.shutdown_background();
        }
    }
}

fn join(transaction_id: u64, flight: &mut InFlight) {
    if let Some(done) = flight.done.take() {
        if done.recv().is_err() {
            tracing::error!(transaction_id, "snapshot task did not complete");
        }
    }
}

#[cfg(test)]
#[path = "snapshotting_tests.rs"]
mod tests;
