// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The transaction engine
//!
//! One apply path, serialized behind a mutex, takes each batch of commands
//! through: handlers under a repository scope, TRANSACTION interceptors,
//! the transaction journal, JOURNALING interceptors, and finally event
//! publication. Engine methods block the calling thread; from async code
//! call them through `spawn_blocking`.

use crate::error::{ActionError, EngineError, EngineState};
use crate::events::{EventBus, EventPublisher, LocalEventBus};
use crate::interceptor::{
    InterceptContext, InterceptorCollection, TransactionInterceptor, TransactionStage,
};
use crate::restorer::RestorerEventBus;
use crate::snapshotting::SnapshottingInterceptor;
use cairn_core::{
    Clock, EngineConfig, ImmutableModelRepository, MapRepository, ModelType,
    MutableModelRepository, Payload, RepositorySnapshotter, SerializerChain, SystemClock,
    SystemInfo, TransactionCommitInfo, TransactionScope, TxRepository, TypeKey, Value,
    SNAPSHOTTING_FLAG,
};
use cairn_storage::{FileSnapshotter, FileSystemStorage, JournalsManager};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::oneshot;
use tokio::time::interval;

type Handler = Box<dyn Fn(&dyn Value, &mut ActionContext<'_>) -> Result<(), ActionError> + Send>;

/// What a transaction action sees while it runs
pub struct ActionContext<'a> {
    transaction_id: u64,
    time: i64,
    scope: Box<dyn TransactionScope + 'a>,
    events: Vec<Arc<dyn Value>>,
}

impl<'a> ActionContext<'a> {
    fn new(transaction_id: u64, time: i64, scope: Box<dyn TransactionScope + 'a>) -> Self {
        Self {
            transaction_id,
            time,
            scope,
            events: Vec::new(),
        }
    }

    pub fn transaction_id(&self) -> u64 {
        self.transaction_id
    }

    pub fn time(&self) -> i64 {
        self.time
    }

    pub fn repo(&mut self) -> &mut (dyn TransactionScope + 'a) {
        self.scope.as_mut()
    }

    /// Queue an event, published once the transaction is journaled
    pub fn emit<E: Payload>(&mut self, event: E) {
        self.events.push(Arc::new(event));
    }

    fn finish(self) -> (Box<dyn TransactionScope + 'a>, Vec<Arc<dyn Value>>) {
        (self.scope, self.events)
    }
}

struct Inner {
    state: EngineState,
    config: EngineConfig,
    chain: Arc<SerializerChain>,
    clock: Arc<dyn Clock>,
    repository: Box<dyn TxRepository>,
    journals: JournalsManager,
    handlers: HashMap<TypeKey, Handler>,
    snapshotters: Vec<Arc<dyn RepositorySnapshotter>>,
    restore_snapshotter: Option<Arc<dyn RepositorySnapshotter>>,
    interceptors: InterceptorCollection,
    publisher: EventPublisher,
    last_transaction_id: u64,
}

pub struct Engine {
    inner: Arc<Mutex<Inner>>,
    timer: Mutex<Option<IntervalTimer>>,
}

impl Engine {
    /// Create an engine journaling into `dir` with an in-process event bus
    pub fn new(dir: &Path, config: EngineConfig) -> Result<Self, EngineError> {
        Self::with_event_bus(dir, config, Arc::new(LocalEventBus::new()))
    }

    pub fn with_event_bus(
        dir: &Path,
        config: EngineConfig,
        bus: Arc<dyn EventBus>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let chain = Arc::new(SerializerChain::new(config.codecs.iter().copied()));
        let storage = FileSystemStorage::new(dir)?;
        let map = MapRepository::with_capacity(
            config.repository.map_capacity,
            config.repository.map_load_factor,
        );
        let repository: Box<dyn TxRepository> = match config.model {
            ModelType::Mutable => Box::new(MutableModelRepository::new(map, Arc::clone(&chain))),
            ModelType::Immutable => Box::new(ImmutableModelRepository::new(map)),
        };
        let journals =
            JournalsManager::new(storage.clone(), Arc::clone(&chain), config.journaling.clone());
        let snapshotter: Arc<dyn RepositorySnapshotter> =
            Arc::new(FileSnapshotter::new(storage, Arc::clone(&chain)));

        let inner = Inner {
            state: EngineState::Created,
            config,
            chain,
            clock: Arc::new(SystemClock),
            repository,
            journals,
            handlers: HashMap::new(),
            snapshotters: vec![snapshotter],
            restore_snapshotter: None,
            interceptors: InterceptorCollection::new(),
            publisher: EventPublisher::new(bus),
            last_transaction_id: 0,
        };
        Ok(Self {
            inner: Arc::new(Mutex::new(inner)),
            timer: Mutex::new(None),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register actions, entity types, and snapshotters; call before `startup`
    pub fn domain(&self) -> Domain<'_> {
        Domain { inner: self.lock() }
    }

    pub fn state(&self) -> EngineState {
        self.lock().state
    }

    /// Restore from snapshot and journals, then start accepting commands
    pub fn startup(&self) -> Result<(), EngineError> {
        let interval = {
            let mut inner = self.lock();
            if inner.state != EngineState::Created {
                return Err(EngineError::NotAccepting(inner.state));
            }
            inner.state = EngineState::Restoring;
            let restored = inner.restore().and_then(|()| inner.install_snapshotting());
            if let Err(e) = restored {
                if let Err(stop) = inner.journals.stop() {
                    tracing::warn!(error = %stop, "closing journals after failed startup");
                }
                inner.state = EngineState::Stopped;
                return Err(e);
            }
            inner.state = EngineState::Running;
            inner.config.snapshotting.interval
        };
        if let Some(interval) = interval {
            let timer = IntervalTimer::start(Arc::downgrade(&self.inner), interval)?;
            *self.timer.lock().unwrap_or_else(|e| e.into_inner()) = Some(timer);
        }
        Ok(())
    }

    /// Apply `commits` as one transaction, returning its id
    pub fn execute(&self, commits: Vec<Arc<dyn Value>>) -> Result<u64, EngineError> {
        self.lock().execute(commits, 0)
    }

    pub fn execute_action<T: Payload>(&self, command: T) -> Result<u64, EngineError> {
        self.execute(vec![Arc::new(command)])
    }

    /// Run an empty system transaction that snapshots the repository
    pub fn snapshot_now(&self) -> Result<u64, EngineError> {
        self.lock().execute(Vec::new(), SNAPSHOTTING_FLAG)
    }

    /// Read the committed repository state
    pub fn query<R>(&self, f: impl FnOnce(&dyn TxRepository) -> R) -> R {
        let inner = self.lock();
        f(inner.repository.as_ref())
    }

    pub fn last_transaction_id(&self) -> u64 {
        self.lock().last_transaction_id
    }

    pub fn event_bus(&self) -> Arc<dyn EventBus> {
        Arc::clone(self.lock().publisher.bus())
    }

    pub fn serializer(&self) -> Arc<SerializerChain> {
        Arc::clone(&self.lock().chain)
    }

    /// Drain snapshot work, take the shutdown snapshot if configured, and
    /// close the journals
    pub fn shutdown(&self) -> Result<(), EngineError> {
        let timer = self.timer.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(timer) = timer {
            timer.stop();
        }

        let mut inner = self.lock();
        let failed = match inner.state {
            EngineState::Stopped => return Ok(()),
            EngineState::Running => false,
            EngineState::Failed => true,
            state => return Err(EngineError::NotAccepting(state)),
        };
        inner.state = EngineState::ShuttingDown;
        inner.interceptors.destroy();
        // A failed engine holds state the journal does not
        if inner.config.snapshotting.at_shutdown && !failed {
            inner.snapshot_at_shutdown();
        }
        let stopped = inner.journals.stop();
        inner.state = EngineState::Stopped;
        tracing::info!(last_transaction_id = inner.last_transaction_id, "engine stopped");
        Ok(stopped?)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if matches!(self.state(), EngineState::Running | EngineState::Failed) {
            if let Err(e) = self.shutdown() {
                tracing::error!(error = %e, "shutdown failed");
            }
        }
    }
}

impl Inner {
    fn execute(&mut self, commits: Vec<Arc<dyn Value>>, flag: u64) -> Result<u64, EngineError> {
        if self.state != EngineState::Running {
            return Err(EngineError::NotAccepting(self.state));
        }
        let transaction_id = self.last_transaction_id + 1;
        let time = self.clock.now_millis();
        let info = TransactionCommitInfo::new(transaction_id, time, commits).with_flag(flag);
        let record = self.journals.encode_transaction(&info)?;
        let events = apply(
            self.repository.as_mut(),
            &self.handlers,
            transaction_id,
            time,
            &info.commits,
        )?;
        self.last_transaction_id = transaction_id;

        self.intercept(TransactionStage::Transaction, &info);
        if let Err(e) = self
            .journals
            .write_encoded_transaction(transaction_id, &record, true)
        {
            tracing::error!(transaction_id, error = %e, "journal append failed, engine stops accepting");
            self.interceptors.abort(transaction_id);
            self.state = EngineState::Failed;
            return Err(e.into());
        }
        self.intercept(TransactionStage::Journaling, &info);
        self.publisher
            .publish(transaction_id, time, &events, &mut self.journals)?;
        Ok(transaction_id)
    }

    fn intercept(&mut self, stage: TransactionStage, info: &TransactionCommitInfo) {
        let mut ctx = InterceptContext {
            transaction_id: info.transaction_id,
            time: info.time,
            flag: info.flag,
            stage,
            repository: self.repository.as_ref(),
            journals: &mut self.journals,
        };
        self.interceptors.intercept(&mut ctx);
    }

    fn restore(&mut self) -> Result<(), EngineError> {
        let storage = self.journals.storage().clone();
        let published = storage.publish_tmp_segments()?;
        let discarded = storage.discard_tmp_snapshots()?;

        let mut snapshot_id = 0;
        let mut snapshot_version = 0;
        let snapshotter = self
            .restore_snapshotter
            .clone()
            .or_else(|| self.snapshotters.first().cloned());
        if let Some(snapshotter) = snapshotter {
            if let Some(mut data) = snapshotter.load()? {
                snapshot_id = data.take_system_info().map_or(0, |i| i.last_transaction_id);
                snapshot_version = snapshotter.last_journal_version_snapshotted();
                self.repository.load(data);
            }
        }

        let mut restorer = RestorerEventBus::new(Arc::clone(self.publisher.bus()));
        let mut scanned = 0usize;
        let mut events = self.journals.replay_events()?;
        for info in events.by_ref() {
            restorer.process_next_event(&info);
            scanned += 1;
        }
        if let Some(e) = events.take_error() {
            return Err(e.into());
        }
        if let Some(torn) = events.torn() {
            storage.repair(torn)?;
        }

        let mut transactions = self.journals.replay_transactions(snapshot_version)?;
        self.journals.start(snapshot_id)?;

        let mut last = snapshot_id;
        let mut replayed = 0usize;
        let mut republished = 0usize;
        for info in transactions.by_ref() {
            if info.transaction_id <= last {
                continue;
            }
            match apply(
                self.repository.as_mut(),
                &self.handlers,
                info.transaction_id,
                info.time,
                &info.commits,
            ) {
                Ok(events) => {
                    republished += self.publisher.republish(
                        &mut restorer,
                        info.transaction_id,
                        info.time,
                        &events,
                        &mut self.journals,
                    )?;
                }
                Err(e) => tracing::warn!(
                    transaction_id = info.transaction_id,
                    error = %e,
                    "replayed transaction failed"
                ),
            }
            last = info.transaction_id;
            replayed += 1;
        }
        // Starting on a prefix would hand out ids the journal already holds
        if let Some(e) = transactions.take_error() {
            return Err(e.into());
        }
        if let Some(torn) = transactions.torn() {
            storage.repair(torn)?;
        }
        restorer.clear();

        self.journals.start(last)?;
        self.last_transaction_id = last;
        tracing::info!(
            published,
            discarded,
            snapshot_id,
            snapshot_version,
            events_scanned = scanned,
            replayed,
            republished,
            last_transaction_id = last,
            "restore complete"
        );
        Ok(())
    }

    fn install_snapshotting(&mut self) -> Result<(), EngineError> {
        if self.snapshotters.is_empty() {
            return Ok(());
        }
        let interceptor = SnapshottingInterceptor::new(
            self.snapshotters.clone(),
            &self.config.snapshotting,
            self.config.model,
        )?;
        self.interceptors.add(
            &[TransactionStage::Transaction, TransactionStage::Journaling],
            Box::new(interceptor),
        );
        Ok(())
    }

    fn snapshot_at_shutdown(&mut self) {
        let mut data = self.repository.data();
        data.set_system_info(SystemInfo {
            last_transaction_id: self.last_transaction_id,
        });
        let version = self.journals.current_store().map_or(0, |s| s.version);
        for snapshotter in &self.snapshotters {
            let id = snapshotter.prepare();
            if let Err(e) = snapshotter.snapshot(&data, id) {
                tracing::error!(timestamp = id.timestamp, error = %e, "shutdown snapshot failed");
            }
            if let Err(e) = snapshotter.commit(version, id) {
                tracing::error!(timestamp = id.timestamp, error = %e, "shutdown snapshot commit failed");
            }
        }
        tracing::info!(
            last_transaction_id = self.last_transaction_id,
            journal_version = version,
            "snapshot taken at shutdown"
        );
    }
}

/// Run every command's handler inside one repository scope
fn apply(
    repository: &mut dyn TxRepository,
    handlers: &HashMap<TypeKey, Handler>,
    transaction_id: u64,
    time: i64,
    commits: &[Arc<dyn Value>],
) -> Result<Vec<Arc<dyn Value>>, EngineError> {
    let mut ctx = ActionContext::new(transaction_id, time, repository.begin());
    let outcome = commits.iter().try_for_each(|commit| {
        let handler = handlers
            .get(&TypeKey::of_value(commit.as_ref()))
            .ok_or(EngineError::NoHandler(commit.type_name()))?;
        handler(commit.as_ref(), &mut ctx).map_err(EngineError::from)
    });
    let (scope, events) = ctx.finish();
    match outcome {
        Ok(()) => {
            scope.commit();
            Ok(events)
        }
        Err(e) => {
            scope.rollback();
            Err(e)
        }
    }
}

/// Registration surface returned by [`Engine::domain`]
pub struct Domain<'a> {
    inner: MutexGuard<'a, Inner>,
}

impl Domain<'_> {
    /// Handle commands of type `T`; also registers `T` for journaling
    pub fn transaction_action<T, F>(&mut self, handler: F) -> &mut Self
    where
        T: Payload,
        F: Fn(&T, &mut ActionContext<'_>) -> Result<(), ActionError> + Send + 'static,
    {
        let key = self.inner.chain.register::<T>();
        let handler: Handler = Box::new(move |value: &dyn Value, ctx: &mut ActionContext<'_>| {
            let command = value
                .as_any()
                .downcast_ref::<T>()
                .ok_or(ActionError::TypeMismatch(T::TYPE_NAME))?;
            handler(command, ctx)
        });
        self.inner.handlers.insert(key, handler);
        self
    }

    /// Register an entity type so it can be snapshotted and rolled back
    pub fn entity<T: Payload>(&mut self) -> &mut Self {
        self.inner.chain.register::<T>();
        self
    }

    /// Register `T` under an extra name, for entities stored with `store_as`
    pub fn entity_as<T: Payload>(&mut self, name: &'static str) -> &mut Self {
        self.inner.chain.register_as::<T>(name);
        self
    }

    pub fn snapshot_with(&mut self, snapshotter: Arc<dyn RepositorySnapshotter>) -> &mut Self {
        self.warn_if_started("snapshot_with");
        self.inner.snapshotters.push(snapshotter);
        self
    }

    /// Restore from `snapshotter` instead of the first registered one
    pub fn restore_with(&mut self, snapshotter: Arc<dyn RepositorySnapshotter>) -> &mut Self {
        self.inner.restore_snapshotter = Some(snapshotter);
        self
    }

    /// Drop every snapshotter, including the default file snapshotter
    pub fn reset_snapshotters(&mut self) -> &mut Self {
        self.warn_if_started("reset_snapshotters");
        self.inner.snapshotters.clear();
        self
    }

    pub fn interceptor(
        &mut self,
        stages: &[TransactionStage],
        interceptor: Box<dyn TransactionInterceptor>,
    ) -> &mut Self {
        self.inner.interceptors.add(stages, interceptor);
        self
    }

    pub fn clock(&mut self, clock: Arc<dyn Clock>) -> &mut Self {
        self.inner.clock = clock;
        self
    }

    fn warn_if_started(&self, what: &'static str) {
        if self.inner.state != EngineState::Created {
            tracing::warn!(what, state = %self.inner.state, "snapshotters change after startup has no effect");
        }
    }
}

/// Runtime ticking the periodic system snapshot transaction
struct IntervalTimer {
    stop: Option<oneshot::Sender<()>>,
    runtime: Option<Runtime>,
}

impl IntervalTimer {
    fn start(engine: Weak<Mutex<Inner>>, period: Duration) -> Result<Self, EngineError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(1)
            .thread_name("cairn-snapshot-timer")
            .enable_time()
            .build()?;
        let (stop, mut stopped) = oneshot::channel::<()>();
        runtime.spawn(async move {
            let mut timer = interval(period);
            // Skip the immediate first tick
            timer.tick().await;
            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    _ = timer.tick() => {
                        let engine = engine.clone();
                        match tokio::task::spawn_blocking(move || submit(&engine)).await {
                            Ok(true) => {}
                            Ok(false) => break,
                            Err(e) => {
                                tracing::error!(error = %e, "interval snapshot task failed");
                                break;
                            }
                        }
                    }
                }
            }
            tracing::debug!("snapshot timer stopped");
        });
        Ok(Self {
            stop: Some(stop),
            runtime: Some(runtime),
        })
    }

    fn stop(self) {
        drop(self);
    }
}

impl Drop for IntervalTimer {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            // Err means the loop already ended
            let _ = stop.send(());
        }
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Submit one snapshot transaction; false once the engine stops accepting
fn submit(engine: &Weak<Mutex<Inner>>) -> bool {
    let Some(shared) = engine.upgrade() else {
        return false;
    };
    let mut inner = shared.lock().unwrap_or_else(|e| e.into_inner());
    match inner.execute(Vec::new(), SNAPSHOTTING_FLAG) {
        Ok(transaction_id) => {
            tracing::debug!(transaction_id, "interval snapshot submitted");
            true
        }
        Err(EngineError::NotAccepting(_)) => false,
        Err(e) => {
            tracing::warn!(error = %e, "interval snapshot failed");
            true
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
