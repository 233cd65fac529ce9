// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event delivery and the events journal
//!
//! Events raised by transaction actions are handed to an [`EventBus`]
//! after the transaction is journaled. [`EventPublisher`] then appends an
//! events-commit record so a restart knows which transactions' events
//! already went out.

use crate::error::{EngineError, PublishError};
use crate::restorer::RestorerEventBus;
use cairn_core::{downcast_arc, EventsCommitInfo, Payload, TypeKey, Value, ASYNC_ERROR_FLAG};
use cairn_storage::JournalsManager;
use std::marker::PhantomData;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

pub trait EventBus: Send + Sync {
    fn publish(&self, event: Arc<dyn Value>) -> Result<(), PublishError>;
}

struct Subscriber {
    key: TypeKey,
    type_name: &'static str,
    sender: mpsc::UnboundedSender<Arc<dyn Value>>,
}

/// In-process bus delivering events to typed subscribers
#[derive(Default)]
pub struct LocalEventBus {
    subscribers: RwLock<Vec<Subscriber>>,
}

impl LocalEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<E: Payload>(&self) -> EventStream<E> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Subscriber {
                key: TypeKey::of::<E>(),
                type_name: E::TYPE_NAME,
                sender,
            });
        EventStream {
            receiver,
            _event: PhantomData,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl EventBus for LocalEventBus {
    fn publish(&self, event: Arc<dyn Value>) -> Result<(), PublishError> {
        let key = TypeKey::of_value(event.as_ref());
        let subscribers = self.subscribers.read().unwrap_or_else(|e| e.into_inner());
        for subscriber in subscribers.iter().filter(|s| s.key == key) {
            subscriber
                .sender
                .send(Arc::clone(&event))
                .map_err(|_| PublishError::Closed(subscriber.type_name))?;
        }
        Ok(())
    }
}

/// Receiving end of a [`LocalEventBus`] subscription
pub struct EventStream<E> {
    receiver: mpsc::UnboundedReceiver<Arc<dyn Value>>,
    _event: PhantomData<fn() -> E>,
}

impl<E: Payload> EventStream<E> {
    pub async fn recv(&mut self) -> Option<Arc<E>> {
        loop {
            let event = self.receiver.recv().await?;
            if let Some(event) = downcast_arc::<E>(event) {
                return Some(event);
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<Arc<E>> {
        while let Ok(event) = self.receiver.try_recv() {
            if let Some(event) = downcast_arc::<E>(event) {
                return Some(event);
            }
        }
        None
    }

    /// Everything delivered so far
    pub fn drain(&mut self) -> Vec<Arc<E>> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

/// Publishes a transaction's events and journals the outcome
pub struct EventPublisher {
    bus: Arc<dyn EventBus>,
}

impl EventPublisher {
    pub fn new(bus: Arc<dyn EventBus>) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &Arc<dyn EventBus> {
        &self.bus
    }

    pub fn publish(
        &self,
        transaction_id: u64,
        time: i64,
        events: &[Arc<dyn Value>],
        journals: &mut JournalsManager,
    ) -> Result<(), EngineError> {
        if events.is_empty() {
            return Ok(());
        }
        let mut failed = false;
        for event in events {
            if let Err(e) = self.bus.publish(Arc::clone(event)) {
                tracing::warn!(transaction_id, error = %e, "event publish failed");
                failed = true;
            }
        }
        record(journals, transaction_id, time, failed)
    }

    /// Publish events of a replayed transaction through `restorer`
    ///
    /// Only events the restorer lets through are journaled again.
    pub fn republish(
        &self,
        restorer: &mut RestorerEventBus,
        transaction_id: u64,
        time: i64,
        events: &[Arc<dyn Value>],
        journals: &mut JournalsManager,
    ) -> Result<usize, EngineError> {
        restorer.set_current_transaction_id(transaction_id);
        let mut published = 0;
        let mut failed = false;
        for event in events {
            match restorer.publish_event(Arc::clone(event)) {
                Ok(true) => published += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(transaction_id, error = %e, "event republish failed");
                    failed = true;
                }
            }
        }
        if published > 0 || failed {
            record(journals, transaction_id, time, failed)?;
        }
        Ok(published)
    }
}

fn record(
    journals: &mut JournalsManager,
    transaction_id: u64,
    time: i64,
    failed: bool,
) -> Result<(), EngineError> {
    let flag = if failed { ASYNC_ERROR_FLAG } else { 0 };
    if failed {
        tracing::info!(transaction_id, "marking events as unpublished");
    }
    journals.write_events(&EventsCommitInfo::new(transaction_id, time, flag), true)?;
    Ok(())
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
