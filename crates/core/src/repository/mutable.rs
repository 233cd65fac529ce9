// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transactional repository for in-place (mutable) domain models
//!
//! Pre-images are serialized into a scratch buffer on first touch of each
//! `(type, id)` within a transaction. Each undo record is laid out as
//! `state u8 | id u64 | override u8 [| type key (20)] | object`.

use super::{
    MapRepository, ReadRepository, RepositoryData, RepositoryError, TransactionScope,
    TxRepository, WriteableRepository,
};
use crate::buffer::Buffer;
use crate::serializer::SerializerChain;
use crate::value::{TypeKey, Value, TYPE_KEY_LEN};
use std::collections::HashSet;
use std::sync::Arc;

/// Inverse operation recorded for one entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UndoState {
    /// Entity was removed; undo re-inserts it
    Add = 1,
    /// Entity was added; undo removes it
    Remove = 2,
    /// Entity may be modified; undo restores the pre-image
    Update = 3,
}

impl UndoState {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(UndoState::Add),
            2 => Some(UndoState::Remove),
            3 => Some(UndoState::Update),
            _ => None,
        }
    }
}

struct UndoRecord {
    state: UndoState,
    id: u64,
    key: Option<TypeKey>,
    value: Arc<dyn Value>,
}

pub struct MutableModelRepository {
    inner: MapRepository,
    chain: Arc<SerializerChain>,
    undo: Buffer,
    stashed: HashSet<(TypeKey, u64)>,
    records: usize,
}

impl MutableModelRepository {
    pub fn new(inner: MapRepository, chain: Arc<SerializerChain>) -> Self {
        Self {
            inner,
            chain,
            undo: Buffer::with_capacity(4096),
            stashed: HashSet::new(),
            records: 0,
        }
    }

    /// Number of undo records held by the open transaction
    pub fn undo_len(&self) -> usize {
        self.records
    }

    fn capture(
        &mut self,
        state: UndoState,
        key: TypeKey,
        id: u64,
        value: &Arc<dyn Value>,
    ) -> Result<(), RepositoryError> {
        if self.stashed.contains(&(key, id)) {
            return Ok(());
        }

        let start = self.undo.len();
        self.undo.write_u8(state as u8);
        self.undo.write_u64(id);
        if key == TypeKey::of_value(value.as_ref()) {
            self.undo.write_u8(0);
        } else {
            self.undo.write_u8(1);
            self.undo.write_bytes(key.as_bytes());
        }
        if let Err(e) = self.chain.serialize_object(value.as_ref(), &mut self.undo) {
            self.undo.truncate(start);
            return Err(e.into());
        }

        self.stashed.insert((key, id));
        self.records += 1;
        Ok(())
    }

    fn read_record(chain: &SerializerChain, undo: &mut Buffer) -> Result<UndoRecord, RepositoryError> {
        let raw_state = undo.read_u8()?;
        let state = UndoState::from_u8(raw_state).ok_or(RepositoryError::CorruptUndo(raw_state))?;
        let id = undo.read_u64()?;
        let key = match undo.read_u8()? {
            0 => None,
            _ => Some(TypeKey::from_bytes(undo.read_array::<TYPE_KEY_LEN>()?)),
        };
        let value = chain.deserialize_object(undo)?;
        Ok(UndoRecord {
            state,
            id,
            key,
            value,
        })
    }

    fn resolve_key(&self, record: &UndoRecord) -> TypeKey {
        let runtime = TypeKey::of_value(record.value.as_ref());
        match record.key {
            Some(key) if self.chain.type_name(key).is_some() => key,
            Some(key) => {
                tracing::warn!(
                    ?key,
                    id = record.id,
                    fallback = record.value.type_name(),
                    "undo record type is not registered, restoring under the value's own type"
                );
                runtime
            }
            None => runtime,
        }
    }

    fn rollback_undo(&mut self) {
        self.undo.set_reader_position(0);
        for _ in 0..self.records {
            let record = match Self::read_record(&self.chain, &mut self.undo) {
                Ok(record) => record,
                Err(e) => {
                    tracing::error!(error = %e, "undo log unreadable, rollback incomplete");
                    break;
                }
            };
            let key = self.resolve_key(&record);
            match record.state {
                UndoState::Add | UndoState::Update => {
                    self.inner.insert(key, record.id, record.value);
                }
                UndoState::Remove => {
                    self.inner.remove(key, record.id);
                }
            }
        }
        self.clear_undo();
    }

    fn clear_undo(&mut self) {
        self.undo.clear();
        self.stashed.clear();
        self.records = 0;
    }
}

impl ReadRepository for MutableModelRepository {
    fn has(&self, key: TypeKey, id: u64) -> bool {
        self.inner.has(key, id)
    }

    fn get_clean(&self, key: TypeKey, id: u64) -> Option<Arc<dyn Value>> {
        self.inner.get_clean(key, id)
    }

    fn entities_clean(&self, key: TypeKey) -> Vec<(u64, Arc<dyn Value>)> {
        self.inner.entities_clean(key)
    }

    fn entity_types(&self) -> Vec<TypeKey> {
        self.inner.entity_types()
    }

    fn data(&self) -> RepositoryData {
        self.inner.data()
    }
}

impl TxRepository for MutableModelRepository {
    fn begin(&mut self) -> Box<dyn TransactionScope + '_> {
        self.clear_undo();
        Box::new(MutableScope {
            repo: self,
            finished: false,
        })
    }

    fn load(&mut self, data: RepositoryData) {
        self.clear_undo();
        self.inner.replace(data);
    }
}

struct MutableScope<'a> {
    repo: &'a mut MutableModelRepository,
    finished: bool,
}

impl ReadRepository for MutableScope<'_> {
    fn has(&self, key: TypeKey, id: u64) -> bool {
        self.repo.has(key, id)
    }

    fn get_clean(&self, key: TypeKey, id: u64) -> Option<Arc<dyn Value>> {
        self.repo.get_clean(key, id)
    }

    fn entities_clean(&self, key: TypeKey) -> Vec<(u64, Arc<dyn Value>)> {
        self.repo.entities_clean(key)
    }

    fn entity_types(&self) -> Vec<TypeKey> {
        self.repo.entity_types()
    }

    fn data(&self) -> RepositoryData {
        self.repo.data()
    }
}

impl WriteableRepository for MutableScope<'_> {
    fn store_value(
        &mut self,
        key: TypeKey,
        id: u64,
        value: Arc<dyn Value>,
    ) -> Result<Option<Arc<dyn Value>>, RepositoryError> {
        match self.repo.inner.get_clean(key, id) {
            Some(prior) => self.repo.capture(UndoState::Update, key, id, &prior)?,
            None => self.repo.capture(UndoState::Remove, key, id, &value)?,
        }
        Ok(self.repo.inner.insert(key, id, value))
    }

    fn get_value(&mut self, key: TypeKey, id: u64) -> Result<Option<Arc<dyn Value>>, RepositoryError> {
        let value = self.repo.inner.get_clean(key, id);
        if let Some(value) = &value {
            self.repo.capture(UndoState::Update, key, id, value)?;
        }
        Ok(value)
    }

    fn get_value_mut(&mut self, key: TypeKey, id: u64) -> Result<Option<&mut dyn Value>, RepositoryError> {
        if let Some(value) = self.repo.inner.get_clean(key, id) {
            self.repo.capture(UndoState::Update, key, id, &value)?;
        }
        Ok(self.repo.inner.get_mut(key, id))
    }

    fn remove_value(&mut self, key: TypeKey, id: u64) -> Result<Option<Arc<dyn Value>>, RepositoryError> {
        if let Some(value) = self.repo.inner.get_clean(key, id) {
            self.repo.capture(UndoState::Add, key, id, &value)?;
        }
        Ok(self.repo.inner.remove(key, id))
    }
}

impl TransactionScope for MutableScope<'_> {
    fn commit(mut self: Box<Self>) {
        self.finished = true;
        self.repo.clear_undo();
    }

    fn rollback(mut self: Box<Self>) {
        self.finished = true;
        self.repo.rollback_undo();
    }
}

impl Drop for MutableScope<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(
                records = self.repo.records,
                "transaction scope dropped without commit, rolling back"
            );
            self.repo.rollback_undo();
        }
    }
}

#[cfg(test)]
#[path = "mutable_tests.rs"]
mod tests;
