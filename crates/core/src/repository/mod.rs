// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory entity repository with transactional wrappers
//!
//! Entities are addressed by `(TypeKey, id)`. The base [`MapRepository`]
//! has no transaction support; [`MutableModelRepository`] and
//! [`ImmutableModelRepository`] hand out a [`TransactionScope`] from
//! `begin()` that either commits or rolls back every change made through it.

mod immutable;
mod map;
mod mutable;

pub use immutable::ImmutableModelRepository;
pub use map::MapRepository;
pub use mutable::{MutableModelRepository, UndoState};

use crate::buffer::BufferError;
use crate::commit::SystemInfo;
use crate::serializer::SerializeError;
use crate::value::{downcast_arc, Payload, TypeKey, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("undo capture failed: {0}")]
    Serialize(#[from] SerializeError),
    #[error("undo buffer error: {0}")]
    Buffer(#[from] BufferError),
    #[error("corrupt undo record state {0}")]
    CorruptUndo(u8),
}

/// Plain copy of repository contents: type key to id to value
#[derive(Debug, Clone, Default)]
pub struct RepositoryData {
    types: HashMap<TypeKey, HashMap<u64, Arc<dyn Value>>>,
}

impl RepositoryData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: TypeKey, id: u64, value: Arc<dyn Value>) -> Option<Arc<dyn Value>> {
        self.types.entry(key).or_default().insert(id, value)
    }

    pub(crate) fn insert_sized(
        &mut self,
        key: TypeKey,
        id: u64,
        value: Arc<dyn Value>,
        capacity: usize,
    ) -> Option<Arc<dyn Value>> {
        self.types
            .entry(key)
            .or_insert_with(|| HashMap::with_capacity(capacity))
            .insert(id, value)
    }

    pub fn get(&self, key: TypeKey, id: u64) -> Option<&Arc<dyn Value>> {
        self.types.get(&key)?.get(&id)
    }

    pub(crate) fn get_slot_mut(&mut self, key: TypeKey, id: u64) -> Option<&mut Arc<dyn Value>> {
        self.types.get_mut(&key)?.get_mut(&id)
    }

    pub fn remove(&mut self, key: TypeKey, id: u64) -> Option<Arc<dyn Value>> {
        let entities = self.types.get_mut(&key)?;
        let removed = entities.remove(&id);
        if entities.is_empty() {
            self.types.remove(&key);
        }
        removed
    }

    pub fn entities(&self, key: TypeKey) -> Option<&HashMap<u64, Arc<dyn Value>>> {
        self.types.get(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TypeKey, &HashMap<u64, Arc<dyn Value>>)> {
        self.types.iter()
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Total number of entities across all types
    pub fn len(&self) -> usize {
        self.types.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn system_info(&self) -> Option<SystemInfo> {
        self.get(TypeKey::of::<SystemInfo>(), SystemInfo::ID)
            .and_then(|v| v.as_any().downcast_ref::<SystemInfo>().copied())
    }

    pub fn set_system_info(&mut self, info: SystemInfo) {
        self.insert(TypeKey::of::<SystemInfo>(), SystemInfo::ID, Arc::new(info));
    }

    /// Strip the reserved snapshot record, returning it
    pub fn take_system_info(&mut self) -> Option<SystemInfo> {
        let info = self.system_info();
        self.types.remove(&TypeKey::of::<SystemInfo>());
        info
    }
}

/// Reads that never enter the undo path
pub trait ReadRepository {
    fn has(&self, key: TypeKey, id: u64) -> bool;
    fn get_clean(&self, key: TypeKey, id: u64) -> Option<Arc<dyn Value>>;
    fn entities_clean(&self, key: TypeKey) -> Vec<(u64, Arc<dyn Value>)>;
    fn entity_types(&self) -> Vec<TypeKey>;
    fn data(&self) -> RepositoryData;
}

pub trait WriteableRepository: ReadRepository {
    /// Store a value, returning the one it replaced
    fn store_value(
        &mut self,
        key: TypeKey,
        id: u64,
        value: Arc<dyn Value>,
    ) -> Result<Option<Arc<dyn Value>>, RepositoryError>;

    /// Read an entity that the caller may go on to modify
    fn get_value(&mut self, key: TypeKey, id: u64) -> Result<Option<Arc<dyn Value>>, RepositoryError>;

    /// Borrow an entity for in-place modification
    fn get_value_mut(&mut self, key: TypeKey, id: u64) -> Result<Option<&mut dyn Value>, RepositoryError>;

    fn remove_value(&mut self, key: TypeKey, id: u64) -> Result<Option<Arc<dyn Value>>, RepositoryError>;
}

/// An open transaction over a repository
///
/// Dropping a scope without calling `commit` rolls it back.
pub trait TransactionScope: WriteableRepository {
    fn commit(self: Box<Self>);
    fn rollback(self: Box<Self>);
}

/// A repository that supports transactions
pub trait TxRepository: ReadRepository + Send {
    fn begin(&mut self) -> Box<dyn TransactionScope + '_>;

    /// Replace the contents, discarding everything held before
    fn load(&mut self, data: RepositoryData);
}

/// Typed helpers over [`WriteableRepository`]
pub trait RepositoryExt: WriteableRepository {
    fn store<T: Payload>(&mut self, id: u64, value: T) -> Result<Option<Arc<dyn Value>>, RepositoryError> {
        self.store_value(TypeKey::of::<T>(), id, Arc::new(value))
    }

    /// Store under an explicit type key instead of the value's own
    fn store_as<T: Payload>(
        &mut self,
        key: TypeKey,
        id: u64,
        value: T,
    ) -> Result<Option<Arc<dyn Value>>, RepositoryError> {
        self.store_value(key, id, Arc::new(value))
    }

    fn get<T: Payload>(&mut self, id: u64) -> Result<Option<Arc<T>>, RepositoryError> {
        Ok(self.get_value(TypeKey::of::<T>(), id)?.and_then(downcast_arc::<T>))
    }

    fn get_mut<T: Payload>(&mut self, id: u64) -> Result<Option<&mut T>, RepositoryError> {
        Ok(self
            .get_value_mut(TypeKey::of::<T>(), id)?
            .and_then(|v| v.as_any_mut().downcast_mut::<T>()))
    }

    fn remove<T: Payload>(&mut self, id: u64) -> Result<Option<Arc<T>>, RepositoryError> {
        Ok(self.remove_value(TypeKey::of::<T>(), id)?.and_then(downcast_arc::<T>))
    }
}

impl<R: WriteableRepository + ?Sized> RepositoryExt for R {}

/// Typed helpers over [`ReadRepository`]
pub trait QueryExt: ReadRepository {
    fn contains<T: Payload>(&self, id: u64) -> bool {
        self.has(TypeKey::of::<T>(), id)
    }

    fn find<T: Payload>(&self, id: u64) -> Option<Arc<T>> {
        self.get_clean(TypeKey::of::<T>(), id).and_then(downcast_arc::<T>)
    }

    fn all<T: Payload>(&self) -> Vec<(u64, Arc<T>)> {
        let mut all: Vec<_> = self
            .entities_clean(TypeKey::of::<T>())
            .into_iter()
            .filter_map(|(id, v)| downcast_arc::<T>(v).map(|v| (id, v)))
            .collect();
        all.sort_by_key(|(id, _)| *id);
        all
    }

    fn count<T: Payload>(&self) -> usize {
        self.entities_clean(TypeKey::of::<T>()).len()
    }
}

impl<R: ReadRepository + ?Sized> QueryExt for R {}

#[cfg(test)]
#[path = "repository_tests.rs"]
mod tests;
