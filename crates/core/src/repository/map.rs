// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{ReadRepository, RepositoryData, RepositoryError, WriteableRepository};
use crate::value::{TypeKey, Value};
use std::sync::Arc;

/// Hash-map backed store with no transaction support
#[derive(Debug, Default)]
pub struct MapRepository {
    data: RepositoryData,
    entity_capacity: usize,
}

impl MapRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size each per-type map for `capacity` entities at `load_factor`
    pub fn with_capacity(capacity: usize, load_factor: f32) -> Self {
        let load_factor = if load_factor > 0.0 { load_factor } else { 0.75 };
        Self {
            data: RepositoryData::new(),
            entity_capacity: (capacity as f32 / load_factor).ceil() as usize,
        }
    }

    pub fn insert(&mut self, key: TypeKey, id: u64, value: Arc<dyn Value>) -> Option<Arc<dyn Value>> {
        self.data.insert_sized(key, id, value, self.entity_capacity)
    }

    pub fn remove(&mut self, key: TypeKey, id: u64) -> Option<Arc<dyn Value>> {
        self.data.remove(key, id)
    }

    /// Mutable access, copying the value first if it is shared
    pub fn get_mut(&mut self, key: TypeKey, id: u64) -> Option<&mut dyn Value> {
        let slot = self.data.get_slot_mut(key, id)?;
        if Arc::get_mut(slot).is_none() {
            *slot = slot.clone_value();
        }
        let value: &mut dyn Value = Arc::get_mut(slot)?;
        Some(value)
    }

    pub fn replace(&mut self, data: RepositoryData) {
        self.data = data;
    }
}

impl ReadRepository for MapRepository {
    fn has(&self, key: TypeKey, id: u64) -> bool {
        self.data.get(key, id).is_some()
    }

    fn get_clean(&self, key: TypeKey, id: u64) -> Option<Arc<dyn Value>> {
        self.data.get(key, id).cloned()
    }

    fn entities_clean(&self, key: TypeKey) -> Vec<(u64, Arc<dyn Value>)> {
        self.data
            .entities(key)
            .map(|entities| entities.iter().map(|(id, v)| (*id, Arc::clone(v))).collect())
            .unwrap_or_default()
    }

    fn entity_types(&self) -> Vec<TypeKey> {
        self.data.iter().map(|(key, _)| *key).collect()
    }

    fn data(&self) -> RepositoryData {
        self.data.clone()
    }
}

impl WriteableRepository for MapRepository {
    fn store_value(
        &mut self,
        key: TypeKey,
        id: u64,
        value: Arc<dyn Value>,
    ) -> Result<Option<Arc<dyn Value>>, RepositoryError> {
        Ok(self.insert(key, id, value))
    }

    fn get_value(&mut self, key: TypeKey, id: u64) -> Result<Option<Arc<dyn Value>>, RepositoryError> {
        Ok(self.get_clean(key, id))
    }

    fn get_value_mut(&mut self, key: TypeKey, id: u64) -> Result<Option<&mut dyn Value>, RepositoryError> {
        Ok(self.get_mut(key, id))
    }

    fn remove_value(&mut self, key: TypeKey, id: u64) -> Result<Option<Arc<dyn Value>>, RepositoryError> {
        Ok(self.remove(key, id))
    }
}
