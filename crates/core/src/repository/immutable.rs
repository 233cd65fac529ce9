// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transactional repository for copy-on-write (immutable) domain models
//!
//! Values are never changed behind a shared pointer, so undo only needs
//! the prior `Arc` of each touched entity.

use super::{
    MapRepository, ReadRepository, RepositoryData, RepositoryError, TransactionScope,
    TxRepository, WriteableRepository,
};
use crate::value::{TypeKey, Value};
use std::collections::HashSet;
use std::sync::Arc;

pub struct ImmutableModelRepository {
    inner: MapRepository,
    prior: Vec<(TypeKey, u64, Option<Arc<dyn Value>>)>,
    touched: HashSet<(TypeKey, u64)>,
}

impl ImmutableModelRepository {
    pub fn new(inner: MapRepository) -> Self {
        Self {
            inner,
            prior: Vec::new(),
            touched: HashSet::new(),
        }
    }

    fn capture(&mut self, key: TypeKey, id: u64) {
        if self.touched.insert((key, id)) {
            let prior = self.inner.get_clean(key, id);
            self.prior.push((key, id, prior));
        }
    }

    fn restore(&mut self) {
        for (key, id, prior) in self.prior.drain(..).rev() {
            match prior {
                Some(value) => {
                    self.inner.insert(key, id, value);
                }
                None => {
                    self.inner.remove(key, id);
                }
            }
        }
        self.touched.clear();
    }

    fn forget(&mut self) {
        self.prior.clear();
        self.touched.clear();
    }
}

impl ReadRepository for ImmutableModelRepository {
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

impl TxRepository for ImmutableModelRepository {
    fn begin(&mut self) -> Box<dyn TransactionScope + '_> {
        self.forget();
        Box::new(ImmutableScope {
            repo: self,
            finished: false,
        })
    }

    fn load(&mut self, data: RepositoryData) {
        self.forget();
        self.inner.replace(data);
    }
}

struct ImmutableScope<'a> {
    repo: &'a mut ImmutableModelRepository,
    finished: bool,
}

impl ReadRepository for ImmutableScope<'_> {
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

impl WriteableRepository for ImmutableScope<'_> {
    fn store_value(
        &mut self,
        key: TypeKey,
        id: u64,
        value: Arc<dyn Value>,
    ) -> Result<Option<Arc<dyn Value>>, RepositoryError> {
        self.repo.capture(key, id);
        Ok(self.repo.inner.insert(key, id, value))
    }

    fn get_value(&mut self, key: TypeKey, id: u64) -> Result<Option<Arc<dyn Value>>, RepositoryError> {
        Ok(self.repo.inner.get_clean(key, id))
    }

    /// The captured pre-image keeps the old `Arc` alive, so the map copies
    /// before handing out a mutable borrow
    fn get_value_mut(&mut self, key: TypeKey, id: u64) -> Result<Option<&mut dyn Value>, RepositoryError> {
        self.repo.capture(key, id);
        Ok(self.repo.inner.get_mut(key, id))
    }

    fn remove_value(&mut self, key: TypeKey, id: u64) -> Result<Option<Arc<dyn Value>>, RepositoryError> {
        self.repo.capture(key, id);
        Ok(self.repo.inner.remove(key, id))
    }
}

impl TransactionScope for ImmutableScope<'_> {
    fn commit(mut self: Box<Self>) {
        self.finished = true;
        self.repo.forget();
    }

    fn rollback(mut self: Box<Self>) {
        self.finished = true;
        self.repo.restore();
    }
}

impl Drop for ImmutableScope<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(
                touched = self.repo.touched.len(),
                "transaction scope dropped without commit, rolling back"
            );
            self.repo.restore();
        }
    }
}
