// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dynamically typed values and their stable wire keys

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Width of a type key on the wire
pub const TYPE_KEY_LEN: usize = 20;

/// Stable 20-byte key derived from a payload's registered type name
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey([u8; TYPE_KEY_LEN]);

impl TypeKey {
    pub fn from_name(name: &str) -> Self {
        let digest = Sha256::digest(name.as_bytes());
        let mut key = [0u8; TYPE_KEY_LEN];
        key.copy_from_slice(&digest[..TYPE_KEY_LEN]);
        Self(key)
    }

    pub fn of<T: Payload>() -> Self {
        Self::from_name(T::TYPE_NAME)
    }

    /// Key of the value's own runtime type
    pub fn of_value(value: &dyn Value) -> Self {
        Self::from_name(value.type_name())
    }

    pub fn from_bytes(bytes: [u8; TYPE_KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; TYPE_KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey(")?;
        for byte in &self.0[..4] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "..)")
    }
}

/// An entity or command payload held behind a trait object
///
/// Implemented for every [`Payload`].
pub trait Value: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
    fn clone_value(&self) -> Arc<dyn Value>;
    fn type_name(&self) -> &'static str;
}

impl<T: Payload> Value for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn clone_value(&self) -> Arc<dyn Value> {
        Arc::new(self.clone())
    }

    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }
}

/// Typed payloads that can be registered, stored, and journaled
///
/// ```ignore
/// impl Payload for Account {
///     const TYPE_NAME: &'static str = "bank.Account";
/// }
/// ```
pub trait Payload: Any + Send + Sync + fmt::Debug + Clone + Serialize + DeserializeOwned {
    /// Name the wire key is hashed from
    ///
    /// Journals and snapshots refer to the type by this name, so it must
    /// not change once data has been written.
    const TYPE_NAME: &'static str;
}

/// Downcast a shared value to a concrete payload type
pub fn downcast_arc<T: Payload>(value: Arc<dyn Value>) -> Option<Arc<T>> {
    value.into_any_arc().downcast::<T>().ok()
}

#[cfg(test)]
#[path = "value_tests.rs"]
mod tests;
