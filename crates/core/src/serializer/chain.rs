// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{Codec, SerializeError};
use crate::buffer::{Buffer, BufferError};
use crate::commit::{EventsCommitInfo, SystemInfo, TransactionCommitInfo};
use crate::repository::RepositoryData;
use crate::value::{Payload, TypeKey, Value, TYPE_KEY_LEN};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

type EncodeFn = fn(&dyn Value, Codec) -> Result<Vec<u8>, SerializeError>;
type DecodeFn = fn(&[u8], Codec) -> Result<Arc<dyn Value>, SerializeError>;

#[derive(Clone, Copy)]
struct TypeHandler {
    name: &'static str,
    encode: EncodeFn,
    decode: DecodeFn,
}

fn encode_as<T: Payload>(value: &dyn Value, codec: Codec) -> Result<Vec<u8>, SerializeError> {
    let typed = value
        .as_any()
        .downcast_ref::<T>()
        .ok_or(SerializeError::TypeMismatch(T::TYPE_NAME))?;
    codec.encode(typed)
}

fn decode_as<T: Payload>(bytes: &[u8], codec: Codec) -> Result<Arc<dyn Value>, SerializeError> {
    let value: T = codec.decode(bytes)?;
    Ok(Arc::new(value))
}

/// Registry of journaled types plus an ordered list of codecs
///
/// Encoding tries each codec in priority order and keeps the first whose
/// bytes decode again. The winning codec's id is stored with the bytes and
/// decoding uses exactly that codec.
pub struct SerializerChain {
    codecs: Vec<Codec>,
    registry: RwLock<HashMap<TypeKey, TypeHandler>>,
}

impl SerializerChain {
    pub fn new(codecs: impl IntoIterator<Item = Codec>) -> Self {
        let chain = Self {
            codecs: codecs.into_iter().collect(),
            registry: RwLock::new(HashMap::new()),
        };
        chain.register::<SystemInfo>();
        chain
    }

    pub fn codecs(&self) -> &[Codec] {
        &self.codecs
    }

    /// Register a type for journaling; registering twice is a no-op
    pub fn register<T: Payload>(&self) -> TypeKey {
        let key = TypeKey::of::<T>();
        let mut registry = self.registry.write().unwrap_or_else(|e| e.into_inner());
        registry.entry(key).or_insert(TypeHandler {
            name: T::TYPE_NAME,
            encode: encode_as::<T>,
            decode: decode_as::<T>,
        });
        key
    }

    /// Register `T` under an explicit repository type name
    ///
    /// Entities stored under an alias key keep that key across rollback
    /// only while the alias is registered.
    pub fn register_as<T: Payload>(&self, name: &'static str) -> TypeKey {
        self.register::<T>();
        let key = TypeKey::from_name(name);
        let mut registry = self.registry.write().unwrap_or_else(|e| e.into_inner());
        registry.entry(key).or_insert(TypeHandler {
            name,
            encode: encode_as::<T>,
            decode: decode_as::<T>,
        });
        key
    }

    pub fn is_registered<T: Payload>(&self) -> bool {
        self.type_name(TypeKey::of::<T>()).is_some()
    }

    /// Name of the type registered under `key`
    pub fn type_name(&self, key: TypeKey) -> Option<&'static str> {
        self.handler(key).map(|h| h.name)
    }

    fn handler(&self, key: TypeKey) -> Option<TypeHandler> {
        self.registry
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
            .copied()
    }

    pub fn serialize_object(&self, value: &dyn Value, buffer: &mut Buffer) -> Result<(), SerializeError> {
        let key = TypeKey::of_value(value);
        let handler = self
            .handler(key)
            .ok_or(SerializeError::Unregistered(value.type_name()))?;

        let mut last_error = None;
        for &codec in &self.codecs {
            // Some shapes encode under a codec that cannot read them back
            let checked = (handler.encode)(value, codec)
                .and_then(|bytes| (handler.decode)(&bytes, codec).map(|_| bytes));
            match checked {
                Ok(bytes) => {
                    buffer.write_bytes(key.as_bytes());
                    let mark = buffer.mark_size();
                    buffer.write_u8(codec.id());
                    buffer.write_bytes(&bytes);
                    buffer.write_size(mark);
                    return Ok(());
                }
                Err(e) => {
                    tracing::debug!(type_name = handler.name, ?codec, error = %e, "codec rejected value");
                    last_error = Some(e);
                }
            }
        }

        Err(SerializeError::AllCodecsFailed {
            type_name: handler.name,
            reason: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "empty codec chain".to_string()),
        })
    }

    pub fn deserialize_object(&self, buffer: &mut Buffer) -> Result<Arc<dyn Value>, SerializeError> {
        let key = TypeKey::from_bytes(buffer.read_array::<TYPE_KEY_LEN>()?);
        let len = buffer.read_u32()? as usize;
        let handler = self.handler(key).ok_or(SerializeError::UnknownKey(key))?;
        let payload = buffer.read_bytes(len)?;
        let (&codec_id, bytes) = payload.split_first().ok_or(BufferError::OutOfBounds {
            position: 0,
            requested: 1,
            available: 0,
        })?;
        let codec = Codec::from_id(codec_id).ok_or(SerializeError::UnknownCodec(codec_id))?;
        (handler.decode)(bytes, codec)
    }

    fn serialize_objects(
        &self,
        values: &[Arc<dyn Value>],
        buffer: &mut Buffer,
    ) -> Result<(), SerializeError> {
        buffer.write_u32(values.len() as u32);
        for value in values {
            self.serialize_object(value.as_ref(), buffer)?;
        }
        Ok(())
    }

    fn deserialize_objects(&self, buffer: &mut Buffer) -> Result<Vec<Arc<dyn Value>>, SerializeError> {
        let count = buffer.read_u32()? as usize;
        let mut values = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            values.push(self.deserialize_object(buffer)?);
        }
        Ok(values)
    }

    pub fn serialize_commands(
        &self,
        commands: &[Arc<dyn Value>],
        buffer: &mut Buffer,
    ) -> Result<(), SerializeError> {
        self.serialize_objects(commands, buffer)
    }

    pub fn deserialize_commands(&self, buffer: &mut Buffer) -> Result<Vec<Arc<dyn Value>>, SerializeError> {
        self.deserialize_objects(buffer)
    }

    pub fn serialize_transaction(
        &self,
        info: &TransactionCommitInfo,
        buffer: &mut Buffer,
    ) -> Result<(), SerializeError> {
        buffer.write_u64(info.transaction_id);
        buffer.write_i64(info.time);
        buffer.write_nullable_u64(info.flag);
        buffer.write_nullable_u64(info.tag);
        self.serialize_objects(&info.commits, buffer)
    }

    /// Decode one transaction record
    ///
    /// A record whose id and time are both zero is unwritten space and is
    /// reported as [`BufferError::OutOfBounds`].
    pub fn deserialize_transaction(
        &self,
        buffer: &mut Buffer,
    ) -> Result<TransactionCommitInfo, SerializeError> {
        let (transaction_id, time) = read_header(buffer)?;
        let flag = buffer.read_nullable_u64()?;
        let tag = buffer.read_nullable_u64()?;
        let commits = self.deserialize_objects(buffer)?;
        Ok(TransactionCommitInfo {
            transaction_id,
            time,
            flag,
            tag,
            commits,
        })
    }

    pub fn serialize_events_commit(&self, info: &EventsCommitInfo, buffer: &mut Buffer) {
        buffer.write_u64(info.transaction_id);
        buffer.write_i64(info.time);
        buffer.write_nullable_u64(info.flag);
    }

    pub fn deserialize_events_commit(
        &self,
        buffer: &mut Buffer,
    ) -> Result<EventsCommitInfo, SerializeError> {
        let (transaction_id, time) = read_header(buffer)?;
        let flag = buffer.read_nullable_u64()?;
        Ok(EventsCommitInfo::new(transaction_id, time, flag))
    }

    pub fn serialize_repository(
        &self,
        data: &RepositoryData,
        buffer: &mut Buffer,
    ) -> Result<(), SerializeError> {
        buffer.write_u32(data.type_count() as u32);
        for (key, entities) in data.iter() {
            buffer.write_bytes(key.as_bytes());
            buffer.write_u32(entities.len() as u32);
            for (id, value) in entities {
                buffer.write_u64(*id);
                self.serialize_object(value.as_ref(), buffer)?;
            }
        }
        Ok(())
    }

    pub fn deserialize_repository(&self, buffer: &mut Buffer) -> Result<RepositoryData, SerializeError> {
        let mut data = RepositoryData::new();
        let types = buffer.read_u32()?;
        for _ in 0..types {
            let key = TypeKey::from_bytes(buffer.read_array::<TYPE_KEY_LEN>()?);
            let count = buffer.read_u32()?;
            for _ in 0..count {
                let id = buffer.read_u64()?;
                let value = self.deserialize_object(buffer)?;
                data.insert(key, id, value);
            }
        }
        Ok(data)
    }
}

impl Default for SerializerChain {
    fn default() -> Self {
        Self::new([Codec::Bincode, Codec::Json])
    }
}

fn read_header(buffer: &mut Buffer) -> Result<(u64, i64), SerializeError> {
    let position = buffer.reader_position();
    let transaction_id = buffer.read_u64()?;
    let time = buffer.read_i64()?;
    if transaction_id == 0 && time == 0 {
        return Err(BufferError::OutOfBounds {
            position,
            requested: 16,
            available: 0,
        }
        .into());
    }
    Ok((transaction_id, time))
}

#[cfg(test)]
#[path = "chain_tests.rs"]
mod tests;
