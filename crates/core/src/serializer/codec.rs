// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::SerializeError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A member of the serializer chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    /// Compact schema-driven encoding; rejects shapes without a known length
    Bincode,
    /// Self-describing general-purpose encoding
    Json,
}

impl Codec {
    pub fn id(self) -> u8 {
        match self {
            Codec::Bincode => 1,
            Codec::Json => 2,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Codec::Bincode),
            2 => Some(Codec::Json),
            _ => None,
        }
    }

    pub fn encode<T: Serialize>(self, value: &T) -> Result<Vec<u8>, SerializeError> {
        match self {
            Codec::Bincode => bincode::serde::encode_to_vec(value, bincode::config::standard())
                .map_err(|e| SerializeError::Encode {
                    codec: self,
                    reason: e.to_string(),
                }),
            Codec::Json => serde_json::to_vec(value).map_err(|e| SerializeError::Encode {
                codec: self,
                reason: e.to_string(),
            }),
        }
    }

    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T, SerializeError> {
        match self {
            Codec::Bincode => {
                bincode::serde::decode_from_slice::<T, _>(bytes, bincode::config::standard())
                    .map(|(value, _)| value)
                    .map_err(|e| SerializeError::Decode {
                        codec: self,
                        reason: e.to_string(),
                    })
            }
            Codec::Json => serde_json::from_slice(bytes).map_err(|e| SerializeError::Decode {
                codec: self,
                reason: e.to_string(),
            }),
        }
    }
}
