// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Type-keyed binary serialization
//!
//! Every object on the wire is framed as
//! `type key (20) | u32 length | codec id (1) | codec bytes`.
//! The codec id names the member of the chain that produced the bytes, so
//! decoding never has to guess.

mod chain;
mod codec;

pub use chain::SerializerChain;
pub use codec::Codec;

use crate::buffer::BufferError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("type {0} is not registered")]
    Unregistered(&'static str),
    #[error("no type registered for key {0:?}")]
    UnknownKey(crate::value::TypeKey),
    #[error("unknown codec id {0}")]
    UnknownCodec(u8),
    #[error("value is not a {0}")]
    TypeMismatch(&'static str),
    #[error("{codec:?} encode failed: {reason}")]
    Encode { codec: Codec, reason: String },
    #[error("{codec:?} decode failed: {reason}")]
    Decode { codec: Codec, reason: String },
    #[error("no codec in the chain could encode {type_name}: {reason}")]
    AllCodecsFailed {
        type_name: &'static str,
        reason: String,
    },
    #[error("buffer error: {0}")]
    Buffer(#[from] BufferError),
}
