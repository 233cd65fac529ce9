// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

//! cairn-core: building blocks of the cairn transactional storage engine
//!
//! This crate provides:
//! - A little-endian byte `Buffer` and the append-only `Channel` contract
//! - Type-keyed dynamic values and the fallback `SerializerChain`
//! - Transaction and events commit records
//! - The transactional repository (mutable and immutable models)
//! - The snapshotter contract and engine configuration

pub mod buffer;
pub mod channel;
pub mod clock;
pub mod commit;
pub mod config;
pub mod range;
pub mod repository;
pub mod serializer;
pub mod snapshot;
pub mod value;

pub use buffer::{Buffer, BufferError};
pub use channel::{Channel, ChannelError};
pub use clock::{Clock, FakeClock, SystemClock};
pub use commit::{
    EventsCommitInfo, SystemInfo, TransactionCommitInfo, ASYNC_ERROR_FLAG, SNAPSHOTTING_FLAG,
};
pub use config::{
    ChannelMode, ConfigError, EngineConfig, JournalingConfig, ModelType, RepositoryConfig,
    SnapshottingConfig,
};
pub use range::LongRange;
pub use repository::{
    ImmutableModelRepository, MapRepository, MutableModelRepository, QueryExt, ReadRepository,
    RepositoryData, RepositoryError, RepositoryExt, TransactionScope, TxRepository, UndoState,
    WriteableRepository,
};
pub use serializer::{Codec, SerializeError, SerializerChain};
pub use snapshot::{RepositorySnapshotter, SnapshotError, SnapshotIdentifier};
pub use value::{downcast_arc, Payload, TypeKey, Value};
