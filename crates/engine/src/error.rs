// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine

use cairn_core::{ConfigError, RepositoryError, SerializeError, SnapshotError};
use cairn_storage::{JournalError, StorageError};
use std::fmt;
use thiserror::Error;

/// Lifecycle of an [`Engine`](crate::Engine)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Created,
    Restoring,
    Running,
    ShuttingDown,
    Stopped,
    /// A journal write failed; only shutdown is accepted
    Failed,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Created => "created",
            EngineState::Restoring => "restoring",
            EngineState::Running => "running",
            EngineState::ShuttingDown => "shutting down",
            EngineState::Stopped => "stopped",
            EngineState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Errors raised by transaction action handlers
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("command is not a {0}")]
    TypeMismatch(&'static str),
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl ActionError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        ActionError::Rejected(reason.into())
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("subscriber for {0} has gone away")]
    Closed(&'static str),
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine is restoring or shutting down; retry later
    #[error("engine is not accepting commands ({0})")]
    NotAccepting(EngineState),
    #[error("action failed: {0}")]
    Action(#[from] ActionError),
    #[error("no transaction action registered for {0}")]
    NoHandler(&'static str),
    #[error("journal error: {0}")]
    Journal(#[from] JournalError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("serialization error: {0}")]
    Serialize(#[from] SerializeError),
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
