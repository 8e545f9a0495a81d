// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pooled-exec contributors

//! Error types for each fallible boundary in the pool.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from a [`crate::command_executor::CommandExecutor`] implementation.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("io error on backend executor: {0}")]
    Io(#[from] std::io::Error),

    #[error("backend stop failed: {0}")]
    BackendStopFailure(String),

    #[error("operation unsupported by this backend: {0}")]
    Unsupported(&'static str),
}

/// Errors from the filesystem-mediated wrapper protocol.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("io error in wrapper protocol at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("exit file for command {command_id} did not parse as an integer: {raw:?}")]
    ExitFileMalformed { command_id: String, raw: String },
}

/// Errors from serializing/deserializing persisted [`PooledExecutor`](crate::pooled_executor::PooledExecutor) descriptors.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error reading descriptor {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to deserialize descriptor {path}: {source}")]
    DeserializationFailure {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors surfaced by [`crate::executor_pool::ExecutorPool`] and [`crate::pooled_executor::PooledExecutor`] operations.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("executor already occupied by command {0}")]
    AlreadyOccupied(String),

    #[error("no compatible idle executor in pool {0}")]
    NoCompatibleExecutor(String),

    #[error("failed to provision a new wrapper for pool {pool}: {reason}")]
    ProvisioningFailure { pool: String, reason: String },
}

/// Crate-level error returned by [`crate::registry::Registry`] entry points.
#[derive(Debug, Error)]
pub enum PreallocateError {
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("pool config error: {0}")]
    Config(String),

    #[error("duplicate pool name: {0}")]
    DuplicatePool(String),
}

/// Raised by [`crate::pool_config::walltime_from_str`] when a walltime
/// string doesn't match the expected `HH:MM:SS` shape.
#[derive(Debug, Error)]
#[error("invalid walltime {raw:?}: {reason}")]
pub struct ParseWalltimeError {
    pub raw: String,
    pub reason: String,
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
