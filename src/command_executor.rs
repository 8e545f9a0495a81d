// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pooled-exec contributors

//! [`CommandExecutor`]: the uniform backend contract a pool wraps.
//!
//! A pool never talks to a backend (local process, cluster batch system,
//! ...) directly; every wrapper job is driven through this trait so the
//! rest of the crate is backend-agnostic. Implementations must be able to
//! round-trip an [`ExecutorSnapshot`] so a persistent pool can re-attach to
//! a still-running wrapper after the controller restarts.

use crate::error::ExecutorError;
use crate::pipeline_command::WrapperCommand;
use crate::pool_config::PoolConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Coarse-grained liveness state of a backend job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorStatus {
    Queued,
    Running,
    Complete,
    Unknown,
}

/// A serializable reconnection handle for a backend job.
///
/// Persisted alongside a [`PoolConfig`] snapshot so
/// [`crate::persistence::search_for_existing_pools`] can hand a fresh
/// `Box<dyn CommandExecutor>` back the means to re-attach without ever
/// having started it itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExecutorSnapshot {
    /// A local OS process, identified by PID plus the directory its
    /// wrapper script ran in.
    LocalProcess { pid: u32, working_dir: PathBuf },
    /// Extension point for backends this crate doesn't implement
    /// (cluster batch systems, etc.) — carried through opaquely.
    Opaque(serde_json::Value),
}

/// Uniform backend contract: start/wait_for/stop/status/set_job_name.
///
/// Implementations are opaque to the pool beyond this trait; the pool
/// only needs to start one, wait on it, and be able to stop or snapshot
/// it.
pub trait CommandExecutor: Send + Sync {
    /// Begin the backend job. `out`/`err` are paths the backend should
    /// redirect the wrapper's stdout/stderr to.
    fn start(
        &mut self,
        cfg: &PoolConfig,
        cmd: &WrapperCommand,
        out: &Path,
        err: &Path,
    ) -> Result<(), ExecutorError>;

    /// Block until the backend job exits and return its exit code.
    fn wait_for(&mut self) -> Result<i32, ExecutorError>;

    /// Request termination of the backend job.
    fn stop(&mut self) -> Result<(), ExecutorError>;

    /// Current liveness state, used to discard stale persisted descriptors.
    fn status(&self) -> ExecutorStatus;

    /// Best-effort operator-visibility hint; not every backend supports
    /// renaming a job after submission.
    fn set_job_name(&mut self, name: &str) -> Result<(), ExecutorError> {
        let _ = name;
        Err(ExecutorError::Unsupported("set_job_name"))
    }

    /// Capture a reconnection handle for persistence.
    fn snapshot(&self) -> ExecutorSnapshot;
}

/// Builds fresh backend executors and reconnects to previously-persisted
/// ones. One factory per backend kind; `Registry::init_pools` takes one
/// and hands it to every pool it starts.
pub trait ExecutorFactory: Send + Sync {
    fn create(&self) -> Box<dyn CommandExecutor>;

    fn reconnect(&self, snapshot: &ExecutorSnapshot) -> Result<Box<dyn CommandExecutor>, ExecutorError>;
}

#[cfg(test)]
#[path = "command_executor_tests.rs"]
mod tests;
