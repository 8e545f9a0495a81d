// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pooled-exec contributors

//! Persistence of [`PooledExecutor`](crate::pooled_executor::PooledExecutor)
//! descriptors, and rediscovery of still-running wrappers on controller
//! startup (§4.4).
//!
//! What's persisted: the backend [`ExecutorSnapshot`], the [`PoolConfig`]
//! snapshot, the [`WrapperCommand`], and the host command id. Deliberately
//! NOT persisted: `output_log`, `current_command_id`, `on_finish` — all
//! transient, reconstructed by [`connect_pooled_executor`].

use crate::clock::Clock;
use crate::command_executor::{ExecutorFactory, ExecutorSnapshot, ExecutorStatus};
use crate::error::PersistenceError;
use crate::id::HostCommandId;
use crate::pipeline_command::WrapperCommand;
use crate::pool_config::PoolConfig;
use crate::pooled_executor::PooledExecutor;
use crate::protocol::WrapperProtocol;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything needed to reconstitute a [`PooledExecutor`] after a
/// restart, minus its transient fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PooledExecutorDescriptor {
    pub host_command_id: HostCommandId,
    pub pool_config: PoolConfig,
    pub wrapper_command: WrapperCommand,
    pub executor_snapshot: ExecutorSnapshot,
}

fn descriptor_path(pools_root: &Path, pool_name: &str, host_command_id: &HostCommandId) -> PathBuf {
    pools_root.join(pool_name).join(host_command_id.as_str())
}

/// Persist a descriptor. Called on every successful provisioning.
pub fn save_descriptor(pools_root: &Path, descriptor: &PooledExecutorDescriptor) -> Result<(), PersistenceError> {
    let dir = pools_root.join(&descriptor.pool_config.name);
    fs::create_dir_all(&dir).map_err(|source| PersistenceError::Io { path: dir.clone(), source })?;

    let dest = descriptor_path(pools_root, &descriptor.pool_config.name, &descriptor.host_command_id);
    let tmp = dest.with_extension("tmp");
    let json = serde_json::to_vec_pretty(descriptor)
        .map_err(|source| PersistenceError::DeserializationFailure { path: dest.clone(), source })?;
    fs::write(&tmp, json).map_err(|source| PersistenceError::Io { path: tmp.clone(), source })?;
    fs::rename(&tmp, &dest).map_err(|source| PersistenceError::Io { path: dest, source })
}

/// Enumerate all-digit filenames under `.bpipe/pools/<name>/`,
/// deserialize each (logging and skipping `DeserializationFailure`),
/// and retain only those whose backend reports `Running` (silently
/// discarding `StatusNotRunning`, per §7).
pub fn search_for_existing_pools(
    pools_root: &Path,
    pool_name: &str,
    factory: &dyn ExecutorFactory,
) -> Vec<PooledExecutorDescriptor> {
    let dir = pools_root.join(pool_name);
    let Ok(entries) = fs::read_dir(&dir) else {
        return Vec::new();
    };

    let mut survivors = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !HostCommandId::new(file_name).is_backend_job_id() {
            continue;
        }

        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(source) => {
                tracing::error!(path = %path.display(), error = %source, "failed to read persisted pool descriptor");
                continue;
            }
        };
        let descriptor: PooledExecutorDescriptor = match serde_json::from_str(&raw) {
            Ok(d) => d,
            Err(source) => {
                tracing::error!(path = %path.display(), error = %source, "failed to deserialize persisted pool descriptor, discarding");
                continue;
            }
        };

        match factory.reconnect(&descriptor.executor_snapshot) {
            Ok(executor) if executor.status() == ExecutorStatus::Running => survivors.push(descriptor),
            Ok(_) => {
                tracing::info!(host_command_id = %descriptor.host_command_id, "persisted wrapper is no longer running, discarding");
            }
            Err(source) => {
                tracing::error!(host_command_id = %descriptor.host_command_id, error = %source, "failed to reconnect to persisted wrapper, discarding");
            }
        }
    }
    survivors
}

/// Reconstitute a [`PooledExecutor`] from a persisted descriptor: a
/// fresh `ForwardingSink` (via `PooledExecutor::new`'s default), a
/// `WrapperProtocol` bound to the same commandtmp directory, and the
/// reconnected backend executor. `on_finish` is left unset — the caller
/// (an [`crate::executor_pool::ExecutorPool`]) binds it to its own idle
/// set.
pub fn connect_pooled_executor<C: Clock>(
    descriptor: PooledExecutorDescriptor,
    commandtmp_root: &Path,
    factory: &dyn ExecutorFactory,
    clock: C,
) -> Result<PooledExecutor<C>, PersistenceError> {
    let protocol = WrapperProtocol::new(commandtmp_root, &descriptor.host_command_id)
        .map_err(|source| PersistenceError::Io { path: commandtmp_root.to_path_buf(), source })?;
    let executor = factory.reconnect(&descriptor.executor_snapshot).map_err(|source| {
        PersistenceError::Io {
            path: descriptor_path(commandtmp_root, &descriptor.pool_config.name, &descriptor.host_command_id),
            source: std::io::Error::other(source.to_string()),
        }
    })?;

    let mut pe = PooledExecutor::new(
        descriptor.host_command_id,
        executor,
        Arc::new(descriptor.pool_config),
        descriptor.wrapper_command,
        protocol,
        clock,
    );
    // The wrapper is already running (checked in `search_for_existing_pools`);
    // reflect that in its state without going through `start()` again.
    pe.mark_reconnected();
    Ok(pe)
}

#[cfg(test)]
#[path = "persistence_tests.rs"]
mod tests;
