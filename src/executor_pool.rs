// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pooled-exec contributors

//! [`ExecutorPool`]: a fixed-size set of [`PooledExecutor`]s serving one
//! named pool (§4.6).

use crate::clock::Clock;
use crate::command_executor::ExecutorFactory;
use crate::error::PoolError;
use crate::heartbeat::HeartbeatTicker;
use crate::id::{CommandId, HostCommandId};
use crate::persistence::{self, PooledExecutorDescriptor};
use crate::pipeline_command::PipelineCommand;
use crate::pool_config::PoolConfig;
use crate::pooled_executor::{poll_for_exit, PoolMembership, PooledExecutor};
use crate::protocol::WrapperProtocol;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;

/// Outcome of [`ExecutorPool::take`].
pub enum TakeResult {
    /// A compatible idle executor adopted the command and is now running
    /// it; `ExitWaiter` yields its real exit code once the wrapper reports
    /// one.
    Taken(PipelineCommand, ExitWaiter),
    /// No idle executor in this pool could accept the command right now.
    /// The original command is returned unmodified so the caller can fall
    /// back to direct dispatch (or try another pool).
    NoneAvailable(PipelineCommand),
}

/// Handle for retrieving the exit code of a command dispatched through
/// [`ExecutorPool::take`] or [`crate::registry::Registry::request_executor`].
///
/// The pool's own background thread is the sole reader of the wrapper's
/// exit file for this command (it also needs the code to drive
/// [`PooledExecutor::finish_current`] and return the executor to the idle
/// set); a second, independent poll from the caller would race it on the
/// same exit file. `ExitWaiter` instead receives the one value that thread
/// computed over a one-shot channel.
pub struct ExitWaiter {
    rx: mpsc::Receiver<i32>,
}

impl ExitWaiter {
    /// Block until the dispatched command exits, returning its real exit
    /// code. Only returns `None` if the owning pool's wait thread panicked
    /// before computing one, which does not happen in normal operation.
    pub fn wait(self) -> Option<i32> {
        self.rx.recv().ok()
    }
}

struct IdleRegistryInner<C: Clock> {
    idle: Vec<HostCommandId>,
    by_id: IndexMap<HostCommandId, Arc<Mutex<PooledExecutor<C>>>>,
}

/// The idle/occupied partition of one pool's members, shared between
/// [`ExecutorPool`] and every [`PooledExecutor`] it owns (as their
/// `on_finish` target).
struct IdleRegistry<C: Clock> {
    inner: Mutex<IdleRegistryInner<C>>,
}

impl<C: Clock> IdleRegistry<C> {
    fn new() -> Self {
        Self { inner: Mutex::new(IdleRegistryInner { idle: Vec::new(), by_id: IndexMap::new() }) }
    }

    fn insert(&self, host_command_id: HostCommandId, pe: Arc<Mutex<PooledExecutor<C>>>) {
        let mut inner = self.inner.lock();
        inner.idle.push(host_command_id.clone());
        inner.by_id.insert(host_command_id, pe);
    }

    fn len(&self) -> usize {
        self.inner.lock().by_id.len()
    }

    fn all(&self) -> Vec<Arc<Mutex<PooledExecutor<C>>>> {
        self.inner.lock().by_id.values().cloned().collect()
    }
}

impl<C: Clock + 'static> PoolMembership for IdleRegistry<C> {
    /// Re-admit `host_command_id` to the idle set. Never called directly
    /// by a terminated executor: [`PooledExecutor::finish_current`] only
    /// invokes `on_finish` when its own state did *not* resolve to
    /// `Terminated`, which keeps this free of needing to re-lock the
    /// executor (and risk deadlocking against the very call site that
    /// holds its lock).
    fn release(&self, host_command_id: &HostCommandId) {
        let mut inner = self.inner.lock();
        if inner.by_id.contains_key(host_command_id) && !inner.idle.contains(host_command_id) {
            inner.idle.push(host_command_id.clone());
        }
    }
}

/// A fixed-size set of [`PooledExecutor`]s serving one named pool.
pub struct ExecutorPool<C: Clock + 'static> {
    pool_config: Arc<PoolConfig>,
    factory: Arc<dyn ExecutorFactory>,
    commandtmp_root: PathBuf,
    pools_root: PathBuf,
    clock: C,
    heartbeat: Arc<HeartbeatTicker<C>>,
    registry: Arc<IdleRegistry<C>>,
}

impl<C: Clock + 'static> ExecutorPool<C> {
    pub fn new(
        pool_config: Arc<PoolConfig>,
        factory: Arc<dyn ExecutorFactory>,
        commandtmp_root: PathBuf,
        pools_root: PathBuf,
        clock: C,
        heartbeat: Arc<HeartbeatTicker<C>>,
    ) -> Self {
        Self {
            pool_config,
            factory,
            commandtmp_root,
            pools_root,
            clock,
            heartbeat,
            registry: Arc::new(IdleRegistry::new()),
        }
    }

    pub fn pool_config(&self) -> &Arc<PoolConfig> {
        &self.pool_config
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.len() == 0
    }

    /// Reconnect any still-running predecessors (when `persist`), then
    /// top up to `pool_config.jobs` with freshly-provisioned wrappers.
    pub fn start(&self) -> Result<(), PoolError> {
        let mut reconnected = 0usize;
        if self.pool_config.persist {
            let survivors =
                persistence::search_for_existing_pools(&self.pools_root, &self.pool_config.name, self.factory.as_ref());
            for descriptor in survivors {
                if reconnected >= self.pool_config.jobs {
                    break;
                }
                match persistence::connect_pooled_executor(
                    descriptor,
                    &self.commandtmp_root,
                    self.factory.as_ref(),
                    self.clock.clone(),
                ) {
                    Ok(pe) => {
                        self.adopt(pe);
                        reconnected += 1;
                    }
                    Err(err) => {
                        tracing::error!(pool = %self.pool_config.name, error = %err, "failed to reconnect a persisted wrapper");
                    }
                }
            }
        }

        for _ in reconnected..self.pool_config.jobs {
            self.provision_one()?;
        }
        Ok(())
    }

    fn adopt(&self, mut pe: PooledExecutor<C>) {
        pe.set_on_finish(self.registry.clone());
        self.heartbeat.register(pe.host_command_id().clone(), pe.protocol().clone());
        let host_command_id = pe.host_command_id().clone();
        self.registry.insert(host_command_id, Arc::new(Mutex::new(pe)));
    }

    fn provision_one(&self) -> Result<(), PoolError> {
        let host_command_id = HostCommandId::generate();
        let protocol = WrapperProtocol::new(&self.commandtmp_root, &host_command_id)
            .map_err(|source| PoolError::ProvisioningFailure {
                pool: self.pool_config.name.clone(),
                reason: source.to_string(),
            })?;
        let executor = self.factory.create();
        let wrapper_command = crate::pipeline_command::WrapperCommand::new(CommandId::new(), self.clock.epoch_ms());

        let mut pe = PooledExecutor::new(
            host_command_id,
            executor,
            self.pool_config.clone(),
            wrapper_command.clone(),
            protocol,
            self.clock.clone(),
        );
        pe.start().map_err(|source| PoolError::ProvisioningFailure {
            pool: self.pool_config.name.clone(),
            reason: source.to_string(),
        })?;

        if self.pool_config.persist {
            let descriptor = PooledExecutorDescriptor {
                host_command_id: pe.host_command_id().clone(),
                pool_config: (*self.pool_config).clone(),
                wrapper_command,
                executor_snapshot: pe.executor_snapshot(),
            };
            if let Err(err) = persistence::save_descriptor(&self.pools_root, &descriptor) {
                tracing::error!(pool = %self.pool_config.name, error = %err, "failed to persist newly provisioned wrapper descriptor");
            }
        }

        self.adopt(pe);
        Ok(())
    }

    /// Scan idle executors in insertion order, first match wins; dispatch
    /// to it and spawn a background thread that waits for its exit
    /// without holding the pool lock (or the executor's lock) across the
    /// blocking wait.
    pub fn take(&self, cmd: PipelineCommand, output_log: Box<dyn std::io::Write + Send>) -> TakeResult {
        let now_ms = self.clock.epoch_ms();
        let selected = {
            let mut inner = self.registry.inner.lock();
            let position = inner.idle.iter().position(|id| {
                inner.by_id.get(id).is_some_and(|pe| pe.lock().can_accept(&cmd.processed_config, now_ms))
            });
            position.and_then(|pos| {
                let id = inner.idle.remove(pos);
                let pe = inner.by_id.get(&id).cloned();
                pe.map(|pe| (id, pe))
            })
        };

        let Some((host_command_id, pe_arc)) = selected else {
            return TakeResult::NoneAvailable(cmd);
        };

        let fallback = cmd.clone();
        let dispatch = {
            let mut pe = pe_arc.lock();
            pe.execute(cmd, output_log)
        };

        let bound = match dispatch {
            Ok(bound) => bound,
            Err(err) => {
                tracing::error!(
                    pool = %self.pool_config.name,
                    host_command_id = %host_command_id,
                    error = %err,
                    "failed to dispatch to selected executor, returning it to the idle set"
                );
                self.registry.release(&host_command_id);
                return TakeResult::NoneAvailable(fallback);
            }
        };

        let cmd_id = bound.id.clone();
        let protocol = pe_arc.lock().protocol().clone();
        let wait_arc = pe_arc.clone();
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let code = poll_for_exit(&protocol, &cmd_id);
            wait_arc.lock().finish_current(code);
            let _ = tx.send(code);
        });

        TakeResult::Taken(bound, ExitWaiter { rx })
    }

    /// Stop every member unless this pool is persistent, in which case
    /// wrappers are left running for a future controller to reconnect to.
    pub fn shutdown(&self) {
        if self.pool_config.persist {
            for pe in self.registry.all() {
                self.heartbeat.deregister(pe.lock().host_command_id());
            }
            return;
        }
        for pe in self.registry.all() {
            let mut pe = pe.lock();
            self.heartbeat.deregister(pe.host_command_id());
            if let Err(err) = pe.stop() {
                tracing::warn!(pool = %self.pool_config.name, host_command_id = %pe.host_command_id(), error = %err, "failed to stop pooled executor during shutdown");
            }
        }
    }
}

#[cfg(test)]
#[path = "executor_pool_tests.rs"]
mod tests;
