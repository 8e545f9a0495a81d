// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pooled-exec contributors

//! [`Registry`]: the process-wide map of named pools (§4.7).
//!
//! Owns every [`ExecutorPool`] the controller started from configuration
//! and routes `request_executor` calls to the first one whose `configs`
//! list claims the requested backend-config name.

use crate::clock::Clock;
use crate::command_executor::ExecutorFactory;
use crate::config::PreallocateConfig;
use crate::error::PreallocateError;
use crate::executor_pool::{ExecutorPool, ExitWaiter, TakeResult};
use crate::heartbeat::HeartbeatTicker;
use crate::pipeline_command::PipelineCommand;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

/// Outcome of [`Registry::request_executor`].
pub enum RequestResult {
    /// A pool claimed the config and dispatched the command; `ExitWaiter`
    /// yields its real exit code once the wrapper reports one.
    Taken(PipelineCommand, ExitWaiter),
    /// No pool claims this backend-config, or the claiming pool had no
    /// idle match; the caller should dispatch directly.
    Fallthrough(PipelineCommand),
}

/// Process-wide mapping from pool name to [`ExecutorPool`].
///
/// Pools are kept in an [`IndexMap`] so `request_executor` iterates them
/// in registration order, matching §4.7's "iterates pools in registration
/// order" semantics.
pub struct Registry<C: Clock + 'static> {
    pools: Mutex<IndexMap<String, Arc<ExecutorPool<C>>>>,
    commandtmp_root: PathBuf,
    pools_root: PathBuf,
    clock: C,
    heartbeat: Arc<HeartbeatTicker<C>>,
}

impl<C: Clock + 'static> Registry<C> {
    pub fn new(commandtmp_root: PathBuf, pools_root: PathBuf, clock: C) -> Self {
        let heartbeat = Arc::new(HeartbeatTicker::new(clock.clone()));
        heartbeat.start();
        Self { pools: Mutex::new(IndexMap::new()), commandtmp_root, pools_root, clock, heartbeat }
    }

    /// Construct and start one [`ExecutorPool`] per section of
    /// `user_config`, in declaration order. A [`crate::error::PoolError::ProvisioningFailure`]
    /// from any pool's `start()` aborts the whole call; pools started
    /// before the failing one remain registered and running.
    pub fn init_pools(
        &self,
        factory: Arc<dyn ExecutorFactory>,
        user_config: PreallocateConfig,
    ) -> Result<(), PreallocateError> {
        let mut pools = self.pools.lock();
        for pool_config in user_config.into_pool_configs() {
            if pools.contains_key(&pool_config.name) {
                return Err(PreallocateError::DuplicatePool(pool_config.name));
            }
            let pool = Arc::new(ExecutorPool::new(
                Arc::new(pool_config.clone()),
                factory.clone(),
                self.commandtmp_root.clone(),
                self.pools_root.clone(),
                self.clock.clone(),
                self.heartbeat.clone(),
            ));
            pool.start()?;
            pools.insert(pool_config.name, pool);
        }
        Ok(())
    }

    /// Register an already-constructed pool directly, bypassing
    /// [`Registry::init_pools`]'s configuration parsing. Mainly useful for
    /// tests and for callers assembling pools programmatically.
    pub fn register_pool(&self, pool: Arc<ExecutorPool<C>>) -> Result<(), PreallocateError> {
        let mut pools = self.pools.lock();
        let name = pool.pool_config().name.clone();
        if pools.contains_key(&name) {
            return Err(PreallocateError::DuplicatePool(name));
        }
        pools.insert(name, pool);
        Ok(())
    }

    /// Route `cmd` to the first registered pool whose `configs` contains
    /// `config_name`. Returns [`RequestResult::Fallthrough`] with the
    /// original command when no pool claims it, or when the claiming pool
    /// has no idle compatible executor.
    pub fn request_executor(
        &self,
        cmd: PipelineCommand,
        config_name: &str,
        output_log: Box<dyn Write + Send>,
    ) -> RequestResult {
        let candidate = {
            let pools = self.pools.lock();
            pools.values().find(|pool| pool.pool_config().serves(config_name)).cloned()
        };

        let Some(pool) = candidate else {
            return RequestResult::Fallthrough(cmd);
        };

        match pool.take(cmd, output_log) {
            TakeResult::Taken(bound, waiter) => RequestResult::Taken(bound, waiter),
            TakeResult::NoneAvailable(original) => RequestResult::Fallthrough(original),
        }
    }

    pub fn pool(&self, name: &str) -> Option<Arc<ExecutorPool<C>>> {
        self.pools.lock().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.pools.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.lock().is_empty()
    }

    /// Stop every non-persistent pool; persistent pools and their
    /// wrappers are left running for the next controller invocation.
    pub fn shutdown_all(&self) {
        for pool in self.pools.lock().values() {
            pool.shutdown();
        }
        self.heartbeat.shutdown();
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
