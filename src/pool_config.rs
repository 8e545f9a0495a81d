// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pooled-exec contributors

//! [`PoolConfig`]: the immutable descriptor of one named pool, and
//! [`ProcessedConfig`]: the per-command requirements a [`PooledExecutor`](crate::pooled_executor::PooledExecutor)
//! is matched against.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Immutable descriptor of one named pool (§3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Unique within a [`crate::registry::Registry`]; also the directory
    /// name under `.bpipe/pools/`.
    pub name: String,
    /// Backend-config names this pool may serve. Defaults to `[name]`.
    pub configs: Vec<String>,
    /// Pool size.
    pub jobs: usize,
    /// If true, wrapper jobs survive controller exit and are re-attached.
    pub persist: bool,
    #[serde(default, with = "opt_duration_ms")]
    pub walltime: Option<Duration>,
    /// Enables verbose wrapper-side logging; presence-only in the
    /// distilled config surface, a plain bool here.
    #[serde(default)]
    pub debug_pooled_executor: bool,
    /// Opaque backend-specific fields, passed through to the backend
    /// executor unexamined by this crate.
    #[serde(default)]
    pub extra: serde_json::Value,
}

impl PoolConfig {
    pub fn new(name: impl Into<String>, jobs: usize) -> Self {
        let name = name.into();
        Self {
            configs: vec![name.clone()],
            name,
            jobs,
            persist: false,
            walltime: None,
            debug_pooled_executor: false,
            extra: serde_json::Value::Null,
        }
    }

    pub fn configs(mut self, configs: Vec<String>) -> Self {
        self.configs = configs;
        self
    }

    pub fn persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    pub fn walltime(mut self, walltime: Duration) -> Self {
        self.walltime = Some(walltime);
        self
    }

    pub fn debug_pooled_executor(mut self, debug: bool) -> Self {
        self.debug_pooled_executor = debug;
        self
    }

    pub fn extra(mut self, extra: serde_json::Value) -> Self {
        self.extra = extra;
        self
    }

    /// Whether this pool may serve a backend-config with the given name.
    pub fn serves(&self, config_name: &str) -> bool {
        self.configs.iter().any(|c| c == config_name)
    }
}

/// Extension point for `can_accept` dimensions beyond walltime (§4.3,
/// §9: "TODO: check other attributes such as memory and procs"). Every
/// implementation shipped today returns `true`; this only exists so a
/// future dimension (memory, CPU count, ...) has somewhere to live
/// without changing `PooledExecutor::can_accept`'s signature.
pub trait ResourceRequirement: Send + Sync {
    fn name(&self) -> &str;

    fn satisfied_by(&self, pool_config: &PoolConfig) -> bool {
        let _ = pool_config;
        true
    }
}

/// Resolved per-command configuration a [`crate::pooled_executor::PooledExecutor`]
/// is matched against.
///
/// `resource_requirements` is behind an `Arc` so `ProcessedConfig` (and in
/// turn [`crate::pipeline_command::PipelineCommand`]) stays cheaply
/// `Clone`, letting [`crate::executor_pool::ExecutorPool::take`] retain
/// the original command for its `NoneAvailable` fallback without needing
/// `Box<dyn ResourceRequirement>: Clone`.
#[derive(Clone, Default)]
pub struct ProcessedConfig {
    pub name: String,
    pub walltime: Option<Duration>,
    pub resource_requirements: Arc<Vec<Box<dyn ResourceRequirement>>>,
}

impl ProcessedConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), walltime: None, resource_requirements: Arc::new(Vec::new()) }
    }

    pub fn walltime(mut self, walltime: Duration) -> Self {
        self.walltime = Some(walltime);
        self
    }

    pub fn resource_requirements(mut self, requirements: Vec<Box<dyn ResourceRequirement>>) -> Self {
        self.resource_requirements = Arc::new(requirements);
        self
    }
}

/// Parses a walltime budget in `HH:MM:SS` (or `MM:SS`, or a bare seconds
/// count) form, per §6's `Utils.walltimeToMs` interface.
pub fn walltime_from_str(s: &str) -> Result<Duration, crate::error::ParseWalltimeError> {
    let parts: Vec<&str> = s.trim().split(':').collect();
    let err = |reason: &str| crate::error::ParseWalltimeError { raw: s.to_string(), reason: reason.to_string() };
    let segment = |p: &str| p.parse::<u64>().map_err(|_| err("non-numeric segment"));

    let total_secs = match parts.as_slice() {
        [secs] => segment(secs)?,
        [mins, secs] => segment(mins)? * 60 + segment(secs)?,
        [hours, mins, secs] => segment(hours)? * 3_600 + segment(mins)? * 60 + segment(secs)?,
        _ => return Err(err("expected SS, MM:SS, or HH:MM:SS")),
    };
    Ok(Duration::from_secs(total_secs))
}

mod opt_duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.map(|d| d.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}

#[cfg(test)]
#[path = "pool_config_tests.rs"]
mod tests;
