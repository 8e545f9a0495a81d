// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pooled-exec contributors

//! Command-shaped types crossing the pool's API boundary, plus
//! [`ForwardingSink`], the race-free output-rewiring primitive §4.3
//! describes.

use crate::id::{CommandId, HostCommandId};
use crate::pool_config::ProcessedConfig;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

/// A pipeline-level unit of work, as seen at this crate's API boundary.
///
/// The real pipeline `Command` carries a great deal this crate doesn't
/// need; only the fields the pool touches are represented here.
///
/// `Clone` so [`crate::executor_pool::ExecutorPool::take`] can retain the
/// original for its `NoneAvailable` fallback while handing a copy to
/// [`crate::pooled_executor::PooledExecutor::execute`].
#[derive(Clone)]
pub struct PipelineCommand {
    pub id: CommandId,
    pub name: String,
    /// Shell text the wrapper will execute.
    pub command: String,
    pub created_at_ms: u64,
    pub processed_config: ProcessedConfig,
    /// Set once a [`crate::pooled_executor::PooledExecutor`] adopts this
    /// command. A lookup key, not an ownership edge — see DESIGN.md on
    /// cyclic references.
    pub executor: Option<HostCommandId>,
}

impl PipelineCommand {
    pub fn new(id: CommandId, command: impl Into<String>, created_at_ms: u64) -> Self {
        Self {
            name: id.to_string(),
            id,
            command: command.into(),
            created_at_ms,
            processed_config: ProcessedConfig::default(),
            executor: None,
        }
    }

    pub fn processed_config(mut self, cfg: ProcessedConfig) -> Self {
        self.processed_config = cfg;
        self
    }
}

/// The wrapper-level command: what the backend job itself runs before it
/// ever adopts a pipeline command. Its only load-bearing field is
/// `created_at_ms`, used for wall-time accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WrapperCommand {
    pub id: CommandId,
    pub created_at_ms: u64,
}

impl WrapperCommand {
    pub fn new(id: CommandId, created_at_ms: u64) -> Self {
        Self { id, created_at_ms }
    }
}

/// A forwarding sink whose target can be rewired while writes are in
/// flight.
///
/// `PooledExecutor` owns one of these for its whole lifetime; its output
/// tailer writes through it on every new line, re-reading the wrapped
/// target fresh each time. `execute` rewires the target to the
/// newly-adopted pipeline command's log without the tailer ever
/// observing a torn write.
#[derive(Clone)]
pub struct ForwardingSink {
    wrapped: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl ForwardingSink {
    pub fn new(target: Box<dyn Write + Send>) -> Self {
        Self { wrapped: Arc::new(Mutex::new(target)) }
    }

    pub fn discarding() -> Self {
        Self::new(Box::new(io::sink()))
    }

    /// Point this sink at a new target. Safe to call while a tailer
    /// thread is concurrently calling [`ForwardingSink::write_bytes`]:
    /// the tailer only ever holds the lock for one write at a time.
    pub fn rewire(&self, target: Box<dyn Write + Send>) {
        *self.wrapped.lock() = target;
    }

    pub fn write_bytes(&self, bytes: &[u8]) -> io::Result<()> {
        self.wrapped.lock().write_all(bytes)
    }
}

impl fmt::Debug for ForwardingSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForwardingSink").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "pipeline_command_tests.rs"]
mod tests;
