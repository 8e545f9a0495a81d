// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pooled-exec contributors

//! [`PooledExecutor`]: one wrapper job reservation, adopting and running
//! one pipeline command at a time (§4.3).

use crate::clock::Clock;
use crate::command_executor::CommandExecutor;
use crate::error::PoolError;
use crate::id::{CommandId, HostCommandId};
use crate::pipeline_command::{ForwardingSink, PipelineCommand, WrapperCommand};
use crate::pool_config::{PoolConfig, ProcessedConfig};
use crate::protocol::{ExitPoll, WrapperProtocol, EXIT_POLL_INTERVAL_MS};
use std::fmt;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Cadence at which the output tailer re-checks `cmd.out`/`cmd.err` for
/// new bytes.
const TAIL_POLL_INTERVAL_MS: u64 = 200;

/// Tails `cmd.out`/`cmd.err` for the lifetime of one [`PooledExecutor`]
/// and forwards new bytes to its [`ForwardingSink`] (§4.3: "PooledExecutor
/// tails these files and forwards new bytes to whichever pipeline-provided
/// log is currently installed"). Rewiring the sink's target on `execute`
/// is race-free regardless of where the tailer is in its loop, since the
/// sink re-reads its wrapped target on every write.
struct OutputTailer {
    running: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl OutputTailer {
    fn spawn(cmd_out: std::path::PathBuf, cmd_err: std::path::PathBuf, sink: ForwardingSink) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let running_thread = running.clone();
        let handle = std::thread::spawn(move || {
            let mut out_pos = 0u64;
            let mut err_pos = 0u64;
            while running_thread.load(Ordering::SeqCst) {
                out_pos = tail_new_bytes(&cmd_out, out_pos, &sink);
                err_pos = tail_new_bytes(&cmd_err, err_pos, &sink);
                std::thread::sleep(Duration::from_millis(TAIL_POLL_INTERVAL_MS));
            }
            // Drain whatever arrived between the last check and shutdown.
            tail_new_bytes(&cmd_out, out_pos, &sink);
            tail_new_bytes(&cmd_err, err_pos, &sink);
        });
        Self { running, handle: Some(handle) }
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for OutputTailer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Reads whatever bytes were appended to `path` since `pos`, forwards them
/// through `sink`, and returns the new read position. Treats a missing or
/// still-empty file as "nothing new yet" rather than an error: the wrapper
/// may not have created `cmd.out`/`cmd.err` the instant the tailer starts.
fn tail_new_bytes(path: &Path, pos: u64, sink: &ForwardingSink) -> u64 {
    let Ok(mut file) = std::fs::File::open(path) else {
        return pos;
    };
    let Ok(len) = file.metadata().map(|m| m.len()) else {
        return pos;
    };
    if len <= pos {
        return pos;
    }
    if file.seek(SeekFrom::Start(pos)).is_err() {
        return pos;
    }
    let mut buf = Vec::new();
    if file.read_to_end(&mut buf).is_ok() {
        let _ = sink.write_bytes(&buf);
    }
    len
}

/// `Provisioning -> Idle -> Running(cmd_id) -> Idle -> ... -> Stopping ->
/// Terminated`, modeled explicitly rather than inferred from field
/// presence, so invariant I1 ("current_command_id empty XOR running")
/// is a type-level fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PooledExecutorState {
    Provisioning,
    Idle,
    Running(CommandId),
    Stopping,
    Terminated,
}

/// Reinserts a finished [`PooledExecutor`] into its owning pool's idle
/// set. Modeled as a typed interface rather than a closure so "do not
/// re-admit a stopped executor" is enforced by the implementation, not
/// by convention (§9).
pub trait PoolMembership: Send + Sync {
    fn release(&self, host_command_id: &HostCommandId);
}

/// One wrapper job reservation.
pub struct PooledExecutor<C: Clock> {
    host_command_id: HostCommandId,
    executor: Box<dyn CommandExecutor>,
    pool_config: Arc<PoolConfig>,
    wrapper_command: WrapperCommand,
    state: PooledExecutorState,
    current_command_id: Option<CommandId>,
    protocol: WrapperProtocol,
    output_log: ForwardingSink,
    output_tailer: Option<OutputTailer>,
    on_finish: Option<Arc<dyn PoolMembership>>,
    clock: C,
}

impl<C: Clock> PooledExecutor<C> {
    pub fn new(
        host_command_id: HostCommandId,
        executor: Box<dyn CommandExecutor>,
        pool_config: Arc<PoolConfig>,
        wrapper_command: WrapperCommand,
        protocol: WrapperProtocol,
        clock: C,
    ) -> Self {
        Self {
            host_command_id,
            executor,
            pool_config,
            wrapper_command,
            state: PooledExecutorState::Provisioning,
            current_command_id: None,
            protocol,
            output_log: ForwardingSink::discarding(),
            output_tailer: None,
            on_finish: None,
            clock,
        }
    }

    fn start_output_tailer(&mut self) {
        self.output_tailer = Some(OutputTailer::spawn(
            self.protocol.cmd_out_path(),
            self.protocol.cmd_err_path(),
            self.output_log.clone(),
        ));
    }

    pub fn host_command_id(&self) -> &HostCommandId {
        &self.host_command_id
    }

    pub fn pool_config(&self) -> &Arc<PoolConfig> {
        &self.pool_config
    }

    pub fn state(&self) -> &PooledExecutorState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, PooledExecutorState::Idle)
    }

    pub fn current_command_id(&self) -> Option<&CommandId> {
        self.current_command_id.as_ref()
    }

    pub fn protocol(&self) -> &WrapperProtocol {
        &self.protocol
    }

    /// Capture the backing executor's reconnection handle, for
    /// [`crate::persistence::save_descriptor`].
    pub fn executor_snapshot(&self) -> crate::command_executor::ExecutorSnapshot {
        self.executor.snapshot()
    }

    pub fn set_on_finish(&mut self, on_finish: Arc<dyn PoolMembership>) {
        self.on_finish = Some(on_finish);
    }

    /// Provisioning-time entry point: delegates to the backing executor,
    /// then sets the backend job name to the pool name for operator
    /// visibility (best-effort; not every backend supports it).
    pub fn start(&mut self) -> Result<(), PoolError> {
        self.executor.start(
            &self.pool_config,
            &self.wrapper_command,
            &self.protocol.cmd_out_path(),
            &self.protocol.cmd_err_path(),
        )?;
        let _ = self.executor.set_job_name(&self.pool_config.name);
        self.state = PooledExecutorState::Idle;
        self.start_output_tailer();
        Ok(())
    }

    /// Mark a reconnected-from-persistence executor as already running,
    /// without re-invoking the backend's `start()` (§4.4: the backend job
    /// was never stopped, only the controller restarted).
    pub(crate) fn mark_reconnected(&mut self) {
        self.state = PooledExecutorState::Idle;
        self.start_output_tailer();
    }

    /// False only when both walltimes are set and the wrapper's
    /// remaining wall-time budget is less than what `cfg` asks for.
    /// Other dimensions are reserved via [`crate::pool_config::ResourceRequirement`]
    /// but none are enforced yet (§9).
    pub fn can_accept(&self, cfg: &ProcessedConfig, now_ms: u64) -> bool {
        if let (Some(wanted), Some(budget)) = (cfg.walltime, self.pool_config.walltime) {
            let elapsed = Duration::from_millis(now_ms.saturating_sub(self.wrapper_command.created_at_ms));
            let remaining = budget.saturating_sub(elapsed);
            if remaining < wanted {
                return false;
            }
        }
        cfg.resource_requirements.iter().all(|r| r.satisfied_by(&self.pool_config))
    }

    /// Adopt `cmd`: redirect output, bind the command's executor
    /// back-reference, and publish its dispatch script. Must not be
    /// called on an occupied executor.
    pub fn execute(
        &mut self,
        mut cmd: PipelineCommand,
        output_target: Box<dyn std::io::Write + Send>,
    ) -> Result<PipelineCommand, PoolError> {
        debug_assert!(self.is_idle(), "execute called on an occupied PooledExecutor");
        if !self.is_idle() {
            return Err(PoolError::AlreadyOccupied(
                self.current_command_id.as_ref().map(ToString::to_string).unwrap_or_default(),
            ));
        }

        self.output_log.rewire(output_target);
        self.current_command_id = Some(cmd.id.clone());
        self.state = PooledExecutorState::Running(cmd.id.clone());
        cmd.executor = Some(self.host_command_id.clone());

        self.protocol.dispatch(&cmd.id, &cmd.command)?;
        tracing::info!(
            pool = %self.pool_config.name,
            host_command_id = %self.host_command_id,
            command_id = %cmd.id,
            "dispatched command to pooled wrapper"
        );
        Ok(cmd)
    }

    /// Polls for the adopted command's exit file, reads and parses it,
    /// invokes `on_finish`, restores the backend job name to the pool
    /// name, and returns the exit code.
    pub fn wait_for(&mut self) -> Result<i32, PoolError> {
        let cmd_id = self
            .current_command_id
            .clone()
            .ok_or_else(|| PoolError::NoCompatibleExecutor(self.pool_config.name.clone()))?;
        let code = poll_for_exit(&self.protocol, &cmd_id);
        self.finish_current(code);
        Ok(code)
    }

    /// Shared by `wait_for` and [`crate::executor_pool::ExecutorPool`]'s
    /// background polling thread, which calls this once the exit file
    /// (or early termination) has already been observed without holding
    /// this executor's lock for the wait itself.
    pub(crate) fn finish_current(&mut self, code: i32) {
        self.current_command_id = None;
        let reentered_idle = !matches!(self.state, PooledExecutorState::Terminated);
        if reentered_idle {
            self.state = PooledExecutorState::Idle;
        }
        let _ = self.executor.set_job_name(&self.pool_config.name);
        tracing::info!(
            pool = %self.pool_config.name,
            host_command_id = %self.host_command_id,
            exit_code = code,
            "command finished"
        );
        // A stop() that raced this call already moved the state to
        // Terminated; don't hand a terminated executor back to the pool's
        // idle set just because its in-flight command also finished.
        if reentered_idle {
            if let Some(on_finish) = &self.on_finish {
                on_finish.release(&self.host_command_id);
            }
        }
    }

    /// Idempotent: delegates `stop()` to the backing executor, writes
    /// the stop file, and deletes the heartbeat file.
    pub fn stop(&mut self) -> Result<(), PoolError> {
        if matches!(self.state, PooledExecutorState::Terminated) {
            return Ok(());
        }
        self.state = PooledExecutorState::Stopping;
        let now_ms = self.clock.epoch_ms();
        let backend_result = self.executor.stop();
        self.protocol.write_stop(now_ms)?;
        self.protocol.delete_heartbeat()?;
        if let Some(mut tailer) = self.output_tailer.take() {
            tailer.stop();
        }
        self.state = PooledExecutorState::Terminated;
        tracing::info!(
            pool = %self.pool_config.name,
            host_command_id = %self.host_command_id,
            "stop requested"
        );
        backend_result.map_err(PoolError::from)
    }
}

impl<C: Clock> fmt::Debug for PooledExecutor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledExecutor")
            .field("host_command_id", &self.host_command_id)
            .field("pool", &self.pool_config.name)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Blocking poll loop shared by [`PooledExecutor::wait_for`] and the
/// pool's background thread. Takes only a cheap-to-clone [`WrapperProtocol`]
/// handle and a [`CommandId`] so callers can run it without holding any
/// lock on the owning executor (§5: "never called while holding a pool
/// lock"). The settle delay for a just-observed exit file lives in
/// [`WrapperProtocol::poll_exit`] itself, ahead of the read it guards.
pub(crate) fn poll_for_exit(protocol: &WrapperProtocol, cmd_id: &CommandId) -> i32 {
    loop {
        match protocol.poll_exit(cmd_id) {
            Some(ExitPoll::Code(code)) => return code,
            Some(ExitPoll::Malformed(raw)) => {
                tracing::warn!(command_id = %cmd_id, raw = %raw, "exit file malformed, treating as failed");
                return -1;
            }
            None => std::thread::sleep(Duration::from_millis(EXIT_POLL_INTERVAL_MS)),
        }
    }
}

#[cfg(test)]
#[path = "pooled_executor_tests.rs"]
mod tests;
