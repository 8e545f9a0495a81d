// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pooled-exec contributors

//! Shared test helpers for use across this crate's unit and integration
//! tests. Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::command_executor::{CommandExecutor, ExecutorFactory, ExecutorSnapshot, ExecutorStatus};
use crate::error::ExecutorError;
use crate::pipeline_command::WrapperCommand;
use crate::pool_config::PoolConfig;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// An in-memory [`CommandExecutor`] a test drives by calling
/// [`FakeCommandExecutor::finish`]/[`FakeCommandExecutor::set_status`]
/// directly, without spawning a real process.
#[derive(Clone)]
pub struct FakeCommandExecutor {
    inner: Arc<Mutex<FakeState>>,
}

struct FakeState {
    status: ExecutorStatus,
    job_name: Option<String>,
    stop_calls: u32,
    exit_code: Option<i32>,
    fail_start: bool,
}

impl FakeCommandExecutor {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeState {
                status: ExecutorStatus::Queued,
                job_name: None,
                stop_calls: 0,
                exit_code: None,
                fail_start: false,
            })),
        }
    }

    pub fn failing_to_start() -> Self {
        let fake = Self::new();
        fake.inner.lock().fail_start = true;
        fake
    }

    pub fn set_status(&self, status: ExecutorStatus) {
        self.inner.lock().status = status;
    }

    pub fn job_name(&self) -> Option<String> {
        self.inner.lock().job_name.clone()
    }

    pub fn stop_calls(&self) -> u32 {
        self.inner.lock().stop_calls
    }

    /// Make a subsequent `wait_for` call return `code` immediately.
    pub fn finish(&self, code: i32) {
        let mut inner = self.inner.lock();
        inner.exit_code = Some(code);
        inner.status = ExecutorStatus::Complete;
    }
}

impl Default for FakeCommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandExecutor for FakeCommandExecutor {
    fn start(
        &mut self,
        _cfg: &PoolConfig,
        _cmd: &WrapperCommand,
        _out: &Path,
        _err: &Path,
    ) -> Result<(), ExecutorError> {
        let mut inner = self.inner.lock();
        if inner.fail_start {
            return Err(ExecutorError::Io(std::io::Error::other("fake start failure")));
        }
        inner.status = ExecutorStatus::Running;
        Ok(())
    }

    fn wait_for(&mut self) -> Result<i32, ExecutorError> {
        Ok(self.inner.lock().exit_code.unwrap_or(0))
    }

    fn stop(&mut self) -> Result<(), ExecutorError> {
        let mut inner = self.inner.lock();
        inner.stop_calls += 1;
        inner.status = ExecutorStatus::Complete;
        Ok(())
    }

    fn status(&self) -> ExecutorStatus {
        self.inner.lock().status
    }

    fn set_job_name(&mut self, name: &str) -> Result<(), ExecutorError> {
        self.inner.lock().job_name = Some(name.to_string());
        Ok(())
    }

    fn snapshot(&self) -> ExecutorSnapshot {
        ExecutorSnapshot::Opaque(serde_json::json!({ "fake": true }))
    }
}

/// Builds [`FakeCommandExecutor`]s and "reconnects" to the opaque
/// snapshot they always produce.
pub struct FakeExecutorFactory {
    seed_status: ExecutorStatus,
}

impl FakeExecutorFactory {
    pub fn new() -> Self {
        Self { seed_status: ExecutorStatus::Running }
    }

    pub fn with_reconnect_status(status: ExecutorStatus) -> Self {
        Self { seed_status: status }
    }
}

impl Default for FakeExecutorFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutorFactory for FakeExecutorFactory {
    fn create(&self) -> Box<dyn CommandExecutor> {
        Box::new(FakeCommandExecutor::new())
    }

    fn reconnect(&self, snapshot: &ExecutorSnapshot) -> Result<Box<dyn CommandExecutor>, ExecutorError> {
        match snapshot {
            ExecutorSnapshot::Opaque(_) => {
                let fake = FakeCommandExecutor::new();
                fake.set_status(self.seed_status);
                Ok(Box::new(fake))
            }
            ExecutorSnapshot::LocalProcess { .. } => {
                Err(ExecutorError::Unsupported("FakeExecutorFactory cannot reconnect a LocalProcess snapshot"))
            }
        }
    }
}

/// Build a scratch directory tree that mirrors `.bpipe/{commandtmp,pools}`
/// under a fresh [`tempfile::TempDir`], for tests that exercise
/// persistence or the wrapper protocol without a real filesystem root.
#[cfg(test)]
pub fn bpipe_roots() -> (tempfile::TempDir, PathBuf, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let commandtmp = dir.path().join(".bpipe/commandtmp");
    let pools = dir.path().join(".bpipe/pools");
    std::fs::create_dir_all(&commandtmp).expect("create commandtmp root");
    std::fs::create_dir_all(&pools).expect("create pools root");
    (dir, commandtmp, pools)
}
