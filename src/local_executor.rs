// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pooled-exec contributors

//! [`LocalProcessExecutor`]: the reference [`CommandExecutor`] backend.
//!
//! Spawns a real OS subprocess running a built-in shell loop that speaks
//! the wrapper side of [`crate::protocol::WrapperProtocol`] — the
//! "wrapper script produced from a template" the distilled spec treats
//! as an external collaborator. This backend doubles as the crate's test
//! fixture: it's the only `CommandExecutor` that actually drives the
//! filesystem protocol end to end, which is what the `tests/` integration
//! test exercises.
//!
//! Liveness after reconnection (we only have a PID, not a `Child`
//! handle) is checked via `/proc/<pid>` rather than `kill(pid, 0)`, since
//! this crate forbids `unsafe`.

use crate::command_executor::{CommandExecutor, ExecutorFactory, ExecutorSnapshot, ExecutorStatus};
use crate::error::ExecutorError;
use crate::pipeline_command::WrapperCommand;
use crate::pool_config::PoolConfig;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

/// The wrapper loop run by [`LocalProcessExecutor`]. Polls its own
/// working directory for dispatched scripts, runs them, writes their
/// exit code, and self-terminates if the controller's heartbeat goes
/// missing for `HEARTBEAT_TOLERANCE` consecutive checks — mirroring
/// §4.2's filesystem protocol from the wrapper's side.
const WRAPPER_SCRIPT: &str = r#"
missed=0
tolerance=3
while true; do
  if [ -f stop ]; then
    exit 0
  fi
  if [ -f heartbeat ]; then
    rm -f heartbeat
    missed=0
  else
    missed=$((missed + 1))
    if [ "$missed" -ge "$tolerance" ]; then
      exit 1
    fi
  fi
  for f in pool_cmd.*.sh; do
    [ -e "$f" ] || continue
    id=${f#pool_cmd.}
    id=${id%.sh}
    sh "$f" >>cmd.out 2>>cmd.err
    code=$?
    echo "$code" > "$id.pool.exit.tmp"
    mv "$id.pool.exit.tmp" "$id.pool.exit"
    rm -f "$f"
  done
  sleep 1
done
"#;

enum Handle {
    /// We spawned this process ourselves and own its `Child`.
    Owned(Child),
    /// Reconnected after a restart; all we have is a PID to poll.
    Detached { pid: u32 },
}

/// Spawns the wrapper loop as a local OS subprocess.
pub struct LocalProcessExecutor {
    handle: Option<Handle>,
    working_dir: PathBuf,
}

impl LocalProcessExecutor {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self { handle: None, working_dir: working_dir.into() }
    }

    fn pid(&self) -> Option<u32> {
        match &self.handle {
            Some(Handle::Owned(child)) => Some(child.id()),
            Some(Handle::Detached { pid }) => Some(*pid),
            None => None,
        }
    }
}

impl CommandExecutor for LocalProcessExecutor {
    fn start(
        &mut self,
        _cfg: &PoolConfig,
        _cmd: &WrapperCommand,
        out: &Path,
        err: &Path,
    ) -> Result<(), ExecutorError> {
        let cwd = out.parent().unwrap_or(&self.working_dir).to_path_buf();
        // The wrapper loop appends to cmd.out/cmd.err itself via shell
        // redirection relative to its cwd, so these just need to exist.
        File::create(out)?;
        File::create(err)?;
        let child = Command::new("sh")
            .arg("-c")
            .arg(WRAPPER_SCRIPT)
            .current_dir(&cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        self.working_dir = cwd;
        self.handle = Some(Handle::Owned(child));
        Ok(())
    }

    fn wait_for(&mut self) -> Result<i32, ExecutorError> {
        match &mut self.handle {
            Some(Handle::Owned(child)) => {
                let status = child.wait()?;
                Ok(status.code().unwrap_or(-1))
            }
            Some(Handle::Detached { pid }) => {
                // We didn't spawn this process, so we can't reap its real
                // exit status; poll liveness and report 0 once it's gone.
                while pid_is_alive(*pid) {
                    std::thread::sleep(std::time::Duration::from_millis(200));
                }
                Ok(0)
            }
            None => Err(ExecutorError::Unsupported("wait_for before start")),
        }
    }

    fn stop(&mut self) -> Result<(), ExecutorError> {
        match &mut self.handle {
            Some(Handle::Owned(child)) => child.kill().or_else(|e| {
                if e.kind() == std::io::ErrorKind::InvalidInput {
                    Ok(()) // already exited
                } else {
                    Err(ExecutorError::BackendStopFailure(e.to_string()))
                }
            }),
            Some(Handle::Detached { .. }) => {
                Err(ExecutorError::Unsupported("stop on a detached local process"))
            }
            None => Ok(()),
        }
    }

    fn status(&self) -> ExecutorStatus {
        match self.pid() {
            Some(pid) if pid_is_alive(pid) => ExecutorStatus::Running,
            Some(_) => ExecutorStatus::Complete,
            None => ExecutorStatus::Unknown,
        }
    }

    fn set_job_name(&mut self, _name: &str) -> Result<(), ExecutorError> {
        // Local processes have no operator-visible "job name" concept
        // beyond their command line; nothing to rename.
        Ok(())
    }

    fn snapshot(&self) -> ExecutorSnapshot {
        ExecutorSnapshot::LocalProcess {
            pid: self.pid().unwrap_or_default(),
            working_dir: self.working_dir.clone(),
        }
    }
}

#[cfg(target_os = "linux")]
fn pid_is_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}

#[cfg(not(target_os = "linux"))]
fn pid_is_alive(_pid: u32) -> bool {
    true
}

/// Builds and reconnects [`LocalProcessExecutor`]s.
pub struct LocalExecutorFactory {
    working_dir: PathBuf,
}

impl LocalExecutorFactory {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self { working_dir: working_dir.into() }
    }
}

impl ExecutorFactory for LocalExecutorFactory {
    fn create(&self) -> Box<dyn CommandExecutor> {
        Box::new(LocalProcessExecutor::new(self.working_dir.clone()))
    }

    fn reconnect(&self, snapshot: &ExecutorSnapshot) -> Result<Box<dyn CommandExecutor>, ExecutorError> {
        match snapshot {
            ExecutorSnapshot::LocalProcess { pid, working_dir } => Ok(Box::new(LocalProcessExecutor {
                handle: Some(Handle::Detached { pid: *pid }),
                working_dir: working_dir.clone(),
            })),
            ExecutorSnapshot::Opaque(_) => {
                Err(ExecutorError::Unsupported("LocalExecutorFactory cannot reconnect an opaque snapshot"))
            }
        }
    }
}

#[cfg(test)]
#[path = "local_executor_tests.rs"]
mod tests;
