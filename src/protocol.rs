// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pooled-exec contributors

//! [`WrapperProtocol`]: the filesystem-mediated contract between the
//! controller and the remote wrapper script (§4.2, §6).
//!
//! Everything here is purely filesystem-based, rooted at
//! `.bpipe/commandtmp/<host_command_id>/`:
//!
//! - `pool_cmd.tmp` → renamed to `pool_cmd.<id>.sh` (atomic dispatch)
//! - `<id>.pool.exit` (exit notification; one line, trimmed integer)
//! - `heartbeat` (controller liveness; content is last-refresh millis)
//! - `stop` (graceful stop request; content is request millis)
//! - `cmd.out` / `cmd.err` (wrapper's captured streams)

use crate::error::ProtocolError;
use crate::id::{CommandId, HostCommandId};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default heartbeat refresh cadence (§4.2, §6).
pub const HEARTBEAT_INTERVAL_SECONDS: u64 = 10;
/// Cadence at which the controller polls for an exit file.
pub const EXIT_POLL_INTERVAL_MS: u64 = 1_000;
/// Delay after observing an exit file, before reading it, to let a
/// concurrent write settle.
pub const SETTLE_DELAY_MS: u64 = 100;

/// Outcome of polling for a command's exit file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitPoll {
    /// The exit file parsed as an integer exit code.
    Code(i32),
    /// The exit file existed but its trimmed content didn't parse as an
    /// integer (`ExitFileMalformed`, §7). Carries the raw content.
    Malformed(String),
}

/// Bound to one `host_command_id`'s directory under `.bpipe/commandtmp/`.
#[derive(Debug, Clone)]
pub struct WrapperProtocol {
    dir: PathBuf,
}

impl WrapperProtocol {
    /// Ensure the wrapper's tmp directory exists and bind to it.
    pub fn new(commandtmp_root: &Path, host_command_id: &HostCommandId) -> io::Result<Self> {
        let dir = commandtmp_root.join(host_command_id.as_str());
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Publish a dispatch script for `cmd_id`. Atomic from the wrapper's
    /// point of view: written to a `.tmp` sibling, then renamed into
    /// place.
    pub fn dispatch(&self, cmd_id: &CommandId, script: &str) -> Result<(), ProtocolError> {
        let tmp = self.dir.join("pool_cmd.tmp");
        let dest = self.dir.join(format!("pool_cmd.{}.sh", cmd_id.as_str()));
        write_then_rename(&tmp, &dest, script.as_bytes())
    }

    pub fn exit_file(&self, cmd_id: &CommandId) -> PathBuf {
        self.dir.join(format!("{}.pool.exit", cmd_id.as_str()))
    }

    /// Check for the exit file. Returns `None` while the wrapper hasn't
    /// finished yet. Once the file is first observed to exist, sleeps
    /// [`SETTLE_DELAY_MS`] before reading its content, so a write still in
    /// flight at the exact polling tick is never read half-written.
    pub fn poll_exit(&self, cmd_id: &CommandId) -> Option<ExitPoll> {
        let path = self.exit_file(cmd_id);
        if !path.exists() {
            return None;
        }
        std::thread::sleep(Duration::from_millis(SETTLE_DELAY_MS));
        let raw = fs::read_to_string(&path).ok()?;
        let trimmed = raw.trim();
        match trimmed.parse::<i32>() {
            Ok(code) => Some(ExitPoll::Code(code)),
            Err(_) => Some(ExitPoll::Malformed(trimmed.to_string())),
        }
    }

    pub fn heartbeat_file(&self) -> PathBuf {
        self.dir.join("heartbeat")
    }

    /// Create the heartbeat file if it's currently absent. Intentionally
    /// a no-op when present: the wrapper deleting it between ticks is
    /// normal, not a race to fix.
    pub fn touch_heartbeat(&self, now_ms: u64) -> Result<(), ProtocolError> {
        let path = self.heartbeat_file();
        if !path.exists() {
            fs::write(&path, now_ms.to_string())
                .map_err(|source| ProtocolError::Io { path: path.clone(), source })?;
        }
        Ok(())
    }

    pub fn delete_heartbeat(&self) -> Result<(), ProtocolError> {
        let path = self.heartbeat_file();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ProtocolError::Io { path, source }),
        }
    }

    pub fn stop_file(&self) -> PathBuf {
        self.dir.join("stop")
    }

    pub fn write_stop(&self, now_ms: u64) -> Result<(), ProtocolError> {
        let path = self.stop_file();
        fs::write(&path, now_ms.to_string()).map_err(|source| ProtocolError::Io { path, source })
    }

    pub fn cmd_out_path(&self) -> PathBuf {
        self.dir.join("cmd.out")
    }

    pub fn cmd_err_path(&self) -> PathBuf {
        self.dir.join("cmd.err")
    }
}

/// Write `contents` to `tmp` then rename it onto `dest`, so a concurrent
/// reader of `dest`'s parent directory never observes a partially
/// written file.
fn write_then_rename(tmp: &Path, dest: &Path, contents: &[u8]) -> Result<(), ProtocolError> {
    fs::write(tmp, contents).map_err(|source| ProtocolError::Io { path: tmp.to_path_buf(), source })?;
    fs::rename(tmp, dest).map_err(|source| ProtocolError::Io { path: dest.to_path_buf(), source })
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
