// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pooled-exec contributors

//! Identifier newtypes.
//!
//! [`CommandId`] identifies a pipeline command (or a wrapper's own
//! bookkeeping command) and is controller-generated, so it is free to use
//! a readable prefixed random form. [`HostCommandId`] identifies the
//! backend job backing one wrapper reservation; per the persistence
//! layout (`.bpipe/pools/<pool>/<host_command_id>`, filename all-digit),
//! it is whatever the backend assigns and must not be reshaped by this
//! crate, so it stays a bare string newtype.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Unique identifier for a pipeline (or wrapper) command.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandId(pub String);

impl CommandId {
    /// Generate a new random command id.
    pub fn new() -> Self {
        Self(format!("cmd-{}", nanoid::nanoid!(12)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CommandId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CommandId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CommandId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Borrow<str> for CommandId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Identifier of the backend job backing a wrapper reservation.
///
/// This is the value the persistence layer uses as a directory entry name
/// under `.bpipe/pools/<pool>/`, and it is expected to be all-digit
/// (matching the backend job id convention) — see
/// [`crate::persistence::search_for_existing_pools`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostCommandId(pub String);

impl HostCommandId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when this id looks like a backend job id (all ASCII digits).
    pub fn is_backend_job_id(&self) -> bool {
        !self.0.is_empty() && self.0.bytes().all(|b| b.is_ascii_digit())
    }

    /// Mint a fresh id shaped like a backend job id (all-digit), for
    /// backends (like [`crate::local_executor::LocalProcessExecutor`])
    /// that have no natural numeric job id of their own to hand back
    /// before the protocol directory must already exist.
    pub fn generate() -> Self {
        const DIGITS: [char; 10] = ['0', '1', '2', '3', '4', '5', '6', '7', '8', '9'];
        Self(nanoid::nanoid!(15, &DIGITS))
    }
}

impl fmt::Display for HostCommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for HostCommandId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for HostCommandId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Borrow<str> for HostCommandId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
