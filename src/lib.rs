// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pooled-exec contributors

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Pre-allocation executor pool.
//!
//! Reserves long-lived "wrapper" jobs on a backend ahead of demand and
//! multiplexes pipeline commands onto those reservations, amortizing
//! backend scheduling latency. See each module for the component of the
//! design it implements:
//!
//! - [`command_executor`]: the uniform backend contract (`CommandExecutor`).
//! - [`protocol`]: the filesystem-mediated wrapper protocol.
//! - [`pooled_executor`]: one wrapper job reservation.
//! - [`persistence`]: descriptor (de)serialization and wrapper rediscovery.
//! - [`heartbeat`]: the background liveness ticker.
//! - [`executor_pool`]: a fixed-size set of reservations for one named pool.
//! - [`registry`]: the process-wide map of named pools.
//! - [`local_executor`]: the reference local-process `CommandExecutor`.
//! - [`config`]: the `preallocate` configuration surface.
//! - [`clock`], [`id`], [`error`], [`pipeline_command`], [`pool_config`]:
//!   supporting types shared across the above.

pub mod clock;
pub mod command_executor;
pub mod config;
pub mod error;
pub mod executor_pool;
pub mod heartbeat;
pub mod id;
pub mod local_executor;
pub mod persistence;
pub mod pipeline_command;
pub mod pool_config;
pub mod pooled_executor;
pub mod protocol;
pub mod registry;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
