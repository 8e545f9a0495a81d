// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pooled-exec contributors

//! [`HeartbeatTicker`]: the background thread that keeps every pool's
//! wrapper liveness files fresh (§4.5).
//!
//! One ticker per [`crate::registry::Registry`], shared across every pool
//! it runs. Wrappers self-terminate after a tolerance of missed
//! heartbeats (see `WRAPPER_SCRIPT` in [`crate::local_executor`]), so a
//! controller crash or a registry that forgets to touch a target is
//! exactly the fail-safe this exists to trigger.

use crate::clock::Clock;
use crate::id::HostCommandId;
use crate::protocol::{WrapperProtocol, HEARTBEAT_INTERVAL_SECONDS};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

struct Targets {
    by_id: HashMap<HostCommandId, WrapperProtocol>,
}

/// Periodically touches the heartbeat file of every registered
/// [`WrapperProtocol`], so the remote wrapper script knows the
/// controller is still alive.
pub struct HeartbeatTicker<C: Clock> {
    targets: Arc<Mutex<Targets>>,
    clock: C,
    tick_interval: Duration,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl<C: Clock + 'static> HeartbeatTicker<C> {
    pub fn new(clock: C) -> Self {
        Self::with_tick_interval(clock, Duration::from_secs(HEARTBEAT_INTERVAL_SECONDS))
    }

    /// Same as [`HeartbeatTicker::new`] but with an overridden tick
    /// cadence, for tests that can't afford to wait a real
    /// [`HEARTBEAT_INTERVAL_SECONDS`] between ticks.
    pub fn with_tick_interval(clock: C, tick_interval: Duration) -> Self {
        Self {
            targets: Arc::new(Mutex::new(Targets { by_id: HashMap::new() })),
            clock,
            tick_interval,
            running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    /// Begin ticking once every `tick_interval`. Idempotent: calling this
    /// twice is a no-op the second time.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let targets = self.targets.clone();
        let clock = self.clock.clone();
        let running = self.running.clone();
        let tick_interval = self.tick_interval;
        let join = std::thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                let now_ms = clock.epoch_ms();
                for protocol in targets.lock().by_id.values() {
                    if let Err(source) = protocol.touch_heartbeat(now_ms) {
                        tracing::warn!(error = %source, "failed to refresh heartbeat file");
                    }
                }
                std::thread::sleep(tick_interval);
            }
        });
        *self.handle.lock() = Some(join);
    }

    /// Start keeping `protocol`'s heartbeat fresh.
    pub fn register(&self, host_command_id: HostCommandId, protocol: WrapperProtocol) {
        self.targets.lock().by_id.insert(host_command_id, protocol);
    }

    /// Stop keeping a target fresh (the wrapper it belonged to is stopped
    /// or was released).
    pub fn deregister(&self, host_command_id: &HostCommandId) {
        self.targets.lock().by_id.remove(host_command_id);
    }

    pub fn is_registered(&self, host_command_id: &HostCommandId) -> bool {
        self.targets.lock().by_id.contains_key(host_command_id)
    }

    /// Stop the background thread. Safe to call more than once.
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(join) = self.handle.lock().take() {
            let _ = join.join();
        }
    }
}

impl<C: Clock + 'static> Drop for HeartbeatTicker<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
#[path = "heartbeat_tests.rs"]
mod tests;
