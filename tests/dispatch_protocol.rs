// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pooled-exec contributors

//! End-to-end exercise of the filesystem-mediated wrapper protocol against
//! a real [`LocalProcessExecutor`] wrapper process, covering the "Dispatch
//! happy path" scenario.

use pooled_exec::clock::{Clock, SystemClock};
use pooled_exec::command_executor::{CommandExecutor, ExecutorFactory};
use pooled_exec::heartbeat::HeartbeatTicker;
use pooled_exec::id::{CommandId, HostCommandId};
use pooled_exec::local_executor::LocalExecutorFactory;
use pooled_exec::pipeline_command::{ForwardingSink, PipelineCommand, WrapperCommand};
use pooled_exec::pool_config::PoolConfig;
use pooled_exec::pooled_executor::PooledExecutor;
use pooled_exec::protocol::WrapperProtocol;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn wait_until(mut condition: impl FnMut() -> bool, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    condition()
}

/// Surfaces this crate's `tracing` events during `cargo test -- --nocapture`;
/// harmless to call once per test binary, and `try_init` tolerates being
/// called again if another test file in the same binary already did.
fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter("pooled_exec=debug").with_test_writer().try_init();
}

#[test]
fn dispatched_command_runs_and_reports_its_real_exit_code() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let commandtmp_root = dir.path().join(".bpipe/commandtmp");
    std::fs::create_dir_all(&commandtmp_root).unwrap();

    let pool_config = Arc::new(PoolConfig::new("small", 1));
    let clock = SystemClock;
    let factory = LocalExecutorFactory::new(dir.path());
    let host_command_id = HostCommandId::generate();
    let protocol = WrapperProtocol::new(&commandtmp_root, &host_command_id).unwrap();
    let wrapper_command = WrapperCommand::new(CommandId::new(), clock.epoch_ms());

    let mut pe = PooledExecutor::new(
        host_command_id.clone(),
        factory.create(),
        pool_config,
        wrapper_command,
        protocol,
        clock,
    );
    pe.start().unwrap();
    assert!(pe.is_idle());

    let heartbeat = HeartbeatTicker::with_tick_interval(SystemClock, Duration::from_secs(1));
    heartbeat.register(host_command_id, pe.protocol().clone());
    heartbeat.start();

    let cmd = PipelineCommand::new(CommandId::from("C1"), "exit 7", 0);
    let bound = pe.execute(cmd, Box::new(io::sink())).unwrap();
    assert!(bound.executor.is_some());

    let code = pe.wait_for().unwrap();
    assert_eq!(code, 7);
    assert!(pe.is_idle());
    assert!(pe.current_command_id().is_none());

    heartbeat.shutdown();
    pe.stop().unwrap();
}

#[test]
fn executed_command_output_is_tailed_into_the_installed_sink() {
    let dir = tempfile::tempdir().unwrap();
    let commandtmp_root = dir.path().join(".bpipe/commandtmp");
    std::fs::create_dir_all(&commandtmp_root).unwrap();

    let pool_config = Arc::new(PoolConfig::new("small", 1));
    let clock = SystemClock;
    let factory = LocalExecutorFactory::new(dir.path());
    let host_command_id = HostCommandId::generate();
    let protocol = WrapperProtocol::new(&commandtmp_root, &host_command_id).unwrap();
    let wrapper_command = WrapperCommand::new(CommandId::new(), clock.epoch_ms());

    let mut pe = PooledExecutor::new(
        host_command_id,
        factory.create(),
        pool_config,
        wrapper_command,
        protocol,
        clock,
    );
    pe.start().unwrap();

    let captured = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let cmd = PipelineCommand::new(CommandId::from("C1"), "echo hello-from-wrapper", 0);
    pe.execute(cmd, Box::new(CapturingWriter { buf: captured.clone() })).unwrap();
    let code = pe.wait_for().unwrap();
    assert_eq!(code, 0);

    assert!(wait_until(
        || String::from_utf8_lossy(&captured.lock()).contains("hello-from-wrapper"),
        Duration::from_secs(5),
    ));

    pe.stop().unwrap();
}

#[test]
fn stop_writes_the_stop_file_and_removes_the_heartbeat_file() {
    let dir = tempfile::tempdir().unwrap();
    let commandtmp_root = dir.path().join(".bpipe/commandtmp");
    std::fs::create_dir_all(&commandtmp_root).unwrap();

    let pool_config = Arc::new(PoolConfig::new("small", 1));
    let clock = SystemClock;
    let factory = LocalExecutorFactory::new(dir.path());
    let host_command_id = HostCommandId::generate();
    let protocol = WrapperProtocol::new(&commandtmp_root, &host_command_id).unwrap();
    let wrapper_command = WrapperCommand::new(CommandId::new(), clock.epoch_ms());

    let mut pe =
        PooledExecutor::new(host_command_id, factory.create(), pool_config, wrapper_command, protocol, clock.clone());
    pe.start().unwrap();

    pe.protocol().touch_heartbeat(clock.epoch_ms()).unwrap();
    assert!(pe.protocol().heartbeat_file().exists());

    pe.stop().unwrap();
    assert!(pe.protocol().stop_file().exists());
    assert!(!pe.protocol().heartbeat_file().exists());

    // Idempotent: calling stop() again leaves the same observable state.
    pe.stop().unwrap();
    assert!(pe.protocol().stop_file().exists());
    assert!(!pe.protocol().heartbeat_file().exists());
}

#[test]
fn output_forwarding_sink_is_race_free_when_rewired_mid_tail() {
    let sink = ForwardingSink::discarding();
    let handle = std::thread::spawn({
        let sink = sink.clone();
        move || {
            for _ in 0..200 {
                let _ = sink.write_bytes(b"line\n");
            }
        }
    });

    std::thread::sleep(Duration::from_millis(5));
    let captured = Arc::new(parking_lot::Mutex::new(Vec::new()));
    sink.rewire(Box::new(CapturingWriter { buf: captured.clone() }));

    handle.join().unwrap();
    assert!(wait_until(|| !captured.lock().is_empty(), Duration::from_secs(1)));
}

struct CapturingWriter {
    buf: Arc<parking_lot::Mutex<Vec<u8>>>,
}

impl io::Write for CapturingWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.lock().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
