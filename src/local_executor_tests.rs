use super::*;
use crate::id::HostCommandId;
use crate::protocol::WrapperProtocol;
use std::time::{Duration, Instant};
use tempfile::tempdir;

fn wait_until(mut predicate: impl FnMut() -> bool, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if predicate() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    predicate()
}

#[test]
fn start_then_stop_kills_the_wrapper_process() {
    let root = tempdir().unwrap();
    let protocol = WrapperProtocol::new(root.path(), &HostCommandId::new("100000")).unwrap();
    let cfg = PoolConfig::new("small", 1);
    let wrapper_cmd = WrapperCommand::new(CommandId::new(), 0);

    let mut executor = LocalProcessExecutor::new(protocol.dir());
    executor.start(&cfg, &wrapper_cmd, &protocol.cmd_out_path(), &protocol.cmd_err_path()).unwrap();
    assert_eq!(executor.status(), ExecutorStatus::Running);

    executor.stop().unwrap();
    assert!(wait_until(|| executor.status() == ExecutorStatus::Complete, Duration::from_secs(5)));
}

#[test]
fn dispatched_script_is_executed_and_exit_code_observed() {
    let root = tempdir().unwrap();
    let protocol = WrapperProtocol::new(root.path(), &HostCommandId::new("100001")).unwrap();
    let cfg = PoolConfig::new("small", 1);
    let wrapper_cmd = WrapperCommand::new(CommandId::new(), 0);

    let mut executor = LocalProcessExecutor::new(protocol.dir());
    executor.start(&cfg, &wrapper_cmd, &protocol.cmd_out_path(), &protocol.cmd_err_path()).unwrap();

    let cmd_id = CommandId::from("C1");
    protocol.dispatch(&cmd_id, "echo hello; exit 7").unwrap();

    let observed = wait_until(
        || matches!(protocol.poll_exit(&cmd_id), Some(crate::protocol::ExitPoll::Code(_))),
        Duration::from_secs(5),
    );
    assert!(observed, "wrapper did not write an exit file in time");
    assert_eq!(protocol.poll_exit(&cmd_id), Some(crate::protocol::ExitPoll::Code(7)));

    executor.stop().unwrap();
}

#[test]
fn missing_heartbeat_causes_self_termination() {
    let root = tempdir().unwrap();
    let protocol = WrapperProtocol::new(root.path(), &HostCommandId::new("100002")).unwrap();
    let cfg = PoolConfig::new("small", 1);
    let wrapper_cmd = WrapperCommand::new(CommandId::new(), 0);

    let mut executor = LocalProcessExecutor::new(protocol.dir());
    executor.start(&cfg, &wrapper_cmd, &protocol.cmd_out_path(), &protocol.cmd_err_path()).unwrap();

    // Never touch the heartbeat file; the wrapper's tolerance (3 checks
    // at ~1s) should make it exit on its own well within this budget.
    assert!(wait_until(|| executor.status() == ExecutorStatus::Complete, Duration::from_secs(10)));
}

#[test]
fn reconnect_from_snapshot_reports_running_then_complete() {
    let root = tempdir().unwrap();
    let protocol = WrapperProtocol::new(root.path(), &HostCommandId::new("100003")).unwrap();
    let cfg = PoolConfig::new("small", 1);
    let wrapper_cmd = WrapperCommand::new(CommandId::new(), 0);

    let mut executor = LocalProcessExecutor::new(protocol.dir());
    executor.start(&cfg, &wrapper_cmd, &protocol.cmd_out_path(), &protocol.cmd_err_path()).unwrap();
    let snapshot = executor.snapshot();

    let factory = LocalExecutorFactory::new(protocol.dir());
    let mut reconnected = factory.reconnect(&snapshot).unwrap();
    assert_eq!(reconnected.status(), ExecutorStatus::Running);

    reconnected.stop().unwrap_err(); // detached handles can't be signaled
    executor.stop().unwrap();
    assert!(wait_until(|| reconnected.status() == ExecutorStatus::Complete, Duration::from_secs(5)));
}

#[test]
fn reconnect_rejects_opaque_snapshot() {
    let factory = LocalExecutorFactory::new("/tmp");
    let err = factory.reconnect(&ExecutorSnapshot::Opaque(serde_json::Value::Null)).unwrap_err();
    assert!(matches!(err, ExecutorError::Unsupported(_)));
}
