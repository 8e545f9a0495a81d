use super::*;
use tempfile::tempdir;

fn protocol() -> (tempfile::TempDir, WrapperProtocol) {
    let dir = tempdir().unwrap();
    let protocol = WrapperProtocol::new(dir.path(), &HostCommandId::new("12345")).unwrap();
    (dir, protocol)
}

#[test]
fn dispatch_writes_final_file_not_tmp() {
    let (_dir, protocol) = protocol();
    let cmd_id = CommandId::from("C1");
    protocol.dispatch(&cmd_id, "echo hi").unwrap();

    let dest = protocol.dir().join("pool_cmd.C1.sh");
    assert!(dest.exists());
    assert!(!protocol.dir().join("pool_cmd.tmp").exists());
    assert_eq!(fs::read_to_string(dest).unwrap(), "echo hi");
}

#[test]
fn poll_exit_none_until_wrapper_writes_it() {
    let (_dir, protocol) = protocol();
    let cmd_id = CommandId::from("C1");
    assert_eq!(protocol.poll_exit(&cmd_id), None);

    fs::write(protocol.exit_file(&cmd_id), "0\n").unwrap();
    assert_eq!(protocol.poll_exit(&cmd_id), Some(ExitPoll::Code(0)));
}

#[test]
fn poll_exit_flags_malformed_content() {
    let (_dir, protocol) = protocol();
    let cmd_id = CommandId::from("C1");
    fs::write(protocol.exit_file(&cmd_id), "not-a-number").unwrap();
    assert_eq!(protocol.poll_exit(&cmd_id), Some(ExitPoll::Malformed("not-a-number".to_string())));
}

#[test]
fn touch_heartbeat_is_a_noop_when_present() {
    let (_dir, protocol) = protocol();
    protocol.touch_heartbeat(1_000).unwrap();
    assert_eq!(fs::read_to_string(protocol.heartbeat_file()).unwrap(), "1000");

    protocol.touch_heartbeat(9_999).unwrap();
    assert_eq!(fs::read_to_string(protocol.heartbeat_file()).unwrap(), "1000");
}

#[test]
fn delete_heartbeat_succeeds_even_when_absent() {
    let (_dir, protocol) = protocol();
    protocol.delete_heartbeat().unwrap();
    protocol.touch_heartbeat(1_000).unwrap();
    protocol.delete_heartbeat().unwrap();
    assert!(!protocol.heartbeat_file().exists());
}

#[test]
fn write_stop_records_request_time() {
    let (_dir, protocol) = protocol();
    protocol.write_stop(5_000).unwrap();
    assert_eq!(fs::read_to_string(protocol.stop_file()).unwrap(), "5000");
}
