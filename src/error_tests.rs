use super::*;

#[test]
fn pool_error_wraps_executor_error() {
    let e: PoolError = ExecutorError::Unsupported("set_job_name").into();
    assert_eq!(e.to_string(), "operation unsupported by this backend: set_job_name");
}

#[test]
fn preallocate_error_wraps_pool_error() {
    let e: PreallocateError = PoolError::NoCompatibleExecutor("small".into()).into();
    assert!(e.to_string().contains("small"));
}

#[test]
fn exit_file_malformed_message_includes_raw_content() {
    let e = ProtocolError::ExitFileMalformed {
        command_id: "c1".into(),
        raw: "not-a-number".into(),
    };
    let msg = e.to_string();
    assert!(msg.contains("c1"));
    assert!(msg.contains("not-a-number"));
}
