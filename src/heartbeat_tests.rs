use super::*;
use crate::clock::FakeClock;
use crate::test_support::bpipe_roots;
use std::time::Duration;

fn wait_until(mut condition: impl FnMut() -> bool, timeout: Duration) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}

#[test]
fn start_creates_heartbeat_files_for_registered_targets() {
    let (_dir, commandtmp, _pools) = bpipe_roots();
    let host_id = HostCommandId::new("1");
    let protocol = WrapperProtocol::new(&commandtmp, &host_id).unwrap();

    let ticker = HeartbeatTicker::with_tick_interval(FakeClock::new(), Duration::from_millis(20));
    ticker.register(host_id.clone(), protocol.clone());
    ticker.start();

    assert!(wait_until(|| protocol.heartbeat_file().exists(), Duration::from_secs(2)));
    ticker.shutdown();
}

#[test]
fn deregister_stops_refreshing_a_target() {
    let (_dir, commandtmp, _pools) = bpipe_roots();
    let host_id = HostCommandId::new("2");
    let protocol = WrapperProtocol::new(&commandtmp, &host_id).unwrap();

    let ticker = HeartbeatTicker::with_tick_interval(FakeClock::new(), Duration::from_millis(20));
    ticker.register(host_id.clone(), protocol.clone());
    assert!(ticker.is_registered(&host_id));

    ticker.deregister(&host_id);
    assert!(!ticker.is_registered(&host_id));
}

#[test]
fn start_is_idempotent() {
    let ticker = HeartbeatTicker::with_tick_interval(FakeClock::new(), Duration::from_millis(20));
    ticker.start();
    ticker.start();
    ticker.shutdown();
}

#[test]
fn shutdown_is_idempotent_and_joins_the_background_thread() {
    let ticker = HeartbeatTicker::with_tick_interval(FakeClock::new(), Duration::from_millis(20));
    ticker.start();
    ticker.shutdown();
    ticker.shutdown();
}

#[test]
fn recreates_a_heartbeat_file_the_wrapper_deleted_on_the_next_tick() {
    let (_dir, commandtmp, _pools) = bpipe_roots();
    let host_id = HostCommandId::new("3");
    let protocol = WrapperProtocol::new(&commandtmp, &host_id).unwrap();

    let ticker = HeartbeatTicker::with_tick_interval(FakeClock::new(), Duration::from_millis(20));
    ticker.register(host_id, protocol.clone());
    ticker.start();
    assert!(wait_until(|| protocol.heartbeat_file().exists(), Duration::from_secs(2)));

    protocol.delete_heartbeat().unwrap();
    assert!(wait_until(|| protocol.heartbeat_file().exists(), Duration::from_secs(2)));
    ticker.shutdown();
}
