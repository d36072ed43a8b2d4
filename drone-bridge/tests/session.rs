//! Connection state machine driven through a recording client.
//!
//! Signals are raised by hand on the test thread, so every transition and
//! the status messages it queues can be checked synchronously.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{config, record, session_with, statuses, MockClient, URI};
use drone_bridge::telemetry::{LOG_BATTERY_STATE, LOG_VBAT};
use drone_bridge::{Cmd, ConnectReason, SessionState, TelemetryGroup};

// ---------------------------------------------------------------------------
// Connect
// ---------------------------------------------------------------------------

#[test]
fn connect_then_fully_connected_registers_each_group_once() {
    let mock = MockClient::new();
    let session = session_with(&mock, &config());
    assert_eq!(session.state(), SessionState::Disconnected);

    session.connect().unwrap();
    assert_eq!(mock.opened(), vec![URI.to_string()]);
    assert_eq!(session.state(), SessionState::Connecting);

    mock.raise_link_up();
    assert_eq!(session.state(), SessionState::Connected);
    assert_eq!(session.reason(), ConnectReason::Success);

    // A repeated signal must not register anything twice.
    mock.raise_fully_connected();

    let configs = mock.log_configs();
    for name in ["Battery", "Motors", "Barometer", "Magnetometer", "AccSensor"] {
        assert_eq!(
            configs.iter().filter(|c| c.as_str() == name).count(),
            1,
            "{name} registered {configs:?}"
        );
    }
    assert_eq!(configs.len(), 5);
    assert_eq!(
        session.telemetry().subscribed(),
        vec![
            TelemetryGroup::Battery,
            TelemetryGroup::Motors,
            TelemetryGroup::Barometer,
            TelemetryGroup::Magnetometer,
            TelemetryGroup::AccSensor,
        ]
    );

    assert_eq!(
        statuses(&session.queue().drain()),
        vec![(1.0, 0), (2.0, 0), (2.0, 1)]
    );
}

#[test]
fn connect_twice_while_connected_echoes_without_reopening() {
    let mock = MockClient::new();
    let session = session_with(&mock, &config());
    session.connect().unwrap();
    mock.raise_link_up();
    session.queue().drain();

    session.connect().unwrap();
    session.connect().unwrap();

    assert_eq!(mock.opened().len(), 1);
    assert_eq!(statuses(&session.queue().drain()), vec![(2.0, 1), (2.0, 1)]);
}

#[test]
fn connect_while_connecting_does_not_reopen() {
    let mock = MockClient::new();
    let session = session_with(&mock, &config());
    session.connect().unwrap();
    session.connect().unwrap();

    assert_eq!(mock.opened().len(), 1);
    assert_eq!(statuses(&session.queue().drain()), vec![(1.0, 0), (1.0, 0)]);
}

#[test]
fn failed_open_reports_connect_error() {
    let mock = MockClient::new();
    mock.fail_open(true);
    let session = session_with(&mock, &config());

    assert!(session.connect().is_err());
    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(session.reason(), ConnectReason::ConnectError);
    assert_eq!(statuses(&session.queue().drain()), vec![(1.0, 0), (0.0, 3)]);

    // The session can try again once the vehicle is reachable.
    mock.fail_open(false);
    session.connect().unwrap();
    assert_eq!(mock.opened().len(), 2);
}

#[test]
fn scanning_start_allows_connect() {
    let mock = MockClient::new();
    let mut cfg = config();
    cfg.start_scanning = true;
    let session = session_with(&mock, &cfg);

    assert_eq!(session.state(), SessionState::Scanning);
    session.connect().unwrap();
    assert_eq!(mock.opened().len(), 1);
    assert_eq!(session.state(), SessionState::Connecting);
}

#[test]
fn connection_requested_resets_reason() {
    let mock = MockClient::new();
    mock.fail_open(true);
    let session = session_with(&mock, &config());
    let _ = session.connect();
    assert_eq!(session.reason(), ConnectReason::ConnectError);
    session.queue().drain();

    mock.raise_connection_requested();
    assert_eq!(session.state(), SessionState::Connecting);
    assert_eq!(session.reason(), ConnectReason::NoConnect);
    assert_eq!(statuses(&session.queue().drain()), vec![(1.0, 0)]);
}

// ---------------------------------------------------------------------------
// Disconnect
// ---------------------------------------------------------------------------

#[test]
fn connection_lost_emits_one_connect_error_status() {
    let mock = MockClient::new();
    let session = session_with(&mock, &config());
    session.connect().unwrap();
    mock.raise_link_up();
    session.queue().drain();

    mock.raise_connection_lost("socket closed");
    // Clients usually follow up with `disconnected`; nothing changes.
    mock.raise_disconnected();

    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(session.reason(), ConnectReason::ConnectError);
    assert_eq!(statuses(&session.queue().drain()), vec![(0.0, 3)]);
    assert!(session.telemetry().subscribed().is_empty());
}

#[test]
fn connection_failed_emits_connect_error() {
    let mock = MockClient::new();
    let session = session_with(&mock, &config());
    session.connect().unwrap();
    session.queue().drain();

    mock.raise_connection_failed("no answer");

    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(statuses(&session.queue().drain()), vec![(0.0, 3)]);
}

#[test]
fn user_disconnect_closes_link() {
    let mock = MockClient::new();
    let session = session_with(&mock, &config());
    session.connect().unwrap();
    mock.raise_link_up();
    session.queue().drain();

    session.disconnect();

    assert_eq!(mock.closes(), 1);
    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(session.reason(), ConnectReason::ManualDisconnect);
    assert_eq!(statuses(&session.queue().drain()), vec![(0.0, 4)]);
    assert!(session.telemetry().subscribed().is_empty());
}

#[test]
fn reconnect_registers_groups_again() {
    let mock = MockClient::new();
    let session = session_with(&mock, &config());
    session.connect().unwrap();
    mock.raise_link_up();
    session.disconnect();

    session.connect().unwrap();
    mock.raise_link_up();

    assert_eq!(mock.log_configs().len(), 10);
    assert_eq!(session.telemetry().subscribed().len(), 5);
}

// ---------------------------------------------------------------------------
// Stall rule
// ---------------------------------------------------------------------------

#[test]
fn stall_while_connected_forces_close() {
    let mock = MockClient::new();
    let session = session_with(&mock, &config());
    session.connect().unwrap();
    mock.raise_link_up();
    session.queue().drain();

    session.on_outbound_stalled();

    assert_eq!(mock.closes(), 1);
    assert_eq!(session.reason(), ConnectReason::SocketBlocked);
    // The mock reports `disconnected` from inside close_link.
    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(statuses(&session.queue().drain()), vec![(0.0, 2)]);
}

#[test]
fn stall_disconnects_even_when_client_stays_silent() {
    let mock = MockClient::new();
    mock.quiet_close(true);
    let session = session_with(&mock, &config());
    session.connect().unwrap();
    mock.raise_link_up();
    session.queue().drain();

    session.on_outbound_stalled();

    assert_eq!(mock.closes(), 1);
    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(session.reason(), ConnectReason::SocketBlocked);
    assert_eq!(statuses(&session.queue().drain()), vec![(0.0, 2)]);

    // A second idle timeout finds nothing left to close.
    session.on_outbound_stalled();
    assert_eq!(mock.closes(), 1);
    assert!(session.queue().is_empty());
}

#[test]
fn stall_while_disconnected_is_ignored() {
    let mock = MockClient::new();
    let session = session_with(&mock, &config());

    session.on_outbound_stalled();

    assert_eq!(mock.closes(), 0);
    assert_eq!(session.reason(), ConnectReason::NoConnect);
    assert!(session.queue().is_empty());
}

// ---------------------------------------------------------------------------
// Telemetry
// ---------------------------------------------------------------------------

#[test]
fn failing_group_does_not_block_others() {
    let mock = MockClient::new();
    mock.fail_group("Barometer");
    let session = session_with(&mock, &config());
    session.connect().unwrap();
    mock.raise_link_up();

    assert!(mock.log_configs().contains(&"Barometer".to_string()));
    assert_eq!(
        session.telemetry().subscribed(),
        vec![
            TelemetryGroup::Battery,
            TelemetryGroup::Motors,
            TelemetryGroup::Magnetometer,
            TelemetryGroup::AccSensor,
        ]
    );
}

#[test]
fn samples_forwarded_only_while_connected() {
    let mock = MockClient::new();
    let session = session_with(&mock, &config());
    session.connect().unwrap();
    mock.raise_link_up();
    session.queue().drain();

    let battery = record(&[(LOG_VBAT, 3.7), (LOG_BATTERY_STATE, 0.0)]);
    assert_eq!(mock.emit("Battery", &battery), 1);
    mock.raise_pose([1.0, 2.0, 0.5, 0.0, 0.0, 90.0]);

    let sent = session.queue().drain();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].cmd, Cmd::Pm);
    assert_eq!(sent[0].data, vec![3.7, 0.0]);
    assert_eq!(sent[1].cmd, Cmd::Estimate);
    assert_eq!(sent[1].data, vec![1.0, 2.0, 0.5, 0.0, 0.0, 90.0]);

    mock.raise_connection_lost("gone");
    session.queue().drain();
    mock.raise_pose([0.0; 6]);
    assert!(session.queue().is_empty());
}

/// Samples arriving on several client threads with nothing draining the
/// queue never block, and each thread's survivors keep their order.
#[test]
fn concurrent_samples_keep_per_thread_order() {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 5_000;

    let mock = MockClient::new();
    let mut cfg = config();
    cfg.queue_capacity = 1024;
    let session = session_with(&mock, &cfg);
    session.connect().unwrap();
    mock.raise_link_up();
    session.queue().drain();

    let (done_tx, done_rx) = std::sync::mpsc::channel();
    let workers: Vec<_> = (0..THREADS)
        .map(|producer| {
            let mock = Arc::clone(&mock);
            let done = done_tx.clone();
            std::thread::spawn(move || {
                for seq in 0..PER_THREAD {
                    // acc.x tags the producer, acc.y carries its sequence.
                    let sample = record(&[
                        ("acc.x", producer as f64),
                        ("acc.y", seq as f64),
                        ("acc.z", 0.0),
                    ]);
                    mock.emit("AccSensor", &sample);
                }
                done.send(()).unwrap();
            })
        })
        .collect();
    drop(done_tx);

    for _ in 0..THREADS {
        done_rx
            .recv_timeout(Duration::from_secs(10))
            .expect("producer thread blocked");
    }
    for worker in workers {
        worker.join().unwrap();
    }

    let queue = session.queue();
    assert_eq!(queue.len(), 1024);
    assert_eq!(queue.dropped(), (THREADS * PER_THREAD - 1024) as u64);

    let mut last_seen = vec![None::<f64>; THREADS];
    for msg in queue.drain() {
        assert_eq!(msg.cmd, Cmd::Acc);
        let producer = msg.data[0] as usize;
        let seq = msg.data[1];
        if let Some(prev) = last_seen[producer] {
            assert!(seq > prev, "producer {producer}: {seq} after {prev}");
        }
        last_seen[producer] = Some(seq);
    }
}

#[test]
fn incomplete_sample_is_dropped() {
    let mock = MockClient::new();
    let session = session_with(&mock, &config());
    session.connect().unwrap();
    mock.raise_link_up();
    session.queue().drain();

    mock.emit("Magnetometer", &record(&[("mag.x", 0.1), ("mag.y", 0.2)]));
    assert!(session.queue().is_empty());

    mock.emit(
        "Magnetometer",
        &record(&[("mag.x", 0.1), ("mag.y", 0.2), ("mag.z", 0.3)]),
    );
    let sent = session.queue().drain();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].cmd, Cmd::Magnetometer);
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

#[test]
fn param_write_is_forwarded() {
    let mock = MockClient::new();
    let session = session_with(&mock, &config());

    session.set_param("ring.effect", "7").unwrap();

    assert_eq!(mock.params(), vec![("ring.effect".into(), "7".into())]);
    assert!(session.queue().is_empty());
}

#[test]
fn failed_param_write_is_echoed() {
    let mock = MockClient::new();
    mock.fail_params(true);
    let session = session_with(&mock, &config());

    assert!(session.set_param("ring.effect", "7").is_err());
    assert!(session.set_param("ring.color", "blue").is_err());

    let sent = session.queue().drain();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].cmd, Cmd::Param("ring.effect".into()));
    assert_eq!(sent[0].data, vec![7.0]);
    assert_eq!(sent[0].status, 1);
    assert_eq!(sent[1].data, vec![0.0]);
}
