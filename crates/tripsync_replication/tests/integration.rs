//! Integration tests for the replication supervisor.

use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tripsync_replication::{
    ActivityPhase, ChannelTransport, CollectionId, Credentials, ReplicationSupervisor,
    ReplicatorConfig, ScriptedTransport, StatusSnapshot, TransportError, TransportErrorKind,
    TransportEvent,
};

fn demo_config() -> ReplicatorConfig {
    ReplicatorConfig::new("wss://example/endpoint")
        .with_collections([
            CollectionId::in_default_scope("users").unwrap(),
            CollectionId::in_default_scope("shared").unwrap(),
        ])
        .with_credentials(Credentials::basic("user_name", "password"))
}

fn record<T: tripsync_replication::ReplicationTransport>(
    supervisor: &ReplicationSupervisor<T>,
) -> Arc<Mutex<Vec<StatusSnapshot>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    supervisor.on_status_change(move |s| sink.lock().push(s.clone()));
    seen
}

fn wait_for_len(seen: &Mutex<Vec<StatusSnapshot>>, len: usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while seen.lock().len() < len {
        assert!(Instant::now() < deadline, "timed out waiting for snapshots");
        thread::sleep(Duration::from_millis(2));
    }
}

fn rendered(seen: &Mutex<Vec<StatusSnapshot>>) -> Vec<String> {
    seen.lock().iter().map(StatusSnapshot::render).collect()
}

#[test]
fn catch_up_scenario() {
    let transport = ScriptedTransport::new(vec![
        TransportEvent::activity(ActivityPhase::Connecting, 0, 10),
        TransportEvent::activity(ActivityPhase::Busy, 5, 10),
        TransportEvent::activity(ActivityPhase::Idle, 10, 10),
    ]);
    let supervisor = ReplicationSupervisor::new(transport);
    let seen = record(&supervisor);

    supervisor.start(&demo_config()).unwrap();
    wait_for_len(&seen, 5);

    // Initial "Not synced" and the start transition, then one per event.
    assert_eq!(
        rendered(&seen)[2..],
        ["Syncing: 0/10", "Syncing: 5/10", "Sync complete"]
    );
    let status = supervisor.current_status();
    assert_eq!(status.phase(), ActivityPhase::Idle);
    assert_eq!(status.completed(), status.total());
}

#[test]
fn auth_error_scenario() {
    let transport = ScriptedTransport::new(vec![TransportEvent::failure(TransportError::new(
        TransportErrorKind::Auth,
        "unauthorized",
    ))]);
    let supervisor = ReplicationSupervisor::new(transport);
    let seen = record(&supervisor);

    supervisor.start(&demo_config()).unwrap();
    wait_for_len(&seen, 3);

    let status = supervisor.current_status();
    assert_eq!(status.phase(), ActivityPhase::Offline);
    assert_eq!(status.error_kind(), Some(TransportErrorKind::Auth));
    assert_eq!(status.render(), "Error: unauthorized");

    // Errors do not end the session.
    assert!(supervisor.is_running());
}

#[test]
fn error_then_idle_recovers() {
    let transport = ScriptedTransport::new(vec![
        TransportEvent::failure(TransportError::network("connection reset")),
        TransportEvent::activity(ActivityPhase::Connecting, 0, 0),
        TransportEvent::activity(ActivityPhase::Idle, 2, 2),
    ]);
    let supervisor = ReplicationSupervisor::new(transport);
    let seen = record(&supervisor);

    supervisor.start(&demo_config()).unwrap();
    wait_for_len(&seen, 5);

    assert_eq!(
        rendered(&seen)[2..],
        [
            "Error: connection reset",
            "Error: connection reset",
            "Sync complete"
        ]
    );
    assert!(supervisor.current_status().error().is_none());
}

#[test]
fn zero_total_never_faults() {
    let transport =
        ScriptedTransport::new(vec![TransportEvent::activity(ActivityPhase::Busy, 0, 0)]);
    let supervisor = ReplicationSupervisor::new(transport);
    let seen = record(&supervisor);

    supervisor.start(&demo_config()).unwrap();
    wait_for_len(&seen, 3);

    let status = supervisor.current_status();
    assert_eq!(status.render(), "Syncing: 0/0");
    assert_eq!(status.percent_complete(), None);
}

#[test]
fn no_callbacks_after_stop() {
    let supervisor = ReplicationSupervisor::new(ChannelTransport::new());
    let seen = record(&supervisor);
    supervisor.start(&demo_config()).unwrap();

    for i in 0..500 {
        supervisor
            .transport()
            .send(TransportEvent::activity(ActivityPhase::Busy, i, 500));
    }
    supervisor.stop();
    let after_stop = seen.lock().len();

    // Give any straggling pump a chance to misbehave.
    thread::sleep(Duration::from_millis(100));
    assert_eq!(seen.lock().len(), after_stop);
    assert_eq!(
        seen.lock().last().map(StatusSnapshot::phase),
        Some(ActivityPhase::Stopped)
    );
    assert_eq!(supervisor.current_status().phase(), ActivityPhase::Stopped);

    // The transport has been closed; nothing can be queued any more.
    assert!(!supervisor
        .transport()
        .send(TransportEvent::activity(ActivityPhase::Idle, 1, 1)));
}

#[test]
fn each_observer_sees_events_in_order() {
    let supervisor = ReplicationSupervisor::new(ChannelTransport::new());
    let observers: Vec<_> = (0..4).map(|_| record(&supervisor)).collect();
    supervisor.start(&demo_config()).unwrap();

    let total = 200;
    for i in 1..=total {
        supervisor
            .transport()
            .send(TransportEvent::activity(ActivityPhase::Busy, i, total));
    }

    for seen in &observers {
        wait_for_len(seen, total as usize + 2);
        let completed: Vec<u64> = seen.lock()[2..].iter().map(|s| s.completed()).collect();
        assert_eq!(completed, (1..=total).collect::<Vec<_>>());
    }
}

#[test]
fn concurrent_readers_never_see_torn_snapshots() {
    let supervisor = Arc::new(ReplicationSupervisor::new(ChannelTransport::new()));
    supervisor.start(&demo_config()).unwrap();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let supervisor = Arc::clone(&supervisor);
            thread::spawn(move || {
                for _ in 0..2000 {
                    let status = supervisor.current_status();
                    // Every event below reports completed == total / 2.
                    if status.phase() == ActivityPhase::Busy {
                        assert_eq!(status.completed() * 2, status.total());
                    }
                }
            })
        })
        .collect();

    for i in 1..=500u64 {
        supervisor
            .transport()
            .send(TransportEvent::activity(ActivityPhase::Busy, i, i * 2));
    }
    for reader in readers {
        reader.join().unwrap();
    }
    supervisor.stop();
}

#[test]
fn concurrent_starts_open_one_session() {
    let supervisor = Arc::new(ReplicationSupervisor::new(ChannelTransport::new()));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let supervisor = Arc::clone(&supervisor);
            thread::spawn(move || supervisor.start(&demo_config()).unwrap())
        })
        .collect();

    let ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(ids.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(supervisor.transport().open_count(), 1);
}

#[test]
fn stop_does_not_wait_for_transport_hang_up() {
    // A transport that never hangs up its event stream on close.
    struct Stubborn {
        senders: Mutex<Vec<std::sync::mpsc::Sender<TransportEvent>>>,
    }
    impl tripsync_replication::ReplicationTransport for Stubborn {
        fn open(
            &self,
            _endpoint: &url::Url,
            _config: &ReplicatorConfig,
        ) -> std::sync::mpsc::Receiver<TransportEvent> {
            let (tx, rx) = std::sync::mpsc::channel();
            self.senders.lock().push(tx);
            rx
        }
        fn close(&self) {}
    }

    let supervisor = ReplicationSupervisor::new(Stubborn {
        senders: Mutex::new(Vec::new()),
    });
    let config = demo_config().with_stop_timeout(Duration::from_secs(2));
    supervisor.start(&config).unwrap();

    let started = Instant::now();
    supervisor.stop();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!supervisor.is_running());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn snapshots_follow_event_order(totals in prop::collection::vec(1u64..1000, 1..40)) {
        let supervisor = ReplicationSupervisor::new(ChannelTransport::new());
        let seen = record(&supervisor);
        supervisor.start(&demo_config()).unwrap();

        for total in &totals {
            supervisor
                .transport()
                .send(TransportEvent::activity(ActivityPhase::Busy, total / 2, *total));
        }
        wait_for_len(&seen, totals.len() + 2);

        let observed: Vec<u64> = seen.lock()[2..].iter().map(|s| s.total()).collect();
        prop_assert_eq!(observed, totals);
        for snapshot in seen.lock().iter() {
            if snapshot.total() > 0 {
                prop_assert!(snapshot.completed() <= snapshot.total());
            }
        }
    }
}
