//! Transport layer abstraction for replication.

use crate::config::ReplicatorConfig;
use crate::error::TransportError;
use crate::state::{ActivityPhase, Progress};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use url::Url;

/// A status event reported by the transport.
///
/// Missing fields deserialize to their defaults, so an error-only event can
/// be written as `{"error": {"kind": "auth", "message": "unauthorized"}}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransportEvent {
    /// Progress counters.
    #[serde(default)]
    pub progress: Progress,
    /// Activity reported by the transport.
    #[serde(default)]
    pub activity: ActivityPhase,
    /// Failure, if the transport hit one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TransportError>,
}

impl TransportEvent {
    /// Creates a progress event.
    pub fn activity(activity: ActivityPhase, completed: u64, total: u64) -> Self {
        Self {
            progress: Progress::new(completed, total),
            activity,
            error: None,
        }
    }

    /// Creates an error event.
    pub fn failure(error: TransportError) -> Self {
        Self {
            progress: Progress::default(),
            activity: ActivityPhase::Offline,
            error: Some(error),
        }
    }
}

/// A replication transport performs continuous sync with a remote endpoint.
///
/// This trait abstracts the wire protocol, allowing for different
/// implementations (WebSocket replicators, scripted transports for tests,
/// etc.). Connection failures are reported as error events on the stream,
/// never as return values; the transport is expected to retry on its own.
pub trait ReplicationTransport: Send + Sync {
    /// Opens a session and returns its event stream.
    ///
    /// Must not block on connection establishment.
    fn open(&self, endpoint: &Url, config: &ReplicatorConfig) -> Receiver<TransportEvent>;

    /// Tears down the current session. The event stream should disconnect
    /// shortly after.
    fn close(&self);
}

/// A transport that replays a fixed list of events.
#[derive(Debug)]
pub struct ScriptedTransport {
    events: Vec<TransportEvent>,
    delay: Duration,
    opens: AtomicUsize,
    closed: Mutex<Arc<AtomicBool>>,
}

impl ScriptedTransport {
    /// Creates a transport that replays `events` on every open.
    pub fn new(events: Vec<TransportEvent>) -> Self {
        Self {
            events,
            delay: Duration::ZERO,
            opens: AtomicUsize::new(0),
            closed: Mutex::new(Arc::new(AtomicBool::new(false))),
        }
    }

    /// Sets the pause before each event.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Returns how many sessions have been opened.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Returns the number of scripted events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if the script is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl ReplicationTransport for ScriptedTransport {
    fn open(&self, endpoint: &Url, _config: &ReplicatorConfig) -> Receiver<TransportEvent> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let closed = Arc::new(AtomicBool::new(false));
        *self.closed.lock() = Arc::clone(&closed);

        let (tx, rx) = mpsc::channel();
        let events = self.events.clone();
        let delay = self.delay;
        tracing::debug!(%endpoint, events = events.len(), "replaying scripted transport");

        let spawned = thread::Builder::new()
            .name("tripsync-script".into())
            .spawn(move || {
                for event in events {
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                    if closed.load(Ordering::SeqCst) || tx.send(event).is_err() {
                        break;
                    }
                }
            });
        if let Err(e) = spawned {
            tracing::error!(error = %e, "failed to spawn scripted transport");
        }
        rx
    }

    fn close(&self) {
        self.closed.lock().store(true, Ordering::SeqCst);
    }
}

/// A transport whose events are pushed by hand.
///
/// Useful in tests that need to interleave events with supervisor calls.
#[derive(Debug, Default)]
pub struct ChannelTransport {
    sender: Mutex<Option<Sender<TransportEvent>>>,
    opens: AtomicUsize,
}

impl ChannelTransport {
    /// Creates a transport with no open session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends an event on the open session. Returns false if none is open.
    pub fn send(&self, event: TransportEvent) -> bool {
        match self.sender.lock().as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Returns true while a session is open.
    pub fn is_open(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Returns how many sessions have been opened.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl ReplicationTransport for ChannelTransport {
    fn open(&self, _endpoint: &Url, _config: &ReplicatorConfig) -> Receiver<TransportEvent> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel();
        *self.sender.lock() = Some(tx);
        rx
    }

    fn close(&self) {
        self.sender.lock().take();
    }
}
