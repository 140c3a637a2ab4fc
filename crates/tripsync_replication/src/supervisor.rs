//! Replication supervisor.
//!
//! Owns the lifecycle of a single continuous replication session and
//! republishes its status to observers.
//!
//! # Locking
//!
//! - `delivery` (reentrant) serializes every publication: event handling,
//!   start/stop transitions and the initial snapshot handed to a new
//!   observer. It is what gives each observer a gap-free, ordered stream.
//! - `session` guards the session state; it is only held briefly and never
//!   while observers run. Event snapshots are swapped into `status` under it,
//!   so a `stop()` that gives up waiting on a slow observer can still retire
//!   the session and reset the status.
//! - `status` holds the latest snapshot behind an `Arc` swap so readers
//!   never block on delivery.
//!
//! Lock order is `delivery` → `session` → `status`/`observers`.

use crate::config::ReplicatorConfig;
use crate::error::ReplicationResult;
use crate::state::{ActivityPhase, SessionId, SessionInfo, StatusSnapshot, SyncSession};
use crate::transport::{ReplicationTransport, TransportEvent};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How often an idle pump re-checks for cancellation.
const PUMP_POLL_INTERVAL: Duration = Duration::from_millis(25);

type Observer = Arc<dyn Fn(&StatusSnapshot) + Send + Sync>;

/// Handle returned by [`ReplicationSupervisor::on_status_change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverToken(u64);

struct ActiveSession {
    session: SyncSession,
    cancelled: Arc<AtomicBool>,
    pump: Option<JoinHandle<()>>,
    pump_done: Receiver<()>,
    stop_timeout: Duration,
}

impl ActiveSession {
    fn join_pump(&mut self, wait: Duration) {
        let Some(handle) = self.pump.take() else {
            return;
        };
        // stop() called from an observer running on the pump itself.
        if handle.thread().id() == thread::current().id() {
            return;
        }
        match self.pump_done.recv_timeout(wait) {
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    session = %self.session.id(),
                    timeout = ?self.stop_timeout,
                    "event pump did not exit in time; detaching"
                );
            }
            _ => {
                let _ = handle.join();
            }
        }
    }
}

struct Shared {
    delivery: ReentrantMutex<()>,
    session: Mutex<Option<ActiveSession>>,
    status: RwLock<Arc<StatusSnapshot>>,
    observers: RwLock<Vec<(ObserverToken, Observer)>>,
    next_token: AtomicU64,
}

impl Shared {
    fn new() -> Self {
        Self {
            delivery: ReentrantMutex::new(()),
            session: Mutex::new(None),
            status: RwLock::new(Arc::new(StatusSnapshot::stopped())),
            observers: RwLock::new(Vec::new()),
            next_token: AtomicU64::new(1),
        }
    }

    /// Swaps in a new snapshot and notifies every observer.
    ///
    /// Callers must hold `delivery`.
    fn publish(&self, snapshot: StatusSnapshot) {
        let snapshot = Arc::new(snapshot);
        *self.status.write() = Arc::clone(&snapshot);
        self.notify_all(&snapshot);
    }

    fn notify_all(&self, snapshot: &StatusSnapshot) {
        let observers: Vec<Observer> = self
            .observers
            .read()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        for observer in &observers {
            notify(observer, snapshot);
        }
    }

    /// Applies an event if `id` is still the active session.
    ///
    /// Returns false once the session has been stopped or replaced.
    fn deliver(&self, id: SessionId, event: TransportEvent) -> bool {
        let _delivery = self.delivery.lock();
        let snapshot = {
            let mut guard = self.session.lock();
            let snapshot = match guard.as_mut() {
                Some(active) if active.session.id() == id => Arc::new(active.session.apply(event)),
                _ => return false,
            };
            *self.status.write() = Arc::clone(&snapshot);
            snapshot
        };
        tracing::trace!(session = %id, status = %snapshot, "status changed");
        self.notify_all(&snapshot);
        true
    }
}

fn notify(observer: &Observer, snapshot: &StatusSnapshot) {
    if panic::catch_unwind(AssertUnwindSafe(|| observer(snapshot))).is_err() {
        tracing::error!(status = %snapshot, "status observer panicked");
    }
}

fn run_pump(
    shared: Arc<Shared>,
    id: SessionId,
    events: Receiver<TransportEvent>,
    cancelled: Arc<AtomicBool>,
    _done: Sender<()>,
) {
    tracing::debug!(session = %id, "event pump started");
    while !cancelled.load(Ordering::SeqCst) {
        match events.recv_timeout(PUMP_POLL_INTERVAL) {
            Ok(event) => {
                if !shared.deliver(id, event) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                tracing::debug!(session = %id, "transport closed its event stream");
                break;
            }
        }
    }
    tracing::debug!(session = %id, "event pump exited");
}

/// Supervises one continuous replication session at a time.
///
/// # Example
///
/// ```ignore
/// use tripsync_replication::{ReplicationSupervisor, ReplicatorConfig, ScriptedTransport};
///
/// let supervisor = ReplicationSupervisor::new(ScriptedTransport::new(events));
/// supervisor.on_status_change(|status| println!("{status}"));
/// supervisor.start(&ReplicatorConfig::new("wss://sync.example.com/db").with_collection(users))?;
/// ```
///
/// Observers run synchronously on the thread that produced the transition,
/// usually the session's event pump. They may read the status and register
/// or remove observers, but must not call `start` or `stop`.
pub struct ReplicationSupervisor<T: ReplicationTransport> {
    transport: Arc<T>,
    shared: Arc<Shared>,
}

impl<T: ReplicationTransport> ReplicationSupervisor<T> {
    /// Creates a supervisor over a transport.
    pub fn new(transport: T) -> Self {
        Self::with_shared_transport(Arc::new(transport))
    }

    /// Creates a supervisor over a transport the caller keeps a handle to.
    pub fn with_shared_transport(transport: Arc<T>) -> Self {
        Self {
            transport,
            shared: Arc::new(Shared::new()),
        }
    }

    /// Returns the transport.
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Starts replication.
    ///
    /// Configuration errors are returned synchronously and leave no session
    /// behind. If a session is already running its ID is returned and
    /// nothing else happens. Otherwise this returns as soon as the transport
    /// session is opened, without waiting for a connection.
    pub fn start(&self, config: &ReplicatorConfig) -> ReplicationResult<SessionId> {
        let endpoint = config.validate()?;

        let _delivery = self.shared.delivery.lock();
        if let Some(active) = self.shared.session.lock().as_ref() {
            tracing::debug!(session = %active.session.id(), "replication already running");
            return Ok(active.session.id());
        }

        let session = SyncSession::new(endpoint, config);
        let id = session.id();
        let events = self.transport.open(&session.info().endpoint, config);

        let cancelled = Arc::new(AtomicBool::new(false));
        let (done_tx, pump_done) = mpsc::channel();
        let spawned = {
            let shared = Arc::clone(&self.shared);
            let cancelled = Arc::clone(&cancelled);
            thread::Builder::new()
                .name("tripsync-pump".into())
                .spawn(move || run_pump(shared, id, events, cancelled, done_tx))
        };
        let pump = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.transport.close();
                return Err(e.into());
            }
        };

        tracing::info!(
            session = %id,
            endpoint = %session.info().endpoint,
            collections = session.info().collections.len(),
            direction = ?config.direction,
            "replication started"
        );

        let snapshot = session.snapshot();
        *self.shared.session.lock() = Some(ActiveSession {
            session,
            cancelled,
            pump: Some(pump),
            pump_done,
            stop_timeout: config.stop_timeout,
        });
        self.shared.publish(snapshot);
        Ok(id)
    }

    /// Stops replication. Idempotent.
    ///
    /// Observers receive a final `stopped` snapshot before this returns, and
    /// nothing from the stopped session afterwards. Blocks for at most the
    /// configured stop timeout in total.
    ///
    /// If an observer is still busy with an earlier snapshot when the
    /// timeout expires, the session is retired and the status reset without
    /// notifying observers; that in-flight call is the last one they see
    /// from the session.
    pub fn stop(&self) {
        let timeout = self
            .shared
            .session
            .lock()
            .as_ref()
            .map(|active| active.stop_timeout);
        let started = Instant::now();
        let delivery = match timeout {
            Some(timeout) => self.shared.delivery.try_lock_for(timeout),
            None => Some(self.shared.delivery.lock()),
        };

        let active = {
            let mut guard = self.shared.session.lock();
            let active = guard.take();
            if let Some(active) = &active {
                active.cancelled.store(true, Ordering::SeqCst);
            }
            if delivery.is_none() {
                *self.shared.status.write() = Arc::new(StatusSnapshot::stopped());
            }
            active
        };
        if let Some(active) = &active {
            self.transport.close();
            tracing::info!(session = %active.session.id(), "replication stopped");
        }

        match delivery {
            Some(_delivery) => {
                if active.is_some()
                    || self.shared.status.read().phase() != ActivityPhase::Stopped
                {
                    self.shared.publish(StatusSnapshot::stopped());
                }
            }
            None => {
                tracing::warn!(
                    timeout = ?timeout,
                    "status observer still running; stopped without notifying observers"
                );
            }
        }

        if let Some(mut active) = active {
            let wait = active.stop_timeout.saturating_sub(started.elapsed());
            active.join_pump(wait);
        }
    }

    /// Returns the latest snapshot without blocking on delivery.
    pub fn current_status(&self) -> Arc<StatusSnapshot> {
        Arc::clone(&self.shared.status.read())
    }

    /// Registers an observer.
    ///
    /// The observer is called at once with the current snapshot, then with
    /// every later transition in order.
    pub fn on_status_change<F>(&self, observer: F) -> ObserverToken
    where
        F: Fn(&StatusSnapshot) + Send + Sync + 'static,
    {
        let observer: Observer = Arc::new(observer);
        let _delivery = self.shared.delivery.lock();

        let token = ObserverToken(self.shared.next_token.fetch_add(1, Ordering::SeqCst));
        self.shared
            .observers
            .write()
            .push((token, Arc::clone(&observer)));

        let current = self.current_status();
        notify(&observer, &current);
        token
    }

    /// Unregisters an observer. Returns false if the token was unknown.
    pub fn remove_observer(&self, token: ObserverToken) -> bool {
        let mut observers = self.shared.observers.write();
        let before = observers.len();
        observers.retain(|(t, _)| *t != token);
        observers.len() != before
    }

    /// Returns the number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.shared.observers.read().len()
    }

    /// Returns true while a session is running.
    pub fn is_running(&self) -> bool {
        self.shared.session.lock().is_some()
    }

    /// Describes the running session, if any.
    pub fn session(&self) -> Option<SessionInfo> {
        self.shared
            .session
            .lock()
            .as_ref()
            .map(|active| active.session.info().clone())
    }
}

impl<T: ReplicationTransport> Drop for ReplicationSupervisor<T> {
    fn drop(&mut self) {
        self.stop();
    }
}
