//! Replication session state machine.

use crate::config::{Direction, ReplicatorConfig};
use crate::error::{TransportError, TransportErrorKind};
use crate::transport::TransportEvent;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tripsync_store::CollectionId;
use url::Url;
use uuid::Uuid;

/// Activity phase of a replication session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityPhase {
    /// No session is running.
    #[default]
    Stopped,
    /// Establishing the connection.
    Connecting,
    /// Connected and caught up.
    Idle,
    /// Transferring changes.
    Busy,
    /// Disconnected; the transport is retrying.
    Offline,
}

impl ActivityPhase {
    /// Returns true while the session is moving data or trying to.
    pub fn is_active(&self) -> bool {
        matches!(self, ActivityPhase::Connecting | ActivityPhase::Busy)
    }

    /// Returns the lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityPhase::Stopped => "stopped",
            ActivityPhase::Connecting => "connecting",
            ActivityPhase::Idle => "idle",
            ActivityPhase::Busy => "busy",
            ActivityPhase::Offline => "offline",
        }
    }
}

impl fmt::Display for ActivityPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Replication progress in transport-defined units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Progress {
    /// Units completed.
    pub completed: u64,
    /// Units known so far.
    pub total: u64,
}

impl Progress {
    /// Creates a progress value.
    pub fn new(completed: u64, total: u64) -> Self {
        Self { completed, total }
    }

    /// Returns true when there is nothing left to transfer.
    pub fn is_caught_up(&self) -> bool {
        self.completed >= self.total
    }

    /// Percentage complete, or `None` when nothing has been counted yet.
    pub fn percent(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.completed as f64 * 100.0 / self.total as f64)
        }
    }

    /// Caps `completed` at `total` when a total is known.
    fn clamped(self) -> Self {
        if self.total > 0 && self.completed > self.total {
            Self::new(self.total, self.total)
        } else {
            self
        }
    }
}

/// Unique identifier of a replication session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Immutable, point-in-time status of the supervisor.
///
/// Snapshots are never mutated after creation; each transition publishes a
/// new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<SessionId>,
    phase: ActivityPhase,
    completed: u64,
    total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<TransportError>,
}

impl StatusSnapshot {
    /// Snapshot of a supervisor with no running session.
    pub fn stopped() -> Self {
        Self {
            session_id: None,
            phase: ActivityPhase::Stopped,
            completed: 0,
            total: 0,
            error: None,
        }
    }

    /// Session this snapshot belongs to; `None` when stopped.
    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id
    }

    /// Activity phase.
    pub fn phase(&self) -> ActivityPhase {
        self.phase
    }

    /// Units completed.
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Units known so far.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Progress as a value.
    pub fn progress(&self) -> Progress {
        Progress::new(self.completed, self.total)
    }

    /// Last transport error, if not yet cleared.
    pub fn error(&self) -> Option<&TransportError> {
        self.error.as_ref()
    }

    /// Kind of the last transport error.
    pub fn error_kind(&self) -> Option<TransportErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    /// Message of the last transport error.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }

    /// Percentage complete; `None` when the total is zero.
    pub fn percent_complete(&self) -> Option<f64> {
        self.progress().percent()
    }

    /// Human-readable status line.
    ///
    /// - `"Error: {message}"` when an error is present.
    /// - `"Sync complete"` when idle.
    /// - `"Syncing: {completed}/{total}"` otherwise.
    ///
    /// One exception to those rules: a stopped snapshot with no session and
    /// no error renders `"Not synced"` instead of `"Syncing: 0/0"`. This is
    /// the label shown before replication ever starts and after `stop()`.
    pub fn render(&self) -> String {
        if let Some(error) = &self.error {
            return format!("Error: {}", error.message);
        }
        match self.phase {
            ActivityPhase::Idle => "Sync complete".to_string(),
            ActivityPhase::Stopped if self.session_id.is_none() => "Not synced".to_string(),
            _ => format!("Syncing: {}/{}", self.completed, self.total),
        }
    }
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self::stopped()
    }
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Static description of a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// Session ID.
    pub id: SessionId,
    /// Parsed remote endpoint.
    pub endpoint: Url,
    /// Collections being replicated.
    pub collections: BTreeSet<CollectionId>,
    /// Replication direction.
    pub direction: Direction,
    /// Whether the session is continuous.
    pub continuous: bool,
}

/// One continuous replication attempt.
///
/// Only the supervisor's event handler mutates a session; everyone else
/// sees it through snapshots.
#[derive(Debug, Clone)]
pub struct SyncSession {
    info: SessionInfo,
    phase: ActivityPhase,
    last_error: Option<TransportError>,
    progress: Progress,
}

impl SyncSession {
    /// Creates a session in the `connecting` phase.
    pub fn new(endpoint: Url, config: &ReplicatorConfig) -> Self {
        Self {
            info: SessionInfo {
                id: SessionId::generate(),
                endpoint,
                collections: config.collections.clone(),
                direction: config.direction,
                continuous: config.continuous,
            },
            phase: ActivityPhase::Connecting,
            last_error: None,
            progress: Progress::default(),
        }
    }

    /// Returns the session ID.
    pub fn id(&self) -> SessionId {
        self.info.id
    }

    /// Returns the static session description.
    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    /// Returns the current phase.
    pub fn phase(&self) -> ActivityPhase {
        self.phase
    }

    /// Returns the last unrecovered error.
    pub fn last_error(&self) -> Option<&TransportError> {
        self.last_error.as_ref()
    }

    /// Returns the current progress.
    pub fn progress(&self) -> Progress {
        self.progress
    }

    /// Folds one transport event into the session and returns the new
    /// snapshot.
    pub fn apply(&mut self, event: TransportEvent) -> StatusSnapshot {
        match event.error {
            Some(error) => {
                tracing::warn!(
                    session = %self.info.id,
                    kind = %error.kind,
                    message = %error.message,
                    "replication error; transport will retry"
                );
                self.phase = ActivityPhase::Offline;
                self.last_error = Some(error);
            }
            None => {
                self.progress = event.progress.clamped();
                if event.activity == ActivityPhase::Idle {
                    if self.last_error.take().is_some() {
                        tracing::info!(session = %self.info.id, "replication recovered");
                    }
                    self.phase = ActivityPhase::Idle;
                    // Idle means caught up.
                    self.progress.completed = self.progress.total;
                } else {
                    self.phase = event.activity;
                }
            }
        }
        self.snapshot()
    }

    /// Returns a snapshot of the current state.
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            session_id: Some(self.info.id),
            phase: self.phase,
            completed: self.progress.completed,
            total: self.progress.total,
            error: self.last_error.clone(),
        }
    }
}
