//! # TripSync Replication
//!
//! Supervisor for a continuous, bidirectional replication session.
//!
//! This crate provides:
//! - Session configuration and validation (endpoint, credentials, collections)
//! - The session state machine (stopped → connecting → busy/idle/offline)
//! - Immutable status snapshots and their human-readable rendering
//! - Observer registration with ordered, synchronous delivery
//! - The transport abstraction plus scripted/channel transports for testing
//!
//! ## Architecture
//!
//! The transport owns the wire protocol and retries underneath. It reports
//! progress and activity as a stream of events. The supervisor runs one
//! pump thread per session that folds each event into the session state
//! and republishes a snapshot to every observer.
//!
//! ## Key Invariants
//!
//! - At most one session runs per supervisor (single-flight)
//! - Each observer sees snapshots in event order, with no drops
//! - No snapshot from a session is delivered after `stop()` returns
//! - Transport failures never escape the event handler; they only show up
//!   in the snapshot's error field
//! - An idle event clears any previous error

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod state;
mod supervisor;
mod transport;

pub use config::{Credentials, Direction, ReplicatorConfig, SUPPORTED_SCHEMES};
pub use error::{
    ConfigurationError, ReplicationError, ReplicationResult, TransportError, TransportErrorKind,
};
pub use state::{ActivityPhase, Progress, SessionId, SessionInfo, StatusSnapshot, SyncSession};
pub use supervisor::{ObserverToken, ReplicationSupervisor};
pub use transport::{ChannelTransport, ReplicationTransport, ScriptedTransport, TransportEvent};
pub use tripsync_store::CollectionId;
