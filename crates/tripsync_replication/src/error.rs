//! Error types for replication.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for replication operations.
pub type ReplicationResult<T> = Result<T, ReplicationError>;

/// Errors returned synchronously by supervisor operations.
///
/// Transport failures are not in this list: they are recorded in the
/// session's status instead of being returned.
#[derive(Error, Debug)]
pub enum ReplicationError {
    /// The session configuration was rejected; no session was created.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// The event pump thread could not be started.
    #[error("failed to spawn replication pump: {0}")]
    Spawn(#[from] std::io::Error),
}

impl ReplicationError {
    /// Returns the configuration error, if this is one.
    pub fn as_configuration(&self) -> Option<&ConfigurationError> {
        match self {
            ReplicationError::Configuration(err) => Some(err),
            ReplicationError::Spawn(_) => None,
        }
    }
}

/// Reasons a replicator configuration is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The endpoint is not a well-formed absolute URL.
    #[error("invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint {
        /// Endpoint as supplied.
        endpoint: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The endpoint scheme is not one replication can speak.
    #[error("unsupported endpoint scheme {0:?}")]
    UnsupportedScheme(String),

    /// No collections were configured.
    #[error("no collections configured for replication")]
    NoCollections,

    /// Credentials are present but unusable.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(&'static str),
}

/// Category of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportErrorKind {
    /// Connectivity problem (DNS, TLS, socket, timeout).
    Network,
    /// The remote rejected the credentials.
    Auth,
    /// The remote rejected or failed a replication request.
    Replication,
    /// Anything the transport does not classify.
    #[serde(other)]
    Other,
}

impl TransportErrorKind {
    /// Returns the lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportErrorKind::Network => "network",
            TransportErrorKind::Auth => "auth",
            TransportErrorKind::Replication => "replication",
            TransportErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure reported by the transport.
///
/// The transport keeps retrying underneath, so this is state, not control
/// flow: it is stored in the session and shown in snapshots until an idle
/// event clears it.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    /// Failure category.
    pub kind: TransportErrorKind,
    /// Message suitable for display.
    pub message: String,
}

impl TransportError {
    /// Creates a transport error.
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Network, message)
    }

    /// Creates an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Auth, message)
    }
}
