//! Configuration for a replication session.

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;
use tripsync_store::CollectionId;
use url::Url;
use zeroize::Zeroize;

/// Endpoint schemes accepted by [`ReplicatorConfig::validate`].
pub const SUPPORTED_SCHEMES: &[&str] = &["ws", "wss", "http", "https", "memory"];

/// Which way documents flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    /// Local changes are sent to the remote only.
    Push,
    /// Remote changes are fetched only.
    Pull,
    /// Both directions.
    #[default]
    PushAndPull,
}

impl Direction {
    /// Returns true if local changes are pushed.
    pub fn pushes(&self) -> bool {
        matches!(self, Direction::Push | Direction::PushAndPull)
    }

    /// Returns true if remote changes are pulled.
    pub fn pulls(&self) -> bool {
        matches!(self, Direction::Pull | Direction::PushAndPull)
    }
}

/// Credentials presented to the remote endpoint.
///
/// Secrets are wiped from memory on drop and never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// HTTP basic authentication.
    Basic {
        /// User name.
        username: String,
        /// Password.
        password: String,
    },
    /// A session token issued by the remote.
    Session {
        /// Token value.
        token: String,
    },
}

impl Credentials {
    /// Creates basic credentials.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Creates session-token credentials.
    pub fn session(token: impl Into<String>) -> Self {
        Credentials::Session {
            token: token.into(),
        }
    }

    /// Returns the user name, if these are basic credentials.
    pub fn username(&self) -> Option<&str> {
        match self {
            Credentials::Basic { username, .. } => Some(username),
            Credentials::Session { .. } => None,
        }
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        match self {
            Credentials::Basic { username, .. } if username.trim().is_empty() => Err(
                ConfigurationError::InvalidCredentials("username must not be empty"),
            ),
            Credentials::Session { token } if token.is_empty() => Err(
                ConfigurationError::InvalidCredentials("session token must not be empty"),
            ),
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Credentials::Session { .. } => f
                .debug_struct("Session")
                .field("token", &"<redacted>")
                .finish(),
        }
    }
}

impl Drop for Credentials {
    fn drop(&mut self) {
        match self {
            Credentials::Basic { username, password } => {
                username.zeroize();
                password.zeroize();
            }
            Credentials::Session { token } => token.zeroize(),
        }
    }
}

/// Configuration for a replication session.
#[derive(Debug, Clone)]
pub struct ReplicatorConfig {
    /// Remote endpoint URL.
    pub endpoint: String,
    /// Credentials; `None` replicates anonymously.
    pub credentials: Option<Credentials>,
    /// Collections to replicate.
    pub collections: BTreeSet<CollectionId>,
    /// Replication direction.
    pub direction: Direction,
    /// Whether the session stays open after catching up.
    pub continuous: bool,
    /// Upper bound on how long `stop()` waits for the event pump to exit.
    pub stop_timeout: Duration,
}

impl ReplicatorConfig {
    /// Creates a continuous push-and-pull configuration with no collections.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            credentials: None,
            collections: BTreeSet::new(),
            direction: Direction::PushAndPull,
            continuous: true,
            stop_timeout: Duration::from_secs(5),
        }
    }

    /// Adds a collection.
    pub fn with_collection(mut self, collection: CollectionId) -> Self {
        self.collections.insert(collection);
        self
    }

    /// Adds several collections.
    pub fn with_collections(mut self, collections: impl IntoIterator<Item = CollectionId>) -> Self {
        self.collections.extend(collections);
        self
    }

    /// Sets the credentials.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Sets the replication direction.
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Sets whether replication is continuous.
    pub fn with_continuous(mut self, continuous: bool) -> Self {
        self.continuous = continuous;
        self
    }

    /// Sets the stop timeout.
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Validates the configuration and returns the parsed endpoint.
    pub fn validate(&self) -> Result<Url, ConfigurationError> {
        let endpoint = parse_endpoint(&self.endpoint)?;
        if self.collections.is_empty() {
            return Err(ConfigurationError::NoCollections);
        }
        if let Some(credentials) = &self.credentials {
            credentials.validate()?;
        }
        Ok(endpoint)
    }
}

fn parse_endpoint(endpoint: &str) -> Result<Url, ConfigurationError> {
    let invalid = |reason: String| ConfigurationError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };

    let url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    if !SUPPORTED_SCHEMES.contains(&url.scheme()) {
        return Err(ConfigurationError::UnsupportedScheme(url.scheme().to_string()));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".into()));
    }
    Ok(url)
}
