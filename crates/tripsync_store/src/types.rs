//! Core types shared by the store and the replication layer.

use crate::error::{StoreError, StoreResult};
use std::fmt;
use std::str::FromStr;

/// Scope used when a collection name carries no explicit scope.
pub const DEFAULT_SCOPE: &str = "_default";

/// A raw document body: a JSON object keyed by field name.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Callback invoked with the latest version of a watched document.
pub type QueryListener = Box<dyn Fn(&Document) + Send + Sync>;

/// Identifies a collection by scope and name.
///
/// Rendered as `scope.name`; parsing accepts either `scope.name` or a bare
/// `name`, which lands in [`DEFAULT_SCOPE`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollectionId {
    scope: String,
    name: String,
}

impl CollectionId {
    /// Creates a collection ID, validating both parts.
    pub fn new(scope: impl Into<String>, name: impl Into<String>) -> StoreResult<Self> {
        let scope = scope.into();
        let name = name.into();
        validate_part(&scope)?;
        validate_part(&name)?;
        Ok(Self { scope, name })
    }

    /// Creates a collection ID in the default scope.
    pub fn in_default_scope(name: impl Into<String>) -> StoreResult<Self> {
        Self::new(DEFAULT_SCOPE, name)
    }

    /// Returns the scope name.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Returns the collection name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

fn validate_part(part: &str) -> StoreResult<()> {
    let valid = !part.is_empty()
        && part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '%'));
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidCollectionName(part.to_string()))
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.scope, self.name)
    }
}

impl FromStr for CollectionId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((scope, name)) => Self::new(scope, name),
            None => Self::in_default_scope(s),
        }
    }
}

/// Handle returned when registering a live query; used to remove it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryToken(pub(crate) u64);

impl QueryToken {
    /// Returns the raw token value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}
