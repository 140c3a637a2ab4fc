//! Error types for the document store.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while reading or writing documents.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The collection has not been created in this store.
    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    /// Collection or scope name is not usable.
    #[error("invalid collection name: {0:?}")]
    InvalidCollectionName(String),

    /// A document body was not a JSON object.
    #[error("document {id:?} is not a JSON object")]
    NotAnObject {
        /// Document ID.
        id: String,
    },

    /// Document IDs must be non-empty.
    #[error("document id must not be empty")]
    EmptyDocumentId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = StoreError::UnknownCollection("mainscope.users".into());
        assert_eq!(err.to_string(), "unknown collection: mainscope.users");

        let err = StoreError::NotAnObject { id: "content".into() };
        assert!(err.to_string().contains("content"));
    }
}
