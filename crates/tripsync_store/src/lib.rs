//! # TripSync Store
//!
//! Document store seam and view projection for TripSync.
//!
//! This crate provides:
//! - The `DocumentStore` trait (collections, point lookups, live queries)
//! - An in-memory store with commit-ordered live query delivery
//! - Projection of raw documents into typed view records
//! - A welcome feed that keeps the latest view records up to date
//!
//! ## Key Invariants
//!
//! - Live queries fire once on registration (if the document exists) and
//!   after every committed `put` to the watched document
//! - Notifications are delivered in commit order
//! - Projection never fails: missing fields fall back to defaults

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod feed;
mod memory;
mod projector;
mod types;

pub use error::{StoreError, StoreResult};
pub use feed::{WelcomeFeed, WelcomeState, SHARED_CONTENT_ID};
pub use memory::{open_demo_collections, DemoCollections, DocumentStore, MemoryDocumentStore};
pub use projector::{
    project_membership, project_shared_message, project_trip, MembershipInfo, NamedColor,
    SharedMessage, Trip,
};
pub use types::{CollectionId, Document, QueryListener, QueryToken, DEFAULT_SCOPE};
