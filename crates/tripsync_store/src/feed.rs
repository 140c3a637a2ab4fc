//! Live view records for the welcome screen.

use crate::error::StoreResult;
use crate::memory::DocumentStore;
use crate::projector::{
    project_membership, project_shared_message, project_trip, MembershipInfo, SharedMessage, Trip,
};
use crate::types::{CollectionId, QueryToken};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Document ID of the shared welcome message.
pub const SHARED_CONTENT_ID: &str = "content";

/// Latest projected records. `None` means the document has not synced yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WelcomeState {
    /// Membership of the watched user.
    pub membership: Option<MembershipInfo>,
    /// Upcoming trip of the watched user.
    pub trip: Option<Trip>,
    /// Message shared with every user.
    pub shared_message: Option<SharedMessage>,
}

/// Keeps the welcome screen's records in step with the store.
///
/// Each watch registers a live query; watching a new user replaces the
/// previous user's query. Queries are removed when the feed is dropped.
pub struct WelcomeFeed<S: DocumentStore> {
    store: Arc<S>,
    users: CollectionId,
    shared: CollectionId,
    state: Arc<RwLock<WelcomeState>>,
    member_query: Mutex<Option<QueryToken>>,
    shared_query: Mutex<Option<QueryToken>>,
}

impl<S: DocumentStore> WelcomeFeed<S> {
    /// Creates a feed over the given users and shared collections.
    pub fn new(store: Arc<S>, users: CollectionId, shared: CollectionId) -> Self {
        Self {
            store,
            users,
            shared,
            state: Arc::new(RwLock::new(WelcomeState::default())),
            member_query: Mutex::new(None),
            shared_query: Mutex::new(None),
        }
    }

    /// Watches the membership and trip document of a user.
    pub fn watch_member(&self, username: &str) -> StoreResult<()> {
        let mut slot = self.member_query.lock();
        if let Some(previous) = slot.take() {
            self.store.remove_query(previous);
        }

        let state = Arc::clone(&self.state);
        let token = self.store.live_query(
            &self.users,
            username,
            Box::new(move |doc| {
                let mut state = state.write();
                state.membership = Some(project_membership(doc));
                state.trip = Some(project_trip(doc));
            }),
        )?;
        tracing::debug!(username, "watching member document");
        *slot = Some(token);
        Ok(())
    }

    /// Watches the shared welcome message.
    pub fn watch_shared_message(&self) -> StoreResult<()> {
        let mut slot = self.shared_query.lock();
        if let Some(previous) = slot.take() {
            self.store.remove_query(previous);
        }

        let state = Arc::clone(&self.state);
        let token = self.store.live_query(
            &self.shared,
            SHARED_CONTENT_ID,
            Box::new(move |doc| {
                state.write().shared_message = Some(project_shared_message(doc));
            }),
        )?;
        *slot = Some(token);
        Ok(())
    }

    /// Returns a copy of the latest records.
    pub fn state(&self) -> WelcomeState {
        self.state.read().clone()
    }

    /// Returns the member's info, or the fallback record if not yet synced.
    pub fn membership(&self) -> MembershipInfo {
        self.state
            .read()
            .membership
            .clone()
            .unwrap_or_else(MembershipInfo::fallback)
    }

    /// Returns the shared message, or the fallback message if not yet synced.
    pub fn shared_message(&self) -> SharedMessage {
        self.state
            .read()
            .shared_message
            .clone()
            .unwrap_or_else(SharedMessage::fallback)
    }

    /// Returns the member's trip, if one has synced.
    pub fn trip(&self) -> Option<Trip> {
        self.state.read().trip.clone()
    }
}

impl<S: DocumentStore> Drop for WelcomeFeed<S> {
    fn drop(&mut self) {
        for slot in [&self.member_query, &self.shared_query] {
            if let Some(token) = slot.lock().take() {
                self.store.remove_query(token);
            }
        }
    }
}
