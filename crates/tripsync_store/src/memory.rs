//! Document store trait and an in-memory implementation.

use crate::error::{StoreError, StoreResult};
use crate::types::{CollectionId, Document, QueryListener, QueryToken};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Scope holding the demo application's collections.
const DEMO_SCOPE: &str = "mainscope";

/// An embedded document store.
///
/// This trait abstracts the local database that replication runs against.
/// Implementations must deliver live query notifications in commit order.
pub trait DocumentStore: Send + Sync {
    /// Creates a collection, or returns the existing one with that name.
    fn create_collection(&self, scope: &str, name: &str) -> StoreResult<CollectionId>;

    /// Returns true if the collection exists.
    fn has_collection(&self, collection: &CollectionId) -> bool;

    /// Looks up a document by ID.
    fn get(&self, collection: &CollectionId, id: &str) -> StoreResult<Option<Document>>;

    /// Writes a document, replacing any previous version.
    fn put(&self, collection: &CollectionId, id: &str, document: Document) -> StoreResult<()>;

    /// Registers a live query on a single document.
    ///
    /// The listener runs once immediately if the document exists, then after
    /// every committed write to it.
    fn live_query(
        &self,
        collection: &CollectionId,
        id: &str,
        listener: QueryListener,
    ) -> StoreResult<QueryToken>;

    /// Removes a live query. Returns false if the token was unknown.
    fn remove_query(&self, token: QueryToken) -> bool;

    /// Writes a JSON value, which must be an object.
    fn put_value(
        &self,
        collection: &CollectionId,
        id: &str,
        value: serde_json::Value,
    ) -> StoreResult<()> {
        match value {
            serde_json::Value::Object(document) => self.put(collection, id, document),
            _ => Err(StoreError::NotAnObject { id: id.to_string() }),
        }
    }
}

struct LiveQuery {
    collection: CollectionId,
    id: String,
    listener: Arc<dyn Fn(&Document) + Send + Sync>,
}

/// An in-memory document store.
///
/// Writes and live query deliveries are serialized by a commit lock, so each
/// listener observes versions in the order they were written. Listeners must
/// not write to the store from inside their callback.
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<CollectionId, HashMap<String, Document>>>,
    queries: RwLock<BTreeMap<u64, LiveQuery>>,
    commit: Mutex<()>,
    next_token: AtomicU64,
}

impl MemoryDocumentStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            queries: RwLock::new(BTreeMap::new()),
            commit: Mutex::new(()),
            next_token: AtomicU64::new(1),
        }
    }

    /// Returns the number of registered live queries.
    pub fn query_count(&self) -> usize {
        self.queries.read().len()
    }

    /// Returns the number of documents in a collection.
    pub fn document_count(&self, collection: &CollectionId) -> usize {
        self.collections
            .read()
            .get(collection)
            .map(|docs| docs.len())
            .unwrap_or(0)
    }

    fn listeners_for(
        &self,
        collection: &CollectionId,
        id: &str,
    ) -> Vec<Arc<dyn Fn(&Document) + Send + Sync>> {
        self.queries
            .read()
            .values()
            .filter(|q| q.collection == *collection && q.id == id)
            .map(|q| Arc::clone(&q.listener))
            .collect()
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn create_collection(&self, scope: &str, name: &str) -> StoreResult<CollectionId> {
        let collection = CollectionId::new(scope, name)?;
        self.collections
            .write()
            .entry(collection.clone())
            .or_default();
        tracing::debug!(%collection, "collection opened");
        Ok(collection)
    }

    fn has_collection(&self, collection: &CollectionId) -> bool {
        self.collections.read().contains_key(collection)
    }

    fn get(&self, collection: &CollectionId, id: &str) -> StoreResult<Option<Document>> {
        let collections = self.collections.read();
        let docs = collections
            .get(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;
        Ok(docs.get(id).cloned())
    }

    fn put(&self, collection: &CollectionId, id: &str, document: Document) -> StoreResult<()> {
        if id.is_empty() {
            return Err(StoreError::EmptyDocumentId);
        }

        let _commit = self.commit.lock();
        {
            let mut collections = self.collections.write();
            let docs = collections
                .get_mut(collection)
                .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;
            docs.insert(id.to_string(), document.clone());
        }

        for listener in self.listeners_for(collection, id) {
            listener(&document);
        }
        Ok(())
    }

    fn live_query(
        &self,
        collection: &CollectionId,
        id: &str,
        listener: QueryListener,
    ) -> StoreResult<QueryToken> {
        if id.is_empty() {
            return Err(StoreError::EmptyDocumentId);
        }

        let _commit = self.commit.lock();
        let current = self.get(collection, id)?;

        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
        let listener: Arc<dyn Fn(&Document) + Send + Sync> = Arc::from(listener);
        self.queries.write().insert(
            token,
            LiveQuery {
                collection: collection.clone(),
                id: id.to_string(),
                listener: Arc::clone(&listener),
            },
        );
        tracing::debug!(%collection, id, token, "live query registered");

        if let Some(document) = current {
            listener(&document);
        }
        Ok(QueryToken(token))
    }

    fn remove_query(&self, token: QueryToken) -> bool {
        self.queries.write().remove(&token.0).is_some()
    }
}

/// The collections the demo application replicates and reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoCollections {
    /// Per-user membership and trip documents.
    pub users: CollectionId,
    /// Documents shared by every user (e.g. the welcome message).
    pub shared: CollectionId,
    /// Device-local documents; never replicated.
    pub local: CollectionId,
}

impl DemoCollections {
    /// Returns the collections that take part in replication.
    pub fn replicated(&self) -> Vec<CollectionId> {
        vec![self.users.clone(), self.shared.clone()]
    }
}

/// Opens the `users`, `shared` and `local` collections in `mainscope`.
pub fn open_demo_collections<S: DocumentStore + ?Sized>(store: &S) -> StoreResult<DemoCollections> {
    Ok(DemoCollections {
        users: store.create_collection(DEMO_SCOPE, "users")?,
        shared: store.create_collection(DEMO_SCOPE, "shared")?,
        local: store.create_collection(DEMO_SCOPE, "local")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn put_and_get() {
        let store = MemoryDocumentStore::new();
        let users = store.create_collection("mainscope", "users").unwrap();

        assert_eq!(store.get(&users, "alice").unwrap(), None);
        store
            .put(&users, "alice", doc(json!({"miles": 1200})))
            .unwrap();

        let fetched = store.get(&users, "alice").unwrap().unwrap();
        assert_eq!(fetched["miles"], json!(1200));
        assert_eq!(store.document_count(&users), 1);
    }

    #[test]
    fn create_collection_is_idempotent() {
        let store = MemoryDocumentStore::new();
        let first = store.create_collection("mainscope", "users").unwrap();
        store.put(&first, "alice", Document::new()).unwrap();

        let second = store.create_collection("mainscope", "users").unwrap();
        assert_eq!(first, second);
        assert_eq!(store.document_count(&second), 1);
    }

    #[test]
    fn unknown_collection_is_an_error() {
        let store = MemoryDocumentStore::new();
        let missing = CollectionId::new("mainscope", "missing").unwrap();

        assert!(matches!(
            store.get(&missing, "x"),
            Err(StoreError::UnknownCollection(_))
        ));
        assert!(matches!(
            store.put(&missing, "x", Document::new()),
            Err(StoreError::UnknownCollection(_))
        ));
    }

    #[test]
    fn put_value_rejects_non_objects() {
        let store = MemoryDocumentStore::new();
        let users = store.create_collection("mainscope", "users").unwrap();

        let result = store.put_value(&users, "alice", json!([1, 2, 3]));
        assert!(matches!(result, Err(StoreError::NotAnObject { .. })));

        store.put_value(&users, "alice", json!({"a": 1})).unwrap();
        assert!(store.get(&users, "alice").unwrap().is_some());
    }

    #[test]
    fn empty_document_id_is_rejected() {
        let store = MemoryDocumentStore::new();
        let users = store.create_collection("mainscope", "users").unwrap();
        assert_eq!(
            store.put(&users, "", Document::new()),
            Err(StoreError::EmptyDocumentId)
        );
    }

    #[test]
    fn live_query_fires_on_registration_and_each_write() {
        let store = MemoryDocumentStore::new();
        let users = store.create_collection("mainscope", "users").unwrap();
        store.put(&users, "alice", doc(json!({"miles": 1}))).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let token = store
            .live_query(
                &users,
                "alice",
                Box::new(move |d| sink.lock().push(d["miles"].clone())),
            )
            .unwrap();

        store.put(&users, "alice", doc(json!({"miles": 2}))).unwrap();
        store.put(&users, "bob", doc(json!({"miles": 99}))).unwrap();
        store.put(&users, "alice", doc(json!({"miles": 3}))).unwrap();

        assert_eq!(*seen.lock(), vec![json!(1), json!(2), json!(3)]);

        assert!(store.remove_query(token));
        assert!(!store.remove_query(token));
        store.put(&users, "alice", doc(json!({"miles": 4}))).unwrap();
        assert_eq!(seen.lock().len(), 3);
    }

    #[test]
    fn live_query_on_missing_document_waits_for_first_write() {
        let store = MemoryDocumentStore::new();
        let shared = store.create_collection("mainscope", "shared").unwrap();

        let count = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&count);
        store
            .live_query(
                &shared,
                "content",
                Box::new(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);

        store.put(&shared, "content", Document::new()).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(store.query_count(), 1);
    }

    #[test]
    fn demo_collections() {
        let store = MemoryDocumentStore::new();
        let demo = open_demo_collections(&store).unwrap();

        assert_eq!(demo.users.to_string(), "mainscope.users");
        assert_eq!(demo.shared.to_string(), "mainscope.shared");
        assert_eq!(demo.local.to_string(), "mainscope.local");
        assert_eq!(demo.replicated(), vec![demo.users.clone(), demo.shared.clone()]);
        assert!(store.has_collection(&demo.local));
    }
}
