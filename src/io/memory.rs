//! In-memory document backend
//!
//! Implements `DocumentBackend` with real listener semantics: each listener
//! gets the current state on registration and a fresh snapshot after every
//! committed write that touches it. Notifications are delivered while the
//! store lock is held, so each listener sees changes in commit order.
//! Listeners therefore must not call back into the backend.
//!
//! Fault injection (write failures, registration failures, listener errors,
//! write latency) lets callers exercise every failure path of the tracking
//! core without a network.

use crate::error::BackendError;
use crate::io::backend::{
    Document, DocumentBackend, DocumentListener, DocumentSnapshot, FieldFilter, ListenerRegistration,
    QueryListener, QuerySnapshot, WriteMode,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, trace};

struct DocumentWatch {
    collection: String,
    id: String,
    listener: DocumentListener,
}

struct QueryWatch {
    collection: String,
    filters: Vec<FieldFilter>,
    listener: QueryListener,
}

#[derive(Default)]
struct State {
    collections: FxHashMap<String, BTreeMap<String, Document>>,
    document_watches: FxHashMap<u64, DocumentWatch>,
    query_watches: FxHashMap<u64, QueryWatch>,
    next_watch_id: u64,
}

impl State {
    fn snapshot(&self, collection: &str, id: &str) -> DocumentSnapshot {
        let data = self.collections.get(collection).and_then(|docs| docs.get(id)).cloned();
        DocumentSnapshot { id: id.to_string(), data }
    }

    fn query(&self, collection: &str, filters: &[FieldFilter]) -> QuerySnapshot {
        let documents = self
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, doc)| filters.iter().all(|f| f.matches(doc)))
                    .map(|(id, doc)| DocumentSnapshot { id: id.clone(), data: Some(doc.clone()) })
                    .collect()
            })
            .unwrap_or_default();
        QuerySnapshot { documents }
    }

    fn watch_id(&mut self) -> u64 {
        self.next_watch_id += 1;
        self.next_watch_id
    }

    /// Push the committed state of `collection/id` to everyone watching it
    fn notify(&self, collection: &str, id: &str) {
        for watch in self.document_watches.values() {
            if watch.collection == collection && watch.id == id {
                (watch.listener)(Ok(self.snapshot(collection, id)));
            }
        }
        for watch in self.query_watches.values() {
            if watch.collection == collection {
                (watch.listener)(Ok(self.query(collection, &watch.filters)));
            }
        }
    }
}

/// Thread-safe in-memory `DocumentBackend`
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
    write_latency: Duration,
    fail_writes: AtomicBool,
    fail_registrations: AtomicBool,
    writes_committed: AtomicU64,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            write_latency: Duration::ZERO,
            fail_writes: AtomicBool::new(false),
            fail_registrations: AtomicBool::new(false),
            writes_committed: AtomicU64::new(0),
        }
    }

    /// Delay every write by `latency` before it commits
    pub fn with_write_latency(mut self, latency: Duration) -> Self {
        self.write_latency = latency;
        self
    }

    /// Make every subsequent write fail with `Unavailable`
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Make every subsequent listener registration fail
    pub fn set_fail_registrations(&self, fail: bool) {
        self.fail_registrations.store(fail, Ordering::Relaxed);
    }

    /// Report a listener failure to everything watching `collection/id`
    ///
    /// Listeners stay registered afterwards.
    pub fn inject_listener_error(&self, collection: &str, id: &str, message: &str) {
        let state = self.state.lock();
        for watch in state.document_watches.values() {
            if watch.collection == collection && watch.id == id {
                (watch.listener)(Err(BackendError::Listener(message.to_string())));
            }
        }
        for watch in state.query_watches.values() {
            if watch.collection == collection {
                (watch.listener)(Err(BackendError::Listener(message.to_string())));
            }
        }
    }

    /// Listeners currently attached (document and query)
    pub fn listener_count(&self) -> usize {
        let state = self.state.lock();
        state.document_watches.len() + state.query_watches.len()
    }

    pub fn writes_committed(&self) -> u64 {
        self.writes_committed.load(Ordering::Relaxed)
    }

    /// Read a document without going through the async API
    pub fn peek(&self, collection: &str, id: &str) -> Option<Document> {
        self.state.lock().snapshot(collection, id).data
    }

    async fn before_write(&self, id: &str) -> Result<(), BackendError> {
        if !self.write_latency.is_zero() {
            tokio::time::sleep(self.write_latency).await;
        }
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(BackendError::Unavailable("backend offline".to_string()));
        }
        if id.is_empty() {
            return Err(BackendError::Rejected("document id must not be empty".to_string()));
        }
        Ok(())
    }

    fn before_register(&self, id: Option<&str>) -> Result<(), BackendError> {
        if self.fail_registrations.load(Ordering::Relaxed) {
            return Err(BackendError::Registration("backend offline".to_string()));
        }
        if id.is_some_and(str::is_empty) {
            return Err(BackendError::Registration("document path must not be empty".to_string()));
        }
        Ok(())
    }

    fn removal(&self, watch_id: u64, query: bool) -> ListenerRegistration {
        let state: Weak<Mutex<State>> = Arc::downgrade(&self.state);
        ListenerRegistration::new(move || {
            let Some(state) = state.upgrade() else { return };
            let mut state = state.lock();
            if query {
                state.query_watches.remove(&watch_id);
            } else {
                state.document_watches.remove(&watch_id);
            }
            debug!(watch_id = %watch_id, "memory_listener_removed");
        })
    }
}

#[async_trait]
impl DocumentBackend for MemoryBackend {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, BackendError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(BackendError::Unavailable("backend offline".to_string()));
        }
        Ok(self.peek(collection, id))
    }

    async fn set(
        &self,
        collection: &str,
        id: &str,
        data: Document,
        mode: WriteMode,
    ) -> Result<(), BackendError> {
        self.before_write(id).await?;

        let mut state = self.state.lock();
        let docs = state.collections.entry(collection.to_string()).or_default();
        match mode {
            WriteMode::Overwrite => {
                docs.insert(id.to_string(), data);
            }
            WriteMode::Merge => {
                let doc = docs.entry(id.to_string()).or_default();
                for (field, value) in data {
                    doc.insert(field, value);
                }
            }
        }
        self.writes_committed.fetch_add(1, Ordering::Relaxed);
        trace!(collection = %collection, id = %id, mode = ?mode, "memory_write_committed");
        state.notify(collection, id);
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
    ) -> Result<(), BackendError> {
        self.before_write(id).await?;

        let mut state = self.state.lock();
        let Some(doc) = state.collections.get_mut(collection).and_then(|docs| docs.get_mut(id))
        else {
            return Err(BackendError::Rejected(format!("no document {}/{}", collection, id)));
        };
        for (field, value) in fields {
            doc.insert(field, value);
        }
        self.writes_committed.fetch_add(1, Ordering::Relaxed);
        state.notify(collection, id);
        Ok(())
    }

    fn add_document_listener(
        &self,
        collection: &str,
        id: &str,
        listener: DocumentListener,
    ) -> Result<ListenerRegistration, BackendError> {
        self.before_register(Some(id))?;

        let mut state = self.state.lock();
        listener(Ok(state.snapshot(collection, id)));
        let watch_id = state.watch_id();
        state.document_watches.insert(
            watch_id,
            DocumentWatch { collection: collection.to_string(), id: id.to_string(), listener },
        );
        debug!(watch_id = %watch_id, collection = %collection, id = %id, "memory_listener_added");
        Ok(self.removal(watch_id, false))
    }

    fn add_query_listener(
        &self,
        collection: &str,
        filters: Vec<FieldFilter>,
        listener: QueryListener,
    ) -> Result<ListenerRegistration, BackendError> {
        self.before_register(None)?;

        let mut state = self.state.lock();
        listener(Ok(state.query(collection, &filters)));
        let watch_id = state.watch_id();
        state
            .query_watches
            .insert(watch_id, QueryWatch { collection: collection.to_string(), filters, listener });
        debug!(watch_id = %watch_id, collection = %collection, "memory_query_listener_added");
        Ok(self.removal(watch_id, true))
    }
}
