//! Document backend abstraction
//!
//! A minimal model of a real-time document database: collections of JSON
//! documents addressed by id, merge or overwrite writes, and push listeners
//! on a single document or on an equality query. Repositories in
//! `services` are written against this trait only, so any vendor SDK can be
//! plugged in behind it.

use crate::error::BackendError;
use crate::io::feed::Detach;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// A stored document body
pub type Document = Map<String, Value>;

/// How `set` treats fields already on the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace the whole document
    Overwrite,
    /// Update only the supplied top-level fields
    Merge,
}

/// State of one document as seen by a listener
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub id: String,
    /// `None` when the document does not exist
    pub data: Option<Document>,
}

impl DocumentSnapshot {
    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.as_ref().and_then(|doc| doc.get(field))
    }
}

/// Documents matching a query, in id order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySnapshot {
    pub documents: Vec<DocumentSnapshot>,
}

/// Equality predicate on a top-level field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub value: Value,
}

impl FieldFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self { field: field.into(), value: value.into() }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        doc.get(&self.field) == Some(&self.value)
    }
}

/// Called with every change of a watched document, or a listener failure
pub type DocumentListener = Box<dyn Fn(Result<DocumentSnapshot, BackendError>) + Send + Sync>;

/// Called with every change of a query's result set, or a listener failure
pub type QueryListener = Box<dyn Fn(Result<QuerySnapshot, BackendError>) + Send + Sync>;

/// Live listener attachment; removal is idempotent
#[derive(Debug)]
pub struct ListenerRegistration {
    detach: Detach,
}

impl ListenerRegistration {
    pub fn new(remove: impl FnOnce() + Send + 'static) -> Self {
        Self { detach: Detach::new(remove) }
    }

    /// Stop delivering notifications
    pub fn remove(&mut self) {
        self.detach.run();
    }

    pub fn is_removed(&self) -> bool {
        self.detach.is_done()
    }
}

#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Read a document once
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, BackendError>;

    /// Create or write a document; `Merge` leaves unrelated fields untouched
    async fn set(
        &self,
        collection: &str,
        id: &str,
        data: Document,
        mode: WriteMode,
    ) -> Result<(), BackendError>;

    /// Merge fields into an existing document; fails if it does not exist
    async fn update(&self, collection: &str, id: &str, fields: Document)
        -> Result<(), BackendError>;

    /// Watch one document; the current state is delivered right away
    fn add_document_listener(
        &self,
        collection: &str,
        id: &str,
        listener: DocumentListener,
    ) -> Result<ListenerRegistration, BackendError>;

    /// Watch the documents matching all `filters`; the current result is
    /// delivered right away
    fn add_query_listener(
        &self,
        collection: &str,
        filters: Vec<FieldFilter>,
        listener: QueryListener,
    ) -> Result<ListenerRegistration, BackendError>;
}
