//! Document store collaborator.
//!
//! Documents are schema-less JSON objects addressed by slash-separated paths
//! (`users/{uid}`, `users/{uid}/notifications/{id}`). Every write bumps the
//! document's `version` by one, which lets callers detect writes they did not
//! make themselves.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::watch;

pub mod memory;
mod ops;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Reference to a single document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocRef {
    path: String,
}

impl DocRef {
    pub fn new(collection: &str, id: &str) -> Self {
        Self {
            path: format!("{}/{}", collection.trim_end_matches('/'), id),
        }
    }

    /// The per-user profile document.
    pub fn user(uid: &str) -> Self {
        Self::new("users", uid)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn id(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    pub fn collection(&self) -> &str {
        self.path
            .rsplit_once('/')
            .map(|(collection, _)| collection)
            .unwrap_or("")
    }

    /// Nested sub-collection below this document.
    pub fn child(&self, name: &str) -> CollectionRef {
        CollectionRef {
            path: format!("{}/{}", self.path, name),
        }
    }
}

/// Reference to a collection of documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionRef {
    path: String,
}

impl CollectionRef {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.trim_end_matches('/').to_string(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn doc(&self, id: &str) -> DocRef {
        DocRef::new(&self.path, id)
    }
}

/// A snapshot of one stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Map<String, Value>,
    pub version: u64,
}

impl Document {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.data.get(name).and_then(Value::as_str)
    }

    pub fn bool_field(&self, name: &str) -> Option<bool> {
        self.data.get(name).and_then(Value::as_bool)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetMode {
    /// Replace the whole document.
    Replace,
    /// Merge the given fields into the existing document, creating it if needed.
    Merge,
}

/// Equality filter for collection queries (`where(field, '==', value)`).
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub equals: Value,
}

impl FieldFilter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            equals: value.into(),
        }
    }

    pub fn matches(&self, data: &Map<String, Value>) -> bool {
        data.get(&self.field) == Some(&self.equals)
    }
}

/// Outcome of a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteResult {
    pub version: u64,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("version conflict on {path}: expected {expected}, found {found}")]
    Conflict {
        path: String,
        expected: u64,
        found: u64,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Live view of one document. `None` while the document does not exist.
pub type Subscription = watch::Receiver<Option<Document>>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, doc: &DocRef) -> Result<Option<Document>, StoreError>;

    async fn subscribe(&self, doc: &DocRef) -> Result<Subscription, StoreError>;

    async fn set(
        &self,
        doc: &DocRef,
        data: Map<String, Value>,
        mode: SetMode,
    ) -> Result<WriteResult, StoreError>;

    /// Update fields of an existing document. Fails with `NotFound` when absent.
    async fn update(
        &self,
        doc: &DocRef,
        fields: Map<String, Value>,
    ) -> Result<WriteResult, StoreError>;

    async fn delete(&self, doc: &DocRef) -> Result<(), StoreError>;

    /// Atomically append each value not already present in the array field.
    async fn array_union(
        &self,
        doc: &DocRef,
        field: &str,
        values: Vec<Value>,
    ) -> Result<WriteResult, StoreError>;

    /// Atomically remove every element equal to one of `values`.
    async fn array_remove(
        &self,
        doc: &DocRef,
        field: &str,
        values: Vec<Value>,
    ) -> Result<WriteResult, StoreError>;

    /// Replace `old` with `new` in the array field as one write. `new` takes
    /// the position of `old` and is not duplicated when already present.
    async fn array_replace(
        &self,
        doc: &DocRef,
        field: &str,
        old: Value,
        new: Value,
    ) -> Result<WriteResult, StoreError>;

    /// Create the document only while it does not exist. Fails with
    /// `Conflict` when it does.
    async fn create(
        &self,
        doc: &DocRef,
        data: Map<String, Value>,
    ) -> Result<WriteResult, StoreError>;

    /// Overwrite one field. With `expected_version`, the write only applies
    /// when the stored document is still at that version.
    async fn overwrite_field(
        &self,
        doc: &DocRef,
        field: &str,
        value: Value,
        expected_version: Option<u64>,
    ) -> Result<WriteResult, StoreError>;

    /// Create a document with a generated id inside `collection`.
    async fn add(
        &self,
        collection: &CollectionRef,
        data: Map<String, Value>,
    ) -> Result<DocRef, StoreError>;

    async fn query(
        &self,
        collection: &CollectionRef,
        filter: Option<&FieldFilter>,
    ) -> Result<Vec<Document>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn doc_ref_parts() {
        let doc = DocRef::user("abc");
        assert_eq!(doc.path(), "users/abc");
        assert_eq!(doc.id(), "abc");
        assert_eq!(doc.collection(), "users");

        let notes = doc.child("notifications");
        assert_eq!(notes.path(), "users/abc/notifications");
        let note = notes.doc("n1");
        assert_eq!(note.collection(), "users/abc/notifications");
        assert_eq!(note.id(), "n1");
    }

    #[test]
    fn field_filter_matches_by_json_equality() {
        let filter = FieldFilter::eq("read", false);
        let mut data = Map::new();
        data.insert("read".into(), json!(false));
        assert!(filter.matches(&data));
        data.insert("read".into(), json!(true));
        assert!(!filter.matches(&data));
        assert!(!filter.matches(&Map::new()));
    }
}
