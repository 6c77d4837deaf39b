use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use super::{
    ops, CollectionRef, DocRef, Document, DocumentStore, FieldFilter, SetMode, StoreError,
    Subscription, WriteResult,
};

/// In-process document store used for local development and tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    failing_writes: AtomicUsize,
}

#[derive(Default)]
struct Inner {
    docs: BTreeMap<String, Document>,
    // Survives deletes so a recreated document never reuses a version.
    versions: HashMap<String, u64>,
    watchers: HashMap<String, watch::Sender<Option<Document>>>,
}

impl Inner {
    fn publish(&mut self, path: &str, doc: Option<Document>) {
        if let Some(tx) = self.watchers.get(path) {
            tx.send_replace(doc);
            if tx.is_closed() {
                self.watchers.remove(path);
            }
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` writes fail with `StoreError::Unavailable`.
    pub fn fail_next_writes(&self, n: usize) {
        self.failing_writes.store(n, Ordering::SeqCst);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_failure(&self, doc: &DocRef) -> Result<(), StoreError> {
        let injected = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            debug!(path = doc.path(), "injected write failure");
            return Err(StoreError::Unavailable("simulated write failure".into()));
        }
        Ok(())
    }

    fn mutate<F>(&self, doc: &DocRef, apply: F) -> Result<WriteResult, StoreError>
    where
        F: FnOnce(Option<Document>) -> Result<Map<String, Value>, StoreError>,
    {
        self.check_failure(doc)?;
        let mut inner = self.lock();
        let current = inner.docs.get(doc.path()).cloned();
        let data = apply(current)?;

        let version = inner.versions.entry(doc.path().to_string()).or_insert(0);
        *version += 1;
        let next = Document {
            id: doc.id().to_string(),
            data,
            version: *version,
        };
        inner.docs.insert(doc.path().to_string(), next.clone());
        inner.publish(doc.path(), Some(next.clone()));
        Ok(WriteResult {
            version: next.version,
        })
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, doc: &DocRef) -> Result<Option<Document>, StoreError> {
        Ok(self.lock().docs.get(doc.path()).cloned())
    }

    async fn subscribe(&self, doc: &DocRef) -> Result<Subscription, StoreError> {
        let mut inner = self.lock();
        let current = inner.docs.get(doc.path()).cloned();
        let tx = inner
            .watchers
            .entry(doc.path().to_string())
            .or_insert_with(|| watch::channel(current).0);
        Ok(tx.subscribe())
    }

    async fn set(
        &self,
        doc: &DocRef,
        data: Map<String, Value>,
        mode: SetMode,
    ) -> Result<WriteResult, StoreError> {
        self.mutate(doc, |current| Ok(ops::set(current, data, mode)))
    }

    async fn update(
        &self,
        doc: &DocRef,
        fields: Map<String, Value>,
    ) -> Result<WriteResult, StoreError> {
        self.mutate(doc, |current| ops::update(doc, current, fields))
    }

    async fn delete(&self, doc: &DocRef) -> Result<(), StoreError> {
        self.check_failure(doc)?;
        let mut inner = self.lock();
        if inner.docs.remove(doc.path()).is_some() {
            inner.publish(doc.path(), None);
        }
        Ok(())
    }

    async fn array_union(
        &self,
        doc: &DocRef,
        field: &str,
        values: Vec<Value>,
    ) -> Result<WriteResult, StoreError> {
        self.mutate(doc, |current| Ok(ops::array_union(current, field, values)))
    }

    async fn array_remove(
        &self,
        doc: &DocRef,
        field: &str,
        values: Vec<Value>,
    ) -> Result<WriteResult, StoreError> {
        self.mutate(doc, |current| Ok(ops::array_remove(current, field, values)))
    }

    async fn array_replace(
        &self,
        doc: &DocRef,
        field: &str,
        old: Value,
        new: Value,
    ) -> Result<WriteResult, StoreError> {
        self.mutate(doc, |current| Ok(ops::array_replace(current, field, &old, new)))
    }

    async fn create(
        &self,
        doc: &DocRef,
        data: Map<String, Value>,
    ) -> Result<WriteResult, StoreError> {
        self.mutate(doc, |current| ops::create(doc, current, data))
    }

    async fn overwrite_field(
        &self,
        doc: &DocRef,
        field: &str,
        value: Value,
        expected_version: Option<u64>,
    ) -> Result<WriteResult, StoreError> {
        self.mutate(doc, |current| {
            ops::overwrite_field(doc, current, field, value, expected_version)
        })
    }

    async fn add(
        &self,
        collection: &CollectionRef,
        data: Map<String, Value>,
    ) -> Result<DocRef, StoreError> {
        let doc = collection.doc(&Uuid::new_v4().to_string());
        self.mutate(&doc, |_| Ok(data))?;
        Ok(doc)
    }

    async fn query(
        &self,
        collection: &CollectionRef,
        filter: Option<&FieldFilter>,
    ) -> Result<Vec<Document>, StoreError> {
        let inner = self.lock();
        let docs = inner
            .docs
            .iter()
            .filter(|(path, _)| {
                path.strip_prefix(collection.path())
                    .and_then(|rest| rest.strip_prefix('/'))
                    .is_some_and(|id| !id.contains('/'))
            })
            .map(|(_, doc)| doc)
            .filter(|doc| filter.map_or(true, |f| f.matches(&doc.data)))
            .cloned()
            .collect();
        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn versions_increase_per_write_and_survive_delete() {
        let store = MemoryStore::new();
        let doc = DocRef::user("u1");
        let w1 = store.set(&doc, fields(json!({"a": 1})), SetMode::Replace).await.unwrap();
        let w2 = store.array_union(&doc, "tags", vec![json!("x")]).await.unwrap();
        assert_eq!((w1.version, w2.version), (1, 2));

        store.delete(&doc).await.unwrap();
        assert!(store.get(&doc).await.unwrap().is_none());
        let w3 = store.set(&doc, Map::new(), SetMode::Merge).await.unwrap();
        assert_eq!(w3.version, 3);
    }

    #[tokio::test]
    async fn injected_failures_leave_data_untouched() {
        let store = MemoryStore::new();
        let doc = DocRef::user("u1");
        store.fail_next_writes(1);
        let err = store.array_union(&doc, "tags", vec![json!("x")]).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(store.get(&doc).await.unwrap().is_none());

        store.array_union(&doc, "tags", vec![json!("x")]).await.unwrap();
        let stored = store.get(&doc).await.unwrap().unwrap();
        assert_eq!(stored.field("tags"), Some(&json!(["x"])));
    }

    #[tokio::test]
    async fn create_only_succeeds_once_per_document() {
        let store = MemoryStore::new();
        let doc = DocRef::new("accounts", "a@b.co");
        let first = store.create(&doc, fields(json!({"uid": "1"}))).await.unwrap();
        let err = store.create(&doc, fields(json!({"uid": "2"}))).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { found, .. } if found == first.version));
        let stored = store.get(&doc).await.unwrap().unwrap();
        assert_eq!(stored.str_field("uid"), Some("1"));

        store.delete(&doc).await.unwrap();
        let again = store.create(&doc, fields(json!({"uid": "3"}))).await.unwrap();
        assert!(again.version > first.version);
    }

    #[tokio::test]
    async fn failed_replace_leaves_the_array_alone() {
        let store = MemoryStore::new();
        let doc = DocRef::user("u1");
        store.array_union(&doc, "tags", vec![json!("Work")]).await.unwrap();
        store.fail_next_writes(1);
        assert!(store
            .array_replace(&doc, "tags", json!("Work"), json!("Office"))
            .await
            .is_err());
        let stored = store.get(&doc).await.unwrap().unwrap();
        assert_eq!(stored.field("tags"), Some(&json!(["Work"])));
    }

    #[tokio::test]
    async fn update_of_missing_document_fails() {
        let store = MemoryStore::new();
        let err = store
            .update(&DocRef::user("ghost"), fields(json!({"a": 1})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn subscribers_see_every_write() {
        let store = MemoryStore::new();
        let doc = DocRef::user("u1");
        let mut rx = store.subscribe(&doc).await.unwrap();
        assert!(rx.borrow().is_none());

        store.array_union(&doc, "customCategories", vec![json!("Work")]).await.unwrap();
        rx.changed().await.unwrap();
        let seen = rx.borrow_and_update().clone().unwrap();
        assert_eq!(seen.field("customCategories"), Some(&json!(["Work"])));
    }

    #[tokio::test]
    async fn query_only_returns_direct_children_matching_filter() {
        let store = MemoryStore::new();
        let user = DocRef::user("u1");
        let notes = user.child("notifications");
        store.set(&user, Map::new(), SetMode::Replace).await.unwrap();
        store.add(&notes, fields(json!({"read": false}))).await.unwrap();
        store.add(&notes, fields(json!({"read": true}))).await.unwrap();
        store
            .set(&notes.doc("n1").child("replies").doc("r1"), fields(json!({"read": false})), SetMode::Replace)
            .await
            .unwrap();

        let all = store.query(&notes, None).await.unwrap();
        assert_eq!(all.len(), 2);
        let unread = store
            .query(&notes, Some(&FieldFilter::eq("read", false)))
            .await
            .unwrap();
        assert_eq!(unread.len(), 1);
    }
}
