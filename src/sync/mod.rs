//! Keeps a screen's in-memory list consistent with one array field of a
//! remote document.
//!
//! Mutations are applied locally first and then written remotely according to
//! the field's [`MergeStrategy`]. A failed write raises one alert and, under
//! [`RollbackPolicy::Revert`], undoes exactly the mutation that caused it.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use crate::alerts::{Alert, AlertSink, LogAlerts};
use crate::store::{DocRef, DocumentStore, StoreError, WriteResult};

mod mirror;
mod scope;

use mirror::Mirror;
pub use scope::ScreenScope;

/// An element of a synchronised array field.
pub trait SyncItem: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    type Key: Clone + Eq + fmt::Display + Send + Sync + 'static;

    fn key(&self) -> Self::Key;
}

impl SyncItem for String {
    type Key = String;

    fn key(&self) -> String {
        self.clone()
    }
}

/// How local mutations reach the remote field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Deduplicated scalars: array-union / array-remove, updates as remove then add.
    ScalarSet,
    /// Structured records keyed by id: append on add, otherwise map-and-replace
    /// locally and overwrite the whole field with a version precondition.
    Keyed,
    /// Every mutation overwrites the whole field with a version precondition.
    Overwrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RollbackPolicy {
    /// Undo the local mutation when its remote write fails.
    #[default]
    Revert,
    /// Keep the optimistic mutation even though the remote write failed.
    Keep,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("an item with id {0} already exists")]
    Duplicate(String),

    #[error("no item with id {0}")]
    NotFound(String),

    #[error("screen closed before the request finished")]
    Cancelled,

    #[error("remote read failed: {0}")]
    Read(#[from] StoreError),

    #[error("could not encode item: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("remote write failed: {source}")]
    Write { alert: Alert, source: StoreError },
}

enum RemoteWrite {
    Union(Value),
    Remove(Value),
    Swap { old: Value, new: Value },
    Overwrite,
}

pub fn conflict_alert() -> Alert {
    Alert::new(
        "Out of date",
        "This list was changed somewhere else. Reload and try again.",
    )
}

pub struct ArraySync<T: SyncItem> {
    store: Arc<dyn DocumentStore>,
    doc: DocRef,
    field: String,
    strategy: MergeStrategy,
    rollback: RollbackPolicy,
    alerts: Arc<dyn AlertSink>,
    failure_alert: Alert,
    scope: ScreenScope,
    mirror: Arc<Mutex<Mirror<T>>>,
}

impl<T: SyncItem> ArraySync<T> {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        doc: DocRef,
        field: &str,
        strategy: MergeStrategy,
        scope: &ScreenScope,
    ) -> Self {
        Self {
            store,
            doc,
            field: field.to_string(),
            strategy,
            rollback: RollbackPolicy::default(),
            alerts: Arc::new(LogAlerts),
            failure_alert: Alert::new("Error", "Could not save changes."),
            scope: scope.child(),
            mirror: Arc::new(Mutex::new(Mirror::new())),
        }
    }

    pub fn with_alerts(mut self, alerts: Arc<dyn AlertSink>) -> Self {
        self.alerts = alerts;
        self
    }

    pub fn with_rollback(mut self, rollback: RollbackPolicy) -> Self {
        self.rollback = rollback;
        self
    }

    /// Alert raised when a write fails for any reason other than a conflict.
    pub fn with_failure_alert(mut self, alert: Alert) -> Self {
        self.failure_alert = alert;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Mirror<T>> {
        lock_mirror(&self.mirror)
    }

    pub fn items(&self) -> Vec<T> {
        self.lock().items().to_vec()
    }

    pub fn get(&self, key: &T::Key) -> Option<T> {
        let mirror = self.lock();
        mirror.position(key).map(|i| mirror.items()[i].clone())
    }

    /// Mutations whose remote write has not completed yet.
    pub fn pending(&self) -> usize {
        self.lock().pending_len()
    }

    /// Fetch the document once and replace the local list.
    pub async fn load(&self) -> Result<Vec<T>, SyncError> {
        let doc = self
            .scope
            .guard(self.store.get(&self.doc))
            .await
            .ok_or(SyncError::Cancelled)??;
        let mut mirror = self.lock();
        mirror.apply_snapshot(&self.field, doc.as_ref());
        debug!(path = self.doc.path(), field = %self.field, count = mirror.items().len(), "mirror loaded");
        Ok(mirror.items().to_vec())
    }

    /// Follow the document until the scope closes, replacing the local list on
    /// every change.
    pub async fn subscribe(&self) -> Result<(), SyncError> {
        let mut rx = self
            .scope
            .guard(self.store.subscribe(&self.doc))
            .await
            .ok_or(SyncError::Cancelled)??;
        let initial = rx.borrow_and_update().clone();
        self.lock().apply_snapshot(&self.field, initial.as_ref());

        let mirror = Arc::clone(&self.mirror);
        let field = self.field.clone();
        let path = self.doc.path().to_string();
        let token = self.scope.token();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let snapshot = rx.borrow_and_update().clone();
                        lock_mirror(&mirror).apply_snapshot(&field, snapshot.as_ref());
                    }
                }
            }
            debug!(path = %path, field = %field, "subscription ended");
        });
        Ok(())
    }

    pub async fn add(&self, item: T) -> Result<(), SyncError> {
        let value = serde_json::to_value(&item)?;
        let seq = self.lock().push(item)?;
        let write = match self.strategy {
            MergeStrategy::ScalarSet | MergeStrategy::Keyed => RemoteWrite::Union(value),
            MergeStrategy::Overwrite => RemoteWrite::Overwrite,
        };
        self.commit(seq, write).await
    }

    pub async fn remove(&self, key: &T::Key) -> Result<T, SyncError> {
        let (seq, removed) = self.lock().remove(key)?;
        let write = match self.strategy {
            MergeStrategy::ScalarSet => {
                RemoteWrite::Remove(serde_json::to_value(&removed)?)
            }
            MergeStrategy::Keyed | MergeStrategy::Overwrite => RemoteWrite::Overwrite,
        };
        self.commit(seq, write).await?;
        Ok(removed)
    }

    pub async fn update<F>(&self, key: &T::Key, patch: F) -> Result<T, SyncError>
    where
        F: FnOnce(&T) -> T,
    {
        let (seq, previous, next) = self.lock().update(key, patch)?;
        let write = match self.strategy {
            MergeStrategy::ScalarSet => RemoteWrite::Swap {
                old: serde_json::to_value(&previous)?,
                new: serde_json::to_value(&next)?,
            },
            MergeStrategy::Keyed | MergeStrategy::Overwrite => RemoteWrite::Overwrite,
        };
        self.commit(seq, write).await?;
        Ok(next)
    }

    async fn commit(&self, seq: u64, write: RemoteWrite) -> Result<(), SyncError> {
        match self.scope.guard(self.send(write)).await {
            None => {
                self.lock().settle(seq);
                debug!(path = self.doc.path(), field = %self.field, "screen closed; dropping write");
                Err(SyncError::Cancelled)
            }
            Some(Ok((writes, result))) => {
                let mut mirror = self.lock();
                mirror.settle(seq);
                mirror.observe_write(writes, result.version);
                Ok(())
            }
            Some(Err(source)) => {
                error!(error = %source, path = self.doc.path(), field = %self.field, "remote write failed");
                let alert = match source {
                    StoreError::Conflict { .. } => conflict_alert(),
                    _ => self.failure_alert.clone(),
                };
                {
                    let mut mirror = self.lock();
                    if let Some(undo) = mirror.settle(seq) {
                        if self.rollback == RollbackPolicy::Revert {
                            mirror.revert(undo);
                        }
                    }
                }
                self.alerts.alert(alert.clone());
                Err(SyncError::Write { alert, source })
            }
        }
    }

    async fn send(&self, write: RemoteWrite) -> Result<(u64, WriteResult), StoreError> {
        let store = &self.store;
        let (doc, field) = (&self.doc, self.field.as_str());
        match write {
            RemoteWrite::Union(value) => Ok((1, store.array_union(doc, field, vec![value]).await?)),
            RemoteWrite::Remove(value) => Ok((1, store.array_remove(doc, field, vec![value]).await?)),
            RemoteWrite::Swap { old, new } => {
                Ok((1, store.array_replace(doc, field, old, new).await?))
            }
            RemoteWrite::Overwrite => {
                let (value, expected) = {
                    let mirror = self.lock();
                    (serde_json::to_value(mirror.items())?, mirror.seen_version())
                };
                Ok((1, store.overwrite_field(doc, field, value, expected).await?))
            }
        }
    }
}

fn lock_mirror<T: SyncItem>(mirror: &Mutex<Mirror<T>>) -> MutexGuard<'_, Mirror<T>> {
    mirror.lock().unwrap_or_else(PoisonError::into_inner)
}
