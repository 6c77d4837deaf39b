use serde_json::Value;
use tracing::warn;

use super::{SyncError, SyncItem};
use crate::store::Document;

/// Local copy of one remote array field plus the mutations not yet confirmed.
pub(crate) struct Mirror<T: SyncItem> {
    items: Vec<T>,
    /// Version of the remote document whose contents `items` reflects.
    seen_version: Option<u64>,
    pending: Vec<Pending<T>>,
    next_seq: u64,
}

pub(crate) enum Undo<T: SyncItem> {
    Added { key: T::Key },
    Removed { index: usize, item: T },
    Replaced { current: T::Key, previous: T },
}

struct Pending<T: SyncItem> {
    seq: u64,
    undo: Undo<T>,
}

impl<T: SyncItem> Mirror<T> {
    pub(crate) fn new() -> Self {
        Self {
            items: Vec::new(),
            seen_version: None,
            pending: Vec::new(),
            next_seq: 0,
        }
    }

    pub(crate) fn items(&self) -> &[T] {
        &self.items
    }

    pub(crate) fn seen_version(&self) -> Option<u64> {
        self.seen_version
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn position(&self, key: &T::Key) -> Option<usize> {
        self.items.iter().position(|i| &i.key() == key)
    }

    /// Replace the local list with the field's contents in `doc`.
    pub(crate) fn apply_snapshot(&mut self, field: &str, doc: Option<&Document>) {
        self.items = extract(field, doc);
        self.seen_version = Some(doc.map_or(0, |d| d.version));
    }

    pub(crate) fn push(&mut self, item: T) -> Result<u64, SyncError> {
        let key = item.key();
        if self.position(&key).is_some() {
            return Err(SyncError::Duplicate(key.to_string()));
        }
        self.items.push(item);
        Ok(self.track(Undo::Added { key }))
    }

    pub(crate) fn remove(&mut self, key: &T::Key) -> Result<(u64, T), SyncError> {
        let index = self
            .position(key)
            .ok_or_else(|| SyncError::NotFound(key.to_string()))?;
        let item = self.items.remove(index);
        let seq = self.track(Undo::Removed {
            index,
            item: item.clone(),
        });
        Ok((seq, item))
    }

    pub(crate) fn update<F>(&mut self, key: &T::Key, patch: F) -> Result<(u64, T, T), SyncError>
    where
        F: FnOnce(&T) -> T,
    {
        let index = self
            .position(key)
            .ok_or_else(|| SyncError::NotFound(key.to_string()))?;
        let next = patch(&self.items[index]);
        let next_key = next.key();
        if &next_key != key && self.position(&next_key).is_some() {
            return Err(SyncError::Duplicate(next_key.to_string()));
        }
        let previous = std::mem::replace(&mut self.items[index], next.clone());
        let seq = self.track(Undo::Replaced {
            current: next_key,
            previous: previous.clone(),
        });
        Ok((seq, previous, next))
    }

    fn track(&mut self, undo: Undo<T>) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(Pending { seq, undo });
        seq
    }

    /// Drop the pending entry for `seq`, handing back its undo record.
    pub(crate) fn settle(&mut self, seq: u64) -> Option<Undo<T>> {
        let index = self.pending.iter().position(|p| p.seq == seq)?;
        Some(self.pending.remove(index).undo)
    }

    /// Revert one local mutation. Items touched since by a fresh snapshot are
    /// left as the snapshot has them.
    pub(crate) fn revert(&mut self, undo: Undo<T>) {
        match undo {
            Undo::Added { key } => {
                if let Some(index) = self.position(&key) {
                    self.items.remove(index);
                }
            }
            Undo::Removed { index, item } => {
                if self.position(&item.key()).is_none() {
                    let index = index.min(self.items.len());
                    self.items.insert(index, item);
                }
            }
            Undo::Replaced { current, previous } => {
                if let Some(index) = self.position(&current) {
                    self.items[index] = previous;
                }
            }
        }
    }

    /// Record a successful write of `writes` operations that left the document
    /// at `version`. The mirror only advances when no foreign write slipped in
    /// between, so a later preconditioned overwrite still detects it.
    pub(crate) fn observe_write(&mut self, writes: u64, version: u64) {
        if let Some(seen) = self.seen_version {
            if seen + writes == version {
                self.seen_version = Some(version);
            }
        }
    }
}

fn extract<T: SyncItem>(field: &str, doc: Option<&Document>) -> Vec<T> {
    match doc.and_then(|d| d.field(field)) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(|v| match serde_json::from_value(v.clone()) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!(field, error = %e, "skipping malformed element");
                    None
                }
            })
            .collect(),
        Some(_) => {
            warn!(field, "field is not an array; treating as empty");
            Vec::new()
        }
    }
}
