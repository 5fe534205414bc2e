// src/store.rs
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::calendar::MonthKey;
use crate::error::StoreError;

pub type Fields = Map<String, Value>;
pub type SnapshotEvent = Result<Snapshot, StoreError>;

// --- Document Paths ---

/// Slash-separated document key, e.g.
/// `artifacts/{appId}/users/{userId}/timesheets/{YYYY-MM}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath(String);

impl DocumentPath {
    pub fn timesheet(app_id: &str, user_id: &str, month: &MonthKey) -> Result<Self, StoreError> {
        validate_segment(app_id)?;
        validate_segment(user_id)?;
        Ok(Self(format!(
            "artifacts/{}/users/{}/timesheets/{}",
            app_id,
            user_id,
            month.doc_id()
        )))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Segments become directory names in the file store.
fn validate_segment(segment: &str) -> Result<(), StoreError> {
    let invalid = segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains(|c: char| c == '/' || c == '\\' || c.is_control());
    if invalid {
        return Err(StoreError::InvalidPath(segment.to_string()));
    }
    Ok(())
}

// --- Snapshots ---

/// State of one document at a point in time. `origin` names the writer whose
/// change produced this snapshot; it is `None` for the initial read.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub path: DocumentPath,
    pub data: Option<Fields>,
    pub origin: Option<String>,
}

impl Snapshot {
    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    pub fn is_from(&self, origin: &str) -> bool {
        self.origin.as_deref() == Some(origin)
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<Option<T>, StoreError> {
        match &self.data {
            Some(fields) => Ok(Some(serde_json::from_value(Value::Object(fields.clone()))?)),
            None => Ok(None),
        }
    }
}

/// Merges `patch` into `target`: nested objects merge key by key, any other
/// value (arrays included) replaces what was stored.
pub fn merge_fields(target: &mut Fields, patch: Fields) {
    for (key, incoming) in patch {
        let incoming = match (target.get_mut(&key), incoming) {
            (Some(Value::Object(existing)), Value::Object(nested)) => {
                merge_fields(existing, nested);
                continue;
            }
            (_, other) => other,
        };
        target.insert(key, incoming);
    }
}

// --- Store Trait ---

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &DocumentPath) -> Result<Snapshot, StoreError>;

    /// Creates the document or merges `fields` into it, then notifies subscribers.
    async fn upsert_merge(&self, path: &DocumentPath, fields: Fields, origin: &str) -> Result<(), StoreError>;

    /// Starts listening to a document. The current state (or the read error)
    /// is delivered as the first event.
    async fn subscribe(&self, path: &DocumentPath) -> Subscription;

    fn describe(&self) -> String;
}

// --- Subscriptions ---

struct Listener {
    id: u64,
    sender: mpsc::UnboundedSender<SnapshotEvent>,
}

/// Listeners per document path, shared by the store implementations.
#[derive(Default)]
pub struct SubscriberRegistry {
    next_id: AtomicU64,
    listeners: StdMutex<HashMap<DocumentPath, Vec<Listener>>>,
}

impl SubscriberRegistry {
    fn lock(&self) -> MutexGuard<'_, HashMap<DocumentPath, Vec<Listener>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(self: &Arc<Self>, path: &DocumentPath, initial: SnapshotEvent) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        // Cannot fail: the receiver is still in scope.
        let _ = sender.send(initial);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock()
            .entry(path.clone())
            .or_default()
            .push(Listener { id, sender });
        debug!("Subscriber {} attached to {}", id, path);
        Subscription {
            id,
            path: path.clone(),
            receiver,
            registry: Arc::clone(self),
        }
    }

    pub fn publish(&self, snapshot: &Snapshot) {
        let mut listeners = self.lock();
        if let Some(list) = listeners.get_mut(&snapshot.path) {
            list.retain(|l| l.sender.send(Ok(snapshot.clone())).is_ok());
            debug!("Published {} to {} subscriber(s)", snapshot.path, list.len());
        }
    }

    fn remove(&self, path: &DocumentPath, id: u64) {
        let mut listeners = self.lock();
        if let Some(list) = listeners.get_mut(path) {
            list.retain(|l| l.id != id);
            if list.is_empty() {
                listeners.remove(path);
            }
        }
        debug!("Subscriber {} detached from {}", id, path);
    }

    pub fn listener_count(&self, path: &DocumentPath) -> usize {
        self.lock().get(path).map(Vec::len).unwrap_or(0)
    }
}

/// Handle for one document listener. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    path: DocumentPath,
    receiver: mpsc::UnboundedReceiver<SnapshotEvent>,
    registry: Arc<SubscriberRegistry>,
}

impl Subscription {
    pub fn path(&self) -> &DocumentPath {
        &self.path
    }

    /// Next snapshot or read error; `None` once the store is gone.
    pub async fn next(&mut self) -> Option<SnapshotEvent> {
        self.receiver.recv().await
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.remove(&self.path, self.id);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("path", &self.path)
            .finish()
    }
}

// --- In-Memory Store ---

/// Store kept entirely in process memory.
#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<DocumentPath, Fields>>,
    registry: Arc<SubscriberRegistry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &DocumentPath) -> Result<Snapshot, StoreError> {
        let documents = self.documents.lock().await;
        Ok(Snapshot {
            path: path.clone(),
            data: documents.get(path).cloned(),
            origin: None,
        })
    }

    async fn upsert_merge(&self, path: &DocumentPath, fields: Fields, origin: &str) -> Result<(), StoreError> {
        let mut documents = self.documents.lock().await;
        let document = documents.entry(path.clone()).or_default();
        merge_fields(document, fields);
        let snapshot = Snapshot {
            path: path.clone(),
            data: Some(document.clone()),
            origin: Some(origin.to_string()),
        };
        self.registry.publish(&snapshot);
        Ok(())
    }

    async fn subscribe(&self, path: &DocumentPath) -> Subscription {
        // Holding the lock keeps a concurrent write from slipping between read and register.
        let documents = self.documents.lock().await;
        let initial = Snapshot {
            path: path.clone(),
            data: documents.get(path).cloned(),
            origin: None,
        };
        self.registry.register(path, Ok(initial))
    }

    fn describe(&self) -> String {
        "in-memory store".to_string()
    }
}
