use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::repositories::errors::document_store_errors::DocumentStoreError;

#[cfg(test)]
use mockall::automock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

/// Location of one document: its parent collection plus its id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentPath {
    pub collection: String,
    pub id: String,
}

pub const USERS_COLLECTION: &str = "users";

impl DocumentPath {
    pub fn new(collection: &str, id: &str) -> Self {
        DocumentPath {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    /// `users/{uid}`
    pub fn profile(uid: &str) -> Self {
        Self::new(USERS_COLLECTION, uid)
    }

    /// `users/{uid}/classes/{classId}`
    pub fn class(uid: &str, class_id: &str) -> Self {
        Self::new(&classes_collection(uid), class_id)
    }

    /// `users/{uid}/badgeLogs/{logId}`
    pub fn badge_log(uid: &str, log_id: &str) -> Self {
        Self::new(&badge_logs_collection(uid), log_id)
    }

    /// `users/{uid}/thermostatSettings/{classId}`
    pub fn thermostat(uid: &str, class_id: &str) -> Self {
        Self::new(&thermostat_collection(uid), class_id)
    }

    pub fn parse(path: &str) -> Option<Self> {
        let (collection, id) = path.trim_matches('/').rsplit_once('/')?;
        if collection.is_empty() || id.is_empty() {
            return None;
        }
        Some(Self::new(collection, id))
    }
}

impl std::fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

pub fn classes_collection(uid: &str) -> String {
    format!("{}/{}/classes", USERS_COLLECTION, uid)
}

pub fn badge_logs_collection(uid: &str) -> String {
    format!("{}/{}/badgeLogs", USERS_COLLECTION, uid)
}

pub fn thermostat_collection(uid: &str) -> String {
    format!("{}/{}/thermostatSettings", USERS_COLLECTION, uid)
}

/// Live view of a collection. Every change delivers the full snapshot.
/// Dropping the subscription stops it as well.
pub struct Subscription {
    receiver: watch::Receiver<Vec<Document>>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(receiver: watch::Receiver<Vec<Document>>, task: Option<JoinHandle<()>>) -> Self {
        Subscription { receiver, task }
    }

    pub fn current(&self) -> Vec<Document> {
        self.receiver.borrow().clone()
    }

    /// Waits for the next snapshot. `None` once the source has gone away.
    pub async fn changed(&mut self) -> Option<Vec<Document>> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    pub fn unsubscribe(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("polling", &self.task.is_some())
            .finish()
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// `Ok(None)` when the document does not exist.
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, DocumentStoreError>;
    async fn list(&self, collection: &str) -> Result<Vec<Document>, DocumentStoreError>;
    /// Replaces the stored document with `data`.
    async fn set(&self, path: &DocumentPath, data: &Value) -> Result<(), DocumentStoreError>;
    /// Deep-merges `data` into the stored document, creating it if needed.
    async fn set_merge(&self, path: &DocumentPath, data: &Value) -> Result<(), DocumentStoreError>;
    async fn delete(&self, path: &DocumentPath) -> Result<(), DocumentStoreError>;
    async fn subscribe(&self, collection: &str) -> Result<Subscription, DocumentStoreError>;
}

/// Merges `incoming` into `existing`. Objects merge key by key, anything
/// else replaces the old value.
pub fn merge_documents(existing: &mut Value, incoming: &Value) {
    match (existing, incoming) {
        (Value::Object(current), Value::Object(update)) => {
            for (key, value) in update {
                match current.get_mut(key) {
                    Some(slot) => merge_documents(slot, value),
                    None => {
                        current.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (slot, value) => *slot = value.clone(),
    }
}

pub async fn with_timeout<T, F>(limit: Duration, operation: F) -> Result<T, DocumentStoreError>
where
    F: Future<Output = Result<T, DocumentStoreError>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(DocumentStoreError::Timeout(limit)),
    }
}

/// Bounds every call on the wrapped store by `limit`.
pub struct TimeoutDocumentStore {
    inner: Arc<dyn DocumentStore>,
    limit: Duration,
}

impl TimeoutDocumentStore {
    pub fn new(inner: Arc<dyn DocumentStore>, limit: Duration) -> Self {
        TimeoutDocumentStore { inner, limit }
    }
}

#[async_trait]
impl DocumentStore for TimeoutDocumentStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, DocumentStoreError> {
        with_timeout(self.limit, self.inner.get(path)).await
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, DocumentStoreError> {
        with_timeout(self.limit, self.inner.list(collection)).await
    }

    async fn set(&self, path: &DocumentPath, data: &Value) -> Result<(), DocumentStoreError> {
        with_timeout(self.limit, self.inner.set(path, data)).await
    }

    async fn set_merge(&self, path: &DocumentPath, data: &Value) -> Result<(), DocumentStoreError> {
        with_timeout(self.limit, self.inner.set_merge(path, data)).await
    }

    async fn delete(&self, path: &DocumentPath) -> Result<(), DocumentStoreError> {
        with_timeout(self.limit, self.inner.delete(path)).await
    }

    async fn subscribe(&self, collection: &str) -> Result<Subscription, DocumentStoreError> {
        with_timeout(self.limit, self.inner.subscribe(collection)).await
    }
}

#[derive(Default)]
struct MemoryCollections {
    documents: BTreeMap<String, BTreeMap<String, Value>>,
    watchers: HashMap<String, watch::Sender<Vec<Document>>>,
}

impl MemoryCollections {
    fn snapshot(&self, collection: &str) -> Vec<Document> {
        self.documents
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, data)| Document {
                        id: id.clone(),
                        data: data.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn notify(&self, collection: &str) {
        if let Some(sender) = self.watchers.get(collection) {
            sender.send_replace(self.snapshot(collection));
        }
    }
}

/// In-process document store with push notifications. Used for offline
/// sessions and tests.
#[derive(Default, Clone)]
pub struct MemoryDocumentStore {
    inner: Arc<Mutex<MemoryCollections>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryCollections>, DocumentStoreError> {
        self.inner
            .lock()
            .map_err(|_| DocumentStoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, DocumentStoreError> {
        let collections = self.lock()?;
        Ok(collections
            .documents
            .get(&path.collection)
            .and_then(|docs| docs.get(&path.id))
            .map(|data| Document {
                id: path.id.clone(),
                data: data.clone(),
            }))
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, DocumentStoreError> {
        Ok(self.lock()?.snapshot(collection))
    }

    async fn set(&self, path: &DocumentPath, data: &Value) -> Result<(), DocumentStoreError> {
        let mut collections = self.lock()?;
        collections
            .documents
            .entry(path.collection.clone())
            .or_default()
            .insert(path.id.clone(), data.clone());
        collections.notify(&path.collection);
        Ok(())
    }

    async fn set_merge(&self, path: &DocumentPath, data: &Value) -> Result<(), DocumentStoreError> {
        let mut collections = self.lock()?;
        let slot = collections
            .documents
            .entry(path.collection.clone())
            .or_default()
            .entry(path.id.clone())
            .or_insert(Value::Null);
        merge_documents(slot, data);
        collections.notify(&path.collection);
        Ok(())
    }

    async fn delete(&self, path: &DocumentPath) -> Result<(), DocumentStoreError> {
        let mut collections = self.lock()?;
        let removed = collections
            .documents
            .get_mut(&path.collection)
            .and_then(|docs| docs.remove(&path.id))
            .is_some();
        if removed {
            collections.notify(&path.collection);
        }
        Ok(())
    }

    async fn subscribe(&self, collection: &str) -> Result<Subscription, DocumentStoreError> {
        let mut collections = self.lock()?;
        let snapshot = collections.snapshot(collection);
        let sender = collections
            .watchers
            .entry(collection.to_string())
            .or_insert_with(|| watch::channel(snapshot).0);
        Ok(Subscription::new(sender.subscribe(), None))
    }
}
