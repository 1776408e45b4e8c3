use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::{DisplayErrorContext, SdkError};
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_dynamo::aws_sdk_dynamodb_1::{from_item, to_item};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::repositories::document_store::{
    merge_documents, Document, DocumentPath, DocumentStore, Subscription,
};
use crate::repositories::errors::document_store_errors::DocumentStoreError;

/// One document as stored in DynamoDB.
/// PK: parent collection path (e.g. "users/u1/classes"), SK: document id.
#[derive(Debug, Clone, Deserialize, Serialize)]
struct DocumentItem {
    collection: String,
    doc_id: String,
    data: Value,
    updated_at: DateTime<Utc>,
}

impl From<DocumentItem> for Document {
    fn from(item: DocumentItem) -> Self {
        Document {
            id: item.doc_id,
            data: item.data,
        }
    }
}

#[derive(Clone)]
pub struct DynamoDbDocumentStore {
    pub client: Client,
    pub table_name: String,
    pub poll_interval: Duration,
}

impl DynamoDbDocumentStore {
    pub fn new(client: Client, table_name: &str, poll_interval: Duration) -> Self {
        Self {
            client,
            table_name: table_name.to_string(),
            poll_interval,
        }
    }

    async fn put(&self, path: &DocumentPath, data: Value) -> Result<(), DocumentStoreError> {
        let item = DocumentItem {
            collection: path.collection.clone(),
            doc_id: path.id.clone(),
            data,
            updated_at: Utc::now(),
        };
        let item = to_item(item).map_err(|e| DocumentStoreError::Serialization(e.to_string()))?;

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(map_sdk_error)?;
        debug!("Wrote document {}", path);
        Ok(())
    }

    fn key(path: &DocumentPath) -> HashMap<String, AttributeValue> {
        HashMap::from([
            (
                "collection".to_string(),
                AttributeValue::S(path.collection.clone()),
            ),
            ("doc_id".to_string(), AttributeValue::S(path.id.clone())),
        ])
    }
}

fn map_sdk_error<E, R>(err: SdkError<E, R>) -> DocumentStoreError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = DisplayErrorContext(&err).to_string();
    match err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
            DocumentStoreError::Unavailable(message)
        }
        _ if message.contains("AccessDenied") || message.contains("UnrecognizedClient") => {
            DocumentStoreError::PermissionDenied(message)
        }
        _ => DocumentStoreError::DynamoDb(message),
    }
}

#[async_trait]
impl DocumentStore for DynamoDbDocumentStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, DocumentStoreError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(Self::key(path)))
            .consistent_read(true)
            .send()
            .await
            .map_err(map_sdk_error)?;

        match output.item {
            Some(item) => {
                let item: DocumentItem = from_item(item)
                    .map_err(|e| DocumentStoreError::Serialization(e.to_string()))?;
                Ok(Some(item.into()))
            }
            None => Ok(None),
        }
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, DocumentStoreError> {
        let mut documents = Vec::new();
        let mut start_key = None;

        loop {
            let output = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("#collection = :collection")
                .expression_attribute_names("#collection", "collection")
                .expression_attribute_values(
                    ":collection",
                    AttributeValue::S(collection.to_string()),
                )
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(map_sdk_error)?;

            for item in output.items.unwrap_or_default() {
                let item: DocumentItem = from_item(item)
                    .map_err(|e| DocumentStoreError::Serialization(e.to_string()))?;
                documents.push(item.into());
            }

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(documents)
    }

    async fn set(&self, path: &DocumentPath, data: &Value) -> Result<(), DocumentStoreError> {
        self.put(path, data.clone()).await
    }

    async fn set_merge(&self, path: &DocumentPath, data: &Value) -> Result<(), DocumentStoreError> {
        let mut merged = match self.get(path).await? {
            Some(existing) => existing.data,
            None => Value::Null,
        };
        merge_documents(&mut merged, data);
        self.put(path, merged).await
    }

    async fn delete(&self, path: &DocumentPath) -> Result<(), DocumentStoreError> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .set_key(Some(Self::key(path)))
            .send()
            .await
            .map_err(map_sdk_error)?;
        debug!("Deleted document {}", path);
        Ok(())
    }

    /// DynamoDB has no client push, so the collection is polled and a
    /// snapshot is published whenever it differs from the previous one.
    async fn subscribe(&self, collection: &str) -> Result<Subscription, DocumentStoreError> {
        let initial = self.list(collection).await?;
        let (sender, receiver) = watch::channel(initial);

        let store = self.clone();
        let collection = collection.to_string();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(store.poll_interval);
            interval.tick().await;
            loop {
                interval.tick().await;
                match store.list(&collection).await {
                    Ok(snapshot) => {
                        let changed = sender.send_if_modified(|current| {
                            if *current != snapshot {
                                *current = snapshot;
                                true
                            } else {
                                false
                            }
                        });
                        if changed {
                            debug!("Collection {} changed", collection);
                        }
                    }
                    Err(e) => warn!("Polling {} failed: {}", collection, e),
                }
                if sender.is_closed() {
                    break;
                }
            }
        });

        Ok(Subscription::new(receiver, Some(task)))
    }
}
