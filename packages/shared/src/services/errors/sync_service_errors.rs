use std::time::Duration;

use crate::repositories::errors::document_store_errors::DocumentStoreError;
use crate::repositories::errors::local_store_errors::LocalStoreError;

#[derive(Debug)]
pub enum SyncError {
    Timeout(Duration),
    Remote(DocumentStoreError),
    Local(LocalStoreError),
    ClassNotFound(String),
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::Timeout(after) => write!(f, "Remote store did not answer within {:?}", after),
            SyncError::Remote(err) => write!(f, "Remote store error: {}", err),
            SyncError::Local(err) => write!(f, "Local store error: {}", err),
            SyncError::ClassNotFound(id) => write!(f, "Class {} not found", id),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<DocumentStoreError> for SyncError {
    fn from(err: DocumentStoreError) -> Self {
        match err {
            DocumentStoreError::Timeout(after) => SyncError::Timeout(after),
            other => SyncError::Remote(other),
        }
    }
}

impl From<LocalStoreError> for SyncError {
    fn from(err: LocalStoreError) -> Self {
        SyncError::Local(err)
    }
}
