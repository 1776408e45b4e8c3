use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum DocumentStoreError {
    Timeout(Duration),
    PermissionDenied(String),
    Unavailable(String),
    Serialization(String),
    DynamoDb(String),
}

impl DocumentStoreError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, DocumentStoreError::Timeout(_))
    }
}

impl std::fmt::Display for DocumentStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentStoreError::Timeout(after) => {
                write!(f, "Remote operation timed out after {:?}", after)
            }
            DocumentStoreError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            DocumentStoreError::Unavailable(msg) => write!(f, "Remote store unavailable: {}", msg),
            DocumentStoreError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            DocumentStoreError::DynamoDb(msg) => write!(f, "DynamoDB error: {}", msg),
        }
    }
}

impl std::error::Error for DocumentStoreError {}

impl From<serde_json::Error> for DocumentStoreError {
    fn from(err: serde_json::Error) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}
