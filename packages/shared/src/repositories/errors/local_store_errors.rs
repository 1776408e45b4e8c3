#[derive(Debug)]
pub enum LocalStoreError {
    QuotaExceeded,
    StorageFull { key: String },
    Serialization(String),
    Io(std::io::Error),
}

impl std::fmt::Display for LocalStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LocalStoreError::QuotaExceeded => write!(f, "Storage quota exceeded"),
            LocalStoreError::StorageFull { key } => {
                write!(f, "Local storage is full, could not save '{}'", key)
            }
            LocalStoreError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            LocalStoreError::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for LocalStoreError {}

impl From<std::io::Error> for LocalStoreError {
    fn from(err: std::io::Error) -> Self {
        LocalStoreError::Io(err)
    }
}

impl From<serde_json::Error> for LocalStoreError {
    fn from(err: serde_json::Error) -> Self {
        LocalStoreError::Serialization(err.to_string())
    }
}
