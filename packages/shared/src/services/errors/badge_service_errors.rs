use crate::services::errors::sync_service_errors::SyncError;

#[derive(Debug)]
pub enum BadgeServiceError {
    ValidationError(String),
    StudentNotFound { class_id: String, student_id: String },
    SyncError(SyncError),
}

impl std::fmt::Display for BadgeServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BadgeServiceError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            BadgeServiceError::StudentNotFound {
                class_id,
                student_id,
            } => write!(f, "Student {} not found in class {}", student_id, class_id),
            BadgeServiceError::SyncError(err) => write!(f, "Sync error: {}", err),
        }
    }
}

impl std::error::Error for BadgeServiceError {}

impl From<SyncError> for BadgeServiceError {
    fn from(err: SyncError) -> Self {
        BadgeServiceError::SyncError(err)
    }
}
