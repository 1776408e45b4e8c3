#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupingError {
    ValidationError(String),
}

impl std::fmt::Display for GroupingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupingError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for GroupingError {}
