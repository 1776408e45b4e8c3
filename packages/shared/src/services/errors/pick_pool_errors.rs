use crate::services::errors::selector_errors::SelectionError;
use crate::services::pick_pool::Role;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickError {
    InsufficientParticipants {
        role: Role,
        required: usize,
        available: usize,
    },
    ValidationError(String),
}

impl PickError {
    pub(crate) fn from_selection(role: Role, err: SelectionError) -> Self {
        match err {
            SelectionError::InsufficientParticipants {
                required,
                available,
            } => PickError::InsufficientParticipants {
                role,
                required,
                available,
            },
        }
    }
}

impl std::fmt::Display for PickError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PickError::InsufficientParticipants {
                role,
                required,
                available,
            } => write!(
                f,
                "Insufficient participants for {}: need {}, only {} eligible",
                role, required, available
            ),
            PickError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for PickError {}
