#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    InsufficientParticipants { required: usize, available: usize },
}

impl std::fmt::Display for SelectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionError::InsufficientParticipants {
                required,
                available,
            } => write!(
                f,
                "Insufficient participants: need {}, only {} eligible",
                required, available
            ),
        }
    }
}

impl std::error::Error for SelectionError {}
