use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    InvalidToken,
    ExpiredToken,
    MissingSubject,
    JwtError(String),
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IdentityError::InvalidToken => write!(f, "Invalid ID token"),
            IdentityError::ExpiredToken => write!(f, "ID token has expired"),
            IdentityError::MissingSubject => write!(f, "ID token has no subject"),
            IdentityError::JwtError(msg) => write!(f, "JWT error: {}", msg),
        }
    }
}

impl std::error::Error for IdentityError {}
