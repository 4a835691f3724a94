use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("An account with this email already exists: {0}")]
    EmailInUse(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Password must be at least {0} characters")]
    WeakPassword(usize),

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}
