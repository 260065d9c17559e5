//! Application error types.

use domain::ErrorKind;
use services::ServiceError;
use store::StoreError;
use thiserror::Error;

/// Errors surfaced by the command line.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed command argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A service command failed.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Persistence failed outside of a service command.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The database could not be reached.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Output could not be rendered.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Config(_) | AppError::InvalidArgument(_) => ErrorKind::Validation,
            AppError::Service(e) => e.kind(),
            AppError::Store(e) => e.kind(),
            AppError::Database(_) | AppError::Serialization(_) => ErrorKind::Internal,
        }
    }

    /// Process exit code for the error's kind.
    pub fn exit_code(&self) -> u8 {
        match self.kind() {
            ErrorKind::Validation => 2,
            ErrorKind::NotFound => 3,
            ErrorKind::StateConflict
            | ErrorKind::InvalidTransition
            | ErrorKind::Conflict
            | ErrorKind::CapacityExceeded => 4,
            ErrorKind::Internal => 1,
        }
    }
}
