//! CLI error types

use forkwatch_core::{CoreError, SignalError, SpawnError, WaitError};
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl From<SpawnError> for CliError {
    fn from(err: SpawnError) -> Self {
        CliError::Core(err.into())
    }
}

impl From<WaitError> for CliError {
    fn from(err: WaitError) -> Self {
        CliError::Core(err.into())
    }
}

impl From<SignalError> for CliError {
    fn from(err: SignalError) -> Self {
        CliError::Core(err.into())
    }
}

impl CliError {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            CliError::CommandFailed(_) => "CLI001",
            CliError::InvalidArgument(_) => "CLI002",
            CliError::SerializationError(_) => "CLI003",
            CliError::Core(e) => e.code(),
        }
    }
}

/// CLI-specific result type
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(CliError::CommandFailed("test".to_string()).code(), "CLI001");
        assert_eq!(CliError::InvalidArgument("test".to_string()).code(), "CLI002");
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(CliError::from(json_err).code(), "CLI003");
        assert_eq!(CliError::from(WaitError::EmptyTable).code(), "WAIT001");
    }

    #[test]
    fn test_error_display() {
        let error = CliError::InvalidArgument("bad env".to_string());
        assert_eq!(error.to_string(), "Invalid argument: bad env");

        let error = CliError::from(WaitError::EmptyTable);
        assert_eq!(error.to_string(), CoreError::from(WaitError::EmptyTable).to_string());
    }
}
