//! Process-level error type for updatectl.

use thiserror::Error;

/// Result alias used by the updatectl binaries
pub type UpdatectlResult<T> = Result<T, UpdatectlError>;

/// Errors that stop the process before or while setting up a command.
///
/// Failures inside a simulated client never surface here; they are
/// contained by the client that produced them.
#[derive(Debug, Error)]
pub enum UpdatectlError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to initialize tracing: {0}")]
    Tracing(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = UpdatectlError::Config("min-sleep exceeds max-sleep".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: min-sleep exceeds max-sleep"
        );

        let err = UpdatectlError::Tracing("subscriber already set".to_string());
        assert!(err.to_string().contains("subscriber already set"));
    }
}
