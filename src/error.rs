use thiserror::Error;

use crate::domain::PatternError;

/// Error surfaced at the application boundary.
///
/// Exit codes: 2 = I/O or configuration, 3 = no usable data.
#[derive(Clone, Error)]
#[error("{message}")]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl From<PatternError> for AppError {
    fn from(err: PatternError) -> Self {
        AppError::new(2, format!("Invalid pattern configuration: {err}"))
    }
}
