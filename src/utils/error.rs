//! Error types and handling
//!
//! Application-wide error type and the shape errors take at the command
//! surface.

use crate::handoff::upload::UploadError;
use crate::handoff::HandoffError;
use crate::recorder::RecordingError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Carries the classified, user-facing message
    #[error("{0}")]
    Recording(String),

    #[error("Handoff error: {0}")]
    Handoff(#[from] HandoffError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<RecordingError> for AppError {
    fn from(error: RecordingError) -> Self {
        AppError::Recording(error.user_message())
    }
}

/// Error response for frontend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        let code = match &error {
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Recording(_) => "RECORDING_ERROR",
            AppError::Handoff(_) => "HANDOFF_ERROR",
            AppError::Upload(_) => "UPLOAD_ERROR",
            AppError::InvalidInput(_) => "INVALID_INPUT",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::traits::DeviceError;

    #[test]
    fn test_recording_error_keeps_user_message() {
        let error = RecordingError::from(DeviceError::NotFound("no camera".into()));
        let expected = error.user_message();

        let response = ErrorResponse::from(AppError::from(error));

        assert_eq!(response.code, "RECORDING_ERROR");
        assert_eq!(response.message, expected);
    }

    #[test]
    fn test_handoff_error_code() {
        let response = ErrorResponse::from(AppError::from(HandoffError::NoRecording));
        assert_eq!(response.code, "HANDOFF_ERROR");
        assert!(response.message.contains("Nothing has been recorded"));
    }
}
