//! Recording errors and their user-facing messages

use super::encoder::EncoderError;
use super::mixer::MixerError;
use crate::capture::traits::DeviceError;
use thiserror::Error;

/// Errors that can end a recording attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordingError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Mixer(#[from] MixerError),

    #[error(transparent)]
    Encoder(#[from] EncoderError),

    /// A newer start, stop or reset superseded this attempt
    #[error("Recording attempt was superseded")]
    Cancelled,
}

/// Result type for recording operations
pub type RecordingResult<T> = Result<T, RecordingError>;

impl RecordingError {
    /// Whether this is an expected outcome that should not be reported
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            RecordingError::Cancelled | RecordingError::Device(DeviceError::Cancelled)
        )
    }

    /// Message shown to the user in a dismissable notification
    pub fn user_message(&self) -> String {
        match self {
            RecordingError::Device(DeviceError::NotAllowed(_)) => {
                "Permission denied. Allow access to your screen, camera or microphone and try again."
                    .to_string()
            }
            RecordingError::Device(DeviceError::NotFound(_)) => {
                "No camera or microphone was found. Connect a device and try again.".to_string()
            }
            RecordingError::Device(DeviceError::NotReadable(_)) => {
                "Your camera or microphone is busy. Close other applications using it and try again."
                    .to_string()
            }
            RecordingError::Device(DeviceError::Overconstrained(_)) => {
                "The selected device cannot satisfy the requested recording settings.".to_string()
            }
            RecordingError::Device(DeviceError::Aborted(_)) => {
                "Recording was aborted unexpectedly. Please try again.".to_string()
            }
            RecordingError::Device(DeviceError::Security(_)) => {
                "Recording is blocked by a security setting. Check that the page is served securely."
                    .to_string()
            }
            RecordingError::Device(DeviceError::Cancelled) | RecordingError::Cancelled => {
                "Recording was cancelled.".to_string()
            }
            RecordingError::Device(DeviceError::Other(message)) => {
                format!("Failed to start recording: {message}")
            }
            RecordingError::Mixer(MixerError::NoAudio) => {
                "No audio source is available for this recording.".to_string()
            }
            RecordingError::Mixer(e) => format!("Failed to set up audio: {e}"),
            RecordingError::Encoder(e) => format!("Failed to start the recorder: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_each_device_failure_has_distinct_message() {
        let failures = [
            DeviceError::NotReadable("busy".into()),
            DeviceError::NotAllowed("denied".into()),
            DeviceError::Aborted("aborted".into()),
            DeviceError::NotFound("none".into()),
            DeviceError::Overconstrained("1080p".into()),
            DeviceError::Security("insecure".into()),
        ];

        let messages: HashSet<String> = failures
            .iter()
            .map(|e| RecordingError::from(e.clone()).user_message())
            .collect();

        assert_eq!(messages.len(), failures.len());
        assert!(RecordingError::from(DeviceError::NotReadable("x".into()))
            .user_message()
            .contains("busy"));
        assert!(RecordingError::from(DeviceError::NotAllowed("x".into()))
            .user_message()
            .contains("Permission denied"));
    }

    #[test]
    fn test_cancellation_detection() {
        assert!(RecordingError::Cancelled.is_cancellation());
        assert!(RecordingError::from(DeviceError::Cancelled).is_cancellation());
        assert!(!RecordingError::from(MixerError::NoAudio).is_cancellation());
    }
}
