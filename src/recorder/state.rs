//! Recording state management
//!
//! Defines the recorder state machine, the per-controller session and the
//! recorder configuration.

use crate::handoff::{Blob, DEFAULT_FILE_NAME, HANDOFF_KEY};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Encoded fragments in arrival order, shared with the periodic flush task
pub type ChunkBuffer = Arc<Mutex<Vec<Vec<u8>>>>;

/// Current state of the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderState {
    /// Nothing recorded, nothing live
    #[default]
    Idle,
    /// Capturing
    Recording,
    /// A finished recording is available
    Stopped,
    /// The last start attempt failed; a new start or reset leaves this state
    Error,
}

/// Everything one controller knows about its current recording
///
/// Lives from idle through recording to stopped; reset returns it to the
/// default values.
#[derive(Debug, Default)]
pub struct RecordingSession {
    pub state: RecorderState,

    pub chunks: ChunkBuffer,

    pub started_at: Option<DateTime<Utc>>,

    /// Immutable once produced
    pub recorded_blob: Option<Blob>,

    /// Handle to `recorded_blob`; released when superseded or discarded
    pub recorded_video_url: Option<String>,

    pub recording_duration_ms: u64,

    /// Cleared once surfaced to the user
    pub error_message: Option<String>,
}

impl RecordingSession {
    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::Recording
    }

    /// Milliseconds since `started_at`, or 0 when never started
    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> u64 {
        self.started_at
            .map(|start| (now - start).num_milliseconds().max(0) as u64)
            .unwrap_or(0)
    }

    pub fn buffered_bytes(&self) -> usize {
        self.chunks.lock().iter().map(Vec::len).sum()
    }

    pub fn summary(&self) -> RecordingSummary {
        RecordingSummary {
            state: self.state,
            is_recording: self.is_recording(),
            recorded_video_url: self.recorded_video_url.clone(),
            recording_duration_ms: self.recording_duration_ms,
            size_bytes: self.recorded_blob.as_ref().map(|b| b.size() as u64),
            mime_type: self.recorded_blob.as_ref().map(|b| b.mime_type().to_string()),
        }
    }
}

/// Snapshot of a session for the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSummary {
    pub state: RecorderState,
    pub is_recording: bool,
    pub recorded_video_url: Option<String>,
    pub recording_duration_ms: u64,
    pub size_bytes: Option<u64>,
    pub mime_type: Option<String>,
}

/// Configuration for the recorder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecorderConfig {
    /// Interval between periodic encoder flushes
    pub timeslice_ms: u64,

    /// Container requested from the encoder
    pub mime_type: String,

    /// Request system audio with display capture. Off by default: silent
    /// display captures can leave the audio graph without a usable source.
    pub capture_system_audio: bool,

    /// Record video only when no source has audio, instead of failing
    pub allow_silence: bool,

    /// File name handed to the upload page
    pub file_name: String,

    /// Transient storage key read by the upload page
    pub handoff_key: String,

    /// Origin used for `blob:` URLs
    pub origin: String,
}

impl RecorderConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn timeslice(&self) -> Duration {
        Duration::from_millis(self.timeslice_ms.max(1))
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            timeslice_ms: 1000,
            mime_type: "video/webm".to_string(),
            capture_system_audio: false,
            allow_silence: true,
            file_name: DEFAULT_FILE_NAME.to_string(),
            handoff_key: HANDOFF_KEY.to_string(),
            origin: "http://localhost:3000".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = RecorderConfig::from_json_str(r#"{"timesliceMs": 250, "captureSystemAudio": true}"#)
            .unwrap();

        assert_eq!(config.timeslice(), Duration::from_millis(250));
        assert!(config.capture_system_audio);
        assert_eq!(config.mime_type, "video/webm");
        assert_eq!(config.handoff_key, "recordedVideo");
    }

    #[test]
    fn test_elapsed_without_start_is_zero() {
        let mut session = RecordingSession::default();
        let now = Utc::now();
        assert_eq!(session.elapsed_ms(now), 0);

        session.started_at = Some(now - ChronoDuration::milliseconds(1500));
        assert_eq!(session.elapsed_ms(now), 1500);

        // Clock skew never produces a negative duration
        session.started_at = Some(now + ChronoDuration::seconds(5));
        assert_eq!(session.elapsed_ms(now), 0);
    }

    #[test]
    fn test_state_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&RecorderState::Stopped).unwrap(), "\"stopped\"");
        assert_eq!(RecorderState::default(), RecorderState::Idle);
    }
}
