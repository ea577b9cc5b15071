//! Recording commands invoked by the recording dialog and the upload page

use crate::capture::acquisition::RecordingMode;
use crate::handoff::{
    stash_recording, take_recording, HandoffError, RecordedFile, RecordedVideoHandoff,
    SessionStorage,
};
use crate::recorder::{Platform, RecorderConfig, RecorderController, RecordingSummary};
use crate::utils::error::{AppError, ErrorResponse};
use std::sync::Arc;

/// Application state for recording
#[derive(Clone)]
pub struct RecorderHandle {
    pub recorder: Arc<RecorderController>,
    pub storage: Arc<dyn SessionStorage>,
}

impl RecorderHandle {
    pub fn new(platform: Platform, config: RecorderConfig, storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            recorder: Arc::new(RecorderController::new(platform, config)),
            storage,
        }
    }
}

/// Start recording. A failed start surfaces its classified message once.
pub async fn start_recording(
    state: &RecorderHandle,
    mode: &str,
    with_microphone: bool,
) -> Result<RecordingSummary, ErrorResponse> {
    let mode: RecordingMode = mode.parse().map_err(AppError::InvalidInput)?;

    if !state.recorder.start(mode, with_microphone).await {
        if let Some(message) = state.recorder.take_error().await {
            return Err(AppError::Recording(message).into());
        }
    }
    Ok(state.recorder.summary().await)
}

/// Stop recording
pub async fn stop_recording(state: &RecorderHandle) -> Result<RecordingSummary, ErrorResponse> {
    Ok(state.recorder.stop().await)
}

/// Discard the recording and return to idle
pub async fn reset_recording(state: &RecorderHandle) -> Result<(), ErrorResponse> {
    state.recorder.reset().await;
    Ok(())
}

/// Throw the current take away and start a fresh one
pub async fn record_again(
    state: &RecorderHandle,
    mode: &str,
    with_microphone: bool,
) -> Result<RecordingSummary, ErrorResponse> {
    state.recorder.reset().await;
    start_recording(state, mode, with_microphone).await
}

/// Get current recording state
pub async fn get_recording_state(state: &RecorderHandle) -> Result<RecordingSummary, ErrorResponse> {
    Ok(state.recorder.summary().await)
}

/// Dismiss the pending notification, returning its message
pub async fn dismiss_error(state: &RecorderHandle) -> Result<Option<String>, ErrorResponse> {
    Ok(state.recorder.take_error().await)
}

/// Hand the finished recording to the upload page and close the recorder
pub async fn continue_to_upload(
    state: &RecorderHandle,
) -> Result<RecordedVideoHandoff, ErrorResponse> {
    let recorder = &state.recorder;
    let blob = recorder
        .recorded_blob()
        .await
        .ok_or(AppError::Handoff(HandoffError::NoRecording))?;
    let config = recorder.config();

    let record = stash_recording(
        state.storage.as_ref(),
        recorder.url_registry(),
        &config.handoff_key,
        &blob,
        &config.file_name,
        recorder.recording_duration_ms().await,
    )
    .map_err(AppError::from)?;

    recorder.reset().await;
    Ok(record)
}

/// Upload page side: pick up a handed-off recording, if one is waiting
pub async fn load_recorded_video(
    state: &RecorderHandle,
) -> Result<Option<RecordedFile>, ErrorResponse> {
    let recorder = &state.recorder;
    take_recording(
        state.storage.as_ref(),
        recorder.url_registry(),
        &recorder.config().handoff_key,
    )
    .map_err(|e| {
        tracing::error!("Error loading recorded video: {}", e);
        ErrorResponse::from(AppError::from(e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::simulated::SimulatedPlatform;
    use crate::capture::traits::DeviceError;
    use crate::handoff::MemorySessionStorage;
    use crate::recorder::RecorderState;

    fn handle(platform: &SimulatedPlatform) -> RecorderHandle {
        RecorderHandle::new(
            Platform::simulated(platform),
            RecorderConfig::default(),
            Arc::new(MemorySessionStorage::new()),
        )
    }

    #[tokio::test]
    async fn test_record_and_hand_off() {
        let platform = SimulatedPlatform::new();
        let state = handle(&platform);

        let started = start_recording(&state, "screen", true).await.unwrap();
        assert!(started.is_recording);
        let stopped = stop_recording(&state).await.unwrap();
        let preview_url = stopped.recorded_video_url.unwrap();

        let record = continue_to_upload(&state).await.unwrap();

        assert_eq!(record.name, "screen-recording.webm");
        assert_eq!(record.size, stopped.size_bytes.unwrap());
        assert_ne!(record.url, preview_url);
        // Closing the dialog released the preview URL but not the handoff URL
        let registry = state.recorder.url_registry();
        assert!(registry.resolve(&preview_url).is_none());
        assert!(registry.resolve(&record.url).is_some());
        assert_eq!(
            get_recording_state(&state).await.unwrap().state,
            RecorderState::Idle
        );

        let file = load_recorded_video(&state).await.unwrap().unwrap();
        assert_eq!(file.size() as u64, record.size);
        assert!(registry.resolve(&record.url).is_none());
    }

    #[tokio::test]
    async fn test_failed_start_surfaces_message_once() {
        let platform = SimulatedPlatform::new();
        platform.fail_display(DeviceError::Security("insecure origin".into()));
        let state = handle(&platform);

        let err = start_recording(&state, "both", true).await.unwrap_err();

        assert_eq!(err.code, "RECORDING_ERROR");
        assert!(err.message.contains("security"));
        assert_eq!(dismiss_error(&state).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unknown_mode_is_rejected() {
        let platform = SimulatedPlatform::new();
        let state = handle(&platform);

        let err = start_recording(&state, "window", true).await.unwrap_err();

        assert_eq!(err.code, "INVALID_INPUT");
        assert!(platform.requests().is_empty());
    }

    #[tokio::test]
    async fn test_continue_without_recording_fails() {
        let platform = SimulatedPlatform::new();
        let state = handle(&platform);

        let err = continue_to_upload(&state).await.unwrap_err();

        assert_eq!(err.code, "HANDOFF_ERROR");
    }

    #[tokio::test]
    async fn test_record_again_discards_previous_take() {
        let platform = SimulatedPlatform::new();
        let state = handle(&platform);
        start_recording(&state, "camera", true).await.unwrap();
        let first = stop_recording(&state).await.unwrap().recorded_video_url.unwrap();

        let again = record_again(&state, "camera", true).await.unwrap();

        assert!(again.is_recording);
        assert_eq!(again.recorded_video_url, None);
        assert!(state.recorder.url_registry().resolve(&first).is_none());
    }
}
