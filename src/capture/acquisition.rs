//! Device acquisition
//!
//! Requests the minimum set of streams a recording mode needs, in a fixed
//! order: display, then camera (with microphone), then a standalone
//! microphone for screen-only recordings.

use super::traits::{
    DeviceError, DisplayConstraints, MediaDevices, MediaStream, UserMediaConstraints,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which sources a recording captures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingMode {
    #[default]
    Screen,
    Camera,
    Both,
}

impl RecordingMode {
    pub fn wants_screen(self) -> bool {
        matches!(self, RecordingMode::Screen | RecordingMode::Both)
    }

    pub fn wants_camera(self) -> bool {
        matches!(self, RecordingMode::Camera | RecordingMode::Both)
    }
}

impl fmt::Display for RecordingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingMode::Screen => write!(f, "screen"),
            RecordingMode::Camera => write!(f, "camera"),
            RecordingMode::Both => write!(f, "both"),
        }
    }
}

impl FromStr for RecordingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "screen" => Ok(RecordingMode::Screen),
            "camera" => Ok(RecordingMode::Camera),
            "both" => Ok(RecordingMode::Both),
            other => Err(format!("Unknown recording mode: {other}")),
        }
    }
}

/// Acquisition options that do not change per call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionPolicy {
    /// Request system audio with the display capture
    pub capture_system_audio: bool,
}

/// Streams obtained for one recording attempt
#[derive(Debug, Clone, Default)]
pub struct AcquiredStreams {
    pub screen: Option<MediaStream>,
    pub camera: Option<MediaStream>,
    /// Standalone microphone, only present in screen mode
    pub microphone: Option<MediaStream>,
}

impl AcquiredStreams {
    /// Streams that may carry audio for the mixer, in mixing order
    pub fn audio_sources(&self) -> Vec<&MediaStream> {
        [&self.screen, &self.camera, &self.microphone]
            .into_iter()
            .flatten()
            .collect()
    }
}

/// Acquire every stream `mode` requires.
///
/// Each stream is pushed onto `originals` as soon as it arrives so that a
/// failure later in the sequence, or the caller abandoning this future,
/// still leaves it reachable for cleanup. The first failure ends the
/// sequence without requesting further devices.
pub async fn acquire_streams(
    devices: &dyn MediaDevices,
    mode: RecordingMode,
    with_microphone: bool,
    policy: AcquisitionPolicy,
    originals: &mut Vec<MediaStream>,
) -> Result<AcquiredStreams, DeviceError> {
    let mut acquired = AcquiredStreams::default();

    if mode.wants_screen() {
        tracing::debug!(
            "Requesting display capture (system audio: {})",
            policy.capture_system_audio
        );
        let screen = devices
            .get_display_media(DisplayConstraints {
                video: true,
                audio: policy.capture_system_audio,
            })
            .await?;
        originals.push(screen.clone());
        acquired.screen = Some(screen);
    }

    if mode.wants_camera() {
        tracing::debug!("Requesting camera (microphone: {})", with_microphone);
        let camera = devices
            .get_user_media(UserMediaConstraints {
                video: true,
                audio: with_microphone,
            })
            .await?;
        originals.push(camera.clone());
        acquired.camera = Some(camera);
    } else if with_microphone {
        tracing::debug!("Requesting standalone microphone");
        let microphone = devices
            .get_user_media(UserMediaConstraints {
                video: false,
                audio: true,
            })
            .await?;
        originals.push(microphone.clone());
        acquired.microphone = Some(microphone);
    }

    Ok(acquired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::simulated::{DeviceRequest, SimulatedPlatform};

    const POLICY: AcquisitionPolicy = AcquisitionPolicy {
        capture_system_audio: false,
    };

    #[test]
    fn test_mode_parsing() {
        assert_eq!("Both".parse::<RecordingMode>().unwrap(), RecordingMode::Both);
        assert_eq!(" camera ".parse::<RecordingMode>().unwrap(), RecordingMode::Camera);
        assert!("window".parse::<RecordingMode>().is_err());
        assert_eq!(RecordingMode::default(), RecordingMode::Screen);
    }

    #[tokio::test]
    async fn test_screen_with_microphone_requests_both() {
        let platform = SimulatedPlatform::new();
        let mut originals = Vec::new();

        let acquired = acquire_streams(&platform, RecordingMode::Screen, true, POLICY, &mut originals)
            .await
            .unwrap();

        assert!(acquired.screen.is_some());
        assert!(acquired.camera.is_none());
        assert!(acquired.microphone.is_some());
        assert_eq!(originals.len(), 2);
        assert_eq!(
            platform.requests(),
            vec![
                DeviceRequest::Display { audio: false },
                DeviceRequest::UserMedia { video: false, audio: true },
            ]
        );
    }

    #[tokio::test]
    async fn test_both_mode_takes_microphone_with_camera() {
        let platform = SimulatedPlatform::new();
        let mut originals = Vec::new();

        let acquired = acquire_streams(&platform, RecordingMode::Both, true, POLICY, &mut originals)
            .await
            .unwrap();

        assert!(acquired.microphone.is_none());
        assert!(acquired.camera.as_ref().unwrap().has_audio());
        assert_eq!(acquired.audio_sources().len(), 2);
    }

    #[tokio::test]
    async fn test_display_denial_stops_the_sequence() {
        let platform = SimulatedPlatform::new();
        platform.fail_display(DeviceError::NotAllowed("picker dismissed".into()));
        let mut originals = Vec::new();

        let err = acquire_streams(&platform, RecordingMode::Both, true, POLICY, &mut originals)
            .await
            .unwrap_err();

        assert!(matches!(err, DeviceError::NotAllowed(_)));
        assert!(originals.is_empty());
        assert_eq!(platform.requests(), vec![DeviceRequest::Display { audio: false }]);
    }

    #[tokio::test]
    async fn test_camera_failure_keeps_screen_for_cleanup() {
        let platform = SimulatedPlatform::new();
        platform.fail_user_media(DeviceError::NotReadable("in use".into()));
        let mut originals = Vec::new();

        let result =
            acquire_streams(&platform, RecordingMode::Both, false, POLICY, &mut originals).await;

        assert!(result.is_err());
        assert_eq!(originals.len(), 1);
        assert!(originals[0].is_active());
    }
}
