//! Stream combiner
//!
//! Builds the single stream handed to the encoder from the acquired video
//! tracks and the mixer output.

use crate::capture::acquisition::{AcquiredStreams, RecordingMode};
use crate::capture::traits::{MediaStream, MediaTrack};

/// The recordable stream plus back-references to the streams its tracks came
/// from. The originals are kept only so they can be stopped later.
#[derive(Debug, Clone, Default)]
pub struct ExtendedStream {
    pub combined: MediaStream,
    pub originals: Vec<MediaStream>,
}

impl ExtendedStream {
    /// Stop every track on the originals and on the combined stream
    pub fn stop_all(&self) {
        for original in &self.originals {
            original.stop_all();
        }
        self.combined.stop_all();
    }
}

/// Assemble screen video, then camera video, then the mixed audio track.
pub fn combine(
    mode: RecordingMode,
    acquired: &AcquiredStreams,
    mixed_audio: Option<MediaTrack>,
    originals: Vec<MediaStream>,
) -> ExtendedStream {
    let mut combined = MediaStream::new();

    if mode.wants_screen() {
        if let Some(screen) = &acquired.screen {
            screen
                .video_tracks()
                .for_each(|track| combined.add_track(track.clone()));
        }
    }
    if mode.wants_camera() {
        if let Some(camera) = &acquired.camera {
            camera
                .video_tracks()
                .for_each(|track| combined.add_track(track.clone()));
        }
    }
    if let Some(audio) = mixed_audio {
        combined.add_track(audio);
    }

    ExtendedStream {
        combined,
        originals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::traits::TrackKind;

    #[test]
    fn test_combine_both_orders_screen_before_camera() {
        let screen = MediaStream::from_tracks(vec![MediaTrack::new(TrackKind::Video, "screen")]);
        let camera = MediaStream::from_tracks(vec![
            MediaTrack::new(TrackKind::Video, "camera"),
            MediaTrack::new(TrackKind::Audio, "microphone"),
        ]);
        let acquired = AcquiredStreams {
            screen: Some(screen.clone()),
            camera: Some(camera.clone()),
            microphone: None,
        };
        let mixed = MediaTrack::new(TrackKind::Audio, "mixed");

        let stream = combine(
            RecordingMode::Both,
            &acquired,
            Some(mixed.clone()),
            vec![screen, camera],
        );

        let labels: Vec<&str> = stream.combined.tracks().iter().map(|t| t.label()).collect();
        assert_eq!(labels, vec!["screen", "camera", "mixed"]);
        // Raw microphone reaches the recording only through the mixer
        assert_eq!(stream.combined.audio_tracks().count(), 1);
        assert_eq!(stream.originals.len(), 2);
    }

    #[test]
    fn test_stop_all_ends_originals_and_combined() {
        let screen = MediaStream::from_tracks(vec![MediaTrack::new(TrackKind::Video, "screen")]);
        let acquired = AcquiredStreams {
            screen: Some(screen.clone()),
            ..Default::default()
        };
        let stream = combine(RecordingMode::Screen, &acquired, None, vec![screen.clone()]);

        stream.stop_all();
        stream.stop_all();

        assert!(!screen.is_active());
        assert!(!stream.combined.is_active());
    }
}
