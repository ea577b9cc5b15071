//! Resource cleanup
//!
//! Everything live for one recording attempt, and the single teardown that
//! releases it.

use super::combiner::ExtendedStream;
use super::encoder::{ChunkEncoder, EncoderState};
use super::mixer::AudioMixer;
use crate::capture::traits::MediaStream;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Encoder shared between the controller and the periodic flush task
pub type SharedEncoder = Arc<Mutex<Box<dyn ChunkEncoder>>>;

/// Live resources of the current recording attempt
#[derive(Default)]
pub struct LiveResources {
    pub encoder: Option<SharedEncoder>,
    pub flush_task: Option<JoinHandle<()>>,
    pub stream: Option<ExtendedStream>,
    /// Exposed read-only to preview UIs
    pub camera: Option<MediaStream>,
    pub mixer: AudioMixer,
}

impl LiveResources {
    /// Whether nothing is held
    pub fn is_empty(&self) -> bool {
        self.encoder.is_none()
            && self.flush_task.is_none()
            && self.stream.is_none()
            && self.camera.is_none()
            && !self.mixer.is_open()
    }

    /// Number of distinct tracks still live across every held stream
    pub fn live_track_count(&self) -> usize {
        let mut live = HashSet::new();
        let streams = self
            .stream
            .iter()
            .flat_map(|s| s.originals.iter().chain(std::iter::once(&s.combined)))
            .chain(self.camera.iter());
        for stream in streams {
            live.extend(stream.tracks().iter().filter(|t| t.is_live()).map(|t| t.id()));
        }
        live.len()
    }

    /// Release everything. Returns the encoder's final fragment when the
    /// encoder was still recording.
    ///
    /// Never fails; safe to call repeatedly and on partially built state.
    pub async fn teardown(&mut self) -> Option<Vec<u8>> {
        if let Some(task) = self.flush_task.take() {
            task.abort();
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    tracing::warn!("Flush task ended abnormally: {}", e);
                }
            }
        }

        let mut last = None;
        if let Some(encoder) = self.encoder.take() {
            let mut encoder = encoder.lock();
            if encoder.state() == EncoderState::Recording {
                match encoder.stop() {
                    Ok(fragment) => last = fragment,
                    Err(e) => tracing::warn!("Failed to stop encoder: {}", e),
                }
            }
        }

        if let Some(stream) = self.stream.take() {
            stream.stop_all();
        }
        if let Some(camera) = self.camera.take() {
            camera.stop_all();
        }

        self.mixer.close().await;
        last
    }

    /// Synchronous release for when no runtime can be awaited on. Encoded
    /// output is dropped and the audio graph is released without closing.
    pub fn abandon(&mut self) {
        if let Some(task) = self.flush_task.take() {
            task.abort();
        }
        if let Some(encoder) = self.encoder.take() {
            let mut encoder = encoder.lock();
            if encoder.state() == EncoderState::Recording {
                if let Err(e) = encoder.stop() {
                    tracing::warn!("Failed to stop encoder: {}", e);
                }
            }
        }
        if let Some(stream) = self.stream.take() {
            stream.stop_all();
        }
        if let Some(camera) = self.camera.take() {
            camera.stop_all();
        }
        self.mixer = AudioMixer::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::simulated::SimulatedPlatform;
    use crate::capture::traits::{MediaTrack, TrackKind};
    use crate::recorder::encoder::{EncoderBackend, EncoderOptions};
    use std::time::Duration;

    #[tokio::test]
    async fn test_teardown_on_empty_resources_is_noop() {
        let mut live = LiveResources::default();
        assert!(live.teardown().await.is_none());
        assert!(live.teardown().await.is_none());
        assert!(live.is_empty());
    }

    #[tokio::test]
    async fn test_teardown_stops_encoder_and_tracks_once() {
        let platform = SimulatedPlatform::new();
        let screen = MediaStream::from_tracks(vec![MediaTrack::new(TrackKind::Video, "screen")]);
        let mut encoder = platform
            .create(
                &screen,
                &EncoderOptions {
                    mime_type: "video/webm".to_string(),
                    timeslice: Duration::from_millis(1000),
                },
            )
            .unwrap();
        encoder.start().unwrap();

        let mut live = LiveResources {
            encoder: Some(Arc::new(Mutex::new(encoder))),
            stream: Some(ExtendedStream {
                combined: screen.clone(),
                originals: vec![screen.clone()],
            }),
            ..Default::default()
        };
        assert_eq!(live.live_track_count(), 1);

        let last = live.teardown().await;

        assert!(last.is_some());
        assert!(!screen.is_active());
        assert!(live.is_empty());
        assert!(live.teardown().await.is_none());
    }

    #[tokio::test]
    async fn test_abandon_stops_flush_task_and_tracks() {
        let camera = MediaStream::from_tracks(vec![MediaTrack::new(TrackKind::Video, "camera")]);
        let task = tokio::spawn(std::future::pending::<()>());
        let mut live = LiveResources {
            flush_task: Some(task),
            camera: Some(camera.clone()),
            ..Default::default()
        };

        live.abandon();

        assert!(!camera.is_active());
        assert!(live.is_empty());
    }
}
