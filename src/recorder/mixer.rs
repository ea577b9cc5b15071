//! Audio mixer
//!
//! Sums every available input audio track into one output track through a
//! single audio-processing graph per recording attempt.

use crate::capture::traits::{MediaStream, MediaTrack};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the audio graph
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MixerError {
    #[error("No audio source available")]
    NoAudio,

    #[error("Audio context error: {0}")]
    Context(String),

    #[error("Failed to connect source: {0}")]
    Connect(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioContextState {
    Running,
    Suspended,
    Closed,
}

/// One audio-processing graph. Not reusable once closed.
#[async_trait]
pub trait AudioGraph: Send {
    fn state(&self) -> AudioContextState;

    /// Feed an input track into the graph's shared destination
    fn connect_source(&mut self, track: &MediaTrack) -> Result<(), MixerError>;

    /// Output track carrying the sum of every connected source
    fn destination_track(&mut self) -> Result<MediaTrack, MixerError>;

    async fn close(&mut self) -> Result<(), MixerError>;
}

/// Factory for audio graphs
pub trait AudioBackend: Send + Sync {
    fn create_context(&self) -> Result<Box<dyn AudioGraph>, MixerError>;
}

/// Owns the audio graph of the current recording attempt
pub struct AudioMixer {
    graph: Option<Box<dyn AudioGraph>>,
}

impl AudioMixer {
    pub fn new() -> Self {
        Self { graph: None }
    }

    /// Whether a graph is currently held open
    pub fn is_open(&self) -> bool {
        self.graph
            .as_ref()
            .is_some_and(|g| g.state() != AudioContextState::Closed)
    }

    /// Mix the first audio track of each source into one output track.
    ///
    /// Any graph left over from a previous attempt is closed first. Returns
    /// `Ok(None)` without creating a graph when no source carries audio and
    /// `allow_silence` is set.
    pub async fn mix(
        &mut self,
        backend: &dyn AudioBackend,
        sources: &[&MediaStream],
        allow_silence: bool,
    ) -> Result<Option<MediaTrack>, MixerError> {
        self.close().await;

        let inputs: Vec<&MediaTrack> = sources
            .iter()
            .filter_map(|stream| stream.audio_tracks().next())
            .collect();

        if inputs.is_empty() {
            if allow_silence {
                tracing::info!("No audio sources, recording video only");
                return Ok(None);
            }
            return Err(MixerError::NoAudio);
        }

        let mut graph = backend.create_context()?;
        for track in &inputs {
            if let Err(e) = graph.connect_source(track) {
                // Keep the graph so close() still releases it
                self.graph = Some(graph);
                return Err(e);
            }
        }
        let output = graph.destination_track();
        self.graph = Some(graph);

        let output = output?;
        tracing::debug!("Mixed {} audio source(s) into track {}", inputs.len(), output.id());
        Ok(Some(output))
    }

    /// Close the current graph. Failures are logged and swallowed.
    pub async fn close(&mut self) {
        let Some(mut graph) = self.graph.take() else {
            return;
        };
        if graph.state() == AudioContextState::Closed {
            return;
        }
        if let Err(e) = graph.close().await {
            tracing::warn!("Failed to close audio context: {}", e);
        }
    }
}

impl Default for AudioMixer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::simulated::SimulatedPlatform;
    use crate::capture::traits::TrackKind;

    fn stream_with(kinds: &[TrackKind]) -> MediaStream {
        MediaStream::from_tracks(kinds.iter().map(|k| MediaTrack::new(*k, "test")).collect())
    }

    #[tokio::test]
    async fn test_mix_two_sources_into_one_track() {
        let platform = SimulatedPlatform::new();
        let screen = stream_with(&[TrackKind::Video, TrackKind::Audio]);
        let mic = stream_with(&[TrackKind::Audio]);
        let mut mixer = AudioMixer::new();

        let output = mixer.mix(&platform, &[&screen, &mic], true).await.unwrap();

        assert_eq!(output.unwrap().kind(), TrackKind::Audio);
        assert_eq!(platform.connected_sources(), 2);
        assert!(mixer.is_open());
    }

    #[tokio::test]
    async fn test_silence_allowed_creates_no_context() {
        let platform = SimulatedPlatform::new();
        let screen = stream_with(&[TrackKind::Video]);
        let mut mixer = AudioMixer::new();

        let output = mixer.mix(&platform, &[&screen], true).await.unwrap();

        assert!(output.is_none());
        assert_eq!(platform.contexts_created(), 0);
        assert!(!mixer.is_open());
    }

    #[tokio::test]
    async fn test_silence_rejected_when_not_allowed() {
        let platform = SimulatedPlatform::new();
        let mut mixer = AudioMixer::new();

        let err = mixer.mix(&platform, &[], false).await.unwrap_err();

        assert_eq!(err, MixerError::NoAudio);
    }

    #[tokio::test]
    async fn test_remix_closes_previous_context_once() {
        let platform = SimulatedPlatform::new();
        let mic = stream_with(&[TrackKind::Audio]);
        let mut mixer = AudioMixer::new();

        mixer.mix(&platform, &[&mic], true).await.unwrap();
        mixer.mix(&platform, &[&mic], true).await.unwrap();
        mixer.close().await;
        mixer.close().await;

        assert_eq!(platform.contexts_created(), 2);
        assert_eq!(platform.contexts_closed(), 2);
    }
}
