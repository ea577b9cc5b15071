//! Capture trait definitions
//!
//! Platform-agnostic media handles and the device surface the recorder
//! acquires streams from. Concrete platforms (browser bindings, native
//! capture, the simulated backend) implement [`MediaDevices`] and hand out
//! [`MediaStream`]s built from [`MediaTrack`]s.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Errors reported by the platform while acquiring a device
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The user dismissed the picker or refused the permission prompt
    #[error("Permission denied: {0}")]
    NotAllowed(String),

    #[error("Device not found: {0}")]
    NotFound(String),

    /// The device exists but another application holds it
    #[error("Device busy: {0}")]
    NotReadable(String),

    #[error("Constraints cannot be satisfied: {0}")]
    Overconstrained(String),

    #[error("Aborted: {0}")]
    Aborted(String),

    #[error("Security error: {0}")]
    Security(String),

    /// The request was abandoned because a newer attempt superseded it
    #[error("Acquisition cancelled")]
    Cancelled,

    #[error("Platform error: {0}")]
    Other(String),
}

/// Kind of media carried by a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Video => write!(f, "video"),
        }
    }
}

/// Lifecycle of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackState {
    Live,
    Ended,
}

/// Hook invoked when a track is stopped, used by platforms to release the
/// underlying hardware.
pub trait TrackSource: Send + Sync {
    fn stop(&self);
}

struct TrackInner {
    id: Uuid,
    kind: TrackKind,
    label: String,
    ended: AtomicBool,
    source: Option<Box<dyn TrackSource>>,
}

/// Handle to a single live audio or video track
///
/// Clones share state: stopping any clone ends the track for all of them.
#[derive(Clone)]
pub struct MediaTrack {
    inner: Arc<TrackInner>,
}

impl MediaTrack {
    /// Create a track with no platform stop hook
    pub fn new(kind: TrackKind, label: impl Into<String>) -> Self {
        Self::build(kind, label.into(), None)
    }

    /// Create a track that notifies `source` the first time it is stopped
    pub fn with_source(
        kind: TrackKind,
        label: impl Into<String>,
        source: Box<dyn TrackSource>,
    ) -> Self {
        Self::build(kind, label.into(), Some(source))
    }

    fn build(kind: TrackKind, label: String, source: Option<Box<dyn TrackSource>>) -> Self {
        Self {
            inner: Arc::new(TrackInner {
                id: Uuid::new_v4(),
                kind,
                label,
                ended: AtomicBool::new(false),
                source,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn kind(&self) -> TrackKind {
        self.inner.kind
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn state(&self) -> TrackState {
        if self.inner.ended.load(Ordering::SeqCst) {
            TrackState::Ended
        } else {
            TrackState::Live
        }
    }

    pub fn is_live(&self) -> bool {
        self.state() == TrackState::Live
    }

    /// Stop the track. Only the first call reaches the platform.
    pub fn stop(&self) {
        if self.inner.ended.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::trace!("Stopping {} track {} ({})", self.inner.kind, self.inner.id, self.inner.label);
        if let Some(source) = &self.inner.source {
            source.stop();
        }
    }
}

impl PartialEq for MediaTrack {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for MediaTrack {}

impl fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("label", &self.inner.label)
            .field("state", &self.state())
            .finish()
    }
}

/// An ordered set of tracks
#[derive(Debug, Clone)]
pub struct MediaStream {
    id: Uuid,
    tracks: Vec<MediaTrack>,
}

impl MediaStream {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            tracks: Vec::new(),
        }
    }

    pub fn from_tracks(tracks: Vec<MediaTrack>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tracks,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn add_track(&mut self, track: MediaTrack) {
        if !self.tracks.contains(&track) {
            self.tracks.push(track);
        }
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Audio)
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Video)
    }

    pub fn has_audio(&self) -> bool {
        self.audio_tracks().next().is_some()
    }

    /// Whether any track is still live
    pub fn is_active(&self) -> bool {
        self.tracks.iter().any(MediaTrack::is_live)
    }

    /// Stop every track. Safe to call repeatedly.
    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}

impl Default for MediaStream {
    fn default() -> Self {
        Self::new()
    }
}

/// Options for a display-capture request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayConstraints {
    pub video: bool,
    /// Whether to ask for system/tab audio alongside the display
    pub audio: bool,
}

/// Options for a camera and/or microphone request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMediaConstraints {
    pub video: bool,
    pub audio: bool,
}

/// The platform's device surface
///
/// Both calls may suspend indefinitely while the user answers a permission
/// prompt. Dropping the returned future abandons the request.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn get_display_media(
        &self,
        constraints: DisplayConstraints,
    ) -> Result<MediaStream, DeviceError>;

    async fn get_user_media(
        &self,
        constraints: UserMediaConstraints,
    ) -> Result<MediaStream, DeviceError>;
}
