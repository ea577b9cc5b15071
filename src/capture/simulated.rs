//! Simulated capture platform
//!
//! A headless implementation of every platform seam: device prompts, the
//! audio graph and the chunked encoder. It records which devices were
//! requested and which tracks are still live, and can be told to fail or
//! hang on a given prompt.

use super::traits::{
    DeviceError, DisplayConstraints, MediaDevices, MediaStream, MediaTrack, TrackKind,
    TrackSource, UserMediaConstraints,
};
use crate::recorder::encoder::{
    ChunkEncoder, EncoderBackend, EncoderError, EncoderOptions, EncoderState,
};
use crate::recorder::mixer::{AudioBackend, AudioContextState, AudioGraph, MixerError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A device request as seen by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRequest {
    Display { audio: bool },
    UserMedia { video: bool, audio: bool },
}

#[derive(Debug, Clone)]
struct Settings {
    display_error: Option<DeviceError>,
    user_media_error: Option<DeviceError>,
    hang_display: bool,
    hang_user_media: bool,
    system_audio_available: bool,
    audio_context_error: Option<String>,
    encoder_error: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            display_error: None,
            user_media_error: None,
            hang_display: false,
            hang_user_media: false,
            system_audio_available: true,
            audio_context_error: None,
            encoder_error: None,
        }
    }
}

#[derive(Default)]
struct Shared {
    settings: Mutex<Settings>,
    requests: Mutex<Vec<DeviceRequest>>,
    issued: Mutex<Vec<MediaTrack>>,
    hardware_stops: Arc<AtomicUsize>,
    contexts_created: AtomicUsize,
    contexts_closed: Arc<AtomicUsize>,
    connected_sources: Arc<AtomicUsize>,
    encoders_created: AtomicUsize,
}

/// Headless platform; clones share state
#[derive(Clone, Default)]
pub struct SimulatedPlatform {
    shared: Arc<Shared>,
}

struct HardwareRelease(Arc<AtomicUsize>);

impl TrackSource for HardwareRelease {
    fn stop(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

impl SimulatedPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next display prompts fail with `error`
    pub fn fail_display(&self, error: DeviceError) {
        self.shared.settings.lock().display_error = Some(error);
    }

    /// Make the next camera/microphone prompts fail with `error`
    pub fn fail_user_media(&self, error: DeviceError) {
        self.shared.settings.lock().user_media_error = Some(error);
    }

    pub fn fail_audio_context(&self, message: impl Into<String>) {
        self.shared.settings.lock().audio_context_error = Some(message.into());
    }

    pub fn fail_encoder(&self, message: impl Into<String>) {
        self.shared.settings.lock().encoder_error = Some(message.into());
    }

    /// Leave display prompts unanswered until cleared
    pub fn hang_display(&self, hang: bool) {
        self.shared.settings.lock().hang_display = hang;
    }

    pub fn hang_user_media(&self, hang: bool) {
        self.shared.settings.lock().hang_user_media = hang;
    }

    pub fn set_system_audio_available(&self, available: bool) {
        self.shared.settings.lock().system_audio_available = available;
    }

    /// Clear every injected failure and hang
    pub fn heal(&self) {
        let mut settings = self.shared.settings.lock();
        let system_audio_available = settings.system_audio_available;
        *settings = Settings {
            system_audio_available,
            ..Settings::default()
        };
    }

    pub fn requests(&self) -> Vec<DeviceRequest> {
        self.shared.requests.lock().clone()
    }

    /// Every track this platform handed out that has not been stopped
    pub fn live_tracks(&self) -> Vec<MediaTrack> {
        self.shared
            .issued
            .lock()
            .iter()
            .filter(|t| t.is_live())
            .cloned()
            .collect()
    }

    pub fn issued_track_count(&self) -> usize {
        self.shared.issued.lock().len()
    }

    /// Number of times a track released its underlying device
    pub fn hardware_stops(&self) -> usize {
        self.shared.hardware_stops.load(Ordering::SeqCst)
    }

    pub fn contexts_created(&self) -> usize {
        self.shared.contexts_created.load(Ordering::SeqCst)
    }

    pub fn contexts_closed(&self) -> usize {
        self.shared.contexts_closed.load(Ordering::SeqCst)
    }

    pub fn connected_sources(&self) -> usize {
        self.shared.connected_sources.load(Ordering::SeqCst)
    }

    pub fn encoders_created(&self) -> usize {
        self.shared.encoders_created.load(Ordering::SeqCst)
    }

    fn issue(&self, kind: TrackKind, label: &str) -> MediaTrack {
        let track = MediaTrack::with_source(
            kind,
            label,
            Box::new(HardwareRelease(self.shared.hardware_stops.clone())),
        );
        self.shared.issued.lock().push(track.clone());
        track
    }
}

#[async_trait]
impl MediaDevices for SimulatedPlatform {
    async fn get_display_media(
        &self,
        constraints: DisplayConstraints,
    ) -> Result<MediaStream, DeviceError> {
        self.shared.requests.lock().push(DeviceRequest::Display {
            audio: constraints.audio,
        });
        let settings = self.shared.settings.lock().clone();
        if settings.hang_display {
            std::future::pending::<()>().await;
        }
        if let Some(error) = settings.display_error {
            return Err(error);
        }

        let mut stream = MediaStream::new();
        if constraints.video {
            stream.add_track(self.issue(TrackKind::Video, "screen"));
        }
        if constraints.audio && settings.system_audio_available {
            stream.add_track(self.issue(TrackKind::Audio, "system-audio"));
        }
        Ok(stream)
    }

    async fn get_user_media(
        &self,
        constraints: UserMediaConstraints,
    ) -> Result<MediaStream, DeviceError> {
        self.shared.requests.lock().push(DeviceRequest::UserMedia {
            video: constraints.video,
            audio: constraints.audio,
        });
        let settings = self.shared.settings.lock().clone();
        if settings.hang_user_media {
            std::future::pending::<()>().await;
        }
        if let Some(error) = settings.user_media_error {
            return Err(error);
        }
        if !constraints.video && !constraints.audio {
            return Err(DeviceError::Other(
                "At least one of audio and video must be requested".to_string(),
            ));
        }

        let mut stream = MediaStream::new();
        if constraints.video {
            stream.add_track(self.issue(TrackKind::Video, "camera"));
        }
        if constraints.audio {
            stream.add_track(self.issue(TrackKind::Audio, "microphone"));
        }
        Ok(stream)
    }
}

struct SimulatedGraph {
    platform: SimulatedPlatform,
    state: AudioContextState,
    sources: usize,
    destination: Option<MediaTrack>,
}

#[async_trait]
impl AudioGraph for SimulatedGraph {
    fn state(&self) -> AudioContextState {
        self.state
    }

    fn connect_source(&mut self, track: &MediaTrack) -> Result<(), MixerError> {
        if self.state == AudioContextState::Closed {
            return Err(MixerError::Connect("audio context is closed".to_string()));
        }
        if !track.is_live() {
            return Err(MixerError::Connect(format!("track {} has ended", track.id())));
        }
        self.sources += 1;
        self.platform
            .shared
            .connected_sources
            .fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn destination_track(&mut self) -> Result<MediaTrack, MixerError> {
        if self.state == AudioContextState::Closed {
            return Err(MixerError::Context("audio context is closed".to_string()));
        }
        let platform = self.platform.clone();
        Ok(self
            .destination
            .get_or_insert_with(|| platform.issue(TrackKind::Audio, "mixed-audio"))
            .clone())
    }

    async fn close(&mut self) -> Result<(), MixerError> {
        if self.state == AudioContextState::Closed {
            return Err(MixerError::Context("audio context already closed".to_string()));
        }
        self.state = AudioContextState::Closed;
        self.platform
            .shared
            .contexts_closed
            .fetch_add(1, Ordering::SeqCst);
        tracing::trace!("Closed simulated audio context with {} source(s)", self.sources);
        Ok(())
    }
}

impl AudioBackend for SimulatedPlatform {
    fn create_context(&self) -> Result<Box<dyn AudioGraph>, MixerError> {
        if let Some(message) = self.shared.settings.lock().audio_context_error.clone() {
            return Err(MixerError::Context(message));
        }
        self.shared.contexts_created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SimulatedGraph {
            platform: self.clone(),
            state: AudioContextState::Running,
            sources: 0,
            destination: None,
        }))
    }
}

/// Emits one fragment per flush, tagged with a sequence number and the
/// stream's track layout
struct SimulatedEncoder {
    mime_type: String,
    state: EncoderState,
    sequence: u64,
    layout: String,
}

impl SimulatedEncoder {
    fn fragment(&mut self) -> Vec<u8> {
        let fragment = format!("{}#{};", self.layout, self.sequence).into_bytes();
        self.sequence += 1;
        fragment
    }
}

impl ChunkEncoder for SimulatedEncoder {
    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn state(&self) -> EncoderState {
        self.state
    }

    fn start(&mut self) -> Result<(), EncoderError> {
        if self.state == EncoderState::Recording {
            return Err(EncoderError::InvalidState("already recording".to_string()));
        }
        self.state = EncoderState::Recording;
        Ok(())
    }

    fn request_data(&mut self) -> Result<Option<Vec<u8>>, EncoderError> {
        if self.state != EncoderState::Recording {
            return Ok(None);
        }
        Ok(Some(self.fragment()))
    }

    fn stop(&mut self) -> Result<Option<Vec<u8>>, EncoderError> {
        if self.state == EncoderState::Inactive {
            return Ok(None);
        }
        let last = self.fragment();
        self.state = EncoderState::Inactive;
        Ok(Some(last))
    }
}

impl EncoderBackend for SimulatedPlatform {
    fn create(
        &self,
        stream: &MediaStream,
        options: &EncoderOptions,
    ) -> Result<Box<dyn ChunkEncoder>, EncoderError> {
        if let Some(message) = self.shared.settings.lock().encoder_error.clone() {
            return Err(EncoderError::Encoding(message));
        }
        if !options.mime_type.starts_with("video/") {
            return Err(EncoderError::UnsupportedMimeType(options.mime_type.clone()));
        }
        self.shared.encoders_created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SimulatedEncoder {
            mime_type: options.mime_type.clone(),
            state: EncoderState::Inactive,
            sequence: 0,
            layout: format!(
                "v{}a{}",
                stream.video_tracks().count(),
                stream.audio_tracks().count()
            ),
        }))
    }
}
