//! Recorder controller
//!
//! Owns the recording state machine of one recorder instance and drives
//! acquisition, mixing, combining, chunked capture and teardown.
//!
//! Every `start`, `stop` and `reset` supersedes the attempt in flight: an
//! acquisition still waiting on a permission prompt is abandoned and its
//! resources released before the next operation takes the session.
//!
//! Mutating operations are serialized by an operation gate. The session lock
//! is only held for short critical sections, never across a device prompt,
//! so state reads stay responsive while a picker is open.

use super::cleanup::{LiveResources, SharedEncoder};
use super::combiner::{combine, ExtendedStream};
use super::encoder::{EncoderBackend, EncoderOptions};
use super::error::{RecordingError, RecordingResult};
use super::mixer::AudioBackend;
use super::state::{ChunkBuffer, RecorderConfig, RecorderState, RecordingSession, RecordingSummary};
use crate::capture::acquisition::{
    acquire_streams, AcquiredStreams, AcquisitionPolicy, RecordingMode,
};
use crate::capture::simulated::SimulatedPlatform;
use crate::capture::traits::{MediaDevices, MediaStream};
use crate::handoff::{Blob, ObjectUrlRegistry};
use chrono::Utc;
use parking_lot::Mutex as ParkingMutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Events emitted by the recorder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RecorderEvent {
    Started { mode: RecordingMode },
    Stopped { duration_ms: u64, size_bytes: u64 },
    Reset,
    /// Transient, dismissable notification
    Error { message: String },
}

/// Platform seams the controller records through
#[derive(Clone)]
pub struct Platform {
    pub devices: Arc<dyn MediaDevices>,
    pub audio: Arc<dyn AudioBackend>,
    pub encoder: Arc<dyn EncoderBackend>,
}

impl Platform {
    /// Route every seam to the simulated platform
    pub fn simulated(platform: &SimulatedPlatform) -> Self {
        Self {
            devices: Arc::new(platform.clone()),
            audio: Arc::new(platform.clone()),
            encoder: Arc::new(platform.clone()),
        }
    }
}

struct Inner {
    session: RecordingSession,
    live: LiveResources,
}

impl Inner {
    /// Drop the previous recording and release its URL
    fn discard_recording(&mut self, urls: &ObjectUrlRegistry) {
        if let Some(url) = self.session.recorded_video_url.take() {
            urls.revoke_object_url(&url);
        }
        self.session.recorded_blob = None;
        self.session.recording_duration_ms = 0;
        self.session.started_at = None;
        self.session.chunks.lock().clear();
    }
}

/// Recording state machine for one recorder instance
pub struct RecorderController {
    platform: Platform,
    config: RecorderConfig,
    urls: Arc<ObjectUrlRegistry>,
    /// Held for the whole of start, stop and reset
    ops: Mutex<()>,
    inner: Mutex<Inner>,
    attempt: watch::Sender<u64>,
    event_tx: broadcast::Sender<RecorderEvent>,
}

impl RecorderController {
    pub fn new(platform: Platform, config: RecorderConfig) -> Self {
        let urls = Arc::new(ObjectUrlRegistry::new(config.origin.clone()));
        Self::with_url_registry(platform, config, urls)
    }

    /// Share an existing URL registry, e.g. with the upload page
    pub fn with_url_registry(
        platform: Platform,
        config: RecorderConfig,
        urls: Arc<ObjectUrlRegistry>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        let (attempt, _) = watch::channel(0);
        Self {
            platform,
            config,
            urls,
            ops: Mutex::new(()),
            inner: Mutex::new(Inner {
                session: RecordingSession::default(),
                live: LiveResources::default(),
            }),
            attempt,
            event_tx,
        }
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn url_registry(&self) -> &Arc<ObjectUrlRegistry> {
        &self.urls
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecorderEvent> {
        self.event_tx.subscribe()
    }

    /// Start a new attempt id and signal any attempt in flight to give up
    fn supersede(&self) -> u64 {
        let mut id = 0;
        self.attempt.send_modify(|current| {
            *current += 1;
            id = *current;
        });
        id
    }

    /// Start recording. Returns whether capture began.
    ///
    /// A recording in progress is torn down and discarded first. Failures
    /// are classified into a message readable through [`take_error`] and
    /// never propagate.
    ///
    /// [`take_error`]: RecorderController::take_error
    pub async fn start(&self, mode: RecordingMode, with_microphone: bool) -> bool {
        let attempt = self.supersede();
        let _op = self.ops.lock().await;
        if *self.attempt.borrow() != attempt {
            tracing::debug!("Start of attempt {} superseded before acquisition", attempt);
            return false;
        }

        {
            let mut inner = self.inner.lock().await;
            if inner.live.teardown().await.is_some() {
                tracing::info!("Discarded recording in progress");
            }
            inner.discard_recording(&self.urls);
            inner.session.error_message = None;
            inner.session.state = RecorderState::Idle;
        }

        tracing::info!("Starting {} recording (microphone: {})", mode, with_microphone);

        let mut originals: Vec<MediaStream> = Vec::new();
        let acquired = self
            .acquire(attempt, mode, with_microphone, &mut originals)
            .await;

        let mut inner = self.inner.lock().await;
        // Register what was acquired before looking at the outcome so the
        // failure path releases it
        inner.live.stream = Some(ExtendedStream {
            combined: MediaStream::new(),
            originals: originals.clone(),
        });
        let current = *self.attempt.borrow();
        let outcome = match acquired {
            Ok(_) if current != attempt => Err(RecordingError::Cancelled),
            Ok(acquired) => self.begin(&mut inner, mode, acquired, originals).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                inner.session.state = RecorderState::Recording;
                let _ = self.event_tx.send(RecorderEvent::Started { mode });
                tracing::info!(
                    "Recording started with {} live track(s)",
                    inner.live.live_track_count()
                );
                true
            }
            Err(e) => {
                inner.live.teardown().await;
                if e.is_cancellation() {
                    tracing::debug!("Attempt {} cancelled", attempt);
                    inner.session.state = RecorderState::Idle;
                } else {
                    tracing::error!("Recording error: {}", e);
                    let message = e.user_message();
                    inner.session.state = RecorderState::Error;
                    inner.session.error_message = Some(message.clone());
                    let _ = self.event_tx.send(RecorderEvent::Error { message });
                }
                false
            }
        }
    }

    /// Run the device prompts without holding the session, giving up as soon
    /// as a newer attempt is announced
    async fn acquire(
        &self,
        attempt: u64,
        mode: RecordingMode,
        with_microphone: bool,
        originals: &mut Vec<MediaStream>,
    ) -> RecordingResult<AcquiredStreams> {
        let policy = AcquisitionPolicy {
            capture_system_audio: self.config.capture_system_audio,
        };
        let mut cancel = self.attempt.subscribe();

        tokio::select! {
            result = acquire_streams(
                self.platform.devices.as_ref(),
                mode,
                with_microphone,
                policy,
                originals,
            ) => result.map_err(RecordingError::from),
            _ = superseded(&mut cancel, attempt) => Err(RecordingError::Cancelled),
        }
    }

    async fn begin(
        &self,
        inner: &mut Inner,
        mode: RecordingMode,
        acquired: AcquiredStreams,
        originals: Vec<MediaStream>,
    ) -> RecordingResult<()> {
        inner.live.camera = acquired.camera.clone();

        let sources = acquired.audio_sources();
        let mixed = inner
            .live
            .mixer
            .mix(self.platform.audio.as_ref(), &sources, self.config.allow_silence)
            .await?;

        let stream = combine(mode, &acquired, mixed, originals);
        inner.live.stream = Some(stream.clone());

        let options = EncoderOptions {
            mime_type: self.config.mime_type.clone(),
            timeslice: self.config.timeslice(),
        };
        let encoder: SharedEncoder = Arc::new(ParkingMutex::new(
            self.platform.encoder.create(&stream.combined, &options)?,
        ));
        inner.live.encoder = Some(encoder.clone());

        inner.session.chunks.lock().clear();
        encoder.lock().start()?;
        inner.session.started_at = Some(Utc::now());
        inner.live.flush_task = Some(spawn_flush(
            encoder,
            inner.session.chunks.clone(),
            options.timeslice,
        ));
        Ok(())
    }

    /// Stop recording and finalize the blob.
    ///
    /// A no-op when nothing is recording, apart from releasing anything an
    /// abandoned start left behind.
    pub async fn stop(&self) -> RecordingSummary {
        self.supersede();
        let _op = self.ops.lock().await;
        let mut inner = self.inner.lock().await;

        if inner.session.state != RecorderState::Recording {
            inner.live.teardown().await;
            return inner.session.summary();
        }

        if let Some(last) = inner.live.teardown().await {
            if !last.is_empty() {
                inner.session.chunks.lock().push(last);
            }
        }

        let blob = Blob::from_chunks(&inner.session.chunks.lock(), self.config.mime_type.clone());
        let duration_ms = inner.session.elapsed_ms(Utc::now());
        if let Some(previous) = inner.session.recorded_video_url.take() {
            self.urls.revoke_object_url(&previous);
        }
        let url = self.urls.create_object_url(&blob);

        let size_bytes = blob.size() as u64;
        inner.session.recorded_blob = Some(blob);
        inner.session.recorded_video_url = Some(url);
        inner.session.recording_duration_ms = duration_ms;
        inner.session.state = RecorderState::Stopped;

        tracing::info!(
            "Recording stopped. Duration: {}ms, size: {} bytes",
            duration_ms,
            size_bytes
        );
        let _ = self.event_tx.send(RecorderEvent::Stopped {
            duration_ms,
            size_bytes,
        });
        inner.session.summary()
    }

    /// Release everything and return to the idle defaults. Safe when idle.
    pub async fn reset(&self) {
        self.release_all().await;
        let _ = self.event_tx.send(RecorderEvent::Reset);
        tracing::info!("Recorder reset");
    }

    /// Teardown for when the owning view goes away
    pub async fn shutdown(&self) {
        self.release_all().await;
        tracing::debug!("Recorder shut down");
    }

    async fn release_all(&self) {
        self.supersede();
        let _op = self.ops.lock().await;
        let mut inner = self.inner.lock().await;
        inner.live.teardown().await;
        inner.discard_recording(&self.urls);
        inner.session = RecordingSession::default();
    }

    /// Surface the pending error message, clearing it. An errored recorder
    /// returns to idle once its message has been taken.
    pub async fn take_error(&self) -> Option<String> {
        let mut inner = self.inner.lock().await;
        let message = inner.session.error_message.take();
        if inner.session.state == RecorderState::Error {
            inner.session.state = RecorderState::Idle;
        }
        message
    }

    pub async fn state(&self) -> RecorderState {
        self.inner.lock().await.session.state
    }

    pub async fn is_recording(&self) -> bool {
        self.inner.lock().await.session.is_recording()
    }

    pub async fn summary(&self) -> RecordingSummary {
        self.inner.lock().await.session.summary()
    }

    pub async fn recorded_blob(&self) -> Option<Blob> {
        self.inner.lock().await.session.recorded_blob.clone()
    }

    pub async fn recorded_video_url(&self) -> Option<String> {
        self.inner.lock().await.session.recorded_video_url.clone()
    }

    pub async fn recording_duration_ms(&self) -> u64 {
        self.inner.lock().await.session.recording_duration_ms
    }

    /// Bytes flushed so far in the current attempt
    pub async fn buffered_bytes(&self) -> usize {
        self.inner.lock().await.session.buffered_bytes()
    }

    /// Read-only camera stream for preview surfaces
    pub async fn camera_stream(&self) -> Option<MediaStream> {
        self.inner.lock().await.live.camera.clone()
    }

    pub async fn live_track_count(&self) -> usize {
        self.inner.lock().await.live.live_track_count()
    }

    /// Whether any live resource is still held
    pub async fn holds_resources(&self) -> bool {
        !self.inner.lock().await.live.is_empty()
    }
}

impl Drop for RecorderController {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if inner.live.is_empty() && inner.session.recorded_video_url.is_none() {
            return;
        }
        inner.live.abandon();
        inner.discard_recording(&self.urls);
        tracing::debug!("Recorder dropped, resources released");
    }
}

/// Resolves once an attempt newer than `attempt` has been announced
async fn superseded(rx: &mut watch::Receiver<u64>, attempt: u64) {
    loop {
        if *rx.borrow_and_update() != attempt {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Flush the encoder every `timeslice` so partial data survives an abrupt end
fn spawn_flush(encoder: SharedEncoder, chunks: ChunkBuffer, timeslice: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(timeslice);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let flushed = encoder.lock().request_data();
            match flushed {
                Ok(Some(chunk)) if !chunk.is_empty() => chunks.lock().push(chunk),
                Ok(_) => {}
                Err(e) => tracing::warn!("Periodic flush failed: {}", e),
            }
        }
    })
}
