//! Recording system module
//!
//! This module implements the recording pipeline:
//! - AudioMixer to sum every input audio track into one
//! - Stream combiner producing the recordable stream plus its originals
//! - ChunkEncoder seam for the platform's muxing recorder
//! - RecorderController owning the state machine and teardown

pub mod cleanup;
pub mod combiner;
pub mod controller;
pub mod encoder;
pub mod error;
pub mod mixer;
pub mod state;

pub use combiner::ExtendedStream;
pub use controller::{Platform, RecorderController, RecorderEvent};
pub use error::{RecordingError, RecordingResult};
pub use state::{RecorderConfig, RecorderState, RecordingSession, RecordingSummary};
