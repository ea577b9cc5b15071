//! Chunked encoder seam
//!
//! The platform's muxing recorder: it consumes a combined stream and hands
//! back encoded fragments whenever asked to flush.

use crate::capture::traits::MediaStream;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncoderError {
    #[error("Unsupported mime type: {0}")]
    UnsupportedMimeType(String),

    #[error("Invalid encoder state: {0}")]
    InvalidState(String),

    #[error("Encoding error: {0}")]
    Encoding(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderState {
    Inactive,
    Recording,
}

/// Options the encoder is created with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderOptions {
    pub mime_type: String,
    /// Interval between periodic flushes
    pub timeslice: Duration,
}

/// A running muxing recorder
pub trait ChunkEncoder: Send {
    fn mime_type(&self) -> &str;

    fn state(&self) -> EncoderState;

    fn start(&mut self) -> Result<(), EncoderError>;

    /// Flush data encoded since the last flush, if any
    fn request_data(&mut self) -> Result<Option<Vec<u8>>, EncoderError>;

    /// Stop encoding and return the final fragment. A no-op when inactive.
    fn stop(&mut self) -> Result<Option<Vec<u8>>, EncoderError>;
}

/// Factory for encoders
pub trait EncoderBackend: Send + Sync {
    fn create(
        &self,
        stream: &MediaStream,
        options: &EncoderOptions,
    ) -> Result<Box<dyn ChunkEncoder>, EncoderError>;
}
