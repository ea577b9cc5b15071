//! Upload handoff
//!
//! The recorder passes a finished recording to the upload page through
//! transient storage: a JSON record holding a `blob:` URL and the file's
//! metadata, stored under a fixed key. The upload page turns it back into a
//! file, removes the record and revokes the URL.

pub mod blob;
pub mod storage;
pub mod upload;

pub use blob::{Blob, ObjectUrlRegistry};
pub use storage::{MemorySessionStorage, SessionStorage};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Storage key the upload page reads
pub const HANDOFF_KEY: &str = "recordedVideo";

/// File name given to recordings handed to the upload page
pub const DEFAULT_FILE_NAME: &str = "screen-recording.webm";

#[derive(Error, Debug)]
pub enum HandoffError {
    #[error("Nothing has been recorded yet")]
    NoRecording,

    #[error("Recorded video URL no longer resolves: {0}")]
    UrlRevoked(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The record stored under [`HANDOFF_KEY`]. Field names are shared with the
/// upload page and must not change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedVideoHandoff {
    pub url: String,
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub size: u64,
    /// Whole seconds
    pub duration: u64,
}

/// A recording reconstructed on the upload side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedFile {
    pub name: String,
    pub mime_type: String,
    pub blob: Blob,
    pub duration_secs: Option<u64>,
    pub last_modified: DateTime<Utc>,
}

impl RecordedFile {
    pub fn size(&self) -> usize {
        self.blob.size()
    }

    /// Name used when the recording is saved locally instead of uploaded
    pub fn download_name(now: DateTime<Utc>) -> String {
        format!(
            "recording-{}.webm",
            now.to_rfc3339_opts(SecondsFormat::Millis, true)
        )
    }

    /// Write the recording into `dir` under its download name
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, HandoffError> {
        fs::create_dir_all(dir)?;
        // Colons are not valid in file names on every platform
        let name = Self::download_name(self.last_modified).replace(':', "-");
        let path = dir.join(name);
        fs::write(&path, self.blob.bytes())?;
        tracing::info!("Saved recording to {:?} ({} bytes)", path, self.blob.size());
        Ok(path)
    }
}

fn whole_seconds(duration_ms: u64) -> u64 {
    (duration_ms + 500) / 1000
}

/// Store `blob` for the upload page under `key`.
///
/// A fresh URL is issued for the handoff so the recorder can release its own
/// preview URL independently.
pub fn stash_recording(
    storage: &dyn SessionStorage,
    registry: &ObjectUrlRegistry,
    key: &str,
    blob: &Blob,
    name: &str,
    duration_ms: u64,
) -> Result<RecordedVideoHandoff, HandoffError> {
    let url = registry.create_object_url(blob);
    let record = RecordedVideoHandoff {
        url,
        name: name.to_string(),
        mime_type: blob.mime_type().to_string(),
        size: blob.size() as u64,
        duration: whole_seconds(duration_ms),
    };

    match serde_json::to_string(&record) {
        Ok(json) => {
            if let Some(previous) = storage.get_item(key) {
                release_stale_record(registry, &previous);
            }
            storage.set_item(key, json);
            tracing::info!("Handed off recording {} ({} bytes)", record.name, record.size);
            Ok(record)
        }
        Err(e) => {
            registry.revoke_object_url(&record.url);
            Err(e.into())
        }
    }
}

/// Revoke the URL of a record about to be overwritten
fn release_stale_record(registry: &ObjectUrlRegistry, stored: &str) {
    match serde_json::from_str::<RecordedVideoHandoff>(stored) {
        Ok(stale) => {
            registry.revoke_object_url(&stale.url);
            tracing::debug!("Replaced handed-off recording {}", stale.name);
        }
        Err(e) => tracing::warn!("Overwriting unreadable handoff record: {}", e),
    }
}

/// Take the recording stored under `key`, if any.
///
/// On success the record is removed and its URL revoked. A malformed record
/// or dead URL is reported and left in place.
pub fn take_recording(
    storage: &dyn SessionStorage,
    registry: &ObjectUrlRegistry,
    key: &str,
) -> Result<Option<RecordedFile>, HandoffError> {
    let Some(stored) = storage.get_item(key) else {
        return Ok(None);
    };

    let record: RecordedVideoHandoff = serde_json::from_str(&stored)?;
    let blob = registry
        .resolve(&record.url)
        .ok_or_else(|| HandoffError::UrlRevoked(record.url.clone()))?;

    storage.remove_item(key);
    registry.revoke_object_url(&record.url);

    Ok(Some(RecordedFile {
        name: record.name,
        mime_type: record.mime_type,
        blob,
        duration_secs: (record.duration > 0).then_some(record.duration),
        last_modified: Utc::now(),
    }))
}
