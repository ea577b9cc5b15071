//! Upload orchestration
//!
//! Drives the multi-step upload of a handed-off recording: obtain the video
//! destination, PUT the video, obtain the thumbnail destination, PUT the
//! thumbnail, then persist the metadata record. The CDN and database sit
//! behind [`UploadBackend`].

use super::{Blob, RecordedFile};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

/// Steps of an upload, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStep {
    VideoDestination,
    VideoTransfer,
    ThumbnailDestination,
    ThumbnailTransfer,
    SaveDetails,
}

impl fmt::Display for UploadStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadStep::VideoDestination => write!(f, "Getting video upload credentials"),
            UploadStep::VideoTransfer => write!(f, "Uploading video"),
            UploadStep::ThumbnailDestination => write!(f, "Getting thumbnail upload credentials"),
            UploadStep::ThumbnailTransfer => write!(f, "Uploading thumbnail"),
            UploadStep::SaveDetails => write!(f, "Saving video details"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("Please upload video and thumbnail")]
    MissingFile,

    #[error("Please fill in all the details")]
    MissingDetails,

    #[error("{step} failed: {message}")]
    Step { step: UploadStep, message: String },
}

/// Where and how to PUT the video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoUploadTarget {
    pub video_id: String,
    pub upload_url: String,
    pub access_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailUploadTarget {
    pub upload_url: String,
    pub access_key: String,
    pub cdn_url: String,
}

/// Metadata record persisted once both files are uploaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetails {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub visibility: Visibility,
    pub thumbnail_url: String,
    pub duration: Option<u64>,
}

/// Fields the user fills in on the upload form
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UploadForm {
    pub title: String,
    pub description: String,
    pub visibility: Visibility,
}

/// CDN and persistence surface used by the upload
#[async_trait]
pub trait UploadBackend: Send + Sync {
    async fn video_upload_target(&self) -> Result<VideoUploadTarget, String>;

    async fn thumbnail_upload_target(
        &self,
        video_id: &str,
        file_name: &str,
    ) -> Result<ThumbnailUploadTarget, String>;

    async fn put(&self, url: &str, access_key: &str, body: &Blob) -> Result<(), String>;

    async fn save_details(&self, details: &VideoDetails) -> Result<(), String>;
}

/// Storage object name for a video's thumbnail
pub fn thumbnail_file_name(video_id: &str, now: DateTime<Utc>) -> String {
    format!(
        "{}-{}-thumbnail",
        now.timestamp_millis(),
        urlencoding::encode(video_id)
    )
}

fn step_err(step: UploadStep) -> impl FnOnce(String) -> UploadError {
    move |message| UploadError::Step { step, message }
}

/// Upload `video` and `thumbnail`, then save the details. Returns the video id.
pub async fn upload_recording(
    backend: &dyn UploadBackend,
    video: Option<&RecordedFile>,
    thumbnail: Option<&Blob>,
    form: &UploadForm,
    now: DateTime<Utc>,
) -> Result<String, UploadError> {
    let (Some(video), Some(thumbnail)) = (video, thumbnail) else {
        return Err(UploadError::MissingFile);
    };
    if form.title.trim().is_empty() || form.description.trim().is_empty() {
        return Err(UploadError::MissingDetails);
    }

    let target = backend
        .video_upload_target()
        .await
        .map_err(step_err(UploadStep::VideoDestination))?;
    if target.upload_url.is_empty() || target.access_key.is_empty() {
        return Err(UploadError::Step {
            step: UploadStep::VideoDestination,
            message: "missing upload URL or access key".to_string(),
        });
    }
    tracing::debug!("Uploading video {} ({} bytes)", target.video_id, video.size());

    backend
        .put(&target.upload_url, &target.access_key, &video.blob)
        .await
        .map_err(step_err(UploadStep::VideoTransfer))?;

    let file_name = thumbnail_file_name(&target.video_id, now);
    let thumb = backend
        .thumbnail_upload_target(&target.video_id, &file_name)
        .await
        .map_err(step_err(UploadStep::ThumbnailDestination))?;
    if thumb.upload_url.is_empty() || thumb.access_key.is_empty() || thumb.cdn_url.is_empty() {
        return Err(UploadError::Step {
            step: UploadStep::ThumbnailDestination,
            message: "missing upload URL, access key or CDN URL".to_string(),
        });
    }

    backend
        .put(&thumb.upload_url, &thumb.access_key, thumbnail)
        .await
        .map_err(step_err(UploadStep::ThumbnailTransfer))?;

    let details = VideoDetails {
        video_id: target.video_id.clone(),
        title: form.title.clone(),
        description: form.description.clone(),
        visibility: form.visibility,
        thumbnail_url: thumb.cdn_url,
        duration: video.duration_secs,
    };
    backend
        .save_details(&details)
        .await
        .map_err(step_err(UploadStep::SaveDetails))?;

    tracing::info!("Uploaded video {}", target.video_id);
    Ok(target.video_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingBackend {
        calls: Mutex<Vec<String>>,
        saved: Mutex<Option<VideoDetails>>,
        fail_thumbnail_put: bool,
    }

    #[async_trait]
    impl UploadBackend for RecordingBackend {
        async fn video_upload_target(&self) -> Result<VideoUploadTarget, String> {
            self.calls.lock().push("video-target".to_string());
            Ok(VideoUploadTarget {
                video_id: "vid 1".to_string(),
                upload_url: "https://stream.test/videos/vid1".to_string(),
                access_key: "stream-key".to_string(),
            })
        }

        async fn thumbnail_upload_target(
            &self,
            video_id: &str,
            file_name: &str,
        ) -> Result<ThumbnailUploadTarget, String> {
            self.calls
                .lock()
                .push(format!("thumbnail-target {video_id} {file_name}"));
            Ok(ThumbnailUploadTarget {
                upload_url: format!("https://storage.test/thumbnails/{file_name}"),
                access_key: "storage-key".to_string(),
                cdn_url: format!("https://cdn.test/thumbnails/{file_name}"),
            })
        }

        async fn put(&self, url: &str, access_key: &str, body: &Blob) -> Result<(), String> {
            self.calls
                .lock()
                .push(format!("put {url} {access_key} {}", body.size()));
            if self.fail_thumbnail_put && access_key == "storage-key" {
                return Err("503".to_string());
            }
            Ok(())
        }

        async fn save_details(&self, details: &VideoDetails) -> Result<(), String> {
            self.calls.lock().push("save".to_string());
            *self.saved.lock() = Some(details.clone());
            Ok(())
        }
    }

    fn recorded() -> RecordedFile {
        RecordedFile {
            name: "screen-recording.webm".to_string(),
            mime_type: "video/webm".to_string(),
            blob: Blob::new(vec![0; 16], "video/webm"),
            duration_secs: Some(12),
            last_modified: Utc::now(),
        }
    }

    fn form() -> UploadForm {
        UploadForm {
            title: "Demo".to_string(),
            description: "A short demo".to_string(),
            visibility: Visibility::Private,
        }
    }

    #[tokio::test]
    async fn test_upload_runs_steps_in_order() {
        let backend = RecordingBackend::default();
        let thumbnail = Blob::new(vec![0; 4], "image/png");
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();

        let id = upload_recording(&backend, Some(&recorded()), Some(&thumbnail), &form(), now)
            .await
            .unwrap();

        assert_eq!(id, "vid 1");
        let calls = backend.calls.lock().clone();
        assert_eq!(
            calls,
            vec![
                "video-target".to_string(),
                "put https://stream.test/videos/vid1 stream-key 16".to_string(),
                "thumbnail-target vid 1 1700000000000-vid%201-thumbnail".to_string(),
                "put https://storage.test/thumbnails/1700000000000-vid%201-thumbnail storage-key 4"
                    .to_string(),
                "save".to_string(),
            ]
        );
        let saved = backend.saved.lock().clone().unwrap();
        assert_eq!(saved.duration, Some(12));
        assert_eq!(saved.visibility, Visibility::Private);
    }

    #[tokio::test]
    async fn test_upload_validates_before_any_request() {
        let backend = RecordingBackend::default();
        let thumbnail = Blob::new(vec![0; 4], "image/png");

        let missing = upload_recording(&backend, None, Some(&thumbnail), &form(), Utc::now()).await;
        let blank = upload_recording(
            &backend,
            Some(&recorded()),
            Some(&thumbnail),
            &UploadForm::default(),
            Utc::now(),
        )
        .await;

        assert_eq!(missing.unwrap_err(), UploadError::MissingFile);
        assert_eq!(blank.unwrap_err(), UploadError::MissingDetails);
        assert!(backend.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_upload_stops_at_failed_step() {
        let backend = RecordingBackend {
            fail_thumbnail_put: true,
            ..Default::default()
        };
        let thumbnail = Blob::new(vec![0; 4], "image/png");

        let err = upload_recording(&backend, Some(&recorded()), Some(&thumbnail), &form(), Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            UploadError::Step {
                step: UploadStep::ThumbnailTransfer,
                ..
            }
        ));
        assert!(backend.saved.lock().is_none());
    }
}
