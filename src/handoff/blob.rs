//! Immutable recording blobs and the object-URL registry that makes them
//! dereferenceable by players and the upload page.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Finalized recording bytes. Cloning shares the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    bytes: Arc<[u8]>,
    mime_type: String,
}

impl Blob {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Concatenate chunks in order
    pub fn from_chunks(chunks: &[Vec<u8>], mime_type: impl Into<String>) -> Self {
        Self::new(chunks.concat(), mime_type)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Issues `blob:` URLs for blobs and resolves them until revoked
#[derive(Debug)]
pub struct ObjectUrlRegistry {
    origin: String,
    urls: RwLock<HashMap<String, Blob>>,
}

impl ObjectUrlRegistry {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into().trim_end_matches('/').to_string(),
            urls: RwLock::new(HashMap::new()),
        }
    }

    /// Issue a fresh URL for `blob`. Every call yields a distinct URL.
    pub fn create_object_url(&self, blob: &Blob) -> String {
        let url = format!("blob:{}/{}", self.origin, Uuid::new_v4());
        self.urls.write().insert(url.clone(), blob.clone());
        tracing::trace!("Created object URL {} ({} bytes)", url, blob.size());
        url
    }

    pub fn resolve(&self, url: &str) -> Option<Blob> {
        self.urls.read().get(url).cloned()
    }

    /// Release a URL. Revoking an unknown or already revoked URL does nothing.
    pub fn revoke_object_url(&self, url: &str) {
        if self.urls.write().remove(url).is_some() {
            tracing::trace!("Revoked object URL {}", url);
        }
    }

    /// Number of URLs that still resolve
    pub fn live_count(&self) -> usize {
        self.urls.read().len()
    }
}

impl Default for ObjectUrlRegistry {
    fn default() -> Self {
        Self::new("http://localhost:3000")
    }
}
