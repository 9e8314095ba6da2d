//! Photo storage collaborator. The engine treats photo references as
//! opaque strings; it only ever asks "is one present".

use async_trait::async_trait;
use std::sync::Mutex;
use uuid::Uuid;

#[async_trait]
pub trait PhotoStore: Send + Sync {
    /// Stores raw image bytes and returns an opaque reference.
    async fn upload(&self, image_data: &[u8]) -> anyhow::Result<String>;
}

/// In-memory store for tests and wiring examples.
pub struct MemoryPhotoStore {
    uploads: Mutex<Vec<usize>>,
}

impl MemoryPhotoStore {
    pub fn new() -> Self {
        Self {
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for MemoryPhotoStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PhotoStore for MemoryPhotoStore {
    async fn upload(&self, image_data: &[u8]) -> anyhow::Result<String> {
        self.uploads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(image_data.len());
        Ok(format!("memory://{}", Uuid::new_v4()))
    }
}
