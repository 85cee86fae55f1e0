//! In-memory story store
//!
//! Behaves like the hosted store: names are sanitised, `.txt` or `.png` is
//! appended, the listing only returns `.txt` keys, and missing keys are
//! reported as not found. Used for offline sessions and tests.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use super::error::{RemoteError, RemoteResult};
use super::RemoteService;
use crate::story::naming::{sanitize_name, CANVAS_EXTENSION, STORY_EXTENSION};
use crate::story::{Language, StoryEntry};

/// A stored object
#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    modified: DateTime<Utc>,
}

/// In-process implementation of [`RemoteService`]
#[derive(Debug, Default)]
pub struct MemoryRemote {
    objects: RwLock<BTreeMap<String, StoredObject>>,
    suggestion_reply: Option<String>,
    image_reply: Option<String>,
    calls: AtomicUsize,
}

impl MemoryRemote {
    /// Create an empty store without generators
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: answer every suggestion request with `reply`
    pub fn with_suggestions(mut self, reply: impl Into<String>) -> Self {
        self.suggestion_reply = Some(reply.into());
        self
    }

    /// Builder method: answer every image request with `url`
    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_reply = Some(url.into());
        self
    }

    /// Put an object under an exact key, bypassing name sanitising
    pub fn insert(&self, filename: impl Into<String>, content: impl Into<Vec<u8>>) {
        let object = StoredObject {
            bytes: content.into(),
            modified: Utc::now(),
        };
        self.write_objects().insert(filename.into(), object);
    }

    /// Raw bytes stored under `filename`
    pub fn get(&self, filename: &str) -> Option<Vec<u8>> {
        self.read_objects().get(filename).map(|o| o.bytes.clone())
    }

    /// Number of service calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn read_objects(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, StoredObject>> {
        self.objects.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_objects(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, StoredObject>> {
        self.objects.write().unwrap_or_else(|e| e.into_inner())
    }

    fn bad_request(message: impl Into<String>) -> RemoteError {
        RemoteError::Api {
            status: 400,
            message: message.into(),
        }
    }

    /// Store under the sanitised name, the way the hosted save function does
    fn store(&self, name: &str, content: &str, is_canvas: bool) -> RemoteResult<String> {
        if name.is_empty() || content.is_empty() {
            return Err(Self::bad_request("Story name and content are required"));
        }

        // The hosted store also treats any name mentioning "canvas" as an image.
        let canvas = is_canvas || name.to_lowercase().contains("canvas");
        let (extension, bytes) = if canvas {
            let bytes = BASE64
                .decode(content)
                .map_err(|e| Self::bad_request(format!("Invalid base64 data: {}", e)))?;
            (CANVAS_EXTENSION, bytes)
        } else {
            (STORY_EXTENSION, content.as_bytes().to_vec())
        };

        let filename = format!("{}{}", sanitize_name(name), extension);
        self.insert(filename.clone(), bytes);
        Ok(filename)
    }
}

#[async_trait]
impl RemoteService for MemoryRemote {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list(&self) -> RemoteResult<Vec<StoryEntry>> {
        self.record_call();
        let entries = self
            .read_objects()
            .iter()
            .filter(|(key, _)| key.ends_with(STORY_EXTENSION))
            .map(|(key, object)| StoryEntry {
                filename: key.clone(),
                last_modified: Some(object.modified),
                size: Some(object.bytes.len() as u64),
            })
            .collect();
        Ok(entries)
    }

    async fn load(&self, filename: &str) -> RemoteResult<String> {
        self.record_call();
        if filename.is_empty() {
            return Err(Self::bad_request("filename required"));
        }
        let bytes = self
            .get(filename)
            .ok_or_else(|| RemoteError::NotFound("File not found".to_string()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn save(&self, name: &str, content: &str) -> RemoteResult<String> {
        self.record_call();
        self.store(name, content, false)
    }

    async fn delete(&self, filename: &str) -> RemoteResult<()> {
        self.record_call();
        if filename.is_empty() {
            return Err(Self::bad_request("filename required"));
        }
        match self.write_objects().remove(filename) {
            Some(_) => Ok(()),
            None => Err(RemoteError::NotFound("File not found".to_string())),
        }
    }

    async fn save_canvas(&self, name: &str, png_base64: &str) -> RemoteResult<String> {
        self.record_call();
        self.store(name, png_base64, true)
    }

    async fn load_canvas(&self, filename: &str) -> RemoteResult<Option<String>> {
        self.record_call();
        if filename.is_empty() {
            return Err(Self::bad_request("filename required"));
        }
        let bytes = self
            .get(filename)
            .ok_or_else(|| RemoteError::NotFound("Canvas not found".to_string()))?;
        if bytes.is_empty() {
            return Ok(None);
        }
        Ok(Some(BASE64.encode(bytes)))
    }

    async fn suggestions(&self, text: &str, _language: Language) -> RemoteResult<Option<String>> {
        self.record_call();
        if text.is_empty() {
            return Err(Self::bad_request("text required"));
        }
        match &self.suggestion_reply {
            Some(reply) => Ok(Some(reply.clone())),
            None => Err(RemoteError::Unsupported("suggestions")),
        }
    }

    async fn generate_image(&self, text: &str) -> RemoteResult<Option<String>> {
        self.record_call();
        if text.is_empty() {
            return Err(Self::bad_request("text required"));
        }
        match &self.image_reply {
            Some(url) => Ok(Some(url.clone())),
            None => Err(RemoteError::Unsupported("image generation")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_sanitises_and_lists() {
        let remote = MemoryRemote::new();
        let key = remote.save("My Tale", "<p>Once</p>").await.unwrap();
        assert_eq!(key, "My_Tale.txt");

        let entries = remote.list().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].size, Some(11));
        assert_eq!(remote.load("My_Tale.txt").await.unwrap(), "<p>Once</p>");
    }

    #[tokio::test]
    async fn test_save_requires_name_and_content() {
        let remote = MemoryRemote::new();
        let err = remote.save("", "x").await.unwrap_err();
        assert!(matches!(err, RemoteError::Api { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_canvas_not_listed() {
        let remote = MemoryRemote::new();
        let key = remote.save_canvas("a-canvas", &BASE64.encode([1u8, 2, 3])).await.unwrap();
        assert_eq!(key, "a-canvas.png");
        assert!(remote.list().await.unwrap().is_empty());

        let data = remote.load_canvas("a-canvas.png").await.unwrap().unwrap();
        assert_eq!(BASE64.decode(data).unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_canvas_name_needs_base64() {
        let remote = MemoryRemote::new();
        let err = remote.save("canvas ideas", "not base64!").await.unwrap_err();
        assert!(matches!(err, RemoteError::Api { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_missing_keys() {
        let remote = MemoryRemote::new();
        assert!(matches!(remote.load("x.txt").await, Err(RemoteError::NotFound(_))));
        assert!(matches!(remote.delete("x.txt").await, Err(RemoteError::NotFound(_))));
        assert!(matches!(
            remote.load_canvas("x-canvas.png").await,
            Err(RemoteError::NotFound(ref m)) if m == "Canvas not found"
        ));
    }

    #[tokio::test]
    async fn test_generators_default_unsupported() {
        let remote = MemoryRemote::new();
        assert!(matches!(
            remote.suggestions("a", Language::English).await,
            Err(RemoteError::Unsupported(_))
        ));

        let remote = MemoryRemote::new().with_suggestions("ideas").with_image_url("u");
        assert_eq!(remote.suggestions("a", Language::English).await.unwrap().as_deref(), Some("ideas"));
        assert_eq!(remote.generate_image("a").await.unwrap().as_deref(), Some("u"));
        assert_eq!(remote.calls(), 2);
    }
}
