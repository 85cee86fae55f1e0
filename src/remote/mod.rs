//! Remote Story Service
//!
//! Every durable thing lives behind a handful of hosted functions: a flat
//! key/value store for stories, character sheets, and canvas images, plus
//! two generators (writing suggestions and story illustrations).
//!
//! ## Architecture
//!
//! - **RemoteService**: the trait sessions are written against
//! - **HttpRemote**: `reqwest` client for the hosted endpoints
//! - **MemoryRemote**: in-process store with the same naming rules
//! - **envelope**: unwraps the string-encoded response bodies

mod client;
mod dto;
pub mod envelope;
mod error;
mod memory;

pub use client::HttpRemote;
pub use dto::{
    CanvasResponse, FilenameRequest, ImageRequest, ImageResponse, ListResponse, LoadResponse,
    SaveRequest, SaveResponse, SuggestionRequest, SuggestionResponse,
};
pub use error::{RemoteError, RemoteResult};
pub use memory::MemoryRemote;

use async_trait::async_trait;

use crate::story::{Language, StoryEntry};

/// Operations offered by the story backend
///
/// Each call is independent: no call depends on another having happened,
/// and none is retried.
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Enumerate the namespace (story-extension keys only)
    async fn list(&self) -> RemoteResult<Vec<StoryEntry>>;

    /// Fetch the text stored under `filename`
    async fn load(&self, filename: &str) -> RemoteResult<String>;

    /// Store text under `name`, returning the key the store chose
    async fn save(&self, name: &str, content: &str) -> RemoteResult<String>;

    /// Remove `filename`
    async fn delete(&self, filename: &str) -> RemoteResult<()>;

    /// Store a base64 PNG under `name`, returning the key the store chose
    async fn save_canvas(&self, name: &str, png_base64: &str) -> RemoteResult<String>;

    /// Fetch a canvas image as base64; `None` when the payload was empty
    async fn load_canvas(&self, filename: &str) -> RemoteResult<Option<String>>;

    /// Writing ideas for `text`; `None` when the generator had nothing
    async fn suggestions(&self, text: &str, language: Language) -> RemoteResult<Option<String>>;

    /// Illustration URL for `text`; `None` when the generator had nothing
    async fn generate_image(&self, text: &str) -> RemoteResult<Option<String>>;
}
