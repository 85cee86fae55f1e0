//! Request/response bodies of the story endpoints
//!
//! Field names follow the wire format exactly (`imageData`, `isCanvas`, ...).

use serde::{Deserialize, Serialize};

use crate::story::StoryEntry;

/// Body for load, delete, and canvas load
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilenameRequest {
    pub filename: String,
}

/// Body for story, character, and canvas saves
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaveRequest {
    /// Content to store: markup, character JSON, or base64 PNG
    pub story: String,
    /// Requested name; the store sanitises it and picks the extension
    pub name: String,
    #[serde(rename = "isCanvas", default, skip_serializing_if = "is_false")]
    pub is_canvas: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuggestionRequest {
    pub text: String,
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageRequest {
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListResponse {
    #[serde(default)]
    pub stories: Vec<StoryEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadResponse {
    #[serde(default)]
    pub content: String,
}

/// The store echoes the key under three spellings; any one may be present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaveResponse {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(rename = "fileName", default, skip_serializing_if = "Option::is_none")]
    pub file_name_camel: Option<String>,
    #[serde(rename = "file_name", default, skip_serializing_if = "Option::is_none")]
    pub file_name_snake: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl SaveResponse {
    /// Key the content was stored under
    pub fn stored_filename(self) -> Option<String> {
        self.filename
            .or(self.file_name_camel)
            .or(self.file_name_snake)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CanvasResponse {
    #[serde(rename = "imageData", default)]
    pub image_data: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuggestionResponse {
    #[serde(default)]
    pub suggestions: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageResponse {
    #[serde(rename = "imageUrl", default)]
    pub image_url: Option<String>,
}
