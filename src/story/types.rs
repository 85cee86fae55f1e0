//! Core data types for stories and their companion artifacts
//!
//! - `StoryEntry`: one item of the remote namespace listing
//! - `Character`: a character sheet attached to a story
//! - `Language`: languages the suggestion endpoint understands
//! - `StoryId`: session identity for a story being edited
//! - `Theme`: light/dark preference shared by every view

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// One entry of the flat remote namespace
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoryEntry {
    /// Storage key, e.g. `my_tale.txt`
    pub filename: String,
    /// When the store last wrote this key
    #[serde(default, rename = "lastModified")]
    pub last_modified: Option<DateTime<Utc>>,
    /// Size in bytes
    #[serde(default)]
    pub size: Option<u64>,
}

impl StoryEntry {
    /// Entry with only a filename (no store metadata)
    pub fn named(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            last_modified: None,
            size: None,
        }
    }
}

/// A character sheet
///
/// Persisted as JSON text under a filename derived from the owning story.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Character {
    pub name: String,
    pub age: String,
    pub description: String,
    pub traits: String,
    pub backstory: String,
}

impl Character {
    /// Create a character with just a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder method: set age
    pub fn age(mut self, age: impl Into<String>) -> Self {
        self.age = age.into();
        self
    }

    /// Builder method: set physical description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Builder method: set personality traits
    pub fn traits(mut self, traits: impl Into<String>) -> Self {
        self.traits = traits.into();
        self
    }

    /// Builder method: set backstory
    pub fn backstory(mut self, backstory: impl Into<String>) -> Self {
        self.backstory = backstory.into();
        self
    }

    /// Set one field by its sheet label. Returns false for unknown fields.
    pub fn set_field(&mut self, field: &str, value: impl Into<String>) -> bool {
        let slot = match field.to_ascii_lowercase().as_str() {
            "name" => &mut self.name,
            "age" => &mut self.age,
            "description" | "desc" => &mut self.description,
            "traits" => &mut self.traits,
            "backstory" => &mut self.backstory,
            _ => return false,
        };
        *slot = value.into();
        true
    }

    /// True when every field is empty
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Languages offered for writing suggestions
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Language {
    #[default]
    English,
    Spanish,
    French,
    German,
    Italian,
    Portuguese,
    Japanese,
    Chinese,
    Korean,
    Russian,
}

impl Language {
    pub const ALL: [Language; 10] = [
        Language::English,
        Language::Spanish,
        Language::French,
        Language::German,
        Language::Italian,
        Language::Portuguese,
        Language::Japanese,
        Language::Chinese,
        Language::Korean,
        Language::Russian,
    ];

    /// Tag sent to the suggestion endpoint
    pub fn tag(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Spanish => "Spanish",
            Language::French => "French",
            Language::German => "German",
            Language::Italian => "Italian",
            Language::Portuguese => "Portuguese",
            Language::Japanese => "Japanese",
            Language::Chinese => "Chinese",
            Language::Korean => "Korean",
            Language::Russian => "Russian",
        }
    }

    /// Name of the language in itself
    pub fn native_label(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Spanish => "Español",
            Language::French => "Français",
            Language::German => "Deutsch",
            Language::Italian => "Italiano",
            Language::Portuguese => "Português",
            Language::Japanese => "日本語",
            Language::Chinese => "中文",
            Language::Korean => "한국어",
            Language::Russian => "Русский",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Language::ALL
            .into_iter()
            .find(|lang| {
                lang.tag().eq_ignore_ascii_case(wanted) || lang.native_label() == wanted
            })
            .ok_or_else(|| format!("Unknown language: {}", wanted))
    }
}

/// Identity of one story editing session
///
/// Assigned when a story is started or loaded and carried on every event
/// about it, independent of the editable name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoryId(Uuid);

impl StoryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Colour theme
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }

    pub fn from_dark_mode(dark: bool) -> Self {
        if dark {
            Theme::Dark
        } else {
            Theme::Light
        }
    }
}
