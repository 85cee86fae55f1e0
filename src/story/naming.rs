//! Filename conventions of the flat story namespace
//!
//! Stories, character sheets, and canvas images share one namespace and are
//! told apart only by suffix:
//!
//! ```text
//! <base>.txt                       story
//! <base>-<character>-character.txt character sheet
//! <base>-canvas.png                story map
//! ```
//!
//! The store sanitises every requested name (anything outside
//! `[a-zA-Z0-9-]` becomes `_`) before appending the extension, so the
//! helpers here mirror that to predict the key a save will produce.

use regex::Regex;
use std::sync::OnceLock;

use super::types::StoryEntry;

/// Extension of story and character files
pub const STORY_EXTENSION: &str = ".txt";
/// Marker appended to a character's store name
pub const CHARACTER_MARKER: &str = "-character";
/// Full suffix of a character file
pub const CHARACTER_SUFFIX: &str = "-character.txt";
/// Marker appended to a canvas store name
pub const CANVAS_MARKER: &str = "-canvas";
/// Extension of canvas images
pub const CANVAS_EXTENSION: &str = ".png";
/// Base used for canvases of stories that have no name yet
pub const FALLBACK_BASE: &str = "story";

fn unsafe_chars() -> &'static Regex {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    UNSAFE.get_or_init(|| Regex::new(r"[^a-zA-Z0-9-]").expect("sanitise pattern is valid"))
}

/// Replace every character the store does not keep with `_`
pub fn sanitize_name(name: &str) -> String {
    unsafe_chars().replace_all(name, "_").into_owned()
}

/// Story base name: the filename without its story extension
pub fn story_base_name(filename: &str) -> &str {
    filename.strip_suffix(STORY_EXTENSION).unwrap_or(filename)
}

/// Key the store assigns to a story saved under `name`
pub fn story_filename(name: &str) -> String {
    format!("{}{}", sanitize_name(name), STORY_EXTENSION)
}

/// True for character sheet keys
pub fn is_character_file(filename: &str) -> bool {
    filename.contains(CHARACTER_SUFFIX)
}

/// Name sent to the store when saving a character of story `base`
pub fn character_store_name(base: &str, character: &str) -> String {
    format!("{}-{}{}", base, character, CHARACTER_MARKER)
}

/// Key the store assigns to a character of story `base`
pub fn character_filename(base: &str, character: &str) -> String {
    story_filename(&character_store_name(base, character))
}

/// Name sent to the store when saving the canvas of story `base`
pub fn canvas_store_name(base: &str) -> String {
    format!("{}{}", base, CANVAS_MARKER)
}

/// Key the store assigns to the canvas of story `base`
pub fn canvas_filename(base: &str) -> String {
    format!("{}{}", sanitize_name(&canvas_store_name(base)), CANVAS_EXTENSION)
}

/// Local download name for an exported canvas
pub fn canvas_export_name(name: &str) -> String {
    let base = if name.trim().is_empty() {
        FALLBACK_BASE
    } else {
        name
    };
    format!("{}-map{}", base, CANVAS_EXTENSION)
}

/// Keep only story entries, dropping character sheets
pub fn filter_story_entries(entries: Vec<StoryEntry>) -> Vec<StoryEntry> {
    entries
        .into_iter()
        .filter(|entry| !is_character_file(&entry.filename))
        .collect()
}

/// Keep only the character sheets belonging to `story_filename`
///
/// The prefix must be exactly `<base>-`, so story `a` does not pick up the
/// characters of story `ab`.
pub fn filter_character_entries(entries: Vec<StoryEntry>, story_filename: &str) -> Vec<StoryEntry> {
    let prefix = format!("{}-", story_base_name(story_filename));
    entries
        .into_iter()
        .filter(|entry| {
            entry.filename.starts_with(&prefix) && entry.filename.ends_with(CHARACTER_SUFFIX)
        })
        .collect()
}

/// Character name shown in the roster for a character key of `story_filename`
pub fn character_display_name<'a>(story_filename: &str, character_filename: &'a str) -> &'a str {
    let prefix = format!("{}-", story_base_name(story_filename));
    let rest = character_filename
        .strip_prefix(prefix.as_str())
        .unwrap_or(character_filename);
    rest.strip_suffix(CHARACTER_SUFFIX).unwrap_or(rest)
}
