//! Story domain
//!
//! - **types**: stories' listing entries, character sheets, languages, ids
//! - **naming**: filename conventions of the shared namespace

pub mod naming;
pub mod types;

pub use naming::{
    canvas_export_name, canvas_filename, canvas_store_name, character_display_name,
    character_filename, character_store_name, filter_character_entries, filter_story_entries,
    is_character_file, sanitize_name, story_base_name, story_filename, CHARACTER_SUFFIX,
    STORY_EXTENSION,
};
pub use types::{Character, Language, StoryEntry, StoryId, Theme};
