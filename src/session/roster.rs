//! Character Roster
//!
//! Character sheets of the current story plus the one sheet being edited.
//! The roster is always re-derived from a full namespace listing filtered
//! by the story's base name.

use crate::story::{
    character_display_name, character_store_name, filter_character_entries, story_base_name,
    Character, StoryEntry,
};

use super::ticket::{Generation, Ticket};

pub const NEEDS_STORY: &str = "Save a story first!";
pub const NEEDS_NAME: &str = "Character name required!";
pub const ENCODE_FAILED: &str = "Error encoding character data";

/// Validated character save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCharacter {
    pub ticket: Ticket,
    /// Name sent to the store, before sanitising
    pub store_name: String,
    /// The sheet as JSON
    pub payload: String,
}

#[derive(Debug, Default)]
pub struct CharacterRoster {
    story: Option<String>,
    entries: Vec<StoryEntry>,
    current: Character,
    listings: Generation,
    loads: Generation,
    saves: Generation,
}

impl CharacterRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Character files of the listed story
    pub fn entries(&self) -> &[StoryEntry] {
        &self.entries
    }

    /// Character names as shown in the roster
    pub fn names(&self) -> Vec<&str> {
        let story = self.story.as_deref().unwrap_or_default();
        self.entries
            .iter()
            .map(|entry| character_display_name(story, &entry.filename))
            .collect()
    }

    pub fn current(&self) -> &Character {
        &self.current
    }

    /// Set one field of the sheet being edited
    pub fn set_field(&mut self, field: &str, value: impl Into<String>) -> bool {
        self.current.set_field(field, value)
    }

    pub fn set_current(&mut self, character: Character) {
        self.current = character;
    }

    /// Reset the sheet being edited; the roster is untouched
    pub fn clear(&mut self) {
        self.current = Character::default();
        self.loads.invalidate();
    }

    /// Start listing characters of `story`. With no story the roster is
    /// emptied and no request is needed.
    pub fn begin_list(&mut self, story: Option<&str>) -> Option<Ticket> {
        match story {
            Some(filename) => {
                tracing::trace!(story = filename, "Listing characters");
                Some(self.listings.issue())
            }
            None => {
                self.listings.invalidate();
                self.story = None;
                self.entries.clear();
                None
            }
        }
    }

    pub fn is_current_list(&self, ticket: Ticket) -> bool {
        self.listings.is_current(ticket)
    }

    pub fn finish_list(&mut self, ticket: Ticket, story: &str, entries: Vec<StoryEntry>) -> bool {
        if !self.listings.is_current(ticket) {
            return false;
        }
        self.entries = filter_character_entries(entries, story);
        self.story = Some(story.to_string());
        true
    }

    /// Validate and serialise the sheet for the story `story`
    pub fn begin_save(&mut self, story: Option<&str>) -> Result<PendingCharacter, &'static str> {
        let story = story.ok_or(NEEDS_STORY)?;
        let name = self.current.name.trim();
        if name.is_empty() {
            return Err(NEEDS_NAME);
        }
        let store_name = character_store_name(story_base_name(story), name);
        let payload = serde_json::to_string(&self.current).map_err(|_| ENCODE_FAILED)?;
        Ok(PendingCharacter {
            ticket: self.saves.issue(),
            store_name,
            payload,
        })
    }

    pub fn begin_load(&mut self) -> Ticket {
        self.loads.issue()
    }

    pub fn is_current_load(&self, ticket: Ticket) -> bool {
        self.loads.is_current(ticket)
    }

    /// Parse a stored sheet into the editor. `Ok(false)` for stale loads;
    /// a malformed sheet leaves the current one untouched.
    pub fn finish_load(&mut self, ticket: Ticket, content: &str) -> Result<bool, serde_json::Error> {
        if !self.loads.is_current(ticket) {
            return Ok(false);
        }
        self.current = serde_json::from_str(content)?;
        Ok(true)
    }
}
