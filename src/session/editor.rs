//! Editor Session
//!
//! Text, name, and listing state of the story being written. Every remote
//! operation is split in two: a `begin_*` call that validates and hands
//! out a [`Ticket`], and a `finish_*` call that applies the result only if
//! that ticket is still the latest for its resource.

use crate::markup;
use crate::story::{filter_story_entries, story_base_name, Language, StoryEntry, StoryId};

use super::ticket::{Generation, Ticket};

pub const NOTHING_TO_SAVE: &str = "Nothing to save!";
pub const NOTHING_TO_DELETE: &str = "No story selected to delete!";
pub const SUGGESTIONS_NEED_TEXT: &str = "Write some text first to get suggestions!";
pub const IMAGE_NEEDS_TEXT: &str = "Write some text first to generate an image!";

/// Validated save request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSave {
    pub ticket: Ticket,
    pub name: String,
    pub content: String,
}

/// Validated request carrying the story's plain text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingText {
    pub ticket: Ticket,
    pub text: String,
    pub language: Language,
}

/// In-memory state of the story editor
#[derive(Debug)]
pub struct EditorSession {
    content: String,
    name: String,
    current: Option<String>,
    word_count: usize,
    suggestions: Option<String>,
    image_url: Option<String>,
    language: Language,
    story_id: StoryId,
    stories: Vec<StoryEntry>,
    widget_mounted: bool,

    loads: Generation,
    listings: Generation,
    saves: Generation,
    deletes: Generation,
    suggestion_requests: Generation,
    image_requests: Generation,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new(Language::default())
    }
}

impl EditorSession {
    pub fn new(language: Language) -> Self {
        Self {
            content: String::new(),
            name: String::new(),
            current: None,
            word_count: 0,
            suggestions: None,
            image_url: None,
            language,
            story_id: StoryId::new(),
            stories: Vec::new(),
            widget_mounted: false,
            loads: Generation::new(),
            listings: Generation::new(),
            saves: Generation::new(),
            deletes: Generation::new(),
            suggestion_requests: Generation::new(),
            image_requests: Generation::new(),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Filename of the current story
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn word_count(&self) -> usize {
        self.word_count
    }

    pub fn suggestions(&self) -> Option<&str> {
        self.suggestions.as_deref()
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn story_id(&self) -> StoryId {
        self.story_id
    }

    /// Story entries from the last listing, character sheets excluded
    pub fn stories(&self) -> &[StoryEntry] {
        &self.stories
    }

    pub fn is_widget_mounted(&self) -> bool {
        self.widget_mounted
    }

    pub fn mount_widget(&mut self) {
        self.widget_mounted = true;
    }

    pub fn unmount_widget(&mut self) {
        self.widget_mounted = false;
    }

    /// Replace the story markup and recount words
    pub fn set_content(&mut self, markup: impl Into<String>) {
        self.content = markup.into();
        self.word_count = markup::count_words(&self.content);
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_language(&mut self, language: Language) {
        self.language = language;
    }

    /// Base name of the current story
    pub fn current_base(&self) -> Option<&str> {
        self.current.as_deref().map(story_base_name)
    }

    /// Base used to address the canvas of a load. The current story wins
    /// over the name field; `None` when neither is set.
    pub fn canvas_base(&self) -> Option<String> {
        if let Some(base) = self.current_base() {
            return Some(base.to_string());
        }
        let name = self.name.trim();
        (!name.is_empty()).then(|| name.to_string())
    }

    /// Start a fresh story. In-flight loads and saves are superseded.
    pub fn new_story(&mut self) -> StoryId {
        self.reset_story();
        self.suggestions = None;
        self.image_url = None;
        self.suggestion_requests.invalidate();
        self.image_requests.invalidate();
        self.story_id
    }

    fn reset_story(&mut self) {
        self.forget_story();
        self.loads.invalidate();
        self.deletes.invalidate();
    }

    fn forget_story(&mut self) {
        self.content.clear();
        self.name.clear();
        self.current = None;
        self.word_count = 0;
        self.story_id = StoryId::new();
        self.saves.invalidate();
    }

    pub fn begin_save(&mut self) -> Result<PendingSave, &'static str> {
        if markup::is_blank(&self.content) {
            return Err(NOTHING_TO_SAVE);
        }
        Ok(PendingSave {
            ticket: self.saves.issue(),
            name: self.name.clone(),
            content: self.content.clone(),
        })
    }

    pub fn is_current_save(&self, ticket: Ticket) -> bool {
        self.saves.is_current(ticket)
    }

    /// Adopt the filename the store assigned
    pub fn finish_save(&mut self, ticket: Ticket, filename: String) -> bool {
        if !self.saves.is_current(ticket) {
            return false;
        }
        self.current = Some(filename);
        true
    }

    /// Returns the ticket and the filename to delete
    pub fn begin_delete(&mut self) -> Result<(Ticket, String), &'static str> {
        let filename = self.current.clone().ok_or(NOTHING_TO_DELETE)?;
        Ok((self.deletes.issue(), filename))
    }

    pub fn is_current_delete(&self, ticket: Ticket) -> bool {
        self.deletes.is_current(ticket)
    }

    /// Forget the deleted story if it is still the current one. Loads in
    /// flight are left alone.
    pub fn finish_delete(&mut self, ticket: Ticket, filename: &str) -> bool {
        if !self.deletes.is_current(ticket) || self.current.as_deref() != Some(filename) {
            return false;
        }
        self.forget_story();
        true
    }

    pub fn begin_load(&mut self) -> Ticket {
        self.loads.issue()
    }

    pub fn is_current_load(&self, ticket: Ticket) -> bool {
        self.loads.is_current(ticket)
    }

    /// Make `filename` the current story
    pub fn finish_load(&mut self, ticket: Ticket, filename: &str, content: String) -> bool {
        if !self.loads.is_current(ticket) {
            return false;
        }
        self.name = story_base_name(filename).to_string();
        self.current = Some(filename.to_string());
        self.set_content(content);
        self.suggestions = None;
        self.story_id = StoryId::new();
        self.saves.invalidate();
        self.suggestion_requests.invalidate();
        true
    }

    pub fn begin_list(&mut self) -> Ticket {
        self.listings.issue()
    }

    pub fn is_current_list(&self, ticket: Ticket) -> bool {
        self.listings.is_current(ticket)
    }

    /// Keep the story entries of a namespace listing
    pub fn finish_list(&mut self, ticket: Ticket, entries: Vec<StoryEntry>) -> bool {
        if !self.listings.is_current(ticket) {
            return false;
        }
        self.stories = filter_story_entries(entries);
        true
    }

    fn pending_text(&self, ticket: Ticket) -> PendingText {
        PendingText {
            ticket,
            text: markup::strip_markup(&self.content),
            language: self.language,
        }
    }

    pub fn begin_suggestions(&mut self) -> Result<PendingText, &'static str> {
        if markup::is_blank(&self.content) {
            self.suggestions = Some(SUGGESTIONS_NEED_TEXT.to_string());
            return Err(SUGGESTIONS_NEED_TEXT);
        }
        let ticket = self.suggestion_requests.issue();
        Ok(self.pending_text(ticket))
    }

    pub fn is_current_suggestions(&self, ticket: Ticket) -> bool {
        self.suggestion_requests.is_current(ticket)
    }

    pub fn finish_suggestions(&mut self, ticket: Ticket, text: String) -> bool {
        if !self.suggestion_requests.is_current(ticket) {
            return false;
        }
        self.suggestions = Some(text);
        true
    }

    pub fn begin_image(&mut self) -> Result<PendingText, &'static str> {
        if markup::is_blank(&self.content) {
            return Err(IMAGE_NEEDS_TEXT);
        }
        let ticket = self.image_requests.issue();
        Ok(self.pending_text(ticket))
    }

    pub fn is_current_image(&self, ticket: Ticket) -> bool {
        self.image_requests.is_current(ticket)
    }

    pub fn finish_image(&mut self, ticket: Ticket, url: String) -> bool {
        if !self.image_requests.is_current(ticket) {
            return false;
        }
        self.image_url = Some(url);
        true
    }
}
