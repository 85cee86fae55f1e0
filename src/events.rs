//! Session Event Types
//!
//! Every user-facing operation reports through typed events instead of a
//! shared status line. Each event names its operation and the request
//! ticket it belongs to, so two operations in flight never overwrite each
//! other's feedback.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::session::Ticket;
use crate::story::StoryId;

/// Operations that report progress or results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    ListStories,
    LoadStory,
    SaveStory,
    DeleteStory,
    Suggestions,
    GenerateImage,
    SaveCanvas,
    LoadCanvas,
    ExportCanvas,
    ListCharacters,
    SaveCharacter,
    LoadCharacter,
}

impl Operation {
    pub fn label(&self) -> &'static str {
        match self {
            Operation::ListStories => "list stories",
            Operation::LoadStory => "load story",
            Operation::SaveStory => "save story",
            Operation::DeleteStory => "delete story",
            Operation::Suggestions => "suggestions",
            Operation::GenerateImage => "generate image",
            Operation::SaveCanvas => "save canvas",
            Operation::LoadCanvas => "load canvas",
            Operation::ExportCanvas => "export canvas",
            Operation::ListCharacters => "list characters",
            Operation::SaveCharacter => "save character",
            Operation::LoadCharacter => "load character",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of one step of an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum Outcome {
    /// Request sent
    Started(String),
    /// Request finished and state was updated
    Succeeded(String),
    /// Refused before any request was made
    Rejected(String),
    /// Request failed; prior state is untouched
    Failed(String),
    /// Result arrived after the state it was meant for had moved on
    Superseded(String),
}

impl Outcome {
    pub fn message(&self) -> &str {
        match self {
            Outcome::Started(m)
            | Outcome::Succeeded(m)
            | Outcome::Rejected(m)
            | Outcome::Failed(m)
            | Outcome::Superseded(m) => m,
        }
    }

    /// True for outcomes that end an operation
    pub fn is_final(&self) -> bool {
        !matches!(self, Outcome::Started(_))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Event published by the controller
#[derive(Debug, Clone, Serialize)]
pub struct AppEvent {
    /// Request this event belongs to; `None` for rejections
    pub ticket: Option<Ticket>,
    pub operation: Operation,
    /// Story session the operation ran against
    pub story: Option<StoryId>,
    pub outcome: Outcome,
    pub at: DateTime<Utc>,
}

impl AppEvent {
    pub fn new(
        operation: Operation,
        ticket: Option<Ticket>,
        story: Option<StoryId>,
        outcome: Outcome,
    ) -> Self {
        Self {
            ticket,
            operation,
            story,
            outcome,
            at: Utc::now(),
        }
    }
}

impl fmt::Display for AppEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.operation, self.outcome)
    }
}
