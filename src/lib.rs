//! # StoryTime
//!
//! A story writing companion: compose short stories, sketch a story map,
//! keep character sheets, and ask hosted generators for writing ideas and
//! illustrations. Everything durable lives in a remote flat store.
//!
//! ## Modules
//!
//! - [`app`]: controller wiring the session to the remote service
//! - [`session`]: view router, editor, canvas, and character roster state
//! - [`remote`]: service trait, HTTP client, and in-memory store
//! - [`story`]: story types and the filename conventions of the store
//! - [`events`]: typed per-operation feedback
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use storytime::remote::MemoryRemote;
//! use storytime::{Config, StoryApp};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut app = StoryApp::new(Config::default(), Arc::new(MemoryRemote::new()));
//!
//!     app.set_name("The Lighthouse");
//!     app.set_content("<p>The lamp had not been lit in years.</p>");
//!     app.save();
//!     app.run_until_idle().await;
//!
//!     println!("Saved as {:?}", app.editor().current());
//! }
//! ```

pub mod app;
pub mod config;
pub mod events;
pub mod logging;
pub mod markup;
pub mod remote;
pub mod session;
pub mod story;

pub use app::StoryApp;

pub use config::{Config, ConfigError, LoggingConfig, SessionConfig, TimingConfig};

pub use events::{AppEvent, Operation, Outcome};

pub use remote::{HttpRemote, MemoryRemote, RemoteError, RemoteResult, RemoteService};

pub use session::{
    CanvasError, CanvasSession, CharacterRoster, EditorSession, Ticket, View, ViewEvent,
};

pub use story::{Character, Language, StoryEntry, StoryId, Theme};
