//! Session state
//!
//! The state groups the controller orchestrates: which screen is visible,
//! the story being edited, the canvas, and the character roster. None of
//! them talk to the network; they validate requests and apply results.

pub mod ambient;
pub mod canvas;
pub mod editor;
pub mod roster;
pub mod ticket;
pub mod view;

pub use ambient::{AmbientHandle, AmbientSet, TECH_STACK};
pub use canvas::{parse_color, Brush, CanvasError, CanvasSession, Surface};
pub use editor::{EditorSession, PendingSave, PendingText};
pub use roster::{CharacterRoster, PendingCharacter};
pub use ticket::{Generation, Ticket};
pub use view::{Ambient, Effect, Transition, View, ViewEvent, ViewRouter, ViewTimer};
