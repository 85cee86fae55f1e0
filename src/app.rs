//! Story Application Controller
//!
//! Wires the session state groups to a [`RemoteService`]. Operations are
//! plain synchronous calls: each validates against the session, publishes
//! an [`AppEvent`], and spawns the remote request on the tokio runtime.
//! Finished requests come back as completions that are applied one at a
//! time by [`StoryApp::run_until_idle`] or [`StoryApp::next_completion`],
//! so session state is only ever touched from the caller's task.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

use crate::config::Config;
use crate::events::{AppEvent, Operation, Outcome};
use crate::remote::{RemoteError, RemoteResult, RemoteService};
use crate::session::{
    AmbientSet, CanvasError, CanvasSession, CharacterRoster, EditorSession, Effect, Generation,
    Ticket, View, ViewEvent, ViewRouter, ViewTimer,
};
use crate::story::{
    canvas_filename, canvas_store_name, story_base_name, Language, StoryEntry, Theme,
};

/// Message used when a save is assumed to have gone through
pub const ASSUMED_SAVED: &str = "Story saved! (response unreadable, not confirmed)";
pub const SUPERSEDED: &str = "Superseded by a newer change";

const EVENT_CAPACITY: usize = 256;

/// A finished background task
#[derive(Debug)]
enum Completion {
    Timer(ViewTimer),
    CanvasMount(Ticket),
    CanvasReload(Ticket),
    RosterRefresh,
    Stories(Ticket, RemoteResult<Vec<StoryEntry>>),
    Loaded {
        ticket: Ticket,
        filename: String,
        result: RemoteResult<String>,
    },
    Saved(Ticket, RemoteResult<String>),
    Deleted {
        ticket: Ticket,
        filename: String,
        result: RemoteResult<()>,
    },
    Suggestions(Ticket, RemoteResult<Option<String>>),
    Image(Ticket, RemoteResult<Option<String>>),
    CanvasSaved(Ticket, RemoteResult<String>),
    CanvasLoaded(Ticket, RemoteResult<Option<String>>),
    Characters {
        ticket: Ticket,
        story: String,
        result: RemoteResult<Vec<StoryEntry>>,
    },
    CharacterSaved(Ticket, RemoteResult<String>),
    CharacterLoaded(Ticket, RemoteResult<String>),
}

/// The story writing application
pub struct StoryApp {
    config: Config,
    remote: Arc<dyn RemoteService>,
    router: ViewRouter,
    editor: EditorSession,
    canvas: CanvasSession,
    roster: CharacterRoster,
    ambient: AmbientSet,
    theme: Theme,
    canvas_saves: Generation,
    events: broadcast::Sender<AppEvent>,
    latest: HashMap<Operation, AppEvent>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    pending: usize,
}

impl StoryApp {
    pub fn new(config: Config, remote: Arc<dyn RemoteService>) -> Self {
        let language = config
            .session
            .default_language
            .parse::<Language>()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to English");
                Language::English
            });
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        tracing::info!(remote = remote.name(), "Story app created");

        Self {
            router: ViewRouter::new(&config.timing),
            editor: EditorSession::new(language),
            canvas: CanvasSession::new(),
            roster: CharacterRoster::new(),
            ambient: AmbientSet::new(),
            theme: Theme::from_dark_mode(config.session.dark_mode),
            canvas_saves: Generation::new(),
            events,
            latest: HashMap::new(),
            completions_tx,
            completions_rx,
            pending: 0,
            config,
            remote,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn view(&self) -> View {
        self.router.view()
    }

    pub fn editor(&self) -> &EditorSession {
        &self.editor
    }

    pub fn canvas(&self) -> &CanvasSession {
        &self.canvas
    }

    pub fn roster(&self) -> &CharacterRoster {
        &self.roster
    }

    pub fn ambient(&self) -> &AmbientSet {
        &self.ambient
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// Subscribe to operation events
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.events.subscribe()
    }

    /// Most recent event of `operation`
    pub fn latest(&self, operation: Operation) -> Option<&AppEvent> {
        self.latest.get(&operation)
    }

    /// Background tasks not yet applied
    pub fn pending(&self) -> usize {
        self.pending
    }

    // ------------------------------------------------------------------
    // Event loop
    // ------------------------------------------------------------------

    /// Apply completions until no background task is left
    pub async fn run_until_idle(&mut self) {
        while self.pending > 0 {
            if !self.next_completion().await {
                break;
            }
        }
    }

    /// Wait for one completion and apply it. Returns false if the channel
    /// closed. Waits forever when nothing is pending.
    pub async fn next_completion(&mut self) -> bool {
        match self.completions_rx.recv().await {
            Some(completion) => {
                self.pending = self.pending.saturating_sub(1);
                self.apply(completion);
                true
            }
            None => false,
        }
    }

    fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        self.pending += 1;
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(task.await);
        });
    }

    fn spawn_after(&mut self, delay: Duration, completion: Completion) {
        self.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            completion
        });
    }

    fn emit(&mut self, operation: Operation, ticket: Option<Ticket>, outcome: Outcome) {
        match &outcome {
            Outcome::Failed(message) => {
                tracing::warn!(%operation, message = %message, "Operation failed")
            }
            Outcome::Rejected(message) => {
                tracing::debug!(%operation, message = %message, "Operation rejected")
            }
            _ => tracing::debug!(%operation, outcome = %outcome, "Operation progress"),
        }

        let event = AppEvent::new(operation, ticket, Some(self.editor.story_id()), outcome);
        self.latest.insert(operation, event.clone());
        // No subscribers is fine; the latest map still records it.
        let _ = self.events.send(event);
    }

    fn reject(&mut self, operation: Operation, message: &str) {
        self.emit(operation, None, Outcome::Rejected(message.to_string()));
    }

    /// Drop a stale completion. If its `Started` event is still the latest
    /// for the operation, close it so it does not stay pending.
    fn stale(&mut self, operation: Operation, ticket: Ticket) {
        tracing::debug!(%operation, %ticket, "Stale completion dropped");
        let open = self
            .latest
            .get(&operation)
            .is_some_and(|event| event.ticket == Some(ticket) && !event.outcome.is_final());
        if open {
            self.emit(operation, Some(ticket), Outcome::Superseded(SUPERSEDED.into()));
        }
    }

    // ------------------------------------------------------------------
    // View flow
    // ------------------------------------------------------------------

    /// Start the boot sequence
    pub fn launch(&mut self) {
        let effects = self.router.launch();
        self.run_effects(effects);
    }

    pub fn start_writing(&mut self) -> bool {
        self.dispatch(ViewEvent::StartWriting)
    }

    pub fn show_about(&mut self) -> bool {
        self.dispatch(ViewEvent::ShowAbout)
    }

    pub fn back(&mut self) -> bool {
        self.dispatch(ViewEvent::Back)
    }

    pub fn toggle_theme(&mut self) -> Theme {
        self.theme = self.theme.toggled();
        self.theme
    }

    fn dispatch(&mut self, event: ViewEvent) -> bool {
        match self.router.handle(event) {
            Some(transition) => {
                tracing::info!(from = %transition.from, to = %transition.to, "View changed");
                self.run_effects(transition.effects);
                true
            }
            None => false,
        }
    }

    fn run_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Schedule(timer, delay) => self.spawn_after(delay, Completion::Timer(timer)),
                Effect::MountEditor => self.editor.mount_widget(),
                Effect::UnmountEditor => {
                    self.editor.unmount_widget();
                    self.canvas.close();
                }
                Effect::StartAmbient(kind) => self.ambient.start(kind, &self.config.timing),
                Effect::StopAmbient(kind) => self.ambient.stop(kind),
                Effect::RefreshListings => {
                    self.list_stories();
                    self.list_characters(None);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Editor
    // ------------------------------------------------------------------

    pub fn set_content(&mut self, markup: impl Into<String>) {
        self.editor.set_content(markup);
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.editor.set_name(name);
    }

    pub fn set_language(&mut self, language: Language) {
        self.editor.set_language(language);
    }

    /// Start over with an empty story and a blank canvas
    pub fn new_story(&mut self) {
        let id = self.editor.new_story();
        self.canvas.reset_for_story();
        tracing::info!(story = %id, "New story started");
    }

    pub fn save(&mut self) {
        let op = Operation::SaveStory;
        let pending = match self.editor.begin_save() {
            Ok(pending) => pending,
            Err(message) => return self.reject(op, message),
        };

        self.emit(op, Some(pending.ticket), Outcome::Started("Saving...".into()));
        let remote = Arc::clone(&self.remote);
        self.spawn(async move {
            let result = remote.save(&pending.name, &pending.content).await;
            Completion::Saved(pending.ticket, result)
        });
    }

    /// Delete the current story once `confirm` agrees. `confirm` receives
    /// the question to ask and is not called when there is nothing to
    /// delete.
    pub fn delete(&mut self, confirm: impl FnOnce(&str) -> bool) {
        let op = Operation::DeleteStory;
        let (ticket, filename) = match self.editor.begin_delete() {
            Ok(request) => request,
            Err(message) => return self.reject(op, message),
        };

        let question = Self::delete_question(&filename);
        if !confirm(&question) {
            tracing::debug!(filename = %filename, "Delete cancelled");
            return;
        }

        self.emit(op, Some(ticket), Outcome::Started("Deleting...".into()));
        let remote = Arc::clone(&self.remote);
        self.spawn(async move {
            let result = remote.delete(&filename).await;
            Completion::Deleted {
                ticket,
                filename,
                result,
            }
        });
    }

    /// Question `delete` will ask, if there is a story to delete
    pub fn delete_prompt(&self) -> Option<String> {
        self.editor.current().map(Self::delete_question)
    }

    fn delete_question(filename: &str) -> String {
        format!(
            "Are you sure you want to delete \"{}\"?",
            story_base_name(filename)
        )
    }

    pub fn load(&mut self, filename: impl Into<String>) {
        let filename = filename.into();
        let ticket = self.editor.begin_load();
        self.emit(Operation::LoadStory, Some(ticket), Outcome::Started("Loading...".into()));

        let remote = Arc::clone(&self.remote);
        self.spawn(async move {
            let result = remote.load(&filename).await;
            Completion::Loaded {
                ticket,
                filename,
                result,
            }
        });
    }

    pub fn list_stories(&mut self) {
        let ticket = self.editor.begin_list();
        let remote = Arc::clone(&self.remote);
        self.spawn(async move { Completion::Stories(ticket, remote.list().await) });
    }

    pub fn suggestions(&mut self) {
        let op = Operation::Suggestions;
        let pending = match self.editor.begin_suggestions() {
            Ok(pending) => pending,
            Err(message) => return self.reject(op, message),
        };

        self.emit(
            op,
            Some(pending.ticket),
            Outcome::Started("Getting suggestions...".into()),
        );
        let remote = Arc::clone(&self.remote);
        self.spawn(async move {
            let result = remote.suggestions(&pending.text, pending.language).await;
            Completion::Suggestions(pending.ticket, result)
        });
    }

    pub fn generate_image(&mut self) {
        let op = Operation::GenerateImage;
        let pending = match self.editor.begin_image() {
            Ok(pending) => pending,
            Err(message) => return self.reject(op, message),
        };

        self.emit(
            op,
            Some(pending.ticket),
            Outcome::Started("Generating image...".into()),
        );
        let remote = Arc::clone(&self.remote);
        self.spawn(async move {
            let result = remote.generate_image(&pending.text).await;
            Completion::Image(pending.ticket, result)
        });
    }

    // ------------------------------------------------------------------
    // Canvas
    // ------------------------------------------------------------------

    /// Open the canvas panel; the surface appears after the mount delay
    pub fn open_canvas(&mut self) {
        let ticket = self.canvas.open();
        self.spawn_after(self.config.timing.canvas_mount(), Completion::CanvasMount(ticket));
    }

    pub fn close_canvas(&mut self) {
        self.canvas.close();
    }

    /// Change the brush colour; invalid colours are ignored
    pub fn set_brush_color(&mut self, color: &str) -> bool {
        match self.canvas.set_brush_color(color) {
            Ok(applied) => applied,
            Err(e) => {
                tracing::warn!(error = %e, "Brush colour ignored");
                false
            }
        }
    }

    pub fn draw_line(&mut self, from: (i32, i32), to: (i32, i32)) -> bool {
        self.canvas.stroke(from, to)
    }

    pub fn clear_canvas(&mut self) -> bool {
        self.canvas.clear()
    }

    /// Write the drawing to the export directory
    pub fn export_canvas(&mut self) {
        let op = Operation::ExportCanvas;
        let dir = Path::new(&self.config.session.export_dir);
        match self.canvas.export_local(dir, self.editor.name()) {
            Ok(path) => self.emit(
                op,
                None,
                Outcome::Succeeded(format!("Canvas exported to {}", path.display())),
            ),
            Err(CanvasError::NoSurface) => self.reject(op, "No canvas to export"),
            Err(e) => self.emit(op, None, Outcome::Failed(format!("Export failed: {}", e))),
        }
    }

    pub fn save_canvas(&mut self) {
        let op = Operation::SaveCanvas;
        let image = match self.canvas.encode_base64() {
            Ok(image) => image,
            Err(CanvasError::NoSurface) => return self.reject(op, "No canvas to save"),
            Err(e) => {
                tracing::error!(error = %e, "Canvas encoding failed");
                return self.emit(op, None, Outcome::Failed("Failed to save canvas".into()));
            }
        };

        let base = self
            .editor
            .canvas_base()
            .unwrap_or_else(|| crate::story::naming::FALLBACK_BASE.to_string());
        let name = canvas_store_name(&base);
        let ticket = self.canvas_saves.issue();
        self.emit(op, Some(ticket), Outcome::Started("Saving canvas...".into()));

        let remote = Arc::clone(&self.remote);
        self.spawn(async move {
            let result = remote.save_canvas(&name, &image).await;
            Completion::CanvasSaved(ticket, result)
        });
    }

    pub fn load_canvas(&mut self) {
        let op = Operation::LoadCanvas;
        let base = match self.editor.canvas_base() {
            Some(base) if self.canvas.is_active() => base,
            _ => return self.reject(op, "No canvas or story selected"),
        };

        let filename = canvas_filename(&base);
        let ticket = self.canvas.begin_load();
        self.emit(op, Some(ticket), Outcome::Started("Loading canvas...".into()));

        let remote = Arc::clone(&self.remote);
        self.spawn(async move {
            let result = remote.load_canvas(&filename).await;
            Completion::CanvasLoaded(ticket, result)
        });
    }

    // ------------------------------------------------------------------
    // Characters
    // ------------------------------------------------------------------

    /// List the characters of `story`, or of the current story
    pub fn list_characters(&mut self, story: Option<&str>) {
        let story = story
            .map(str::to_string)
            .or_else(|| self.editor.current().map(str::to_string));
        let Some(ticket) = self.roster.begin_list(story.as_deref()) else {
            return;
        };
        let Some(story) = story else {
            return;
        };

        let remote = Arc::clone(&self.remote);
        self.spawn(async move {
            let result = remote.list().await;
            Completion::Characters {
                ticket,
                story,
                result,
            }
        });
    }

    pub fn set_character_field(&mut self, field: &str, value: impl Into<String>) -> bool {
        self.roster.set_field(field, value)
    }

    pub fn clear_character(&mut self) {
        self.roster.clear();
    }

    pub fn save_character(&mut self) {
        let op = Operation::SaveCharacter;
        let pending = match self.roster.begin_save(self.editor.current()) {
            Ok(pending) => pending,
            Err(message) => return self.reject(op, message),
        };

        self.emit(
            op,
            Some(pending.ticket),
            Outcome::Started("Saving character...".into()),
        );
        let remote = Arc::clone(&self.remote);
        self.spawn(async move {
            let result = remote.save(&pending.store_name, &pending.payload).await;
            Completion::CharacterSaved(pending.ticket, result)
        });
    }

    pub fn load_character(&mut self, filename: impl Into<String>) {
        let filename = filename.into();
        let ticket = self.roster.begin_load();
        self.emit(
            Operation::LoadCharacter,
            Some(ticket),
            Outcome::Started("Loading character...".into()),
        );

        let remote = Arc::clone(&self.remote);
        self.spawn(async move {
            let result = remote.load(&filename).await;
            Completion::CharacterLoaded(ticket, result)
        });
    }

    // ------------------------------------------------------------------
    // Completions
    // ------------------------------------------------------------------

    fn apply(&mut self, completion: Completion) {
        match completion {
            Completion::Timer(timer) => {
                self.dispatch(timer.event());
            }
            Completion::CanvasMount(ticket) => {
                self.canvas.mount(ticket);
            }
            Completion::CanvasReload(story_ticket) => {
                if self.editor.is_current_load(story_ticket) && self.canvas.is_active() {
                    self.load_canvas();
                }
            }
            Completion::RosterRefresh => self.list_characters(None),
            Completion::Stories(ticket, result) => self.apply_stories(ticket, result),
            Completion::Loaded {
                ticket,
                filename,
                result,
            } => self.apply_loaded(ticket, &filename, result),
            Completion::Saved(ticket, result) => self.apply_saved(ticket, result),
            Completion::Deleted {
                ticket,
                filename,
                result,
            } => self.apply_deleted(ticket, &filename, result),
            Completion::Suggestions(ticket, result) => self.apply_suggestions(ticket, result),
            Completion::Image(ticket, result) => self.apply_image(ticket, result),
            Completion::CanvasSaved(ticket, result) => {
                let op = Operation::SaveCanvas;
                if !self.canvas_saves.is_current(ticket) {
                    return self.stale(op, ticket);
                }
                let outcome = match result {
                    Ok(key) => {
                        tracing::info!(key = %key, "Canvas saved");
                        Outcome::Succeeded("Canvas saved!".into())
                    }
                    Err(_) => Outcome::Failed("Failed to save canvas".into()),
                };
                self.emit(op, Some(ticket), outcome);
            }
            Completion::CanvasLoaded(ticket, result) => self.apply_canvas_loaded(ticket, result),
            Completion::Characters {
                ticket,
                story,
                result,
            } => self.apply_characters(ticket, &story, result),
            Completion::CharacterSaved(ticket, result) => {
                let op = Operation::SaveCharacter;
                match result {
                    Ok(_) => {
                        self.emit(op, Some(ticket), Outcome::Succeeded("Character saved!".into()));
                        self.spawn_after(
                            self.config.timing.roster_refresh(),
                            Completion::RosterRefresh,
                        );
                    }
                    Err(_) => {
                        self.emit(op, Some(ticket), Outcome::Failed("Failed to save character".into()))
                    }
                }
            }
            Completion::CharacterLoaded(ticket, result) => {
                self.apply_character_loaded(ticket, result)
            }
        }
    }

    fn apply_stories(&mut self, ticket: Ticket, result: RemoteResult<Vec<StoryEntry>>) {
        let op = Operation::ListStories;
        if !self.editor.is_current_list(ticket) {
            return self.stale(op, ticket);
        }
        match result {
            Ok(entries) => {
                self.editor.finish_list(ticket, entries);
                let count = self.editor.stories().len();
                self.emit(op, Some(ticket), Outcome::Succeeded(format!("{} stories", count)));
            }
            Err(e) => self.emit(
                op,
                Some(ticket),
                Outcome::Failed(format!("Failed to list stories: {}", e.detail())),
            ),
        }
    }

    fn apply_loaded(&mut self, ticket: Ticket, filename: &str, result: RemoteResult<String>) {
        let op = Operation::LoadStory;
        if !self.editor.is_current_load(ticket) {
            return self.stale(op, ticket);
        }
        match result {
            Ok(content) => {
                self.editor.finish_load(ticket, filename, content);
                self.canvas.reset_for_story();
                self.roster.clear();
                self.list_characters(Some(filename));
                if self.canvas.is_open() && self.canvas.is_active() {
                    self.spawn_after(
                        self.config.timing.canvas_reload(),
                        Completion::CanvasReload(ticket),
                    );
                }
                tracing::info!(filename = %filename, "Story loaded");
                self.emit(op, Some(ticket), Outcome::Succeeded(format!("Loaded {}", filename)));
            }
            Err(e) => self.emit(
                op,
                Some(ticket),
                Outcome::Failed(format!("Load failed: {}", e.detail())),
            ),
        }
    }

    fn apply_saved(&mut self, ticket: Ticket, result: RemoteResult<String>) {
        let op = Operation::SaveStory;
        if !self.editor.is_current_save(ticket) {
            return self.stale(op, ticket);
        }
        match result {
            Ok(filename) => {
                self.editor.finish_save(ticket, filename.clone());
                tracing::info!(filename = %filename, "Story saved");
                self.emit(op, Some(ticket), Outcome::Succeeded(format!("Saved as {}", filename)));
                self.list_stories();
            }
            Err(e) if e.is_transport() && self.config.session.assume_saved_on_transport_error => {
                tracing::warn!(error = %e, "Save response unreadable; assuming it was stored");
                self.emit(op, Some(ticket), Outcome::Succeeded(ASSUMED_SAVED.into()));
                self.list_stories();
            }
            Err(e) => {
                let message = match &e {
                    RemoteError::Api { .. } | RemoteError::NotFound(_) => {
                        format!("Save failed: {}", e.detail())
                    }
                    _ => format!("Save error: {}", e),
                };
                self.emit(op, Some(ticket), Outcome::Failed(message));
            }
        }
    }

    fn apply_deleted(&mut self, ticket: Ticket, filename: &str, result: RemoteResult<()>) {
        let op = Operation::DeleteStory;
        if !self.editor.is_current_delete(ticket) {
            return self.stale(op, ticket);
        }
        match result {
            Ok(()) => {
                if !self.editor.finish_delete(ticket, filename) {
                    tracing::debug!(filename = %filename, "Deleted story is no longer open");
                }
                self.emit(
                    op,
                    Some(ticket),
                    Outcome::Succeeded("Story deleted successfully".into()),
                );
                self.list_stories();
            }
            Err(e) => self.emit(
                op,
                Some(ticket),
                Outcome::Failed(format!("Delete failed: {}", e.detail())),
            ),
        }
    }

    fn apply_suggestions(&mut self, ticket: Ticket, result: RemoteResult<Option<String>>) {
        let op = Operation::Suggestions;
        if !self.editor.is_current_suggestions(ticket) {
            return self.stale(op, ticket);
        }
        match result {
            Ok(Some(text)) => {
                self.editor.finish_suggestions(ticket, text);
                self.emit(op, Some(ticket), Outcome::Succeeded("Suggestions ready".into()));
            }
            Ok(None) => {
                let message = "No suggestions available";
                self.editor.finish_suggestions(ticket, message.into());
                self.emit(op, Some(ticket), Outcome::Succeeded(message.into()));
            }
            Err(e) => {
                tracing::warn!(error = %e, "Suggestion request failed");
                self.emit(op, Some(ticket), Outcome::Failed("Failed to get suggestions".into()));
            }
        }
    }

    fn apply_image(&mut self, ticket: Ticket, result: RemoteResult<Option<String>>) {
        let op = Operation::GenerateImage;
        if !self.editor.is_current_image(ticket) {
            return self.stale(op, ticket);
        }
        match result {
            Ok(Some(url)) => {
                self.editor.finish_image(ticket, url);
                self.emit(op, Some(ticket), Outcome::Succeeded("Image generated!".into()));
            }
            Ok(None) => {
                self.emit(op, Some(ticket), Outcome::Failed("Failed to generate image".into()))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Image request failed");
                self.emit(op, Some(ticket), Outcome::Failed("Failed to generate image".into()));
            }
        }
    }

    fn apply_canvas_loaded(&mut self, ticket: Ticket, result: RemoteResult<Option<String>>) {
        let op = Operation::LoadCanvas;
        if !self.canvas.is_current_load(ticket) {
            return self.stale(op, ticket);
        }
        let outcome = match result {
            Ok(Some(data)) => match self.canvas.finish_load(ticket, &data) {
                Ok(true) => Outcome::Succeeded("Canvas loaded!".into()),
                Ok(false) => return self.stale(op, ticket),
                Err(e) => {
                    tracing::warn!(error = %e, "Canvas image unreadable");
                    Outcome::Failed("Error loading canvas image".into())
                }
            },
            Ok(None) => Outcome::Failed("No canvas data received".into()),
            Err(RemoteError::NotFound(_)) => {
                Outcome::Failed("Canvas not found for this story".into())
            }
            Err(_) => Outcome::Failed("Error loading canvas".into()),
        };
        self.emit(op, Some(ticket), outcome);
    }

    fn apply_characters(
        &mut self,
        ticket: Ticket,
        story: &str,
        result: RemoteResult<Vec<StoryEntry>>,
    ) {
        let op = Operation::ListCharacters;
        if !self.roster.is_current_list(ticket) {
            return self.stale(op, ticket);
        }
        match result {
            Ok(entries) => {
                self.roster.finish_list(ticket, story, entries);
                let count = self.roster.entries().len();
                self.emit(op, Some(ticket), Outcome::Succeeded(format!("{} characters", count)));
            }
            Err(e) => self.emit(
                op,
                Some(ticket),
                Outcome::Failed(format!("Failed to list characters: {}", e.detail())),
            ),
        }
    }

    fn apply_character_loaded(&mut self, ticket: Ticket, result: RemoteResult<String>) {
        let op = Operation::LoadCharacter;
        if !self.roster.is_current_load(ticket) {
            return self.stale(op, ticket);
        }
        let outcome = match result {
            Ok(content) => match self.roster.finish_load(ticket, &content) {
                Ok(true) => Outcome::Succeeded("Character loaded!".into()),
                Ok(false) => return self.stale(op, ticket),
                Err(e) => {
                    tracing::warn!(error = %e, "Character sheet unreadable");
                    Outcome::Failed("Error parsing character data".into())
                }
            },
            Err(_) => Outcome::Failed("Failed to load character".into()),
        };
        self.emit(op, Some(ticket), outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimingConfig;
    use crate::remote::MemoryRemote;
    use crate::session::Ambient;
    use crate::story::{character_filename, Character};
    use async_trait::async_trait;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.timing = TimingConfig::immediate();
        config
    }

    fn app_with(remote: Arc<MemoryRemote>) -> StoryApp {
        StoryApp::new(test_config(), remote)
    }

    async fn editor_app(remote: Arc<MemoryRemote>) -> StoryApp {
        let mut app = app_with(remote);
        app.launch();
        app.run_until_idle().await;
        assert!(app.start_writing());
        app.run_until_idle().await;
        assert_eq!(app.view(), View::Editor);
        app
    }

    fn outcome(app: &StoryApp, op: Operation) -> Outcome {
        app.latest(op).expect("event recorded").outcome.clone()
    }

    #[tokio::test]
    async fn test_view_flow() {
        let mut app = app_with(Arc::new(MemoryRemote::new()));
        assert_eq!(app.view(), View::Booting);
        app.launch();
        app.run_until_idle().await;
        assert_eq!(app.view(), View::Landing);
        assert!(app.ambient().is_running(Ambient::StarField));

        assert!(app.show_about());
        assert!(app.ambient().is_running(Ambient::TechRotator));
        assert!(!app.ambient().is_running(Ambient::StarField));
        assert!(app.back());

        assert!(app.start_writing());
        assert_eq!(app.view(), View::Starting);
        assert!(!app.back());
        app.run_until_idle().await;
        assert_eq!(app.view(), View::Editor);
        assert!(app.editor().is_widget_mounted());
        assert!(app.ambient().is_empty());

        assert!(app.back());
        assert!(!app.editor().is_widget_mounted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_boot_waits_for_configured_delay() {
        let mut app = StoryApp::new(Config::default(), Arc::new(MemoryRemote::new()));
        app.launch();
        tokio::time::sleep(Duration::from_millis(2999)).await;
        assert_eq!(app.view(), View::Booting);
        app.run_until_idle().await;
        assert_eq!(app.view(), View::Landing);
    }

    #[tokio::test]
    async fn test_entering_editor_lists_stories() {
        let remote = Arc::new(MemoryRemote::new());
        remote.insert("a.txt", "<p>A</p>");
        remote.insert("a-bob-character.txt", "{}");
        let app = editor_app(remote).await;
        let names: Vec<_> = app.editor().stories().iter().map(|e| e.filename.clone()).collect();
        assert_eq!(names, vec!["a.txt"]);
    }

    #[tokio::test]
    async fn test_empty_save_makes_no_call() {
        let remote = Arc::new(MemoryRemote::new());
        let mut app = app_with(Arc::clone(&remote));
        app.set_content("<p><br></p>");
        app.save();
        app.run_until_idle().await;
        assert_eq!(remote.calls(), 0);
        assert_eq!(
            outcome(&app, Operation::SaveStory),
            Outcome::Rejected("Nothing to save!".into())
        );
    }

    #[tokio::test]
    async fn test_save_adopts_filename_and_refreshes() {
        let remote = Arc::new(MemoryRemote::new());
        let mut app = app_with(Arc::clone(&remote));
        app.set_name("My Tale");
        app.set_content("<p>Once</p>");
        app.save();
        app.run_until_idle().await;

        assert_eq!(app.editor().current(), Some("My_Tale.txt"));
        assert_eq!(
            outcome(&app, Operation::SaveStory),
            Outcome::Succeeded("Saved as My_Tale.txt".into())
        );
        assert_eq!(app.editor().stories().len(), 1);
    }

    #[tokio::test]
    async fn test_save_rejected_by_store() {
        let mut app = app_with(Arc::new(MemoryRemote::new()));
        app.set_content("<p>No name</p>");
        app.save();
        app.run_until_idle().await;
        assert_eq!(app.editor().current(), None);
        assert_eq!(
            outcome(&app, Operation::SaveStory),
            Outcome::Failed("Save failed: Story name and content are required".into())
        );
    }

    #[tokio::test]
    async fn test_load_replaces_state() {
        let remote = Arc::new(MemoryRemote::new());
        remote.insert("dragons.txt", "<p>Fire and scales</p>");
        remote.insert("dragons-smaug-character.txt", r#"{"name":"Smaug"}"#);
        let mut app = editor_app(remote).await;

        app.load("dragons.txt");
        app.run_until_idle().await;
        assert_eq!(app.editor().name(), "dragons");
        assert_eq!(app.editor().word_count(), 3);
        assert_eq!(app.roster().names(), vec!["smaug"]);
    }

    #[tokio::test]
    async fn test_load_missing_story_keeps_state() {
        let mut app = app_with(Arc::new(MemoryRemote::new()));
        app.set_content("<p>draft</p>");
        app.load("ghost.txt");
        app.run_until_idle().await;
        assert_eq!(app.editor().content(), "<p>draft</p>");
        assert_eq!(
            outcome(&app, Operation::LoadStory),
            Outcome::Failed("Load failed: File not found".into())
        );
    }

    #[tokio::test]
    async fn test_superseded_load_never_wins() {
        let remote = Arc::new(MemoryRemote::new());
        remote.insert("a.txt", "<p>A</p>");
        remote.insert("b.txt", "<p>B</p>");
        let mut app = app_with(remote);

        app.load("a.txt");
        app.load("b.txt");
        app.run_until_idle().await;
        assert_eq!(app.editor().current(), Some("b.txt"));
        assert_eq!(app.editor().content(), "<p>B</p>");
    }

    #[tokio::test]
    async fn test_delete_flow() {
        let remote = Arc::new(MemoryRemote::new());
        remote.insert("gone.txt", "<p>bye</p>");
        let mut app = app_with(Arc::clone(&remote));

        app.delete(|_| panic!("nothing to confirm"));
        assert_eq!(
            outcome(&app, Operation::DeleteStory),
            Outcome::Rejected("No story selected to delete!".into())
        );

        app.load("gone.txt");
        app.run_until_idle().await;

        app.delete(|_| false);
        assert_eq!(app.pending(), 0);
        assert!(remote.get("gone.txt").is_some());

        let mut asked = String::new();
        app.delete(|question| {
            asked = question.to_string();
            true
        });
        app.run_until_idle().await;
        assert_eq!(asked, "Are you sure you want to delete \"gone\"?");
        assert!(remote.get("gone.txt").is_none());
        assert_eq!(app.editor().current(), None);
        assert_eq!(app.editor().content(), "");
    }

    #[tokio::test]
    async fn test_new_story_resets_editor_and_canvas() {
        let remote = Arc::new(MemoryRemote::new().with_suggestions("Add a twist"));
        remote.insert("a.txt", "<p>Some words here</p>");
        let mut app = editor_app(remote).await;
        app.load("a.txt");
        app.run_until_idle().await;
        app.suggestions();
        app.open_canvas();
        app.run_until_idle().await;
        app.set_brush_color("#ff0000");
        app.draw_line((10, 10), (100, 10));

        app.new_story();
        assert_eq!(app.editor().content(), "");
        assert_eq!(app.editor().name(), "");
        assert_eq!(app.editor().current(), None);
        assert_eq!(app.editor().word_count(), 0);
        assert_eq!(app.editor().suggestions(), None);
        let surface = app.canvas().surface().unwrap();
        assert_eq!(surface.pixel(50, 10), Some(crate::session::canvas::BACKGROUND));
    }

    #[tokio::test]
    async fn test_suggestions_and_image() {
        let remote = Arc::new(
            MemoryRemote::new()
                .with_suggestions("Try a flashback")
                .with_image_url("https://img.example/1.png"),
        );
        let mut app = app_with(remote);

        app.suggestions();
        assert_eq!(
            outcome(&app, Operation::Suggestions),
            Outcome::Rejected("Write some text first to get suggestions!".into())
        );

        app.set_content("<p>A storm</p>");
        app.suggestions();
        app.generate_image();
        app.run_until_idle().await;
        assert_eq!(app.editor().suggestions(), Some("Try a flashback"));
        assert_eq!(app.editor().image_url(), Some("https://img.example/1.png"));
        assert_eq!(
            outcome(&app, Operation::GenerateImage),
            Outcome::Succeeded("Image generated!".into())
        );
        // Both operations keep their own feedback.
        assert!(outcome(&app, Operation::Suggestions).is_success());
    }

    #[tokio::test]
    async fn test_generator_failure_reported() {
        let mut app = app_with(Arc::new(MemoryRemote::new()));
        app.set_content("<p>A storm</p>");
        app.generate_image();
        app.run_until_idle().await;
        assert_eq!(
            outcome(&app, Operation::GenerateImage),
            Outcome::Failed("Failed to generate image".into())
        );
    }

    #[tokio::test]
    async fn test_canvas_save_and_reload_with_story() {
        let remote = Arc::new(MemoryRemote::new());
        remote.insert("map.txt", "<p>Treasure</p>");
        let mut app = editor_app(Arc::clone(&remote)).await;
        app.load("map.txt");
        app.open_canvas();
        app.run_until_idle().await;

        app.set_brush_color("#00ff00");
        app.draw_line((0, 0), (599, 0));
        app.set_name("renamed");
        app.save_canvas();
        app.run_until_idle().await;
        assert_eq!(
            outcome(&app, Operation::SaveCanvas),
            Outcome::Succeeded("Canvas saved!".into())
        );
        assert!(remote.get("map-canvas.png").is_some());

        // Reloading the story blanks the canvas, then restores the saved map.
        app.load("map.txt");
        app.run_until_idle().await;
        assert_eq!(
            outcome(&app, Operation::LoadCanvas),
            Outcome::Succeeded("Canvas loaded!".into())
        );
        let pixel = app.canvas().surface().unwrap().pixel(300, 0).unwrap();
        assert_eq!(pixel.0[1], 0xff);
    }

    #[tokio::test]
    async fn test_canvas_load_failures() {
        let mut app = app_with(Arc::new(MemoryRemote::new()));
        app.load_canvas();
        assert_eq!(
            outcome(&app, Operation::LoadCanvas),
            Outcome::Rejected("No canvas or story selected".into())
        );

        app.open_canvas();
        app.run_until_idle().await;
        app.set_name("nothing");
        app.load_canvas();
        app.run_until_idle().await;
        assert_eq!(
            outcome(&app, Operation::LoadCanvas),
            Outcome::Failed("Canvas not found for this story".into())
        );
    }

    #[tokio::test]
    async fn test_open_canvas_twice_keeps_one_surface() {
        let mut app = app_with(Arc::new(MemoryRemote::new()));
        app.open_canvas();
        app.open_canvas();
        app.run_until_idle().await;
        assert_eq!(app.canvas().live_surfaces(), 1);
        app.open_canvas();
        app.run_until_idle().await;
        assert_eq!(app.canvas().live_surfaces(), 1);
        app.close_canvas();
        assert_eq!(app.canvas().live_surfaces(), 0);
    }

    #[tokio::test]
    async fn test_export_canvas() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config();
        config.session.export_dir = dir.path().display().to_string();
        let mut app = StoryApp::new(config, Arc::new(MemoryRemote::new()));

        app.export_canvas();
        assert_eq!(
            outcome(&app, Operation::ExportCanvas),
            Outcome::Rejected("No canvas to export".into())
        );

        app.open_canvas();
        app.run_until_idle().await;
        app.set_name("quest");
        app.export_canvas();
        assert!(outcome(&app, Operation::ExportCanvas).is_success());
        assert!(dir.path().join("quest-map.png").exists());
    }

    #[tokio::test]
    async fn test_character_round_trip() {
        let remote = Arc::new(MemoryRemote::new());
        remote.insert("saga.txt", "<p>Long ago</p>");
        let mut app = editor_app(Arc::clone(&remote)).await;

        app.set_character_field("name", "Bob");
        app.save_character();
        assert_eq!(
            outcome(&app, Operation::SaveCharacter),
            Outcome::Rejected("Save a story first!".into())
        );

        app.load("saga.txt");
        app.run_until_idle().await;
        let bob = Character::new("Bob")
            .age("30")
            .description("A sailor")
            .traits("Stubborn")
            .backstory("Lost at sea");
        for (field, value) in [
            ("name", &bob.name),
            ("age", &bob.age),
            ("description", &bob.description),
            ("traits", &bob.traits),
            ("backstory", &bob.backstory),
        ] {
            app.set_character_field(field, value.as_str());
        }
        app.save_character();
        app.run_until_idle().await;
        assert_eq!(app.roster().names(), vec!["Bob"]);

        app.clear_character();
        app.load_character(character_filename("saga", "Bob"));
        app.run_until_idle().await;
        assert_eq!(app.roster().current(), &bob);
    }

    #[tokio::test]
    async fn test_character_requires_name_and_parses() {
        let remote = Arc::new(MemoryRemote::new());
        remote.insert("saga.txt", "<p>x</p>");
        remote.insert("saga-broken-character.txt", "{not json");
        let mut app = app_with(remote);
        app.load("saga.txt");
        app.run_until_idle().await;

        app.save_character();
        assert_eq!(
            outcome(&app, Operation::SaveCharacter),
            Outcome::Rejected("Character name required!".into())
        );

        app.load_character("saga-broken-character.txt");
        app.run_until_idle().await;
        assert_eq!(
            outcome(&app, Operation::LoadCharacter),
            Outcome::Failed("Error parsing character data".into())
        );
    }

    /// Store whose saves never produce a readable response
    struct Unreachable;

    #[async_trait]
    impl RemoteService for Unreachable {
        fn name(&self) -> &str {
            "unreachable"
        }
        async fn list(&self) -> RemoteResult<Vec<StoryEntry>> {
            Ok(Vec::new())
        }
        async fn load(&self, _: &str) -> RemoteResult<String> {
            Err(RemoteError::Unavailable)
        }
        async fn save(&self, _: &str, _: &str) -> RemoteResult<String> {
            Err(RemoteError::Unavailable)
        }
        async fn delete(&self, _: &str) -> RemoteResult<()> {
            Err(RemoteError::Unavailable)
        }
        async fn save_canvas(&self, _: &str, _: &str) -> RemoteResult<String> {
            Err(RemoteError::Unavailable)
        }
        async fn load_canvas(&self, _: &str) -> RemoteResult<Option<String>> {
            Err(RemoteError::Unavailable)
        }
        async fn suggestions(&self, _: &str, _: Language) -> RemoteResult<Option<String>> {
            Err(RemoteError::Unavailable)
        }
        async fn generate_image(&self, _: &str) -> RemoteResult<Option<String>> {
            Err(RemoteError::Unavailable)
        }
    }

    #[tokio::test]
    async fn test_transport_error_is_failure_by_default() {
        let mut app = StoryApp::new(test_config(), Arc::new(Unreachable));
        app.set_name("x");
        app.set_content("<p>x</p>");
        app.save();
        app.run_until_idle().await;
        assert!(matches!(
            outcome(&app, Operation::SaveStory),
            Outcome::Failed(m) if m.starts_with("Save error:")
        ));
    }

    #[tokio::test]
    async fn test_transport_error_assumed_saved_when_enabled() {
        let mut config = test_config();
        config.session.assume_saved_on_transport_error = true;
        let mut app = StoryApp::new(config, Arc::new(Unreachable));
        app.set_name("x");
        app.set_content("<p>x</p>");
        app.save();
        app.run_until_idle().await;
        assert_eq!(
            outcome(&app, Operation::SaveStory),
            Outcome::Succeeded(ASSUMED_SAVED.into())
        );
        assert_eq!(app.editor().current(), None);
    }

    #[tokio::test]
    async fn test_events_are_broadcast() {
        let mut app = app_with(Arc::new(MemoryRemote::new()));
        let mut events = app.subscribe();
        app.set_name("t");
        app.set_content("<p>t</p>");
        app.save();
        app.run_until_idle().await;

        let started = events.recv().await.unwrap();
        let finished = events.recv().await.unwrap();
        assert_eq!(started.outcome, Outcome::Started("Saving...".into()));
        assert_eq!(finished.ticket, started.ticket);
        assert_eq!(finished.story, Some(app.editor().story_id()));
    }

    /// Memory store whose loads and deletes answer after a delay
    struct Slow {
        inner: Arc<MemoryRemote>,
        load_delay: Duration,
        delete_delay: Duration,
    }

    impl Slow {
        fn new(inner: Arc<MemoryRemote>) -> Self {
            Self {
                inner,
                load_delay: Duration::ZERO,
                delete_delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl RemoteService for Slow {
        fn name(&self) -> &str {
            "slow"
        }
        async fn list(&self) -> RemoteResult<Vec<StoryEntry>> {
            self.inner.list().await
        }
        async fn load(&self, filename: &str) -> RemoteResult<String> {
            tokio::time::sleep(self.load_delay).await;
            self.inner.load(filename).await
        }
        async fn save(&self, name: &str, content: &str) -> RemoteResult<String> {
            self.inner.save(name, content).await
        }
        async fn delete(&self, filename: &str) -> RemoteResult<()> {
            tokio::time::sleep(self.delete_delay).await;
            self.inner.delete(filename).await
        }
        async fn save_canvas(&self, name: &str, png_base64: &str) -> RemoteResult<String> {
            self.inner.save_canvas(name, png_base64).await
        }
        async fn load_canvas(&self, filename: &str) -> RemoteResult<Option<String>> {
            self.inner.load_canvas(filename).await
        }
        async fn suggestions(&self, text: &str, language: Language) -> RemoteResult<Option<String>> {
            self.inner.suggestions(text, language).await
        }
        async fn generate_image(&self, text: &str) -> RemoteResult<Option<String>> {
            self.inner.generate_image(text).await
        }
    }

    fn two_stories() -> Arc<MemoryRemote> {
        let remote = Arc::new(MemoryRemote::new());
        remote.insert("a.txt", "<p>A</p>");
        remote.insert("b.txt", "<p>B</p>");
        remote
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_delete_keeps_story_loaded_since() {
        let store = two_stories();
        let mut slow = Slow::new(Arc::clone(&store));
        slow.delete_delay = Duration::from_millis(100);
        let mut app = StoryApp::new(test_config(), Arc::new(slow));

        app.load("a.txt");
        app.run_until_idle().await;
        app.delete(|_| true);
        app.load("b.txt");
        app.run_until_idle().await;

        assert_eq!(app.editor().current(), Some("b.txt"));
        assert_eq!(app.editor().content(), "<p>B</p>");
        assert_eq!(
            outcome(&app, Operation::LoadStory),
            Outcome::Succeeded("Loaded b.txt".into())
        );
        assert_eq!(
            outcome(&app, Operation::DeleteStory),
            Outcome::Succeeded("Story deleted successfully".into())
        );
        assert!(store.get("a.txt").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_started_before_delete_finishes_still_applies() {
        let store = two_stories();
        let mut slow = Slow::new(Arc::clone(&store));
        slow.load_delay = Duration::from_millis(100);
        let mut app = StoryApp::new(test_config(), Arc::new(slow));

        app.load("a.txt");
        app.run_until_idle().await;
        app.delete(|_| true);
        app.load("b.txt");
        app.run_until_idle().await;

        assert_eq!(app.editor().current(), Some("b.txt"));
        assert_eq!(app.editor().content(), "<p>B</p>");
        assert_eq!(
            outcome(&app, Operation::LoadStory),
            Outcome::Succeeded("Loaded b.txt".into())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_dropped_by_new_story_is_closed() {
        let store = two_stories();
        let mut slow = Slow::new(store);
        slow.load_delay = Duration::from_millis(100);
        let mut app = StoryApp::new(test_config(), Arc::new(slow));

        app.load("a.txt");
        app.new_story();
        app.run_until_idle().await;

        assert_eq!(app.editor().current(), None);
        assert_eq!(
            outcome(&app, Operation::LoadStory),
            Outcome::Superseded(SUPERSEDED.into())
        );
    }

    #[tokio::test]
    async fn test_repeated_canvas_save_reports_once() {
        let mut app = app_with(Arc::new(MemoryRemote::new()));
        app.open_canvas();
        app.run_until_idle().await;

        let mut events = app.subscribe();
        app.save_canvas();
        app.save_canvas();
        app.run_until_idle().await;

        let mut finished = Vec::new();
        while let Ok(event) = events.try_recv() {
            if event.outcome.is_final() {
                finished.push(event);
            }
        }
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].outcome, Outcome::Succeeded("Canvas saved!".into()));
        assert_eq!(app.latest(Operation::SaveCanvas).unwrap().ticket, finished[0].ticket);
    }
}
