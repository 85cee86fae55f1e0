//! View Router
//!
//! Decides which top-level screen is visible. The screen is a single
//! tagged value, so combinations like "landing and editor at once" cannot
//! be expressed. Transitions return the side effects the caller must run:
//! timers to schedule, the editor widget to mount or drop, and the ambient
//! animation of the page being entered or left.
//!
//! ```text
//! Booting --BootElapsed--> Landing --StartWriting--> Starting --StartElapsed--> Editor
//!                           |   ^                                                 |
//!                   ShowAbout   Back                                              |
//!                           v   |                                                 |
//!                           About                       Landing <------Back------+
//! ```

use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::config::TimingConfig;

/// Top-level screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Booting,
    Landing,
    About,
    Starting,
    Editor,
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            View::Booting => "booting",
            View::Landing => "landing",
            View::About => "about",
            View::Starting => "starting",
            View::Editor => "editor",
        };
        f.write_str(name)
    }
}

/// Inputs of the router: user actions and timer expiries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewEvent {
    BootElapsed,
    StartWriting,
    StartElapsed,
    ShowAbout,
    Back,
}

/// Timers owned by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewTimer {
    Boot,
    Start,
}

impl ViewTimer {
    /// Event delivered when the timer fires
    pub fn event(&self) -> ViewEvent {
        match self {
            ViewTimer::Boot => ViewEvent::BootElapsed,
            ViewTimer::Start => ViewEvent::StartElapsed,
        }
    }
}

/// Page-specific background animation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ambient {
    /// Twinkling star field behind the landing page
    StarField,
    /// Rotating tech stack display on the about page
    TechRotator,
}

/// Side effect requested by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Schedule(ViewTimer, Duration),
    MountEditor,
    UnmountEditor,
    StartAmbient(Ambient),
    StopAmbient(Ambient),
    /// Fetch the story list and the character roster
    RefreshListings,
}

/// An accepted transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: View,
    pub to: View,
    pub effects: Vec<Effect>,
}

/// Screen state machine
#[derive(Debug)]
pub struct ViewRouter {
    view: View,
    boot_delay: Duration,
    start_delay: Duration,
}

impl ViewRouter {
    pub fn new(timing: &TimingConfig) -> Self {
        Self {
            view: View::Booting,
            boot_delay: timing.boot(),
            start_delay: timing.start(),
        }
    }

    pub fn view(&self) -> View {
        self.view
    }

    /// Effects to run when the application starts
    pub fn launch(&mut self) -> Vec<Effect> {
        self.view = View::Booting;
        vec![Effect::Schedule(ViewTimer::Boot, self.boot_delay)]
    }

    /// Apply an event; `None` when the current screen does not accept it
    pub fn handle(&mut self, event: ViewEvent) -> Option<Transition> {
        use Ambient::*;
        use Effect::*;

        let (to, effects) = match (self.view, event) {
            (View::Booting, ViewEvent::BootElapsed) => {
                (View::Landing, vec![StartAmbient(StarField)])
            }
            (View::Landing, ViewEvent::StartWriting) => (
                View::Starting,
                vec![
                    StopAmbient(StarField),
                    Schedule(ViewTimer::Start, self.start_delay),
                ],
            ),
            (View::Landing, ViewEvent::ShowAbout) => (
                View::About,
                vec![StopAmbient(StarField), StartAmbient(TechRotator)],
            ),
            (View::About, ViewEvent::Back) => (
                View::Landing,
                vec![StopAmbient(TechRotator), StartAmbient(StarField)],
            ),
            (View::Starting, ViewEvent::StartElapsed) => {
                (View::Editor, vec![MountEditor, RefreshListings])
            }
            (View::Editor, ViewEvent::Back) => {
                (View::Landing, vec![UnmountEditor, StartAmbient(StarField)])
            }
            (view, event) => {
                tracing::debug!(%view, ?event, "View event ignored");
                return None;
            }
        };

        let from = self.view;
        self.view = to;
        tracing::debug!(%from, %to, "View changed");
        Some(Transition { from, to, effects })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> ViewRouter {
        ViewRouter::new(&TimingConfig::default())
    }

    #[test]
    fn test_launch_schedules_boot_timer() {
        let mut router = router();
        let effects = router.launch();
        assert_eq!(router.view(), View::Booting);
        assert_eq!(
            effects,
            vec![Effect::Schedule(ViewTimer::Boot, Duration::from_millis(3000))]
        );
    }

    #[test]
    fn test_full_path_to_editor() {
        let mut router = router();
        router.launch();

        let t = router.handle(ViewEvent::BootElapsed).unwrap();
        assert_eq!(t.to, View::Landing);
        assert_eq!(t.effects, vec![Effect::StartAmbient(Ambient::StarField)]);

        let t = router.handle(ViewEvent::StartWriting).unwrap();
        assert_eq!(t.to, View::Starting);
        assert!(t
            .effects
            .contains(&Effect::Schedule(ViewTimer::Start, Duration::from_millis(2000))));
        assert!(t.effects.contains(&Effect::StopAmbient(Ambient::StarField)));

        let t = router.handle(ViewEvent::StartElapsed).unwrap();
        assert_eq!(t.to, View::Editor);
        assert_eq!(t.effects, vec![Effect::MountEditor, Effect::RefreshListings]);
    }

    #[test]
    fn test_about_and_back() {
        let mut router = router();
        router.launch();
        router.handle(ViewEvent::BootElapsed);

        let t = router.handle(ViewEvent::ShowAbout).unwrap();
        assert_eq!(t.to, View::About);
        assert!(t.effects.contains(&Effect::StartAmbient(Ambient::TechRotator)));

        let t = router.handle(ViewEvent::Back).unwrap();
        assert_eq!(t.to, View::Landing);
        assert!(t.effects.contains(&Effect::StopAmbient(Ambient::TechRotator)));
    }

    #[test]
    fn test_leaving_editor_unmounts() {
        let mut router = router();
        router.launch();
        router.handle(ViewEvent::BootElapsed);
        router.handle(ViewEvent::StartWriting);
        router.handle(ViewEvent::StartElapsed);

        let t = router.handle(ViewEvent::Back).unwrap();
        assert_eq!(t.from, View::Editor);
        assert_eq!(t.effects[0], Effect::UnmountEditor);
    }

    #[test]
    fn test_invalid_events_ignored() {
        let mut router = router();
        router.launch();
        assert!(router.handle(ViewEvent::StartWriting).is_none());
        assert!(router.handle(ViewEvent::Back).is_none());
        assert!(router.handle(ViewEvent::StartElapsed).is_none());
        assert_eq!(router.view(), View::Booting);
    }

    #[test]
    fn test_timer_events() {
        assert_eq!(ViewTimer::Boot.event(), ViewEvent::BootElapsed);
        assert_eq!(ViewTimer::Start.event(), ViewEvent::StartElapsed);
    }
}
