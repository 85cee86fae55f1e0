//! Ambient page animations
//!
//! The landing and about pages each run a background loop while visible.
//! Loops are tokio interval tasks owned by a handle; dropping the handle
//! aborts the task, so leaving a page never leaks a timer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::view::Ambient;
use crate::config::TimingConfig;

/// Items cycled by the about page's tech stack display
pub const TECH_STACK: [&str; 4] = ["React.js", "AWS Lambda", "Amazon S3", "AWS Bedrock"];

/// A running animation loop
#[derive(Debug)]
pub struct AmbientHandle {
    kind: Ambient,
    ticks: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl AmbientHandle {
    /// Start ticking every `period`. Must be called inside a tokio runtime.
    pub fn spawn(kind: Ambient, period: Duration) -> Self {
        let ticks = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&ticks);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately; it is the initial frame.
            interval.tick().await;
            loop {
                interval.tick().await;
                counter.fetch_add(1, Ordering::Relaxed);
            }
        });

        tracing::debug!(?kind, ?period, "Ambient animation started");
        Self { kind, ticks, task }
    }

    /// Frames (star field) or rotations (tech stack) so far
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Tech stack item currently on display
    pub fn tech_item(&self) -> Option<&'static str> {
        match self.kind {
            Ambient::TechRotator => {
                Some(TECH_STACK[(self.ticks() % TECH_STACK.len() as u64) as usize])
            }
            Ambient::StarField => None,
        }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for AmbientHandle {
    fn drop(&mut self) {
        self.task.abort();
        tracing::debug!(kind = ?self.kind, "Ambient animation stopped");
    }
}

/// The animations currently running, at most one per kind
#[derive(Debug, Default)]
pub struct AmbientSet {
    running: HashMap<Ambient, AmbientHandle>,
}

impl AmbientSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `kind`, replacing any loop of the same kind
    pub fn start(&mut self, kind: Ambient, timing: &TimingConfig) {
        let period = match kind {
            Ambient::StarField => timing.star_frame(),
            Ambient::TechRotator => timing.tech_rotate(),
        };
        self.running.insert(kind, AmbientHandle::spawn(kind, period));
    }

    /// Stop `kind` if it is running
    pub fn stop(&mut self, kind: Ambient) {
        self.running.remove(&kind);
    }

    pub fn stop_all(&mut self) {
        self.running.clear();
    }

    pub fn get(&self, kind: Ambient) -> Option<&AmbientHandle> {
        self.running.get(&kind)
    }

    pub fn is_running(&self, kind: Ambient) -> bool {
        self.running.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.running.len()
    }

    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }
}
