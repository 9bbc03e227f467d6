//! Playback phase and its observer.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where the engine is in a journey through vector space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Start,
    Traversal,
    End,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Start => "start",
            Phase::Traversal => "traversal",
            Phase::End => "end",
        };
        f.write_str(name)
    }
}

/// Receives every phase change, synchronously.
pub type PhaseCallback = Box<dyn FnMut(Phase) + Send>;

/// Current phase plus at most one observer.
#[derive(Default)]
pub struct PhaseTracker {
    phase: Phase,
    observer: Option<PhaseCallback>,
}

impl PhaseTracker {
    pub fn new() -> Self {
        PhaseTracker::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Replace the observer. The previous one is dropped.
    pub fn set_observer(&mut self, observer: PhaseCallback) {
        self.observer = Some(observer);
    }

    /// Record `phase` and tell the observer, even if the phase is unchanged.
    pub fn enter(&mut self, phase: Phase) {
        self.phase = phase;
        if let Some(observer) = self.observer.as_mut() {
            observer(phase);
        }
    }
}
