//! Connectivity state machine.
//!
//! Two states, driven only by platform connectivity events. Coming back
//! online asks the caller to replay queued submissions; going offline only
//! changes what the presentation layer shows.

use serde::{Deserialize, Serialize};

/// Observed connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    Online,
    Offline,
}

impl Connectivity {
    pub fn is_online(self) -> bool {
        self == Connectivity::Online
    }
}

/// What an observed event means for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Offline -> Online: replay the pending queue
    Resync,
    /// Online -> Offline: update the offline indicator
    WentOffline,
    /// Event repeated the current state
    Unchanged,
}

/// Current connectivity plus transition rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityState {
    current: Connectivity,
}

impl ConnectivityState {
    /// Start in the given state.
    pub fn new(initial: Connectivity) -> Self {
        Self { current: initial }
    }

    /// Current state.
    pub fn current(&self) -> Connectivity {
        self.current
    }

    /// Record an observed event and report the transition it caused.
    pub fn observe(&mut self, event: Connectivity) -> Transition {
        let transition = match (self.current, event) {
            (Connectivity::Offline, Connectivity::Online) => Transition::Resync,
            (Connectivity::Online, Connectivity::Offline) => Transition::WentOffline,
            _ => Transition::Unchanged,
        };
        self.current = event;
        transition
    }
}

impl Default for ConnectivityState {
    fn default() -> Self {
        Self::new(Connectivity::Online)
    }
}
