use serde::{Deserialize, Serialize};

/// Lifecycle of a beat player: Stopped -> Starting -> Running -> Stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlayerState {
    #[default]
    Stopped,
    Starting,
    Running,
}

/// Observer hooks a player fires, in the order a run fires them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Hook {
    OnStart,
    OnAllocate,
    OnStop,
}

impl PlayerState {
    pub fn can_transition_to(self, next: PlayerState) -> bool {
        use PlayerState::*;
        // A start that fails in its first pass drops straight back to Stopped.
        matches!(
            (self, next),
            (Stopped, Starting) | (Starting, Running) | (Starting, Stopped) | (Running, Stopped)
        )
    }

    /// Moves to `next` if the transition is legal; returns whether it did.
    pub fn transition(&mut self, next: PlayerState) -> bool {
        if self.can_transition_to(next) {
            *self = next;
            true
        } else {
            false
        }
    }

    pub fn is_active(self) -> bool {
        self != PlayerState::Stopped
    }
}
