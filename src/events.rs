use serde::{Deserialize, Serialize};

use crate::audio::SoundId;
use crate::timing::Hook;

/// Quietest volume an event may carry after volume transforms.
pub const MIN_VOLUME: f32 = 0.001;

fn default_volume() -> f32 {
    1.0
}

/// One timed trigger. `time` is relative to the start of the playback run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatEvent {
    pub time: f64,
    pub sound: SoundId,
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default)]
    pub start_of_cycle: bool,
}

impl BeatEvent {
    pub fn new(time: f64, sound: impl Into<SoundId>) -> Self {
        Self {
            time,
            sound: sound.into(),
            volume: 1.0,
            start_of_cycle: false,
        }
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume.max(MIN_VOLUME);
        self
    }

    pub fn at(&self, reference: f64) -> f64 {
        self.time + reference
    }
}

/// Notifications a `BeatPlayer` sends to its subscribers.
#[derive(Debug, Clone)]
pub enum PlayerUpdate {
    /// Playback began; relative time 0 maps to `reference` on the sink clock.
    Started { reference: f64 },
    /// A new look-ahead batch was handed to the sink.
    Allocated {
        reference: f64,
        events: Vec<BeatEvent>,
    },
    Stopped,
}

impl PlayerUpdate {
    /// The observer hook this update corresponds to.
    pub fn hook(&self) -> Hook {
        match self {
            PlayerUpdate::Started { .. } => Hook::OnStart,
            PlayerUpdate::Allocated { .. } => Hook::OnAllocate,
            PlayerUpdate::Stopped => Hook::OnStop,
        }
    }
}
