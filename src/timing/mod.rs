mod beat;
mod player;
mod rhythm;
mod scheduler;
mod state_machine;
pub mod tempo;

pub use beat::{Beat, BeatError, BeatKind, ConstantBeat, ConstantTime, GenericLoop, MAX_CYCLE_EVENTS};
pub use player::{BeatPlayer, MAX_RESOLUTION, REARM_FRACTION, RESOLUTION, Tuning, TuningError};
pub use rhythm::{Rhythm, RhythmError};
pub use scheduler::{MAX_PLAYING, PlayOptions, SchedulerContext, SchedulerError};
pub use state_machine::{Hook, PlayerState};
