pub mod audio;
pub mod engine;
pub mod events;
pub mod project;
pub mod timing;
pub mod ui;
mod util;

pub use audio::{PlaybackSink, ScheduledHandle, SinkError, SoundId, VirtualSink};
pub use engine::{Metronome, MetronomeError};
pub use events::{BeatEvent, PlayerUpdate};
pub use project::{BeatSpec, ConfigError, EnsembleConfig, PlayerConfig, SampleRef};
pub use timing::{Beat, BeatPlayer, PlayerState, Rhythm, Tuning};
pub use ui::{AnimationKind, Bounds, Canvas, MetronomeAnimator, Shape};
