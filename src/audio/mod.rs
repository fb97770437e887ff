mod gain;
mod samples;
mod virtual_sink;
mod voice;

use thiserror::Error;

pub use gain::{GainSettings, MasterGain, quantize_volume};
pub use samples::{Sample, SampleLibrary, extract_file_name};
pub use virtual_sink::{DEFAULT_SAMPLE_LENGTH, Trigger, VirtualSink};
pub use voice::{FinishCallback, ScheduledHandle};

pub type SoundId = String;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SinkError {
    #[error("unknown sound `{0}`")]
    UnknownSound(SoundId),
    #[error("sound `{0}` has not finished loading")]
    NotLoaded(SoundId),
}

/// The audio output the scheduler drives.
///
/// Implementations own the clock and the sample buffers. Completion
/// callbacks registered on returned handles must run from the sink's own
/// dispatch, never from inside `trigger`, and never while the sink holds a
/// lock the callback could need.
pub trait PlaybackSink: Send + Sync {
    /// Schedules one-shot playback of `sound` at absolute sink time `at`,
    /// scaled by `volume` and the master gain as it is at call time.
    /// `on_finish` must be attached before the voice can complete.
    fn trigger(
        &self,
        sound: &str,
        at: f64,
        volume: f32,
        on_finish: Option<FinishCallback>,
    ) -> Result<ScheduledHandle, SinkError>;

    /// Monotonic clock, in seconds.
    fn current_time(&self) -> f64;

    fn master(&self) -> &MasterGain;

    /// Starts loading `source`; returns the name it can be triggered by.
    fn add_sample(&self, source: &str, name: Option<&str>) -> SoundId;
}
