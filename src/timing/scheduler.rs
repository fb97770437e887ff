use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::audio::{FinishCallback, PlaybackSink, ScheduledHandle, SinkError};
use crate::util::remove_if;

/// Default ceiling on in-flight triggers per window.
pub const MAX_PLAYING: usize = 500;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulerError {
    #[error("maximum queued beats exceeded ({limit})")]
    CapacityExceeded { limit: usize },
    #[error(transparent)]
    Sink(#[from] SinkError),
}

pub struct PlayOptions {
    pub volume: f32,
    pub on_finish: Option<FinishCallback>,
}

impl PlayOptions {
    pub fn with_volume(volume: f32) -> Self {
        Self {
            volume,
            on_finish: None,
        }
    }

    pub fn on_finish(mut self, callback: FinishCallback) -> Self {
        self.on_finish = Some(callback);
        self
    }
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self::with_volume(1.0)
    }
}

/// Look-ahead window for one player: the triggers currently handed to the
/// sink, and the sink time that relative time 0 maps to.
pub struct SchedulerContext {
    sink: Arc<dyn PlaybackSink>,
    playing: Vec<ScheduledHandle>,
    reference_start: f64,
    max_playing: usize,
}

impl SchedulerContext {
    pub fn new(sink: Arc<dyn PlaybackSink>) -> Self {
        Self::with_capacity(sink, MAX_PLAYING)
    }

    pub fn with_capacity(sink: Arc<dyn PlaybackSink>, max_playing: usize) -> Self {
        let reference_start = sink.current_time();
        Self {
            sink,
            playing: Vec::new(),
            reference_start,
            max_playing,
        }
    }

    pub fn sink(&self) -> &Arc<dyn PlaybackSink> {
        &self.sink
    }

    /// Schedules `sound` at relative `time`.
    ///
    /// Going over the ceiling first reaps finished triggers; if that is not
    /// enough every live trigger is cancelled and the call fails.
    pub fn schedule_play(
        &mut self,
        sound: &str,
        time: f64,
        options: PlayOptions,
    ) -> Result<(), SchedulerError> {
        let handle = self.sink.trigger(
            sound,
            time + self.reference_start,
            options.volume,
            options.on_finish,
        )?;
        self.playing.push(handle);

        if self.playing.len() > self.max_playing {
            let reaped = self.clear_finished();
            warn!(reaped, limit = self.max_playing, "scheduling window over its ceiling");

            if self.playing.len() > self.max_playing {
                self.stop_all();
                return Err(SchedulerError::CapacityExceeded {
                    limit: self.max_playing,
                });
            }
        }
        Ok(())
    }

    pub fn play(&mut self, sound: &str, options: PlayOptions) -> Result<(), SchedulerError> {
        let now = self.sink.current_time() - self.reference_start;
        self.schedule_play(sound, now, options)
    }

    /// Cancels every live trigger. Completion callbacks are detached first,
    /// so a late completion from the sink is a no-op.
    pub fn stop_all(&mut self) {
        let count = self.playing.len();
        for handle in self.playing.drain(..) {
            handle.detach();
            handle.cancel();
        }
        if count > 0 {
            debug!(count, "cancelled scheduled triggers");
        }
    }

    /// Forgets triggers that finished or were cancelled. Returns how many.
    pub fn clear_finished(&mut self) -> usize {
        remove_if(&mut self.playing, |h| h.is_done())
    }

    /// Anchors relative time 0 at `time`, or at `time` from now when
    /// `is_offset` is set.
    pub fn set_reference(&mut self, time: f64, is_offset: bool) {
        self.reference_start = time + if is_offset { self.current_time() } else { 0.0 };
    }

    pub fn reference(&self) -> f64 {
        self.reference_start
    }

    pub fn current_time(&self) -> f64 {
        self.sink.current_time()
    }

    pub fn live_count(&self) -> usize {
        self.playing.len()
    }

    pub fn max_playing(&self) -> usize {
        self.max_playing
    }
}
