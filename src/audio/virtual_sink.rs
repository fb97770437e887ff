use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::{
    FinishCallback, MasterGain, PlaybackSink, SampleLibrary, ScheduledHandle, SinkError, SoundId,
    quantize_volume,
};

/// Playback length given to samples added without an explicit length.
pub const DEFAULT_SAMPLE_LENGTH: f64 = 0.05;

/// Record of one accepted trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub sound: SoundId,
    pub at: f64,
    /// Final gain: quantised event volume times the master gain.
    pub gain: f32,
    /// Sink time at which the trigger was requested.
    pub scheduled_at: f64,
}

struct Pending {
    ends_at: f64,
    order: u64,
    handle: ScheduledHandle,
}

type LoadedCallback = Arc<dyn Fn() + Send + Sync>;

struct SinkState {
    now: f64,
    samples: SampleLibrary,
    pending: Vec<Pending>,
    triggers: Vec<Trigger>,
    next_order: u64,
    on_loaded: Option<LoadedCallback>,
}

/// A sink with a manually advanced clock and no audio output.
///
/// Triggers finish `length` seconds after they start. Advancing the clock
/// completes them in end-time order, moving the clock to each completion as
/// it goes, so callbacks observe the time they would fire at.
pub struct VirtualSink {
    master: MasterGain,
    state: Mutex<SinkState>,
}

impl VirtualSink {
    pub fn new() -> Self {
        Self {
            master: MasterGain::default(),
            state: Mutex::new(SinkState {
                now: 0.0,
                samples: SampleLibrary::new(),
                pending: Vec::new(),
                triggers: Vec::new(),
                next_order: 0,
                on_loaded: None,
            }),
        }
    }

    pub fn now(&self) -> f64 {
        self.state.lock().now
    }

    /// Registers a ready sample with an explicit playback length.
    pub fn add_sample_with_length(&self, source: &str, name: Option<&str>, length: f64) -> SoundId {
        let name = self.queue_sample(source, name, length);
        // Freshly registered, so it exists.
        let _ = self.complete_load(&name);
        name
    }

    /// Registers a sample that stays unplayable until `complete_load`.
    pub fn queue_sample(&self, source: &str, name: Option<&str>, length: f64) -> SoundId {
        self.state.lock().samples.register(source, name, length)
    }

    pub fn complete_load(&self, name: &str) -> Result<(), SinkError> {
        let callback = {
            let mut state = self.state.lock();
            state.samples.mark_ready(name)?;
            if state.samples.all_ready() {
                state.on_loaded.clone()
            } else {
                None
            }
        };

        if let Some(callback) = callback {
            callback();
        }
        Ok(())
    }

    /// Runs `callback` each time a load leaves every sample ready.
    pub fn set_on_loaded<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.state.lock().on_loaded = Some(Arc::new(callback));
    }

    pub fn all_ready(&self) -> bool {
        self.state.lock().samples.all_ready()
    }

    /// Moves the clock forward to `time`, completing every trigger that ends
    /// on the way, including ones scheduled by completion callbacks. The
    /// clock never moves backwards.
    pub fn advance_to(&self, time: f64) {
        loop {
            let handle = {
                let mut state = self.state.lock();
                state.pending.retain(|p| !p.handle.is_cancelled());

                let next = state
                    .pending
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.ends_at <= time)
                    .min_by(|(_, a), (_, b)| {
                        a.ends_at.total_cmp(&b.ends_at).then(a.order.cmp(&b.order))
                    })
                    .map(|(index, _)| index);

                match next {
                    Some(index) => {
                        let done = state.pending.swap_remove(index);
                        state.now = state.now.max(done.ends_at);
                        done.handle
                    }
                    None => {
                        state.now = state.now.max(time);
                        return;
                    }
                }
            };

            trace!(sound = handle.sound(), at = handle.start(), "voice finished");
            handle.finish();
        }
    }

    pub fn advance_by(&self, delta: f64) {
        let target = self.now() + delta;
        self.advance_to(target);
    }

    pub fn live_count(&self) -> usize {
        self.state
            .lock()
            .pending
            .iter()
            .filter(|p| !p.handle.is_done())
            .count()
    }

    pub fn triggers(&self) -> Vec<Trigger> {
        self.state.lock().triggers.clone()
    }

    pub fn take_triggers(&self) -> Vec<Trigger> {
        std::mem::take(&mut self.state.lock().triggers)
    }

    pub fn trigger_count(&self) -> usize {
        self.state.lock().triggers.len()
    }
}

impl Default for VirtualSink {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackSink for VirtualSink {
    fn trigger(
        &self,
        sound: &str,
        at: f64,
        volume: f32,
        on_finish: Option<FinishCallback>,
    ) -> Result<ScheduledHandle, SinkError> {
        let mut state = self.state.lock();
        let length = state.samples.playable(sound)?.length;

        let gain = quantize_volume(volume) * self.master.effective();
        let handle = ScheduledHandle::new(sound, at, gain, on_finish);

        // A start time already in the past plays immediately.
        let ends_at = at.max(state.now) + length;
        let order = state.next_order;
        state.next_order += 1;
        state.pending.push(Pending {
            ends_at,
            order,
            handle: handle.clone(),
        });

        let scheduled_at = state.now;
        state.triggers.push(Trigger {
            sound: sound.to_string(),
            at,
            gain,
            scheduled_at,
        });
        Ok(handle)
    }

    fn current_time(&self) -> f64 {
        self.state.lock().now
    }

    fn master(&self) -> &MasterGain {
        &self.master
    }

    fn add_sample(&self, source: &str, name: Option<&str>) -> SoundId {
        let name = self.add_sample_with_length(source, name, DEFAULT_SAMPLE_LENGTH);
        debug!(%name, source, "sample added");
        name
    }
}
