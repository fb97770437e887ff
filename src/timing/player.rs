use std::sync::{Arc, Weak};

use crossbeam::channel::{Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

use super::beat::Beat;
use super::scheduler::{MAX_PLAYING, PlayOptions, SchedulerContext, SchedulerError};
use super::state_machine::PlayerState;
use crate::audio::FinishCallback;
use crate::events::{BeatEvent, PlayerUpdate};

/// Nominal look-ahead window, in seconds.
pub const RESOLUTION: f64 = 1.0;

/// Fraction of the window after which the next allocation pass is armed.
pub const REARM_FRACTION: f64 = 0.9;

/// Longest look-ahead window a player accepts, in seconds.
pub const MAX_RESOLUTION: f64 = 60.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TuningError {
    #[error("resolution must be in (0, {MAX_RESOLUTION}] seconds, got {0}")]
    InvalidResolution(f64),
    #[error("re-arm fraction must be in (0, 2], got {0}")]
    InvalidRearmFraction(f64),
    #[error("a player must be allowed at least one live trigger")]
    ZeroCapacity,
}

#[derive(Serialize, Deserialize)]
#[serde(default)]
struct RawTuning {
    resolution: f64,
    rearm_fraction: f64,
    max_playing: usize,
}

impl Default for RawTuning {
    fn default() -> Self {
        Self {
            resolution: RESOLUTION,
            rearm_fraction: REARM_FRACTION,
            max_playing: MAX_PLAYING,
        }
    }
}

/// Window sizing for a player. Always valid once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTuning", into = "RawTuning")]
pub struct Tuning {
    resolution: f64,
    rearm_fraction: f64,
    max_playing: usize,
}

impl Tuning {
    pub fn new(resolution: f64, rearm_fraction: f64, max_playing: usize) -> Result<Self, TuningError> {
        if !(resolution.is_finite() && resolution > 0.0 && resolution <= MAX_RESOLUTION) {
            return Err(TuningError::InvalidResolution(resolution));
        }
        if !(rearm_fraction.is_finite() && rearm_fraction > 0.0 && rearm_fraction <= 2.0) {
            return Err(TuningError::InvalidRearmFraction(rearm_fraction));
        }
        if max_playing == 0 {
            return Err(TuningError::ZeroCapacity);
        }
        Ok(Self {
            resolution,
            rearm_fraction,
            max_playing,
        })
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn rearm_fraction(&self) -> f64 {
        self.rearm_fraction
    }

    pub fn max_playing(&self) -> usize {
        self.max_playing
    }
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            resolution: RESOLUTION,
            rearm_fraction: REARM_FRACTION,
            max_playing: MAX_PLAYING,
        }
    }
}

impl TryFrom<RawTuning> for Tuning {
    type Error = TuningError;

    fn try_from(raw: RawTuning) -> Result<Self, Self::Error> {
        Tuning::new(raw.resolution, raw.rearm_fraction, raw.max_playing)
    }
}

impl From<Tuning> for RawTuning {
    fn from(tuning: Tuning) -> Self {
        Self {
            resolution: tuning.resolution,
            rearm_fraction: tuning.rearm_fraction,
            max_playing: tuning.max_playing,
        }
    }
}

struct PlayerCore {
    beat: Beat,
    scheduler: SchedulerContext,
    state: PlayerState,
    tuning: Tuning,
    passes: u64,
    last_error: Option<SchedulerError>,
}

enum Pass {
    Allocated { reference: f64, events: Vec<BeatEvent> },
    Exhausted,
}

struct PlayerShared {
    core: Mutex<PlayerCore>,
    subscribers: Mutex<Vec<Sender<PlayerUpdate>>>,
}

/// Plays one beat sequence through its own scheduling window.
///
/// Each allocation pass schedules about two windows of events and attaches
/// a completion callback to one event near the end of the first window.
/// When that event finishes the next pass runs, so the schedule is refilled
/// well before it drains. Stopping detaches the pending callback, which
/// ends the loop.
///
/// Cloning gives another handle to the same player.
#[derive(Clone)]
pub struct BeatPlayer {
    shared: Arc<PlayerShared>,
}

impl BeatPlayer {
    pub fn new(beat: Beat, scheduler: SchedulerContext, tuning: Tuning) -> Self {
        Self {
            shared: Arc::new(PlayerShared {
                core: Mutex::new(PlayerCore {
                    beat,
                    scheduler,
                    state: PlayerState::Stopped,
                    tuning,
                    passes: 0,
                    last_error: None,
                }),
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn subscribe(&self) -> Receiver<PlayerUpdate> {
        let (tx, rx) = crossbeam::channel::unbounded();
        self.shared.subscribers.lock().push(tx);
        rx
    }

    /// Starts playback with relative time 0 at the current sink time.
    /// Does nothing if the player is already running.
    pub fn start(&self) -> Result<(), SchedulerError> {
        let reference = {
            let mut core = self.shared.core.lock();
            if !core.state.transition(PlayerState::Starting) {
                return Ok(());
            }
            core.beat.reset();
            core.scheduler.set_reference(0.0, true);
            core.last_error = None;
            core.scheduler.reference()
        };

        info!(reference, "player starting");
        self.shared.notify(PlayerUpdate::Started { reference });

        {
            let mut core = self.shared.core.lock();
            // stop() may have run on another thread in between
            if !core.state.transition(PlayerState::Running) {
                return Ok(());
            }
        }
        PlayerShared::allocate(&self.shared)
    }

    /// Cancels everything scheduled and returns to Stopped. Safe from any
    /// state, including from inside a completion callback.
    pub fn stop(&self) {
        let was_active = {
            let mut core = self.shared.core.lock();
            core.scheduler.stop_all();
            core.state.transition(PlayerState::Stopped)
        };

        if was_active {
            info!("player stopped");
            self.shared.notify(PlayerUpdate::Stopped);
        }
    }

    pub fn state(&self) -> PlayerState {
        self.shared.core.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == PlayerState::Running
    }

    /// Sink time of relative 0 for the current run.
    pub fn reference(&self) -> f64 {
        self.shared.core.lock().scheduler.reference()
    }

    pub fn live_count(&self) -> usize {
        self.shared.core.lock().scheduler.live_count()
    }

    pub fn passes(&self) -> u64 {
        self.shared.core.lock().passes
    }

    pub fn tuning(&self) -> Tuning {
        self.shared.core.lock().tuning
    }

    pub fn last_error(&self) -> Option<SchedulerError> {
        self.shared.core.lock().last_error.clone()
    }

    pub fn beat_snapshot(&self) -> Beat {
        self.shared.core.lock().beat.clone()
    }
}

impl PlayerShared {
    fn notify(&self, update: PlayerUpdate) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(update.clone()).is_ok());
    }

    /// Sends only while the player is running. The subscriber lock is held
    /// across the check, so a concurrent `Stopped` always queues after it.
    fn notify_while_running(&self, update: PlayerUpdate) {
        let mut subscribers = self.subscribers.lock();
        if self.core.lock().state != PlayerState::Running {
            return;
        }
        subscribers.retain(|tx| tx.send(update.clone()).is_ok());
    }

    fn allocate(shared: &Arc<PlayerShared>) -> Result<(), SchedulerError> {
        let outcome = {
            let mut core = shared.core.lock();
            if core.state != PlayerState::Running {
                return Ok(());
            }
            let outcome = core.allocate_beats(Arc::downgrade(shared));
            if let Err(err) = &outcome {
                core.scheduler.stop_all();
                core.state.transition(PlayerState::Stopped);
                core.last_error = Some(err.clone());
            }
            outcome
        };

        match outcome {
            Ok(Pass::Allocated { reference, events }) => {
                shared.notify_while_running(PlayerUpdate::Allocated { reference, events });
                Ok(())
            }
            Ok(Pass::Exhausted) => {
                info!("beat sequence exhausted, player stopped");
                shared.notify(PlayerUpdate::Stopped);
                Ok(())
            }
            Err(err) => {
                shared.notify(PlayerUpdate::Stopped);
                Err(err)
            }
        }
    }
}

fn rearm(player: Weak<PlayerShared>) -> FinishCallback {
    Box::new(move || {
        let Some(shared) = player.upgrade() else {
            return;
        };
        if let Err(err) = PlayerShared::allocate(&shared) {
            error!(%err, "allocation pass failed, player stopped");
        }
    })
}

impl PlayerCore {
    fn allocate_beats(&mut self, player: Weak<PlayerShared>) -> Result<Pass, SchedulerError> {
        self.scheduler.clear_finished();

        // One event past the ceiling is enough to know the window overflows.
        let limit = self.tuning.max_playing.saturating_add(1);
        let events = self.beat.gobble_bounded(2.0 * self.tuning.resolution, limit);
        if events.is_empty() {
            self.state.transition(PlayerState::Stopped);
            return Ok(Pass::Exhausted);
        }

        // The first event at or past the re-arm mark carries the callback.
        // A batch too sparse to reach the mark re-arms on its last event.
        let mark = events[0].time + self.tuning.rearm_fraction * self.tuning.resolution;
        let rearm_index = events
            .iter()
            .position(|e| e.time >= mark)
            .unwrap_or(events.len() - 1);

        let mut player = Some(player);
        for (index, event) in events.iter().enumerate() {
            let mut options = PlayOptions::with_volume(event.volume);
            if index == rearm_index {
                if let Some(player) = player.take() {
                    options = options.on_finish(rearm(player));
                }
            }
            self.scheduler.schedule_play(&event.sound, event.time, options)?;
        }

        self.passes += 1;
        debug!(
            pass = self.passes,
            count = events.len(),
            from = events[0].time,
            to = self.beat.position(),
            live = self.scheduler.live_count(),
            "allocated beats"
        );

        Ok(Pass::Allocated {
            reference: self.scheduler.reference(),
            events,
        })
    }
}
