use thiserror::Error;

use super::rhythm::{Rhythm, RhythmError};
use super::tempo::interonset_from_bpm;
use crate::audio::SoundId;
use crate::events::{BeatEvent, MIN_VOLUME};

/// Upper bound on the events `Beat::pull_cycle` may return, so that a
/// sequence which never marks a new cycle still terminates.
pub const MAX_CYCLE_EVENTS: usize = 256;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BeatError {
    #[error("beat interval must be positive and finite, got {0}")]
    InvalidInterval(f64),
    #[error("accent period must be at least 1")]
    InvalidAccent,
    #[error("cannot loop a rhythm of duration {0}")]
    ZeroDuration(f64),
    #[error(transparent)]
    Rhythm(#[from] RhythmError),
}

fn check_interval(interval: f64) -> Result<f64, BeatError> {
    if interval.is_finite() && interval > 0.0 {
        Ok(interval)
    } else {
        Err(BeatError::InvalidInterval(interval))
    }
}

/// One sound every `interval` seconds, forever. Every beat opens a cycle.
#[derive(Debug, Clone)]
pub struct ConstantBeat {
    interval: f64,
    sound: SoundId,
    volume: f32,
    count: u64,
}

impl ConstantBeat {
    pub fn new(interval: f64, sound: impl Into<SoundId>, volume: f32) -> Result<Self, BeatError> {
        Ok(Self {
            interval: check_interval(interval)?,
            sound: sound.into(),
            volume: volume.max(MIN_VOLUME),
            count: 0,
        })
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    fn next_event(&mut self) -> BeatEvent {
        let time = self.interval * self.count as f64;
        self.count += 1;
        BeatEvent {
            time,
            sound: self.sound.clone(),
            volume: self.volume,
            start_of_cycle: true,
        }
    }

    fn reset(&mut self) {
        self.count = 0;
    }
}

/// A steady pulse where every `accent_every`-th beat (counting from 0) uses
/// the accent sound and volume and opens a new cycle.
#[derive(Debug, Clone)]
pub struct ConstantTime {
    interval: f64,
    normal: SoundId,
    accent: SoundId,
    accent_every: u32,
    normal_volume: f32,
    accent_volume: f32,
    count: u64,
}

impl ConstantTime {
    pub fn new(
        interval: f64,
        normal: impl Into<SoundId>,
        accent: impl Into<SoundId>,
        accent_every: u32,
    ) -> Result<Self, BeatError> {
        if accent_every == 0 {
            return Err(BeatError::InvalidAccent);
        }
        Ok(Self {
            interval: check_interval(interval)?,
            normal: normal.into(),
            accent: accent.into(),
            accent_every,
            normal_volume: 1.0,
            accent_volume: 1.0,
            count: 0,
        })
    }

    pub fn with_volumes(mut self, normal: f32, accent: f32) -> Self {
        self.normal_volume = normal.max(MIN_VOLUME);
        self.accent_volume = accent.max(MIN_VOLUME);
        self
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    fn next_event(&mut self) -> BeatEvent {
        let time = self.interval * self.count as f64;
        let accented = self.count % u64::from(self.accent_every) == 0;
        self.count += 1;

        let (sound, volume) = if accented {
            (self.accent.clone(), self.accent_volume)
        } else {
            (self.normal.clone(), self.normal_volume)
        };
        BeatEvent {
            time,
            sound,
            volume,
            start_of_cycle: accented,
        }
    }

    fn reset(&mut self) {
        self.count = 0;
    }
}

/// Replays a private copy of a `Rhythm`. When looping, each pass is shifted
/// forward by the rhythm's duration.
#[derive(Debug, Clone)]
pub struct GenericLoop {
    rhythm: Rhythm,
    looping: bool,
    index: usize,
    cycle: u64,
}

impl GenericLoop {
    pub fn new(rhythm: &Rhythm, looping: bool) -> Result<Self, BeatError> {
        let duration = rhythm.duration();
        if looping && duration <= 0.0 {
            return Err(BeatError::ZeroDuration(duration));
        }
        Ok(Self {
            rhythm: rhythm.clone(),
            looping,
            index: 0,
            cycle: 0,
        })
    }

    pub fn rhythm(&self) -> &Rhythm {
        &self.rhythm
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    fn next_event(&mut self) -> Option<BeatEvent> {
        if self.index >= self.rhythm.len() {
            if !self.looping {
                return None;
            }
            self.index = 0;
            self.cycle += 1;
        }

        // Offsets are recomputed from the cycle count so long runs don't
        // accumulate rounding error.
        let offset = self.cycle as f64 * self.rhythm.duration();
        let mut event = self.rhythm.events()[self.index].clone();
        event.time += offset;
        event.start_of_cycle = self.index == 0;
        self.index += 1;
        Some(event)
    }

    fn reset(&mut self) {
        self.index = 0;
        self.cycle = 0;
    }
}

#[derive(Debug, Clone)]
pub enum BeatKind {
    Constant(ConstantBeat),
    ConstantTime(ConstantTime),
    Loop(GenericLoop),
}

/// A lazy cursor over timed beat events.
///
/// Each event is produced once, in non-decreasing time order. `pull_until`
/// drains the cursor one event past a horizon, which is the look-ahead
/// slack the player relies on.
#[derive(Debug, Clone)]
pub struct Beat {
    kind: BeatKind,
    last_time: f64,
}

impl Beat {
    pub fn constant(interval: f64, sound: impl Into<SoundId>, volume: f32) -> Result<Self, BeatError> {
        Ok(ConstantBeat::new(interval, sound, volume)?.into())
    }

    pub fn constant_bpm(bpm: f64, sound: impl Into<SoundId>) -> Result<Self, BeatError> {
        Self::constant(interonset_from_bpm(bpm), sound, 1.0)
    }

    pub fn generic_loop(rhythm: &Rhythm, looping: bool) -> Result<Self, BeatError> {
        Ok(GenericLoop::new(rhythm, looping)?.into())
    }

    pub fn kind(&self) -> &BeatKind {
        &self.kind
    }

    /// Time of the last event handed out by a pull.
    pub fn position(&self) -> f64 {
        self.last_time
    }

    pub fn reset(&mut self) {
        match &mut self.kind {
            BeatKind::Constant(beat) => beat.reset(),
            BeatKind::ConstantTime(beat) => beat.reset(),
            BeatKind::Loop(beat) => beat.reset(),
        }
        self.last_time = 0.0;
    }

    /// Pulls events until one reaches `horizon`, inclusive of that event.
    /// At least one event is pulled; stops early if the sequence runs out.
    pub fn pull_until(&mut self, horizon: f64) -> Vec<BeatEvent> {
        self.pull_bounded(horizon, usize::MAX)
    }

    /// `pull_until` that also stops after `max_events` events.
    pub fn pull_bounded(&mut self, horizon: f64, max_events: usize) -> Vec<BeatEvent> {
        let mut events = Vec::new();
        while events.len() < max_events.max(1) {
            let Some(event) = self.next() else {
                break;
            };
            let time = event.time;
            events.push(event);
            if time >= horizon {
                break;
            }
        }

        self.last_time = events.last().map_or(horizon, |e| e.time);
        events
    }

    /// Pulls `span` seconds past the current position.
    pub fn gobble(&mut self, span: f64) -> Vec<BeatEvent> {
        self.pull_until(self.last_time + span)
    }

    pub fn gobble_bounded(&mut self, span: f64, max_events: usize) -> Vec<BeatEvent> {
        self.pull_bounded(self.last_time + span, max_events)
    }

    /// Pulls one cycle: from the next event through the next event tagged
    /// `start_of_cycle`, which closes it. Never returns more than
    /// `max_events` events.
    pub fn pull_cycle(&mut self, max_events: usize) -> Vec<BeatEvent> {
        let mut events: Vec<BeatEvent> = Vec::new();
        while events.len() < max_events {
            let Some(event) = self.next() else {
                break;
            };
            let closes = event.start_of_cycle && !events.is_empty();
            events.push(event);
            if closes {
                break;
            }
        }

        if let Some(last) = events.last() {
            self.last_time = last.time;
        }
        events
    }
}

impl Iterator for Beat {
    type Item = BeatEvent;

    fn next(&mut self) -> Option<BeatEvent> {
        match &mut self.kind {
            BeatKind::Constant(beat) => Some(beat.next_event()),
            BeatKind::ConstantTime(beat) => Some(beat.next_event()),
            BeatKind::Loop(beat) => beat.next_event(),
        }
    }
}

impl From<BeatKind> for Beat {
    fn from(kind: BeatKind) -> Self {
        Self {
            kind,
            last_time: 0.0,
        }
    }
}

impl From<ConstantBeat> for Beat {
    fn from(beat: ConstantBeat) -> Self {
        BeatKind::Constant(beat).into()
    }
}

impl From<ConstantTime> for Beat {
    fn from(beat: ConstantTime) -> Self {
        BeatKind::ConstantTime(beat).into()
    }
}

impl From<GenericLoop> for Beat {
    fn from(beat: GenericLoop) -> Self {
        BeatKind::Loop(beat).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_step() -> Rhythm {
        Rhythm::new(vec![BeatEvent::new(0.0, "a"), BeatEvent::new(1.0, "b")]).unwrap()
    }

    #[test]
    fn constant_beat_times() {
        let mut beat = Beat::constant(0.25, "click", 1.0).unwrap();
        let times: Vec<f64> = beat.by_ref().take(5).map(|e| e.time).collect();
        assert_eq!(times, vec![0.0, 0.25, 0.5, 0.75, 1.0]);

        // Strictly increasing well into the sequence
        let mut previous = -1.0;
        for event in beat.take(1000) {
            assert!(event.time > previous);
            previous = event.time;
        }
    }

    #[test]
    fn rejects_bad_intervals() {
        assert_eq!(
            Beat::constant(0.0, "click", 1.0).unwrap_err(),
            BeatError::InvalidInterval(0.0)
        );
        assert!(Beat::constant(f64::NAN, "click", 1.0).is_err());
        assert!(Beat::constant_bpm(-60.0, "click").is_err());
        assert_eq!(
            ConstantTime::new(0.5, "a", "b", 0).unwrap_err(),
            BeatError::InvalidAccent
        );
    }

    #[test]
    fn constant_time_accents() {
        let beat: Beat = ConstantTime::new(0.5, "tick", "tock", 3)
            .unwrap()
            .with_volumes(0.5, 1.0)
            .into();
        let events: Vec<BeatEvent> = beat.take(7).collect();

        let sounds: Vec<&str> = events.iter().map(|e| e.sound.as_str()).collect();
        assert_eq!(sounds, vec!["tock", "tick", "tick", "tock", "tick", "tick", "tock"]);
        assert_eq!(events[0].volume, 1.0);
        assert_eq!(events[1].volume, 0.5);
        assert!(events[3].start_of_cycle);
        assert!(!events[4].start_of_cycle);
    }

    #[test]
    fn loop_repeats_shifted_by_duration() {
        let mut beat = Beat::generic_loop(&two_step(), true).unwrap();
        let events: Vec<BeatEvent> = beat.by_ref().take(6).collect();

        let times: Vec<f64> = events.iter().map(|e| e.time).collect();
        assert_eq!(times, vec![0.0, 1.0, 1.0, 2.0, 2.0, 3.0]);

        let cycles: Vec<bool> = events.iter().map(|e| e.start_of_cycle).collect();
        assert_eq!(cycles, vec![true, false, true, false, true, false]);
    }

    #[test]
    fn loop_without_repeat_exhausts() {
        let mut beat = Beat::generic_loop(&two_step(), false).unwrap();
        let events = beat.pull_until(10.0);

        assert_eq!(events.len(), 2);
        assert_eq!(beat.position(), 1.0);
        assert!(beat.next().is_none());

        // Nothing left: the marker moves to the horizon
        assert!(beat.pull_until(12.0).is_empty());
        assert_eq!(beat.position(), 12.0);
    }

    #[test]
    fn loop_owns_its_rhythm() {
        let mut rhythm = two_step();
        let mut beat = Beat::generic_loop(&rhythm, true).unwrap();

        rhythm.shift(5.0).apply(|e| e.sound = "changed".into());

        let first = beat.next().unwrap();
        assert_eq!(first.time, 0.0);
        assert_eq!(first.sound, "a");
    }

    #[test]
    fn zero_duration_loop_is_rejected() {
        let flat = Rhythm::new(vec![BeatEvent::new(1.0, "a"), BeatEvent::new(1.0, "b")]).unwrap();
        assert_eq!(
            Beat::generic_loop(&flat, true).unwrap_err(),
            BeatError::ZeroDuration(0.0)
        );
        assert!(Beat::generic_loop(&flat, false).is_ok());
    }

    #[test]
    fn pull_until_overshoots_horizon() {
        let mut beat = Beat::constant(0.3, "click", 1.0).unwrap();

        let first = beat.pull_until(1.0);
        let last = first.last().unwrap().time;
        assert!(last >= 1.0);
        assert!(first[first.len() - 2].time < 1.0);
        assert_eq!(beat.position(), last);

        // The next pull continues strictly after the previous one
        let second = beat.gobble(1.0);
        assert!(second[0].time > last);
        assert!(second.last().unwrap().time >= last + 1.0);
    }

    #[test]
    fn pull_until_past_horizon_returns_one_event() {
        let mut beat = Beat::constant(1.0, "click", 1.0).unwrap();
        beat.pull_until(5.0);

        let events = beat.pull_until(2.0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].time, 6.0);
    }

    #[test]
    fn bounded_pull_stops_at_the_limit() {
        let mut beat = Beat::constant(1e-6, "click", 1.0).unwrap();
        let events = beat.gobble_bounded(2.0, 501);

        assert_eq!(events.len(), 501);
        assert_eq!(beat.position(), events[500].time);
        // The next pull resumes where the bounded one stopped
        assert!(beat.next().unwrap().time > events[500].time);
    }

    #[test]
    fn reset_rewinds_cursor_and_position() {
        let mut beat = Beat::constant(0.5, "click", 1.0).unwrap();
        beat.gobble(3.0);
        assert!(beat.position() >= 3.0);

        beat.reset();
        assert_eq!(beat.position(), 0.0);
        assert_eq!(beat.next().unwrap().time, 0.0);
    }

    #[test]
    fn pull_cycle_returns_one_measure() {
        let mut beat: Beat = ConstantTime::new(0.5, "tick", "tock", 4).unwrap().into();
        let measure = beat.pull_cycle(MAX_CYCLE_EVENTS);

        assert_eq!(measure.len(), 5);
        assert!(measure[0].start_of_cycle);
        assert!(measure[4].start_of_cycle);
        assert_eq!(measure[4].time - measure[0].time, 2.0);
    }

    #[test]
    fn pull_cycle_is_capped() {
        let mut beat: Beat = ConstantTime::new(0.1, "tick", "tock", 10_000).unwrap().into();
        assert_eq!(beat.pull_cycle(16).len(), 16);
    }
}
