use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::{BeatEvent, MIN_VOLUME};
use crate::util::remove_if;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RhythmError {
    #[error("a rhythm needs at least 2 events, got {len}")]
    InvalidSequence { len: usize },
}

/// A finite, time-sorted pattern of beats.
///
/// Every transform keeps the events ordered by `time`; equal times keep their
/// insertion order. The pattern always holds at least two events, so
/// `duration` is always meaningful.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<BeatEvent>", into = "Vec<BeatEvent>")]
pub struct Rhythm {
    events: Vec<BeatEvent>,
}

fn sort_events(events: &mut [BeatEvent]) {
    events.sort_by(|a, b| a.time.total_cmp(&b.time));
}

impl Rhythm {
    pub fn new(mut events: Vec<BeatEvent>) -> Result<Self, RhythmError> {
        if events.len() < 2 {
            return Err(RhythmError::InvalidSequence { len: events.len() });
        }
        sort_events(&mut events);
        Ok(Self { events })
    }

    pub fn events(&self) -> &[BeatEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn first(&self) -> &BeatEvent {
        &self.events[0]
    }

    pub fn last(&self) -> &BeatEvent {
        &self.events[self.events.len() - 1]
    }

    /// Time between the first and last event.
    pub fn duration(&self) -> f64 {
        self.last().time - self.first().time
    }

    /// Multiplies every time by `factor`.
    pub fn stretch(&mut self, factor: f64) -> &mut Self {
        for event in &mut self.events {
            event.time *= factor;
        }
        sort_events(&mut self.events);
        self
    }

    /// Divides every time by `factor`; the inverse of `stretch`.
    pub fn squish(&mut self, factor: f64) -> &mut Self {
        self.stretch(1.0 / factor)
    }

    pub fn shift(&mut self, offset: f64) -> &mut Self {
        for event in &mut self.events {
            event.time += offset;
        }
        self
    }

    pub fn scale_volume(&mut self, factor: f32) -> &mut Self {
        for event in &mut self.events {
            event.volume = (event.volume * factor).max(MIN_VOLUME);
        }
        self
    }

    pub fn shift_volume(&mut self, offset: f32) -> &mut Self {
        for event in &mut self.events {
            event.volume = (event.volume + offset).max(MIN_VOLUME);
        }
        self
    }

    /// Runs `f` on every event, then restores time order.
    pub fn apply<F>(&mut self, mut f: F) -> &mut Self
    where
        F: FnMut(&mut BeatEvent),
    {
        for event in &mut self.events {
            f(event);
            event.volume = event.volume.max(MIN_VOLUME);
        }
        sort_events(&mut self.events);
        self
    }

    /// Drops the events matching `pred`. Refuses (and changes nothing) when
    /// fewer than two events would be left.
    pub fn remove_where<F>(&mut self, pred: F) -> Result<usize, RhythmError>
    where
        F: Fn(&BeatEvent) -> bool,
    {
        let remaining = self.events.iter().filter(|&e| !pred(e)).count();
        if remaining < 2 {
            return Err(RhythmError::InvalidSequence { len: remaining });
        }
        Ok(remove_if(&mut self.events, pred))
    }
}

impl TryFrom<Vec<BeatEvent>> for Rhythm {
    type Error = RhythmError;

    fn try_from(events: Vec<BeatEvent>) -> Result<Self, Self::Error> {
        Rhythm::new(events)
    }
}

impl From<Rhythm> for Vec<BeatEvent> {
    fn from(rhythm: Rhythm) -> Self {
        rhythm.events
    }
}
