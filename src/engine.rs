use std::collections::BTreeMap;
use std::sync::Arc;

use crossbeam::channel::Receiver;
use thiserror::Error;
use tracing::{info, warn};

use crate::audio::{PlaybackSink, SoundId};
use crate::events::PlayerUpdate;
use crate::timing::{Beat, BeatPlayer, SchedulerContext, SchedulerError, Tuning};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetronomeError {
    #[error("no player with id `{0}`")]
    UnknownPlayer(String),
    #[error("a player with id `{0}` already exists")]
    DuplicatePlayer(String),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// A set of beat players sharing one playback sink and its master gain.
pub struct Metronome {
    sink: Arc<dyn PlaybackSink>,
    players: BTreeMap<String, BeatPlayer>,
    tuning: Tuning,
    next_id: u64,
    pending_start: Option<f64>,
}

impl Metronome {
    pub fn new(sink: Arc<dyn PlaybackSink>) -> Self {
        Self::with_tuning(sink, Tuning::default())
    }

    pub fn with_tuning(sink: Arc<dyn PlaybackSink>, tuning: Tuning) -> Self {
        Self {
            sink,
            players: BTreeMap::new(),
            tuning,
            next_id: 0,
            pending_start: None,
        }
    }

    pub fn sink(&self) -> &Arc<dyn PlaybackSink> {
        &self.sink
    }

    pub fn tuning(&self) -> Tuning {
        self.tuning
    }

    /// Adds a player for `beat` and returns its id. Without an explicit id
    /// one of the form `__N` is generated.
    pub fn add_beat(&mut self, beat: Beat, id: Option<&str>) -> Result<String, MetronomeError> {
        let id = match id {
            Some(id) if self.players.contains_key(id) => {
                return Err(MetronomeError::DuplicatePlayer(id.to_string()));
            }
            Some(id) => id.to_string(),
            None => self.generate_id(),
        };

        let scheduler = SchedulerContext::with_capacity(self.sink.clone(), self.tuning.max_playing());
        self.players
            .insert(id.clone(), BeatPlayer::new(beat, scheduler, self.tuning));
        info!(%id, "player added");
        Ok(id)
    }

    fn generate_id(&mut self) -> String {
        loop {
            let id = format!("__{}", self.next_id);
            self.next_id += 1;
            if !self.players.contains_key(&id) {
                return id;
            }
        }
    }

    pub fn player_exists(&self, id: &str) -> bool {
        self.players.contains_key(id)
    }

    pub fn player(&self, id: &str) -> Result<&BeatPlayer, MetronomeError> {
        self.players
            .get(id)
            .ok_or_else(|| MetronomeError::UnknownPlayer(id.to_string()))
    }

    pub fn player_ids(&self) -> impl Iterator<Item = &str> {
        self.players.keys().map(String::as_str)
    }

    pub fn subscribe(&self, id: &str) -> Result<Receiver<PlayerUpdate>, MetronomeError> {
        Ok(self.player(id)?.subscribe())
    }

    pub fn start_player(&self, id: &str) -> Result<(), MetronomeError> {
        self.player(id)?.start()?;
        Ok(())
    }

    pub fn stop_player(&self, id: &str) -> Result<(), MetronomeError> {
        self.player(id)?.stop();
        Ok(())
    }

    pub fn destroy_player(&mut self, id: &str) -> Result<(), MetronomeError> {
        let player = self
            .players
            .remove(id)
            .ok_or_else(|| MetronomeError::UnknownPlayer(id.to_string()))?;
        player.stop();
        info!(%id, "player destroyed");
        Ok(())
    }

    /// Starts every player, now or `delay` seconds from now. A deferred
    /// start happens on the first `tick` at or past the deadline.
    pub fn start_all(&mut self, delay: f64) -> Result<(), MetronomeError> {
        if delay > 0.0 {
            let deadline = self.sink.current_time() + delay;
            info!(deadline, "start deferred");
            self.pending_start = Some(deadline);
            return Ok(());
        }
        self.pending_start = None;
        self.start_now()
    }

    fn start_now(&self) -> Result<(), MetronomeError> {
        let mut first_error = None;
        for (id, player) in &self.players {
            if let Err(err) = player.start() {
                warn!(%id, %err, "player failed to start");
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    pub fn tick(&mut self) -> Result<(), MetronomeError> {
        match self.pending_start {
            Some(deadline) if self.sink.current_time() >= deadline => {
                self.pending_start = None;
                self.start_now()
            }
            _ => Ok(()),
        }
    }

    pub fn has_pending_start(&self) -> bool {
        self.pending_start.is_some()
    }

    /// Stops every player and drops a deferred start.
    pub fn stop_all(&mut self) {
        self.pending_start = None;
        for player in self.players.values() {
            player.stop();
        }
    }

    pub fn set_volume(&self, volume: f32) {
        self.sink.master().set_volume(volume);
    }

    pub fn volume(&self) -> f32 {
        self.sink.master().volume()
    }

    pub fn mute(&self) {
        self.sink.master().set_muted(true);
    }

    pub fn unmute(&self) {
        self.sink.master().set_muted(false);
    }

    pub fn is_muted(&self) -> bool {
        self.sink.master().is_muted()
    }

    pub fn add_sample(&self, source: &str, name: Option<&str>) -> SoundId {
        self.sink.add_sample(source, name)
    }

    pub fn current_time(&self) -> f64 {
        self.sink.current_time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::VirtualSink;
    use crate::timing::PlayerState;

    fn metronome() -> (Arc<VirtualSink>, Metronome) {
        let sink = Arc::new(VirtualSink::new());
        let metronome = Metronome::new(sink.clone());
        metronome.add_sample("sounds/click1.wav", None);
        metronome.add_sample("sounds/accent1.wav", Some("accent"));
        (sink, metronome)
    }

    fn click(interval: f64) -> Beat {
        Beat::constant(interval, "click1", 1.0).unwrap()
    }

    #[test]
    fn generates_unique_ids() {
        let (_sink, mut metronome) = metronome();
        metronome.add_beat(click(0.5), Some("__1")).unwrap();

        assert_eq!(metronome.add_beat(click(0.5), None).unwrap(), "__0");
        assert_eq!(metronome.add_beat(click(0.5), None).unwrap(), "__2");
        assert_eq!(
            metronome.add_beat(click(0.5), Some("__0")).unwrap_err(),
            MetronomeError::DuplicatePlayer("__0".into())
        );

        let ids: Vec<&str> = metronome.player_ids().collect();
        assert_eq!(ids, vec!["__0", "__1", "__2"]);
    }

    #[test]
    fn unknown_ids_are_errors() {
        let (_sink, mut metronome) = metronome();
        let unknown = MetronomeError::UnknownPlayer("nope".into());
        assert!(!metronome.player_exists("nope"));
        assert_eq!(metronome.start_player("nope").unwrap_err(), unknown);
        assert_eq!(metronome.stop_player("nope").unwrap_err(), unknown);
        assert_eq!(metronome.destroy_player("nope").unwrap_err(), unknown);
    }

    #[test]
    fn players_share_the_sink() {
        let (sink, mut metronome) = metronome();
        metronome.add_beat(click(0.5), Some("slow")).unwrap();
        metronome.add_beat(Beat::constant(0.25, "accent", 1.0).unwrap(), Some("fast")).unwrap();

        metronome.start_all(0.0).unwrap();
        sink.advance_to(10.0);

        let triggers = sink.triggers();
        let slow = triggers.iter().filter(|t| t.sound == "click1").count();
        let fast = triggers.iter().filter(|t| t.sound == "accent").count();
        assert!(slow >= 20);
        assert!(fast >= 40);

        metronome.stop_all();
        assert!(metronome.player_ids().all(|id| !metronome.player(id).unwrap().is_running()));
        assert_eq!(sink.live_count(), 0);
    }

    #[test]
    fn destroy_stops_the_player() {
        let (sink, mut metronome) = metronome();
        let id = metronome.add_beat(click(0.5), None).unwrap();
        let player = metronome.player(&id).unwrap().clone();
        metronome.start_player(&id).unwrap();

        metronome.destroy_player(&id).unwrap();
        assert!(!metronome.player_exists(&id));
        assert_eq!(player.state(), PlayerState::Stopped);
        assert_eq!(sink.live_count(), 0);
    }

    #[test]
    fn deferred_start_waits_for_tick() {
        let (sink, mut metronome) = metronome();
        metronome.add_beat(click(0.5), Some("a")).unwrap();

        metronome.start_all(2.0).unwrap();
        assert!(metronome.has_pending_start());

        sink.advance_to(1.0);
        metronome.tick().unwrap();
        assert_eq!(sink.trigger_count(), 0);

        sink.advance_to(2.5);
        metronome.tick().unwrap();
        assert!(!metronome.has_pending_start());
        assert!(metronome.player("a").unwrap().is_running());
        assert_eq!(sink.triggers()[0].at, 2.5);
    }

    #[test]
    fn stop_all_cancels_deferred_start() {
        let (sink, mut metronome) = metronome();
        metronome.add_beat(click(0.5), Some("a")).unwrap();

        metronome.start_all(1.0).unwrap();
        metronome.stop_all();
        sink.advance_to(5.0);
        metronome.tick().unwrap();

        assert_eq!(sink.trigger_count(), 0);
    }

    #[test]
    fn start_all_reports_a_failing_player() {
        let (sink, mut metronome) = metronome();
        metronome.add_beat(click(0.5), Some("good")).unwrap();
        metronome
            .add_beat(Beat::constant(0.5, "missing", 1.0).unwrap(), Some("bad"))
            .unwrap();

        let err = metronome.start_all(0.0).unwrap_err();
        assert!(matches!(err, MetronomeError::Scheduler(SchedulerError::Sink(_))));
        assert!(metronome.player("good").unwrap().is_running());
        assert!(!metronome.player("bad").unwrap().is_running());
        assert!(sink.trigger_count() > 0);
    }

    #[test]
    fn volume_and_mute_apply_to_new_triggers() {
        let (sink, mut metronome) = metronome();
        metronome.add_beat(click(0.5), Some("a")).unwrap();
        metronome.set_volume(0.5);
        metronome.start_all(0.0).unwrap();
        assert!(sink.triggers().iter().all(|t| t.gain == 0.5));

        metronome.mute();
        assert!(metronome.is_muted());
        assert_eq!(metronome.volume(), 0.5);
        let before = sink.trigger_count();
        sink.advance_to(1.5);
        assert!(sink.triggers()[before..].iter().all(|t| t.gain == 0.0));

        metronome.unmute();
        let before = sink.trigger_count();
        sink.advance_to(4.0);
        assert!(sink.trigger_count() > before);
        assert!(sink.triggers()[before..].iter().all(|t| t.gain == 0.5));
    }
}
