use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::{
    audio::{PlaybackSink, SoundId},
    engine::{Metronome, MetronomeError},
    timing::{Beat, BeatError, ConstantTime, Rhythm, Tuning},
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ensemble file: {0}")]
    Io(#[from] std::io::Error),
    #[error("ensemble file is not valid RON: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("could not serialize ensemble: {0}")]
    Serialize(#[from] ron::Error),
    #[error(transparent)]
    Beat(#[from] BeatError),
    #[error(transparent)]
    Metronome(#[from] MetronomeError),
}

fn default_volume() -> f32 {
    1.0
}

fn default_looping() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRef {
    pub source: String,
    /// Defaults to the file stem of `source`.
    #[serde(default)]
    pub name: Option<SoundId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BeatSpec {
    Constant {
        interval: f64,
        sound: SoundId,
        #[serde(default = "default_volume")]
        volume: f32,
    },
    ConstantBpm {
        bpm: f64,
        sound: SoundId,
    },
    Accented {
        interval: f64,
        normal: SoundId,
        accent: SoundId,
        every: u32,
        #[serde(default = "default_volume")]
        normal_volume: f32,
        #[serde(default = "default_volume")]
        accent_volume: f32,
    },
    Loop {
        events: Rhythm,
        #[serde(default = "default_looping")]
        looping: bool,
    },
}

impl BeatSpec {
    pub fn to_beat(&self) -> Result<Beat, BeatError> {
        match self {
            BeatSpec::Constant {
                interval,
                sound,
                volume,
            } => Beat::constant(*interval, sound.as_str(), *volume),
            BeatSpec::ConstantBpm { bpm, sound } => Beat::constant_bpm(*bpm, sound.as_str()),
            BeatSpec::Accented {
                interval,
                normal,
                accent,
                every,
                normal_volume,
                accent_volume,
            } => Ok(ConstantTime::new(*interval, normal.as_str(), accent.as_str(), *every)?
                .with_volumes(*normal_volume, *accent_volume)
                .into()),
            BeatSpec::Loop { events, looping } => Beat::generic_loop(events, *looping),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default)]
    pub id: Option<String>,
    pub beat: BeatSpec,
}

/// An ensemble of players with their samples, stored as RON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleConfig {
    pub name: String,
    #[serde(default)]
    pub tuning: Tuning,
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default)]
    pub samples: Vec<SampleRef>,
    #[serde(default)]
    pub players: Vec<PlayerConfig>,
}

impl EnsembleConfig {
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    pub fn to_ron(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_ron()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_ron(&text)
    }

    /// Registers the samples with `sink` and creates one stopped player per
    /// entry.
    pub fn build(&self, sink: Arc<dyn PlaybackSink>) -> Result<Metronome, ConfigError> {
        let mut metronome = Metronome::with_tuning(sink, self.tuning);
        metronome.set_volume(self.volume);

        for sample in &self.samples {
            metronome.add_sample(&sample.source, sample.name.as_deref());
        }
        for player in &self.players {
            metronome.add_beat(player.beat.to_beat()?, player.id.as_deref())?;
        }

        info!(
            name = %self.name,
            players = self.players.len(),
            samples = self.samples.len(),
            "ensemble built"
        );
        Ok(metronome)
    }
}
