use arc_swap::ArcSwap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainSettings {
    pub volume: f32,
    pub muted: bool,
}

/// Master gain shared by every player of an ensemble.
///
/// Written by the metronome, read by the sink each time it materialises a
/// trigger. Stores are visible to the very next load.
#[derive(Debug)]
pub struct MasterGain {
    settings: ArcSwap<GainSettings>,
}

impl MasterGain {
    pub fn new(volume: f32) -> Self {
        Self {
            settings: ArcSwap::from_pointee(GainSettings {
                volume: volume.max(0.0),
                muted: false,
            }),
        }
    }

    pub fn settings(&self) -> GainSettings {
        **self.settings.load()
    }

    pub fn volume(&self) -> f32 {
        self.settings.load().volume
    }

    pub fn set_volume(&self, volume: f32) {
        let volume = volume.max(0.0);
        self.settings.rcu(|s| GainSettings { volume, ..**s });
    }

    pub fn is_muted(&self) -> bool {
        self.settings.load().muted
    }

    pub fn set_muted(&self, muted: bool) {
        self.settings.rcu(|s| GainSettings { muted, ..**s });
    }

    pub fn effective(&self) -> f32 {
        let settings = self.settings.load();
        if settings.muted { 0.0 } else { settings.volume }
    }
}

impl Default for MasterGain {
    fn default() -> Self {
        Self::new(1.0)
    }
}

/// Rounds a per-trigger volume down to two decimals, so triggers at
/// near-identical volumes share one gain level. The small bias keeps values
/// like 0.29 from landing on 28.99999.
pub fn quantize_volume(volume: f32) -> f32 {
    (volume * 100.0 + 1e-3).floor() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mute_keeps_volume() {
        let gain = MasterGain::new(0.8);
        gain.set_muted(true);
        assert_eq!(gain.effective(), 0.0);
        assert_eq!(gain.volume(), 0.8);

        gain.set_muted(false);
        assert_eq!(gain.effective(), 0.8);
    }

    #[test]
    fn negative_volume_clamps_to_zero() {
        let gain = MasterGain::default();
        gain.set_volume(-1.0);
        assert_eq!(gain.effective(), 0.0);
    }

    #[test]
    fn quantizes_down() {
        assert_eq!(quantize_volume(0.456), 0.45);
        assert_eq!(quantize_volume(0.29), 0.29);
        assert_eq!(quantize_volume(1.0), 1.0);
    }
}
