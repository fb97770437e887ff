//! Conversions between tempo and inter-onset interval (seconds between beats).

pub fn interonset_from_bpm(bpm: f64) -> f64 {
    60.0 / bpm
}

pub fn interonset_from_bps(bps: f64) -> f64 {
    1.0 / bps
}

pub fn bpm_from_interonset(interonset: f64) -> f64 {
    60.0 / interonset
}

pub fn bps_from_interonset(interonset: f64) -> f64 {
    1.0 / interonset
}

/// Approximate number of beats that fall inside one look-ahead window of
/// `resolution` seconds, never less than 1.
pub fn update_frequency_from_bpm(bpm: f64, resolution: f64) -> u32 {
    (resolution / interonset_from_bpm(bpm)).max(1.0).round() as u32
}

pub fn update_frequency_from_bps(bps: f64, resolution: f64) -> u32 {
    (resolution / interonset_from_bps(bps)).max(1.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bpm_round_trip() {
        assert_eq!(interonset_from_bpm(120.0), 0.5);
        assert_eq!(bpm_from_interonset(0.5), 120.0);
        assert_eq!(interonset_from_bps(4.0), 0.25);
        assert_eq!(bps_from_interonset(0.25), 4.0);
    }

    #[test]
    fn update_frequency_is_at_least_one() {
        // 30 BPM = one beat every 2 seconds, fewer than one per window
        assert_eq!(update_frequency_from_bpm(30.0, 1.0), 1);
        assert_eq!(update_frequency_from_bpm(240.0, 1.0), 4);
        assert_eq!(update_frequency_from_bps(10.0, 1.0), 10);
    }
}
