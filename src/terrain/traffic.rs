//! Decayed per-cell visitation record.

use super::config::TrafficConfig;

/// Per-cell particle traffic.
///
/// Particles add to `track` during a tick; at the end of the tick the track is
/// folded into the saturating, exponentially decayed `frequency` and cleared.
#[derive(Debug, Clone)]
pub struct TrafficField {
    track: Vec<f32>,
    frequency: Vec<f32>,
}

impl TrafficField {
    pub fn new(cells: usize) -> Self {
        Self {
            track: vec![0.0; cells],
            frequency: vec![0.0; cells],
        }
    }

    /// Adds `amount` of traffic at cell index `idx`.
    #[inline]
    pub fn record(&mut self, idx: usize, amount: f32) {
        self.track[idx] += amount;
    }

    /// Decayed frequency at `idx`, in [0, 1).
    #[inline]
    pub fn frequency(&self, idx: usize) -> f32 {
        self.frequency[idx]
    }

    /// Raw traffic recorded this tick at `idx`.
    #[inline]
    pub fn track(&self, idx: usize) -> f32 {
        self.track[idx]
    }

    /// Folds this tick's track into the frequency and clears the track.
    pub fn end_tick(&mut self, config: &TrafficConfig) {
        let l = config.learn_rate.clamp(0.0, 1.0);
        let k = config.saturation.max(0.0);
        for (f, t) in self.frequency.iter_mut().zip(self.track.iter_mut()) {
            *f = (1.0 - l) * *f + l * k * *t / (1.0 + k * *t);
            *t = 0.0;
        }
    }

    /// Clears both track and frequency.
    pub fn clear(&mut self) {
        self.track.fill(0.0);
        self.frequency.fill(0.0);
    }

    /// Frequency values in row-major order.
    pub fn frequencies(&self) -> &[f32] {
        &self.frequency
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_rises_and_decays() {
        let cfg = TrafficConfig::default();
        let mut field = TrafficField::new(4);

        field.record(1, 1.0);
        field.end_tick(&cfg);
        let after_one = field.frequency(1);
        assert!(after_one > 0.0 && after_one < 1.0);
        assert_eq!(field.frequency(0), 0.0);
        assert_eq!(field.track(1), 0.0);

        field.end_tick(&cfg);
        assert!(field.frequency(1) < after_one);
    }

    #[test]
    fn test_frequency_stays_below_one() {
        let cfg = TrafficConfig {
            learn_rate: 1.0,
            saturation: 15.0,
        };
        let mut field = TrafficField::new(1);
        for _ in 0..50 {
            field.record(0, 1000.0);
            field.end_tick(&cfg);
        }
        assert!(field.frequency(0) < 1.0);
        assert!(field.frequency(0) > 0.99);
    }
}
