//! Click synthesis - short decaying sine bursts
//!
//! Clicks are rendered once per acquired output and replayed by the render
//! callback. Rendering is a pure function of the click configuration and
//! sample rate, so identical inputs produce identical buffers.

use serde::{Deserialize, Serialize};

use crate::config::ClickConfig;

/// Which of the two click voices a beat uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickKind {
    /// First beat of the bar (high pitch)
    Accent,
    /// Any other beat (low pitch)
    Regular,
}

impl ClickKind {
    pub fn for_beat(beat_index: u32) -> Self {
        if beat_index == 1 {
            ClickKind::Accent
        } else {
            ClickKind::Regular
        }
    }

    pub fn frequency_hz(self, config: &ClickConfig) -> f32 {
        match self {
            ClickKind::Accent => config.accent_frequency_hz,
            ClickKind::Regular => config.beat_frequency_hz,
        }
    }
}

/// Renders one click as mono samples.
///
/// The envelope starts at `config.gain` and decays exponentially so that it
/// reaches `config.release_gain` on the final sample, which keeps the burst
/// free of an audible pop when it ends.
pub fn render_click(config: &ClickConfig, kind: ClickKind, sample_rate: u32) -> Vec<f32> {
    let num_samples = (sample_rate as f32 * config.duration_secs).max(0.0) as usize;
    if num_samples == 0 {
        return Vec::new();
    }

    let frequency = kind.frequency_hz(config);
    let gain = config.gain.max(f32::EPSILON);
    let release = config.release_gain.clamp(f32::EPSILON, gain);
    let duration = num_samples as f32 / sample_rate as f32;
    let decay_rate = (gain / release).ln() / duration;

    (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            let envelope = gain * (-decay_rate * t).exp();
            (t * frequency * std::f32::consts::TAU).sin() * envelope
        })
        .collect()
}

/// Pre-rendered accent and regular clicks for one sample rate.
#[derive(Debug, Clone)]
pub struct ClickBank {
    accent: Vec<f32>,
    regular: Vec<f32>,
}

impl ClickBank {
    pub fn new(config: &ClickConfig, sample_rate: u32) -> Self {
        Self {
            accent: render_click(config, ClickKind::Accent, sample_rate),
            regular: render_click(config, ClickKind::Regular, sample_rate),
        }
    }

    pub fn samples(&self, kind: ClickKind) -> &[f32] {
        match kind {
            ClickKind::Accent => &self.accent,
            ClickKind::Regular => &self.regular,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_click_duration() {
        let config = ClickConfig::default();
        for &sr in &[44100u32, 48000, 96000] {
            let click = render_click(&config, ClickKind::Regular, sr);
            let expected = (sr as f32 * config.duration_secs) as usize;
            assert_eq!(click.len(), expected, "Click should last 100ms at {} Hz", sr);
        }
    }

    #[test]
    fn test_click_amplitude_bounded_by_gain() {
        let config = ClickConfig::default();
        let click = render_click(&config, ClickKind::Accent, 48000);
        for (i, &sample) in click.iter().enumerate() {
            assert!(
                sample.abs() <= config.gain + 1e-6,
                "Sample {} at index {} exceeds gain {}",
                sample,
                i,
                config.gain
            );
        }
    }

    #[test]
    fn test_click_decays_to_release_gain() {
        let config = ClickConfig::default();
        let click = render_click(&config, ClickKind::Regular, 48000);

        let head_peak = click[..480].iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        let tail_peak = click[click.len() - 48..]
            .iter()
            .fold(0.0f32, |acc, s| acc.max(s.abs()));

        assert!(head_peak > 0.2, "head peak {} should be near gain", head_peak);
        assert!(
            tail_peak <= config.release_gain * 1.2,
            "tail peak {} should have decayed to ~{}",
            tail_peak,
            config.release_gain
        );
    }

    #[test]
    fn test_accent_is_higher_pitched() {
        let config = ClickConfig::default();
        let count_crossings = |samples: &[f32]| {
            samples
                .windows(2)
                .filter(|w| (w[0] < 0.0) != (w[1] < 0.0))
                .count()
        };
        let accent = render_click(&config, ClickKind::Accent, 48000);
        let regular = render_click(&config, ClickKind::Regular, 48000);

        // 880 Hz vs 440 Hz: twice as many zero crossings.
        let ratio = count_crossings(&accent) as f32 / count_crossings(&regular) as f32;
        assert!((ratio - 2.0).abs() < 0.1, "crossing ratio was {}", ratio);
    }

    #[test]
    fn test_click_deterministic() {
        let config = ClickConfig::default();
        let a = render_click(&config, ClickKind::Accent, 48000);
        let b = render_click(&config, ClickKind::Accent, 48000);
        assert_eq!(a, b);
    }

    #[test]
    fn test_kind_for_beat() {
        assert_eq!(ClickKind::for_beat(1), ClickKind::Accent);
        assert_eq!(ClickKind::for_beat(2), ClickKind::Regular);
        assert_eq!(ClickKind::for_beat(6), ClickKind::Regular);
    }

    #[test]
    fn test_zero_duration_renders_nothing() {
        let config = ClickConfig {
            duration_secs: 0.0,
            ..ClickConfig::default()
        };
        assert!(render_click(&config, ClickKind::Accent, 48000).is_empty());
    }

    #[test]
    fn test_bank_selects_voice() {
        let config = ClickConfig::default();
        let bank = ClickBank::new(&config, 48000);
        assert_eq!(
            bank.samples(ClickKind::Accent),
            render_click(&config, ClickKind::Accent, 48000).as_slice()
        );
        assert_ne!(bank.samples(ClickKind::Accent), bank.samples(ClickKind::Regular));
    }
}
