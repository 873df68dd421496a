//! Configuration management for metronome timing and click voicing
//!
//! Runtime configuration is loaded from a JSON file so scheduling margins
//! and click sounds can be tuned without recompilation. Missing or invalid
//! files fall back to defaults with a warning.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub metronome: MetronomeConfig,
    #[serde(default)]
    pub click: ClickConfig,
    #[serde(default)]
    pub audio: AudioConfig,
}

/// Lookahead scheduling parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetronomeConfig {
    /// Host-loop period of the lookahead tick
    pub lookahead_interval_ms: u64,
    /// How far ahead of the audio clock beats are queued
    pub schedule_ahead_ms: u64,
    /// Delay between start() and the first beat so it is never late
    pub start_margin_ms: u64,
}

impl Default for MetronomeConfig {
    fn default() -> Self {
        Self {
            lookahead_interval_ms: 25,
            schedule_ahead_ms: 100,
            start_margin_ms: 50,
        }
    }
}

impl MetronomeConfig {
    pub fn lookahead_interval(&self) -> Duration {
        Duration::from_millis(self.lookahead_interval_ms.max(1))
    }

    /// Schedule-ahead window in audio-clock seconds.
    pub fn schedule_ahead_secs(&self) -> f64 {
        self.schedule_ahead_ms as f64 / 1000.0
    }

    /// Start margin in audio-clock seconds.
    pub fn start_margin_secs(&self) -> f64 {
        self.start_margin_ms as f64 / 1000.0
    }

    /// Copy with a schedule-ahead window of at least two lookahead periods,
    /// so every beat is queued before it is due.
    pub fn sanitized(&self) -> Self {
        let lookahead_interval_ms = self.lookahead_interval_ms.max(1);
        let min_ahead_ms = lookahead_interval_ms.saturating_mul(2);
        let mut config = Self {
            lookahead_interval_ms,
            ..self.clone()
        };
        if config.schedule_ahead_ms < min_ahead_ms {
            log::warn!(
                "[Config] schedule_ahead_ms {} is shorter than two lookahead periods; using {}",
                config.schedule_ahead_ms,
                min_ahead_ms
            );
            config.schedule_ahead_ms = min_ahead_ms;
        }
        config
    }
}

/// Click sound parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClickConfig {
    /// Pitch of the first beat of each bar
    pub accent_frequency_hz: f32,
    /// Pitch of every other beat
    pub beat_frequency_hz: f32,
    /// Burst length in seconds
    pub duration_secs: f32,
    /// Starting amplitude
    pub gain: f32,
    /// Amplitude reached at the end of the burst
    pub release_gain: f32,
}

impl Default for ClickConfig {
    fn default() -> Self {
        Self {
            accent_frequency_hz: 880.0,
            beat_frequency_hz: 440.0,
            duration_secs: 0.1,
            gain: 0.3,
            release_gain: 0.01,
        }
    }
}

/// Audio output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Capacity of the click cue ring shared with the render callback
    pub cue_queue_capacity: usize,
    /// Maximum number of clicks sounding at the same time
    pub max_voices: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            cue_queue_capacity: 32,
            max_voices: 4,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or defaults if the file is missing or invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the default asset location
    pub fn load() -> Self {
        Self::load_from_file("assets/metronome_config.json")
    }
}
