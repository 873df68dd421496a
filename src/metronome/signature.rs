//! Time signatures, run modes and validated start settings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AudioError;

/// Supported time signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeSignature {
    #[default]
    #[serde(rename = "4/4")]
    FourFour,
    #[serde(rename = "6/8")]
    SixEight,
    #[serde(rename = "9/8")]
    NineEight,
}

impl TimeSignature {
    pub const ALL: [TimeSignature; 3] = [
        TimeSignature::FourFour,
        TimeSignature::SixEight,
        TimeSignature::NineEight,
    ];

    /// Number of clicks per bar.
    ///
    /// 9/8 clicks on the dotted quarter (3 per bar); 6/8 clicks every eighth
    /// note (6 per bar) so the subdivision is audible.
    pub fn beats_per_bar(self) -> u32 {
        match self {
            TimeSignature::FourFour => 4,
            TimeSignature::SixEight => 6,
            TimeSignature::NineEight => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeSignature::FourFour => "4/4",
            TimeSignature::SixEight => "6/8",
            TimeSignature::NineEight => "9/8",
        }
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeSignature {
    type Err = AudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "4/4" => Ok(TimeSignature::FourFour),
            "6/8" => Ok(TimeSignature::SixEight),
            "9/8" => Ok(TimeSignature::NineEight),
            other => Err(AudioError::UnsupportedTimeSignature {
                value: other.to_string(),
            }),
        }
    }
}

/// How long a run lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetronomeMode {
    /// Repeat bars until stopped
    #[default]
    Loop,
    /// Play exactly one bar, then complete
    CountIn,
}

impl FromStr for MetronomeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "loop" => Ok(MetronomeMode::Loop),
            "count-in" | "count_in" | "countin" => Ok(MetronomeMode::CountIn),
            other => Err(format!("unknown metronome mode '{}'", other)),
        }
    }
}

/// Parameters passed to `start`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetronomeSettings {
    pub tempo_bpm: f64,
    pub time_signature: TimeSignature,
    pub mode: MetronomeMode,
}

impl MetronomeSettings {
    pub fn new(tempo_bpm: f64, time_signature: TimeSignature, mode: MetronomeMode) -> Self {
        Self {
            tempo_bpm,
            time_signature,
            mode,
        }
    }

    pub fn validate(&self) -> Result<(), AudioError> {
        validate_tempo(self.tempo_bpm)
    }

    /// Seconds between two consecutive beats.
    pub fn seconds_per_beat(&self) -> f64 {
        seconds_per_beat(self.tempo_bpm)
    }
}

/// Partial update applied to a running scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TempoPatch {
    #[serde(default)]
    pub tempo_bpm: Option<f64>,
    #[serde(default)]
    pub time_signature: Option<TimeSignature>,
}

impl TempoPatch {
    pub fn tempo(tempo_bpm: f64) -> Self {
        Self {
            tempo_bpm: Some(tempo_bpm),
            time_signature: None,
        }
    }

    pub fn signature(time_signature: TimeSignature) -> Self {
        Self {
            tempo_bpm: None,
            time_signature: Some(time_signature),
        }
    }
}

/// Fastest accepted tempo.
pub const MAX_TEMPO_BPM: f64 = 1000.0;

pub(crate) fn validate_tempo(tempo_bpm: f64) -> Result<(), AudioError> {
    if tempo_bpm > 0.0 && tempo_bpm <= MAX_TEMPO_BPM {
        Ok(())
    } else {
        Err(AudioError::TempoInvalid { bpm: tempo_bpm })
    }
}

#[inline]
pub fn seconds_per_beat(tempo_bpm: f64) -> f64 {
    60.0 / tempo_bpm
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beats_per_bar_mapping() {
        assert_eq!(TimeSignature::FourFour.beats_per_bar(), 4);
        assert_eq!(TimeSignature::NineEight.beats_per_bar(), 3);
        assert_eq!(TimeSignature::SixEight.beats_per_bar(), 6);
    }

    #[test]
    fn test_parse_signatures() {
        for signature in TimeSignature::ALL {
            assert_eq!(signature.as_str().parse::<TimeSignature>(), Ok(signature));
        }
        assert_eq!(" 9/8 ".parse::<TimeSignature>(), Ok(TimeSignature::NineEight));

        match "3/4".parse::<TimeSignature>() {
            Err(AudioError::UnsupportedTimeSignature { value }) => assert_eq!(value, "3/4"),
            other => panic!("Expected UnsupportedTimeSignature, got {:?}", other),
        }
    }

    #[test]
    fn test_signature_serde_uses_musical_notation() {
        let json = serde_json::to_string(&TimeSignature::SixEight).unwrap();
        assert_eq!(json, "\"6/8\"");
        let parsed: TimeSignature = serde_json::from_str("\"9/8\"").unwrap();
        assert_eq!(parsed, TimeSignature::NineEight);
    }

    #[test]
    fn test_parse_modes() {
        assert_eq!("loop".parse::<MetronomeMode>(), Ok(MetronomeMode::Loop));
        assert_eq!("count-in".parse::<MetronomeMode>(), Ok(MetronomeMode::CountIn));
        assert_eq!("CountIn".parse::<MetronomeMode>(), Ok(MetronomeMode::CountIn));
        assert!("forever".parse::<MetronomeMode>().is_err());
    }

    #[test]
    fn test_tempo_validation() {
        assert!(validate_tempo(120.0).is_ok());
        assert!(validate_tempo(0.5).is_ok());
        assert_eq!(
            validate_tempo(0.0),
            Err(AudioError::TempoInvalid { bpm: 0.0 })
        );
        assert!(validate_tempo(-60.0).is_err());
        assert!(validate_tempo(f64::NAN).is_err());
        assert!(validate_tempo(f64::INFINITY).is_err());
    }

    #[test]
    fn test_tempo_upper_bound() {
        assert!(validate_tempo(MAX_TEMPO_BPM).is_ok());
        assert!(validate_tempo(MAX_TEMPO_BPM + 1.0).is_err());
        assert_eq!(
            validate_tempo(1e20),
            Err(AudioError::TempoInvalid { bpm: 1e20 })
        );
    }

    #[test]
    fn test_seconds_per_beat() {
        assert_eq!(seconds_per_beat(120.0), 0.5);
        assert_eq!(seconds_per_beat(50.0), 1.2);
        assert_eq!(seconds_per_beat(60.0), 1.0);
    }
}
