// Audio error types and constants

use crate::error::ErrorCode;
use crate::metronome::signature::MAX_TEMPO_BPM;
use log::{error, warn};
use std::fmt;

/// Audio error code constants
///
/// Single source of truth for the numeric codes reported by [`AudioError`].
///
/// Error code range: 1001-1007
pub struct AudioErrorCodes {}

impl AudioErrorCodes {
    /// Tempo value is invalid (must be finite and > 0)
    pub const TEMPO_INVALID: i32 = 1001;

    /// Time signature string is not one of the supported signatures
    pub const UNSUPPORTED_TIME_SIGNATURE: i32 = 1002;

    /// Audio output could not be acquired (permission or hardware failure)
    pub const AUDIO_UNAVAILABLE: i32 = 1003;

    /// Audio clock stopped advancing or the stream died mid-run
    pub const CLOCK_LOST: i32 = 1004;

    /// A single scheduled click could not be handed to the audio subsystem
    pub const CLICK_TRIGGER_FAILED: i32 = 1005;

    /// Scheduler is not running
    pub const NOT_RUNNING: i32 = 1006;

    /// Audio device only offers a sample format we cannot render
    pub const UNSUPPORTED_SAMPLE_FORMAT: i32 = 1007;
}

/// Log an audio error with structured context
///
/// Fatal errors are logged at `error` level; transient per-click failures
/// only at `warn` since playback continues.
pub fn log_audio_error(err: &AudioError, context: &str) {
    if err.is_fatal() {
        error!(
            "Audio error in {}: code={}, component=BeatScheduler, message={}",
            context,
            err.code(),
            err.message()
        );
    } else {
        warn!(
            "Audio warning in {}: code={}, component=BeatScheduler, message={}",
            context,
            err.code(),
            err.message()
        );
    }
}

/// Audio and scheduling errors
///
/// Only `AudioUnavailable` and `ClockLost` are fatal; `ClickTriggerFailed`
/// is swallowed by the scheduler after logging.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// Tempo must be greater than 0 and at most `MAX_TEMPO_BPM`
    TempoInvalid { bpm: f64 },

    /// Time signature not in {4/4, 6/8, 9/8}
    UnsupportedTimeSignature { value: String },

    /// Audio resource could not be acquired at start
    AudioUnavailable { reason: String },

    /// Audio clock failed while running
    ClockLost { reason: String },

    /// One beat's click could not be scheduled
    ClickTriggerFailed { beat: u32, reason: String },

    /// Operation requires a running scheduler
    NotRunning,

    /// Device sample format is not supported by the click renderer
    UnsupportedSampleFormat { format: String },
}

impl AudioError {
    /// Whether the error ends (or prevents) a run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AudioError::AudioUnavailable { .. }
                | AudioError::ClockLost { .. }
                | AudioError::UnsupportedSampleFormat { .. }
        )
    }
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::TempoInvalid { .. } => AudioErrorCodes::TEMPO_INVALID,
            AudioError::UnsupportedTimeSignature { .. } => {
                AudioErrorCodes::UNSUPPORTED_TIME_SIGNATURE
            }
            AudioError::AudioUnavailable { .. } => AudioErrorCodes::AUDIO_UNAVAILABLE,
            AudioError::ClockLost { .. } => AudioErrorCodes::CLOCK_LOST,
            AudioError::ClickTriggerFailed { .. } => AudioErrorCodes::CLICK_TRIGGER_FAILED,
            AudioError::NotRunning => AudioErrorCodes::NOT_RUNNING,
            AudioError::UnsupportedSampleFormat { .. } => {
                AudioErrorCodes::UNSUPPORTED_SAMPLE_FORMAT
            }
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::TempoInvalid { bpm } => {
                format!(
                    "Tempo must be a positive number of BPM up to {} (got {})",
                    MAX_TEMPO_BPM, bpm
                )
            }
            AudioError::UnsupportedTimeSignature { value } => {
                format!(
                    "Unsupported time signature '{}' (expected 4/4, 6/8 or 9/8)",
                    value
                )
            }
            AudioError::AudioUnavailable { reason } => {
                format!("Audio output unavailable: {}", reason)
            }
            AudioError::ClockLost { reason } => format!("Audio clock lost: {}", reason),
            AudioError::ClickTriggerFailed { beat, reason } => {
                format!("Failed to trigger click for beat {}: {}", beat, reason)
            }
            AudioError::NotRunning => {
                "Metronome not running. Call start() first.".to_string()
            }
            AudioError::UnsupportedSampleFormat { format } => {
                format!("Unsupported output sample format: {}", format)
            }
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AudioError {}
