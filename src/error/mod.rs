// Error types for the practice metronome
//
// This module defines the audio/scheduling error taxonomy, providing
// structured error handling with numeric codes so callers (CLI, UI shells)
// can react to failures without matching on message text.

mod audio;

pub use audio::{log_audio_error, AudioError, AudioErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// every caller of the scheduler.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
