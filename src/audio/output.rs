//! Audio resource abstractions used by the beat scheduler.
//!
//! An [`AudioDevice`] hands out an [`AudioOutput`] on `acquire`. The output
//! is the scoped resource: it owns the audio clock and the click trigger, and
//! dropping it releases the underlying stream. The scheduler therefore never
//! calls an explicit release; letting the box go is the release.

use crate::audio::click::ClickKind;
use crate::error::AudioError;

/// An acquired audio resource: a drift-free clock plus a click trigger.
pub trait AudioOutput {
    /// Current position of the audio timeline in seconds.
    ///
    /// Returns `ClockLost` once the underlying stream has failed.
    fn now(&self) -> Result<f64, AudioError>;

    /// Queue a click to start at `at` seconds on the audio timeline.
    ///
    /// The click is a self-terminating burst; there is no way to cancel it
    /// once queued.
    fn trigger_click(&mut self, at: f64, kind: ClickKind) -> Result<(), AudioError>;
}

/// Factory for [`AudioOutput`] resources.
pub trait AudioDevice {
    /// Acquire the audio resource, or fail with `AudioUnavailable`.
    fn acquire(&mut self) -> Result<Box<dyn AudioOutput>, AudioError>;
}
