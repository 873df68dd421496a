// Practice Metronome Core - lookahead beat scheduling
// Audio-clock-anchored clicks with host-loop beat notifications

// Module declarations
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod metronome;
pub mod testing;

// Re-exports for convenience
pub use engine::{Metronome, RunOutcome};
pub use error::{AudioError, ErrorCode};
pub use metronome::{
    BeatListener, BeatScheduler, MetronomeMode, MetronomeSettings, ScheduleState,
    ScheduledBeatEvent, TempoPatch, TimeSignature,
};

use tracing_subscriber::EnvFilter;

/// Initialize logging for binaries.
///
/// `log` records from the library are bridged into the tracing subscriber.
/// Defaults to `info`; `RUST_LOG` overrides. Safe to call more than once.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
