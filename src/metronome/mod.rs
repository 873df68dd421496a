//! Metronome scheduling: time signatures, the lookahead beat scheduler, the
//! callback protocol and the visual indicator model.

pub mod indicator;
pub mod listener;
pub mod scheduler;
pub mod signature;

pub use indicator::BeatIndicator;
pub use listener::{BeatListener, BroadcastListener, MetronomeEvent, StopAfter};
pub use scheduler::{
    BeatScheduler, ScheduleState, ScheduledBeatEvent, StopNotice, StopReason,
};
pub use signature::{
    MetronomeMode, MetronomeSettings, TempoPatch, TimeSignature, MAX_TEMPO_BPM,
};
