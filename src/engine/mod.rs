//! Engine module housing the host-side runtime.
//!
//! `clock` abstracts wall-clock time, `timers` is the host timer queue and
//! `event_loop` drives the beat scheduler on a single thread.

pub mod clock;
pub mod event_loop;
pub mod timers;

pub use clock::{HostClock, ManualClock, SystemClock};
pub use event_loop::{Metronome, RunOutcome};
pub use timers::{TimerId, TimerQueue, TimerTask};
