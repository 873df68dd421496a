//! Host clock abstraction.
//!
//! The host loop measures wall-clock time through [`HostClock`] so tests can
//! substitute a deterministic [`ManualClock`] for the real one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Monotonic time elapsed since the clock's origin.
pub trait HostClock: Send + Sync {
    fn now(&self) -> Duration;

    fn now_secs(&self) -> f64 {
        self.now().as_secs_f64()
    }
}

/// Wall-clock time backed by `tokio::time::Instant`.
///
/// Using tokio's instant means a paused test runtime moves this clock too.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: tokio::time::Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl HostClock for SystemClock {
    fn now(&self) -> Duration {
        tokio::time::Instant::now().saturating_duration_since(self.origin)
    }
}

/// Deterministic clock that only moves when told to.
///
/// Clones share the same time, so one handle can drive the host loop while
/// another stands in for the audio clock.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move to `at`. Time never goes backwards; earlier values are ignored.
    pub fn set(&self, at: Duration) {
        self.nanos
            .fetch_max(at.as_nanos() as u64, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.nanos
            .fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl HostClock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}
