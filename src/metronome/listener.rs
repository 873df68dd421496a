//! Callback protocol between the scheduler and its UI collaborator.

use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::{AudioError, ErrorCode};
use crate::metronome::scheduler::ScheduledBeatEvent;

/// Receives scheduler callbacks on the host loop.
///
/// `on_beat_change` may end the run by returning `ControlFlow::Break(())`;
/// the scheduler then performs a regular stop once the callback returns
/// (including the final `on_beat_change(0)`).
pub trait BeatListener {
    /// Current beat changed; `0` means no beat is active.
    fn on_beat_change(&mut self, beat_index: u32) -> ControlFlow<()>;

    /// A count-in bar finished. Never called in loop mode.
    fn on_complete(&mut self) {}

    /// A fatal error ended the run.
    fn on_error(&mut self, _error: &AudioError) {}

    /// A beat was queued ahead of playback.
    fn on_beat_scheduled(&mut self, _event: &ScheduledBeatEvent) {}
}

/// Serializable form of every scheduler callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetronomeEvent {
    Scheduled { beat_index: u32, due_time: f64 },
    Beat { beat_index: u32 },
    Completed,
    Error { code: i32, message: String },
}

impl MetronomeEvent {
    pub fn from_error(error: &AudioError) -> Self {
        MetronomeEvent::Error {
            code: error.code(),
            message: error.message(),
        }
    }
}

/// Forwards callbacks to a tokio broadcast channel.
///
/// Sending never blocks; events are dropped when nobody is subscribed.
pub struct BroadcastListener {
    tx: broadcast::Sender<MetronomeEvent>,
}

impl BroadcastListener {
    /// Create a listener with a 100-message buffer.
    pub fn new() -> (Self, broadcast::Receiver<MetronomeEvent>) {
        let (tx, rx) = broadcast::channel(100);
        (Self { tx }, rx)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MetronomeEvent> {
        self.tx.subscribe()
    }

    fn send(&self, event: MetronomeEvent) {
        let _ = self.tx.send(event);
    }
}

impl BeatListener for BroadcastListener {
    fn on_beat_change(&mut self, beat_index: u32) -> ControlFlow<()> {
        self.send(MetronomeEvent::Beat { beat_index });
        ControlFlow::Continue(())
    }

    fn on_complete(&mut self) {
        self.send(MetronomeEvent::Completed);
    }

    fn on_error(&mut self, error: &AudioError) {
        self.send(MetronomeEvent::from_error(error));
    }

    fn on_beat_scheduled(&mut self, event: &ScheduledBeatEvent) {
        self.send(MetronomeEvent::Scheduled {
            beat_index: event.beat_index,
            due_time: event.due_time,
        });
    }
}

/// Stops the run after a fixed number of beats have been shown.
pub struct StopAfter<L> {
    inner: L,
    remaining: u64,
}

impl<L: BeatListener> StopAfter<L> {
    pub fn beats(inner: L, beats: u64) -> Self {
        Self {
            inner,
            remaining: beats,
        }
    }

    pub fn into_inner(self) -> L {
        self.inner
    }
}

impl<L: BeatListener> BeatListener for StopAfter<L> {
    fn on_beat_change(&mut self, beat_index: u32) -> ControlFlow<()> {
        let flow = self.inner.on_beat_change(beat_index);
        if beat_index == 0 {
            return flow;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            return ControlFlow::Break(());
        }
        flow
    }

    fn on_complete(&mut self) {
        self.inner.on_complete();
    }

    fn on_error(&mut self, error: &AudioError) {
        self.inner.on_error(error);
    }

    fn on_beat_scheduled(&mut self, event: &ScheduledBeatEvent) {
        self.inner.on_beat_scheduled(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Beats(Vec<u32>);

    impl BeatListener for Beats {
        fn on_beat_change(&mut self, beat_index: u32) -> ControlFlow<()> {
            self.0.push(beat_index);
            ControlFlow::Continue(())
        }
    }

    #[test]
    fn test_broadcast_listener_forwards_events() {
        let (mut listener, mut rx) = BroadcastListener::new();
        listener.on_beat_scheduled(&ScheduledBeatEvent {
            beat_index: 1,
            due_time: 0.05,
        });
        assert!(listener.on_beat_change(1).is_continue());
        listener.on_complete();

        assert_eq!(
            rx.try_recv().unwrap(),
            MetronomeEvent::Scheduled {
                beat_index: 1,
                due_time: 0.05
            }
        );
        assert_eq!(rx.try_recv().unwrap(), MetronomeEvent::Beat { beat_index: 1 });
        assert_eq!(rx.try_recv().unwrap(), MetronomeEvent::Completed);
    }

    #[test]
    fn test_broadcast_without_subscribers_does_not_fail() {
        let (mut listener, rx) = BroadcastListener::new();
        drop(rx);
        assert!(listener.on_beat_change(2).is_continue());
    }

    #[test]
    fn test_error_event_carries_code() {
        let event = MetronomeEvent::from_error(&AudioError::ClockLost {
            reason: "gone".to_string(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["code"], 1004);
    }

    #[test]
    fn test_stop_after_breaks_on_last_beat() {
        let mut listener = StopAfter::beats(Beats::default(), 3);
        assert!(listener.on_beat_change(1).is_continue());
        assert!(listener.on_beat_change(2).is_continue());
        assert!(listener.on_beat_change(3).is_break());
        // The stop notification itself is passed through untouched.
        assert!(listener.on_beat_change(0).is_continue());
        assert_eq!(listener.into_inner().0, vec![1, 2, 3, 0]);
    }
}
