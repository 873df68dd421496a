//! Testability harness utilities.
//!
//! A fake audio device whose clock follows any [`HostClock`] and whose
//! failures can be injected at runtime, plus a listener that records every
//! callback with the host time it arrived at. The CLI's `schedule` dry run
//! uses the same pieces to run the scheduler without hardware.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;

use crate::audio::{AudioDevice, AudioOutput, ClickKind};
use crate::engine::clock::HostClock;
use crate::error::AudioError;
use crate::metronome::listener::{BeatListener, MetronomeEvent};
use crate::metronome::scheduler::ScheduledBeatEvent;

/// A click handed to the fake output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TriggeredClick {
    pub at: f64,
    pub kind: ClickKind,
}

/// Shared counters and failure switches for a [`FakeAudioDevice`].
#[derive(Debug, Default)]
pub struct FakeAudioControl {
    acquired: AtomicUsize,
    released: AtomicUsize,
    deny_access: AtomicBool,
    reject_format: AtomicBool,
    clock_lost: AtomicBool,
    failing_clicks: AtomicUsize,
    clicks: Mutex<Vec<TriggeredClick>>,
}

impl FakeAudioControl {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Acquisitions not yet released.
    pub fn outstanding(&self) -> usize {
        self.acquired() - self.released()
    }

    /// Make the next acquisitions fail as if permission was denied.
    pub fn deny_access(&self, deny: bool) {
        self.deny_access.store(deny, Ordering::SeqCst);
    }

    /// Make the next acquisitions fail as if the device only offered an
    /// unsupported sample format.
    pub fn reject_sample_format(&self, reject: bool) {
        self.reject_format.store(reject, Ordering::SeqCst);
    }

    /// Make the audio clock of live outputs fail.
    pub fn lose_clock(&self) {
        self.clock_lost.store(true, Ordering::SeqCst);
    }

    /// Fail the next `count` click triggers.
    pub fn fail_next_clicks(&self, count: usize) {
        self.failing_clicks.store(count, Ordering::SeqCst);
    }

    pub fn clicks(&self) -> Vec<TriggeredClick> {
        self.clicks.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

/// Audio device whose clock is a [`HostClock`].
pub struct FakeAudioDevice {
    clock: Arc<dyn HostClock>,
    control: Arc<FakeAudioControl>,
}

impl FakeAudioDevice {
    pub fn new<C: HostClock + 'static>(clock: C) -> Self {
        Self {
            clock: Arc::new(clock),
            control: Arc::new(FakeAudioControl::default()),
        }
    }

    pub fn control(&self) -> Arc<FakeAudioControl> {
        Arc::clone(&self.control)
    }
}

impl AudioDevice for FakeAudioDevice {
    fn acquire(&mut self) -> Result<Box<dyn AudioOutput>, AudioError> {
        if self.control.deny_access.load(Ordering::SeqCst) {
            return Err(AudioError::AudioUnavailable {
                reason: "permission denied".to_string(),
            });
        }
        if self.control.reject_format.load(Ordering::SeqCst) {
            return Err(AudioError::UnsupportedSampleFormat {
                format: "I16".to_string(),
            });
        }
        self.control.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeAudioOutput {
            clock: Arc::clone(&self.clock),
            control: Arc::clone(&self.control),
        }))
    }
}

struct FakeAudioOutput {
    clock: Arc<dyn HostClock>,
    control: Arc<FakeAudioControl>,
}

impl AudioOutput for FakeAudioOutput {
    fn now(&self) -> Result<f64, AudioError> {
        if self.control.clock_lost.load(Ordering::SeqCst) {
            return Err(AudioError::ClockLost {
                reason: "fake clock stopped".to_string(),
            });
        }
        Ok(self.clock.now_secs())
    }

    fn trigger_click(&mut self, at: f64, kind: ClickKind) -> Result<(), AudioError> {
        let failing = self
            .control
            .failing_clicks
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(AudioError::ClickTriggerFailed {
                beat: 0,
                reason: "injected failure".to_string(),
            });
        }
        if let Ok(mut clicks) = self.control.clicks.lock() {
            clicks.push(TriggeredClick { at, kind });
        }
        Ok(())
    }
}

impl Drop for FakeAudioOutput {
    fn drop(&mut self) {
        self.control.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// A callback observed by [`RecordingListener`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedEvent {
    /// Host time at which the callback ran
    pub at: Duration,
    pub event: MetronomeEvent,
}

/// Shared view of everything a [`RecordingListener`] saw.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<RecordedEvent>>>,
}

impl EventLog {
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// `on_beat_change` arguments in order, including stop notifications.
    pub fn beats(&self) -> Vec<u32> {
        self.events()
            .into_iter()
            .filter_map(|e| match e.event {
                MetronomeEvent::Beat { beat_index } => Some(beat_index),
                _ => None,
            })
            .collect()
    }

    /// Host times of the non-zero beat notifications.
    pub fn beat_times(&self) -> Vec<Duration> {
        self.events()
            .into_iter()
            .filter_map(|e| match e.event {
                MetronomeEvent::Beat { beat_index } if beat_index > 0 => Some(e.at),
                _ => None,
            })
            .collect()
    }

    pub fn scheduled(&self) -> Vec<ScheduledBeatEvent> {
        self.events()
            .into_iter()
            .filter_map(|e| match e.event {
                MetronomeEvent::Scheduled {
                    beat_index,
                    due_time,
                } => Some(ScheduledBeatEvent {
                    beat_index,
                    due_time,
                }),
                _ => None,
            })
            .collect()
    }

    pub fn completions(&self) -> usize {
        self.count(|event| matches!(event, MetronomeEvent::Completed))
    }

    pub fn errors(&self) -> Vec<i32> {
        self.events()
            .into_iter()
            .filter_map(|e| match e.event {
                MetronomeEvent::Error { code, .. } => Some(code),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&MetronomeEvent) -> bool) -> usize {
        self.events().iter().filter(|e| pred(&e.event)).count()
    }

    fn push(&self, at: Duration, event: MetronomeEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(RecordedEvent { at, event });
        }
    }
}

/// Listener that records every callback.
pub struct RecordingListener {
    clock: Arc<dyn HostClock>,
    log: EventLog,
}

impl RecordingListener {
    pub fn new<C: HostClock + 'static>(clock: C) -> Self {
        Self {
            clock: Arc::new(clock),
            log: EventLog::default(),
        }
    }

    pub fn log(&self) -> EventLog {
        self.log.clone()
    }

    fn record(&self, event: MetronomeEvent) {
        self.log.push(self.clock.now(), event);
    }
}

impl BeatListener for RecordingListener {
    fn on_beat_change(&mut self, beat_index: u32) -> ControlFlow<()> {
        self.record(MetronomeEvent::Beat { beat_index });
        ControlFlow::Continue(())
    }

    fn on_complete(&mut self) {
        self.record(MetronomeEvent::Completed);
    }

    fn on_error(&mut self, error: &AudioError) {
        self.record(MetronomeEvent::from_error(error));
    }

    fn on_beat_scheduled(&mut self, event: &ScheduledBeatEvent) {
        self.record(MetronomeEvent::Scheduled {
            beat_index: event.beat_index,
            due_time: event.due_time,
        });
    }
}
