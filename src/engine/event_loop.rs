//! Metronome: single-threaded host loop around the beat scheduler.
//!
//! The loop owns the scheduler, the host timer queue and the host clock.
//! Timers only fire from `poll`, one at a time, so scheduler callbacks never
//! overlap. Two drivers are provided:
//! - `run_for` advances a [`ManualClock`] through due timers (tests, dry runs)
//! - `run_until` sleeps on tokio timers in real time until the run ends or a
//!   shutdown future resolves

use std::future::Future;
use std::time::Duration;

use crate::engine::clock::{HostClock, ManualClock};
use crate::engine::timers::TimerQueue;
use crate::error::AudioError;
use crate::metronome::scheduler::{BeatScheduler, ScheduleState, StopNotice, StopReason};
use crate::metronome::signature::{MetronomeSettings, TempoPatch};

/// How a real-time run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The scheduler stopped on its own (count-in done, listener stop, error)
    Finished(Option<StopReason>),
    /// The shutdown future resolved first
    Interrupted,
}

pub struct Metronome<C: HostClock> {
    scheduler: BeatScheduler,
    timers: TimerQueue,
    clock: C,
}

impl<C: HostClock> Metronome<C> {
    pub fn new(scheduler: BeatScheduler, clock: C) -> Self {
        let mut timers = TimerQueue::new();
        timers.set_now(clock.now());
        Self {
            scheduler,
            timers,
            clock,
        }
    }

    pub fn start(&mut self, settings: MetronomeSettings) -> Result<(), AudioError> {
        self.sync_time();
        self.scheduler.start(settings, &mut self.timers)
    }

    pub fn stop(&mut self) -> bool {
        self.sync_time();
        self.scheduler.stop(&mut self.timers)
    }

    pub fn stop_silently(&mut self) -> bool {
        self.sync_time();
        self.scheduler
            .stop_with(StopNotice::Silent, &mut self.timers)
    }

    pub fn reconfigure(&mut self, patch: TempoPatch) -> Result<(), AudioError> {
        self.sync_time();
        self.scheduler.reconfigure(patch, &mut self.timers)
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn state(&self) -> &ScheduleState {
        self.scheduler.state()
    }

    pub fn scheduler(&self) -> &BeatScheduler {
        &self.scheduler
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Timers still waiting to fire.
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Fire every timer due at the clock's current time. Returns how many fired.
    pub fn poll(&mut self) -> usize {
        self.sync_time();
        let mut fired = 0;
        while let Some((id, task)) = self.timers.pop_due() {
            self.scheduler.handle_timer(id, task, &mut self.timers);
            fired += 1;
        }
        fired
    }

    /// Drive the loop in real time until the scheduler stops or `shutdown`
    /// resolves. On shutdown the run is stopped with a beat-0 notification.
    pub async fn run_until<F>(&mut self, shutdown: F) -> RunOutcome
    where
        F: Future,
    {
        tokio::pin!(shutdown);
        loop {
            self.poll();
            if !self.scheduler.is_running() {
                return RunOutcome::Finished(self.scheduler.last_stop_reason().cloned());
            }

            let wait = match self.timers.next_due() {
                Some(due) => due.saturating_sub(self.clock.now()),
                None => {
                    log::warn!("[Metronome] Running without pending timers; stopping");
                    self.stop();
                    continue;
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = &mut shutdown => {
                    self.stop();
                    return RunOutcome::Interrupted;
                }
            }
        }
    }

    fn sync_time(&mut self) {
        self.timers.set_now(self.clock.now());
    }
}

impl Metronome<ManualClock> {
    /// Advance virtual time by `duration`, firing each timer at its due time.
    pub fn run_for(&mut self, duration: Duration) {
        let end = self.clock.now() + duration;
        loop {
            match self.timers.next_due() {
                Some(due) if due <= end => {
                    self.clock.set(due);
                    self.poll();
                }
                _ => break,
            }
        }
        self.clock.set(end);
        self.poll();
    }

    /// Advance virtual time until the scheduler stops, up to `limit`.
    pub fn run_to_end(&mut self, limit: Duration) -> Option<StopReason> {
        let end = self.clock.now() + limit;
        while self.scheduler.is_running() {
            match self.timers.next_due() {
                Some(due) if due <= end => {
                    self.clock.set(due);
                    self.poll();
                }
                _ => break,
            }
        }
        self.scheduler.last_stop_reason().cloned()
    }
}
