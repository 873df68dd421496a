//! BeatScheduler - lookahead metronome scheduling
//!
//! Two clocks are involved:
//! - the audio clock (owned by the acquired [`AudioOutput`]) decides *when a
//!   click sounds*; it is drift-free and sample accurate
//! - the host loop's timers decide *when to queue* upcoming clicks; they may
//!   be tens of milliseconds late without affecting what is heard
//!
//! Every lookahead tick queues all beats whose due time falls inside the
//! schedule-ahead window, triggers their clicks on the audio timeline and
//! posts a host-timer notification so the UI sees the beat change when it
//! becomes audible.
//!
//! All mutation of [`ScheduleState`] happens here, on the host loop thread.

use std::collections::VecDeque;
use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::audio::{AudioDevice, AudioOutput, ClickKind};
use crate::config::MetronomeConfig;
use crate::engine::timers::{TimerId, TimerQueue, TimerTask};
use crate::error::{log_audio_error, AudioError, ErrorCode};
use crate::metronome::listener::BeatListener;
use crate::metronome::signature::{
    seconds_per_beat, validate_tempo, MetronomeMode, MetronomeSettings, TempoPatch,
    TimeSignature,
};

/// A beat queued ahead of playback.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduledBeatEvent {
    pub beat_index: u32,
    /// Audio-clock seconds at which the click sounds
    pub due_time: f64,
}

/// Snapshot of the running schedule.
///
/// While running, `current_beat_index` is the index of the next beat to be
/// queued (always in `1..=beats_per_bar`) and `next_beat_due_time` its
/// audio-clock due time. Both reset to zero when the run ends.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleState {
    pub is_running: bool,
    pub tempo_bpm: f64,
    pub time_signature: TimeSignature,
    pub mode: MetronomeMode,
    pub beats_per_bar: u32,
    pub current_beat_index: u32,
    pub next_beat_due_time: f64,
}

impl Default for ScheduleState {
    fn default() -> Self {
        let time_signature = TimeSignature::default();
        Self {
            is_running: false,
            tempo_bpm: 120.0,
            time_signature,
            mode: MetronomeMode::default(),
            beats_per_bar: time_signature.beats_per_bar(),
            current_beat_index: 0,
            next_beat_due_time: 0.0,
        }
    }
}

/// Whether `stop` reports beat 0 to the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopNotice {
    Notify,
    Silent,
}

/// Why the most recent run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    Stopped,
    Completed,
    Failed(AudioError),
}

/// Upper bound on beats queued by a single lookahead tick; the rest wait
/// for the next tick.
const MAX_BEATS_PER_TICK: usize = 64;

enum Advance {
    Continue,
    BarComplete,
}

pub struct BeatScheduler {
    device: Box<dyn AudioDevice>,
    /// Present exactly while running; dropping it releases the audio resource
    output: Option<Box<dyn AudioOutput>>,
    listener: Box<dyn BeatListener>,
    config: MetronomeConfig,
    state: ScheduleState,
    generation: u64,
    lookahead: Option<TimerId>,
    notifications: VecDeque<TimerId>,
    completion: Option<TimerId>,
    last_notification_at: Duration,
    last_stop: Option<StopReason>,
}

impl BeatScheduler {
    pub fn new(
        device: Box<dyn AudioDevice>,
        listener: Box<dyn BeatListener>,
        config: MetronomeConfig,
    ) -> Self {
        Self {
            device,
            output: None,
            listener,
            config: config.sanitized(),
            state: ScheduleState::default(),
            generation: 0,
            lookahead: None,
            notifications: VecDeque::new(),
            completion: None,
            last_notification_at: Duration::ZERO,
            last_stop: None,
        }
    }

    pub fn state(&self) -> &ScheduleState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running
    }

    pub fn last_stop_reason(&self) -> Option<&StopReason> {
        self.last_stop.as_ref()
    }

    pub fn config(&self) -> &MetronomeConfig {
        &self.config
    }

    /// Start a run.
    ///
    /// Acquires the audio resource (or reuses it when restarting a running
    /// scheduler), resets the bar to beat 1, and arms the lookahead tick.
    /// The first beat is due one start margin after the current audio time.
    ///
    /// # Errors
    /// `TempoInvalid` for a tempo outside `(0, MAX_TEMPO_BPM]`,
    /// `AudioUnavailable` when the audio resource cannot be acquired or its
    /// clock cannot be read. Either way nothing stays acquired and the
    /// scheduler is left stopped (or, for an invalid restart, still running
    /// the previous settings). A restart whose reused output has lost its
    /// clock ends the previous run with a beat-0 notification.
    pub fn start(
        &mut self,
        settings: MetronomeSettings,
        timers: &mut TimerQueue,
    ) -> Result<(), AudioError> {
        settings.validate()?;

        let (output, restarted) = match self.output.take() {
            Some(output) => {
                debug!("[BeatScheduler] Restarting; reusing audio output");
                self.halt(timers);
                (output, true)
            }
            None => {
                let output = self.device.acquire().map_err(|err| {
                    let err = unavailable(err);
                    log_audio_error(&err, "BeatScheduler::start");
                    err
                })?;
                (output, false)
            }
        };

        let now = match output.now() {
            Ok(now) => now,
            Err(err) => {
                // Drops (releases) the output before reporting.
                drop(output);
                let err = unavailable(err);
                log_audio_error(&err, "BeatScheduler::start");
                if restarted {
                    self.last_stop = Some(StopReason::Failed(err.clone()));
                    let _ = self.listener.on_beat_change(0);
                }
                return Err(err);
            }
        };

        self.generation += 1;
        self.state = ScheduleState {
            is_running: true,
            tempo_bpm: settings.tempo_bpm,
            time_signature: settings.time_signature,
            mode: settings.mode,
            beats_per_bar: settings.time_signature.beats_per_bar(),
            current_beat_index: 1,
            next_beat_due_time: now + self.config.start_margin_secs(),
        };
        self.output = Some(output);
        self.last_notification_at = timers.now();
        self.last_stop = None;

        info!(
            "[BeatScheduler] Started {:?} at {} BPM in {} ({} beats per bar)",
            settings.mode,
            settings.tempo_bpm,
            settings.time_signature,
            self.state.beats_per_bar
        );

        self.lookahead = Some(timers.schedule(
            Duration::ZERO,
            TimerTask::Lookahead {
                generation: self.generation,
            },
        ));
        Ok(())
    }

    /// Stop the run and report beat 0. Returns false if nothing was running.
    pub fn stop(&mut self, timers: &mut TimerQueue) -> bool {
        self.stop_with(StopNotice::Notify, timers)
    }

    /// Stop the run, optionally without the beat-0 notification.
    ///
    /// Pending notifications are cancelled; clicks already handed to the
    /// audio subsystem play out on their own.
    pub fn stop_with(&mut self, notice: StopNotice, timers: &mut TimerQueue) -> bool {
        if !self.state.is_running {
            return false;
        }

        self.end_run(timers, StopReason::Stopped);
        info!("[BeatScheduler] Stopped");

        if notice == StopNotice::Notify {
            // The run is already over; a Break here has nothing left to stop.
            let _ = self.listener.on_beat_change(0);
        }
        true
    }

    /// Change tempo and/or time signature of the running schedule.
    ///
    /// Beats already queued keep their due times, and so does the next beat;
    /// the new tempo governs the spacing from the next beat onwards. If the
    /// next beat index no longer fits the new bar it wraps to 1, or ends a
    /// count-in.
    pub fn reconfigure(
        &mut self,
        patch: TempoPatch,
        timers: &mut TimerQueue,
    ) -> Result<(), AudioError> {
        if !self.state.is_running {
            return Err(AudioError::NotRunning);
        }
        if let Some(tempo_bpm) = patch.tempo_bpm {
            validate_tempo(tempo_bpm)?;
        }

        if let Some(tempo_bpm) = patch.tempo_bpm {
            self.state.tempo_bpm = tempo_bpm;
        }
        if let Some(time_signature) = patch.time_signature {
            self.state.time_signature = time_signature;
            self.state.beats_per_bar = time_signature.beats_per_bar();
        }

        info!(
            "[BeatScheduler] Reconfigured to {} BPM in {}",
            self.state.tempo_bpm, self.state.time_signature
        );

        let bar_overflow = self.state.current_beat_index > self.state.beats_per_bar;
        if bar_overflow && self.completion.is_none() {
            match self.state.mode {
                MetronomeMode::Loop => self.state.current_beat_index = 1,
                MetronomeMode::CountIn => self.finish_bar(timers),
            }
        }
        Ok(())
    }

    /// Dispatch a host-loop task posted by this scheduler.
    pub fn handle_timer(&mut self, id: TimerId, task: TimerTask, timers: &mut TimerQueue) {
        match task {
            TimerTask::Lookahead { generation } => {
                if !self.is_current(generation) {
                    return;
                }
                self.lookahead = None;
                self.tick(timers);
            }
            TimerTask::NotifyBeat {
                generation,
                beat_index,
            } => {
                if !self.is_current(generation) {
                    return;
                }
                self.notifications.retain(|&pending| pending != id);
                if self.listener.on_beat_change(beat_index).is_break() {
                    self.stop(timers);
                }
            }
            TimerTask::Complete { generation } => {
                if !self.is_current(generation) {
                    return;
                }
                self.completion = None;
                self.end_run(timers, StopReason::Completed);
                info!("[BeatScheduler] Count-in complete");
                self.listener.on_complete();
            }
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.state.is_running && generation == self.generation
    }

    /// Queue every beat due before `audio_now + schedule_ahead`.
    fn tick(&mut self, timers: &mut TimerQueue) {
        let audio_now = match self.audio_now() {
            Ok(now) => now,
            Err(err) => return self.fail(err, timers),
        };
        let horizon = audio_now + self.config.schedule_ahead_secs();

        let mut queued = 0;
        while self.state.next_beat_due_time < horizon {
            if queued == MAX_BEATS_PER_TICK {
                debug!("[BeatScheduler] Tick queued {} beats; deferring the rest", queued);
                break;
            }
            queued += 1;

            let event = ScheduledBeatEvent {
                beat_index: self.state.current_beat_index,
                due_time: self.state.next_beat_due_time,
            };
            self.listener.on_beat_scheduled(&event);

            if let Err(err) = self.trigger_click(&event) {
                return self.fail(err, timers);
            }
            self.queue_notification(&event, audio_now, timers);

            if let Advance::BarComplete = self.advance() {
                return self.finish_bar_at(audio_now, timers);
            }
        }

        self.lookahead = Some(timers.schedule(
            self.config.lookahead_interval(),
            TimerTask::Lookahead {
                generation: self.generation,
            },
        ));
    }

    fn advance(&mut self) -> Advance {
        self.state.next_beat_due_time += seconds_per_beat(self.state.tempo_bpm);

        let next = self.state.current_beat_index + 1;
        if next <= self.state.beats_per_bar {
            self.state.current_beat_index = next;
            return Advance::Continue;
        }
        match self.state.mode {
            MetronomeMode::Loop => {
                self.state.current_beat_index = 1;
                Advance::Continue
            }
            MetronomeMode::CountIn => Advance::BarComplete,
        }
    }

    fn audio_now(&self) -> Result<f64, AudioError> {
        match &self.output {
            Some(output) => output.now(),
            None => Err(AudioError::ClockLost {
                reason: "audio output missing while running".to_string(),
            }),
        }
    }

    /// Hand one click to the audio subsystem.
    ///
    /// Only clock loss is fatal; any other failure is logged and the beat
    /// still counts.
    fn trigger_click(&mut self, event: &ScheduledBeatEvent) -> Result<(), AudioError> {
        let Some(output) = self.output.as_mut() else {
            return Err(AudioError::ClockLost {
                reason: "audio output missing while running".to_string(),
            });
        };

        match output.trigger_click(event.due_time, ClickKind::for_beat(event.beat_index)) {
            Ok(()) => Ok(()),
            Err(err @ AudioError::ClockLost { .. }) => Err(err),
            Err(err) => {
                let reason = match err {
                    AudioError::ClickTriggerFailed { reason, .. } => reason,
                    other => other.message(),
                };
                let err = AudioError::ClickTriggerFailed {
                    beat: event.beat_index,
                    reason,
                };
                log_audio_error(&err, "BeatScheduler::tick");
                Ok(())
            }
        }
    }

    fn queue_notification(
        &mut self,
        event: &ScheduledBeatEvent,
        audio_now: f64,
        timers: &mut TimerQueue,
    ) {
        let delay = Duration::from_secs_f64((event.due_time - audio_now).max(0.0));
        // Keep notifications in beat order even if the two clocks wander.
        let at = (timers.now() + delay).max(self.last_notification_at);
        self.last_notification_at = at;

        let id = timers.schedule_at(
            at,
            TimerTask::NotifyBeat {
                generation: self.generation,
                beat_index: event.beat_index,
            },
        );
        self.notifications.push_back(id);
    }

    fn finish_bar(&mut self, timers: &mut TimerQueue) {
        match self.audio_now() {
            Ok(audio_now) => self.finish_bar_at(audio_now, timers),
            Err(err) => self.fail(err, timers),
        }
    }

    /// The count-in bar is fully queued: stop ticking and complete when the
    /// next downbeat would have been due.
    fn finish_bar_at(&mut self, audio_now: f64, timers: &mut TimerQueue) {
        if let Some(id) = self.lookahead.take() {
            timers.cancel(id);
        }
        let delay =
            Duration::from_secs_f64((self.state.next_beat_due_time - audio_now).max(0.0));
        let at = (timers.now() + delay).max(self.last_notification_at);
        self.completion = Some(timers.schedule_at(
            at,
            TimerTask::Complete {
                generation: self.generation,
            },
        ));
        debug!(
            "[BeatScheduler] Count-in bar queued; completing at {:.3}s",
            self.state.next_beat_due_time
        );
    }

    fn fail(&mut self, err: AudioError, timers: &mut TimerQueue) {
        log_audio_error(&err, "BeatScheduler::tick");
        self.end_run(timers, StopReason::Failed(err.clone()));
        let _ = self.listener.on_beat_change(0);
        self.listener.on_error(&err);
    }

    /// Cancel all pending tasks and reset state; also releases the output
    /// unless it has already been taken for a restart.
    fn end_run(&mut self, timers: &mut TimerQueue, reason: StopReason) {
        self.halt(timers);
        self.output = None;
        self.last_stop = Some(reason);
    }

    fn halt(&mut self, timers: &mut TimerQueue) {
        if let Some(id) = self.lookahead.take() {
            timers.cancel(id);
        }
        if let Some(id) = self.completion.take() {
            timers.cancel(id);
        }
        for id in self.notifications.drain(..) {
            timers.cancel(id);
        }
        self.generation += 1;
        self.state.is_running = false;
        self.state.current_beat_index = 0;
        self.state.next_beat_due_time = 0.0;
    }
}

/// Every failure to obtain a usable output at start surfaces as
/// `AudioUnavailable`.
fn unavailable(err: AudioError) -> AudioError {
    match err {
        err @ AudioError::AudioUnavailable { .. } => err,
        other => AudioError::AudioUnavailable {
            reason: other.message(),
        },
    }
}
