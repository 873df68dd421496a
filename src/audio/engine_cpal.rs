//! CPAL output backend for desktop platforms (Linux, macOS, Windows)
//!
//! The output stream's rendered-frame counter is the audio clock: it only
//! advances when the hardware consumes samples, so it cannot drift against
//! what the listener hears. Clicks are handed to the render callback as
//! frame-stamped cues through a lock-free ring.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rtrb::Producer;

use crate::audio::click::{ClickBank, ClickKind};
use crate::audio::mixer::{cue_channel, ClickCue, ClickMixer};
use crate::audio::output::{AudioDevice, AudioOutput};
use crate::config::{AudioConfig, ClickConfig};
use crate::error::AudioError;

/// Opens the default output device on `acquire`.
pub struct CpalDevice {
    click: ClickConfig,
    audio: AudioConfig,
}

impl CpalDevice {
    pub fn new(click: ClickConfig, audio: AudioConfig) -> Self {
        Self { click, audio }
    }
}

impl AudioDevice for CpalDevice {
    fn acquire(&mut self) -> Result<Box<dyn AudioOutput>, AudioError> {
        let output = CpalOutput::open(&self.click, &self.audio)?;
        Ok(Box::new(output))
    }
}

/// A running output stream. Dropping it closes the stream.
pub struct CpalOutput {
    stream: cpal::Stream,
    /// Frames rendered since the stream started
    frame_counter: Arc<AtomicU64>,
    /// Set by the stream error callback
    failed: Arc<AtomicBool>,
    cues: Producer<ClickCue>,
    sample_rate: u32,
}

impl CpalOutput {
    fn open(click: &ClickConfig, audio: &AudioConfig) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| AudioError::AudioUnavailable {
                reason: "No default output device found".to_string(),
            })?;

        let config = device
            .default_output_config()
            .map_err(|e| AudioError::AudioUnavailable {
                reason: format!("Failed to get default output config: {:?}", e),
            })?;

        if config.sample_format() != cpal::SampleFormat::F32 {
            return Err(AudioError::UnsupportedSampleFormat {
                format: format!("{:?}", config.sample_format()),
            });
        }

        let stream_config: cpal::StreamConfig = config.clone().into();
        let channels_count = stream_config.channels as usize;
        let sample_rate = stream_config.sample_rate.0;

        let (cue_tx, cue_rx) = cue_channel(audio.cue_queue_capacity);
        let mut mixer = ClickMixer::new(
            ClickBank::new(click, sample_rate),
            cue_rx,
            audio.max_voices,
        );

        let frame_counter = Arc::new(AtomicU64::new(0));
        let failed = Arc::new(AtomicBool::new(false));

        let render_counter = Arc::clone(&frame_counter);
        let error_flag = Arc::clone(&failed);
        let err_fn = move |err: cpal::StreamError| {
            if stream_error_is_fatal(&err) {
                log::error!("[CpalOutput] Output stream lost: {}", err);
                error_flag.store(true, Ordering::SeqCst);
            } else {
                log::warn!("[CpalOutput] Output stream error: {}", err);
            }
        };

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let start_frame = render_counter.load(Ordering::Relaxed);
                    mixer.render(data, channels_count, start_frame);
                    let frame_count = data.len() / channels_count.max(1);
                    render_counter.fetch_add(frame_count as u64, Ordering::Relaxed);
                },
                err_fn,
                None,
            )
            .map_err(|e| AudioError::AudioUnavailable {
                reason: format!("Failed to build output stream: {:?}", e),
            })?;

        stream.play().map_err(|e| AudioError::AudioUnavailable {
            reason: format!("Output start failed: {}", e),
        })?;

        log::info!(
            "[CpalOutput] Output stream started: {} Hz, {} channel(s)",
            sample_rate,
            channels_count
        );

        Ok(Self {
            stream,
            frame_counter,
            failed,
            cues: cue_tx,
            sample_rate,
        })
    }

    fn check_alive(&self) -> Result<(), AudioError> {
        if self.failed.load(Ordering::SeqCst) {
            return Err(AudioError::ClockLost {
                reason: "output stream reported an error".to_string(),
            });
        }
        Ok(())
    }
}

impl AudioOutput for CpalOutput {
    fn now(&self) -> Result<f64, AudioError> {
        self.check_alive()?;
        let frames = self.frame_counter.load(Ordering::Relaxed);
        Ok(frames as f64 / self.sample_rate as f64)
    }

    fn trigger_click(&mut self, at: f64, kind: ClickKind) -> Result<(), AudioError> {
        self.check_alive()?;
        let start_frame = (at * self.sample_rate as f64).round().max(0.0) as u64;
        self.cues
            .push(ClickCue { start_frame, kind })
            .map_err(|_| AudioError::ClickTriggerFailed {
                beat: 0,
                reason: "click cue queue is full".to_string(),
            })
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        if let Err(err) = self.stream.pause() {
            log::debug!("[CpalOutput] Pause on release failed: {}", err);
        }
        log::info!("[CpalOutput] Output stream released");
    }
}

/// Only losing the device stops the frame counter; backend errors such as
/// underruns leave the stream running.
fn stream_error_is_fatal(err: &cpal::StreamError) -> bool {
    matches!(err, cpal::StreamError::DeviceNotAvailable)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_loss_is_fatal() {
        assert!(stream_error_is_fatal(&cpal::StreamError::DeviceNotAvailable));
    }

    #[test]
    fn test_backend_errors_are_recoverable() {
        let err = cpal::StreamError::BackendSpecific {
            err: cpal::BackendSpecificError {
                description: "underrun".to_string(),
            },
        };
        assert!(!stream_error_is_fatal(&err));
    }
}
