// ClickMixer - sample-accurate click playback on the audio thread
//
// The scheduler thread pushes ClickCue values (start frame + voice) into a
// lock-free SPSC ring. The render callback peeks the ring every frame and
// starts each cue on exactly its start frame, so timing precision is one
// sample regardless of how coarse the host timers are.
//
// Cue flow:
// 1. Scheduler converts a due time in seconds to an absolute frame index
// 2. Scheduler pushes the cue (never blocks; a full ring is reported)
// 3. Render callback starts the cue when the frame counter reaches it
// 4. Voices play their pre-rendered samples to the end and retire

use rtrb::{Consumer, Producer, RingBuffer};

use crate::audio::click::{ClickBank, ClickKind};

/// A click queued for playback at an absolute output frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickCue {
    pub start_frame: u64,
    pub kind: ClickKind,
}

#[derive(Debug, Clone, Copy)]
struct Voice {
    kind: ClickKind,
    position: usize,
}

/// Create the cue ring shared between scheduler and render callback.
pub fn cue_channel(capacity: usize) -> (Producer<ClickCue>, Consumer<ClickCue>) {
    RingBuffer::new(capacity.max(1))
}

/// Renders queued clicks into interleaved output buffers.
///
/// All allocation happens in [`ClickMixer::new`]; `render` is allocation-free
/// as long as no more than `max_voices` clicks overlap.
pub struct ClickMixer {
    bank: ClickBank,
    cues: Consumer<ClickCue>,
    voices: Vec<Voice>,
    max_voices: usize,
}

impl ClickMixer {
    pub fn new(bank: ClickBank, cues: Consumer<ClickCue>, max_voices: usize) -> Self {
        let max_voices = max_voices.max(1);
        Self {
            bank,
            cues,
            voices: Vec::with_capacity(max_voices),
            max_voices,
        }
    }

    /// Number of clicks currently sounding.
    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    /// Fill `data` (interleaved, `channels` wide) starting at `start_frame`.
    pub fn render(&mut self, data: &mut [f32], channels: usize, start_frame: u64) {
        let channels = channels.max(1);
        let frame_count = data.len() / channels;

        for i in 0..frame_count {
            let frame_idx = start_frame + i as u64;
            self.start_due_cues(frame_idx);

            let mut sample_val = 0.0;
            for voice in self.voices.iter_mut() {
                let samples = self.bank.samples(voice.kind);
                if let Some(&s) = samples.get(voice.position) {
                    sample_val += s;
                    voice.position += 1;
                }
            }
            let bank = &self.bank;
            self.voices
                .retain(|voice| voice.position < bank.samples(voice.kind).len());

            for ch in 0..channels {
                data[i * channels + ch] = sample_val;
            }
        }
    }

    fn start_due_cues(&mut self, frame_idx: u64) {
        // Late cues (start frame already passed) start immediately.
        while let Ok(cue) = self.cues.peek() {
            if cue.start_frame > frame_idx {
                break;
            }
            let Ok(cue) = self.cues.pop() else {
                break;
            };
            if self.voices.len() == self.max_voices {
                self.voices.remove(0);
            }
            self.voices.push(Voice {
                kind: cue.kind,
                position: 0,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClickConfig;

    fn mixer(max_voices: usize) -> (Producer<ClickCue>, ClickMixer) {
        let (tx, rx) = cue_channel(8);
        let bank = ClickBank::new(&ClickConfig::default(), 1000);
        (tx, ClickMixer::new(bank, rx, max_voices))
    }

    #[test]
    fn test_silence_without_cues() {
        let (_tx, mut mixer) = mixer(4);
        let mut data = vec![1.0f32; 64];
        mixer.render(&mut data, 2, 0);
        assert!(data.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_click_starts_on_exact_frame() {
        let (mut tx, mut mixer) = mixer(4);
        tx.push(ClickCue {
            start_frame: 10,
            kind: ClickKind::Accent,
        })
        .unwrap();

        let mut data = vec![0.0f32; 40];
        mixer.render(&mut data, 1, 0);

        let bank = ClickBank::new(&ClickConfig::default(), 1000);
        let click = bank.samples(ClickKind::Accent);
        assert!(data[..10].iter().all(|&s| s == 0.0));
        assert_eq!(&data[10..40], &click[..30]);
    }

    #[test]
    fn test_late_cue_starts_immediately() {
        let (mut tx, mut mixer) = mixer(4);
        tx.push(ClickCue {
            start_frame: 5,
            kind: ClickKind::Regular,
        })
        .unwrap();

        let mut data = vec![0.0f32; 4];
        mixer.render(&mut data, 1, 100);

        let bank = ClickBank::new(&ClickConfig::default(), 1000);
        assert_eq!(&data[..], &bank.samples(ClickKind::Regular)[..4]);
    }

    #[test]
    fn test_interleaved_channels_get_same_sample() {
        let (mut tx, mut mixer) = mixer(4);
        tx.push(ClickCue {
            start_frame: 0,
            kind: ClickKind::Accent,
        })
        .unwrap();

        let mut data = vec![0.0f32; 20];
        mixer.render(&mut data, 2, 0);
        for frame in data.chunks(2) {
            assert_eq!(frame[0], frame[1]);
        }
    }

    #[test]
    fn test_voices_retire_after_click_ends() {
        let (mut tx, mut mixer) = mixer(4);
        tx.push(ClickCue {
            start_frame: 0,
            kind: ClickKind::Regular,
        })
        .unwrap();

        // 100ms at 1kHz = 100 samples
        let mut data = vec![0.0f32; 50];
        mixer.render(&mut data, 1, 0);
        assert_eq!(mixer.active_voices(), 1);

        let mut data = vec![0.0f32; 60];
        mixer.render(&mut data, 1, 50);
        assert_eq!(mixer.active_voices(), 0);
        assert!(data[50..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_voice_limit_steals_oldest() {
        let (mut tx, mut mixer) = mixer(1);
        for start_frame in [0, 1] {
            tx.push(ClickCue {
                start_frame,
                kind: ClickKind::Accent,
            })
            .unwrap();
        }

        let mut data = vec![0.0f32; 3];
        mixer.render(&mut data, 1, 0);
        assert_eq!(mixer.active_voices(), 1);

        let bank = ClickBank::new(&ClickConfig::default(), 1000);
        let click = bank.samples(ClickKind::Accent);
        assert_eq!(data[1], click[0]);
        assert_eq!(data[2], click[1]);
    }
}
