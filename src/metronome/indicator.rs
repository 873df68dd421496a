//! Visual beat indicator: one slot per beat, the current beat lit.

use serde::Serialize;

use crate::metronome::signature::TimeSignature;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BeatIndicator {
    time_signature: TimeSignature,
    active: u32,
}

impl BeatIndicator {
    pub fn new(time_signature: TimeSignature) -> Self {
        Self {
            time_signature,
            active: 0,
        }
    }

    /// Light `beat_index`; `0` (or anything outside the bar) clears the indicator.
    pub fn set_beat(&mut self, beat_index: u32) {
        self.active = if beat_index <= self.time_signature.beats_per_bar() {
            beat_index
        } else {
            0
        };
    }

    pub fn set_time_signature(&mut self, time_signature: TimeSignature) {
        self.time_signature = time_signature;
        self.set_beat(self.active);
    }

    pub fn active_beat(&self) -> Option<u32> {
        (self.active > 0).then_some(self.active)
    }

    pub fn slots(&self) -> Vec<bool> {
        (1..=self.time_signature.beats_per_bar())
            .map(|beat| beat == self.active)
            .collect()
    }

    pub fn render(&self) -> String {
        self.slots()
            .iter()
            .map(|&lit| if lit { "●" } else { "○" })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_count_follows_signature() {
        assert_eq!(BeatIndicator::new(TimeSignature::FourFour).slots().len(), 4);
        assert_eq!(BeatIndicator::new(TimeSignature::SixEight).slots().len(), 6);
        assert_eq!(BeatIndicator::new(TimeSignature::NineEight).slots().len(), 3);
    }

    #[test]
    fn test_active_slot() {
        let mut indicator = BeatIndicator::new(TimeSignature::FourFour);
        assert_eq!(indicator.active_beat(), None);
        assert_eq!(indicator.render(), "○ ○ ○ ○");

        indicator.set_beat(1);
        assert_eq!(indicator.slots(), vec![true, false, false, false]);
        assert_eq!(indicator.render(), "● ○ ○ ○");

        indicator.set_beat(0);
        assert_eq!(indicator.active_beat(), None);
    }

    #[test]
    fn test_out_of_bar_beat_clears() {
        let mut indicator = BeatIndicator::new(TimeSignature::SixEight);
        indicator.set_beat(5);
        assert_eq!(indicator.active_beat(), Some(5));

        indicator.set_time_signature(TimeSignature::NineEight);
        assert_eq!(indicator.active_beat(), None);
        assert_eq!(indicator.slots().len(), 3);
    }
}
