//! Fallback synthesizer voice — one oscillator shaped by an ADSR envelope.

use super::envelope::{AdsrParams, Envelope};
use super::oscillator::{Oscillator, Waveform};
use super::poly::VoiceRender;

/// A single synthesized note.
#[derive(Debug, Clone)]
pub struct SynthVoice {
    oscillator: Oscillator,
    envelope: Envelope,
    velocity: f64,
}

impl SynthVoice {
    pub fn new(waveform: Waveform, frequency: f64, velocity: f64, sample_rate: f64) -> Self {
        SynthVoice {
            oscillator: Oscillator::new(waveform, frequency, sample_rate),
            envelope: Envelope::triggered(AdsrParams::SYNTH, sample_rate),
            velocity,
        }
    }
}

impl VoiceRender for SynthVoice {
    fn next_sample(&mut self) -> f64 {
        if self.envelope.is_finished() {
            return 0.0;
        }
        self.oscillator.next_sample() * self.envelope.next_sample() * self.velocity
    }

    fn note_off(&mut self) {
        self.envelope.release();
    }

    fn is_finished(&self) -> bool {
        self.envelope.is_finished()
    }
}
