//! Voice roles of the fixed four-part ensemble.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dsp::oscillator::Waveform;

/// Number of voices in the ensemble.
pub const VOICE_COUNT: usize = 4;

/// Minimum `|value * 25|` for a step of the voice at `voice_index` to gate
/// on. Rises by 0.1 per voice so upper voices play more sparsely.
pub fn gate_threshold(voice_index: usize) -> f64 {
    0.4 + voice_index as f64 * 0.1
}

/// One of the four fixed melodic parts, lowest register first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    Bass,
    Tenor,
    Alto,
    Soprano,
}

impl Voice {
    /// All voices in composition order. Vector slices and melodies follow
    /// this order.
    pub const ALL: [Voice; VOICE_COUNT] = [Voice::Bass, Voice::Tenor, Voice::Alto, Voice::Soprano];

    pub fn index(self) -> usize {
        match self {
            Voice::Bass => 0,
            Voice::Tenor => 1,
            Voice::Alto => 2,
            Voice::Soprano => 3,
        }
    }

    /// Name used to key sample assets (`bass.wav`, ...).
    pub fn name(self) -> &'static str {
        match self {
            Voice::Bass => "bass",
            Voice::Tenor => "tenor",
            Voice::Alto => "alto",
            Voice::Soprano => "soprano",
        }
    }

    /// Octave that a zero octave shift lands in.
    pub fn base_octave(self) -> i32 {
        match self {
            Voice::Bass => 2,
            Voice::Tenor => 3,
            Voice::Alto => 3,
            Voice::Soprano => 4,
        }
    }

    /// Sustain length per trigger: the bass holds, the soprano moves.
    pub fn note_value(self) -> NoteValue {
        match self {
            Voice::Bass => NoteValue::Half,
            Voice::Tenor => NoteValue::Quarter,
            Voice::Alto => NoteValue::Eighth,
            Voice::Soprano => NoteValue::Sixteenth,
        }
    }

    /// Waveform of the fallback synthesizer for this voice.
    pub fn fallback_waveform(self) -> Waveform {
        match self {
            Voice::Bass => Waveform::Sawtooth,
            Voice::Tenor => Waveform::Triangle,
            Voice::Alto => Waveform::Triangle,
            Voice::Soprano => Waveform::Sine,
        }
    }

    /// MIDI note the voice's sample asset is expected to be recorded at
    /// (C of the base octave).
    pub fn sample_root_note(self) -> u8 {
        ((self.base_octave() + 1) * 12) as u8
    }
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Note length classes used by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteValue {
    #[serde(rename = "2n")]
    Half,
    #[serde(rename = "4n")]
    Quarter,
    #[serde(rename = "8n")]
    Eighth,
    #[serde(rename = "16n")]
    Sixteenth,
}

impl NoteValue {
    /// Length in quarter-note beats.
    pub fn beats(self) -> f64 {
        match self {
            NoteValue::Half => 2.0,
            NoteValue::Quarter => 1.0,
            NoteValue::Eighth => 0.5,
            NoteValue::Sixteenth => 0.25,
        }
    }

    /// Length in seconds at `bpm`.
    pub fn seconds(self, bpm: f64) -> f64 {
        self.beats() * 60.0 / bpm
    }
}
