//! Ensemble — the four-voice resource manager.
//!
//! Each voice owns an optional sample instrument and a fallback synthesizer.
//! A voice with a loaded sample plays it; any other voice plays its
//! synthesizer, quieter, so partial load failures stay audible.

pub mod loader;
pub mod source;

use serde::{Deserialize, Serialize};

use crate::composition::scale::{midi_to_frequency, note_to_midi};
use crate::composition::{VOICE_COUNT, Voice};
use crate::config::EngineConfig;
use crate::dsp::mixer::Mixer;
use crate::dsp::poly::Polyphony;
use crate::dsp::sampler::{Sampler, SamplerVoice};
use crate::dsp::voice::SynthVoice;

pub use loader::{VoiceLoad, load_sampler, spawn_voice_loads};
pub use source::{NoSamples, SampleSource};

#[cfg(not(target_arch = "wasm32"))]
pub use source::FileSampleSource;

#[cfg(feature = "catalog")]
pub use source::HttpSampleSource;

// ── Readiness ───────────────────────────────────────────────

/// Per-voice sample readiness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedStates {
    pub bass: bool,
    pub tenor: bool,
    pub alto: bool,
    pub soprano: bool,
}

impl LoadedStates {
    pub fn get(&self, voice: Voice) -> bool {
        match voice {
            Voice::Bass => self.bass,
            Voice::Tenor => self.tenor,
            Voice::Alto => self.alto,
            Voice::Soprano => self.soprano,
        }
    }

    fn set(&mut self, voice: Voice, ready: bool) {
        match voice {
            Voice::Bass => self.bass = ready,
            Voice::Tenor => self.tenor = ready,
            Voice::Alto => self.alto = ready,
            Voice::Soprano => self.soprano = ready,
        }
    }

    pub fn ready_count(&self) -> usize {
        Voice::ALL.iter().filter(|&&v| self.get(v)).count()
    }
}

/// Which instrument a trigger was routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Sample,
    Fallback,
}

// ── Voice bank ──────────────────────────────────────────────

struct VoiceSlot {
    sampler: Option<Sampler>,
    sample_notes: Polyphony<SamplerVoice>,
    synth_notes: Polyphony<SynthVoice>,
}

impl VoiceSlot {
    fn new(sample_rate: f64) -> Self {
        VoiceSlot {
            sampler: None,
            sample_notes: Polyphony::new(sample_rate),
            synth_notes: Polyphony::new(sample_rate),
        }
    }

    fn release(&mut self) {
        self.sample_notes.release_all();
        self.synth_notes.release_all();
    }
}

/// All four voices, their instruments and their sounding notes.
pub struct VoiceBank {
    slots: [VoiceSlot; VOICE_COUNT],
    mixer: Mixer,
    /// Samples rendered so far.
    position: u64,
    sample_rate: f64,
    tuning_pitch: f64,
    fallback_attenuation: f64,
}

impl VoiceBank {
    pub fn new(config: &EngineConfig) -> Self {
        VoiceBank {
            slots: std::array::from_fn(|_| VoiceSlot::new(config.sample_rate)),
            mixer: Mixer::new(config.master_gain),
            position: 0,
            sample_rate: config.sample_rate,
            tuning_pitch: config.tuning_pitch,
            fallback_attenuation: config.fallback_attenuation,
        }
    }

    /// Install one voice's load outcome. A failed voice stays on its
    /// fallback synthesizer. Returns whether the voice is now sampled.
    pub fn install(&mut self, voice: Voice, result: VoiceLoad) -> bool {
        let slot = &mut self.slots[voice.index()];
        slot.sampler = result.ok();
        slot.sampler.is_some()
    }

    pub fn loaded_states(&self) -> LoadedStates {
        let mut states = LoadedStates::default();
        for voice in Voice::ALL {
            states.set(voice, self.slots[voice.index()].sampler.is_some());
        }
        states
    }

    /// Sound `note` on `voice`, releasing whatever that voice was holding.
    ///
    /// `time` and `duration` are seconds on the bank's sample clock. Returns
    /// `None` when the note name cannot be parsed.
    pub fn trigger(
        &mut self,
        voice: Voice,
        note: &str,
        duration: f64,
        time: f64,
        velocity: f64,
    ) -> Option<Route> {
        let slot = &mut self.slots[voice.index()];
        slot.release();

        let Some(midi) = note_to_midi(note) else {
            log::warn!("{voice}: ignoring unparseable note {note:?}");
            return None;
        };

        match &slot.sampler {
            Some(sampler) => {
                let note_voice =
                    sampler.voice(midi, velocity, self.tuning_pitch, self.sample_rate);
                slot.sample_notes.schedule(note_voice, time, duration);
                Some(Route::Sample)
            }
            None => {
                let frequency = midi_to_frequency(midi, self.tuning_pitch);
                let note_voice = SynthVoice::new(
                    voice.fallback_waveform(),
                    frequency,
                    velocity * self.fallback_attenuation,
                    self.sample_rate,
                );
                slot.synth_notes.schedule(note_voice, time, duration);
                Some(Route::Fallback)
            }
        }
    }

    /// Release every sounding note on every voice, on both paths.
    pub fn release_all(&mut self) {
        for slot in &mut self.slots {
            slot.release();
        }
    }

    /// Drop all samples and sample notes. Synth release tails keep ringing.
    pub fn dispose(&mut self) {
        for slot in &mut self.slots {
            slot.synth_notes.release_all();
            slot.sample_notes.clear();
            slot.sampler = None;
        }
    }

    /// Held (not yet released) notes on `voice`.
    pub fn sounding_notes(&self, voice: Voice) -> usize {
        let slot = &self.slots[voice.index()];
        slot.sample_notes.sounding() + slot.synth_notes.sounding()
    }

    /// Mix the next `out.len()` samples of every voice into `out`.
    pub fn render(&mut self, out: &mut [f64]) {
        out.fill(0.0);
        for slot in &mut self.slots {
            slot.sample_notes.render_add(out);
            slot.synth_notes.render_add(out);
        }
        self.mixer.finish(out);
        self.position += out.len() as u64;
    }

    /// Seconds rendered so far; the time of the next rendered sample.
    pub fn now(&self) -> f64 {
        self.position as f64 / self.sample_rate
    }
}
