//! Transport — steps the four melodies against a host clock.
//!
//! One tick per sixteenth note at the composition tempo. On each tick every
//! voice whose event is gated, or whose step falls on a pulse, is triggered
//! with that voice's note length.

pub mod clock;
#[cfg(not(target_arch = "wasm32"))]
pub mod tokio_clock;

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::composition::scale::pitch_name;
use crate::composition::{Composition, Melodies, NoteValue};
use crate::config::EngineConfig;
use crate::ensemble::VoiceBank;

pub use clock::ManualClock;

#[cfg(not(target_arch = "wasm32"))]
pub use tokio_clock::TokioClock;

/// Called once per repeat with the tick's time in seconds.
pub type TickFn = Box<dyn FnMut(f64) + Send>;

/// A cancellable repeating callback registered on an [`AudioClock`].
pub trait RepeatHandle: Send {
    /// Stop future invocations. Cancelling twice is harmless.
    fn cancel(&mut self);
    fn is_active(&self) -> bool;
}

/// Host tempo clock.
pub trait AudioClock: Send + Sync {
    fn set_bpm(&self, bpm: f64);
    fn bpm(&self) -> f64;
    /// Invoke `tick` every `interval` at the current tempo until cancelled.
    fn schedule_repeat(&self, interval: NoteValue, tick: TickFn) -> Box<dyn RepeatHandle>;
}

/// Lock a mutex, recovering the data if a panicking holder poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Step state for one playing composition.
#[derive(Debug, Clone)]
pub struct Transport {
    melodies: Melodies,
    bpm: f64,
    step: u64,
    pulse_interval: u64,
}

impl Transport {
    pub fn new(composition: &Composition, config: &EngineConfig) -> Self {
        Transport {
            melodies: composition.melodies.clone(),
            bpm: composition.bpm,
            step: 0,
            pulse_interval: config.pulse_interval.max(1),
        }
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// The step the next tick will play.
    pub fn step(&self) -> u64 {
        self.step
    }

    /// Seconds between ticks.
    pub fn step_seconds(&self) -> f64 {
        NoteValue::Sixteenth.seconds(self.bpm)
    }

    /// Play the current step at `time` and advance. Returns how many voices
    /// were triggered.
    pub fn tick(&mut self, time: f64, bank: &mut VoiceBank) -> usize {
        let step = self.step;
        let on_pulse = step % self.pulse_interval == 0;
        let mut triggered = 0;

        for (voice, melody) in self.melodies.iter() {
            let Some(event) = melody.at(step) else {
                continue;
            };
            if !(event.gate || on_pulse) {
                continue;
            }
            let note = pitch_name(event.scale_degree, voice.base_octave() + event.octave_shift);
            let duration = voice.note_value().seconds(self.bpm);
            if bank
                .trigger(voice, &note, duration, time, event.velocity)
                .is_some()
            {
                triggered += 1;
            }
        }

        log::trace!("step {step} at {time:.3}s: {triggered} voices");
        self.step += 1;
        triggered
    }
}
