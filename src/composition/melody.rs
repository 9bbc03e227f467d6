//! Melody generation — one vector slice in, one looping voice part out.

use std::ops::Index;

use serde::{Deserialize, Serialize};

use super::voice::{VOICE_COUNT, Voice, gate_threshold};

/// Steps per melody unless configured otherwise.
pub const DEFAULT_STEP_COUNT: usize = 16;

/// Input gain before the saturating non-linearity.
const DRIVE: f64 = 15.0;

/// One step of one voice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteEvent {
    /// Index into the scale. Reduce with
    /// [`reduce_degree`](super::scale::reduce_degree) before use.
    pub scale_degree: i32,
    /// Octaves relative to the voice's base octave.
    pub octave_shift: i32,
    /// Whether this step sounds on its own.
    pub gate: bool,
    /// Velocity in `[0.25, 1.0]`.
    pub velocity: f64,
}

impl NoteEvent {
    /// Map one vector component to a note for the voice at `voice_index`.
    pub fn from_component(value: f64, voice_index: usize) -> Self {
        let amplified = (value * DRIVE).tanh();

        NoteEvent {
            scale_degree: ((amplified * 14.0).floor() as i32).abs() % 7,
            octave_shift: (amplified * 2.0).floor() as i32,
            gate: (value * 25.0).abs() > gate_threshold(voice_index),
            velocity: (0.5 + value * 5.0).clamp(0.25, 1.0),
        }
    }
}

/// A cyclic sequence of note events for one voice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Melody {
    events: Vec<NoteEvent>,
}

impl Melody {
    pub fn new(events: Vec<NoteEvent>) -> Self {
        Melody { events }
    }

    /// The event at transport step `step`, wrapping past the end.
    ///
    /// Returns `None` only for an empty melody.
    pub fn at(&self, step: u64) -> Option<&NoteEvent> {
        if self.events.is_empty() {
            return None;
        }
        self.events.get((step % self.events.len() as u64) as usize)
    }

    pub fn events(&self) -> &[NoteEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Generate `step_count` note events from a vector slice.
///
/// Step `i` reads `slice[i % slice.len()]`; an empty slice reads as silence.
/// The result depends only on the arguments.
pub fn generate_melody(slice: &[f64], voice_index: usize, step_count: usize) -> Melody {
    let events = (0..step_count)
        .map(|i| {
            let value = if slice.is_empty() {
                0.0
            } else {
                slice[i % slice.len()]
            };
            NoteEvent::from_component(value, voice_index)
        })
        .collect();
    Melody::new(events)
}

/// Exactly one melody per voice, in voice order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Melodies([Melody; VOICE_COUNT]);

impl Melodies {
    pub fn new(melodies: [Melody; VOICE_COUNT]) -> Self {
        Melodies(melodies)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Voice, &Melody)> {
        Voice::ALL.into_iter().zip(self.0.iter())
    }
}

impl Index<Voice> for Melodies {
    type Output = Melody;

    fn index(&self, voice: Voice) -> &Melody {
        &self.0[voice.index()]
    }
}
