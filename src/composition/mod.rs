//! Vector → composition mapping.
//!
//! A [`CompositionVector`] is validated once, split into one slice per
//! voice, and turned into a [`Composition`]: four melodies plus a tempo.
//! Everything here is pure; the vector is not retained.

pub mod melody;
pub mod scale;
pub mod tempo;
pub mod voice;

pub use melody::{DEFAULT_STEP_COUNT, Melodies, Melody, NoteEvent, generate_melody};
pub use tempo::derive_tempo;
pub use voice::{NoteValue, VOICE_COUNT, Voice};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Width of an embedding accepted by the engine.
pub const VECTOR_WIDTH: usize = 384;

/// Components per voice slice.
pub const SLICE_WIDTH: usize = VECTOR_WIDTH / VOICE_COUNT;

/// A validated 384-wide, all-finite embedding.
#[derive(Debug, Clone, Copy)]
pub struct CompositionVector<'a> {
    values: &'a [f64],
}

impl<'a> CompositionVector<'a> {
    /// Validate width and finiteness.
    pub fn new(values: &'a [f64]) -> Result<Self, EngineError> {
        if values.len() != VECTOR_WIDTH {
            return Err(EngineError::VectorWidth {
                expected: VECTOR_WIDTH,
                found: values.len(),
            });
        }
        if let Some((index, &value)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(EngineError::NonFinite { index, value });
        }
        Ok(CompositionVector { values })
    }

    /// The contiguous slice driving `voice`.
    pub fn slice(&self, voice: Voice) -> &'a [f64] {
        let start = voice.index() * SLICE_WIDTH;
        &self.values[start..start + SLICE_WIDTH]
    }

    pub fn values(&self) -> &'a [f64] {
        self.values
    }
}

/// Everything the transport needs to loop one vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    pub melodies: Melodies,
    pub bpm: f64,
}

impl Composition {
    pub fn from_vector(vector: &CompositionVector<'_>, step_count: usize) -> Self {
        let melodies = Voice::ALL
            .map(|voice| generate_melody(vector.slice(voice), voice.index(), step_count));

        Composition {
            melodies: Melodies::new(melodies),
            bpm: derive_tempo(vector.values()),
        }
    }
}
