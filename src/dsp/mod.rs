//! DSP — voice synthesis, sample playback and mixing.
//!
//! Everything here renders into `f64` blocks on a sample clock, so the same
//! code serves live pulls from a host audio callback and offline WAV export.

pub mod envelope;
pub mod mixer;
pub mod oscillator;
pub mod poly;
pub mod renderer;
pub mod sampler;
pub mod voice;
