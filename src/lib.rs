pub mod composition;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod ensemble;
pub mod error;
pub mod playback;
pub mod transport;

use crate::composition::{Composition, CompositionVector, derive_tempo};
use crate::config::EngineConfig;
use crate::error::EngineError;
use wasm_bindgen::prelude::*;

pub use crate::engine::{Engine, EngineOutput};
pub use crate::ensemble::LoadedStates;
pub use crate::playback::Phase;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the vector_ensemble version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// Validate a vector and turn it into a composition.
pub fn compose(vector: &[f64], config: &EngineConfig) -> Result<Composition, EngineError> {
    let vector = CompositionVector::new(vector)?;
    Ok(Composition::from_vector(&vector, config.step_count))
}

/// WASM-exposed: the four melodies and tempo for a 384-wide vector.
#[wasm_bindgen]
pub fn compose_vector(vector: &[f64]) -> Result<JsValue, JsValue> {
    let composition =
        compose(vector, &EngineConfig::default()).map_err(|e| JsValue::from_str(&format!("{e}")))?;
    serde_wasm_bindgen::to_value(&composition).map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed: the tempo a vector would play at.
#[wasm_bindgen]
pub fn vector_tempo(vector: &[f64]) -> f64 {
    derive_tempo(vector)
}

/// WASM-exposed: render `loops` passes of a vector on the fallback
/// synthesizers to a mono WAV byte array.
#[wasm_bindgen]
pub fn render_vector_wav(vector: &[f64], sample_rate: u32, loops: usize) -> Result<Vec<u8>, JsValue> {
    let config = EngineConfig {
        sample_rate: sample_rate as f64,
        ..EngineConfig::default()
    };
    render_vector(vector, &config, loops).map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// Compose and render a vector to WAV bytes.
pub fn render_vector(vector: &[f64], config: &EngineConfig, loops: usize) -> Result<Vec<u8>, EngineError> {
    config.validate()?;
    let composition = compose(vector, config)?;
    let samples = dsp::renderer::render_composition(&composition, config, loops);
    dsp::renderer::render_wav(&samples, config.sample_rate as u32)
}
