use thiserror::Error;

use crate::composition::Voice;

/// Errors surfaced to callers of the engine.
///
/// Sample load failures never appear here: they degrade a voice to its
/// fallback synthesizer and only show up in [`crate::ensemble::LoadedStates`].
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("composition vector must have {expected} components, got {found}")]
    VectorWidth { expected: usize, found: usize },

    #[error("composition vector component {index} is not finite ({value})")]
    NonFinite { index: usize, value: f64 },

    #[error("cannot play the idle phase; use stop() to silence the engine")]
    IdlePhase,

    #[error("invalid engine config: {0}")]
    Config(String),

    #[error("failed to parse engine config: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("failed to encode WAV: {0}")]
    Wav(#[from] hound::Error),
}

/// Why a single voice's sample could not be made ready.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("no sample available for {voice}: {reason}")]
    Unavailable { voice: Voice, reason: String },

    #[error("failed to read sample: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode WAV sample: {0}")]
    Wav(#[from] hound::Error),

    #[error("failed to decode MP3 sample: {0}")]
    Mp3(String),

    #[error("unsupported sample format")]
    UnsupportedFormat,

    #[error("sample contains no audio")]
    Empty,

    #[cfg(feature = "catalog")]
    #[error("failed to fetch sample: {0}")]
    Http(#[from] reqwest::Error),
}
