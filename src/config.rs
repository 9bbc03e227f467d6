//! Engine configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config.

use serde::{Deserialize, Serialize};

use crate::composition::DEFAULT_STEP_COUNT;
use crate::error::EngineError;

/// Tunables for composition, transport and voice rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Output sample rate in Hz.
    pub sample_rate: f64,
    /// Frequency of A4 in Hz.
    pub tuning_pitch: f64,
    /// Steps per melody loop.
    pub step_count: usize,
    /// Every `pulse_interval`-th step sounds all voices regardless of gate.
    pub pulse_interval: u64,
    /// Velocity multiplier applied when a voice falls back to synthesis.
    pub fallback_attenuation: f64,
    /// Gain applied before soft clipping the mix.
    pub master_gain: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            sample_rate: 44100.0,
            tuning_pitch: 440.0,
            step_count: DEFAULT_STEP_COUNT,
            pulse_interval: 4,
            fallback_attenuation: 0.45,
            master_gain: 0.8,
        }
    }
}

impl EngineConfig {
    /// Parse a camelCase JSON config and validate it.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(EngineError::Config(format!(
                "sampleRate must be positive, got {}",
                self.sample_rate
            )));
        }
        if !(self.tuning_pitch.is_finite() && self.tuning_pitch > 0.0) {
            return Err(EngineError::Config(format!(
                "tuningPitch must be positive, got {}",
                self.tuning_pitch
            )));
        }
        if self.step_count == 0 {
            return Err(EngineError::Config("stepCount must be at least 1".into()));
        }
        if self.pulse_interval == 0 {
            return Err(EngineError::Config("pulseInterval must be at least 1".into()));
        }
        if !(self.fallback_attenuation > 0.0 && self.fallback_attenuation <= 1.0) {
            return Err(EngineError::Config(format!(
                "fallbackAttenuation must be in (0, 1], got {}",
                self.fallback_attenuation
            )));
        }
        if !(self.master_gain.is_finite() && self.master_gain >= 0.0) {
            return Err(EngineError::Config(format!(
                "masterGain must be non-negative, got {}",
                self.master_gain
            )));
        }
        Ok(())
    }
}
