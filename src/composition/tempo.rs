//! Tempo derivation from vector magnitude.

pub const MIN_BPM: f64 = 50.0;
pub const MAX_BPM: f64 = 160.0;

/// Tempo of a vector that is all zeros.
pub const REST_BPM: f64 = 60.0;

/// BPM gained per unit of Euclidean magnitude.
const BPM_PER_MAGNITUDE: f64 = 250.0;

/// Euclidean length of `vector`.
pub fn magnitude(vector: &[f64]) -> f64 {
    vector.iter().map(|v| v * v).sum::<f64>().sqrt()
}

/// Map a vector to a tempo: near-identical inputs sound calm, large
/// differences sound energetic. Always within `[MIN_BPM, MAX_BPM]`.
pub fn derive_tempo(vector: &[f64]) -> f64 {
    (REST_BPM + magnitude(vector) * BPM_PER_MAGNITUDE).clamp(MIN_BPM, MAX_BPM)
}
