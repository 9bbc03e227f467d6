//! Mixer — master gain and soft clipping over a summed block.

/// Applies master gain and a tanh soft clip to a block in place.
#[derive(Debug, Clone)]
pub struct Mixer {
    pub master_gain: f64,
}

impl Mixer {
    pub fn new(master_gain: f64) -> Self {
        Mixer { master_gain }
    }

    pub fn finish(&self, block: &mut [f64]) {
        for sample in block.iter_mut() {
            *sample = soft_clip(*sample * self.master_gain);
        }
    }
}

impl Default for Mixer {
    fn default() -> Self {
        Mixer::new(0.8)
    }
}

fn soft_clip(x: f64) -> f64 {
    x.tanh()
}
