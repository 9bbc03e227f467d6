//! Linear ADSR envelope.

use serde::{Deserialize, Serialize};

/// Envelope shape. Times are in seconds, `sustain` is a level in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdsrParams {
    pub attack: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
}

impl AdsrParams {
    /// Soft pad-like shape for the fallback synthesizer.
    pub const SYNTH: AdsrParams = AdsrParams {
        attack: 0.02,
        decay: 0.15,
        sustain: 0.6,
        release: 0.4,
    };

    /// Samples carry their own shape; only de-click the edges.
    pub const SAMPLER: AdsrParams = AdsrParams {
        attack: 0.005,
        decay: 0.0,
        sustain: 1.0,
        release: 0.3,
    };
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Stage {
    Attack,
    Decay,
    Sustain,
    Release,
    Done,
}

/// A triggered envelope. Starts in the attack stage.
#[derive(Debug, Clone)]
pub struct Envelope {
    params: AdsrParams,
    stage: Stage,
    level: f64,
    /// Per-sample level change in the current stage.
    step: f64,
    sample_rate: f64,
}

impl Envelope {
    pub fn triggered(params: AdsrParams, sample_rate: f64) -> Self {
        let mut env = Envelope {
            params,
            stage: Stage::Attack,
            level: 0.0,
            step: 0.0,
            sample_rate,
        };
        env.step = env.rate(1.0, params.attack);
        env
    }

    /// Enter the release stage from wherever the envelope currently is.
    pub fn release(&mut self) {
        if self.stage == Stage::Done || self.stage == Stage::Release {
            return;
        }
        self.stage = Stage::Release;
        self.step = self.rate(self.level, self.params.release);
    }

    pub fn next_sample(&mut self) -> f64 {
        match self.stage {
            Stage::Attack => {
                self.level += self.step;
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = Stage::Decay;
                    self.step = self.rate(1.0 - self.params.sustain, self.params.decay);
                }
            }
            Stage::Decay => {
                self.level -= self.step;
                if self.level <= self.params.sustain {
                    self.level = self.params.sustain;
                    self.stage = Stage::Sustain;
                }
            }
            Stage::Sustain => {}
            Stage::Release => {
                self.level -= self.step;
                if self.level <= 0.0 {
                    self.level = 0.0;
                    self.stage = Stage::Done;
                }
            }
            Stage::Done => self.level = 0.0,
        }
        self.level
    }

    pub fn is_released(&self) -> bool {
        matches!(self.stage, Stage::Release | Stage::Done)
    }

    pub fn is_finished(&self) -> bool {
        self.stage == Stage::Done
    }

    /// Change per sample to cover `distance` in `seconds`; zero-length
    /// stages complete in one sample.
    fn rate(&self, distance: f64, seconds: f64) -> f64 {
        let samples = (seconds * self.sample_rate).max(1.0);
        distance.max(f64::EPSILON) / samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 44100.0;

    fn run(env: &mut Envelope, samples: usize) -> f64 {
        let mut last = 0.0;
        for _ in 0..samples {
            last = env.next_sample();
        }
        last
    }

    #[test]
    fn attack_then_sustain() {
        let mut env = Envelope::triggered(AdsrParams::SYNTH, SR);
        let peak = (0..2000).map(|_| env.next_sample()).fold(0.0, f64::max);
        assert!((peak - 1.0).abs() < 1e-9);

        let level = run(&mut env, 10_000);
        assert!((level - 0.6).abs() < 1e-9, "should sustain, got {level}");
        assert!(!env.is_released());
    }

    #[test]
    fn release_reaches_silence() {
        let mut env = Envelope::triggered(AdsrParams::SYNTH, SR);
        run(&mut env, 5000);
        env.release();
        assert!(env.is_released());
        assert!(!env.is_finished());

        run(&mut env, (0.4 * SR) as usize + 10);
        assert!(env.is_finished());
        assert_eq!(env.next_sample(), 0.0);
    }

    #[test]
    fn release_during_attack_starts_from_current_level() {
        let mut env = Envelope::triggered(AdsrParams::SYNTH, SR);
        let level = run(&mut env, 100);
        assert!(level < 1.0);
        env.release();
        let next = env.next_sample();
        assert!(next < level && next > 0.0);
    }

    #[test]
    fn zero_decay_goes_straight_to_sustain() {
        let mut env = Envelope::triggered(AdsrParams::SAMPLER, SR);
        let level = run(&mut env, 1000);
        assert!((level - 1.0).abs() < 1e-9);
    }

    #[test]
    fn stays_in_unit_range() {
        let mut env = Envelope::triggered(AdsrParams::SYNTH, SR);
        for i in 0..40_000 {
            if i == 20_000 {
                env.release();
            }
            let s = env.next_sample();
            assert!((0.0..=1.0).contains(&s), "out of range: {s}");
        }
        assert!(env.is_finished());
    }
}
