//! Offline renderer — drives the transport and voice bank without a clock.

use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::composition::{Composition, NoteValue};
use crate::config::EngineConfig;
use crate::ensemble::VoiceBank;
use crate::error::EngineError;
use crate::transport::Transport;

/// Release time allowed after the last step so tails are not cut off.
const TAIL_SECONDS: f64 = 0.5;

/// Render `loops` passes of `composition` on the fallback synthesizers.
pub fn render_composition(composition: &Composition, config: &EngineConfig, loops: usize) -> Vec<f64> {
    let mut bank = VoiceBank::new(config);
    render_with(&mut bank, composition, config, loops)
}

/// Render `loops` passes of `composition` through `bank`, which may have
/// samples installed. Returns mono samples at the config's sample rate.
pub fn render_with(
    bank: &mut VoiceBank,
    composition: &Composition,
    config: &EngineConfig,
    loops: usize,
) -> Vec<f64> {
    let steps = loops as u64 * config.step_count as u64;
    if steps == 0 {
        return Vec::new();
    }

    let mut transport = Transport::new(composition, config);
    let step_seconds = transport.step_seconds();
    let tail = NoteValue::Half.seconds(composition.bpm) + TAIL_SECONDS;
    let to_samples = |seconds: f64| (seconds * config.sample_rate).round() as usize;

    let total = to_samples(steps as f64 * step_seconds + tail);
    let mut out = vec![0.0; total];
    let mut rendered = 0;

    for step in 0..steps {
        let time = step as f64 * step_seconds;
        transport.tick(time, bank);
        let until = to_samples((step + 1) as f64 * step_seconds).min(total);
        bank.render(&mut out[rendered..until]);
        rendered = until;
    }
    bank.render(&mut out[rendered..]);

    out
}

/// Encode mono samples as 16-bit PCM WAV bytes.
pub fn render_wav(samples: &[f64], sample_rate: u32) -> Result<Vec<u8>, EngineError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            let pcm = (sample.clamp(-1.0, 1.0) * i16::MAX as f64) as i16;
            writer.write_sample(pcm)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}
