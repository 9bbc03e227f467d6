//! Sample playback for voices whose asset loaded.
//!
//! Each voice owns one recording made at a known root note. Other pitches
//! are reached by resampling with linear interpolation.

use std::io::Cursor;
use std::sync::Arc;

use hound::{SampleFormat, WavReader};

use super::envelope::{AdsrParams, Envelope};
use super::poly::VoiceRender;
use crate::error::SampleError;

/// Decoded mono audio.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    pub data: Vec<f64>,
    pub sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(data: Vec<f64>, sample_rate: u32) -> Self {
        SampleBuffer { data, sample_rate }
    }

    /// Decode an encoded asset. WAV is always supported; MP3 needs the
    /// `catalog` feature.
    pub fn decode(bytes: &[u8]) -> Result<Self, SampleError> {
        let buffer = if bytes.starts_with(b"RIFF") {
            Self::decode_wav(bytes)?
        } else if looks_like_mp3(bytes) {
            Self::decode_mp3(bytes)?
        } else {
            return Err(SampleError::UnsupportedFormat);
        };

        if buffer.data.is_empty() {
            return Err(SampleError::Empty);
        }
        Ok(buffer)
    }

    fn decode_wav(bytes: &[u8]) -> Result<Self, SampleError> {
        let mut reader = WavReader::new(Cursor::new(bytes))?;
        let spec = reader.spec();
        let interleaved: Vec<f64> = match spec.sample_format {
            SampleFormat::Float => reader
                .samples::<f32>()
                .map(|s| s.map(f64::from))
                .collect::<Result<_, _>>()?,
            SampleFormat::Int => {
                let full_scale = (1_i64 << (spec.bits_per_sample - 1)) as f64;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f64 / full_scale))
                    .collect::<Result<_, _>>()?
            }
        };

        Ok(SampleBuffer::new(
            downmix(&interleaved, spec.channels as usize),
            spec.sample_rate,
        ))
    }

    #[cfg(feature = "catalog")]
    fn decode_mp3(bytes: &[u8]) -> Result<Self, SampleError> {
        let mut decoder = minimp3::Decoder::new(Cursor::new(bytes));
        let mut data = Vec::new();
        let mut sample_rate = 0;
        loop {
            match decoder.next_frame() {
                Ok(frame) => {
                    sample_rate = frame.sample_rate as u32;
                    let pcm: Vec<f64> = frame.data.iter().map(|&s| s as f64 / 32768.0).collect();
                    data.extend(downmix(&pcm, frame.channels));
                }
                Err(minimp3::Error::Eof) => break,
                Err(e) => return Err(SampleError::Mp3(e.to_string())),
            }
        }
        Ok(SampleBuffer::new(data, sample_rate))
    }

    #[cfg(not(feature = "catalog"))]
    fn decode_mp3(_bytes: &[u8]) -> Result<Self, SampleError> {
        Err(SampleError::UnsupportedFormat)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Linearly interpolated read; zero outside the buffer.
    pub fn read_interpolated(&self, position: f64) -> f64 {
        if position < 0.0 {
            return 0.0;
        }
        let idx = position as usize;
        match (self.data.get(idx), self.data.get(idx + 1)) {
            (Some(&a), Some(&b)) => {
                let frac = position - idx as f64;
                a + (b - a) * frac
            }
            (Some(&a), None) => a,
            _ => 0.0,
        }
    }
}

/// ID3 tag or MPEG frame sync.
fn looks_like_mp3(bytes: &[u8]) -> bool {
    bytes.starts_with(b"ID3") || (bytes.len() > 1 && bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0)
}

fn downmix(interleaved: &[f64], channels: usize) -> Vec<f64> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f64>() / channels as f64)
        .collect()
}

/// Playback rate that makes a recording at `root_note` sound at `midi_note`.
pub fn playback_rate(midi_note: i32, root_note: u8, tuning_pitch: f64) -> f64 {
    let semitones = (midi_note - root_note as i32) as f64;
    2.0_f64.powf(semitones / 12.0) * (tuning_pitch / 440.0)
}

/// A loaded per-voice sample instrument.
#[derive(Debug, Clone)]
pub struct Sampler {
    buffer: Arc<SampleBuffer>,
    root_note: u8,
}

impl Sampler {
    pub fn new(buffer: SampleBuffer, root_note: u8) -> Self {
        Sampler {
            buffer: Arc::new(buffer),
            root_note,
        }
    }

    pub fn root_note(&self) -> u8 {
        self.root_note
    }

    /// Start a voice playing `midi_note`.
    pub fn voice(
        &self,
        midi_note: i32,
        velocity: f64,
        tuning_pitch: f64,
        engine_sample_rate: f64,
    ) -> SamplerVoice {
        let rate = playback_rate(midi_note, self.root_note, tuning_pitch);
        SamplerVoice {
            buffer: Arc::clone(&self.buffer),
            position: 0.0,
            step: rate * self.buffer.sample_rate as f64 / engine_sample_rate,
            velocity,
            envelope: Envelope::triggered(AdsrParams::SAMPLER, engine_sample_rate),
            finished: false,
        }
    }
}

/// One sounding note of a [`Sampler`].
#[derive(Debug, Clone)]
pub struct SamplerVoice {
    buffer: Arc<SampleBuffer>,
    position: f64,
    /// Buffer frames advanced per output sample.
    step: f64,
    velocity: f64,
    envelope: Envelope,
    finished: bool,
}

impl VoiceRender for SamplerVoice {
    fn next_sample(&mut self) -> f64 {
        if self.finished {
            return 0.0;
        }
        if self.position >= self.buffer.len() as f64 {
            self.finished = true;
            return 0.0;
        }

        let sample = self.buffer.read_interpolated(self.position);
        self.position += self.step;

        let env = self.envelope.next_sample();
        if self.envelope.is_finished() {
            self.finished = true;
        }
        sample * env * self.velocity
    }

    fn note_off(&mut self) {
        self.envelope.release();
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}
