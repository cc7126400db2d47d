//! WAV file audio source for offline analysis, and WAV writing for `generate`.

use crate::audio::source::AudioSource;
use crate::error::{DialwatchError, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Audio source that reads from WAV file data.
/// Supports arbitrary sample rates and channels, resampling to the target rate in mono.
pub struct WavAudioSource {
    samples: Vec<i16>,
    position: usize,
    chunk_size: usize,
    sample_rate: u32,
}

impl WavAudioSource {
    /// Opens a WAV file from disk.
    pub fn open(path: &Path, target_rate: u32) -> Result<Self> {
        let file = File::open(path).map_err(|e| DialwatchError::AudioCapture {
            message: format!("Failed to open {}: {}", path.display(), e),
        })?;
        Self::from_reader(Box::new(BufReader::new(file)), target_rate)
    }

    /// Create from any reader (for testing/flexibility).
    pub fn from_reader(reader: Box<dyn Read + Send>, target_rate: u32) -> Result<Self> {
        let mut wav_reader =
            hound::WavReader::new(reader).map_err(|e| DialwatchError::AudioCapture {
                message: format!("Failed to parse WAV file: {}", e),
            })?;

        let spec = wav_reader.spec();
        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample > 16 {
            return Err(DialwatchError::AudioCapture {
                message: format!(
                    "Unsupported WAV format: {}-bit {:?} (expected 8 or 16-bit integer PCM)",
                    spec.bits_per_sample, spec.sample_format
                ),
            });
        }

        // hound yields narrow samples unscaled (8-bit as -128..=127).
        let shift = 16 - spec.bits_per_sample;
        let raw_samples: Vec<i16> = wav_reader
            .samples::<i16>()
            .map(|s| s.map(|s| s << shift))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| DialwatchError::AudioCapture {
                message: format!("Failed to read WAV samples: {}", e),
            })?;

        let mono_samples = downmix(&raw_samples, spec.channels);
        let samples = resample(&mono_samples, spec.sample_rate, target_rate);

        // 100ms chunks
        let chunk_size = (target_rate as usize / 10).max(1);

        Ok(Self {
            samples,
            position: 0,
            chunk_size,
            sample_rate: target_rate,
        })
    }

    /// Consume the source and return all samples as a single buffer.
    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }
}

impl AudioSource for WavAudioSource {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        if self.position >= self.samples.len() {
            return Ok(Vec::new());
        }

        let end = std::cmp::min(self.position + self.chunk_size, self.samples.len());
        let chunk = self.samples[self.position..end].to_vec();
        self.position = end;

        Ok(chunk)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn is_finite(&self) -> bool {
        true
    }
}

/// Writes mono 16-bit PCM to a WAV file.
pub fn write_wav(path: &Path, samples: &[i16], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let to_err = |e: hound::Error| DialwatchError::Other(format!("Failed to write WAV: {e}"));
    let mut writer = hound::WavWriter::create(path, spec).map_err(to_err)?;
    for &sample in samples {
        writer.write_sample(sample).map_err(to_err)?;
    }
    writer.finalize().map_err(to_err)
}

/// Averages interleaved channels into one.
fn downmix(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels as usize)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Simple linear interpolation resampling.
fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = (source_pos.floor() as usize).min(samples.len() - 1);
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[source_idx]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as i16
            }
        })
        .collect()
}
