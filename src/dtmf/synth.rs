//! DTMF signal synthesis.
//!
//! Used by `dialwatch generate` to produce test recordings and by the test
//! suites to build deterministic audio.

use crate::dtmf::table::{STANDARD, ToneTable};
use crate::error::{DialwatchError, Result};
use std::f32::consts::PI;
use std::time::Duration;

/// Default per-tone amplitude (full scale = 1.0). Two tones peak at 0.5.
pub const DEFAULT_AMPLITUDE: f32 = 0.25;

/// Generates keypad tones at a fixed sample rate.
#[derive(Debug, Clone)]
pub struct ToneSynth {
    sample_rate: u32,
    amplitude: f32,
    table: ToneTable,
}

impl ToneSynth {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            amplitude: DEFAULT_AMPLITUDE,
            table: STANDARD,
        }
    }

    /// Sets the amplitude of each of the two tones.
    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude;
        self
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of samples covering `duration`.
    pub fn samples_for(&self, duration: Duration) -> usize {
        (duration.as_secs_f64() * self.sample_rate as f64).round() as usize
    }

    /// `len` samples of the dual tone for `symbol`, or `None` for a non-keypad symbol.
    pub fn symbol(&self, symbol: char, len: usize) -> Option<Vec<i16>> {
        let (low, high) = self.table.frequencies_for(symbol)?;
        Some(self.sine(&[low, high], len))
    }

    /// Sum of equal-amplitude sines.
    pub fn sine(&self, frequencies: &[f32], len: usize) -> Vec<i16> {
        let components: Vec<(f32, f32)> =
            frequencies.iter().map(|&f| (f, self.amplitude)).collect();
        self.weighted_sine(&components, len)
    }

    /// Sum of sines with individual `(frequency, amplitude)` pairs.
    pub fn weighted_sine(&self, components: &[(f32, f32)], len: usize) -> Vec<i16> {
        let rate = self.sample_rate as f32;
        (0..len)
            .map(|n| {
                let t = n as f32 / rate;
                let value: f32 = components
                    .iter()
                    .map(|&(freq, amp)| amp * (2.0 * PI * freq * t).sin())
                    .sum();
                to_i16(value)
            })
            .collect()
    }

    /// A dial sequence: each symbol for `tone`, separated by `gap` of silence.
    ///
    /// Whitespace in `symbols` is ignored; a comma inserts an extra gap.
    pub fn sequence(&self, symbols: &str, tone: Duration, gap: Duration) -> Result<Vec<i16>> {
        let tone_len = self.samples_for(tone);
        let gap_len = self.samples_for(gap);
        let mut out = Vec::new();
        for symbol in symbols.chars().filter(|c| !c.is_whitespace()) {
            if symbol == ',' {
                out.extend(std::iter::repeat_n(0i16, gap_len));
                continue;
            }
            let samples = self.symbol(symbol, tone_len).ok_or_else(|| {
                DialwatchError::Other(format!("'{symbol}' is not a DTMF keypad symbol"))
            })?;
            out.extend(samples);
            out.extend(std::iter::repeat_n(0i16, gap_len));
        }
        Ok(out)
    }
}

/// Deterministic uniform noise in `[-amplitude, amplitude]` (xorshift32).
pub fn white_noise(len: usize, amplitude: f32, seed: u32) -> Vec<i16> {
    let mut state = seed.max(1);
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let unit = state as f32 / u32::MAX as f32 * 2.0 - 1.0;
            to_i16(unit * amplitude)
        })
        .collect()
}

fn to_i16(value: f32) -> i16 {
    (value * i16::MAX as f32).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_length_and_peak() {
        let synth = ToneSynth::new(8000);
        let samples = synth.symbol('5', 400).unwrap();
        assert_eq!(samples.len(), 400);
        let peak = samples.iter().map(|s| s.unsigned_abs()).max().unwrap();
        // Two tones at 0.25 never exceed half scale.
        assert!(peak <= i16::MAX as u16 / 2 + 1, "peak {peak}");
        assert!(peak > 8000);
    }

    #[test]
    fn test_unknown_symbol_is_none() {
        assert!(ToneSynth::new(8000).symbol('x', 10).is_none());
    }

    #[test]
    fn test_sequence_layout() {
        let synth = ToneSynth::new(8000);
        let samples = synth
            .sequence("12", Duration::from_millis(50), Duration::from_millis(25))
            .unwrap();
        // (400 tone + 200 gap) per symbol.
        assert_eq!(samples.len(), 1200);
        assert!(samples[400..600].iter().all(|&s| s == 0));
    }

    #[test]
    fn test_sequence_comma_inserts_pause() {
        let synth = ToneSynth::new(8000);
        let samples = synth
            .sequence("1,", Duration::from_millis(10), Duration::from_millis(10))
            .unwrap();
        assert_eq!(samples.len(), 240);
    }

    #[test]
    fn test_sequence_rejects_unknown_symbol() {
        let synth = ToneSynth::new(8000);
        let result = synth.sequence("1x", Duration::from_millis(10), Duration::ZERO);
        assert!(result.is_err());
    }

    #[test]
    fn test_white_noise_is_deterministic_and_bounded() {
        let a = white_noise(500, 0.5, 42);
        let b = white_noise(500, 0.5, 42);
        assert_eq!(a, b);
        assert!(a.iter().all(|&s| s.unsigned_abs() <= 16384));
        assert_ne!(a, white_noise(500, 0.5, 43));
    }

    #[test]
    fn test_samples_for_duration() {
        let synth = ToneSynth::new(8000);
        assert_eq!(synth.samples_for(Duration::from_millis(150)), 1200);
        assert_eq!(synth.sample_rate(), 8000);
    }
}
