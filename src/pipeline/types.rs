//! Data types that flow between the detection stages.
//!
//! `AudioWindow` and `ToneCandidate` are transient and owned by the stage
//! processing them. `DigitEvent` and `TriggerEvent` are immutable once
//! created and travel downstream by value.

use std::time::{Duration, SystemTime};

/// A fixed-length block of mono samples cut from the capture stream.
#[derive(Debug, Clone)]
pub struct AudioWindow {
    /// PCM samples (16-bit signed integers).
    pub samples: Vec<i16>,
    /// Sample rate of `samples` in Hz.
    pub sample_rate: u32,
    /// Sequence number for ordering and gap detection.
    pub sequence: u64,
    /// Position of the first sample relative to the start of the stream.
    pub offset: Duration,
    /// Wall-clock time of the first sample.
    pub captured_at: SystemTime,
}

impl AudioWindow {
    /// Creates a new audio window.
    pub fn new(
        samples: Vec<i16>,
        sample_rate: u32,
        sequence: u64,
        offset: Duration,
        captured_at: SystemTime,
    ) -> Self {
        Self {
            samples,
            sample_rate,
            sequence,
            offset,
            captured_at,
        }
    }

    /// Duration covered by the samples of this window.
    pub fn duration(&self) -> Duration {
        samples_to_duration(self.samples.len() as u64, self.sample_rate)
    }

    /// Stream position just past the last sample.
    pub fn end_offset(&self) -> Duration {
        self.offset + self.duration()
    }
}

/// Converts a sample count into a duration at the given rate.
pub fn samples_to_duration(samples: u64, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(samples.saturating_mul(1_000_000_000) / sample_rate as u64)
}

/// Result of analysing one window: the dominant tone pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneCandidate {
    /// Keypad symbol of the (low, high) pair.
    pub symbol: char,
    /// Frequency of the selected low-group bin in Hz.
    pub low_hz: f32,
    /// Frequency of the selected high-group bin in Hz.
    pub high_hz: f32,
    /// Normalized amplitude of the low tone (full scale = 1.0).
    pub low_magnitude: f32,
    /// Normalized amplitude of the high tone (full scale = 1.0).
    pub high_magnitude: f32,
    /// Mean-square energy of the whole window (after DC removal).
    pub energy: f32,
}

impl ToneCandidate {
    /// Share of the window energy carried by the two tones, clamped to `[0, 1]`.
    pub fn confidence(&self) -> f32 {
        if self.energy <= 0.0 {
            return 0.0;
        }
        let tone_energy =
            (self.low_magnitude * self.low_magnitude + self.high_magnitude * self.high_magnitude)
                / 2.0;
        (tone_energy / self.energy).clamp(0.0, 1.0)
    }

    /// Level difference between the two tones in dB (positive when the high tone is louder).
    pub fn twist_db(&self) -> f32 {
        amplitude_ratio_db(self.high_magnitude, self.low_magnitude)
    }
}

/// Ratio of two amplitudes in dB. Returns 0 when either side is not positive.
pub fn amplitude_ratio_db(numerator: f32, denominator: f32) -> f32 {
    if numerator <= 0.0 || denominator <= 0.0 {
        return 0.0;
    }
    20.0 * (numerator / denominator).log10()
}

/// A confirmed dial digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigitEvent {
    /// Keypad symbol.
    pub symbol: char,
    /// Stream position of the first window that carried the tone.
    pub started_at: Duration,
    /// Wall-clock time of the first window that carried the tone.
    pub captured_at: SystemTime,
    /// How long the tone had been sustained when it was confirmed.
    pub duration: Duration,
}

/// A single alarm dial-out detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerEvent {
    /// Monotonically increasing id, unique for the lifetime of the aggregator.
    pub id: u64,
    /// Symbol of the digit that raised the alarm.
    pub symbol: char,
    /// Stream position of the originating digit.
    pub detected_at: Duration,
    /// Wall-clock time of the originating digit.
    pub captured_at: SystemTime,
}

impl TriggerEvent {
    /// Builds a trigger from the digit that caused it.
    pub fn from_digit(id: u64, digit: &DigitEvent) -> Self {
        Self {
            id,
            symbol: digit.symbol,
            detected_at: digit.started_at,
            captured_at: digit.captured_at,
        }
    }
}

/// Everything one window produced on its way through detection.
#[derive(Debug, Clone, Default)]
pub struct WindowOutcome {
    pub candidate: Option<ToneCandidate>,
    pub digit: Option<DigitEvent>,
    pub trigger: Option<TriggerEvent>,
}
