//! Tone detector: one audio window in, at most one DTMF symbol out.
//!
//! Per window the detector
//! 1. removes the DC offset (8-bit modem PCM is rarely centred),
//! 2. evaluates the eight keypad frequencies with Goertzel resonators,
//! 3. picks the strongest bin of each group and accepts the pair only if
//!    both clear the noise floor, the twist is within tolerance, each pick
//!    dominates the rest of its group, and the pair carries most of the
//!    window energy.
//!
//! Anything else (silence, a single tone, chords, broadband noise, a window
//! of the wrong length) yields `None`. Detection never fails.

use crate::defaults;
use crate::dtmf::goertzel::GoertzelBank;
use crate::dtmf::table::ToneTable;
use crate::pipeline::types::{AudioWindow, ToneCandidate};

/// Thresholds for accepting a tone pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
    /// Sample rate the windows are captured at.
    pub sample_rate: u32,
    /// Expected number of samples per window.
    pub window_size: usize,
    /// Minimum normalized amplitude of each selected bin.
    pub noise_floor: f32,
    /// Maximum level difference between the two tones (dB).
    pub max_twist_db: f32,
    /// Margin the selected bin must keep over every other bin of its group (dB).
    pub dominance_margin_db: f32,
    /// Minimum share of window energy carried by the pair.
    pub min_energy_ratio: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            window_size: defaults::WINDOW_SIZE,
            noise_floor: defaults::NOISE_FLOOR,
            max_twist_db: defaults::MAX_TWIST_DB,
            dominance_margin_db: defaults::DOMINANCE_MARGIN_DB,
            min_energy_ratio: defaults::MIN_ENERGY_RATIO,
        }
    }
}

/// Why a window did not produce a candidate. Used for trace logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    WrongLength,
    BelowNoiseFloor,
    Ambiguous,
    Twist,
    LowEnergyRatio,
}

/// Outcome of selecting the best bin within one frequency group.
#[derive(Debug, Clone, Copy)]
struct GroupPick {
    index: usize,
    magnitude: f32,
}

pub struct ToneDetector {
    config: DetectorConfig,
    table: ToneTable,
    low: GoertzelBank<4>,
    high: GoertzelBank<4>,
    // Linear amplitude ratios derived from the dB settings.
    max_twist_ratio: f32,
    dominance_ratio: f32,
    scratch: Vec<f32>,
}

impl ToneDetector {
    /// Creates a detector for the standard keypad.
    pub fn new(config: DetectorConfig) -> Self {
        Self::with_table(config, ToneTable::default())
    }

    /// Creates a detector for an alternative frequency table.
    pub fn with_table(config: DetectorConfig, table: ToneTable) -> Self {
        Self {
            low: GoertzelBank::new(table.low_hz, config.sample_rate),
            high: GoertzelBank::new(table.high_hz, config.sample_rate),
            max_twist_ratio: db_to_ratio(config.max_twist_db),
            dominance_ratio: db_to_ratio(config.dominance_margin_db),
            scratch: Vec::with_capacity(config.window_size),
            config,
            table,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Analyses one window and returns the detected symbol, if any.
    pub fn detect(&mut self, window: &AudioWindow) -> Option<ToneCandidate> {
        match self.analyze(window) {
            Ok(candidate) => Some(candidate),
            Err(reason) => {
                tracing::trace!(sequence = window.sequence, ?reason, "window rejected");
                None
            }
        }
    }

    /// Like [`detect`](Self::detect) but reports the rejection reason.
    pub fn analyze(&mut self, window: &AudioWindow) -> Result<ToneCandidate, Rejection> {
        if window.samples.len() != self.config.window_size
            || window.sample_rate != self.config.sample_rate
        {
            return Err(Rejection::WrongLength);
        }

        self.fill_scratch(&window.samples);
        let energy = self.scratch.iter().map(|x| x * x).sum::<f32>() / self.scratch.len() as f32;
        if energy <= 0.0 {
            return Err(Rejection::BelowNoiseFloor);
        }

        let low_mags = self.low.magnitudes(&self.scratch);
        let high_mags = self.high.magnitudes(&self.scratch);
        let low = self.pick(&low_mags)?;
        let high = self.pick(&high_mags)?;

        let (louder, quieter) = if low.magnitude >= high.magnitude {
            (low.magnitude, high.magnitude)
        } else {
            (high.magnitude, low.magnitude)
        };
        if louder > quieter * self.max_twist_ratio {
            return Err(Rejection::Twist);
        }

        let tone_energy = (low.magnitude * low.magnitude + high.magnitude * high.magnitude) / 2.0;
        if tone_energy < energy * self.config.min_energy_ratio {
            return Err(Rejection::LowEnergyRatio);
        }

        let symbol = self
            .table
            .symbol_for(low.index, high.index)
            .ok_or(Rejection::Ambiguous)?;

        Ok(ToneCandidate {
            symbol,
            low_hz: self.table.low_hz[low.index],
            high_hz: self.table.high_hz[high.index],
            low_magnitude: low.magnitude,
            high_magnitude: high.magnitude,
            energy,
        })
    }

    /// Normalizes samples to `[-1, 1]` and removes the mean.
    fn fill_scratch(&mut self, samples: &[i16]) {
        let mean = samples.iter().map(|&s| s as f32).sum::<f32>() / samples.len() as f32;
        self.scratch.clear();
        self.scratch
            .extend(samples.iter().map(|&s| (s as f32 - mean) / 32768.0));
    }

    /// Selects the strongest bin of a group.
    ///
    /// The maximum must clear the noise floor, and every other bin of the
    /// group must sit at least the dominance margin below it, however quiet
    /// that bin is. Otherwise the group holds a chord, a near-miss tone or
    /// harmonic-rich noise.
    fn pick(&self, magnitudes: &[f32; 4]) -> Result<GroupPick, Rejection> {
        let (index, magnitude) = magnitudes
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .ok_or(Rejection::BelowNoiseFloor)?;

        if magnitude < self.config.noise_floor {
            return Err(Rejection::BelowNoiseFloor);
        }

        // Covers a second strong bin as well as a near-floor neighbour.
        let contested = magnitudes
            .iter()
            .enumerate()
            .any(|(i, &m)| i != index && m * self.dominance_ratio >= magnitude);
        if contested {
            return Err(Rejection::Ambiguous);
        }

        Ok(GroupPick { index, magnitude })
    }
}

fn db_to_ratio(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}
