//! Goertzel filter: single-frequency magnitude estimate.
//!
//! Only eight fixed frequencies matter for DTMF, so evaluating eight
//! resonators is far cheaper than a full FFT of every window.

use std::f32::consts::PI;

/// A resonator tuned to one frequency at one sample rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Goertzel {
    frequency: f32,
    coeff: f32,
}

impl Goertzel {
    /// Tunes the filter to `frequency` Hz. The coefficient uses the exact
    /// frequency rather than the nearest integer bin, so the window length
    /// is free.
    pub fn new(frequency: f32, sample_rate: u32) -> Self {
        let omega = 2.0 * PI * frequency / sample_rate as f32;
        Self {
            frequency,
            coeff: 2.0 * omega.cos(),
        }
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Amplitude of the tuned component in `samples`.
    ///
    /// A sinusoid of amplitude `a` at the tuned frequency yields roughly `a`.
    pub fn magnitude(&self, samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let (mut s1, mut s2) = (0.0f32, 0.0f32);
        for &x in samples {
            let s0 = x + self.coeff * s1 - s2;
            s2 = s1;
            s1 = s0;
        }
        let power = (s1 * s1 + s2 * s2 - self.coeff * s1 * s2).max(0.0);
        2.0 * power.sqrt() / samples.len() as f32
    }
}

/// A bank of resonators evaluated over the same window.
#[derive(Debug, Clone)]
pub struct GoertzelBank<const N: usize> {
    filters: [Goertzel; N],
}

impl<const N: usize> GoertzelBank<N> {
    pub fn new(frequencies: [f32; N], sample_rate: u32) -> Self {
        Self {
            filters: frequencies.map(|f| Goertzel::new(f, sample_rate)),
        }
    }

    /// Amplitudes of every filter, in table order.
    pub fn magnitudes(&self, samples: &[f32]) -> [f32; N] {
        self.filters.map(|f| f.magnitude(samples))
    }

    pub fn frequencies(&self) -> [f32; N] {
        self.filters.map(|f| f.frequency())
    }
}
