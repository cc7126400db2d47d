//! Cuts a continuous sample stream into overlapping analysis windows.

use crate::defaults;
use crate::pipeline::types::{AudioWindow, samples_to_duration};
use std::collections::VecDeque;
use std::time::SystemTime;

/// Window geometry. Constant for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    pub sample_rate: u32,
    /// Samples per window.
    pub window_size: usize,
    /// Samples between the starts of consecutive windows.
    pub hop_size: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            window_size: defaults::WINDOW_SIZE,
            hop_size: defaults::HOP_SIZE,
        }
    }
}

impl WindowConfig {
    /// Real-time budget for processing one window.
    pub fn hop_duration(&self) -> std::time::Duration {
        samples_to_duration(self.hop_size as u64, self.sample_rate)
    }
}

/// Accumulates samples and emits every complete window.
pub struct AudioWindower {
    config: WindowConfig,
    buffer: VecDeque<i16>,
    /// Stream index of `buffer[0]`.
    buffer_start: u64,
    sequence: u64,
    stream_start: SystemTime,
}

impl AudioWindower {
    /// Creates a windower whose stream begins at `stream_start` (wall clock).
    pub fn new(config: WindowConfig, stream_start: SystemTime) -> Self {
        Self {
            buffer: VecDeque::with_capacity(config.window_size * 2),
            config,
            buffer_start: 0,
            sequence: 0,
            stream_start,
        }
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// Total samples consumed so far.
    pub fn samples_seen(&self) -> u64 {
        self.buffer_start + self.buffer.len() as u64
    }

    /// Appends samples and returns the windows that became complete.
    ///
    /// A zero window size never completes a window.
    pub fn push(&mut self, samples: &[i16]) -> Vec<AudioWindow> {
        self.buffer.extend(samples.iter().copied());

        let mut windows = Vec::new();
        if self.config.window_size == 0 {
            self.buffer_start += self.buffer.len() as u64;
            self.buffer.clear();
            return windows;
        }
        let hop = self.config.hop_size.max(1);
        while self.buffer.len() >= self.config.window_size {
            let samples: Vec<i16> = self
                .buffer
                .iter()
                .take(self.config.window_size)
                .copied()
                .collect();
            let offset = samples_to_duration(self.buffer_start, self.config.sample_rate);
            windows.push(AudioWindow::new(
                samples,
                self.config.sample_rate,
                self.sequence,
                offset,
                self.stream_start + offset,
            ));
            self.sequence += 1;

            let advance = hop.min(self.buffer.len());
            self.buffer.drain(..advance);
            self.buffer_start += advance as u64;
        }
        windows
    }
}
