//! Detection station: audio windows in, alarm triggers out.
//!
//! Detector, debouncer and aggregator run back to back on the same thread,
//! so per-window ordering is preserved by construction.

use crate::config::Config;
use crate::dtmf::{DebounceConfig, DetectorConfig, DigitDebouncer, Observation, ToneDetector};
use crate::pipeline::error::StationError;
use crate::pipeline::station::Station;
use crate::pipeline::types::{AudioWindow, TriggerEvent, WindowOutcome};
use crate::trigger::{TriggerAggregator, TriggerConfig};
use std::time::{Duration, Instant};

pub struct DetectionStation {
    detector: ToneDetector,
    debouncer: DigitDebouncer,
    aggregator: TriggerAggregator,
    /// Real-time budget per window (one hop).
    budget: Duration,
    windows: u64,
    digits: u64,
    triggers: u64,
}

impl DetectionStation {
    pub fn new(
        detector: DetectorConfig,
        debounce: DebounceConfig,
        trigger: TriggerConfig,
        budget: Duration,
    ) -> Self {
        Self {
            detector: ToneDetector::new(detector),
            debouncer: DigitDebouncer::new(debounce),
            aggregator: TriggerAggregator::new(trigger),
            budget,
            windows: 0,
            digits: 0,
            triggers: 0,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.detector_config(),
            config.debounce_config(),
            config.trigger_config(),
            config.window_config().hop_duration(),
        )
    }

    /// Runs one window through all three stages.
    pub fn step(&mut self, window: &AudioWindow) -> Result<WindowOutcome, StationError> {
        let started = Instant::now();
        self.windows += 1;

        let candidate = self.detector.detect(window);
        let observation = Observation::new(
            window.offset,
            window.end_offset(),
            window.captured_at,
            candidate.as_ref(),
        );
        let digit = self
            .debouncer
            .observe(observation)
            .map_err(|e| StationError::Recoverable(e.to_string()))?;

        let mut trigger = None;
        if let Some(digit) = &digit {
            self.digits += 1;
            tracing::debug!(
                symbol = %digit.symbol,
                at_ms = digit.started_at.as_millis() as u64,
                "digit confirmed"
            );
            trigger = self
                .aggregator
                .on_digit(digit)
                .map_err(|e| StationError::Recoverable(e.to_string()))?;
        }
        if let Some(trigger) = &trigger {
            self.triggers += 1;
            tracing::info!(
                trigger_id = trigger.id,
                symbol = %trigger.symbol,
                at_ms = trigger.detected_at.as_millis() as u64,
                "alarm dial-out detected"
            );
        }

        let elapsed = started.elapsed();
        if elapsed > self.budget {
            tracing::debug!(
                sequence = window.sequence,
                elapsed_us = elapsed.as_micros() as u64,
                budget_us = self.budget.as_micros() as u64,
                "window processed slower than real time"
            );
        }

        Ok(WindowOutcome {
            candidate,
            digit,
            trigger,
        })
    }
}

impl Station for DetectionStation {
    type Input = AudioWindow;
    type Output = TriggerEvent;

    fn process(&mut self, window: AudioWindow) -> Result<Option<TriggerEvent>, StationError> {
        Ok(self.step(&window)?.trigger)
    }

    fn name(&self) -> &'static str {
        "detection"
    }

    fn shutdown(&mut self) {
        tracing::debug!(
            windows = self.windows,
            digits = self.digits,
            triggers = self.triggers,
            "detection finished"
        );
    }
}
