//! Trigger aggregator: collapses a burst of dial digits into one alarm.
//!
//! The first confirmed digit raises the alarm. Further digits within the
//! cooldown window belong to the same dial attempt and are suppressed.

use crate::defaults;
use crate::pipeline::types::{DigitEvent, TriggerEvent};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerConfig {
    /// Minimum stream time between two emitted triggers.
    pub cooldown: Duration,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            cooldown: defaults::TRIGGER_COOLDOWN,
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerError {
    #[error("digit at {at:?} precedes the last trigger at {last:?}")]
    OutOfOrder { at: Duration, last: Duration },
}

pub struct TriggerAggregator {
    config: TriggerConfig,
    last_trigger_at: Option<Duration>,
    next_id: u64,
}

impl TriggerAggregator {
    pub fn new(config: TriggerConfig) -> Self {
        Self {
            config,
            last_trigger_at: None,
            next_id: 1,
        }
    }

    /// Stream time of the last emitted trigger.
    pub fn last_trigger_at(&self) -> Option<Duration> {
        self.last_trigger_at
    }

    /// Feeds one digit. Returns a trigger when the digit starts a new dial attempt.
    pub fn on_digit(&mut self, digit: &DigitEvent) -> Result<Option<TriggerEvent>, TriggerError> {
        if let Some(last) = self.last_trigger_at {
            if digit.started_at < last {
                return Err(TriggerError::OutOfOrder {
                    at: digit.started_at,
                    last,
                });
            }
            if digit.started_at - last <= self.config.cooldown {
                tracing::debug!(
                    symbol = %digit.symbol,
                    since_last_ms = (digit.started_at - last).as_millis() as u64,
                    "digit suppressed within cooldown"
                );
                return Ok(None);
            }
        }

        let trigger = TriggerEvent::from_digit(self.next_id, digit);
        self.next_id += 1;
        self.last_trigger_at = Some(digit.started_at);
        Ok(Some(trigger))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn digit(symbol: char, secs: f64) -> DigitEvent {
        DigitEvent {
            symbol,
            started_at: Duration::from_secs_f64(secs),
            captured_at: SystemTime::UNIX_EPOCH,
            duration: Duration::from_millis(40),
        }
    }

    fn aggregator(cooldown_secs: u64) -> TriggerAggregator {
        TriggerAggregator::new(TriggerConfig {
            cooldown: Duration::from_secs(cooldown_secs),
        })
    }

    #[test]
    fn test_first_digit_triggers() {
        let mut agg = aggregator(60);
        let trigger = agg.on_digit(&digit('5', 1.0)).unwrap().expect("trigger");
        assert_eq!(trigger.symbol, '5');
        assert_eq!(trigger.id, 1);
        assert_eq!(agg.last_trigger_at(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_burst_within_cooldown_yields_one_trigger() {
        let mut agg = aggregator(60);
        let triggers: Vec<TriggerEvent> = (0..12)
            .map(|i| digit('0', 10.0 + i as f64 * 0.2))
            .filter_map(|d| agg.on_digit(&d).unwrap())
            .collect();
        assert_eq!(triggers.len(), 1);
    }

    #[test]
    fn test_digit_exactly_at_cooldown_is_suppressed() {
        let mut agg = aggregator(60);
        agg.on_digit(&digit('1', 0.0)).unwrap();
        assert!(agg.on_digit(&digit('1', 60.0)).unwrap().is_none());
    }

    #[test]
    fn test_digit_after_cooldown_triggers_again() {
        let mut agg = aggregator(60);
        agg.on_digit(&digit('1', 0.0)).unwrap();
        let second = agg.on_digit(&digit('2', 60.5)).unwrap().expect("second trigger");
        assert_eq!(second.id, 2);
        assert_eq!(second.detected_at, Duration::from_secs_f64(60.5));
    }

    #[test]
    fn test_cooldown_measured_from_last_trigger_not_last_digit() {
        let mut agg = aggregator(10);
        agg.on_digit(&digit('1', 0.0)).unwrap();
        assert!(agg.on_digit(&digit('2', 6.0)).unwrap().is_none());
        // 12 s after the trigger, only 6 s after the previous digit.
        assert!(agg.on_digit(&digit('3', 12.0)).unwrap().is_some());
    }

    #[test]
    fn test_out_of_order_digit_is_rejected() {
        let mut agg = aggregator(10);
        agg.on_digit(&digit('1', 5.0)).unwrap();
        let err = agg.on_digit(&digit('2', 4.0)).unwrap_err();
        assert!(matches!(err, TriggerError::OutOfOrder { .. }));
        assert_eq!(agg.last_trigger_at(), Some(Duration::from_secs(5)));
    }
}
