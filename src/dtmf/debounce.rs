//! Digit debounce state machine.
//!
//! Turns the noisy per-window detector output into confirmed digit events.
//!
//! ```text
//!            tone s                 s × min_tone_frames
//!  Idle ─────────────► Confirming ──────────────────────► Holding(s)   emits DigitEvent
//!   ▲                   │  ▲                                │   ▲
//!   │ none              │  │ other tone            none     │   │ s again (dropout bridged)
//!   └───────────────────┘  └──────────────┐                 ▼   │
//!   ▲                                     └──────────── Silent(s, n)
//!   └──────────────── none × min_gap_frames ───────────────┘
//! ```
//!
//! A sustained tone yields exactly one event, and the same digit can only be
//! confirmed again after at least `min_gap_frames` silent windows.

use crate::defaults;
use crate::pipeline::types::{DigitEvent, ToneCandidate};
use std::time::{Duration, SystemTime};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceConfig {
    /// Consecutive windows with the same symbol required to confirm a digit.
    pub min_tone_frames: u32,
    /// Consecutive empty windows required before the same digit can repeat.
    pub min_gap_frames: u32,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            min_tone_frames: defaults::MIN_TONE_FRAMES,
            min_gap_frames: defaults::MIN_GAP_FRAMES,
        }
    }
}

/// Current state of the debouncer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    /// No tone.
    Idle,
    /// A symbol has been seen `count` windows in a row but is not yet confirmed.
    Confirming {
        symbol: char,
        count: u32,
        started_at: Duration,
        captured_at: SystemTime,
    },
    /// The symbol has been emitted and is still sounding.
    Holding { symbol: char },
    /// The held symbol stopped `count` windows ago.
    Silent { symbol: char, count: u32 },
}

/// One window's worth of detector output, reduced to what the debouncer needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// Stream position of the window start.
    pub offset: Duration,
    /// Stream position just past the window end.
    pub end_offset: Duration,
    /// Wall-clock time of the window start.
    pub captured_at: SystemTime,
    /// Detected symbol, if any.
    pub symbol: Option<char>,
}

impl Observation {
    pub fn new(
        offset: Duration,
        end_offset: Duration,
        captured_at: SystemTime,
        candidate: Option<&ToneCandidate>,
    ) -> Self {
        Self {
            offset,
            end_offset,
            captured_at,
            symbol: candidate.map(|c| c.symbol),
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceError {
    #[error("window at {offset:?} is not after the previous window at {previous:?}")]
    OutOfOrder { offset: Duration, previous: Duration },
}

pub struct DigitDebouncer {
    config: DebounceConfig,
    state: DebounceState,
    last_offset: Option<Duration>,
}

impl DigitDebouncer {
    pub fn new(config: DebounceConfig) -> Self {
        Self {
            config,
            state: DebounceState::Idle,
            last_offset: None,
        }
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    /// Feeds one window. Returns a digit the moment it is confirmed.
    ///
    /// Windows whose offset does not advance are rejected without touching
    /// the state.
    pub fn observe(&mut self, obs: Observation) -> Result<Option<DigitEvent>, DebounceError> {
        if let Some(previous) = self.last_offset
            && obs.offset <= previous
        {
            return Err(DebounceError::OutOfOrder {
                offset: obs.offset,
                previous,
            });
        }
        self.last_offset = Some(obs.offset);

        let (next, event) = self.transition(obs);
        self.state = next;
        Ok(event)
    }

    fn transition(&self, obs: Observation) -> (DebounceState, Option<DigitEvent>) {
        match (self.state, obs.symbol) {
            (DebounceState::Idle, None) => (DebounceState::Idle, None),
            (DebounceState::Idle, Some(symbol)) => self.start_confirming(symbol, obs),

            (
                DebounceState::Confirming {
                    symbol,
                    count,
                    started_at,
                    captured_at,
                },
                Some(seen),
            ) if seen == symbol => {
                let count = count + 1;
                if count >= self.config.min_tone_frames {
                    let event = DigitEvent {
                        symbol,
                        started_at,
                        captured_at,
                        duration: obs.end_offset.saturating_sub(started_at),
                    };
                    (DebounceState::Holding { symbol }, Some(event))
                } else {
                    (
                        DebounceState::Confirming {
                            symbol,
                            count,
                            started_at,
                            captured_at,
                        },
                        None,
                    )
                }
            }
            (DebounceState::Confirming { .. }, Some(other)) => self.start_confirming(other, obs),
            (DebounceState::Confirming { .. }, None) => (DebounceState::Idle, None),

            (DebounceState::Holding { symbol }, Some(seen)) if seen == symbol => {
                (DebounceState::Holding { symbol }, None)
            }
            (DebounceState::Holding { .. }, Some(other)) => self.start_confirming(other, obs),
            (DebounceState::Holding { symbol }, None) => self.count_silence(symbol, 1),

            (DebounceState::Silent { symbol, count }, None) => {
                self.count_silence(symbol, count + 1)
            }
            (DebounceState::Silent { symbol, .. }, Some(seen)) if seen == symbol => {
                (DebounceState::Holding { symbol }, None)
            }
            (DebounceState::Silent { .. }, Some(other)) => self.start_confirming(other, obs),
        }
    }

    fn start_confirming(
        &self,
        symbol: char,
        obs: Observation,
    ) -> (DebounceState, Option<DigitEvent>) {
        if self.config.min_tone_frames <= 1 {
            let event = DigitEvent {
                symbol,
                started_at: obs.offset,
                captured_at: obs.captured_at,
                duration: obs.end_offset.saturating_sub(obs.offset),
            };
            return (DebounceState::Holding { symbol }, Some(event));
        }
        (
            DebounceState::Confirming {
                symbol,
                count: 1,
                started_at: obs.offset,
                captured_at: obs.captured_at,
            },
            None,
        )
    }

    fn count_silence(&self, symbol: char, count: u32) -> (DebounceState, Option<DigitEvent>) {
        if count >= self.config.min_gap_frames {
            (DebounceState::Idle, None)
        } else {
            (DebounceState::Silent { symbol, count }, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOP: Duration = Duration::from_millis(10);
    const WINDOW: Duration = Duration::from_millis(25);

    /// Drives a debouncer with a symbol sequence, one window per entry.
    struct Driver {
        debouncer: DigitDebouncer,
        next: u32,
    }

    impl Driver {
        fn new(min_tone_frames: u32, min_gap_frames: u32) -> Self {
            Self {
                debouncer: DigitDebouncer::new(DebounceConfig {
                    min_tone_frames,
                    min_gap_frames,
                }),
                next: 0,
            }
        }

        fn feed(&mut self, symbol: Option<char>) -> Option<DigitEvent> {
            let offset = HOP * self.next;
            self.next += 1;
            self.debouncer
                .observe(Observation {
                    offset,
                    end_offset: offset + WINDOW,
                    captured_at: SystemTime::UNIX_EPOCH + offset,
                    symbol,
                })
                .unwrap()
        }

        fn feed_many(&mut self, symbol: Option<char>, count: u32) -> Vec<DigitEvent> {
            (0..count).filter_map(|_| self.feed(symbol)).collect()
        }
    }

    #[test]
    fn test_idle_to_confirming() {
        let mut d = Driver::new(3, 3);
        assert!(d.feed(Some('5')).is_none());
        assert!(matches!(
            d.debouncer.state(),
            DebounceState::Confirming { symbol: '5', count: 1, .. }
        ));
    }

    #[test]
    fn test_confirms_after_min_tone_frames() {
        let mut d = Driver::new(3, 3);
        assert!(d.feed(Some('5')).is_none());
        assert!(d.feed(Some('5')).is_none());
        let event = d.feed(Some('5')).expect("confirmed on third window");
        assert_eq!(event.symbol, '5');
        assert_eq!(event.started_at, Duration::ZERO);
        assert_eq!(event.duration, HOP * 2 + WINDOW);
        assert_eq!(d.debouncer.state(), DebounceState::Holding { symbol: '5' });
    }

    #[test]
    fn test_sustained_tone_emits_once() {
        for k in 1..=5 {
            let mut d = Driver::new(3, 3);
            let events = d.feed_many(Some('8'), 3 * k);
            assert_eq!(events.len(), 1, "k = {k}");
        }
    }

    #[test]
    fn test_confirming_interrupted_by_silence_resets() {
        let mut d = Driver::new(3, 3);
        d.feed_many(Some('1'), 2);
        assert!(d.feed(None).is_none());
        assert_eq!(d.debouncer.state(), DebounceState::Idle);
        assert!(d.feed_many(Some('1'), 2).is_empty());
    }

    #[test]
    fn test_confirming_switches_to_new_symbol() {
        let mut d = Driver::new(3, 3);
        d.feed_many(Some('1'), 2);
        assert!(d.feed(Some('2')).is_none());
        assert!(matches!(
            d.debouncer.state(),
            DebounceState::Confirming { symbol: '2', count: 1, .. }
        ));
        let events = d.feed_many(Some('2'), 2);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].symbol, '2');
        assert_eq!(events[0].started_at, HOP * 2);
    }

    #[test]
    fn test_repeat_after_full_gap_emits_twice() {
        let mut d = Driver::new(3, 3);
        let mut events = d.feed_many(Some('4'), 5);
        events.extend(d.feed_many(None, 3));
        assert_eq!(d.debouncer.state(), DebounceState::Idle);
        events.extend(d.feed_many(Some('4'), 5));
        assert_eq!(events.len(), 2);
        assert!(events[1].started_at > events[0].started_at);
    }

    #[test]
    fn test_repeat_after_short_gap_emits_once() {
        let mut d = Driver::new(3, 3);
        let mut events = d.feed_many(Some('4'), 5);
        events.extend(d.feed_many(None, 2));
        assert_eq!(
            d.debouncer.state(),
            DebounceState::Silent {
                symbol: '4',
                count: 2
            }
        );
        events.extend(d.feed_many(Some('4'), 5));
        assert_eq!(events.len(), 1);
        assert_eq!(d.debouncer.state(), DebounceState::Holding { symbol: '4' });
    }

    #[test]
    fn test_different_digit_during_gap_is_confirmed() {
        let mut d = Driver::new(3, 3);
        let mut events = d.feed_many(Some('4'), 3);
        events.extend(d.feed_many(None, 1));
        events.extend(d.feed_many(Some('6'), 3));
        let symbols: Vec<char> = events.iter().map(|e| e.symbol).collect();
        assert_eq!(symbols, vec!['4', '6']);
    }

    #[test]
    fn test_holding_switches_directly_to_other_digit() {
        let mut d = Driver::new(2, 3);
        let mut events = d.feed_many(Some('1'), 3);
        events.extend(d.feed_many(Some('2'), 3));
        let symbols: Vec<char> = events.iter().map(|e| e.symbol).collect();
        assert_eq!(symbols, vec!['1', '2']);
    }

    #[test]
    fn test_single_frame_confirmation() {
        let mut d = Driver::new(1, 1);
        let event = d.feed(Some('#')).expect("immediate confirmation");
        assert_eq!(event.duration, WINDOW);
        assert!(d.feed(None).is_none());
        assert_eq!(d.debouncer.state(), DebounceState::Idle);
        assert!(d.feed(Some('#')).is_some());
    }

    #[test]
    fn test_out_of_order_window_is_rejected_without_state_change() {
        let mut debouncer = DigitDebouncer::new(DebounceConfig::default());
        let obs = |ms: u64, symbol| Observation {
            offset: Duration::from_millis(ms),
            end_offset: Duration::from_millis(ms) + WINDOW,
            captured_at: SystemTime::UNIX_EPOCH,
            symbol,
        };
        debouncer.observe(obs(10, Some('5'))).unwrap();
        debouncer.observe(obs(20, Some('5'))).unwrap();
        let before = debouncer.state();

        let err = debouncer.observe(obs(15, Some('5'))).unwrap_err();
        assert!(matches!(err, DebounceError::OutOfOrder { .. }));
        assert!(debouncer.observe(obs(20, Some('5'))).is_err());
        assert_eq!(debouncer.state(), before);

        // Processing resumes once offsets advance again.
        assert!(debouncer.observe(obs(30, Some('5'))).unwrap().is_some());
    }
}
