//! Per-notification delivery state machine.
//!
//! ```text
//! Pending ──► Attempting ──► Succeeded
//!               ▲    ├─────► Retrying    next slot within the deadline
//!               │    │          │
//!               └────┼──────────┘        waits until the slot
//!                    └─────► Exhausted   next slot past the deadline
//!
//! Pending | Attempting | Retrying ──► Abandoned   (shutdown)
//! ```
//!
//! Transitions are pure: the caller supplies the clock and performs the I/O.
//! Attempt `n` (1-based) is scheduled at `created_at + (n - 1) * retry_interval`,
//! independent of how long earlier attempts took.

use crate::delivery::manager::DeliveryConfig;
use crate::delivery::payload::AlarmPayload;
use crate::error::DeliveryError;
use crate::pipeline::types::TriggerEvent;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryState {
    /// Created, first attempt not started yet.
    Pending,
    /// Attempt number `attempt` is in flight.
    Attempting { attempt: u32 },
    /// Last attempt failed; the next one is scheduled.
    Retrying {
        next_attempt_at: Instant,
        last_error: DeliveryError,
    },
    Succeeded,
    /// Every attempt until the deadline failed.
    Exhausted { last_error: DeliveryError },
    /// Stopped by shutdown before reaching a result.
    Abandoned,
}

impl DeliveryState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeliveryState::Succeeded | DeliveryState::Exhausted { .. } | DeliveryState::Abandoned
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            DeliveryState::Pending => "pending",
            DeliveryState::Attempting { .. } => "attempting",
            DeliveryState::Retrying { .. } => "retrying",
            DeliveryState::Succeeded => "succeeded",
            DeliveryState::Exhausted { .. } => "exhausted",
            DeliveryState::Abandoned => "abandoned",
        }
    }
}

/// One alarm notification and its retry bookkeeping.
#[derive(Debug, Clone)]
pub struct DeliveryTask {
    pub trigger: TriggerEvent,
    pub payload: AlarmPayload,
    pub destination: String,
    pub created_at: Instant,
    pub deadline: Instant,
    retry_interval: Duration,
    attempts: u32,
    /// Scheduled time of the current or next attempt.
    scheduled_at: Instant,
    state: DeliveryState,
}

impl DeliveryTask {
    pub fn new(
        trigger: TriggerEvent,
        payload: AlarmPayload,
        destination: String,
        config: &DeliveryConfig,
        now: Instant,
    ) -> Self {
        Self {
            trigger,
            payload,
            destination,
            created_at: now,
            deadline: now + config.deadline,
            retry_interval: config.retry_interval,
            attempts: 0,
            scheduled_at: now,
            state: DeliveryState::Pending,
        }
    }

    pub fn state(&self) -> &DeliveryState {
        &self.state
    }

    /// Attempts started so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// When the next attempt is due, if one is waiting.
    pub fn next_attempt_at(&self) -> Option<Instant> {
        match self.state {
            DeliveryState::Pending | DeliveryState::Retrying { .. } => Some(self.scheduled_at),
            _ => None,
        }
    }

    /// Pending or Retrying → Attempting. Returns the attempt number, or
    /// `None` if no attempt is waiting.
    pub fn begin_attempt(&mut self) -> Option<u32> {
        match self.state {
            DeliveryState::Pending | DeliveryState::Retrying { .. } => {
                self.attempts += 1;
                self.state = DeliveryState::Attempting {
                    attempt: self.attempts,
                };
                Some(self.attempts)
            }
            _ => None,
        }
    }

    /// Attempting → Succeeded.
    pub fn record_success(&mut self) {
        if matches!(self.state, DeliveryState::Attempting { .. }) {
            self.state = DeliveryState::Succeeded;
        }
    }

    /// Attempting → Retrying, or → Exhausted when the next slot would fall
    /// after the deadline.
    pub fn record_failure(&mut self, error: DeliveryError) {
        if !matches!(self.state, DeliveryState::Attempting { .. }) {
            return;
        }
        let next = self.scheduled_at + self.retry_interval;
        if next > self.deadline {
            self.state = DeliveryState::Exhausted { last_error: error };
        } else {
            self.scheduled_at = next;
            self.state = DeliveryState::Retrying {
                next_attempt_at: next,
                last_error: error,
            };
        }
    }

    /// Any non-terminal state → Abandoned.
    pub fn abandon(&mut self) {
        if !self.is_terminal() {
            self.state = DeliveryState::Abandoned;
        }
    }
}
