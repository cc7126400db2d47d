//! Runs every alarm notification as an independent retrying task.
//!
//! `enqueue` only spawns; the audio path never waits on the network. Each
//! task sleeps on its own timer between attempts, so a slow or failing
//! destination affects nothing but its own task.

use crate::defaults;
use crate::delivery::notifier::Notifier;
use crate::delivery::payload::AlarmPayload;
use crate::delivery::task::{DeliveryState, DeliveryTask};
use crate::error::DeliveryError;
use crate::pipeline::types::TriggerEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Retry policy shared by all tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryConfig {
    /// Spacing between consecutive attempt start times.
    pub retry_interval: Duration,
    /// How long after creation attempts may still be scheduled.
    pub deadline: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            retry_interval: defaults::RETRY_INTERVAL,
            deadline: defaults::RETRY_DEADLINE,
        }
    }
}

/// Progress report from a running task.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryEvent {
    Attempted {
        trigger_id: u64,
        attempt: u32,
        result: Result<(), DeliveryError>,
    },
    Finished {
        trigger_id: u64,
        state: DeliveryState,
        attempts: u32,
    },
}

pub struct DeliveryManager {
    notifier: Arc<dyn Notifier>,
    config: DeliveryConfig,
    source: String,
    runtime: Handle,
    tracker: TaskTracker,
    cancel: CancellationToken,
    events: Option<UnboundedSender<DeliveryEvent>>,
}

impl DeliveryManager {
    /// Tasks are spawned on `runtime`, so `enqueue` may be called from any thread.
    pub fn new(
        notifier: Arc<dyn Notifier>,
        config: DeliveryConfig,
        source: impl Into<String>,
        runtime: Handle,
    ) -> Self {
        Self {
            notifier,
            config,
            source: source.into(),
            runtime,
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
            events: None,
        }
    }

    /// Report attempts and terminal states on `events`.
    pub fn with_event_sender(mut self, events: UnboundedSender<DeliveryEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    /// Tasks that have not reached a terminal state.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Starts delivering `trigger` and returns the new task as created.
    pub fn enqueue(&self, trigger: TriggerEvent) -> DeliveryTask {
        let payload = AlarmPayload::from_trigger(&trigger, &self.source);
        let task = DeliveryTask::new(
            trigger,
            payload,
            self.notifier.destination().to_string(),
            &self.config,
            Instant::now(),
        );
        tracing::info!(
            trigger_id = trigger.id,
            symbol = %trigger.symbol,
            destination = %task.destination,
            "alarm notification queued"
        );

        let run = run_task(
            task.clone(),
            Arc::clone(&self.notifier),
            self.cancel.clone(),
            self.events.clone(),
        );
        self.tracker.spawn_on(run, &self.runtime);
        task
    }

    /// Waits until every task has reached a terminal state.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Abandons every waiting task and waits for them to stop.
    pub async fn shutdown(&self) {
        let pending = self.tracker.len();
        if pending > 0 {
            tracing::warn!(pending, "abandoning pending notifications");
        }
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

async fn run_task(
    mut task: DeliveryTask,
    notifier: Arc<dyn Notifier>,
    cancel: CancellationToken,
    events: Option<UnboundedSender<DeliveryEvent>>,
) -> DeliveryTask {
    let trigger_id = task.trigger.id;
    let emit = |event: DeliveryEvent| {
        if let Some(events) = &events
            && events.send(event).is_err()
        {
            tracing::trace!(trigger_id, "delivery event receiver gone");
        }
    };

    while let Some(due) = task.next_attempt_at() {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                task.abandon();
                break;
            }
            _ = tokio::time::sleep_until(due) => {}
        }

        let Some(attempt) = task.begin_attempt() else {
            break;
        };
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                task.abandon();
                break;
            }
            result = notifier.deliver(&task.payload) => result,
        };

        match &result {
            Ok(()) => task.record_success(),
            Err(e) => {
                tracing::warn!(trigger_id, attempt, error = %e, "notification attempt failed");
                task.record_failure(e.clone());
            }
        }
        emit(DeliveryEvent::Attempted {
            trigger_id,
            attempt,
            result,
        });
    }

    let attempts = task.attempts();
    let elapsed = task.created_at.elapsed();
    match task.state() {
        DeliveryState::Succeeded => {
            tracing::info!(trigger_id, attempts, "alarm notification delivered");
        }
        DeliveryState::Exhausted { last_error } => {
            tracing::error!(
                trigger_id,
                attempts,
                elapsed = %humantime::format_duration(truncate_to_secs(elapsed)),
                last_error = %last_error,
                "alarm notification exhausted, giving up"
            );
        }
        DeliveryState::Abandoned => {
            tracing::warn!(trigger_id, attempts, "alarm notification abandoned");
        }
        other => {
            tracing::debug!(trigger_id, state = other.name(), "delivery task stopped");
        }
    }
    emit(DeliveryEvent::Finished {
        trigger_id,
        state: task.state().clone(),
        attempts,
    });
    task
}

fn truncate_to_secs(duration: Duration) -> Duration {
    Duration::from_secs(duration.as_secs())
}
