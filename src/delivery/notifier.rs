//! The outbound notification capability.

use crate::delivery::payload::AlarmPayload;
use crate::error::{DeliveryError, DialwatchError, Result};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Sends one notification attempt. Shared by every in-flight delivery.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Performs a single attempt. Any error is recoverable by retrying.
    async fn deliver(&self, payload: &AlarmPayload) -> std::result::Result<(), DeliveryError>;

    /// Where notifications go, for logging.
    fn destination(&self) -> &str;
}

/// Webhook endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookConfig {
    pub url: String,
    /// Sent as `Authorization: Bearer <credential>`.
    pub credential: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// POSTs the payload as JSON. Any 2xx response is a success.
pub struct WebhookNotifier {
    client: reqwest::Client,
    config: WebhookConfig,
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("dialwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DialwatchError::Other(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn deliver(&self, payload: &AlarmPayload) -> std::result::Result<(), DeliveryError> {
        let mut request = self.client.post(&self.config.url).json(payload);
        if let Some(credential) = &self.config.credential {
            request = request.bearer_auth(credential);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                DeliveryError::Timeout
            } else if e.is_builder() {
                DeliveryError::Payload(e.to_string())
            } else {
                DeliveryError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Status(status.as_u16()))
        }
    }

    fn destination(&self) -> &str {
        &self.config.url
    }
}

/// Notifier that replays scripted outcomes and records every call.
///
/// Outcomes are consumed in order; once the script runs out, `fallback` is
/// returned for every further attempt.
pub struct ScriptedNotifier {
    outcomes: Mutex<VecDeque<std::result::Result<(), DeliveryError>>>,
    fallback: std::result::Result<(), DeliveryError>,
    calls: Mutex<Vec<(Instant, AlarmPayload)>>,
}

impl ScriptedNotifier {
    /// Succeeds on every attempt.
    pub fn succeeding() -> Self {
        Self::with_fallback(Ok(()))
    }

    /// Fails every attempt with `error`.
    pub fn failing(error: DeliveryError) -> Self {
        Self::with_fallback(Err(error))
    }

    /// Fails the first `failures` attempts with `error`, then succeeds.
    pub fn failing_times(failures: usize, error: DeliveryError) -> Self {
        let notifier = Self::succeeding();
        notifier
            .outcomes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(std::iter::repeat_n(Err(error), failures));
        notifier
    }

    fn with_fallback(fallback: std::result::Result<(), DeliveryError>) -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            fallback,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Time and payload of every attempt so far.
    pub fn calls(&self) -> Vec<(Instant, AlarmPayload)> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait::async_trait]
impl Notifier for ScriptedNotifier {
    async fn deliver(&self, payload: &AlarmPayload) -> std::result::Result<(), DeliveryError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((Instant::now(), payload.clone()));
        self.outcomes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }

    fn destination(&self) -> &str {
        "scripted"
    }
}
