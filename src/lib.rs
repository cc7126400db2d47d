//! dialwatch - alarm panel dial-out detection
//!
//! Listens to a phone line through a voice modem, recognises the DTMF digits
//! an alarm panel dials when it reports, and notifies a webhook with retries.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod delivery;
pub mod dtmf;
pub mod error;
pub mod pipeline;
pub mod trigger;

// Core traits (source → detect → sink)
pub use audio::AudioSource;
pub use delivery::Notifier;
pub use pipeline::sink::{CollectorSink, DeliverySink, TriggerSink};

// Monitor
pub use pipeline::monitor::{Monitor, MonitorConfig, MonitorHandle, MonitorReport};

// Detection
pub use dtmf::{DigitDebouncer, ToneDetector};
pub use pipeline::types::{DigitEvent, TriggerEvent};
pub use trigger::TriggerAggregator;

// Delivery
pub use delivery::{DeliveryConfig, DeliveryManager, DeliveryState, WebhookNotifier};

// Error handling
pub use error::{DeliveryError, DialwatchError, Result};

// Config
pub use config::Config;

// Station framework (for advanced users)
pub use pipeline::error::{ErrorReporter, StationError};
pub use pipeline::station::Station;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
