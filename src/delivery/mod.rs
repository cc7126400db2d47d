//! Alarm notification delivery with bounded, fixed-interval retry.

pub mod manager;
pub mod notifier;
pub mod payload;
pub mod task;

pub use manager::{DeliveryConfig, DeliveryEvent, DeliveryManager};
pub use notifier::{Notifier, ScriptedNotifier, WebhookConfig, WebhookNotifier};
pub use payload::AlarmPayload;
pub use task::{DeliveryState, DeliveryTask};
