//! JSON body of an alarm notification.

use crate::pipeline::types::TriggerEvent;
use serde::{Deserialize, Serialize};

/// Event name carried by every alarm notification.
pub const ALARM_EVENT: &str = "alarm_triggered";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmPayload {
    pub event: String,
    pub trigger_id: u64,
    pub symbol: String,
    /// Wall-clock detection time, RFC 3339 in UTC.
    pub detected_at: String,
    /// Position of the detection in the capture stream.
    pub stream_offset_ms: u64,
    /// Which installation raised the alarm.
    pub source: String,
}

impl AlarmPayload {
    pub fn from_trigger(trigger: &TriggerEvent, source: &str) -> Self {
        Self {
            event: ALARM_EVENT.to_string(),
            trigger_id: trigger.id,
            symbol: trigger.symbol.to_string(),
            detected_at: humantime::format_rfc3339_millis(trigger.captured_at).to_string(),
            stream_offset_ms: trigger.detected_at.as_millis() as u64,
            source: source.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    fn trigger() -> TriggerEvent {
        TriggerEvent {
            id: 7,
            symbol: '#',
            detected_at: Duration::from_millis(12_345),
            captured_at: SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000),
        }
    }

    #[test]
    fn test_payload_fields() {
        let payload = AlarmPayload::from_trigger(&trigger(), "warehouse-3");
        assert_eq!(payload.event, "alarm_triggered");
        assert_eq!(payload.trigger_id, 7);
        assert_eq!(payload.symbol, "#");
        assert_eq!(payload.detected_at, "2023-11-14T22:13:20.000Z");
        assert_eq!(payload.stream_offset_ms, 12_345);
        assert_eq!(payload.source, "warehouse-3");
    }

    #[test]
    fn test_payload_json_shape() {
        let json = serde_json::to_value(AlarmPayload::from_trigger(&trigger(), "site")).unwrap();
        assert_eq!(json["event"], "alarm_triggered");
        assert_eq!(json["trigger_id"], 7);
        assert_eq!(json["stream_offset_ms"], 12_345);
        assert_eq!(json.as_object().unwrap().len(), 6);
    }
}
