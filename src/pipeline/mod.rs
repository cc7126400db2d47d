//! Line monitoring pipeline.
//!
//! Capture, detection and sink each run in their own thread, connected by
//! bounded crossbeam channels.

pub mod detection_station;
pub mod error;
pub mod monitor;
pub mod sink;
pub mod station;
pub mod types;

pub use detection_station::DetectionStation;
pub use error::{ErrorReporter, LogReporter, StationError};
pub use monitor::{Monitor, MonitorConfig, MonitorHandle, MonitorReport, MonitorStopper};
pub use sink::{CollectorSink, DeliverySink, TriggerSink};
pub use station::{Station, StationRunner};
pub use types::{AudioWindow, DigitEvent, ToneCandidate, TriggerEvent, WindowOutcome};
