//! Line monitor that runs from startup until shutdown.
//!
//! ```text
//! AudioSource ─► capture thread ─► [windows] ─► detection ─► [triggers] ─► sink
//!                (AudioWindower)                 (station)                 (station)
//! ```
//!
//! Shutdown cascades downstream: the capture thread exits, its channel
//! closes, and each station finishes the queued work before stopping.

use crate::audio::{AudioSource, AudioWindower, WindowConfig};
use crate::config::Config;
use crate::defaults;
use crate::dtmf::{DebounceConfig, DetectorConfig};
use crate::error::{DialwatchError, Result};
use crate::pipeline::detection_station::DetectionStation;
use crate::pipeline::error::{ErrorReporter, LogReporter};
use crate::pipeline::sink::{SinkStation, TriggerSink};
use crate::pipeline::station::StationRunner;
use crate::pipeline::types::{AudioWindow, TriggerEvent};
use crate::trigger::TriggerConfig;
use crossbeam_channel::{Sender, TrySendError, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

/// Read failures in a row after which the source counts as lost.
const MAX_CONSECUTIVE_ERRORS: u32 = 10;

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub window: WindowConfig,
    pub detector: DetectorConfig,
    pub debounce: DebounceConfig,
    pub trigger: TriggerConfig,
    /// Windows buffered between capture and detection.
    pub window_buffer: usize,
    /// Triggers buffered between detection and the sink.
    pub trigger_buffer: usize,
    /// Sleep after an empty read from a live source.
    pub poll_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            detector: DetectorConfig::default(),
            debounce: DebounceConfig::default(),
            trigger: TriggerConfig::default(),
            window_buffer: defaults::WINDOW_CHANNEL_CAPACITY,
            trigger_buffer: 16,
            poll_interval: Duration::from_millis(10),
        }
    }
}

impl MonitorConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            window: config.window_config(),
            detector: config.detector_config(),
            debounce: config.debounce_config(),
            trigger: config.trigger_config(),
            ..Self::default()
        }
    }
}

/// What a finished monitor run produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorReport {
    /// Windows handed to detection.
    pub windows: u64,
    /// Windows dropped because detection fell behind.
    pub dropped_windows: u64,
    /// Every trigger the sink accepted, in order.
    pub triggers: Vec<TriggerEvent>,
}

#[derive(Debug, Clone, Copy, Default)]
struct CaptureStats {
    windows: u64,
    dropped_windows: u64,
}

/// Stops a running monitor from another thread or task.
#[derive(Debug, Clone)]
pub struct MonitorStopper {
    running: Arc<AtomicBool>,
}

impl MonitorStopper {
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Handle to a running monitor.
pub struct MonitorHandle {
    running: Arc<AtomicBool>,
    capture: JoinHandle<Result<CaptureStats>>,
    detection: StationRunner<DetectionStation>,
    sink: StationRunner<SinkStation>,
    result_rx: crossbeam_channel::Receiver<Vec<TriggerEvent>>,
}

impl MonitorHandle {
    /// False once capture has ended, by request, end of input or failure.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stopper(&self) -> MonitorStopper {
        MonitorStopper {
            running: Arc::clone(&self.running),
        }
    }

    /// Stops capture and waits for the queued windows to drain.
    pub fn stop(self) -> Result<MonitorReport> {
        self.running.store(false, Ordering::SeqCst);
        self.wait()
    }

    /// Waits for the monitor to finish on its own (finite source, source
    /// loss, or a stop from a [`MonitorStopper`]).
    ///
    /// Returns the source error if capture failed fatally.
    pub fn wait(self) -> Result<MonitorReport> {
        let capture = self
            .capture
            .join()
            .map_err(|_| DialwatchError::Other("capture thread panicked".to_string()))?;

        self.detection.join().map_err(DialwatchError::Other)?;
        self.sink.join().map_err(DialwatchError::Other)?;
        let triggers = self.result_rx.recv().unwrap_or_default();

        let stats = capture?;
        Ok(MonitorReport {
            windows: stats.windows,
            dropped_windows: stats.dropped_windows,
            triggers,
        })
    }
}

/// Audio line monitor: AudioSource → windows → detection → TriggerSink.
pub struct Monitor {
    config: MonitorConfig,
    error_reporter: Arc<dyn ErrorReporter>,
}

impl Monitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            error_reporter: Arc::new(LogReporter),
        }
    }

    /// Sets a custom error reporter.
    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.error_reporter = reporter;
        self
    }

    /// Starts the source and the pipeline threads.
    ///
    /// Fails immediately if the source cannot be started.
    pub fn start(
        self,
        mut source: Box<dyn AudioSource>,
        sink: Box<dyn TriggerSink>,
    ) -> Result<MonitorHandle> {
        if source.sample_rate() != self.config.window.sample_rate {
            return Err(DialwatchError::ConfigInvalidValue {
                key: "audio.sample_rate".to_string(),
                message: format!(
                    "source delivers {} Hz, detector expects {} Hz",
                    source.sample_rate(),
                    self.config.window.sample_rate
                ),
            });
        }

        let (window_tx, window_rx) = bounded(self.config.window_buffer);
        let (trigger_tx, trigger_rx) = bounded(self.config.trigger_buffer);
        let (sink_out_tx, _) = bounded::<()>(1);
        let (result_tx, result_rx) = bounded(1);

        let detection_station = DetectionStation::new(
            self.config.detector,
            self.config.debounce,
            self.config.trigger,
            self.config.window.hop_duration(),
        );
        let detection = StationRunner::spawn(
            detection_station,
            window_rx,
            trigger_tx,
            self.error_reporter.clone(),
        )?;
        let sink = StationRunner::spawn(
            SinkStation::new(sink, result_tx),
            trigger_rx,
            sink_out_tx,
            self.error_reporter.clone(),
        )?;

        source.start()?;
        tracing::info!(
            sample_rate = source.sample_rate(),
            finite = source.is_finite(),
            "audio capture started"
        );

        let running = Arc::new(AtomicBool::new(true));
        let capture_running = running.clone();
        let window_config = self.config.window;
        let poll_interval = self.config.poll_interval;
        let capture = thread::Builder::new()
            .name("dialwatch-capture".to_string())
            .spawn(move || {
                let result = capture_loop(
                    source.as_mut(),
                    window_config,
                    &window_tx,
                    &capture_running,
                    poll_interval,
                );
                if let Err(e) = source.stop() {
                    tracing::warn!(error = %e, "failed to stop audio capture");
                }
                capture_running.store(false, Ordering::SeqCst);
                result
            })
            .map_err(|e| DialwatchError::Other(format!("Failed to spawn capture thread: {e}")))?;

        Ok(MonitorHandle {
            running,
            capture,
            detection,
            sink,
            result_rx,
        })
    }
}

fn capture_loop(
    source: &mut dyn AudioSource,
    window_config: WindowConfig,
    window_tx: &Sender<AudioWindow>,
    running: &AtomicBool,
    poll_interval: Duration,
) -> Result<CaptureStats> {
    let finite = source.is_finite();
    let mut windower = AudioWindower::new(window_config, SystemTime::now());
    let mut stats = CaptureStats::default();
    let mut consecutive_errors: u32 = 0;

    while running.load(Ordering::SeqCst) {
        let samples = match source.read_samples() {
            Ok(samples) => {
                consecutive_errors = 0;
                samples
            }
            Err(e @ DialwatchError::AudioSourceLost { .. }) => {
                tracing::error!(error = %e, "audio source lost");
                return Err(e);
            }
            Err(e) => {
                consecutive_errors += 1;
                tracing::warn!(error = %e, consecutive_errors, "audio read failed");
                if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    return Err(DialwatchError::AudioSourceLost {
                        message: format!("{consecutive_errors} consecutive read failures: {e}"),
                    });
                }
                thread::sleep(poll_interval);
                continue;
            }
        };

        if samples.is_empty() {
            if finite {
                tracing::debug!(samples = windower.samples_seen(), "end of audio input");
                break;
            }
            thread::sleep(poll_interval);
            continue;
        }

        for window in windower.push(&samples) {
            if finite {
                // Files are read faster than real time; wait for detection instead of dropping.
                if window_tx.send(window).is_err() {
                    return Ok(stats);
                }
                stats.windows += 1;
                continue;
            }
            match window_tx.try_send(window) {
                Ok(()) => stats.windows += 1,
                Err(TrySendError::Full(window)) => {
                    stats.dropped_windows += 1;
                    tracing::warn!(sequence = window.sequence, "detection behind, window dropped");
                }
                Err(TrySendError::Disconnected(_)) => return Ok(stats),
            }
        }
    }

    Ok(stats)
}
