//! Station abstraction and the thread that drives one.

use crate::error::{DialwatchError, Result};
use crate::pipeline::error::{ErrorReporter, StationError};
use crossbeam_channel::{Receiver, Sender};
use std::marker::PhantomData;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A processing stage of the pipeline.
///
/// Each station runs in its own thread, receives inputs from one channel
/// and sends outputs to the next.
pub trait Station: Send + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;

    /// Processes a single input item.
    ///
    /// Returns:
    /// - `Ok(Some(output))` - forwarded downstream
    /// - `Ok(None)` - consumed without output
    /// - `Err(StationError)` - reported; `Fatal` stops the station
    fn process(
        &mut self,
        input: Self::Input,
    ) -> std::result::Result<Option<Self::Output>, StationError>;

    /// Returns the name of this station for logging and error reporting.
    fn name(&self) -> &'static str;

    /// Called once after the last input, on the station's thread.
    fn shutdown(&mut self) {}
}

/// Runs a station in a dedicated thread.
pub struct StationRunner<S: Station> {
    handle: Option<JoinHandle<()>>,
    station_name: &'static str,
    _phantom: PhantomData<S>,
}

impl<S: Station> StationRunner<S> {
    /// Spawns `station` on a thread named after it.
    ///
    /// The station runs until `input_rx` disconnects, the downstream
    /// receiver goes away, or it reports a fatal error.
    pub fn spawn(
        mut station: S,
        input_rx: Receiver<S::Input>,
        output_tx: Sender<S::Output>,
        error_reporter: Arc<dyn ErrorReporter>,
    ) -> Result<Self> {
        let station_name = station.name();

        let handle = thread::Builder::new()
            .name(format!("dialwatch-{station_name}"))
            .spawn(move || {
                Self::run_station(&mut station, input_rx, output_tx, error_reporter);
            })
            .map_err(|e| {
                DialwatchError::Other(format!("Failed to spawn {station_name} station: {e}"))
            })?;

        Ok(Self {
            handle: Some(handle),
            station_name,
            _phantom: PhantomData,
        })
    }

    fn run_station(
        station: &mut S,
        input_rx: Receiver<S::Input>,
        output_tx: Sender<S::Output>,
        error_reporter: Arc<dyn ErrorReporter>,
    ) {
        let station_name = station.name();
        tracing::debug!(station = station_name, "station started");

        while let Ok(input) = input_rx.recv() {
            match station.process(input) {
                Ok(Some(output)) => {
                    if output_tx.send(output).is_err() {
                        tracing::debug!(station = station_name, "downstream closed");
                        break;
                    }
                }
                Ok(None) => {}
                Err(error @ StationError::Recoverable(_)) => {
                    error_reporter.report(station_name, &error);
                }
                Err(error @ StationError::Fatal(_)) => {
                    error_reporter.report(station_name, &error);
                    break;
                }
            }
        }

        station.shutdown();
        tracing::debug!(station = station_name, "station stopped");
    }

    /// Waits for the station thread to complete.
    pub fn join(mut self) -> std::result::Result<(), String> {
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| format!("Station '{}' thread panicked", self.station_name))
        } else {
            Ok(())
        }
    }

    /// Returns the name of the station.
    pub fn name(&self) -> &'static str {
        self.station_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    // Upper-cases keypad letters, drops everything that is not a keypad symbol.
    struct KeypadStation {
        shutdown_called: Arc<AtomicBool>,
    }

    impl Station for KeypadStation {
        type Input = char;
        type Output = char;

        fn process(&mut self, input: char) -> std::result::Result<Option<char>, StationError> {
            let symbol = input.to_ascii_uppercase();
            if crate::dtmf::STANDARD.contains(symbol) {
                Ok(Some(symbol))
            } else {
                Ok(None)
            }
        }

        fn name(&self) -> &'static str {
            "keypad"
        }

        fn shutdown(&mut self) {
            self.shutdown_called.store(true, Ordering::SeqCst);
        }
    }

    // Rejects '#' recoverably and stops on '*'.
    struct StrictStation;

    impl Station for StrictStation {
        type Input = char;
        type Output = char;

        fn process(&mut self, input: char) -> std::result::Result<Option<char>, StationError> {
            match input {
                '#' => Err(StationError::Recoverable("hash rejected".to_string())),
                '*' => Err(StationError::Fatal("star stops the line".to_string())),
                other => Ok(Some(other)),
            }
        }

        fn name(&self) -> &'static str {
            "strict"
        }
    }

    #[derive(Default)]
    struct MockReporter {
        errors: Arc<Mutex<Vec<(String, StationError)>>>,
    }

    impl ErrorReporter for MockReporter {
        fn report(&self, station: &str, error: &StationError) {
            self.errors
                .lock()
                .unwrap()
                .push((station.to_string(), error.clone()));
        }
    }

    fn keypad() -> (KeypadStation, Arc<AtomicBool>) {
        let flag = Arc::new(AtomicBool::new(false));
        (
            KeypadStation {
                shutdown_called: flag.clone(),
            },
            flag,
        )
    }

    #[test]
    fn test_forwards_and_filters() {
        let (input_tx, input_rx) = bounded(10);
        let (output_tx, output_rx) = bounded(10);
        let (station, shutdown_flag) = keypad();

        let runner =
            StationRunner::spawn(station, input_rx, output_tx, Arc::new(LogReporterStub)).unwrap();
        assert_eq!(runner.name(), "keypad");

        for c in ['1', 'x', 'a', '#', 'e'] {
            input_tx.send(c).unwrap();
        }
        drop(input_tx);

        let outputs: Vec<char> = output_rx.iter().collect();
        assert_eq!(outputs, vec!['1', 'A', '#']);

        runner.join().unwrap();
        assert!(shutdown_flag.load(Ordering::SeqCst));
    }

    #[test]
    fn test_recoverable_error_skips_input() {
        let (input_tx, input_rx) = bounded(10);
        let (output_tx, output_rx) = bounded(10);
        let reporter = Arc::new(MockReporter::default());
        let errors = reporter.errors.clone();

        let runner = StationRunner::spawn(StrictStation, input_rx, output_tx, reporter).unwrap();
        for c in ['1', '#', '2', '#', '3'] {
            input_tx.send(c).unwrap();
        }
        drop(input_tx);

        let outputs: Vec<char> = output_rx.iter().collect();
        assert_eq!(outputs, vec!['1', '2', '3']);
        runner.join().unwrap();

        let reported = errors.lock().unwrap();
        assert_eq!(reported.len(), 2);
        assert_eq!(reported[0].0, "strict");
    }

    #[test]
    fn test_fatal_error_stops_station() {
        let (input_tx, input_rx) = bounded(10);
        let (output_tx, output_rx) = bounded(10);
        let reporter = Arc::new(MockReporter::default());
        let errors = reporter.errors.clone();

        for c in ['1', '*', '2'] {
            input_tx.send(c).unwrap();
        }
        let runner = StationRunner::spawn(StrictStation, input_rx, output_tx, reporter).unwrap();

        runner.join().unwrap();
        let outputs: Vec<char> = output_rx.try_iter().collect();
        assert_eq!(outputs, vec!['1']);
        assert!(matches!(
            errors.lock().unwrap()[0].1,
            StationError::Fatal(_)
        ));
    }

    #[test]
    fn test_closed_input_shuts_down() {
        let (input_tx, input_rx) = bounded::<char>(1);
        let (output_tx, _output_rx) = bounded(1);
        let (station, shutdown_flag) = keypad();

        let runner =
            StationRunner::spawn(station, input_rx, output_tx, Arc::new(LogReporterStub)).unwrap();
        drop(input_tx);

        runner.join().unwrap();
        assert!(shutdown_flag.load(Ordering::SeqCst));
    }

    #[test]
    fn test_closed_output_shuts_down() {
        let (input_tx, input_rx) = bounded(10);
        let (output_tx, output_rx) = bounded(10);
        let (station, shutdown_flag) = keypad();

        let runner =
            StationRunner::spawn(station, input_rx, output_tx, Arc::new(LogReporterStub)).unwrap();
        drop(output_rx);
        input_tx.send('5').unwrap();

        runner.join().unwrap();
        assert!(shutdown_flag.load(Ordering::SeqCst));
    }

    struct LogReporterStub;

    impl ErrorReporter for LogReporterStub {
        fn report(&self, _station: &str, _error: &StationError) {}
    }
}
