use crate::delivery::DeliveryManager;
use crate::pipeline::error::StationError;
use crate::pipeline::station::Station;
use crate::pipeline::types::TriggerEvent;
use std::sync::{Arc, Mutex};

/// Where alarm triggers end up.
/// Pairs with AudioSource for input - this handles detection output.
pub trait TriggerSink: Send + 'static {
    /// Handle one trigger. Must return quickly; it runs on the pipeline thread.
    fn handle(&mut self, trigger: &TriggerEvent) -> crate::error::Result<()>;

    /// Called on pipeline shutdown.
    fn finish(&mut self) {}

    /// Name for logging/debugging.
    fn name(&self) -> &'static str {
        "sink"
    }
}

/// Station wrapper for any TriggerSink implementation.
///
/// Every trigger the sink accepted is reported on `result_tx` at shutdown.
pub(crate) struct SinkStation {
    sink: Box<dyn TriggerSink>,
    handled: Vec<TriggerEvent>,
    result_tx: crossbeam_channel::Sender<Vec<TriggerEvent>>,
}

impl SinkStation {
    pub(crate) fn new(
        sink: Box<dyn TriggerSink>,
        result_tx: crossbeam_channel::Sender<Vec<TriggerEvent>>,
    ) -> Self {
        Self {
            sink,
            handled: Vec::new(),
            result_tx,
        }
    }
}

impl Station for SinkStation {
    type Input = TriggerEvent;
    type Output = ();

    fn name(&self) -> &'static str {
        self.sink.name()
    }

    fn process(&mut self, trigger: TriggerEvent) -> Result<Option<()>, StationError> {
        self.sink
            .handle(&trigger)
            .map_err(|e| StationError::Recoverable(format!("trigger {}: {e}", trigger.id)))?;
        self.handled.push(trigger);
        Ok(None)
    }

    fn shutdown(&mut self) {
        self.sink.finish();
        if self
            .result_tx
            .send(std::mem::take(&mut self.handled))
            .is_err()
        {
            tracing::debug!(sink = self.sink.name(), "nobody waiting for sink results");
        }
    }
}

/// Hands every trigger to the delivery manager.
pub struct DeliverySink {
    manager: Arc<DeliveryManager>,
}

impl DeliverySink {
    pub fn new(manager: Arc<DeliveryManager>) -> Self {
        Self { manager }
    }
}

impl TriggerSink for DeliverySink {
    fn handle(&mut self, trigger: &TriggerEvent) -> crate::error::Result<()> {
        self.manager.enqueue(*trigger);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "delivery"
    }
}

/// Collects triggers in memory; the shared list can be inspected while running.
#[derive(Default, Clone)]
pub struct CollectorSink {
    collected: Arc<Mutex<Vec<TriggerEvent>>>,
}

impl CollectorSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the triggers seen so far.
    pub fn triggers(&self) -> Vec<TriggerEvent> {
        self.collected
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl TriggerSink for CollectorSink {
    fn handle(&mut self, trigger: &TriggerEvent) -> crate::error::Result<()> {
        self.collected
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(*trigger);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "collector"
    }
}
