//! Observation sinks.
//!
//! The processor hands every observation to an [`ObservationSink`] the
//! moment it is derived. Sinks must not block the polling cycle.

use cncsight_common::{Adapter, Observation, ObservationRecord};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Receiver of observations produced by a poller.
///
/// Shared by every poller in the process, so implementations must accept
/// concurrent calls.
pub trait ObservationSink: Send + Sync {
    /// Hand over one observation. Fire-and-forget.
    fn emit(&self, device_key: &str, observation: Observation);
}

impl<S: ObservationSink + ?Sized> ObservationSink for Arc<S> {
    fn emit(&self, device_key: &str, observation: Observation) {
        (**self).emit(device_key, observation)
    }
}

/// Sink that stamps observations and queues them on a bounded channel.
///
/// When the queue is full the observation is dropped with a warning; the
/// next cycle re-emits every condition and event anyway.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<ObservationRecord>,
    adapter: Adapter,
}

impl ChannelSink {
    /// Create a sink and the receiving end of its queue.
    pub fn new(capacity: usize, adapter: Adapter) -> (Self, mpsc::Receiver<ObservationRecord>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx, adapter }, rx)
    }
}

impl ObservationSink for ChannelSink {
    fn emit(&self, device_key: &str, observation: Observation) {
        let record = ObservationRecord::new(
            chrono::Utc::now().timestamp_millis(),
            device_key,
            self.adapter,
            observation,
        );

        match self.tx.try_send(record) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(record)) => {
                warn!(
                    device = %record.device,
                    key = %record.observation.key,
                    "Observation queue full, dropping observation"
                );
            }
            Err(mpsc::error::TrySendError::Closed(record)) => {
                debug!(
                    device = %record.device,
                    key = %record.observation.key,
                    "Observation queue closed"
                );
            }
        }
    }
}

/// Sink that keeps everything it receives in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    records: Mutex<Vec<(String, Observation)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All observations received so far, in emission order.
    pub fn observations(&self) -> Vec<Observation> {
        self.lock().iter().map(|(_, obs)| obs.clone()).collect()
    }

    /// All (device key, observation) pairs received so far.
    pub fn records(&self) -> Vec<(String, Observation)> {
        self.lock().clone()
    }

    /// Observations for one data item key, in emission order.
    pub fn for_key(&self, key: &str) -> Vec<Observation> {
        self.lock()
            .iter()
            .filter(|(_, obs)| obs.key == key)
            .map(|(_, obs)| obs.clone())
            .collect()
    }

    /// Remove and return everything received so far.
    pub fn take(&self) -> Vec<Observation> {
        std::mem::take(&mut *self.lock())
            .into_iter()
            .map(|(_, obs)| obs)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(String, Observation)>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ObservationSink for RecordingSink {
    fn emit(&self, device_key: &str, observation: Observation) {
        self.lock().push((device_key.to_string(), observation));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cncsight_common::{Execution, ObservationValue};

    #[tokio::test]
    async fn test_channel_sink_stamps_records() {
        let (sink, mut rx) = ChannelSink::new(8, Adapter::Haas);

        sink.emit("vf2", Observation::event("execution", Execution::Ready));

        let record = rx.recv().await.unwrap();
        assert_eq!(record.device, "vf2");
        assert_eq!(record.adapter, Adapter::Haas);
        assert_eq!(record.observation.key, "execution");
        assert!(record.timestamp > 0);
    }

    #[tokio::test]
    async fn test_channel_sink_drops_when_full() {
        let (sink, mut rx) = ChannelSink::new(1, Adapter::Haas);

        sink.emit("vf2", Observation::event("program", "O1"));
        sink.emit("vf2", Observation::event("program", "O2"));

        let first = rx.recv().await.unwrap();
        assert_eq!(first.observation.value, ObservationValue::Event("O1".into()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_sink_closed_receiver() {
        let (sink, rx) = ChannelSink::new(1, Adapter::Haas);
        drop(rx);
        // Must not panic or block.
        sink.emit("vf2", Observation::normal("system"));
    }

    #[test]
    fn test_recording_sink() {
        let sink = Arc::new(RecordingSink::new());
        let shared: Arc<dyn ObservationSink> = sink.clone();

        shared.emit("vf2", Observation::normal("system"));
        shared.emit("vf2", Observation::event("avail", "AVAILABLE"));

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.for_key("avail").len(), 1);
        assert_eq!(sink.records()[0].0, "vf2");

        let taken = sink.take();
        assert_eq!(taken.len(), 2);
        assert!(sink.is_empty());
    }
}
