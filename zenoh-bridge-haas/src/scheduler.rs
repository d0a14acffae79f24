//! Fixed-interval cycle runner for one device.

use crate::processor::HaasProcessor;
use crate::sink::ObservationSink;
use crate::transport::Transport;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Default time between cycle starts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Shortest accepted interval; smaller values are raised to it.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Runs a processor's cycle on a fixed interval.
///
/// Cycles never overlap: a cycle that overruns the interval delays the
/// next tick instead of queueing extra ones.
pub struct Scheduler<T, S> {
    processor: HaasProcessor<T, S>,
    interval: Duration,
}

impl<T, S> Scheduler<T, S>
where
    T: Transport + 'static,
    S: ObservationSink + 'static,
{
    /// Create a scheduler. An interval below [`MIN_POLL_INTERVAL`] is
    /// raised to it.
    pub fn new(processor: HaasProcessor<T, S>, interval: Duration) -> Self {
        if interval < MIN_POLL_INTERVAL {
            warn!(
                device = %processor.device_key(),
                interval_ms = interval.as_millis() as u64,
                "Poll interval too short, using {:?}",
                MIN_POLL_INTERVAL
            );
        }

        Self {
            processor,
            interval: interval.max(MIN_POLL_INTERVAL),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Spawn the polling task.
    ///
    /// Dropping the returned handle without calling
    /// [`SchedulerHandle::stop`] also stops the task, without waiting for it.
    pub fn start(self) -> SchedulerHandle {
        let device_key = self.processor.device_key().to_string();
        let (stop_tx, stop_rx) = watch::channel(false);

        info!(
            device = %device_key,
            endpoint = %self.processor.transport().endpoint(),
            interval_ms = self.interval.as_millis() as u64,
            "Starting Haas poller"
        );

        let task = tokio::spawn(poll_loop(self.processor, self.interval, stop_rx));

        SchedulerHandle {
            device_key,
            stop_tx,
            task,
        }
    }
}

/// Handle to a running scheduler.
#[derive(Debug)]
pub struct SchedulerHandle {
    device_key: String,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<u64>,
}

impl SchedulerHandle {
    pub fn device_key(&self) -> &str {
        &self.device_key
    }

    /// Stop polling and wait for the task to finish.
    ///
    /// An in-flight cycle is abandoned at its current await point and the
    /// transport is closed. Returns the number of completed cycles.
    pub async fn stop(self) -> u64 {
        // The task may already be gone; joining below reports that.
        let _ = self.stop_tx.send(true);

        match self.task.await {
            Ok(cycles) => {
                info!(device = %self.device_key, cycles, "Haas poller stopped");
                cycles
            }
            Err(e) => {
                error!(device = %self.device_key, error = %e, "Haas poller task failed");
                0
            }
        }
    }
}

async fn poll_loop<T, S>(
    mut processor: HaasProcessor<T, S>,
    interval: Duration,
    mut stop: watch::Receiver<bool>,
) -> u64
where
    T: Transport,
    S: ObservationSink,
{
    let mut cycles = 0u64;

    let stopped = tokio::select! {
        biased;
        _ = stop.changed() => true,
        _ = processor.open() => false,
    };

    if !stopped {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = stop.changed() => break,
                _ = ticker.tick() => {}
            }

            let completed = tokio::select! {
                biased;
                _ = stop.changed() => None,
                report = processor.run_cycle() => Some(report),
            };

            match completed {
                Some(_) => cycles += 1,
                None => {
                    debug!(device = %processor.device_key(), "Cycle cancelled by stop");
                    break;
                }
            }
        }
    }

    processor.close().await;
    cycles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::RecordingSink;
    use crate::transport::{ConnectionState, TransportError};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct Tracker {
        closed: AtomicBool,
        commands: AtomicUsize,
    }

    struct MockTransport {
        hang: bool,
        connected: bool,
        tracker: Arc<Tracker>,
    }

    impl MockTransport {
        fn new(hang: bool) -> (Self, Arc<Tracker>) {
            let tracker = Arc::new(Tracker::default());
            let transport = Self {
                hang,
                connected: false,
                tracker: tracker.clone(),
            };
            (transport, tracker)
        }
    }

    impl Transport for MockTransport {
        async fn connect(&mut self) -> Result<(), TransportError> {
            self.connected = true;
            Ok(())
        }

        async fn close(&mut self) {
            self.connected = false;
            self.tracker.closed.store(true, Ordering::SeqCst);
        }

        fn state(&self) -> ConnectionState {
            if self.connected {
                ConnectionState::Connected
            } else {
                ConnectionState::Disconnected
            }
        }

        fn endpoint(&self) -> String {
            "mock://haas".to_string()
        }

        async fn send_command(
            &mut self,
            command: &str,
            _timeout: Duration,
        ) -> Result<Option<String>, TransportError> {
            self.tracker.commands.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                std::future::pending::<()>().await;
            }
            match command {
                "?Q100" => Ok(Some(">SERIAL NUMBER, 1234".to_string())),
                _ => Ok(None),
            }
        }
    }

    #[tokio::test]
    async fn test_runs_cycles_until_stopped() {
        let (transport, tracker) = MockTransport::new(false);
        let sink = Arc::new(RecordingSink::new());
        let processor = HaasProcessor::new("vf2", transport, sink.clone());

        let handle = Scheduler::new(processor, Duration::from_millis(20)).start();
        assert_eq!(handle.device_key(), "vf2");

        tokio::time::sleep(Duration::from_millis(150)).await;
        let cycles = handle.stop().await;

        assert!(cycles >= 2, "only {} cycles ran", cycles);
        assert!(tracker.closed.load(Ordering::SeqCst));
        assert!(sink.for_key("avail").len() as u64 >= cycles);
    }

    #[tokio::test]
    async fn test_stop_cancels_hanging_cycle() {
        let (transport, tracker) = MockTransport::new(true);
        let sink = Arc::new(RecordingSink::new());
        let processor = HaasProcessor::new("vf2", transport, sink.clone());

        let handle = Scheduler::new(processor, Duration::from_millis(10)).start();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let cycles = tokio::time::timeout(Duration::from_secs(1), handle.stop())
            .await
            .expect("stop must not wait for the hanging command");

        assert_eq!(cycles, 0);
        assert_eq!(tracker.commands.load(Ordering::SeqCst), 1);
        assert!(tracker.closed.load(Ordering::SeqCst));
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_zero_interval_is_clamped() {
        let (transport, tracker) = MockTransport::new(false);
        let sink = Arc::new(RecordingSink::new());
        let processor = HaasProcessor::new("vf2", transport, sink.clone());

        let scheduler = Scheduler::new(processor, Duration::ZERO);
        assert_eq!(scheduler.interval(), MIN_POLL_INTERVAL);

        let handle = scheduler.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let cycles = handle.stop().await;

        assert!(cycles >= 1, "task did not run any cycle");
        assert!(tracker.closed.load(Ordering::SeqCst));
        assert!(!sink.for_key("avail").is_empty());
    }

    #[tokio::test]
    async fn test_dropped_handle_stops_task() {
        let (transport, tracker) = MockTransport::new(false);
        let processor = HaasProcessor::new("vf2", transport, RecordingSink::new());

        let handle = Scheduler::new(processor, Duration::from_millis(10)).start();
        drop(handle);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(tracker.closed.load(Ordering::SeqCst));
    }
}
