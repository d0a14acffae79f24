//! Zenoh publishing of queued observations.

use cncsight_common::{Format, KeyExprBuilder, ObservationRecord, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use zenoh::Session;

/// Drains the observation queue and puts every record on Zenoh.
pub struct ZenohPublisher {
    session: Arc<Session>,
    keys: KeyExprBuilder,
    format: Format,
}

impl ZenohPublisher {
    pub fn new(session: Arc<Session>, keys: KeyExprBuilder, format: Format) -> Self {
        Self {
            session,
            keys,
            format,
        }
    }

    /// Publish until every sender of `rx` has been dropped.
    pub async fn run(self, mut rx: mpsc::Receiver<ObservationRecord>) {
        info!(prefix = %self.keys.prefix(), format = ?self.format, "Observation publisher started");

        let mut published: u64 = 0;
        while let Some(record) = rx.recv().await {
            if self.publish(&record).await {
                published += 1;
            }
        }

        info!(published, "Observation publisher stopped");
    }

    async fn publish(&self, record: &ObservationRecord) -> bool {
        let key = self.keys.build(&record.device, &record.observation.key);

        match encode(record, self.format) {
            Ok(payload) => match self
                .session
                .put(&key, payload)
                .encoding(self.format.encoding())
                .await
            {
                Ok(()) => {
                    debug!(key = %key, kind = ?record.observation.kind(), value = ?record.observation.value, "Published");
                    true
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to publish to Zenoh");
                    false
                }
            },
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to encode observation");
                false
            }
        }
    }

    /// Publish a bridge status message.
    pub async fn publish_status(&self, status: &BridgeStatus) {
        let key = self.keys.status_key();
        match serde_json::to_vec(status) {
            Ok(payload) => {
                let put = self
                    .session
                    .put(&key, payload)
                    .encoding(Format::Json.encoding());
                if let Err(e) = put.await {
                    warn!(key = %key, error = %e, "Failed to publish bridge status");
                }
            }
            Err(e) => warn!(error = %e, "Failed to encode bridge status"),
        }
    }
}

/// Bridge status announced on `<prefix>/@/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeStatus {
    pub bridge: String,
    pub version: String,
    /// "running" or "offline".
    pub status: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<String>,
}

impl BridgeStatus {
    pub fn running(devices: Vec<String>) -> Self {
        Self {
            bridge: "haas".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            status: "running".to_string(),
            devices,
        }
    }

    pub fn offline() -> Self {
        Self {
            bridge: "haas".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            status: "offline".to_string(),
            devices: Vec::new(),
        }
    }
}
