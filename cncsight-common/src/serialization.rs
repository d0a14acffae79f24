//! Payload encoding for published observations.

use serde::{Serialize, de::DeserializeOwned};
use zenoh::bytes::Encoding;

use crate::error::{Error, Result};

/// Wire format for published observations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Readable with any Zenoh tool.
    #[default]
    Json,
    Cbor,
}

impl Format {
    /// Zenoh encoding announced alongside the payload.
    pub fn encoding(&self) -> Encoding {
        match self {
            Format::Json => Encoding::APPLICATION_JSON,
            Format::Cbor => Encoding::APPLICATION_CBOR,
        }
    }
}

/// Encode a value in the given format.
pub fn encode<T: Serialize>(value: &T, format: Format) -> Result<Vec<u8>> {
    let encoded = match format {
        Format::Json => serde_json::to_vec(value).map_err(|e| e.to_string()),
        Format::Cbor => {
            let mut buf = Vec::new();
            ciborium::into_writer(value, &mut buf)
                .map(|()| buf)
                .map_err(|e| e.to_string())
        }
    };
    encoded.map_err(|reason| Error::Encode { format, reason })
}

/// Decode a payload written by [`encode`].
pub fn decode<T: DeserializeOwned>(data: &[u8], format: Format) -> Result<T> {
    let decoded = match format {
        Format::Json => serde_json::from_slice(data).map_err(|e| e.to_string()),
        Format::Cbor => ciborium::from_reader(data).map_err(|e| e.to_string()),
    };
    decoded.map_err(|reason| Error::Decode { format, reason })
}
