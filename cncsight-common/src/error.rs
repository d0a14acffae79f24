use crate::serialization::Format;
use thiserror::Error;

/// Error type for the shared CNCSight layer.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Zenoh error: {0}")]
    Zenoh(#[from] zenoh::Error),

    #[error("Failed to encode {format:?} payload: {reason}")]
    Encode { format: Format, reason: String },

    #[error("Failed to decode {format:?} payload: {reason}")]
    Decode { format: Format, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
