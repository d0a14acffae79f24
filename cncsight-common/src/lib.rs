//! CNCSight Common Library
//!
//! Shared types and utilities for CNCSight machine-monitoring bridges:
//!
//! - [`observation`] - Observation data model (`Observation`, `ObservationValue`, MTConnect vocabularies)
//! - [`serialization`] - JSON/CBOR payload encoding
//! - [`config`] - Zenoh and logging configuration sections
//! - [`session`] - Zenoh session management
//! - [`keyexpr`] - Key expression builders and parsers
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod keyexpr;
pub mod observation;
pub mod serialization;
pub mod session;

pub use config::{LogFormat, LoggingConfig, ZenohConfig, ZenohMode};
pub use error::{Error, Result};
pub use keyexpr::{KEY_PREFIX, KeyExprBuilder};
pub use observation::{
    Adapter, Availability, ConditionLevel, ConditionState, ControllerMode, EmergencyStop,
    Execution, Observation, ObservationKind, ObservationRecord, ObservationValue, SampleValue,
};
pub use serialization::{Format, decode, encode};
pub use session::connect;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `config.level` when set.
///
/// ```ignore
/// use cncsight_common::{LoggingConfig, LogFormat, init_tracing};
///
/// let config = LoggingConfig {
///     level: "zenoh_bridge_haas=debug,zenoh=warn".to_string(),
///     format: LogFormat::Json,
/// };
/// init_tracing(&config)?;
/// ```
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            Error::Config(format!("Invalid log level '{}': {}", config.level, e))
        })?,
    };

    let output = match config.format {
        LogFormat::Text => fmt::layer().boxed(),
        LogFormat::Json => fmt::layer().json().flatten_event(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(output)
        .with(filter)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))
}
