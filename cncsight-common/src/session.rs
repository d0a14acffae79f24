use zenoh::Session;

use crate::config::ZenohConfig;
use crate::error::{Error, Result};

/// Translate bridge settings into a Zenoh configuration.
pub fn zenoh_config(config: &ZenohConfig) -> Result<zenoh::Config> {
    let mut zenoh_config = zenoh::Config::default();

    set_json5(
        &mut zenoh_config,
        "mode",
        format!("\"{}\"", config.mode.as_str()),
    )?;

    for (key, endpoints) in [
        ("connect/endpoints", &config.connect),
        ("listen/endpoints", &config.listen),
    ] {
        if endpoints.is_empty() {
            continue;
        }
        let list = serde_json::to_string(endpoints)
            .map_err(|e| Error::Config(format!("{}: {}", key, e)))?;
        set_json5(&mut zenoh_config, key, list)?;
    }

    Ok(zenoh_config)
}

fn set_json5(config: &mut zenoh::Config, key: &str, value: String) -> Result<()> {
    config
        .insert_json5(key, &value)
        .map_err(|e| Error::Config(format!("Failed to set {} to {}: {}", key, value, e)))
}

/// Open a Zenoh session.
pub async fn connect(config: &ZenohConfig) -> Result<Session> {
    let zenoh_config = zenoh_config(config)?;

    tracing::info!(
        mode = config.mode.as_str(),
        connect = ?config.connect,
        listen = ?config.listen,
        "Opening Zenoh session"
    );

    let session = zenoh::open(zenoh_config).await?;

    tracing::info!(zid = %session.zid(), "Zenoh session open");

    Ok(session)
}
