//! Configuration for the Haas bridge.

use cncsight_common::config::{LoggingConfig, ZenohConfig};
use cncsight_common::serialization::Format;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HaasBridgeConfig {
    /// Zenoh connection settings
    #[serde(default)]
    pub zenoh: ZenohConfig,

    /// Payload format for published observations
    #[serde(default)]
    pub serialization: Format,

    /// Haas-specific settings
    pub haas: HaasConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Haas adapter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HaasConfig {
    /// Key expression prefix (default: "cncsight/haas")
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Machines to poll, one poller each
    pub devices: Vec<DeviceConfig>,

    /// Capacity of the queue between pollers and the Zenoh publisher
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_key_prefix() -> String {
    "cncsight/haas".to_string()
}

fn default_queue_capacity() -> usize {
    1024
}

/// Configuration for a single machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device key used to route observations (part of every key expression)
    #[serde(alias = "deviceKey")]
    pub device_key: String,

    /// How to reach the controller
    pub connection: ConnectionConfig,

    /// Interval between poll cycles in milliseconds
    #[serde(default = "default_poll_interval_ms", alias = "pollIntervalMs")]
    pub poll_interval_ms: u64,

    /// Upper bound on waiting for a single response, in milliseconds
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,

    /// Data item key names
    #[serde(default)]
    pub keys: DataItemKeys,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_response_timeout_ms() -> u64 {
    10_000
}

impl DeviceConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

/// Connection configuration (Ethernet or RS-232).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConnectionConfig {
    /// Ethernet Q-command port
    Tcp {
        /// Controller address (IP or hostname)
        server: String,
        /// TCP port (default: 5051)
        #[serde(default = "default_tcp_port")]
        port: u16,
        /// Wait between sending a command and reading the reply (default: 500)
        #[serde(default = "default_tcp_settle_ms")]
        settle_delay_ms: u64,
        /// Connect timeout in milliseconds (default: 5000)
        #[serde(default = "default_connect_timeout_ms")]
        connect_timeout_ms: u64,
    },
    /// RS-232 port, fixed at 19200 baud 7N1
    Serial {
        /// Serial port path (e.g., "/dev/ttyUSB0" or "COM1")
        #[serde(alias = "comPort")]
        com_port: String,
        /// Wait between sending a command and reading the reply (default: 1000)
        #[serde(default = "default_serial_settle_ms")]
        settle_delay_ms: u64,
    },
}

fn default_tcp_port() -> u16 {
    5051
}

fn default_tcp_settle_ms() -> u64 {
    500
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_serial_settle_ms() -> u64 {
    1000
}

impl ConnectionConfig {
    /// Short human-readable description of the endpoint.
    pub fn describe(&self) -> String {
        match self {
            ConnectionConfig::Tcp { server, port, .. } => format!("tcp://{}:{}", server, port),
            ConnectionConfig::Serial { com_port, .. } => format!("serial://{}", com_port),
        }
    }
}

/// Key names for every data item the adapter produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataItemKeys {
    pub avail: String,
    pub mode: String,
    pub zero_ret: String,
    pub execution: String,
    pub program: String,
    pub part_count: String,
    pub estop: String,
    /// Condition raised by the alarm indicator. Kept as "system" by default
    /// because downstream device models reference it by that name.
    pub system: String,
    pub x_act: String,
    pub y_act: String,
    pub z_act: String,
    pub speed: String,
}

impl Default for DataItemKeys {
    fn default() -> Self {
        Self {
            avail: "avail".to_string(),
            mode: "mode".to_string(),
            zero_ret: "zero_ret".to_string(),
            execution: "execution".to_string(),
            program: "program".to_string(),
            part_count: "partCount".to_string(),
            estop: "estop".to_string(),
            system: "system".to_string(),
            x_act: "x_act".to_string(),
            y_act: "y_act".to_string(),
            z_act: "z_act".to_string(),
            speed: "speed".to_string(),
        }
    }
}

impl DataItemKeys {
    fn all(&self) -> [(&'static str, &str); 12] {
        [
            ("avail", self.avail.as_str()),
            ("mode", self.mode.as_str()),
            ("zero_ret", self.zero_ret.as_str()),
            ("execution", self.execution.as_str()),
            ("program", self.program.as_str()),
            ("part_count", self.part_count.as_str()),
            ("estop", self.estop.as_str()),
            ("system", self.system.as_str()),
            ("x_act", self.x_act.as_str()),
            ("y_act", self.y_act.as_str()),
            ("z_act", self.z_act.as_str()),
            ("speed", self.speed.as_str()),
        ]
    }
}

impl HaasBridgeConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: HaasBridgeConfig = json5::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.haas.devices.is_empty() {
            return Err(ConfigError::Validation(
                "At least one device must be configured".to_string(),
            ));
        }

        if self.haas.queue_capacity == 0 {
            return Err(ConfigError::Validation(
                "queue_capacity must be greater than 0".to_string(),
            ));
        }

        let mut seen = HashSet::new();

        for device in &self.haas.devices {
            let name = &device.device_key;

            if name.is_empty() {
                return Err(ConfigError::Validation(
                    "Device key cannot be empty".to_string(),
                ));
            }

            if name.contains('/') || name.contains('*') {
                return Err(ConfigError::Validation(format!(
                    "Device '{}': key must not contain '/' or '*'",
                    name
                )));
            }

            if !seen.insert(name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Device '{}' is configured more than once",
                    name
                )));
            }

            if device.poll_interval_ms == 0 {
                return Err(ConfigError::Validation(format!(
                    "Device '{}': poll_interval_ms must be greater than 0",
                    name
                )));
            }

            if device.response_timeout_ms == 0 {
                return Err(ConfigError::Validation(format!(
                    "Device '{}': response_timeout_ms must be greater than 0",
                    name
                )));
            }

            match &device.connection {
                ConnectionConfig::Tcp { server, port, .. } => {
                    if server.trim().is_empty() {
                        return Err(ConfigError::Validation(format!(
                            "Device '{}': server address cannot be empty",
                            name
                        )));
                    }
                    if *port == 0 {
                        return Err(ConfigError::Validation(format!(
                            "Device '{}': port must be 1-65535",
                            name
                        )));
                    }
                }
                ConnectionConfig::Serial { com_port, .. } => {
                    if com_port.trim().is_empty() {
                        return Err(ConfigError::Validation(format!(
                            "Device '{}': com_port cannot be empty",
                            name
                        )));
                    }
                }
            }

            for (field, key) in device.keys.all() {
                if key.is_empty() || key.contains('/') || key.contains('*') {
                    return Err(ConfigError::Validation(format!(
                        "Device '{}': data item key '{}' must be non-empty without '/' or '*'",
                        name, field
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tcp_config() {
        let json = r#"{
            haas: {
                devices: [
                    {
                        device_key: "vf2",
                        connection: { type: "tcp", server: "192.168.1.50" }
                    }
                ]
            }
        }"#;

        let config: HaasBridgeConfig = json5::from_str(json).unwrap();
        config.validate().unwrap();

        assert_eq!(config.haas.key_prefix, "cncsight/haas");
        assert_eq!(config.serialization, Format::Json);

        let device = &config.haas.devices[0];
        assert_eq!(device.device_key, "vf2");
        assert_eq!(device.poll_interval(), Duration::from_millis(1000));
        assert_eq!(device.keys, DataItemKeys::default());

        if let ConnectionConfig::Tcp {
            server,
            port,
            settle_delay_ms,
            ..
        } = &device.connection
        {
            assert_eq!(server, "192.168.1.50");
            assert_eq!(*port, 5051); // default
            assert_eq!(*settle_delay_ms, 500);
        } else {
            panic!("Expected TCP connection");
        }
    }

    #[test]
    fn test_parse_serial_config() {
        let json = r#"{
            zenoh: { mode: "client", connect: ["tcp/10.0.0.1:7447"] },
            serialization: "cbor",
            haas: {
                key_prefix: "plant/haas",
                devices: [
                    {
                        deviceKey: "st10",
                        connection: { type: "serial", comPort: "/dev/ttyUSB0" },
                        pollIntervalMs: 2500,
                        keys: { system: "alarm", x_act: "Xact" }
                    }
                ]
            }
        }"#;

        let config: HaasBridgeConfig = json5::from_str(json).unwrap();
        config.validate().unwrap();

        let device = &config.haas.devices[0];
        assert_eq!(device.device_key, "st10");
        assert_eq!(device.poll_interval_ms, 2500);
        assert_eq!(device.keys.system, "alarm");
        assert_eq!(device.keys.x_act, "Xact");
        assert_eq!(device.keys.y_act, "y_act");
        assert_eq!(config.serialization, Format::Cbor);

        if let ConnectionConfig::Serial {
            com_port,
            settle_delay_ms,
        } = &device.connection
        {
            assert_eq!(com_port, "/dev/ttyUSB0");
            assert_eq!(*settle_delay_ms, 1000);
        } else {
            panic!("Expected serial connection");
        }
    }

    #[test]
    fn test_validate_empty_devices() {
        let config: HaasBridgeConfig = json5::from_str("{ haas: { devices: [] } }").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_address() {
        let json = r#"{
            haas: {
                devices: [
                    { device_key: "vf2", connection: { type: "tcp", server: "", port: 5051 } }
                ]
            }
        }"#;
        let config: HaasBridgeConfig = json5::from_str(json).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let json = r#"{
            haas: {
                devices: [
                    { device_key: "vf2", connection: { type: "tcp", server: "cnc", port: 0 } }
                ]
            }
        }"#;
        let config: HaasBridgeConfig = json5::from_str(json).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_port_out_of_range_is_parse_error() {
        let json = r#"{
            haas: {
                devices: [
                    { device_key: "vf2", connection: { type: "tcp", server: "cnc", port: 70000 } }
                ]
            }
        }"#;
        assert!(json5::from_str::<HaasBridgeConfig>(json).is_err());
    }

    #[test]
    fn test_validate_duplicate_device_key() {
        let json = r#"{
            haas: {
                devices: [
                    { device_key: "vf2", connection: { type: "tcp", server: "a" } },
                    { device_key: "vf2", connection: { type: "serial", com_port: "COM1" } }
                ]
            }
        }"#;
        let config: HaasBridgeConfig = json5::from_str(json).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_validate_zero_interval_and_empty_key() {
        let json = r#"{
            haas: {
                devices: [
                    { device_key: "vf2", connection: { type: "tcp", server: "a" }, poll_interval_ms: 0 }
                ]
            }
        }"#;
        let config: HaasBridgeConfig = json5::from_str(json).unwrap();
        assert!(config.validate().is_err());

        let json = r#"{
            haas: {
                devices: [
                    { device_key: "vf2", connection: { type: "tcp", server: "a" }, keys: { estop: "" } }
                ]
            }
        }"#;
        let config: HaasBridgeConfig = json5::from_str(json).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("estop"));
    }

    #[test]
    fn test_describe_connection() {
        let tcp = ConnectionConfig::Tcp {
            server: "10.0.0.5".to_string(),
            port: 5051,
            settle_delay_ms: 500,
            connect_timeout_ms: 5000,
        };
        assert_eq!(tcp.describe(), "tcp://10.0.0.5:5051");

        let serial = ConnectionConfig::Serial {
            com_port: "COM3".to_string(),
            settle_delay_ms: 1000,
        };
        assert_eq!(serial.describe(), "serial://COM3");
    }

    #[test]
    fn test_load_sample_config() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/haas.json5");
        let config = HaasBridgeConfig::load_from_file(path).unwrap();

        assert_eq!(config.haas.devices.len(), 2);
        assert_eq!(config.haas.devices[1].keys.x_act, "Xact");
        assert_eq!(config.haas.devices[1].keys.y_act, "y_act");
        assert_eq!(
            config.haas.devices[1].connection.describe(),
            "serial:///dev/ttyUSB0"
        );
    }
}
