//! Zenoh bridge for Haas CNC controllers.
//!
//! This bridge polls Haas controllers over their Ethernet Q-command port
//! or RS-232, interprets the replies and publishes machine state to Zenoh
//! as MTConnect-style events, samples and conditions.
//!
//! # Key Expressions
//!
//! ```text
//! cncsight/haas/<device>/<data_item>
//! cncsight/haas/@/status
//! ```
//!
//! Where:
//! - `<device>` - Device key from configuration
//! - `<data_item>` - Configured data item key (`avail`, `execution`, `x_act`, ...)

pub mod config;
pub mod grammar;
pub mod processor;
pub mod publisher;
pub mod scheduler;
pub mod sink;
pub mod transport;
