//! Command/response transports to the controller.
//!
//! A transport sends one Q-command, waits the settle delay the controller
//! needs to compose its reply, and reads the reply once. Both variants
//! reconnect lazily: a send on a disconnected transport opens it first,
//! and any I/O failure drops the link so the next send starts over.

mod serial;
mod tcp;

pub use serial::{SerialTransport, serial_reply, tokenize_serial_response};
pub use tcp::TcpTransport;

use std::future::Future;
use std::time::Duration;

/// Line terminator appended to every command.
pub const LINE_TERMINATOR: &str = "\r\n";

/// Prompt character the controller appends after a reply.
pub const PROMPT: char = '>';

/// Size of the single read performed per command.
pub const READ_BUFFER_SIZE: usize = 2048;

/// Error type for transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connect(String),
    #[error("Write failed: {0}")]
    Write(String),
    #[error("Read failed: {0}")]
    Read(String),
    #[error("No response within {0:?}")]
    Timeout(Duration),
    #[error("Connection closed by peer")]
    Closed,
}

/// Link state of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// A command/response link to one controller.
///
/// Implementors own their connection exclusively; the processor that
/// holds a transport is the only caller.
pub trait Transport: Send {
    /// Open the link, replacing any existing connection.
    fn connect(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Close the link. Safe to call when already closed.
    fn close(&mut self) -> impl Future<Output = ()> + Send;

    /// Current link state.
    fn state(&self) -> ConnectionState;

    /// Human-readable endpoint, for logs.
    fn endpoint(&self) -> String;

    /// Send `command` and return the normalized reply.
    ///
    /// Connects first if needed. `Ok(None)` means the controller sent
    /// nothing usable. `timeout` bounds the read only; the settle delay
    /// always elapses in full.
    fn send_command(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<Option<String>, TransportError>> + Send;
}

/// Strip trailing whitespace and prompt characters from a raw reply.
///
/// Returns `None` when nothing is left.
pub fn normalize_response(raw: &str) -> Option<String> {
    let trimmed = raw.trim_end().trim_end_matches(PROMPT).trim_end();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Frame a command for the wire.
pub fn frame_command(command: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(command.len() + LINE_TERMINATOR.len());
    bytes.extend_from_slice(command.as_bytes());
    bytes.extend_from_slice(LINE_TERMINATOR.as_bytes());
    bytes
}
