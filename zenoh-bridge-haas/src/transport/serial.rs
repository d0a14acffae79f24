//! RS-232 transport.
//!
//! Haas serial ports run at 19200 baud, 7 data bits, no parity, one stop
//! bit. Replies are handed back in the legacy tokenized form: the raw text
//! is split on commas and spaces, the first token is dropped, empties are
//! discarded, and the second remaining token is the response.

use super::{ConnectionState, READ_BUFFER_SIZE, Transport, TransportError, frame_command};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{DataBits, Parity, SerialStream, StopBits};
use tracing::info;

/// Fixed line speed of the controller's serial port.
pub const BAUD_RATE: u32 = 19200;

/// Default wait between write and read on RS-232.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1000);

/// Serial transport to a controller's RS-232 port.
pub struct SerialTransport {
    port_name: String,
    settle_delay: Duration,
    port: Option<SerialStream>,
}

impl SerialTransport {
    /// Create a closed transport for the given port name.
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            settle_delay: DEFAULT_SETTLE_DELAY,
            port: None,
        }
    }

    /// Set the settle delay.
    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    async fn exchange(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> Result<Option<String>, TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::Closed)?;

        port.write_all(&frame_command(command))
            .await
            .map_err(|e| TransportError::Write(e.to_string()))?;

        tokio::time::sleep(self.settle_delay).await;

        let mut buffer = [0u8; READ_BUFFER_SIZE];
        let n = tokio::time::timeout(timeout, port.read(&mut buffer))
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
            .map_err(|e| TransportError::Read(e.to_string()))?;

        Ok(serial_reply(&String::from_utf8_lossy(&buffer[..n])))
    }
}

impl Transport for SerialTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        self.close().await;

        let builder = tokio_serial::new(&self.port_name, BAUD_RATE)
            .data_bits(DataBits::Seven)
            .parity(Parity::None)
            .stop_bits(StopBits::One);

        let port = SerialStream::open(&builder).map_err(|e| {
            TransportError::Connect(format!("Serial open {} failed: {}", self.port_name, e))
        })?;

        info!(endpoint = %self.endpoint(), "Opened serial port");
        self.port = Some(port);
        Ok(())
    }

    async fn close(&mut self) {
        self.port = None;
    }

    fn state(&self) -> ConnectionState {
        if self.port.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    fn endpoint(&self) -> String {
        format!("serial://{}", self.port_name)
    }

    async fn send_command(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> Result<Option<String>, TransportError> {
        if self.port.is_none() {
            self.connect().await?;
        }

        let result = self.exchange(command, timeout).await;
        if result.is_err() {
            self.port = None;
        }
        result
    }
}

/// The reply handed back for a raw serial read: the token at index 1 of
/// [`tokenize_serial_response`], if there is one.
pub fn serial_reply(raw: &str) -> Option<String> {
    tokenize_serial_response(raw).into_iter().nth(1)
}

/// Split a raw serial reply into its value tokens.
///
/// The reply is split on `,` and ` `, the first token is dropped, and the
/// rest are trimmed with empty tokens removed.
pub fn tokenize_serial_response(raw: &str) -> Vec<String> {
    raw.split([',', ' '])
        .skip(1)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(String::from)
        .collect()
}
