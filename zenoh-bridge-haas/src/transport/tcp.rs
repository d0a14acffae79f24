//! Ethernet transport (Q-commands over a raw TCP socket).

use super::{
    ConnectionState, READ_BUFFER_SIZE, Transport, TransportError, frame_command,
    normalize_response,
};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Default wait between write and read on Ethernet.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// TCP transport to a controller's Ethernet Q-command port.
pub struct TcpTransport {
    server: String,
    port: u16,
    settle_delay: Duration,
    connect_timeout: Duration,
    stream: Option<TcpStream>,
}

impl TcpTransport {
    /// Create a disconnected transport for `server:port`.
    pub fn new(server: impl Into<String>, port: u16) -> Self {
        Self {
            server: server.into(),
            port,
            settle_delay: DEFAULT_SETTLE_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            stream: None,
        }
    }

    /// Set the settle delay.
    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    async fn exchange(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> Result<Option<String>, TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;

        stream
            .write_all(&frame_command(command))
            .await
            .map_err(|e| TransportError::Write(e.to_string()))?;
        stream
            .flush()
            .await
            .map_err(|e| TransportError::Write(e.to_string()))?;

        tokio::time::sleep(self.settle_delay).await;

        let mut buffer = [0u8; READ_BUFFER_SIZE];
        let n = tokio::time::timeout(timeout, stream.read(&mut buffer))
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
            .map_err(|e| TransportError::Read(e.to_string()))?;

        if n == 0 {
            return Err(TransportError::Closed);
        }

        Ok(normalize_response(&String::from_utf8_lossy(&buffer[..n])))
    }
}

impl Transport for TcpTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        self.close().await;

        let addr = format!("{}:{}", self.server, self.port);
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| TransportError::Connect(format!("{}: connection timeout", addr)))?
            .map_err(|e| TransportError::Connect(format!("{}: {}", addr, e)))?;

        stream
            .set_nodelay(true)
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        info!(endpoint = %addr, "Connected to controller");
        self.stream = Some(stream);
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!(endpoint = %self.endpoint(), error = %e, "Error shutting down socket");
            }
        }
    }

    fn state(&self) -> ConnectionState {
        if self.stream.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    fn endpoint(&self) -> String {
        format!("tcp://{}:{}", self.server, self.port)
    }

    async fn send_command(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> Result<Option<String>, TransportError> {
        if self.stream.is_none() {
            self.connect().await?;
        }

        let result = self.exchange(command, timeout).await;
        if result.is_err() {
            // Drop the link; the next command reconnects.
            self.stream = None;
        }
        result
    }
}
