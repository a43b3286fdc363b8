//! SCPI over raw TCP sockets.
//!
//! Most LAN instruments expose a SCPI socket (port 5025 by convention). Commands
//! and replies are `\r\n`/`\n` terminated lines. Before each query any stale
//! input is drained so a late reply to an earlier command cannot be mistaken for
//! the answer.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;

use super::ScpiTransport;
use crate::error::{TransportError, TransportErrorKind};

/// Conventional SCPI raw socket port.
pub const DEFAULT_PORT: u16 = 5025;

/// Default query timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const COMMAND_SETTLE: Duration = Duration::from_millis(10);
const DRAIN_POLL: Duration = Duration::from_millis(10);

/// Async SCPI transport over a TCP stream.
pub struct TcpTransport {
    stream: Mutex<BufReader<TcpStream>>,
    peer: SocketAddr,
    timeout: Duration,
}

impl TcpTransport {
    /// Connect to `host:port`. `host` may be a name or an address.
    ///
    /// # Errors
    ///
    /// `Timeout` if the connection is not established within five seconds, `Io`
    /// otherwise.
    pub async fn connect(host: &str, port: u16) -> Result<Self, TransportError> {
        let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect((host, port)))
            .await
            .map_err(|_| {
                TransportError::new(
                    TransportErrorKind::Timeout,
                    format!("Connection timeout to {}:{}", host, port),
                )
            })??;

        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;

        tracing::info!(%peer, "connected SCPI transport");

        Ok(Self {
            stream: Mutex::new(BufReader::new(stream)),
            peer,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        })
    }

    /// Replace the query timeout.
    pub fn with_timeout(mut self, duration: Duration) -> Self {
        self.timeout = duration;
        self
    }

    /// Remote address of the instrument.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    async fn write_line(
        stream: &mut BufReader<TcpStream>,
        line: &str,
    ) -> Result<(), TransportError> {
        let framed = format!("{}\r\n", line);
        stream.get_mut().write_all(framed.as_bytes()).await?;
        stream.get_mut().flush().await?;
        Ok(())
    }

    /// Discard anything already buffered or waiting on the socket.
    async fn drain_input(stream: &mut BufReader<TcpStream>) {
        let buffered = stream.buffer().len();
        if buffered > 0 {
            tracing::debug!(bytes = buffered, "discarding buffered input");
            stream.consume(buffered);
        }

        let mut scratch = [0u8; 256];
        loop {
            match timeout(DRAIN_POLL, stream.get_mut().peek(&mut scratch)).await {
                Ok(Ok(0)) | Err(_) | Ok(Err(_)) => break,
                Ok(Ok(n)) => {
                    let mut discard = vec![0u8; n];
                    let _ = stream.get_mut().try_read(&mut discard);
                    tracing::debug!(bytes = n, "discarded stale bytes");
                }
            }
        }
    }
}

#[async_trait]
impl ScpiTransport for TcpTransport {
    async fn send_command(&self, command: &str) -> Result<(), TransportError> {
        let mut stream = self.stream.lock().await;
        tracing::debug!(command, "SCPI write");
        Self::write_line(&mut stream, command).await?;
        tokio::time::sleep(COMMAND_SETTLE).await;
        Ok(())
    }

    async fn send_query(&self, query: &str) -> Result<String, TransportError> {
        let mut stream = self.stream.lock().await;
        Self::drain_input(&mut stream).await;

        tracing::debug!(query, "SCPI query");
        Self::write_line(&mut stream, query).await?;

        let mut response = String::new();
        match timeout(self.timeout, stream.read_line(&mut response)).await {
            Ok(Ok(0)) => Err(TransportError::new(
                TransportErrorKind::Closed,
                format!("Connection closed while waiting for: {}", query),
            )),
            Ok(Ok(_)) => {
                let trimmed = response.trim().to_string();
                tracing::debug!(query, reply = %trimmed, "SCPI response");
                Ok(trimmed)
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(TransportError::new(
                TransportErrorKind::Timeout,
                format!("Timeout waiting for response to: {}", query),
            )),
        }
    }
}
