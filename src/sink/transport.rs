//! # Datagram Transport
//!
//! Fire-and-forget UDP delivery of sentences to the LiDAR. One sentence per
//! datagram, no acknowledgement, no retry.

use async_trait::async_trait;
use std::io;
use std::net::{IpAddr, SocketAddr};
use tokio::net::UdpSocket;
use tracing::{debug, info};

use crate::error::{NmeaBridgeError, Result};

/// Trait for connectionless datagram sends, to enable testing
#[async_trait]
pub trait DatagramSink: Send + Sync {
    /// Send one datagram, returning the number of bytes written
    async fn send_to(&self, payload: &[u8], destination: SocketAddr) -> io::Result<usize>;
}

#[async_trait]
impl DatagramSink for UdpSocket {
    async fn send_to(&self, payload: &[u8], destination: SocketAddr) -> io::Result<usize> {
        UdpSocket::send_to(self, payload, destination).await
    }
}

/// Sentence transport bound to one destination
pub struct UdpTransport<S: DatagramSink = UdpSocket> {
    sink: S,
    destination: SocketAddr,
}

impl<S: DatagramSink> std::fmt::Debug for UdpTransport<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpTransport")
            .field("destination", &self.destination)
            .finish_non_exhaustive()
    }
}

impl UdpTransport<UdpSocket> {
    /// Bind a local UDP socket for sending to `destination`
    ///
    /// # Errors
    ///
    /// Returns `Transport` if the local socket cannot be bound. This is the
    /// only transport failure that is fatal, since it happens at startup.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use nmea_bridge::sink::transport::UdpTransport;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let transport = UdpTransport::bind(
    ///         "0.0.0.0:0".parse()?,
    ///         "192.168.1.201:10110".parse()?,
    ///     ).await?;
    ///     transport.send(b"$GPRMC,...").await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn bind(local: SocketAddr, destination: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|e| NmeaBridgeError::Transport(format!("Failed to bind {}: {}", local, e)))?;

        info!("Sentence transport bound to {} -> {}", local, destination);
        Ok(Self::with_sink(socket, destination))
    }
}

impl<S: DatagramSink> UdpTransport<S> {
    /// Wrap an existing datagram sink
    pub fn with_sink(sink: S, destination: SocketAddr) -> Self {
        Self { sink, destination }
    }

    /// Configured destination
    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    /// Send one sentence to the configured destination
    pub async fn send(&self, payload: &[u8]) -> Result<()> {
        self.send_to(payload, self.destination.ip(), self.destination.port()).await
    }

    /// Send one sentence to an explicit address and port
    ///
    /// # Errors
    ///
    /// Returns `Transport` if the send fails or writes a short datagram.
    pub async fn send_to(&self, payload: &[u8], address: IpAddr, port: u16) -> Result<()> {
        let destination = SocketAddr::new(address, port);
        let written = self
            .sink
            .send_to(payload, destination)
            .await
            .map_err(|e| NmeaBridgeError::Transport(format!("Failed to send to {}: {}", destination, e)))?;

        if written != payload.len() {
            return Err(NmeaBridgeError::Transport(format!(
                "Short datagram to {}: {} of {} bytes",
                destination,
                written,
                payload.len()
            )));
        }

        debug!("Sent {} byte datagram to {}", written, destination);
        Ok(())
    }
}
