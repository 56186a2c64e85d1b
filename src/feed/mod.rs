//! # Attribute Feed Module
//!
//! Receives vehicle attribute notifications from the vehicle link.
//!
//! Each UDP datagram carries one JSON notification:
//!
//! ```text
//! {"name": "location.global_frame", "value": {"lat": -35.36, "lon": 149.16, "alt": 584.0}}
//! {"name": "groundspeed", "value": 4.8}
//! {"name": "ekf_ok", "value": true}
//! ```
//!
//! Recognised notifications are decoded into [`AttributeUpdate`]s and pushed
//! into the update channel in arrival order. Unknown names are ignored;
//! malformed ones are logged and dropped.

use serde::Deserialize;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{info, trace, warn};

use crate::error::{NmeaBridgeError, Result};
use crate::telemetry::update::AttributeUpdate;

/// Largest notification datagram accepted
pub const MAX_NOTIFICATION_SIZE: usize = 4096;

/// One attribute-change notification as it appears on the wire
#[derive(Debug, Clone, Deserialize)]
pub struct AttributeNotification {
    pub name: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Decode one notification datagram
///
/// # Returns
///
/// * `Ok(Some(update))` - tracked attribute
/// * `Ok(None)` - attribute the bridge ignores
///
/// # Errors
///
/// Returns `Json` if the datagram is not a notification object, or `Feed` if
/// a tracked attribute carries a malformed value.
pub fn decode_notification(datagram: &[u8]) -> Result<Option<AttributeUpdate>> {
    let notification: AttributeNotification = serde_json::from_slice(datagram)?;
    AttributeUpdate::from_attribute(&notification.name, &notification.value)
}

/// UDP listener for attribute notifications
#[derive(Debug)]
pub struct AttributeFeed {
    socket: UdpSocket,
}

impl AttributeFeed {
    /// Bind the listening socket
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| NmeaBridgeError::Feed(format!("Failed to bind {}: {}", addr, e)))?;
        info!("Attribute feed listening on {}", addr);
        Ok(Self { socket })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Forward notifications into `updates` until the receiver is dropped
    ///
    /// # Returns
    ///
    /// * `Result<u64>` - Number of updates forwarded
    ///
    /// # Errors
    ///
    /// Returns `Io` if the socket itself fails.
    pub async fn run(self, updates: mpsc::Sender<AttributeUpdate>) -> Result<u64> {
        let mut buf = vec![0u8; MAX_NOTIFICATION_SIZE];
        let mut forwarded: u64 = 0;

        loop {
            let (len, peer) = self.socket.recv_from(&mut buf).await?;

            match decode_notification(&buf[..len]) {
                Ok(Some(update)) => {
                    if updates.send(update).await.is_err() {
                        info!("Update loop closed, attribute feed stopping");
                        return Ok(forwarded);
                    }
                    forwarded += 1;
                }
                Ok(None) => trace!("Ignoring untracked attribute from {}", peer),
                Err(e) => warn!("Dropping notification from {}: {}", peer, e),
            }
        }
    }
}
