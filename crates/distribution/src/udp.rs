use crate::distributor::{Distributor, DistributorError, DistributorErrorKind, DistributorHealth};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::net::UdpSocket;
use uuid::Uuid;

/// Datagram cap from spec §4.G: "`send` serializes result to ≤1400 B, drops
/// on oversize (counts as error)".
const MAX_DATAGRAM_BYTES: usize = 1400;

/// Connection-less sink: no ordering guarantee, no internal queue beyond
/// the kernel's own socket buffer (spec §4.G).
pub struct UdpDistributor {
    host: String,
    port: u16,
    socket: Mutex<Option<UdpSocket>>,
    connected: AtomicBool,
    dropped: AtomicU64,
}

impl UdpDistributor {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port, socket: Mutex::new(None), connected: AtomicBool::new(false), dropped: AtomicU64::new(0) }
    }
}

#[async_trait]
impl Distributor for UdpDistributor {
    async fn connect(&self) -> Result<(), DistributorError> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| DistributorError::new(DistributorErrorKind::ConnectFailed, e.to_string()))?;
        socket
            .connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| DistributorError::new(DistributorErrorKind::ConnectFailed, e.to_string()))?;
        *self.socket.lock() = Some(socket);
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&self, _stream: Uuid, payload: &[u8]) -> Result<(), DistributorError> {
        // Re-encode the JSON the session manager hands every transport as
        // CBOR, the same structured-value encoding the teacher's `pdata`
        // crate uses for its wire format: denser, which buys headroom
        // under the 1400 B datagram cap.
        let value: serde_json::Value =
            serde_json::from_slice(payload).map_err(|e| DistributorError::new(DistributorErrorKind::SendFailed, e.to_string()))?;
        let mut encoded = Vec::new();
        ciborium::into_writer(&value, &mut encoded)
            .map_err(|e| DistributorError::new(DistributorErrorKind::SendFailed, e.to_string()))?;

        if encoded.len() > MAX_DATAGRAM_BYTES {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return Err(DistributorError::new(
                DistributorErrorKind::PayloadTooLarge,
                format!("{} bytes exceeds {MAX_DATAGRAM_BYTES} byte datagram cap", encoded.len()),
            ));
        }
        if !self.connected.load(Ordering::SeqCst) {
            self.connect().await?;
        }
        let guard = self.socket.lock();
        let socket = guard.as_ref().ok_or_else(|| DistributorError::new(DistributorErrorKind::Closed, "udp socket not connected"))?;
        socket
            .try_send(&encoded)
            .map_err(|e| DistributorError::new(DistributorErrorKind::SendFailed, e.to_string()))?;
        Ok(())
    }

    async fn disconnect(&self) {
        *self.socket.lock() = None;
        self.connected.store(false, Ordering::SeqCst);
    }

    fn health(&self) -> DistributorHealth {
        DistributorHealth { connected: self.connected.load(Ordering::SeqCst), queue_depth: 0, dropped: self.dropped.load(Ordering::Relaxed) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn oversize_payload_is_rejected_before_touching_the_socket() {
        let distributor = UdpDistributor::new("127.0.0.1", 1);
        let big_string = "x".repeat(MAX_DATAGRAM_BYTES * 2);
        let payload = serde_json::to_vec(&serde_json::json!({"filler": big_string})).unwrap();
        let result = distributor.send(Uuid::nil(), &payload).await;
        assert!(matches!(result, Err(e) if e.kind == DistributorErrorKind::PayloadTooLarge));
        assert_eq!(distributor.health().dropped, 1);
    }
}
