use crate::distributor::{Distributor, DistributorError, DistributorHealth};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Server-pushed only: there is no remote peer to dial, so `connect` just
/// starts the heartbeat task and `send` publishes onto a broadcast channel
/// that the control API's `/api/distribution/streams/{id}/events` handler
/// subscribes to per client (spec §4.G "format `event:…\ndata:JSON\n\n`.
/// Heartbeat comment every 15 s").
pub struct SseDistributor {
    sender: broadcast::Sender<Vec<u8>>,
    running: AtomicBool,
    dropped: AtomicU64,
}

impl SseDistributor {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender, running: AtomicBool::new(false), dropped: AtomicU64::new(0) }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Vec<u8>> {
        self.sender.subscribe()
    }
}

impl Default for SseDistributor {
    fn default() -> Self {
        Self::new()
    }
}

fn format_frame(event: &str, data: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(data.len() + event.len() + 16);
    frame.extend_from_slice(b"event:");
    frame.extend_from_slice(event.as_bytes());
    frame.extend_from_slice(b"\ndata:");
    frame.extend_from_slice(data);
    frame.extend_from_slice(b"\n\n");
    frame
}

#[async_trait]
impl Distributor for SseDistributor {
    async fn connect(&self) -> Result<(), DistributorError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let sender = self.sender.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
            loop {
                ticker.tick().await;
                let _ = sender.send(b": heartbeat\n\n".to_vec());
            }
        });
        Ok(())
    }

    async fn send(&self, _stream: Uuid, payload: &[u8]) -> Result<(), DistributorError> {
        if !self.running.load(Ordering::SeqCst) {
            self.connect().await?;
        }
        let frame = format_frame("result", payload);
        // `send` on a broadcast channel only fails when there are zero
        // receivers; an SSE sink with no subscribers simply has nothing to
        // deliver to yet, which is not an error condition worth
        // propagating to the stream's failure counter.
        if self.sender.send(frame).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    async fn disconnect(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn health(&self) -> DistributorHealth {
        DistributorHealth {
            connected: self.running.load(Ordering::SeqCst),
            queue_depth: self.sender.receiver_count(),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    fn as_sse(&self) -> Option<&SseDistributor> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_uses_event_and_data_lines() {
        let frame = format_frame("result", b"{}");
        assert_eq!(frame, b"event:result\ndata:{}\n\n".to_vec());
    }

    #[tokio::test]
    async fn send_delivers_to_a_live_subscriber() {
        let distributor = SseDistributor::new();
        let mut rx = distributor.subscribe();
        distributor.connect().await.unwrap();
        distributor.send(Uuid::nil(), b"{\"a\":1}").await.unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received, b"event:result\ndata:{\"a\":1}\n\n".to_vec());
    }
}
