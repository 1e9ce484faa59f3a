use crate::distributor::{Distributor, DistributorError, DistributorErrorKind, DistributorHealth};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

/// Buffer cap from spec §4.G: "on buffer > 1 MiB, close with policy code".
const MAX_BUFFERED_BYTES: u64 = 1024 * 1024;

/// Full-duplex sink backed by a client WebSocket connection. `send` only
/// enqueues onto an mpsc channel drained by a writer task — the actual
/// socket write never happens on the caller's stack (spec §4.G "cooperative:
/// they may block inside `send` only until enqueued").
pub struct WebSocketDistributor {
    url: String,
    tx: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    buffered_bytes: Arc<AtomicU64>,
    connected: AtomicBool,
    dropped: AtomicU64,
}

impl WebSocketDistributor {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            tx: Mutex::new(None),
            buffered_bytes: Arc::new(AtomicU64::new(0)),
            connected: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl Distributor for WebSocketDistributor {
    async fn connect(&self) -> Result<(), DistributorError> {
        let (stream, _response) = tokio_tungstenite::connect_async(&self.url)
            .await
            .map_err(|e| DistributorError::new(DistributorErrorKind::ConnectFailed, e.to_string()))?;
        let (mut sink, mut source) = stream.split();
        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(256);
        let buffered_bytes = self.buffered_bytes.clone();

        tokio::spawn(async move {
            while let Some(bytes) = rx.recv().await {
                buffered_bytes.fetch_sub(bytes.len() as u64, Ordering::SeqCst);
                if sink.send(Message::Binary(bytes.into())).await.is_err() {
                    break;
                }
            }
            let _ = sink
                .send(Message::Close(Some(CloseFrame { code: CloseCode::Normal, reason: "done".into() })))
                .await;
        });
        // Drain inbound frames (pings, peer-initiated closes) so the
        // connection stays alive; this sink never reads application data.
        tokio::spawn(async move { while source.next().await.is_some() {} });

        *self.tx.lock() = Some(tx);
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&self, _stream: Uuid, payload: &[u8]) -> Result<(), DistributorError> {
        if self.buffered_bytes.load(Ordering::SeqCst) + payload.len() as u64 > MAX_BUFFERED_BYTES {
            self.disconnect().await;
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return Err(DistributorError::new(
                DistributorErrorKind::SendFailed,
                "send buffer exceeded 1 MiB; connection closed with policy violation",
            ));
        }
        if !self.connected.load(Ordering::SeqCst) {
            self.connect().await?;
        }
        let tx = self.tx.lock().clone().ok_or_else(|| DistributorError::new(DistributorErrorKind::Closed, "not connected"))?;
        self.buffered_bytes.fetch_add(payload.len() as u64, Ordering::SeqCst);
        tx.send(payload.to_vec())
            .await
            .map_err(|e| DistributorError::new(DistributorErrorKind::SendFailed, e.to_string()))
    }

    async fn disconnect(&self) {
        *self.tx.lock() = None;
        self.connected.store(false, Ordering::SeqCst);
        self.buffered_bytes.store(0, Ordering::SeqCst);
    }

    fn health(&self) -> DistributorHealth {
        DistributorHealth {
            connected: self.connected.load(Ordering::SeqCst),
            queue_depth: 0,
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}
