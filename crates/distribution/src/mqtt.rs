use crate::distributor::{Distributor, DistributorError, DistributorErrorKind, DistributorHealth};
use async_trait::async_trait;
use parking_lot::Mutex;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use uuid::Uuid;

const MAX_BUFFERED_BYTES: u64 = 1024 * 1024;
const INITIAL_BACKOFF: Duration = Duration::from_millis(200);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

fn qos_from(raw: u8) -> QoS {
    match raw {
        1 => QoS::AtLeastOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtMostOnce,
    }
}

/// Byte-capped, drop-oldest backing queue for spec §4.G's MQTT rule:
/// "Queue messages while disconnected up to 1 MiB, then drop-oldest."
/// (Distinct from `queue::DropOldestQueue`, which caps by item count —
/// this one caps by total payload bytes.)
struct ByteCappedQueue {
    inner: Mutex<VecDeque<Vec<u8>>>,
    bytes: AtomicU64,
    notify: Notify,
    dropped: AtomicU64,
}

impl ByteCappedQueue {
    fn new() -> Self {
        Self { inner: Mutex::new(VecDeque::new()), bytes: AtomicU64::new(0), notify: Notify::new(), dropped: AtomicU64::new(0) }
    }

    fn push(&self, item: Vec<u8>) {
        let mut guard = self.inner.lock();
        self.bytes.fetch_add(item.len() as u64, Ordering::SeqCst);
        guard.push_back(item);
        while self.bytes.load(Ordering::SeqCst) > MAX_BUFFERED_BYTES {
            match guard.pop_front() {
                Some(dropped) => {
                    self.bytes.fetch_sub(dropped.len() as u64, Ordering::SeqCst);
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                }
                None => break,
            }
        }
        drop(guard);
        self.notify.notify_one();
    }

    fn pop(&self) -> Option<Vec<u8>> {
        let item = self.inner.lock().pop_front();
        if let Some(ref bytes) = item {
            self.bytes.fetch_sub(bytes.len() as u64, Ordering::SeqCst);
        }
        item
    }

    async fn wait(&self) {
        self.notify.notified().await;
    }
}

/// Publishes every message under `{prefix}/{source}/data` (spec §6 MQTT
/// topic template). The eventloop is driven on a dedicated task that backs
/// off exponentially (200 ms doubling to a 30 s cap) between reconnect
/// attempts rather than relying on the client's own default policy, to
/// satisfy the spec's explicit curve.
pub struct MqttDistributor {
    host: String,
    port: u16,
    topic: String,
    qos: QoS,
    client: Mutex<Option<AsyncClient>>,
    queue: Arc<ByteCappedQueue>,
    connected: AtomicBool,
}

impl MqttDistributor {
    pub fn new(host: impl Into<String>, port: u16, topic_prefix: impl Into<String>, source: impl std::fmt::Display, qos: u8) -> Self {
        Self {
            host: host.into(),
            port,
            topic: format!("{}/{}/data", topic_prefix.into(), source),
            qos: qos_from(qos),
            client: Mutex::new(None),
            queue: Arc::new(ByteCappedQueue::new()),
            connected: AtomicBool::new(false),
        }
    }

    fn options(host: &str, port: u16) -> MqttOptions {
        let mut opts = MqttOptions::new(format!("synopticon-{}", Uuid::new_v4()), host, port);
        opts.set_keep_alive(Duration::from_secs(30));
        opts
    }
}

#[async_trait]
impl Distributor for MqttDistributor {
    async fn connect(&self) -> Result<(), DistributorError> {
        let (client, mut eventloop) = AsyncClient::new(Self::options(&self.host, self.port), 64);

        let queue = self.queue.clone();
        let topic = self.topic.clone();
        let qos = self.qos;
        let publish_client = client.clone();

        tokio::spawn(async move {
            loop {
                match queue.pop() {
                    Some(bytes) => {
                        let _ = publish_client.publish(&topic, qos, false, bytes).await;
                    }
                    None => queue.wait().await,
                }
            }
        });

        tokio::spawn(async move {
            let mut backoff = INITIAL_BACKOFF;
            loop {
                match eventloop.poll().await {
                    Ok(_) => backoff = INITIAL_BACKOFF,
                    Err(_) => {
                        tokio::time::sleep(backoff).await;
                        backoff = std::cmp::min(backoff * 2, MAX_BACKOFF);
                    }
                }
            }
        });

        *self.client.lock() = Some(client);
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Always enqueues (spec §4.G: queue while disconnected, drop-oldest
    /// once over the 1 MiB cap — never a caller-visible send failure from
    /// backpressure alone, matching the other transports' fire-and-forget
    /// contract).
    async fn send(&self, _stream: Uuid, payload: &[u8]) -> Result<(), DistributorError> {
        if !self.connected.load(Ordering::SeqCst) {
            self.connect().await?;
        }
        self.queue.push(payload.to_vec());
        Ok(())
    }

    async fn disconnect(&self) {
        if let Some(client) = self.client.lock().take() {
            let _ = client.disconnect().await;
        }
        self.connected.store(false, Ordering::SeqCst);
    }

    fn health(&self) -> DistributorHealth {
        DistributorHealth {
            connected: self.connected.load(Ordering::SeqCst),
            queue_depth: self.queue.inner.lock().len(),
            dropped: self.queue.dropped.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_drops_oldest_once_over_the_byte_cap() {
        let queue = ByteCappedQueue::new();
        let chunk = vec![0u8; 300 * 1024]; // 300 KiB per message
        for _ in 0..5 {
            queue.push(chunk.clone());
        }
        // 5 * 300 KiB = 1500 KiB > 1024 KiB cap, so the oldest entries
        // must have been dropped rather than the send rejected.
        assert!(queue.dropped.load(Ordering::Relaxed) > 0);
        assert!(queue.bytes.load(Ordering::SeqCst) <= MAX_BUFFERED_BYTES);
    }
}
