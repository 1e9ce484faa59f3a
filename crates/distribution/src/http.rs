use crate::distributor::{Distributor, DistributorError, DistributorErrorKind, DistributorHealth};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

const RETRY_ATTEMPTS: u32 = 3;
const INITIAL_RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// POSTs each message individually, or batches up to `batch_size` messages
/// (or `batch_interval`, whichever comes first) into one request body
/// (spec §4.G). A 5xx is retried up to `RETRY_ATTEMPTS` times with
/// exponential backoff; a 4xx is fatal for that message and is not
/// retried.
pub struct HttpDistributor {
    url: String,
    batch_size: usize,
    batch_interval: Duration,
    tx: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    connected: AtomicBool,
    dropped: AtomicU64,
}

impl HttpDistributor {
    pub fn new(url: impl Into<String>, batch_size: usize, batch_interval: Duration) -> Self {
        Self {
            url: url.into(),
            batch_size: batch_size.max(1),
            batch_interval,
            tx: Mutex::new(None),
            connected: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        }
    }

    async fn post_with_retry(client: &reqwest::Client, url: &str, body: Vec<u8>) -> Result<(), DistributorError> {
        let mut backoff = INITIAL_RETRY_BACKOFF;
        for attempt in 0..RETRY_ATTEMPTS {
            let response = client
                .post(url)
                .header("content-type", "application/json")
                .body(body.clone())
                .send()
                .await;
            match response {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) if resp.status().is_client_error() => {
                    return Err(DistributorError::new(
                        DistributorErrorKind::SendFailed,
                        format!("fatal client error {}", resp.status()),
                    ));
                }
                Ok(resp) => {
                    if attempt + 1 == RETRY_ATTEMPTS {
                        return Err(DistributorError::new(DistributorErrorKind::SendFailed, format!("server error {}", resp.status())));
                    }
                }
                Err(e) => {
                    if attempt + 1 == RETRY_ATTEMPTS {
                        return Err(DistributorError::new(DistributorErrorKind::SendFailed, e.to_string()));
                    }
                }
            }
            tokio::time::sleep(backoff).await;
            backoff *= 2;
        }
        Ok(())
    }
}

#[async_trait]
impl Distributor for HttpDistributor {
    async fn connect(&self) -> Result<(), DistributorError> {
        let client = reqwest::Client::new();
        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(512);
        let url = self.url.clone();
        let batch_size = self.batch_size;
        let batch_interval = self.batch_interval;

        tokio::spawn(async move {
            let mut pending: Vec<Vec<u8>> = Vec::new();
            loop {
                let flush = tokio::select! {
                    item = rx.recv() => match item {
                        Some(bytes) => {
                            pending.push(bytes);
                            pending.len() >= batch_size
                        }
                        None => {
                            if !pending.is_empty() {
                                let body = render_batch(&pending);
                                let _ = Self::post_with_retry(&client, &url, body).await;
                            }
                            break;
                        }
                    },
                    _ = tokio::time::sleep(batch_interval), if !pending.is_empty() => true,
                };
                if flush && !pending.is_empty() {
                    let body = render_batch(&pending);
                    let _ = Self::post_with_retry(&client, &url, body).await;
                    pending.clear();
                }
            }
        });

        *self.tx.lock() = Some(tx);
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&self, _stream: Uuid, payload: &[u8]) -> Result<(), DistributorError> {
        if !self.connected.load(Ordering::SeqCst) {
            self.connect().await?;
        }
        let tx = self.tx.lock().clone().ok_or_else(|| DistributorError::new(DistributorErrorKind::Closed, "not connected"))?;
        tx.send(payload.to_vec()).await.map_err(|e| {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            DistributorError::new(DistributorErrorKind::SendFailed, e.to_string())
        })
    }

    async fn disconnect(&self) {
        *self.tx.lock() = None;
        self.connected.store(false, Ordering::SeqCst);
    }

    fn health(&self) -> DistributorHealth {
        DistributorHealth {
            connected: self.connected.load(Ordering::SeqCst),
            queue_depth: 0,
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

fn render_batch(pending: &[Vec<u8>]) -> Vec<u8> {
    if pending.len() == 1 {
        return pending[0].clone();
    }
    let mut body = Vec::with_capacity(pending.iter().map(|p| p.len() + 1).sum::<usize>() + 2);
    body.push(b'[');
    for (i, item) in pending.iter().enumerate() {
        if i > 0 {
            body.push(b',');
        }
        body.extend_from_slice(item);
    }
    body.push(b']');
    body
}
