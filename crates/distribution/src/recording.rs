use std::path::Path;
use synopticon_types::RecordedFrame;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;

/// Newline-delimited JSON recording sink: one `RecordedFrame` per line, as
/// `record_start`/`record_stop` branch a stream to persistent storage (spec
/// §4.F, §6 "Optional recording sink writes newline-delimited JSON").
pub struct RecordingSink {
    writer: Mutex<Option<BufWriter<File>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self { writer: Mutex::new(None) }
    }

    pub async fn open(&self, path: impl AsRef<Path>) -> Result<(), std::io::Error> {
        let file = tokio::fs::OpenOptions::new().create(true).append(true).open(path).await?;
        *self.writer.lock().await = Some(BufWriter::new(file));
        Ok(())
    }

    pub async fn write(&self, frame: &RecordedFrame) -> Result<(), std::io::Error> {
        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Ok(());
        };
        let mut line = serde_json::to_vec(frame).map_err(std::io::Error::other)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await
    }

    pub async fn close(&self) {
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.flush().await;
        }
    }

    pub async fn is_open(&self) -> bool {
        self.writer.lock().await.is_some()
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}
