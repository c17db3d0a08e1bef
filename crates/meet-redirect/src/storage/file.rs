use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, oneshot};

use super::kv_store::KvStore;
use crate::error::{CoreError, CoreResult};

pub const STORE_FILENAME: &str = "store.json";

enum WriteRequest {
    Write(Vec<u8>),
    Flush(oneshot::Sender<()>),
}

/// Key-value store persisted as a single JSON object.
///
/// Every mutation queues a rewrite of the file to a background writer task,
/// so callers never wait on disk. Writes land in the order they were made.
/// Write failures are logged and the in-memory value stays authoritative for
/// the rest of the process.
#[derive(Debug)]
pub struct FileKvStore {
    path: PathBuf,
    data: Map<String, Value>,
    writes: mpsc::UnboundedSender<WriteRequest>,
}

impl FileKvStore {
    /// Loads the store and starts its writer on the current runtime.
    pub async fn open(dir: &Path) -> CoreResult<Self> {
        tokio::fs::create_dir_all(dir).await.map_err(|error| {
            CoreError::Storage(format!(
                "failed to create storage directory {}: {error}",
                dir.display()
            ))
        })?;
        let path = dir.join(STORE_FILENAME);
        let data = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<Value>(&bytes) {
                Ok(Value::Object(map)) => map,
                Ok(_) | Err(_) => {
                    tracing::warn!("discarding unreadable store {}", path.display());
                    Map::new()
                }
            },
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(error) => {
                return Err(CoreError::Storage(format!(
                    "failed to read store {}: {error}",
                    path.display()
                )))
            }
        };

        let (writes, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(path.clone(), rx));
        Ok(Self { path, data, writes })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolves once every write queued so far has reached the disk.
    pub async fn flushed(&self) {
        let (reply, done) = oneshot::channel();
        if self.writes.send(WriteRequest::Flush(reply)).is_ok() {
            let _ = done.await;
        }
    }

    fn queue_write(&self) {
        let serialized = match serde_json::to_vec_pretty(&self.data) {
            Ok(serialized) => serialized,
            Err(error) => {
                tracing::warn!("store serialize error: {error}");
                return;
            }
        };
        if self.writes.send(WriteRequest::Write(serialized)).is_err() {
            tracing::warn!("store writer for {} has stopped", self.path.display());
        }
    }
}

async fn run_writer(path: PathBuf, mut rx: mpsc::UnboundedReceiver<WriteRequest>) {
    while let Some(request) = rx.recv().await {
        match request {
            WriteRequest::Write(bytes) => {
                if let Err(error) = tokio::fs::write(&path, bytes).await {
                    tracing::warn!("failed to write store {}: {error}", path.display());
                }
            }
            WriteRequest::Flush(reply) => {
                let _ = reply.send(());
            }
        }
    }
}

impl KvStore for FileKvStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.data.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) {
        self.data.insert(key.to_string(), value);
        self.queue_write();
    }
}
