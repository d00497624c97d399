use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::EtlResult;
use crate::store::watermark::WatermarkStore;

/// In-memory watermark store.
///
/// Watermarks are lost on process exit, so every process starts from the minimum watermark.
/// Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryWatermarkStore {
    inner: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryWatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `(stream_id, watermark)` pairs.
    pub fn with_watermarks<I, K, V>(watermarks: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let watermarks = watermarks
            .into_iter()
            .map(|(stream_id, watermark)| (stream_id.into(), watermark.into()))
            .collect();

        Self {
            inner: Arc::new(Mutex::new(watermarks)),
        }
    }

    /// Returns a snapshot of all stored watermarks.
    pub async fn watermarks(&self) -> HashMap<String, String> {
        self.inner.lock().await.clone()
    }
}

impl WatermarkStore for MemoryWatermarkStore {
    async fn get_watermark(&self, stream_id: &str) -> EtlResult<Option<String>> {
        let inner = self.inner.lock().await;

        Ok(inner.get(stream_id).cloned())
    }

    async fn put_watermark(&self, stream_id: &str, watermark: &str) -> EtlResult<()> {
        let mut inner = self.inner.lock().await;
        inner.insert(stream_id.to_string(), watermark.to_string());

        Ok(())
    }
}
