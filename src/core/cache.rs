use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::ReplyCache;

/// In-process [`ReplyCache`]. Expired entries are dropped when read and on
/// every write.
#[derive(Debug, Default)]
pub struct MemoryReplyCache {
    entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl MemoryReplyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|(_, expires_at)| *expires_at > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ReplyCache for MemoryReplyCache {
    async fn put(&self, key: &str, value: String, ttl: Duration) -> anyhow::Result<()> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        let before = entries.len();
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        if entries.len() < before {
            debug!(evicted = before - entries.len(), "Evicted expired replies");
        }

        entries.insert(key.to_string(), (value, now + ttl));
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(value, _)| value.clone()))
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
