use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use index::Embedder;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Memoizes query embeddings by content hash. Failures are not cached.
pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    embeddings: DashMap<String, Vec<f32>>,
    max_entries: usize,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

#[derive(Debug, Serialize)]
pub struct CacheStats {
    pub embeddings_cached: usize,
    pub hits: usize,
    pub misses: usize,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, max_entries: usize) -> Self {
        Self {
            inner,
            embeddings: DashMap::new(),
            max_entries,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    fn insert(&self, key: String, embedding: Vec<f32>) {
        if self.max_entries == 0 {
            return;
        }
        if self.embeddings.len() >= self.max_entries {
            // Simple eviction: clear 25% when full
            let to_remove: Vec<_> = self.embeddings
                .iter()
                .take((self.max_entries / 4).max(1))
                .map(|r| r.key().clone())
                .collect();
            for key in to_remove {
                self.embeddings.remove(&key);
            }
        }
        self.embeddings.insert(key, embedding);
    }

    fn hash_text(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            embeddings_cached: self.embeddings.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl Embedder for CachedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let key = Self::hash_text(text);
        if let Some(hit) = self.embeddings.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit.value().clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let embedding = self.inner.embed(text).await?;
        self.insert(key, embedding.clone());
        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingEmbedder {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("service down");
            }
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    fn counting(fail: bool) -> Arc<CountingEmbedder> {
        Arc::new(CountingEmbedder { calls: AtomicUsize::new(0), fail })
    }

    #[tokio::test]
    async fn repeated_text_is_embedded_once() {
        let inner = counting(false);
        let cache = CachedEmbedder::new(inner.clone(), 10);

        let first = cache.embed("lupus").await.unwrap();
        let second = cache.embed("lupus").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let inner = counting(true);
        let cache = CachedEmbedder::new(inner.clone(), 10);

        assert!(cache.embed("lupus").await.is_err());
        assert!(cache.embed("lupus").await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().embeddings_cached, 0);
    }

    #[tokio::test]
    async fn stays_within_capacity() {
        let cache = CachedEmbedder::new(counting(false), 4);
        for text in ["a", "bb", "ccc", "dddd", "eeeee", "ffffff"] {
            cache.embed(text).await.unwrap();
        }
        assert!(cache.stats().embeddings_cached <= 4);
    }
}
