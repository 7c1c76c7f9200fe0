use async_trait::async_trait;
use index::{ChunkRecord, EdgeRecord, Embedder, SimilarityIndex, VectorIndexConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::assembler;
use crate::context::ContextDocument;
use crate::error::{RagError, Result, Stage};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk_id: String,
    pub text: String,
    pub score: f32,
}

/// Per-query retrieval knobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrieverConfig {
    pub top_k: usize,
    /// Ignored by vector-only retrieval
    pub max_hops: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_hops: 2,
        }
    }
}

/// Intermediate value produced during one query; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetrievalItem {
    Chunk(ScoredChunk),
    Composite {
        chunks: Vec<ChunkRecord>,
        relationships: Vec<EdgeRecord>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalMetadata {
    pub seed_count: usize,
    pub traversal_performed: bool,
    pub chunk_count: usize,
    pub relationship_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrieverResult {
    pub items: Vec<RetrievalItem>,
    pub context: ContextDocument,
    pub metadata: RetrievalMetadata,
}

/// A retrieval mode usable by [`GraphRag`](crate::GraphRag).
#[async_trait]
pub trait Retriever: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search(&self, query_text: &str, config: &RetrieverConfig) -> Result<RetrieverResult>;
}

/// Nearest-neighbour search over chunk embeddings.
#[derive(Clone)]
pub struct VectorRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn SimilarityIndex>,
    label: String,
    text_property: String,
}

impl VectorRetriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn SimilarityIndex>,
        config: &VectorIndexConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            label: config.label.clone(),
            text_property: config
                .return_properties
                .first()
                .cloned()
                .unwrap_or_else(|| "text".to_string()),
        }
    }

    /// Up to `top_k` chunks, best first. `top_k == 0` short-circuits
    /// without touching the embedder or the index.
    pub async fn retrieve(&self, query_text: &str, top_k: usize) -> Result<Vec<ScoredChunk>> {
        if query_text.trim().is_empty() {
            return Err(RagError::InvalidRequest("query text is empty".to_string()));
        }
        if top_k == 0 {
            debug!("top_k is 0, skipping similarity search");
            return Ok(Vec::new());
        }

        let embedding = self.embedder
            .embed(query_text)
            .await
            .map_err(|e| RagError::unavailable(Stage::Embedding, e))?;

        let mut hits = self.index
            .search(&embedding, &self.label, top_k)
            .await
            .map_err(|e| RagError::unavailable(Stage::SimilaritySearch, e))?;

        if hits.is_empty() {
            let indexed = self.index
                .indexed_count()
                .await
                .map_err(|e| RagError::unavailable(Stage::SimilaritySearch, e))?;
            if indexed == 0 {
                return Err(RagError::unavailable(
                    Stage::SimilaritySearch,
                    anyhow::anyhow!("vector index holds no embedded {} nodes", self.label),
                ));
            }
        }
        hits.truncate(top_k);

        let seeds: Vec<ScoredChunk> = hits
            .into_iter()
            .map(|hit| ScoredChunk {
                text: hit.property(&self.text_property).unwrap_or_default().to_string(),
                chunk_id: hit.node_id,
                score: hit.score,
            })
            .collect();

        info!(top_k, seeds = seeds.len(), "Similarity search complete");
        Ok(seeds)
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    fn name(&self) -> &'static str {
        "vector"
    }

    async fn search(&self, query_text: &str, config: &RetrieverConfig) -> Result<RetrieverResult> {
        let seeds = self.retrieve(query_text, config.top_k).await?;
        let context = assembler::format_text_only(&seeds)?;

        Ok(RetrieverResult {
            metadata: RetrievalMetadata {
                seed_count: seeds.len(),
                traversal_performed: false,
                chunk_count: seeds.len(),
                relationship_count: 0,
            },
            items: seeds.into_iter().map(RetrievalItem::Chunk).collect(),
            context,
        })
    }
}
