use async_trait::async_trait;
use index::{GraphStore, HopRange, TraversalSpec};
use std::sync::Arc;
use tracing::{debug, info};

use crate::assembler;
use crate::context::ContextDocument;
use crate::error::{RagError, Result, Stage};
use crate::retriever::{
    RetrievalItem, RetrievalMetadata, Retriever, RetrieverConfig, RetrieverResult, VectorRetriever,
};

/// Largest `max_hops` accepted unless configured otherwise
pub const DEFAULT_MAX_HOPS_LIMIT: usize = 4;

/// Vector search followed by a bounded walk through the knowledge graph
/// from the seed chunks.
#[derive(Clone)]
pub struct HybridRetriever {
    vector: VectorRetriever,
    store: Arc<dyn GraphStore>,
    min_hops: usize,
    max_hops_limit: usize,
    excluded_types: Vec<String>,
}

impl HybridRetriever {
    pub fn new(vector: VectorRetriever, store: Arc<dyn GraphStore>) -> Self {
        Self {
            vector,
            store,
            min_hops: 1,
            max_hops_limit: DEFAULT_MAX_HOPS_LIMIT,
            excluded_types: Vec::new(),
        }
    }

    pub fn with_min_hops(mut self, min_hops: usize) -> Self {
        self.min_hops = min_hops;
        self
    }

    /// Requests asking for more hops than this are rejected
    pub fn with_max_hops_limit(mut self, limit: usize) -> Self {
        self.max_hops_limit = limit;
        self
    }

    /// Relationship types never walked, on top of the provenance edge
    pub fn with_excluded_types(mut self, excluded_types: Vec<String>) -> Self {
        self.excluded_types = excluded_types;
        self
    }

    pub async fn retrieve(&self, query_text: &str, top_k: usize, max_hops: usize) -> Result<ContextDocument> {
        Ok(self.retrieve_detailed(query_text, top_k, max_hops).await?.context)
    }

    pub async fn retrieve_detailed(
        &self,
        query_text: &str,
        top_k: usize,
        max_hops: usize,
    ) -> Result<RetrieverResult> {
        if max_hops > self.max_hops_limit {
            return Err(RagError::InvalidRequest(format!(
                "max_hops {} exceeds the limit of {}",
                max_hops, self.max_hops_limit
            )));
        }
        let hops = HopRange::new(self.min_hops, max_hops)
            .map_err(|e| RagError::InvalidRequest(e.to_string()))?;

        let seeds = self.vector.retrieve(query_text, top_k).await?;
        if seeds.is_empty() {
            debug!("No seed chunks, skipping traversal");
            return Ok(RetrieverResult {
                items: Vec::new(),
                context: ContextDocument::empty_hybrid(),
                metadata: RetrievalMetadata::default(),
            });
        }

        let mut spec = TraversalSpec::new(seeds.iter().map(|s| s.chunk_id.clone()).collect(), hops);
        spec.excluded_types.extend(self.excluded_types.iter().cloned());

        let traversal = self.store
            .traverse(&spec)
            .await
            .map_err(|e| RagError::unavailable(Stage::Traversal, e))?;

        let deduped = assembler::deduplicate(&seeds, &traversal);
        let context = assembler::format_hybrid(&deduped)?;

        info!(
            seeds = seeds.len(),
            min_hops = hops.min(),
            max_hops = hops.max(),
            traversed_relationships = traversal.relationships.len(),
            chunks = deduped.chunks.len(),
            relationships = deduped.relationships.len(),
            "Hybrid context assembled"
        );

        Ok(RetrieverResult {
            metadata: RetrievalMetadata {
                seed_count: seeds.len(),
                traversal_performed: true,
                chunk_count: deduped.chunks.len(),
                relationship_count: deduped.relationships.len(),
            },
            items: vec![RetrievalItem::Composite {
                chunks: deduped.chunks,
                relationships: deduped.relationships,
            }],
            context,
        })
    }
}

#[async_trait]
impl Retriever for HybridRetriever {
    fn name(&self) -> &'static str {
        "hybrid"
    }

    async fn search(&self, query_text: &str, config: &RetrieverConfig) -> Result<RetrieverResult> {
        self.retrieve_detailed(query_text, config.top_k, config.max_hops).await
    }
}
