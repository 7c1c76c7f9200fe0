use index::{ChunkRecord, EdgeRecord, TraversalResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::context::ContextDocument;
use crate::error::Result;
use crate::retriever::ScoredChunk;

/// Distinct chunks and relationships in first-encountered order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Deduplicated {
    pub chunks: Vec<ChunkRecord>,
    pub relationships: Vec<EdgeRecord>,
}

/// `<source> - <TYPE>(<details or empty>) -> <target>`
pub fn format_relationship(edge: &EdgeRecord) -> String {
    format!(
        "{} - {}({}) -> {}",
        edge.source_name,
        edge.rel_type,
        edge.details.as_deref().unwrap_or(""),
        edge.target_name
    )
}

/// Seeds come first, in similarity order, then whatever the traversal
/// reached. Identity is the chunk or edge id.
pub fn deduplicate(seeds: &[ScoredChunk], traversal: &TraversalResult) -> Deduplicated {
    let mut seen_chunks = HashSet::new();
    let mut chunks = Vec::new();

    let seed_records = seeds.iter().map(|s| ChunkRecord {
        id: s.chunk_id.clone(),
        text: s.text.clone(),
    });
    for chunk in seed_records.chain(traversal.chunks.iter().cloned()) {
        if seen_chunks.insert(chunk.id.clone()) {
            chunks.push(chunk);
        }
    }

    let mut seen_edges = HashSet::new();
    let relationships = traversal
        .relationships
        .iter()
        .filter(|edge| seen_edges.insert(edge.id.as_str()))
        .cloned()
        .collect();

    Deduplicated {
        chunks,
        relationships,
    }
}

pub fn format_hybrid(deduped: &Deduplicated) -> Result<ContextDocument> {
    ContextDocument::hybrid(
        deduped.chunks.iter().map(|c| c.text.clone()).collect(),
        deduped.relationships.iter().map(format_relationship).collect(),
    )
}

pub fn format_text_only(seeds: &[ScoredChunk]) -> Result<ContextDocument> {
    ContextDocument::text_only(seeds.iter().map(|s| s.text.clone()).collect())
}
