use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::store::{
    ChunkRecord, EdgeRecord, GraphStats, GraphStore, IndexHit, SimilarityIndex, TraversalResult,
    TraversalSpec, VectorIndexConfig,
};

#[derive(Debug, Clone)]
pub struct MemoryNode {
    pub id: String,
    pub labels: Vec<String>,
    pub properties: Map<String, Value>,
    pub embedding: Option<Vec<f32>>,
}

impl MemoryNode {
    fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    fn display_name(&self) -> String {
        self.properties
            .get("name")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| self.id.clone())
    }
}

#[derive(Debug, Clone)]
pub struct MemoryEdge {
    pub id: String,
    pub rel_type: String,
    pub start: usize,
    pub end: usize,
    pub properties: Map<String, Value>,
}

/// In-process property graph with a brute-force vector index over chunk
/// nodes. Iteration follows insertion order, so results are deterministic.
pub struct MemoryGraph {
    config: VectorIndexConfig,
    nodes: Vec<MemoryNode>,
    node_index: HashMap<String, usize>,
    edges: Vec<MemoryEdge>,
    adjacency: Vec<Vec<usize>>,
    entity_keys: HashMap<(String, String), usize>,
}

impl MemoryGraph {
    pub fn new(config: VectorIndexConfig) -> Self {
        Self {
            config,
            nodes: Vec::new(),
            node_index: HashMap::new(),
            edges: Vec::new(),
            adjacency: Vec::new(),
            entity_keys: HashMap::new(),
        }
    }

    /// Insert a node, or return the existing one with the same id
    pub fn add_node(
        &mut self,
        id: String,
        labels: Vec<String>,
        properties: Map<String, Value>,
        embedding: Option<Vec<f32>>,
    ) -> usize {
        if let Some(&idx) = self.node_index.get(&id) {
            return idx;
        }

        let idx = self.nodes.len();
        self.node_index.insert(id.clone(), idx);
        self.nodes.push(MemoryNode {
            id,
            labels,
            properties,
            embedding,
        });
        self.adjacency.push(Vec::new());
        idx
    }

    pub fn add_chunk(&mut self, chunk: &ingest::Chunk) -> usize {
        let mut properties = Map::new();
        properties.insert("text".to_string(), Value::String(chunk.text.clone()));
        properties.insert("doc_id".to_string(), Value::String(chunk.doc_id.clone()));
        properties.insert("source".to_string(), Value::String(chunk.source.clone()));
        properties.insert("index".to_string(), Value::from(chunk.index));

        self.add_node(
            chunk.chunk_id.clone(),
            vec![self.config.label.clone()],
            properties,
            chunk.embedding.clone(),
        )
    }

    /// Add a directed edge between two existing nodes
    pub fn add_relationship(
        &mut self,
        rel_type: &str,
        start_id: &str,
        end_id: &str,
        properties: Map<String, Value>,
    ) -> Result<String> {
        let start = *self.node_index
            .get(start_id)
            .with_context(|| format!("Unknown start node {}", start_id))?;
        let end = *self.node_index
            .get(end_id)
            .with_context(|| format!("Unknown end node {}", end_id))?;

        let idx = self.edges.len();
        let id = format!("r{}", idx);
        self.edges.push(MemoryEdge {
            id: id.clone(),
            rel_type: rel_type.to_string(),
            start,
            end,
            properties,
        });
        self.adjacency[start].push(idx);
        if start != end {
            self.adjacency[end].push(idx);
        }
        Ok(id)
    }

    /// Merge one chunk's construction output into the graph.
    ///
    /// Entities are resolved across chunks by label and case-insensitive
    /// name; unnamed entities stay local to their chunk. Each entity gets a
    /// provenance edge to the chunk.
    pub fn add_extraction(&mut self, extracted: &extract::ExtractedChunk) -> Result<()> {
        if !self.node_index.contains_key(&extracted.chunk_id) {
            anyhow::bail!("Extraction references unknown chunk {}", extracted.chunk_id);
        }

        let mut local_ids: HashMap<&str, String> = HashMap::new();

        for node in &extracted.graph.nodes {
            let global_id = match node.name() {
                Some(name) => {
                    let key = (node.label.clone(), name.trim().to_lowercase());
                    let existing = self.entity_keys.get(&key).copied();
                    match existing {
                        Some(idx) => self.nodes[idx].id.clone(),
                        None => {
                            let id = format!("{}:{}", extracted.chunk_id, node.id);
                            let idx = self.add_node(
                                id.clone(),
                                vec![node.label.clone()],
                                node.properties.clone(),
                                None,
                            );
                            self.entity_keys.insert(key, idx);
                            id
                        }
                    }
                }
                None => {
                    let id = format!("{}:{}", extracted.chunk_id, node.id);
                    self.add_node(id.clone(), vec![node.label.clone()], node.properties.clone(), None);
                    id
                }
            };

            self.add_relationship(
                extract::PROVENANCE_REL_TYPE,
                &global_id,
                &extracted.chunk_id,
                Map::new(),
            )?;
            local_ids.insert(node.id.as_str(), global_id);
        }

        for rel in &extracted.graph.relationships {
            let start = local_ids
                .get(rel.start_node_id.as_str())
                .with_context(|| format!("Dangling start node {}", rel.start_node_id))?;
            let end = local_ids
                .get(rel.end_node_id.as_str())
                .with_context(|| format!("Dangling end node {}", rel.end_node_id))?;
            let (start, end) = (start.clone(), end.clone());

            self.add_relationship(&rel.rel_type, &start, &end, rel.properties.clone())?;
        }

        Ok(())
    }

    fn edge_record(&self, edge: &MemoryEdge) -> EdgeRecord {
        EdgeRecord {
            id: edge.id.clone(),
            rel_type: edge.rel_type.clone(),
            source_name: self.nodes[edge.start].display_name(),
            target_name: self.nodes[edge.end].display_name(),
            details: edge
                .properties
                .get("details")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
        }
    }

    fn chunk_record(&self, idx: usize) -> ChunkRecord {
        let node = &self.nodes[idx];
        ChunkRecord {
            id: node.id.clone(),
            text: node
                .properties
                .get("text")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
        }
    }

    /// Depth-first walk emitting every path whose length falls in the hop
    /// range. An edge is used at most once per path. Fails once more than
    /// `spec.max_paths` paths have been emitted.
    fn walk(
        &self,
        spec: &TraversalSpec,
        seed: usize,
        node: usize,
        path: &mut Vec<usize>,
        emitted: &mut usize,
        out: &mut TraversalResult,
    ) -> Result<()> {
        for &edge_idx in &self.adjacency[node] {
            let edge = &self.edges[edge_idx];
            if spec.is_excluded(&edge.rel_type) || path.contains(&edge_idx) {
                continue;
            }
            let next = if edge.start == node { edge.end } else { edge.start };

            path.push(edge_idx);
            if spec.hops.contains(path.len()) {
                *emitted += 1;
                if *emitted > spec.max_paths {
                    anyhow::bail!(
                        "Traversal exceeded {} paths within {} hops",
                        spec.max_paths,
                        spec.hops.max()
                    );
                }
                self.emit_path(seed, path, out);
            }
            if path.len() < spec.hops.max() {
                self.walk(spec, seed, next, path, emitted, out)?;
            }
            path.pop();
        }
        Ok(())
    }

    fn emit_path(&self, seed: usize, path: &[usize], out: &mut TraversalResult) {
        for &edge_idx in path {
            let edge = &self.edges[edge_idx];
            for endpoint in [edge.start, edge.end] {
                if endpoint != seed && self.nodes[endpoint].has_label(&self.config.label) {
                    out.chunks.push(self.chunk_record(endpoint));
                }
            }
        }
        out.relationships
            .extend(path.iter().map(|&edge_idx| self.edge_record(&self.edges[edge_idx])));
    }
}

#[async_trait]
impl SimilarityIndex for MemoryGraph {
    async fn search(&self, embedding: &[f32], label: &str, top_k: usize) -> Result<Vec<IndexHit>> {
        if embedding.len() != self.config.dimensions {
            anyhow::bail!(
                "Query embedding has {} dimensions, index {} expects {}",
                embedding.len(),
                self.config.name,
                self.config.dimensions
            );
        }

        let mut hits: Vec<IndexHit> = self.nodes
            .iter()
            .filter(|n| n.has_label(label))
            .filter_map(|n| n.embedding.as_ref().map(|e| (n, e)))
            .map(|(node, node_embedding)| {
                let properties = self.config.return_properties
                    .iter()
                    .filter_map(|p| node.properties.get(p).map(|v| (p.clone(), v.clone())))
                    .collect();
                IndexHit {
                    node_id: node.id.clone(),
                    score: self.config.similarity.score(embedding, node_embedding),
                    properties,
                }
            })
            .filter(|hit| self.config.min_score.is_none_or(|floor| hit.score >= floor))
            .collect();

        // Stable sort keeps insertion order among equal scores
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);

        Ok(hits)
    }

    async fn indexed_count(&self) -> Result<usize> {
        Ok(self.nodes
            .iter()
            .filter(|n| n.has_label(&self.config.label) && n.embedding.is_some())
            .count())
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn traverse(&self, spec: &TraversalSpec) -> Result<TraversalResult> {
        let mut out = TraversalResult::default();
        let mut emitted = 0;

        for seed_id in &spec.seed_ids {
            let Some(&seed) = self.node_index.get(seed_id) else {
                continue;
            };
            out.chunks.push(self.chunk_record(seed));

            for &edge_idx in &self.adjacency[seed] {
                let edge = &self.edges[edge_idx];
                if edge.rel_type != spec.provenance_type || edge.end != seed {
                    continue;
                }
                let mut path = Vec::new();
                self.walk(spec, seed, edge.start, &mut path, &mut emitted, &mut out)?;
            }
        }

        Ok(out)
    }

    async fn stats(&self) -> Result<GraphStats> {
        Ok(GraphStats {
            node_count: self.nodes.len(),
            chunk_count: self.nodes
                .iter()
                .filter(|n| n.has_label(&self.config.label))
                .count(),
            relationship_count: self.edges.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::HopRange;
    use extract::{ExtractedChunk, parse_graph_document};

    fn config(dimensions: usize) -> VectorIndexConfig {
        VectorIndexConfig {
            dimensions,
            ..VectorIndexConfig::default()
        }
    }

    fn chunk(id: &str, text: &str, embedding: Vec<f32>) -> ingest::Chunk {
        let mut chunk = ingest::Chunk::new("doc".into(), text.into(), "paper.pdf".into(), 0, (0, text.len()), 0)
            .with_embedding(embedding);
        chunk.chunk_id = id.to_string();
        chunk
    }

    fn extraction(chunk_id: &str, json: &str) -> ExtractedChunk {
        ExtractedChunk {
            chunk_id: chunk_id.to_string(),
            doc_id: "doc".to_string(),
            graph: parse_graph_document(json).unwrap(),
        }
    }

    /// SLE -[HAS_SYMPTOM]-> Rash -[ASSOCIATED_WITH]-> UV exposure -[CAUSES]-> Flare
    fn chain_graph() -> MemoryGraph {
        let mut graph = MemoryGraph::new(config(2));
        graph.add_chunk(&chunk("c1", "SLE causes rashes.", vec![1.0, 0.0]));
        graph
            .add_extraction(&extraction(
                "c1",
                r#"{"nodes": [
                    {"id": "0", "label": "Disease", "properties": {"name": "SLE"}},
                    {"id": "1", "label": "EffectOrPhenotype", "properties": {"name": "Rash"}},
                    {"id": "2", "label": "Exposure", "properties": {"name": "UV exposure"}},
                    {"id": "3", "label": "Condition", "properties": {"name": "Flare"}}],
                   "relationships": [
                    {"type": "HAS_SYMPTOM", "start_node_id": "0", "end_node_id": "1"},
                    {"type": "ASSOCIATED_WITH", "start_node_id": "1", "end_node_id": "2"},
                    {"type": "CAUSES", "start_node_id": "2", "end_node_id": "3"}]}"#,
            ))
            .unwrap();
        graph
    }

    fn rel_types(result: &TraversalResult) -> Vec<&str> {
        result.relationships.iter().map(|r| r.rel_type.as_str()).collect()
    }

    #[tokio::test]
    async fn search_orders_by_score_and_respects_top_k() {
        let mut graph = MemoryGraph::new(config(2));
        graph.add_chunk(&chunk("a", "text A", vec![1.0, 0.0]));
        graph.add_chunk(&chunk("b", "text B", vec![0.0, 1.0]));
        graph.add_chunk(&chunk("c", "text C", vec![0.7, 0.7]));

        let hits = graph.search(&[1.0, 0.1], "Chunk", 2).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.node_id.as_str()).collect();

        assert_eq!(ids, vec!["a", "c"]);
        assert!(hits[0].score >= hits[1].score);
        assert_eq!(hits[0].property("text"), Some("text A"));
    }

    #[tokio::test]
    async fn equal_scores_keep_insertion_order() {
        let mut graph = MemoryGraph::new(config(2));
        graph.add_chunk(&chunk("first", "x", vec![1.0, 0.0]));
        graph.add_chunk(&chunk("second", "y", vec![1.0, 0.0]));

        let hits = graph.search(&[1.0, 0.0], "Chunk", 5).await.unwrap();
        assert_eq!(hits[0].node_id, "first");
        assert_eq!(hits[1].node_id, "second");
    }

    #[tokio::test]
    async fn relevance_floor_filters_hits() {
        let mut graph = MemoryGraph::new(VectorIndexConfig {
            min_score: Some(0.9),
            ..config(2)
        });
        graph.add_chunk(&chunk("a", "text A", vec![0.0, 1.0]));

        let hits = graph.search(&[1.0, 0.0], "Chunk", 5).await.unwrap();
        assert!(hits.is_empty());
        assert_eq!(graph.indexed_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn dimension_mismatch_is_an_error() {
        let graph = MemoryGraph::new(config(3));
        assert!(graph.search(&[1.0, 0.0], "Chunk", 5).await.is_err());
    }

    #[tokio::test]
    async fn traversal_respects_inclusive_hop_range() {
        let graph = chain_graph();

        let one = graph
            .traverse(&TraversalSpec::new(vec!["c1".into()], HopRange::up_to(1).unwrap()))
            .await
            .unwrap();
        // Every extracted entity is one provenance step from the chunk
        assert!(rel_types(&one).contains(&"HAS_SYMPTOM"));
        assert!(rel_types(&one).contains(&"CAUSES"));

        let two = graph
            .traverse(&TraversalSpec::new(vec!["c1".into()], HopRange::up_to(2).unwrap()))
            .await
            .unwrap();
        assert!(two.relationships.len() > one.relationships.len());
        assert!(!rel_types(&two).contains(&"FROM_CHUNK"));
    }

    #[tokio::test]
    async fn hop_bound_limits_reach_from_a_single_entity() {
        let mut graph = MemoryGraph::new(config(2));
        graph.add_chunk(&chunk("c1", "Hydroxychloroquine.", vec![1.0, 0.0]));
        graph.add_chunk(&chunk("c2", "Other paper.", vec![0.0, 1.0]));
        graph
            .add_extraction(&extraction(
                "c1",
                r#"{"nodes": [{"id": "0", "label": "Drug", "properties": {"name": "HCQ"}}]}"#,
            ))
            .unwrap();
        graph
            .add_extraction(&extraction(
                "c2",
                r#"{"nodes": [
                    {"id": "0", "label": "Drug", "properties": {"name": "hcq"}},
                    {"id": "1", "label": "Disease", "properties": {"name": "SLE"}},
                    {"id": "2", "label": "GeneOrProtein", "properties": {"name": "IFN"}}],
                   "relationships": [
                    {"type": "TREATS", "start_node_id": "0", "end_node_id": "1"},
                    {"type": "ASSOCIATED_WITH", "start_node_id": "1", "end_node_id": "2"}]}"#,
            ))
            .unwrap();

        let one = graph
            .traverse(&TraversalSpec::new(vec!["c1".into()], HopRange::up_to(1).unwrap()))
            .await
            .unwrap();
        assert_eq!(rel_types(&one), vec!["TREATS"]);

        let two = graph
            .traverse(&TraversalSpec::new(vec!["c1".into()], HopRange::up_to(2).unwrap()))
            .await
            .unwrap();
        assert!(rel_types(&two).contains(&"ASSOCIATED_WITH"));
        assert_eq!(two.relationships[0].source_name, "HCQ");
        assert_eq!(two.relationships[0].target_name, "SLE");
    }

    #[tokio::test]
    async fn seed_without_entities_is_still_reported() {
        let mut graph = MemoryGraph::new(config(2));
        graph.add_chunk(&chunk("lonely", "No entities here.", vec![1.0, 0.0]));

        let result = graph
            .traverse(&TraversalSpec::new(vec!["lonely".into()], HopRange::default()))
            .await
            .unwrap();
        assert_eq!(result.chunks.len(), 1);
        assert!(result.relationships.is_empty());
    }

    /// Seven entities from one chunk, every pair related
    fn clique_graph() -> MemoryGraph {
        let mut graph = MemoryGraph::new(config(2));
        graph.add_chunk(&chunk("c1", "Everything interacts.", vec![1.0, 0.0]));
        let nodes: Vec<String> = (0..7)
            .map(|i| format!(r#"{{"id": "{i}", "label": "Drug", "properties": {{"name": "D{i}"}}}}"#))
            .collect();
        let mut rels = Vec::new();
        for a in 0..7 {
            for b in (a + 1)..7 {
                rels.push(format!(
                    r#"{{"type": "INTERACTS_WITH", "start_node_id": "{a}", "end_node_id": "{b}"}}"#
                ));
            }
        }
        let json = format!(r#"{{"nodes": [{}], "relationships": [{}]}}"#, nodes.join(","), rels.join(","));
        graph.add_extraction(&extraction("c1", &json)).unwrap();
        graph
    }

    #[tokio::test]
    async fn path_budget_stops_runaway_traversal() {
        let graph = clique_graph();
        let spec = |max_hops| TraversalSpec {
            max_paths: 50,
            ..TraversalSpec::new(vec!["c1".into()], HopRange::up_to(max_hops).unwrap())
        };

        // 7 entities x 6 neighbours
        let one = graph.traverse(&spec(1)).await.unwrap();
        assert_eq!(one.relationships.len(), 42);

        let err = graph.traverse(&spec(6)).await.unwrap_err();
        assert!(err.to_string().contains("exceeded 50 paths"));
    }

    #[test]
    fn dangling_relationship_is_rejected() {
        let mut graph = MemoryGraph::new(config(2));
        graph.add_chunk(&chunk("c1", "text", vec![1.0, 0.0]));

        let err = graph.add_extraction(&extraction(
            "c1",
            r#"{"nodes": [{"id": "0", "label": "Drug", "properties": {"name": "HCQ"}}],
               "relationships": [{"type": "TREATS", "start_node_id": "0", "end_node_id": "9"}]}"#,
        ));
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn stats_count_nodes_chunks_and_edges() {
        let graph = chain_graph();
        let stats = graph.stats().await.unwrap();

        assert_eq!(stats.chunk_count, 1);
        assert_eq!(stats.node_count, 5);
        // 4 provenance edges + 3 entity relationships
        assert_eq!(stats.relationship_count, 7);
    }
}
