pub mod answer;
pub mod assembler;
pub mod context;
pub mod error;
pub mod graphrag;
pub mod hybrid;
pub mod llm;
pub mod retriever;
pub mod template;

pub use answer::GroundedAnswerGenerator;
pub use context::{ContextDocument, split_sections};
pub use error::{RagError, Result, Stage};
pub use graphrag::{GraphRag, RagResult};
pub use hybrid::{DEFAULT_MAX_HOPS_LIMIT, HybridRetriever};
pub use llm::{Generator, QueryLLM};
pub use retriever::{
    RetrievalItem, RetrievalMetadata, Retriever, RetrieverConfig, RetrieverResult, ScoredChunk,
    VectorRetriever,
};
pub use template::RagTemplate;

#[cfg(test)]
pub(crate) mod testing {
    use anyhow::Result;
    use async_trait::async_trait;
    use extract::{ExtractedChunk, parse_graph_document};
    use index::{
        Embedder, GraphStats, GraphStore, IndexHit, MemoryGraph, SimilarityIndex, TraversalResult,
        TraversalSpec, VectorIndexConfig,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use crate::llm::Generator;

    /// Always embeds to the same 2-dim vector
    pub struct FakeEmbedder {
        fail: bool,
        calls: AtomicUsize,
    }

    impl FakeEmbedder {
        pub fn new() -> Self {
            Self { fail: false, calls: AtomicUsize::new(0) }
        }

        pub fn failing() -> Self {
            Self { fail: true, calls: AtomicUsize::new(0) }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Embedder for FakeEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("embedding service unreachable");
            }
            Ok(vec![1.0, 0.0])
        }
    }

    pub struct FailingIndex;

    #[async_trait]
    impl SimilarityIndex for FailingIndex {
        async fn search(&self, _embedding: &[f32], _label: &str, _top_k: usize) -> Result<Vec<IndexHit>> {
            anyhow::bail!("vector index offline")
        }

        async fn indexed_count(&self) -> Result<usize> {
            anyhow::bail!("vector index offline")
        }
    }

    /// Counts traversals, delegating to a graph when one is given
    pub struct CountingStore {
        inner: Option<Arc<MemoryGraph>>,
        traversals: AtomicUsize,
    }

    impl CountingStore {
        pub fn new(inner: Arc<MemoryGraph>) -> Self {
            Self { inner: Some(inner), traversals: AtomicUsize::new(0) }
        }

        pub fn failing() -> Self {
            Self { inner: None, traversals: AtomicUsize::new(0) }
        }

        pub fn traversals(&self) -> usize {
            self.traversals.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GraphStore for CountingStore {
        async fn traverse(&self, spec: &TraversalSpec) -> Result<TraversalResult> {
            self.traversals.fetch_add(1, Ordering::SeqCst);
            match &self.inner {
                Some(graph) => graph.traverse(spec).await,
                None => anyhow::bail!("graph store offline"),
            }
        }

        async fn stats(&self) -> Result<GraphStats> {
            match &self.inner {
                Some(graph) => graph.stats().await,
                None => anyhow::bail!("graph store offline"),
            }
        }
    }

    pub struct RecordingGenerator {
        reply: Option<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl RecordingGenerator {
        pub fn replying(reply: &str) -> Self {
            Self { reply: Some(reply.to_string()), prompts: Mutex::new(Vec::new()) }
        }

        pub fn failing() -> Self {
            Self { reply: None, prompts: Mutex::new(Vec::new()) }
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Generator for RecordingGenerator {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone().ok_or_else(|| anyhow::anyhow!("model returned status 500"))
        }
    }

    pub fn index_config() -> VectorIndexConfig {
        VectorIndexConfig {
            dimensions: 2,
            ..VectorIndexConfig::default()
        }
    }

    fn chunk(id: &str, text: &str, embedding: Vec<f32>) -> ingest::Chunk {
        let mut chunk = ingest::Chunk::new("doc".into(), text.into(), "lupus.pdf".into(), 0, (0, text.len()), 0)
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

    /// Three chunks scored A > B > C against the fake query embedding.
    ///
    /// A and B both mention Lupus nephritis and Drug1, joined by a single
    /// TREATS edge. C links Anti-dsDNA to Lupus nephritis and Belimumab to
    /// Anti-dsDNA, two hops out from A's entities.
    pub fn sample_graph_with(config: VectorIndexConfig) -> MemoryGraph {
        let mut graph = MemoryGraph::new(config);
        graph.add_chunk(&chunk("A", "text A", vec![1.0, 0.0]));
        graph.add_chunk(&chunk("B", "text B", vec![0.8, 0.6]));
        graph.add_chunk(&chunk("C", "text C", vec![0.0, 1.0]));

        graph
            .add_extraction(&extraction(
                "A",
                r#"{"nodes": [
                    {"id": "0", "label": "Disease", "properties": {"name": "Lupus nephritis"}},
                    {"id": "1", "label": "Drug", "properties": {"name": "Drug1"}}],
                   "relationships": [
                    {"type": "TREATS", "start_node_id": "0", "end_node_id": "1"}]}"#,
            ))
            .unwrap();
        graph
            .add_extraction(&extraction(
                "B",
                r#"{"nodes": [
                    {"id": "0", "label": "Disease", "properties": {"name": "lupus nephritis"}},
                    {"id": "1", "label": "Drug", "properties": {"name": "Drug1"}}]}"#,
            ))
            .unwrap();
        graph
            .add_extraction(&extraction(
                "C",
                r#"{"nodes": [
                    {"id": "0", "label": "Disease", "properties": {"name": "Lupus nephritis"}},
                    {"id": "1", "label": "Molecule", "properties": {"name": "Anti-dsDNA"}},
                    {"id": "2", "label": "Drug", "properties": {"name": "Belimumab"}}],
                   "relationships": [
                    {"type": "BIOMARKER_FOR", "start_node_id": "1", "end_node_id": "0",
                     "properties": {"details": "elevated in active disease"}},
                    {"type": "INTERACTS_WITH", "start_node_id": "2", "end_node_id": "1"}]}"#,
            ))
            .unwrap();
        graph
    }

    pub fn sample_graph() -> (MemoryGraph, VectorIndexConfig) {
        let config = index_config();
        (sample_graph_with(config.clone()), config)
    }
}
