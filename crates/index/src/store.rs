use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityFunction {
    Cosine,
    Euclidean,
}

impl SimilarityFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimilarityFunction::Cosine => "cosine",
            SimilarityFunction::Euclidean => "euclidean",
        }
    }

    /// Score in `[0, 1]`, higher is more similar
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            SimilarityFunction::Cosine => {
                let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
                let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

                if mag_a == 0.0 || mag_b == 0.0 {
                    0.0
                } else {
                    // Neo4j maps cosine from [-1, 1] onto [0, 1]
                    (1.0 + dot / (mag_a * mag_b)) / 2.0
                }
            }
            SimilarityFunction::Euclidean => {
                let dist_sq: f32 = a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum();
                1.0 / (1.0 + dist_sq)
            }
        }
    }
}

/// Identity of the chunk vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndexConfig {
    pub name: String,
    pub label: String,
    pub embedding_property: String,
    pub dimensions: usize,
    pub similarity: SimilarityFunction,
    /// Node properties copied into each hit
    pub return_properties: Vec<String>,
    /// Hits scoring below this are dropped
    pub min_score: Option<f32>,
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            name: "text_embeddings".to_string(),
            label: extract::CHUNK_LABEL.to_string(),
            embedding_property: "embedding".to_string(),
            dimensions: 1536,
            similarity: SimilarityFunction::Cosine,
            return_properties: vec!["text".to_string()],
            min_score: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexHit {
    pub node_id: String,
    pub score: f32,
    pub properties: Map<String, Value>,
}

impl IndexHit {
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(|v| v.as_str())
    }
}

#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    /// Nearest `top_k` nodes carrying `label`, best first
    async fn search(&self, embedding: &[f32], label: &str, top_k: usize) -> Result<Vec<IndexHit>>;

    /// Number of nodes with an indexed embedding
    async fn indexed_count(&self) -> Result<usize>;
}

/// Inclusive hop bounds, counted over non-provenance edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopRange {
    min: usize,
    max: usize,
}

impl HopRange {
    pub fn new(min: usize, max: usize) -> Result<Self> {
        if min == 0 {
            anyhow::bail!("hop range must start at 1 or more");
        }
        if min > max {
            anyhow::bail!("hop range {}..={} is empty", min, max);
        }
        Ok(Self { min, max })
    }

    pub fn up_to(max: usize) -> Result<Self> {
        Self::new(1, max)
    }

    pub fn min(&self) -> usize {
        self.min
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn contains(&self, hops: usize) -> bool {
        hops >= self.min && hops <= self.max
    }
}

impl Default for HopRange {
    fn default() -> Self {
        Self { min: 1, max: 2 }
    }
}

/// Paths a single traversal may emit before it is abandoned
pub const DEFAULT_MAX_PATHS: usize = 10_000;

/// Parameterized traversal: start at the seed chunks, step to the entities
/// extracted from them over the provenance edge, then walk `hops` edges of
/// any type not excluded, in either direction.
#[derive(Debug, Clone, PartialEq)]
pub struct TraversalSpec {
    pub seed_ids: Vec<String>,
    pub provenance_type: String,
    pub excluded_types: Vec<String>,
    pub hops: HopRange,
    /// Upper bound on emitted paths across all seeds
    pub max_paths: usize,
}

impl TraversalSpec {
    pub fn new(seed_ids: Vec<String>, hops: HopRange) -> Self {
        Self {
            seed_ids,
            provenance_type: extract::PROVENANCE_REL_TYPE.to_string(),
            excluded_types: vec![extract::PROVENANCE_REL_TYPE.to_string()],
            hops,
            max_paths: DEFAULT_MAX_PATHS,
        }
    }

    pub fn is_excluded(&self, rel_type: &str) -> bool {
        rel_type == self.provenance_type || self.excluded_types.iter().any(|t| t == rel_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub id: String,
    pub rel_type: String,
    pub source_name: String,
    pub target_name: String,
    pub details: Option<String>,
}

/// Everything touched by a traversal, in encounter order. May repeat
/// chunks and edges reached over several paths.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraversalResult {
    pub chunks: Vec<ChunkRecord>,
    pub relationships: Vec<EdgeRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub chunk_count: usize,
    pub relationship_count: usize,
}

#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn traverse(&self, spec: &TraversalSpec) -> Result<TraversalResult>;

    async fn stats(&self) -> Result<GraphStats>;

    /// Cheap liveness check for health reporting
    async fn ping(&self) -> Result<()> {
        self.stats().await.map(|_| ())
    }
}
