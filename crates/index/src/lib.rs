pub mod embeddings;
pub mod memory;
pub mod neo4j_index;
pub mod snapshot;
pub mod store;

pub use embeddings::{ApiProvider, EmbeddingClient, Embedder};
pub use memory::MemoryGraph;
pub use neo4j_index::Neo4jStore;
pub use snapshot::load_snapshot;
pub use store::{
    ChunkRecord, EdgeRecord, GraphStats, GraphStore, HopRange, IndexHit, SimilarityFunction,
    SimilarityIndex, TraversalResult, TraversalSpec, VectorIndexConfig,
};
