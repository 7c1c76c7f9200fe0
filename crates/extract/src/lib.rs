pub mod parse;
pub mod schema;
pub mod validate;
pub mod vocabulary;

pub use parse::parse_graph_document;
pub use schema::{ExtractedChunk, GraphDocument, GraphNode, GraphRelationship};
pub use validate::{SchemaViolation, Violation, validate};
pub use vocabulary::LabelVocabulary;

/// Relationship type linking an entity to the chunk it was extracted from
pub const PROVENANCE_REL_TYPE: &str = "FROM_CHUNK";

/// Node label carried by text chunks
pub const CHUNK_LABEL: &str = "Chunk";
