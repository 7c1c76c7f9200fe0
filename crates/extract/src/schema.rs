use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A typed entity node emitted by the construction pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl GraphNode {
    pub fn name(&self) -> Option<&str> {
        self.properties.get("name").and_then(|v| v.as_str())
    }
}

/// A directed relationship between two nodes of the same document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphRelationship {
    #[serde(rename = "type")]
    pub rel_type: String,
    pub start_node_id: String,
    pub end_node_id: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl GraphRelationship {
    pub fn details(&self) -> Option<&str> {
        self.properties.get("details").and_then(|v| v.as_str())
    }
}

/// `{"nodes": [...], "relationships": [...]}`; `{}` is an empty document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GraphDocument {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub relationships: Vec<GraphRelationship>,
}

impl GraphDocument {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.relationships.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedChunk {
    pub chunk_id: String,
    pub doc_id: String,
    pub graph: GraphDocument,
}
