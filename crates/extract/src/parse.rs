use anyhow::{Context, Result};
use regex::Regex;
use std::sync::OnceLock;

use crate::schema::GraphDocument;

fn fence_pattern() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)^\s*```(?:json)?\s*(.*?)\s*```\s*$").expect("fence pattern is valid")
    })
}

/// Parse construction-pipeline output into a graph document.
///
/// Only a JSON object is accepted, optionally wrapped in a markdown code
/// fence. Blank output and `{}` both yield an empty document.
pub fn parse_graph_document(raw: &str) -> Result<GraphDocument> {
    let body = match fence_pattern().captures(raw) {
        Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or_default(),
        None => raw.trim(),
    };

    if body.is_empty() {
        return Ok(GraphDocument::default());
    }

    let value: serde_json::Value =
        serde_json::from_str(body).context("Construction output is not valid JSON")?;

    if !value.is_object() {
        anyhow::bail!("Construction output must be a JSON object");
    }

    serde_json::from_value(value).context("Construction output does not match the graph schema")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nodes_and_relationships() {
        let raw = r#"{"nodes": [
            {"id": "0", "label": "Disease", "properties": {"name": "SLE"}},
            {"id": "1", "label": "Drug", "properties": {"name": "Hydroxychloroquine"}}
          ],
          "relationships": [
            {"type": "TREATS", "start_node_id": "1", "end_node_id": "0",
             "properties": {"details": "first-line therapy"}}
          ]}"#;

        let doc = parse_graph_document(raw).unwrap();
        assert_eq!(doc.nodes.len(), 2);
        assert_eq!(doc.nodes[0].name(), Some("SLE"));
        assert_eq!(doc.relationships[0].rel_type, "TREATS");
        assert_eq!(doc.relationships[0].details(), Some("first-line therapy"));
    }

    #[test]
    fn empty_object_and_blank_output_are_empty_documents() {
        assert!(parse_graph_document("{}").unwrap().is_empty());
        assert!(parse_graph_document("   ").unwrap().is_empty());
    }

    #[test]
    fn strips_markdown_fence() {
        let raw = "```json\n{\"nodes\": [], \"relationships\": []}\n```";
        assert!(parse_graph_document(raw).unwrap().is_empty());
    }

    #[test]
    fn rejects_python_literals_and_non_objects() {
        assert!(parse_graph_document("{'nodes': []}").is_err());
        assert!(parse_graph_document("[1, 2, 3]").is_err());
        assert!(parse_graph_document(r#"{"entities": []}"#).is_err());
    }
}
