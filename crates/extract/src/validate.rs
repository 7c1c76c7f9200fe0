use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

use crate::schema::GraphDocument;
use crate::vocabulary::LabelVocabulary;

#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    UnknownLabel { node_id: String, label: String },
    UnknownRelationshipType { rel_type: String },
    DanglingEndpoint { rel_type: String, node_id: String },
    DuplicateNodeId { node_id: String },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::UnknownLabel { node_id, label } => {
                write!(f, "node {node_id} has unknown label {label}")
            }
            Violation::UnknownRelationshipType { rel_type } => {
                write!(f, "unknown relationship type {rel_type}")
            }
            Violation::DanglingEndpoint { rel_type, node_id } => {
                write!(f, "{rel_type} references missing node {node_id}")
            }
            Violation::DuplicateNodeId { node_id } => write!(f, "duplicate node id {node_id}"),
        }
    }
}

#[derive(Debug, Error)]
#[error("schema violation ({} issue(s)): {}", .violations.len(), first_violation(.violations))]
pub struct SchemaViolation {
    pub violations: Vec<Violation>,
}

fn first_violation(violations: &[Violation]) -> String {
    violations.first().map(|v| v.to_string()).unwrap_or_default()
}

/// Check a graph document against the vocabulary and its own identifiers.
pub fn validate(doc: &GraphDocument, vocab: &LabelVocabulary) -> Result<(), SchemaViolation> {
    let mut violations = Vec::new();
    let mut ids = HashSet::new();

    for node in &doc.nodes {
        if !ids.insert(node.id.as_str()) {
            violations.push(Violation::DuplicateNodeId {
                node_id: node.id.clone(),
            });
        }
        if !vocab.allows_label(&node.label) {
            violations.push(Violation::UnknownLabel {
                node_id: node.id.clone(),
                label: node.label.clone(),
            });
        }
    }

    for rel in &doc.relationships {
        if !vocab.allows_relationship(&rel.rel_type) {
            violations.push(Violation::UnknownRelationshipType {
                rel_type: rel.rel_type.clone(),
            });
        }
        for endpoint in [&rel.start_node_id, &rel.end_node_id] {
            if !ids.contains(endpoint.as_str()) {
                violations.push(Violation::DanglingEndpoint {
                    rel_type: rel.rel_type.clone(),
                    node_id: endpoint.clone(),
                });
            }
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(SchemaViolation { violations })
    }
}
