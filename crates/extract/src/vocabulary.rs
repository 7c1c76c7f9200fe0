use serde::{Deserialize, Serialize};

/// Allowed node labels and relationship types handed to the construction
/// pipeline. Retrieval assumes the graph respects it but never enforces it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabelVocabulary {
    pub node_labels: Vec<String>,
    pub relationship_types: Vec<String>,
}

const ACADEMIC_NODE_LABELS: &[&str] = &["ArticleOrPaper", "PublicationOrJournal"];

const MEDICAL_NODE_LABELS: &[&str] = &[
    "Anatomy",
    "BiologicalProcess",
    "Cell",
    "CellularComponent",
    "CellType",
    "Condition",
    "Disease",
    "Drug",
    "EffectOrPhenotype",
    "Exposure",
    "GeneOrProtein",
    "Molecule",
    "MolecularFunction",
    "Pathway",
];

const MEDICAL_RELATIONSHIP_TYPES: &[&str] = &[
    "ACTIVATES",
    "AFFECTS",
    "ASSESSES",
    "ASSOCIATED_WITH",
    "AUTHORED",
    "BIOMARKER_FOR",
    "CAUSES",
    "CITES",
    "CONTRIBUTES_TO",
    "DESCRIBES",
    "EXPRESSES",
    "HAS_REACTION",
    "HAS_SYMPTOM",
    "INCLUDES",
    "INTERACTS_WITH",
    "PRESCRIBED",
    "PRODUCES",
    "RECEIVED",
    "RESULTS_IN",
    "TREATS",
    "USED_FOR",
];

impl LabelVocabulary {
    pub fn new(node_labels: Vec<String>, relationship_types: Vec<String>) -> Self {
        Self {
            node_labels,
            relationship_types,
        }
    }

    /// Vocabulary used for the biomedical paper corpus
    pub fn medical() -> Self {
        let node_labels = ACADEMIC_NODE_LABELS
            .iter()
            .chain(MEDICAL_NODE_LABELS)
            .map(|s| s.to_string())
            .collect();
        let relationship_types = MEDICAL_RELATIONSHIP_TYPES
            .iter()
            .map(|s| s.to_string())
            .collect();

        Self::new(node_labels, relationship_types)
    }

    pub fn allows_label(&self, label: &str) -> bool {
        self.node_labels.iter().any(|l| l == label)
    }

    pub fn allows_relationship(&self, rel_type: &str) -> bool {
        self.relationship_types.iter().any(|t| t == rel_type)
    }
}

impl Default for LabelVocabulary {
    fn default() -> Self {
        Self::medical()
    }
}
