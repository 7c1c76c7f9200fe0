use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

/// Pipeline stage a failure originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Request,
    Embedding,
    SimilaritySearch,
    Traversal,
    Formatting,
    Generation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Request => "request",
            Stage::Embedding => "embedding",
            Stage::SimilaritySearch => "similarity search",
            Stage::Traversal => "traversal",
            Stage::Formatting => "formatting",
            Stage::Generation => "generation",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum RagError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Embedding service, vector index or graph store failed or is empty
    #[error("retrieval unavailable during {stage}: {source:#}")]
    RetrievalUnavailable {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },

    #[error("malformed context document during {stage}: {message}")]
    MalformedContext { stage: Stage, message: String },

    #[error("generation failed: {0:#}")]
    GenerationFailed(#[source] anyhow::Error),
}

impl RagError {
    pub fn unavailable(stage: Stage, source: anyhow::Error) -> Self {
        RagError::RetrievalUnavailable { stage, source }
    }

    pub fn stage(&self) -> Stage {
        match self {
            RagError::InvalidRequest(_) => Stage::Request,
            RagError::RetrievalUnavailable { stage, .. } => *stage,
            RagError::MalformedContext { stage, .. } => *stage,
            RagError::GenerationFailed(_) => Stage::Generation,
        }
    }
}
