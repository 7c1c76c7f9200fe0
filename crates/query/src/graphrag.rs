use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::answer::GroundedAnswerGenerator;
use crate::error::Result;
use crate::retriever::{Retriever, RetrieverConfig, RetrieverResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagResult {
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retriever_result: Option<RetrieverResult>,
}

/// One retrieval mode wired to the answer generator.
#[derive(Clone)]
pub struct GraphRag {
    retriever: Arc<dyn Retriever>,
    answerer: GroundedAnswerGenerator,
}

impl GraphRag {
    pub fn new(retriever: Arc<dyn Retriever>, answerer: GroundedAnswerGenerator) -> Self {
        Self { retriever, answerer }
    }

    pub fn mode(&self) -> &'static str {
        self.retriever.name()
    }

    /// Retrieve, then answer. The generator only ever sees a complete
    /// Context Document; an empty one is passed through as is.
    #[instrument(skip(self, query_text), fields(mode = self.retriever.name()))]
    pub async fn search(
        &self,
        query_text: &str,
        config: &RetrieverConfig,
        return_context: bool,
    ) -> Result<RagResult> {
        let retrieved = self.retriever.search(query_text, config).await?;
        let answer = self.answerer.answer(query_text, &retrieved.context).await?;

        info!(
            top_k = config.top_k,
            chunks = retrieved.metadata.chunk_count,
            relationships = retrieved.metadata.relationship_count,
            "Query answered"
        );

        Ok(RagResult {
            answer,
            retriever_result: return_context.then_some(retrieved),
        })
    }
}
