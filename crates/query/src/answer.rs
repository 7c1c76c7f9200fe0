use std::sync::Arc;
use tracing::{debug, warn};

use crate::context::ContextDocument;
use crate::error::{RagError, Result};
use crate::llm::Generator;
use crate::template::RagTemplate;

/// Turns a query and its Context Document into an answer. Grounding is
/// requested through the template only; answers are not checked against
/// the context.
#[derive(Clone)]
pub struct GroundedAnswerGenerator {
    generator: Arc<dyn Generator>,
    template: RagTemplate,
}

impl GroundedAnswerGenerator {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self {
            generator,
            template: RagTemplate::default(),
        }
    }

    pub fn with_template(mut self, template: RagTemplate) -> Self {
        self.template = template;
        self
    }

    pub async fn answer(&self, query_text: &str, context: &ContextDocument) -> Result<String> {
        let prompt = self.template.format(query_text, &context.render());
        debug!(prompt_len = prompt.len(), empty_context = context.is_empty(), "Generating answer");

        let answer = self.generator
            .generate(&prompt)
            .await
            .map_err(RagError::GenerationFailed)?;

        let answer = answer.trim();
        if answer.is_empty() {
            warn!("Generator returned an empty answer");
            return Err(RagError::GenerationFailed(anyhow::anyhow!("generator returned an empty answer")));
        }

        Ok(answer.to_string())
    }
}
