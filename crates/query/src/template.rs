use crate::error::{RagError, Result};

pub const QUERY_SLOT: &str = "{query_text}";
pub const CONTEXT_SLOT: &str = "{context}";

pub const DEFAULT_TEMPLATE: &str = "Answer the Question using the following Context. \
Only respond with information mentioned in the Context. \
Do not inject any speculative information not mentioned. \
If the Context does not contain the information needed to answer, \
say that you cannot find grounded information to answer the Question.

# Question:
{query_text}

# Context:
{context}

# Answer:
";

/// Prompt template with exactly one query slot and one context slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RagTemplate {
    template: String,
}

impl RagTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        for slot in [QUERY_SLOT, CONTEXT_SLOT] {
            let count = template.matches(slot).count();
            if count != 1 {
                return Err(RagError::InvalidRequest(format!(
                    "template must contain {} exactly once, found {}",
                    slot, count
                )));
            }
        }
        Ok(Self { template })
    }

    /// Fill both slots in a single pass, so slot markers inside the query
    /// or the context are copied through untouched.
    pub fn format(&self, query_text: &str, context: &str) -> String {
        let mut out = String::with_capacity(self.template.len() + query_text.len() + context.len());
        let mut rest = self.template.as_str();

        while let Some(pos) = rest.find('{') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            if let Some(after) = tail.strip_prefix(QUERY_SLOT) {
                out.push_str(query_text);
                rest = after;
            } else if let Some(after) = tail.strip_prefix(CONTEXT_SLOT) {
                out.push_str(context);
                rest = after;
            } else {
                out.push('{');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        out
    }
}

impl Default for RagTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_template_is_valid() {
        assert!(RagTemplate::new(DEFAULT_TEMPLATE).is_ok());
        assert!(DEFAULT_TEMPLATE.contains("Only respond with information mentioned in the Context"));
    }

    #[test]
    fn embeds_query_and_context_verbatim() {
        let prompt = RagTemplate::default().format("What treats SLE?", "=== text ===\nHCQ treats SLE.");
        assert!(prompt.contains("# Question:\nWhat treats SLE?\n"));
        assert!(prompt.contains("# Context:\n=== text ===\nHCQ treats SLE.\n"));
    }

    #[test]
    fn slot_markers_in_inputs_are_not_expanded() {
        let template = RagTemplate::new("Q={query_text} C={context}").unwrap();
        assert_eq!(template.format("{context}", "{x}"), "Q={context} C={x}");
    }

    #[test]
    fn rejects_missing_or_repeated_slots() {
        assert!(RagTemplate::new("no slots here").is_err());
        assert!(RagTemplate::new("{query_text} {context} {context}").is_err());
        assert!(RagTemplate::new("{query_text} only").is_err());
    }
}
