//! Context Document wire format.
//!
//! ```text
//! === text ===
//! <chunk text>
//! ---
//! <chunk text>
//!
//! === kg_rels ===
//! <source> - <TYPE>(<details>) -> <target>
//! ---
//! ...
//! ```
//!
//! Vector-only documents carry just the text section.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result, Stage};

pub const TEXT_HEADER: &str = "=== text ===";
pub const KG_RELS_HEADER: &str = "=== kg_rels ===";
pub const ENTRY_DELIMITER: &str = "\n---\n";

/// What consumers search for to split a rendered document in two
pub const KG_RELS_SEPARATOR: &str = "\n\n=== kg_rels ===\n";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextDocument {
    pub text: Vec<String>,
    /// `None` for vector-only retrieval
    pub relationships: Option<Vec<String>>,
}

impl ContextDocument {
    pub fn text_only(text: Vec<String>) -> Result<Self> {
        let doc = Self {
            text,
            relationships: None,
        };
        doc.check()?;
        Ok(doc)
    }

    pub fn hybrid(text: Vec<String>, relationships: Vec<String>) -> Result<Self> {
        let doc = Self {
            text,
            relationships: Some(relationships),
        };
        doc.check()?;
        Ok(doc)
    }

    pub fn empty_hybrid() -> Self {
        Self {
            text: Vec::new(),
            relationships: Some(Vec::new()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.relationships.as_ref().is_none_or(|r| r.is_empty())
    }

    /// Entries must be non-empty and free of section headers and entry
    /// delimiters, or the rendered document could not be split back into
    /// the same entries.
    fn check(&self) -> Result<()> {
        let entries = self.text.iter().chain(self.relationships.iter().flatten());
        for entry in entries {
            if entry.is_empty() {
                return Err(malformed("empty entry".to_string()));
            }
            if entry.contains(TEXT_HEADER) || entry.contains(KG_RELS_HEADER) {
                return Err(malformed(format!("entry contains a section header: {:.60}", entry)));
            }
            // A trailing "\n---" would fuse with the following delimiter
            if entry.contains(ENTRY_DELIMITER) || entry.ends_with(ENTRY_DELIMITER.trim_end_matches('\n')) {
                return Err(malformed(format!("entry contains an entry delimiter: {:.60}", entry)));
            }
        }
        Ok(())
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(TEXT_HEADER);
        out.push('\n');
        out.push_str(&self.text.join(ENTRY_DELIMITER));

        if let Some(relationships) = &self.relationships {
            out.push_str(KG_RELS_SEPARATOR);
            out.push_str(&relationships.join(ENTRY_DELIMITER));
        }

        out
    }

    /// Inverse of [`render`](Self::render) for every document the
    /// constructors accept.
    pub fn parse(rendered: &str) -> Result<Self> {
        let body = rendered
            .strip_prefix(TEXT_HEADER)
            .and_then(|rest| rest.strip_prefix('\n'))
            .ok_or_else(|| malformed(format!("document must start with {TEXT_HEADER}")))?;

        let (text_body, rels_body) = match body.find(KG_RELS_SEPARATOR) {
            Some(pos) => (&body[..pos], Some(&body[pos + KG_RELS_SEPARATOR.len()..])),
            None => (body, None),
        };

        if rels_body.is_some_and(|r| r.contains(KG_RELS_SEPARATOR)) {
            return Err(malformed(format!("{KG_RELS_HEADER} appears more than once")));
        }

        Ok(Self {
            text: split_entries(text_body),
            relationships: rels_body.map(split_entries),
        })
    }

    /// Entries of either section mentioning `needle`, case-insensitively
    pub fn entries_containing(&self, needle: &str) -> Vec<&str> {
        let needle = needle.to_lowercase();
        self.text
            .iter()
            .chain(self.relationships.iter().flatten())
            .filter(|entry| entry.to_lowercase().contains(&needle))
            .map(|entry| entry.as_str())
            .collect()
    }
}

fn malformed(message: String) -> RagError {
    RagError::MalformedContext {
        stage: Stage::Formatting,
        message,
    }
}

fn split_entries(section: &str) -> Vec<String> {
    if section.is_empty() {
        Vec::new()
    } else {
        section.split(ENTRY_DELIMITER).map(|s| s.to_string()).collect()
    }
}

/// Split a rendered document at its relationships header. The second part
/// starts with the separator; concatenating both parts gives the input back.
pub fn split_sections(rendered: &str) -> (&str, Option<&str>) {
    match rendered.find(KG_RELS_SEPARATOR) {
        Some(pos) => (&rendered[..pos], Some(&rendered[pos..])),
        None => (rendered, None),
    }
}
