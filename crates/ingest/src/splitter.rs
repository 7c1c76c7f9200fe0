use anyhow::Result;

use crate::chunk::Chunk;

pub struct SplitterConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 100,
        }
    }
}

/// Cuts text into fixed-size character windows, each window starting
/// `chunk_size - chunk_overlap` characters after the previous one.
pub struct FixedSizeSplitter {
    config: SplitterConfig,
}

impl FixedSizeSplitter {
    pub fn new(config: SplitterConfig) -> Result<Self> {
        if config.chunk_size == 0 {
            anyhow::bail!("chunk_size must be greater than zero");
        }
        if config.chunk_overlap >= config.chunk_size {
            anyhow::bail!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                config.chunk_overlap,
                config.chunk_size
            );
        }
        Ok(Self { config })
    }

    pub fn split(&self, doc_id: &str, text: &str, source: &str) -> Vec<Chunk> {
        let chars: Vec<char> = text.chars().collect();
        let step = self.config.chunk_size - self.config.chunk_overlap;

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let end = (start + self.config.chunk_size).min(chars.len());
            let window: String = chars[start..end].iter().collect();
            let overlap = if chunks.is_empty() { 0 } else { self.config.chunk_overlap };

            if !window.trim().is_empty() {
                chunks.push(Chunk::new(
                    doc_id.to_string(),
                    window,
                    source.to_string(),
                    chunks.len(),
                    (start, end),
                    overlap,
                ));
            }

            if end == chars.len() {
                break;
            }
            start += step;
        }

        chunks
    }
}
