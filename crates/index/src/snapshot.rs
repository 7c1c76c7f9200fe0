use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use crate::embeddings::Embedder;
use crate::memory::MemoryGraph;
use crate::store::VectorIndexConfig;

async fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to read directory {:?}", dir))?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("json") {
            files.push(path);
        }
    }
    // read_dir order is platform-dependent
    files.sort();
    Ok(files)
}

/// Build an in-memory graph from `<dir>/chunks/*.json` (chunks) and
/// `<dir>/extracted/*.json` (construction output per chunk).
///
/// Chunks without a stored embedding are embedded on load. When a
/// vocabulary is given every extraction is validated against it first.
pub async fn load_snapshot(
    dir: &Path,
    config: VectorIndexConfig,
    embedder: &dyn Embedder,
    vocabulary: Option<&extract::LabelVocabulary>,
) -> Result<MemoryGraph> {
    let mut graph = MemoryGraph::new(config);

    let chunk_files = json_files(&dir.join("chunks")).await?;
    for path in &chunk_files {
        let content = fs::read_to_string(path).await?;
        let mut chunk: ingest::Chunk = serde_json::from_str(&content)
            .with_context(|| format!("Invalid chunk file {:?}", path))?;

        if chunk.embedding.is_none() {
            let embedding = embedder
                .embed(&chunk.text)
                .await
                .with_context(|| format!("Failed to embed chunk {}", chunk.chunk_id))?;
            chunk.embedding = Some(embedding);
        }
        graph.add_chunk(&chunk);
    }

    let extracted_dir = dir.join("extracted");
    let extracted_files = if extracted_dir.is_dir() {
        json_files(&extracted_dir).await?
    } else {
        Vec::new()
    };

    for path in &extracted_files {
        let content = fs::read_to_string(path).await?;
        let extracted: extract::ExtractedChunk = serde_json::from_str(&content)
            .with_context(|| format!("Invalid extraction file {:?}", path))?;

        if let Some(vocab) = vocabulary {
            extract::validate(&extracted.graph, vocab)
                .with_context(|| format!("Extraction for chunk {} rejected", extracted.chunk_id))?;
        }
        graph.add_extraction(&extracted)?;
    }

    info!(
        chunks = chunk_files.len(),
        extractions = extracted_files.len(),
        "Loaded graph snapshot"
    );
    Ok(graph)
}
