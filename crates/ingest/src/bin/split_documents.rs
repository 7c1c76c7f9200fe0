use anyhow::{Context, Result};
use std::path::PathBuf;

/// Split every `.txt` file under a directory into chunk files
/// (`<out>/chunks/<chunk_id>.json`) for the in-memory backend.
fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let input = args
        .next()
        .map(PathBuf::from)
        .context("usage: split_documents <input-dir> [data-dir]")?;
    let data_dir = args.next().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("data"));

    let chunks_dir = data_dir.join("chunks");
    std::fs::create_dir_all(&chunks_dir)
        .with_context(|| format!("Failed to create {:?}", chunks_dir))?;

    anyhow::ensure!(input.is_dir(), "Input directory {:?} does not exist", input);
    let files = ingest::text_files(&input);

    let mut total = 0;
    for path in &files {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {:?}", path))?;
        let chunks = ingest::split_document(&path.to_string_lossy(), &text)?;

        for chunk in &chunks {
            let json = serde_json::to_string_pretty(chunk)?;
            std::fs::write(chunks_dir.join(format!("{}.json", chunk.chunk_id)), json)?;
        }
        println!("{}: {} chunks", path.display(), chunks.len());
        total += chunks.len();
    }

    println!("Wrote {} chunks from {} documents to {}", total, files.len(), chunks_dir.display());
    Ok(())
}

