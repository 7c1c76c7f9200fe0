pub mod chunk;
pub mod splitter;

pub use chunk::Chunk;
pub use splitter::{FixedSizeSplitter, SplitterConfig};

use anyhow::Result;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Generate a stable document ID from file path
pub fn generate_doc_id(path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..16])
}

/// Split already-extracted document text with the default 500/100 windows
pub fn split_document(path: &str, text: &str) -> Result<Vec<Chunk>> {
    let doc_id = generate_doc_id(path);
    let splitter = FixedSizeSplitter::new(SplitterConfig::default())?;
    Ok(splitter.split(&doc_id, text, path))
}

/// Every `.txt` file under `dir`, recursively, in path order
pub fn text_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("txt"))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}
