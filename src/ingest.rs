//! Loading documents from the filesystem.
//!
//! Files are read as raw bytes; deciding which formats are usable is the
//! extractor's job at build time. Directories are walked recursively,
//! skipping hidden entries (`.git`, `.venv`, ...).

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use rag_harness_core::models::RawDocument;

/// Read every file under `paths`, in sorted path order.
///
/// A file argument is named by its file name; files found in a directory
/// are named by their path relative to that directory.
pub fn load_paths(paths: &[PathBuf]) -> Result<Vec<RawDocument>> {
    let mut documents = Vec::new();

    for root in paths {
        if !root.exists() {
            bail!("Document path does not exist: {}", root.display());
        }

        if root.is_file() {
            let name = root
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| root.display().to_string());
            documents.push(read_document(root, name)?);
            continue;
        }

        let mut files: Vec<PathBuf> = Vec::new();
        let walker = WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));
        for entry in walker {
            let entry = entry?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        files.sort();

        for path in files {
            let relative = path.strip_prefix(root).unwrap_or(&path);
            let name = relative.to_string_lossy().to_string();
            documents.push(read_document(&path, name)?);
        }
    }

    tracing::debug!(documents = documents.len(), "documents loaded");
    Ok(documents)
}

fn read_document(path: &Path, name: String) -> Result<RawDocument> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(RawDocument::new(name, bytes))
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}
