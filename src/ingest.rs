//! Ingestion pipeline orchestration.
//!
//! Coordinates the flow: read → metadata coercion → chunking → embedding →
//! storage. Re-ingesting a document replaces it: chunks for its `doc_id`
//! are deleted before the new ones are written, so an edited document that
//! now produces fewer chunks leaves no orphaned high-index chunks behind.
//!
//! Batch ingestion is failure-isolated: one corrupt file in a directory
//! must never abort its siblings. Per-item errors are logged and counted,
//! and the walk continues.

use std::path::Path;

use anyhow::{bail, Result};
use serde_json::Value;
use walkdir::WalkDir;

use crate::chunk::{chunk_id, chunk_text};
use crate::config::ChunkingConfig;
use crate::error::IngestError;
use crate::meta::coerce;
use crate::models::{ChunkRecord, Metadata};
use crate::ollama::Embedder;
use crate::reader::{read_file, SUPPORTED_EXTENSIONS};
use crate::store::Store;

/// Counters for a batch ingestion run.
#[derive(Debug, Default, Clone, Copy)]
pub struct IngestSummary {
    pub files: usize,
    pub skipped: usize,
    pub chunks: usize,
}

/// Ingest raw text with metadata. Returns the number of chunks written.
///
/// The `doc_id` is taken from the coerced metadata (`doc_id`, else `title`,
/// else `"doc"`); chunk ids are `{doc_id}-{index}`. Whitespace-only text
/// yields zero chunks but still clears any prior chunks for the `doc_id` —
/// a document emptied by its author should not keep stale content.
pub async fn ingest_text(
    store: &Store,
    embedder: &dyn Embedder,
    chunking: &ChunkingConfig,
    text: &str,
    metadata: &Metadata,
) -> Result<usize, IngestError> {
    let meta = coerce(metadata);
    let doc_id = derive_doc_id(&meta);

    let parts = chunk_text(text, chunking.size, chunking.overlap);
    store.delete_doc(&doc_id).await?;
    if parts.is_empty() {
        return Ok(0);
    }

    let embeddings = embedder.embed(&parts).await?;
    let records: Vec<ChunkRecord> = parts
        .into_iter()
        .zip(embeddings)
        .enumerate()
        .map(|(index, (text, embedding))| ChunkRecord {
            id: chunk_id(&doc_id, index),
            doc_id: doc_id.clone(),
            chunk_index: index as i64,
            text,
            metadata: meta.clone(),
            embedding,
        })
        .collect();

    store.upsert(embedder.model_name(), &records).await?;
    Ok(records.len())
}

/// Ingest one file: read it, stamp `ingested_at`, and hand the body plus
/// metadata to [`ingest_text`].
pub async fn ingest_file(
    store: &Store,
    embedder: &dyn Embedder,
    chunking: &ChunkingConfig,
    path: &Path,
) -> Result<usize, IngestError> {
    let mut doc = read_file(path)?;
    doc.metadata.insert(
        "ingested_at".to_string(),
        Value::String(chrono::Utc::now().to_rfc3339()),
    );
    ingest_text(store, embedder, chunking, &doc.body, &doc.metadata).await
}

/// Ingest a file or every supported file under a directory.
///
/// Directory entries are processed in path order for reproducible runs.
/// Failed items are skipped with a warning; the summary reports both sides.
pub async fn ingest_path(
    store: &Store,
    embedder: &dyn Embedder,
    chunking: &ChunkingConfig,
    path: &Path,
) -> Result<IngestSummary> {
    let files = if path.is_dir() {
        collect_supported_files(path)
    } else if path.is_file() {
        vec![path.to_path_buf()]
    } else {
        bail!("no such file or directory: {}", path.display());
    };

    if files.is_empty() {
        bail!(
            "no supported files under {} (supported: {})",
            path.display(),
            SUPPORTED_EXTENSIONS.join(", ")
        );
    }

    let mut summary = IngestSummary::default();
    for file in &files {
        match ingest_file(store, embedder, chunking, file).await {
            Ok(count) => {
                summary.files += 1;
                summary.chunks += count;
                tracing::info!(path = %file.display(), chunks = count, "ingested");
            }
            Err(e) => {
                summary.skipped += 1;
                tracing::warn!(path = %file.display(), error = %e, "skipped");
            }
        }
    }
    Ok(summary)
}

fn collect_supported_files(root: &Path) -> Vec<std::path::PathBuf> {
    let mut files: Vec<_> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}

/// `doc_id` metadata wins, then `title`, then the `"doc"` fallback.
/// Non-string scalars (a numeric id from front-matter) are rendered, not
/// rejected.
fn derive_doc_id(meta: &Metadata) -> String {
    for key in ["doc_id", "title"] {
        match meta.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return s.clone(),
            Some(Value::Number(n)) => return n.to_string(),
            _ => {}
        }
    }
    "doc".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(v: Value) -> Metadata {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn doc_id_prefers_doc_id_over_title() {
        let meta = as_map(json!({"doc_id": "cv-2025", "title": "My CV"}));
        assert_eq!(derive_doc_id(&meta), "cv-2025");
    }

    #[test]
    fn doc_id_falls_back_to_title_then_doc() {
        assert_eq!(derive_doc_id(&as_map(json!({"title": "My CV"}))), "My CV");
        assert_eq!(derive_doc_id(&as_map(json!({}))), "doc");
    }

    #[test]
    fn numeric_doc_id_is_rendered() {
        assert_eq!(derive_doc_id(&as_map(json!({"doc_id": 42}))), "42");
    }

    #[test]
    fn collect_skips_unsupported_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "alpha").unwrap();
        std::fs::write(dir.path().join("b.txt"), "beta").unwrap();
        std::fs::write(dir.path().join("c.png"), "binary").unwrap();
        let files = collect_supported_files(dir.path());
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.extension().unwrap() != "png"));
    }
}
