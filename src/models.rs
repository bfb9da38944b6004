//! Core data types used throughout jobforge.
//!
//! These types represent the chunks, search results, and drafts that flow
//! through the ingestion and generation pipeline.

use serde::Serialize;
use serde_json::{Map, Value};

/// Metadata as stored alongside a chunk: a JSON object whose values are
/// scalars or null after coercion (see [`crate::meta::coerce`]).
pub type Metadata = Map<String, Value>;

/// An embedded chunk of a source document, the unit of storage.
///
/// `id` is derived deterministically as `{doc_id}-{chunk_index}`, so
/// re-ingesting the same `doc_id` overwrites rather than accumulates.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub id: String,
    pub doc_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub metadata: Metadata,
    pub embedding: Vec<f32>,
}

/// A ranked result from a nearest-neighbor query.
///
/// `distance` is cosine distance (1 − cosine similarity): smaller is more
/// similar. The metric is fixed for the lifetime of a store — results are
/// not comparable across metrics.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    pub distance: f32,
}

/// The structured output of the generation step, or the raw model text when
/// no draft could be recovered from it. Constructed fresh per `apply` call,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ApplicationDraft {
    Structured(Draft),
    Raw { raw: String },
}

/// The three-key draft schema the generation prompt mandates.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Draft {
    pub cover_letter_markdown: String,
    pub cv_bullets: Vec<String>,
    pub ats_report: AtsReport,
}

/// Keyword coverage report: which job-post keywords the draft covers and
/// which important ones it misses.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AtsReport {
    pub covered: Vec<String>,
    pub missing: Vec<String>,
}
