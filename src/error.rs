//! Error taxonomy for the ingestion-and-retrieval core.
//!
//! Policy: errors that indicate corrupted durable state ([`StoreError`]) get
//! exactly one bounded recovery attempt, then propagate. Errors local to a
//! single input item ([`IngestError`]) must never abort a batch of many
//! items — batch callers catch, log, and continue. A failure to interpret
//! model output is *not* an error at all; it degrades to a raw-text draft
//! (see `extract` and `generate`).

use std::path::PathBuf;

use thiserror::Error;

/// Failure while producing embeddings via the local model server.
///
/// A malformed embedding must always propagate — substituting a zero vector
/// would silently poison every future similarity query.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed embedding response: {0}")]
    Malformed(String),

    #[error("embedding failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

/// Failure during a one-shot chat completion.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed chat response: {0}")]
    Malformed(String),

    #[error("chat failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

/// Failure in the vector store adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Initialization failed and automatic recovery was disabled.
    #[error("store initialization failed: {0}")]
    Init(#[source] sqlx::Error),

    /// Initialization failed, the store was reset, and the retry failed too.
    /// No further automatic recovery happens after this.
    #[error("store recovery exhausted; initial error: {first}; retry error: {second}")]
    RecoveryExhausted { first: String, second: String },

    #[error(transparent)]
    Db(#[from] sqlx::Error),

    /// The store is pinned to one embedding dimensionality for its lifetime;
    /// mixing models corrupts similarity comparisons silently.
    #[error("embedding dimension mismatch: store holds {expected}-d vectors, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("embedding model mismatch: store is pinned to '{expected}', got '{got}'")]
    ModelMismatch { expected: String, got: String },
}

/// Per-item ingestion failure. Batch callers skip-and-continue.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unsupported file format: .{0}")]
    UnsupportedFormat(String),

    #[error("failed to read {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
