//! SQLite-backed vector store adapter.
//!
//! A [`Store`] is an explicit handle constructed once at process startup and
//! passed by reference to every component that needs it — there is no lazy
//! global. Opening is resilient: a store that fails to initialize (e.g. a
//! corrupted database file) is discarded and recreated exactly once, and the
//! outcome is surfaced as a tagged [`InitOutcome`] so callers can observe
//! the recovery rather than have it happen invisibly. The reset is
//! destructive; `store.auto_recover = false` disables it where data loss is
//! unacceptable.
//!
//! Embedding vectors are stored as little-endian `f32` BLOBs. Queries rank
//! by cosine distance (`1 − cosine similarity`), ascending — the metric is
//! fixed for the lifetime of a store. The embedding model name and
//! dimensionality are pinned in a meta table on first write and enforced on
//! every subsequent write: mixing models would corrupt similarity
//! comparisons without any visible error.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::models::{ChunkRecord, Metadata, SearchResult};

const META_EMBED_MODEL: &str = "embed_model";
const META_EMBED_DIMS: &str = "embed_dims";

/// How opening the store went. `Recovered` means the on-disk store was
/// destroyed and recreated — data loss the caller should log loudly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    Opened,
    Recovered { reason: String },
}

/// Handle to the persistent chunk collection. Clone is cheap (shares the
/// underlying pool, which is internally synchronized).
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
    path: PathBuf,
}

impl Store {
    /// Open (or create) the store at `cfg.path`.
    ///
    /// On initialization failure with `auto_recover` enabled, performs
    /// exactly one recovery attempt: delete the database file and its
    /// WAL/SHM sidecars, recreate, retry once. A second consecutive failure
    /// propagates — no further automatic recovery.
    pub async fn open(cfg: &StoreConfig) -> Result<(Self, InitOutcome), StoreError> {
        match open_and_migrate(&cfg.path).await {
            Ok(pool) => Ok((
                Self {
                    pool,
                    path: cfg.path.clone(),
                },
                InitOutcome::Opened,
            )),
            Err(first) => {
                if !cfg.auto_recover {
                    return Err(StoreError::Init(first));
                }
                let reason = first.to_string();
                tracing::warn!(
                    path = %cfg.path.display(),
                    error = %reason,
                    "store failed to open; discarding on-disk store and recreating"
                );
                remove_store_files(&cfg.path);
                match open_and_migrate(&cfg.path).await {
                    Ok(pool) => Ok((
                        Self {
                            pool,
                            path: cfg.path.clone(),
                        },
                        InitOutcome::Recovered { reason },
                    )),
                    Err(second) => Err(StoreError::RecoveryExhausted {
                        first: reason,
                        second: second.to_string(),
                    }),
                }
            }
        }
    }

    /// Insert or overwrite chunks. All records must share the embedding
    /// model and dimensionality pinned on the store's first write.
    pub async fn upsert(&self, model: &str, records: &[ChunkRecord]) -> Result<(), StoreError> {
        let Some(first) = records.first() else {
            return Ok(());
        };
        let dims = first.embedding.len();
        self.check_embedding_space(model, dims).await?;

        let mut tx = self.pool.begin().await?;
        for record in records {
            if record.embedding.len() != dims {
                return Err(StoreError::DimensionMismatch {
                    expected: dims,
                    got: record.embedding.len(),
                });
            }
            let metadata_json =
                serde_json::to_string(&record.metadata).unwrap_or_else(|_| "{}".to_string());
            sqlx::query(
                r#"
                INSERT INTO chunks (id, doc_id, chunk_index, text, metadata_json, embedding)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    doc_id = excluded.doc_id,
                    chunk_index = excluded.chunk_index,
                    text = excluded.text,
                    metadata_json = excluded.metadata_json,
                    embedding = excluded.embedding
                "#,
            )
            .bind(&record.id)
            .bind(&record.doc_id)
            .bind(record.chunk_index)
            .bind(&record.text)
            .bind(&metadata_json)
            .bind(vec_to_blob(&record.embedding))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Nearest-neighbor query: up to `k` results ordered by ascending
    /// cosine distance. Fewer than `k` chunks stored → all of them; an
    /// empty store → an empty vec, not an error.
    pub async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<SearchResult>, StoreError> {
        let rows = sqlx::query("SELECT id, text, metadata_json, embedding FROM chunks")
            .fetch_all(&self.pool)
            .await?;

        let mut results: Vec<SearchResult> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vec = blob_to_vec(&blob);
                let metadata_json: String = row.get("metadata_json");
                let metadata: Metadata = serde_json::from_str(&metadata_json).unwrap_or_default();
                SearchResult {
                    id: row.get("id"),
                    text: row.get("text"),
                    metadata,
                    distance: 1.0 - cosine_similarity(embedding, &vec),
                }
            })
            .collect();

        results.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(k);
        Ok(results)
    }

    /// Delete every chunk belonging to `doc_id`. Returns the number of
    /// chunks removed.
    pub async fn delete_doc(&self, doc_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM chunks WHERE doc_id = ?")
            .bind(doc_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Drop every chunk and the pinned embedding space. Destructive and
    /// explicit — only reachable through a caller that asked for it.
    pub async fn reset(&self) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunks").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM store_meta").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pin the embedding model + dimensionality on first write; reject
    /// writes from a different space afterwards.
    async fn check_embedding_space(&self, model: &str, dims: usize) -> Result<(), StoreError> {
        let pinned_model: Option<String> =
            sqlx::query_scalar("SELECT value FROM store_meta WHERE key = ?")
                .bind(META_EMBED_MODEL)
                .fetch_optional(&self.pool)
                .await?;

        match pinned_model {
            None => {
                let mut tx = self.pool.begin().await?;
                sqlx::query("INSERT OR REPLACE INTO store_meta (key, value) VALUES (?, ?)")
                    .bind(META_EMBED_MODEL)
                    .bind(model)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query("INSERT OR REPLACE INTO store_meta (key, value) VALUES (?, ?)")
                    .bind(META_EMBED_DIMS)
                    .bind(dims.to_string())
                    .execute(&mut *tx)
                    .await?;
                tx.commit().await?;
                Ok(())
            }
            Some(pinned) if pinned != model => Err(StoreError::ModelMismatch {
                expected: pinned,
                got: model.to_string(),
            }),
            Some(_) => {
                let pinned_dims: Option<String> =
                    sqlx::query_scalar("SELECT value FROM store_meta WHERE key = ?")
                        .bind(META_EMBED_DIMS)
                        .fetch_optional(&self.pool)
                        .await?;
                let expected = pinned_dims.and_then(|s| s.parse::<usize>().ok()).unwrap_or(dims);
                if expected != dims {
                    return Err(StoreError::DimensionMismatch {
                        expected,
                        got: dims,
                    });
                }
                Ok(())
            }
        }
    }
}

async fn open_and_migrate(path: &Path) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(sqlx::Error::Io)?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            doc_id TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            text TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            embedding BLOB NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_doc_id ON chunks(doc_id)")
        .execute(&pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS store_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    Ok(pool)
}

/// Best-effort removal of the database file and its WAL/SHM sidecars.
/// Failures are ignored — the retry that follows reports the real problem.
fn remove_store_files(path: &Path) {
    let mut targets = vec![path.to_path_buf()];
    let display = path.display().to_string();
    targets.push(PathBuf::from(format!("{display}-wal")));
    targets.push(PathBuf::from(format!("{display}-shm")));
    for target in targets {
        if let Err(e) = std::fs::remove_file(&target) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::debug!(path = %target.display(), error = %e, "could not remove store file");
            }
        }
    }
}

/// Encode a float vector as little-endian `f32` bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1, 1]`; returns 0 for empty or mismatched
/// vectors so a degenerate row ranks last instead of panicking.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
