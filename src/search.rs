//! Retrieval: top-k relevant chunks for a query.

use anyhow::Result;

use crate::models::SearchResult;
use crate::ollama::Embedder;
use crate::store::Store;

/// Embed the query text and return up to `k` chunks ordered by ascending
/// distance. No caching — every call re-embeds and re-queries; the dominant
/// cost is the downstream generation call, not retrieval.
pub async fn search(
    store: &Store,
    embedder: &dyn Embedder,
    query: &str,
    k: usize,
) -> Result<Vec<SearchResult>> {
    let embedding = embedder.embed_one(query).await?;
    Ok(store.query(&embedding, k).await?)
}
