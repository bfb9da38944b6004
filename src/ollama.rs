//! Embedding and chat-completion client for a local Ollama server.
//!
//! Defines the [`Embedder`] and [`ChatModel`] seams and the concrete
//! [`OllamaClient`] implementing both over the Ollama HTTP API:
//!
//! - `POST /api/embeddings` — one call per text, `{model, prompt}` in,
//!   `{embedding: [f64, …]}` out.
//! - `POST /api/chat` — one-shot, non-streaming completion with a JSON
//!   format hint and caller-fixed sampling options.
//!
//! # Retry Strategy
//!
//! Both endpoints use exponential backoff for transient failures:
//! - network errors and HTTP 5xx → retry
//! - HTTP 4xx → fail immediately
//! - backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! A malformed embedding response always propagates as
//! [`EmbeddingError::Malformed`] — never a substitute zero vector, since a
//! corrupted embedding silently poisons all future similarity queries.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::OllamaConfig;
use crate::error::{ChatError, EmbeddingError};

/// Produces one fixed-length vector per input text, order preserved.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// The embedding model identifier (pinned per store lifetime).
    fn model_name(&self) -> &str;

    /// Embed a batch of texts. One embedding per input, same order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a single query text.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut out = self.embed(&[text.to_string()]).await?;
        out.pop()
            .ok_or_else(|| EmbeddingError::Malformed("empty embedding batch".to_string()))
    }
}

/// One-shot, non-streaming chat completion.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(&self, system: &str, user: &str) -> Result<String, ChatError>;
}

/// Client for a local Ollama server; implements both [`Embedder`] and
/// [`ChatModel`]. Cheap to clone; holds no mutable state, so concurrent
/// calls are safe.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    cfg: OllamaConfig,
}

impl OllamaClient {
    pub fn new(cfg: &OllamaConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            cfg: cfg.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.cfg.base_url.trim_end_matches('/'), path)
    }

    /// POST `body` to `path` with retry/backoff, returning the response JSON.
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, RequestError> {
        let url = self.endpoint(path);
        let mut last_err: Option<String> = None;

        for attempt in 0..=self.cfg.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            match self.http.post(&url).json(body).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .json::<Value>()
                            .await
                            .map_err(|e| RequestError::Decode(e.to_string()));
                    }
                    let body_text = response.text().await.unwrap_or_default();
                    if status.is_server_error() {
                        last_err = Some(format!("{}: {}", status, body_text));
                        continue;
                    }
                    // Client error — don't retry.
                    return Err(RequestError::Api {
                        status: status.as_u16(),
                        body: body_text,
                    });
                }
                Err(e) => {
                    last_err = Some(e.to_string());
                    continue;
                }
            }
        }

        Err(RequestError::Exhausted {
            attempts: self.cfg.max_retries + 1,
            last: last_err.unwrap_or_else(|| "no response".to_string()),
        })
    }
}

/// Transport-level outcome shared by both endpoints, mapped into the
/// endpoint-specific error type by the callers below.
enum RequestError {
    Decode(String),
    Api { status: u16, body: String },
    Exhausted { attempts: u32, last: String },
}

impl From<RequestError> for EmbeddingError {
    fn from(e: RequestError) -> Self {
        match e {
            RequestError::Decode(s) => EmbeddingError::Malformed(s),
            RequestError::Api { status, body } => EmbeddingError::Api { status, body },
            RequestError::Exhausted { attempts, last } => {
                EmbeddingError::Exhausted { attempts, last }
            }
        }
    }
}

impl From<RequestError> for ChatError {
    fn from(e: RequestError) -> Self {
        match e {
            RequestError::Decode(s) => ChatError::Malformed(s),
            RequestError::Api { status, body } => ChatError::Api { status, body },
            RequestError::Exhausted { attempts, last } => ChatError::Exhausted { attempts, last },
        }
    }
}

#[async_trait]
impl Embedder for OllamaClient {
    fn model_name(&self) -> &str {
        &self.cfg.embed_model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            let body = json!({
                "model": self.cfg.embed_model,
                "prompt": text,
            });
            let response = self.post_json("/api/embeddings", &body).await?;
            out.push(parse_embedding_response(&response)?);
        }
        Ok(out)
    }
}

#[async_trait]
impl ChatModel for OllamaClient {
    async fn chat(&self, system: &str, user: &str) -> Result<String, ChatError> {
        let body = json!({
            "model": self.cfg.chat_model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "stream": false,
            "format": "json",
            "options": {
                "temperature": self.cfg.temperature,
                "num_ctx": self.cfg.num_ctx,
            },
        });
        let response = self.post_json("/api/chat", &body).await?;
        parse_chat_response(&response)
    }
}

/// Extract the `embedding` vector from an `/api/embeddings` response.
fn parse_embedding_response(json: &Value) -> Result<Vec<f32>, EmbeddingError> {
    let raw = json
        .get("embedding")
        .and_then(Value::as_array)
        .ok_or_else(|| EmbeddingError::Malformed("missing 'embedding' array".to_string()))?;

    if raw.is_empty() {
        return Err(EmbeddingError::Malformed("empty embedding vector".to_string()));
    }

    raw.iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| EmbeddingError::Malformed("non-numeric embedding value".to_string()))
        })
        .collect()
}

/// Extract `message.content` from an `/api/chat` response.
fn parse_chat_response(json: &Value) -> Result<String, ChatError> {
    json.get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ChatError::Malformed("missing 'message.content'".to_string()))
}
