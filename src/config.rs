use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration, loaded from a TOML file.
///
/// Every section and key has a default, so an absent config file yields a
/// fully working local setup (SQLite store under `data/`, Ollama on its
/// standard port, the models the tool was built against).
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// When true (the default), a corrupted on-disk store is discarded and
    /// recreated once on open. Disable where data loss is unacceptable.
    #[serde(default = "default_auto_recover")]
    pub auto_recover: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            auto_recover: default_auto_recover(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/jobforge.sqlite3")
}
fn default_auto_recover() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size: default_chunk_size(),
            overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    crate::chunk::DEFAULT_SIZE
}
fn default_chunk_overlap() -> usize {
    crate::chunk::DEFAULT_OVERLAP
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    8
}

#[derive(Debug, Deserialize, Clone)]
pub struct OllamaConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_embed_model")]
    pub embed_model: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    /// Low temperature favors schema compliance over creative variance.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_num_ctx")]
    pub num_ctx: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            embed_model: default_embed_model(),
            chat_model: default_chat_model(),
            temperature: default_temperature(),
            num_ctx: default_num_ctx(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:11434".to_string()
}
fn default_embed_model() -> String {
    "nomic-embed-text".to_string()
}
fn default_chat_model() -> String {
    "llama3:8b".to_string()
}
fn default_temperature() -> f64 {
    0.2
}
fn default_num_ctx() -> u32 {
    4096
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_max_retries() -> u32 {
    3
}

/// Load configuration from `path`, falling back to built-in defaults when
/// the file does not exist. A file that exists but does not parse is an
/// error — silently ignoring a broken config hides misdirected stores.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?
    } else {
        Config::default()
    };

    if config.chunking.size == 0 {
        anyhow::bail!("chunking.size must be > 0");
    }

    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    if !(0.0..=2.0).contains(&config.ollama.temperature) {
        anyhow::bail!("ollama.temperature must be in [0.0, 2.0]");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = load_config(Path::new("/definitely/not/here.toml")).unwrap();
        assert_eq!(cfg.chunking.size, 900);
        assert_eq!(cfg.chunking.overlap, 150);
        assert_eq!(cfg.retrieval.top_k, 8);
        assert_eq!(cfg.ollama.embed_model, "nomic-embed-text");
        assert!(cfg.store.auto_recover);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobforge.toml");
        std::fs::write(&path, "[chunking]\nsize = 400\n").unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.chunking.size, 400);
        assert_eq!(cfg.chunking.overlap, 150);
        assert_eq!(cfg.ollama.chat_model, "llama3:8b");
    }

    #[test]
    fn zero_chunk_size_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobforge.toml");
        std::fs::write(&path, "[chunking]\nsize = 0\n").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn unparseable_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobforge.toml");
        std::fs::write(&path, "not toml [[[").unwrap();
        assert!(load_config(&path).is_err());
    }
}
