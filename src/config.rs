use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

pub const URL_VAR: &str = "SUPABASE_URL";
pub const KEY_VAR: &str = "SUPABASE_SERVICE_ROLE_KEY";

pub const INTERACTIONS_TABLE: &str = "ml_interactions";
pub const EMBEDDINGS_TABLE: &str = "movie_embeddings";
pub const UPSERT_KEY: &str = "tmdbId";

/// Connection settings for the hosted store. Built explicitly and passed to
/// each stage; nothing is read from the environment after construction.
#[derive(Clone)]
pub struct StoreConfig {
    pub url: String,
    pub service_key: String,
    pub interactions_table: String,
    pub embeddings_table: String,
    pub upsert_key: String,
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("url", &self.url)
            .field("service_key", &"<redacted>")
            .field("interactions_table", &self.interactions_table)
            .field("embeddings_table", &self.embeddings_table)
            .finish()
    }
}

impl StoreConfig {
    pub fn new(url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
            interactions_table: INTERACTIONS_TABLE.to_string(),
            embeddings_table: EMBEDDINGS_TABLE.to_string(),
            upsert_key: UPSERT_KEY.to_string(),
        }
    }

    /// Load a dotenv file if present, then read credentials from the
    /// environment. Fails fast when either value is missing or blank.
    pub fn from_env(env_file: Option<&Path>) -> Result<Self> {
        if let Some(path) = env_file {
            if path.exists() {
                dotenvy::from_path(path).map_err(|e| {
                    PipelineError::Configuration(format!("failed to load {}: {e}", path.display()))
                })?;
                tracing::debug!(path = %path.display(), "loaded env file");
            }
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let read = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| PipelineError::Configuration(format!("{name} is not set")))
        };
        let url = read(URL_VAR)?;
        let key = read(KEY_VAR)?;
        Ok(Self::new(url, key))
    }
}

/// Hyperparameters for one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Width of the per-entity lookup vector (E).
    pub embedding_dim: usize,
    pub hidden_dim: usize,
    /// Shared output dimension of both towers (D).
    pub output_dim: usize,
    pub dropout: f32,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Fixes initialisation, dropout masks and shuffling. `None` uses entropy.
    pub seed: Option<u64>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            embedding_dim: 32,
            hidden_dim: 128,
            output_dim: 64,
            dropout: 0.2,
            epochs: 10,
            batch_size: 32,
            learning_rate: 1e-3,
            seed: None,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(PipelineError::InvalidConfig(msg.to_string()));
        if self.embedding_dim == 0 || self.hidden_dim == 0 || self.output_dim == 0 {
            return invalid("layer dimensions must be positive");
        }
        if self.epochs == 0 {
            return invalid("epochs must be at least 1");
        }
        if self.batch_size == 0 {
            return invalid("batch size must be at least 1");
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return invalid("dropout must be in [0, 1)");
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return invalid("learning rate must be positive");
        }
        Ok(())
    }
}
