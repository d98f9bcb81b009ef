//! Configuration management for Strophe
//!
//! Loaded from `strophe.toml`; every section falls back to workable
//! defaults so a bare config file (or none at all) still runs.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{Result, StropheError};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StropheConfig {
    /// Directory holding per-session checkpoint files
    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: PathBuf,

    /// Generation model selection per tier
    #[serde(default)]
    pub models: ModelConfig,

    /// Named retrieval collections
    #[serde(default)]
    pub collections: CollectionConfig,

    /// Retrieval service endpoint
    #[serde(default = "default_retrieval_url")]
    pub retrieval_url: String,
}

/// Model names per tier, resolved against the generation service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_small")]
    pub small: String,

    #[serde(default = "default_model_medium")]
    pub medium: String,

    #[serde(default = "default_model_large")]
    pub large: String,

    /// Environment variable containing the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

/// The two collections the orchestrator consumes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Domain-knowledge collection (prosody corpus)
    #[serde(default = "default_knowledge_collection")]
    pub knowledge: String,

    /// User-preference-memory collection
    #[serde(default = "default_memory_collection")]
    pub memory: String,
}

fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from("runs/checkpoints")
}

fn default_retrieval_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_model_small() -> String {
    "claude-3-5-haiku-latest".to_string()
}

fn default_model_medium() -> String {
    "claude-sonnet-4".to_string()
}

fn default_model_large() -> String {
    "claude-opus-4".to_string()
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_knowledge_collection() -> String {
    "prosody".to_string()
}

fn default_memory_collection() -> String {
    "memory".to_string()
}

impl Default for StropheConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: default_checkpoint_dir(),
            models: ModelConfig::default(),
            collections: CollectionConfig::default(),
            retrieval_url: default_retrieval_url(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            small: default_model_small(),
            medium: default_model_medium(),
            large: default_model_large(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            knowledge: default_knowledge_collection(),
            memory: default_memory_collection(),
        }
    }
}

impl StropheConfig {
    /// Load from a TOML file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| StropheError::Config(format!("{}: {}", path.display(), e)))
    }
}
