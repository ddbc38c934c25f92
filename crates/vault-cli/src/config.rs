use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::warn;
use vault_core::{EvolutionPolicy, VaultOptions, MAX_SENSITIVITY_LEVEL};

/// Contents of `vault.toml`. Every section and field is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VaultConfig {
    pub embedding: EmbeddingConfig,
    pub lifecycle: LifecycleConfig,
    pub search: SearchConfig,
    pub graph: GraphConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// "hash" or "fastembed" (needs the `fastembed` feature).
    pub provider: String,
    pub dimension: usize,
    /// Embedding input is truncated to this many characters.
    pub max_input_chars: usize,
    /// Upper bound on a single query embedding.
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub promotion_threshold: f32,
    pub demotion_after_days: f64,
    /// Seconds between sweeps in `vault run`.
    pub interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub top_k: usize,
    /// Default ceiling when a command doesn't pass `--clearance`.
    pub clearance_ceiling: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub max_depth: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "hash".into(),
            dimension: 384,
            max_input_chars: 2000,
            timeout_secs: 30,
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        let policy = EvolutionPolicy::default();
        Self {
            promotion_threshold: policy.promotion_threshold,
            demotion_after_days: policy.demotion_after_days,
            interval_secs: 3600,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            clearance_ceiling: 3,
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self { max_depth: 3 }
    }
}

impl VaultConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load `path` if it exists, falling back to defaults.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("{:#}; using defaults", e);
                Self::default()
            }
        }
    }

    /// Human-readable problems, empty when the config is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        match self.embedding.provider.as_str() {
            "hash" => {}
            "fastembed" => {
                if !cfg!(feature = "fastembed") {
                    errors.push("embedding.provider = \"fastembed\" needs the `fastembed` feature".into());
                }
            }
            other => errors.push(format!(
                "embedding.provider must be \"hash\" or \"fastembed\", got \"{}\"",
                other
            )),
        }
        if self.embedding.dimension == 0 {
            errors.push("embedding.dimension must be greater than 0".into());
        }
        if self.embedding.max_input_chars == 0 {
            errors.push("embedding.max_input_chars must be greater than 0".into());
        }
        if self.embedding.timeout_secs == 0 {
            errors.push("embedding.timeout_secs must be greater than 0".into());
        }

        if let Err(e) = self.evolution_policy().validate() {
            errors.push(format!("lifecycle: {}", e));
        }
        if self.lifecycle.interval_secs == 0 {
            errors.push("lifecycle.interval_secs must be greater than 0".into());
        }

        if self.search.top_k == 0 {
            errors.push("search.top_k must be greater than 0".into());
        }
        if self.search.clearance_ceiling > MAX_SENSITIVITY_LEVEL {
            errors.push(format!(
                "search.clearance_ceiling must be at most {}",
                MAX_SENSITIVITY_LEVEL
            ));
        }

        errors
    }

    pub fn evolution_policy(&self) -> EvolutionPolicy {
        EvolutionPolicy {
            promotion_threshold: self.lifecycle.promotion_threshold,
            demotion_after_days: self.lifecycle.demotion_after_days,
        }
    }

    pub fn vault_options(&self) -> VaultOptions {
        VaultOptions {
            dimension: self.embedding.dimension,
            max_input_chars: self.embedding.max_input_chars,
        }
    }

    pub fn embed_timeout(&self) -> Duration {
        Duration::from_secs(self.embedding.timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.lifecycle.interval_secs)
    }
}
