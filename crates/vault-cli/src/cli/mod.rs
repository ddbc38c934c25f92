pub mod config_cmd;
pub mod entity;
pub mod evolve;
pub mod export;
pub mod graph;
pub mod search;
pub mod stats;

use crate::config::VaultConfig;
use crate::snapshot::Snapshot;
use anyhow::{bail, Context as _, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use vault_core::{Embedding, EmbeddingProvider, HashEmbeddingProvider, MemoryStore, Vault};

#[derive(Parser, Debug)]
#[command(name = "vault")]
#[command(version, about = "Sensitivity-aware knowledge vault")]
pub struct Cli {
    /// Path to vault.toml
    #[arg(long, global = true, env = "VAULT_CONFIG", default_value = "vault.toml")]
    pub config: PathBuf,

    /// Path to the JSON vault file
    #[arg(long, global = true, env = "VAULT_FILE", default_value = "vault.json")]
    pub file: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Configuration commands
    #[command(subcommand)]
    Config(ConfigCommands),
    #[command(flatten)]
    Vault(VaultCommands),
}

/// Commands that open the vault file.
#[derive(Subcommand, Debug)]
pub enum VaultCommands {
    /// Ingest entities from a JSON array file
    Import(ImportArgs),
    /// Similarity search
    Search(SearchArgs),
    /// Similarity search expanded through the relationship graph
    Discover(DiscoverArgs),
    /// Graph traversal from an entity
    Traverse(TraverseArgs),
    /// Find shortest path between two entities
    Path(PathArgs),
    /// Create a relationship
    Link(LinkArgs),
    /// Remove a relationship by id
    Unlink(UnlinkArgs),
    /// Delete an entity and every relationship touching it
    Delete(DeleteArgs),
    /// Record activity on an entity
    Touch(TouchArgs),
    /// Pin or unpin an entity
    Pin(PinArgs),
    /// Run one lifecycle sweep
    Evolve(EvolveArgs),
    /// Archive an entity by hand
    Archive(ArchiveArgs),
    /// Move an entity to another tier by hand
    Transition(TransitionArgs),
    /// Run lifecycle sweeps on an interval until Ctrl-C
    Run,
    /// Export entities that allow export
    Export(ExportArgs),
    /// Vault statistics
    Stats(FormatArgs),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Check vault.toml and summarise the effective settings
    Validate,
    /// Print the effective settings as TOML
    Show,
}

#[derive(Args, Debug)]
pub struct FormatArgs {
    /// "table" or "json"
    #[arg(long, default_value = "table")]
    pub format: String,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// JSON file holding an array of entities
    pub path: PathBuf,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    pub query: String,
    #[arg(long)]
    pub limit: Option<usize>,
    /// Highest sensitivity level to return (defaults to search.clearance_ceiling)
    #[arg(long)]
    pub clearance: Option<u8>,
    /// Only return entities at this tier
    #[arg(long)]
    pub tier: Option<String>,
    #[arg(long, default_value = "table")]
    pub format: String,
}

#[derive(Args, Debug)]
pub struct DiscoverArgs {
    #[command(flatten)]
    pub search: SearchArgs,
    /// Hops to expand from each hit (defaults to graph.max_depth)
    #[arg(long)]
    pub depth: Option<u32>,
}

#[derive(Args, Debug)]
pub struct TraverseArgs {
    pub id: String,
    #[arg(long)]
    pub depth: Option<u32>,
    /// "outbound", "inbound", "both"
    #[arg(long, default_value = "both")]
    pub direction: String,
    #[arg(long)]
    pub relation: Option<String>,
    #[arg(long, default_value = "table")]
    pub format: String,
}

#[derive(Args, Debug)]
pub struct PathArgs {
    pub from: String,
    pub to: String,
    #[arg(long, default_value = "table")]
    pub format: String,
}

#[derive(Args, Debug)]
pub struct LinkArgs {
    pub source: String,
    pub target: String,
    #[arg(long, default_value = "references")]
    pub relation: String,
    /// Metadata as key=value, repeatable
    #[arg(long = "meta")]
    pub metadata: Vec<String>,
}

#[derive(Args, Debug)]
pub struct UnlinkArgs {
    pub id: String,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    pub id: String,
}

#[derive(Args, Debug)]
pub struct TouchArgs {
    pub id: String,
    /// Added to importance, clamped to [0, 1]
    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    pub importance: f32,
}

#[derive(Args, Debug)]
pub struct PinArgs {
    pub id: String,
    #[arg(long)]
    pub unpin: bool,
}

#[derive(Args, Debug)]
pub struct EvolveArgs {
    /// Only evolve this entity
    pub id: Option<String>,
    /// Evaluate without writing the vault file
    #[arg(long)]
    pub dry_run: bool,
    #[arg(long, default_value = "table")]
    pub format: String,
}

#[derive(Args, Debug)]
pub struct ArchiveArgs {
    pub id: String,
    #[arg(long, default_value = "archived by hand")]
    pub reason: String,
    #[arg(long, default_value = "table")]
    pub format: String,
}

#[derive(Args, Debug)]
pub struct TransitionArgs {
    pub id: String,
    /// Target tier; canonical is reached only by pinning
    pub tier: String,
    #[arg(long, default_value = "moved by hand")]
    pub reason: String,
    #[arg(long, default_value = "table")]
    pub format: String,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[arg(long)]
    pub output: Option<PathBuf>,
}

pub type CliVault = Vault<MemoryStore, Box<dyn EmbeddingProvider>>;

/// A loaded vault plus the settings it was opened with.
pub struct Session {
    pub config: VaultConfig,
    pub file: PathBuf,
    pub vault: Arc<CliVault>,
}

impl Session {
    pub fn open(config_path: &Path, file: &Path) -> Result<Self> {
        let config = VaultConfig::load_or_default(config_path);
        let errors = config.validate();
        if !errors.is_empty() {
            bail!(
                "Invalid configuration in {}:\n  - {}",
                config_path.display(),
                errors.join("\n  - ")
            );
        }

        let embedder = build_embedder(&config)?;
        info!("Embedding provider: {}", embedder.name());
        let vault = Vault::new(MemoryStore::new(), embedder, config.vault_options())?;
        Snapshot::load(file)?.load_into(&vault)?;

        Ok(Self {
            config,
            file: file.to_path_buf(),
            vault: Arc::new(vault),
        })
    }

    /// Write the vault back to its file.
    pub fn persist(&self) -> Result<()> {
        Snapshot::capture(self.vault.as_ref())?.save(&self.file)?;
        info!("Saved {}", self.file.display());
        Ok(())
    }

    /// Embed query text off the async runtime, bounded by the configured timeout.
    pub async fn embed_query(&self, text: &str) -> Result<Embedding> {
        embed_with_timeout(self.vault.clone(), text.to_string(), self.config.embed_timeout()).await
    }
}

pub async fn embed_with_timeout(vault: Arc<CliVault>, text: String, timeout: Duration) -> Result<Embedding> {
    let task = tokio::task::spawn_blocking(move || vault.embed_query(&text));
    let vector = tokio::time::timeout(timeout, task)
        .await
        .with_context(|| format!("Query embedding timed out after {}s", timeout.as_secs()))?
        .context("Embedding task panicked")??;
    Ok(vector)
}

fn build_embedder(config: &VaultConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.embedding.provider.as_str() {
        "hash" => Ok(Box::new(HashEmbeddingProvider::new())),
        #[cfg(feature = "fastembed")]
        "fastembed" => Ok(Box::new(vault_core::FastEmbedProvider::new()?)),
        other => bail!("Unknown embedding provider '{}'", other),
    }
}

/// Format check shared by the commands.
pub fn is_json(format: &str) -> Result<bool> {
    match format {
        "json" => Ok(true),
        "table" => Ok(false),
        other => bail!("Unknown format '{}' (expected table or json)", other),
    }
}

pub fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}
