use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;
use vault_core::{EmbeddingProvider, EntityStore, RawEntity, Relationship, Vault};

/// JSON vault file: the ingestion source on startup and the durable copy
/// written back after a command changes anything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub entities: Vec<RawEntity>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl Snapshot {
    /// Read a snapshot. A missing file is an empty vault.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No vault file at {}, starting empty", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read vault file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse vault file: {}", path.display()))
    }

    /// Write atomically: a sibling temp file renamed over the target.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("Failed to replace vault file: {}", path.display()))?;
        Ok(())
    }

    /// Current vault contents, including importance signals.
    pub fn capture<S: EntityStore, E: EmbeddingProvider>(vault: &Vault<S, E>) -> Result<Self> {
        let mut entities = Vec::new();
        for entity in vault.entities()? {
            let signal = vault.signal(&entity.id)?;
            entities.push(entity.to_raw(signal));
        }
        Ok(Self {
            entities,
            relationships: vault.all_relationships()?,
        })
    }

    /// Full scan into `vault`: every entity ingested, then every
    /// relationship restored with its original id.
    pub fn load_into<S: EntityStore, E: EmbeddingProvider>(self, vault: &Vault<S, E>) -> Result<()> {
        let entity_count = self.entities.len();
        let outcomes = vault
            .ingest_batch(self.entities)
            .context("Failed to ingest vault entities")?;
        let indexed = outcomes.iter().filter(|o| o.indexed).count();

        let relationship_count = self.relationships.len();
        for relationship in self.relationships {
            let id = relationship.id;
            vault
                .restore_relationship(relationship)
                .with_context(|| format!("Failed to restore relationship {}", id))?;
        }

        info!(
            "Loaded {} entities ({} indexed), {} relationships",
            entity_count, indexed, relationship_count
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use vault_core::{
        HashEmbeddingProvider, ImportanceSignal, MemoryStore, NewRelationship, RetentionTier, VaultOptions,
    };

    fn vault() -> Vault<MemoryStore, HashEmbeddingProvider> {
        Vault::new(
            MemoryStore::new(),
            HashEmbeddingProvider::new(),
            VaultOptions {
                dimension: 64,
                max_input_chars: 200,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let snapshot = Snapshot::load(&dir.path().join("nope.json")).unwrap();
        assert!(snapshot.entities.is_empty());
    }

    #[test]
    fn test_capture_save_load_preserves_vault() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vault.json");

        let original = vault();
        original
            .ingest(
                RawEntity::new("a", "Alpha", "first")
                    .with_tier(RetentionTier::LongTerm)
                    .with_signal(ImportanceSignal {
                        importance: 0.9,
                        last_active_at: None,
                        pinned: true,
                    }),
            )
            .unwrap();
        original.ingest(RawEntity::new("b", "Beta", "second")).unwrap();
        let rel = original
            .link(NewRelationship::new("a", "b", "references"))
            .unwrap();

        Snapshot::capture(&original).unwrap().save(&path).unwrap();

        let reopened = vault();
        Snapshot::load(&path).unwrap().load_into(&reopened).unwrap();

        let a = reopened.get("a").unwrap().unwrap();
        assert_eq!(a.tier, RetentionTier::LongTerm);
        assert!(reopened.signal("a").unwrap().unwrap().pinned);
        assert_eq!(reopened.all_relationships().unwrap()[0].id, rel.id);
        assert!(reopened.is_indexed("b").unwrap());
    }

    #[test]
    fn test_dangling_relationship_fails_to_load() {
        let snapshot: Snapshot = serde_json::from_value(serde_json::json!({
            "entities": [{"id": "a", "title": "Alpha"}],
            "relationships": [{
                "id": "01890a5d-ac96-774b-bcce-b302099a8057",
                "relation": "references",
                "source": "a",
                "target": "ghost",
                "created_at": "2024-01-01T00:00:00Z"
            }]
        }))
        .unwrap();

        assert!(snapshot.load_into(&vault()).is_err());
    }
}
