use crate::error::{Result, VaultError};
use crate::types::{Entity, EntityId};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Entity store seam. The vault keeps its index and graph in memory and
/// delegates entity ownership to an implementation of this trait.
pub trait EntityStore: Send + Sync {
    /// Store an entity (insert or replace)
    fn put(&self, entity: &Entity) -> Result<()>;

    /// Retrieve an entity by ID
    fn get(&self, id: &str) -> Result<Option<Entity>>;

    /// Remove an entity, returning it if it existed
    fn remove(&self, id: &str) -> Result<Option<Entity>>;

    /// All entities, ordered by id
    fn list(&self) -> Result<Vec<Entity>>;

    fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.get(id)?.is_some())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.list()?.len())
    }
}

/// In-memory entity store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entities: RwLock<BTreeMap<EntityId, Entity>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EntityStore for MemoryStore {
    fn put(&self, entity: &Entity) -> Result<()> {
        let mut entities = self
            .entities
            .write()
            .map_err(|_| VaultError::LockPoisoned("entity store"))?;
        entities.insert(entity.id.clone(), entity.clone());
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<Entity>> {
        let entities = self
            .entities
            .read()
            .map_err(|_| VaultError::LockPoisoned("entity store"))?;
        Ok(entities.get(id).cloned())
    }

    fn remove(&self, id: &str) -> Result<Option<Entity>> {
        let mut entities = self
            .entities
            .write()
            .map_err(|_| VaultError::LockPoisoned("entity store"))?;
        Ok(entities.remove(id))
    }

    fn list(&self) -> Result<Vec<Entity>> {
        let entities = self
            .entities
            .read()
            .map_err(|_| VaultError::LockPoisoned("entity store"))?;
        Ok(entities.values().cloned().collect())
    }

    fn contains(&self, id: &str) -> Result<bool> {
        let entities = self
            .entities
            .read()
            .map_err(|_| VaultError::LockPoisoned("entity store"))?;
        Ok(entities.contains_key(id))
    }

    fn len(&self) -> Result<usize> {
        let entities = self
            .entities
            .read()
            .map_err(|_| VaultError::LockPoisoned("entity store"))?;
        Ok(entities.len())
    }
}

impl<S: EntityStore> EntityStore for std::sync::Arc<S> {
    fn put(&self, entity: &Entity) -> Result<()> {
        (**self).put(entity)
    }
    fn get(&self, id: &str) -> Result<Option<Entity>> {
        (**self).get(id)
    }
    fn remove(&self, id: &str) -> Result<Option<Entity>> {
        (**self).remove(id)
    }
    fn list(&self) -> Result<Vec<Entity>> {
        (**self).list()
    }
    fn contains(&self, id: &str) -> Result<bool> {
        (**self).contains(id)
    }
    fn len(&self) -> Result<usize> {
        (**self).len()
    }
}
