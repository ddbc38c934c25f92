use crate::error::{Result, VaultError};
use crate::graph::{paths, traversal, Direction, GraphNode, GraphPath, GraphStats, TraversalRequest};
use crate::storage::EntityStore;
use crate::types::{EntityId, NewRelationship, Relationship, RelationshipId};
use std::collections::{BTreeSet, HashMap};

/// Directed, typed multigraph over entity ids.
///
/// Relationships are indexed by source and by target so neighbour lookup
/// is O(1) in either direction. Per-entity sets are ordered by
/// relationship id, which is creation order.
#[derive(Debug, Default, Clone)]
pub struct RelationshipGraph {
    relationships: HashMap<RelationshipId, Relationship>,
    outbound: HashMap<EntityId, BTreeSet<RelationshipId>>,
    inbound: HashMap<EntityId, BTreeSet<RelationshipId>>,
}

impl RelationshipGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
    }

    pub fn get(&self, id: RelationshipId) -> Option<&Relationship> {
        self.relationships.get(&id)
    }

    /// Store a new relationship. Both endpoints must exist in `store`.
    pub fn add_relationship<S: EntityStore>(
        &mut self,
        store: &S,
        new: NewRelationship,
    ) -> Result<Relationship> {
        new.validate()?;
        Self::check_endpoints(store, &new.source, &new.target)?;

        let relationship = new.into_relationship();
        self.index(relationship.clone());
        Ok(relationship)
    }

    /// Re-insert a previously stored relationship, keeping its id and timestamp.
    pub fn restore<S: EntityStore>(&mut self, store: &S, relationship: Relationship) -> Result<()> {
        if self.relationships.contains_key(&relationship.id) {
            return Err(VaultError::InvalidRelationship {
                reason: format!("Relationship {} already exists", relationship.id),
            });
        }
        NewRelationship {
            relation: relationship.relation.clone(),
            source: relationship.source.clone(),
            target: relationship.target.clone(),
            metadata: HashMap::new(),
        }
        .validate()?;
        Self::check_endpoints(store, &relationship.source, &relationship.target)?;

        self.index(relationship);
        Ok(())
    }

    /// Remove a relationship from both indices.
    pub fn remove_relationship(&mut self, id: RelationshipId) -> Option<Relationship> {
        let relationship = self.relationships.remove(&id)?;
        Self::unindex(&mut self.outbound, &relationship.source, id);
        Self::unindex(&mut self.inbound, &relationship.target, id);
        Some(relationship)
    }

    /// Remove every relationship where `entity_id` is source or target.
    pub fn remove_entity(&mut self, entity_id: &str) -> Vec<Relationship> {
        let ids: Vec<RelationshipId> = self.relationship_ids(entity_id, Direction::Both);
        ids.into_iter()
            .filter_map(|id| self.remove_relationship(id))
            .collect()
    }

    /// Relationships touching an entity, in creation order.
    /// Unknown entities have none.
    pub fn relationships(&self, entity_id: &str, direction: Direction) -> Vec<&Relationship> {
        self.relationship_ids(entity_id, direction)
            .into_iter()
            .filter_map(|id| self.relationships.get(&id))
            .collect()
    }

    /// Every relationship, in creation order.
    pub fn all_relationships(&self) -> Vec<&Relationship> {
        let mut all: Vec<&Relationship> = self.relationships.values().collect();
        all.sort_by_key(|r| r.id);
        all
    }

    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats {
            relationships: self.relationships.len(),
            ..Default::default()
        };

        let mut entities = BTreeSet::new();
        for relationship in self.relationships.values() {
            entities.insert(relationship.source.as_str());
            entities.insert(relationship.target.as_str());
            *stats
                .relationship_types
                .entry(relationship.relation.clone())
                .or_insert(0) += 1;
        }
        stats.entities = entities.len();
        stats
    }

    /// Breadth-first traversal from `request.start`.
    pub fn traverse<S: EntityStore>(&self, store: &S, request: &TraversalRequest) -> Result<Vec<GraphNode>> {
        traversal::traverse(self, store, request)
    }

    /// Shortest path by hop count, ignoring relationship direction.
    pub fn find_path<S: EntityStore>(&self, store: &S, from: &str, to: &str) -> Result<Option<GraphPath>> {
        paths::find_path(self, store, from, to)
    }

    fn relationship_ids(&self, entity_id: &str, direction: Direction) -> Vec<RelationshipId> {
        let outbound = self.outbound.get(entity_id);
        let inbound = self.inbound.get(entity_id);

        let mut ids: Vec<RelationshipId> = match direction {
            Direction::Outbound => outbound.into_iter().flatten().copied().collect(),
            Direction::Inbound => inbound.into_iter().flatten().copied().collect(),
            Direction::Both => outbound
                .into_iter()
                .flatten()
                .chain(inbound.into_iter().flatten())
                .copied()
                .collect(),
        };
        if direction == Direction::Both {
            ids.sort_unstable();
        }
        ids
    }

    fn check_endpoints<S: EntityStore>(store: &S, source: &str, target: &str) -> Result<()> {
        for endpoint in [source, target] {
            if !store.contains(endpoint)? {
                return Err(VaultError::EntityNotFound(endpoint.to_string()));
            }
        }
        Ok(())
    }

    fn index(&mut self, relationship: Relationship) {
        self.outbound
            .entry(relationship.source.clone())
            .or_default()
            .insert(relationship.id);
        self.inbound
            .entry(relationship.target.clone())
            .or_default()
            .insert(relationship.id);
        self.relationships.insert(relationship.id, relationship);
    }

    fn unindex(index: &mut HashMap<EntityId, BTreeSet<RelationshipId>>, entity_id: &str, id: RelationshipId) {
        if let Some(ids) = index.get_mut(entity_id) {
            ids.remove(&id);
            if ids.is_empty() {
                index.remove(entity_id);
            }
        }
    }
}
