use crate::error::{Result, VaultError};
use crate::events::{EventBus, VaultEvent, VaultObserver};
use crate::graph::{Direction, GraphNode, GraphPath, GraphStats, RelationshipGraph, TraversalRequest};
use crate::lifecycle::{evaluate, EvolutionOutcome, EvolutionPolicy, EvolutionReport, TransitionKind};
use crate::policy;
use crate::storage::EntityStore;
use crate::types::{
    Embedding, Entity, EntityId, ImportanceSignal, NewRelationship, RawEntity, Relationship,
    RelationshipId, RetentionTier, Sensitivity, TierTransition,
};
use crate::vector::{EmbeddingProvider, SearchHit, SimilarityIndex, VectorFilter, VectorRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Sizing for the embedded vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaultOptions {
    /// Embedding dimension. Every indexed vector has exactly this many values.
    pub dimension: usize,
    /// Embedding input is truncated to this many characters.
    pub max_input_chars: usize,
}

impl Default for VaultOptions {
    fn default() -> Self {
        Self {
            dimension: 384,
            max_input_chars: 2000,
        }
    }
}

/// A similarity query as received from the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub text: String,
    pub top_k: usize,
    pub clearance_ceiling: u8,
    pub tier: Option<RetentionTier>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, top_k: usize, clearance_ceiling: u8) -> Self {
        Self {
            text: text.into(),
            top_k,
            clearance_ceiling,
            tier: None,
        }
    }

    pub fn with_tier(mut self, tier: RetentionTier) -> Self {
        self.tier = Some(tier);
        self
    }

    fn filter(&self) -> VectorFilter {
        let filter = VectorFilter::new(self.clearance_ceiling);
        match self.tier {
            Some(tier) => filter.with_tier(tier),
            None => filter,
        }
    }
}

/// One ranked search result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub id: EntityId,
    pub title: String,
    pub score: f32,
    pub tier: RetentionTier,
    pub path: String,
}

/// A search hit or an entity reached from one through the graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Discovery {
    pub id: EntityId,
    pub title: String,
    pub tier: RetentionTier,
    pub path: String,
    /// Similarity score. None for graph expansions.
    pub score: Option<f32>,
    /// Hops from the search hit. 0 for hits.
    pub depth: u32,
    /// The search hit this entity was reached from.
    pub via: Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestOutcome {
    pub entity: Entity,
    pub indexed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VaultStats {
    pub entities: usize,
    pub indexed: usize,
    pub relationships: usize,
    pub by_tier: BTreeMap<String, usize>,
    pub by_exposure: BTreeMap<String, usize>,
    pub transitions: usize,
}

/// Sensitivity-aware knowledge vault.
///
/// The similarity index and relationship graph are in memory and rebuilt
/// from the entity store on [`Vault::open`]. Mutations are serialised by a
/// writer gate; reads take shared locks and never see a half-applied
/// record.
///
/// # Example
/// ```rust
/// use vault_core::{HashEmbeddingProvider, MemoryStore, RawEntity, SearchQuery, Vault, VaultOptions};
///
/// let vault = Vault::open(MemoryStore::new(), HashEmbeddingProvider::new(), VaultOptions::default()).unwrap();
/// vault.ingest(RawEntity::new("n1", "Borrow checker", "Lifetimes and ownership")).unwrap();
/// let results = vault.search(&SearchQuery::new("ownership", 5, 3)).unwrap();
/// assert_eq!(results[0].id, "n1");
/// ```
pub struct Vault<S: EntityStore, E: EmbeddingProvider> {
    store: S,
    embedder: E,
    options: VaultOptions,
    index: RwLock<SimilarityIndex>,
    graph: RwLock<RelationshipGraph>,
    signals: RwLock<HashMap<EntityId, ImportanceSignal>>,
    transitions: RwLock<Vec<TierTransition>>,
    events: EventBus,
    writer: Mutex<()>,
}

impl<S: EntityStore, E: EmbeddingProvider> Vault<S, E> {
    /// Create a vault with an empty index. Entities already in `store` are
    /// not indexed until [`Vault::rebuild_index`] runs.
    pub fn new(store: S, embedder: E, options: VaultOptions) -> Result<Self> {
        if options.max_input_chars == 0 {
            return Err(VaultError::Validation(
                "max_input_chars must be greater than 0".to_string(),
            ));
        }
        let index = SimilarityIndex::new(options.dimension)?;

        Ok(Self {
            store,
            embedder,
            options,
            index: RwLock::new(index),
            graph: RwLock::new(RelationshipGraph::new()),
            signals: RwLock::new(HashMap::new()),
            transitions: RwLock::new(Vec::new()),
            events: EventBus::new(),
            writer: Mutex::new(()),
        })
    }

    /// Create a vault and rebuild the index from a full scan of `store`.
    pub fn open(store: S, embedder: E, options: VaultOptions) -> Result<Self> {
        let vault = Self::new(store, embedder, options)?;
        let indexed = vault.rebuild_index()?;
        log::info!(
            "Vault opened with {} embedder: {} entities indexed",
            vault.embedder.name(),
            indexed
        );
        Ok(vault)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    pub fn options(&self) -> VaultOptions {
        self.options
    }

    pub fn subscribe(&self, observer: Box<dyn VaultObserver>) {
        self.events.subscribe(observer);
    }

    /// Discard the index and re-embed every entity in the store.
    /// Returns the number of records indexed.
    pub fn rebuild_index(&self) -> Result<usize> {
        let _gate = self.gate()?;

        let mut records = Vec::new();
        for entity in self.store.list()? {
            if let Some(record) = self.vector_record(&entity)? {
                records.push(record);
            }
        }

        let mut index = SimilarityIndex::new(self.options.dimension)?;
        let count = records.len();
        index.upsert(records)?;
        *self.write_index()? = index;
        Ok(count)
    }

    // --- Entities ---

    /// Ingest one entity, replacing any entity with the same id.
    pub fn ingest(&self, raw: RawEntity) -> Result<IngestOutcome> {
        let mut outcomes = self.ingest_batch(vec![raw])?;
        outcomes
            .pop()
            .ok_or_else(|| VaultError::Validation("Ingest produced no outcome".to_string()))
    }

    /// Ingest a batch. Every entity is validated and embedded before any is
    /// applied, so an invalid entity or embedding failure changes nothing.
    /// A store failure part-way rolls the store back.
    pub fn ingest_batch(&self, raws: Vec<RawEntity>) -> Result<Vec<IngestOutcome>> {
        let mut seen = HashSet::new();
        for raw in &raws {
            if !seen.insert(raw.id.as_str()) {
                return Err(VaultError::DuplicateEntity(raw.id.clone()));
            }
        }

        let outcomes = {
            let _gate = self.gate()?;
            self.ingest_locked(&raws)?
        };

        self.publish(
            outcomes
                .iter()
                .filter(|o| o.indexed)
                .map(|o| VaultEvent::EntityIndexed {
                    entity_id: o.entity.id.clone(),
                    exposure: o.entity.exposure(),
                })
                .collect(),
        );

        log::debug!(
            "Ingested {} entities ({} indexed)",
            outcomes.len(),
            outcomes.iter().filter(|o| o.indexed).count()
        );
        Ok(outcomes)
    }

    fn ingest_locked(&self, raws: &[RawEntity]) -> Result<Vec<IngestOutcome>> {
        let mut prepared = Vec::with_capacity(raws.len());
        for raw in raws {
            let entity = Entity::from_raw(raw)?;
            if let Some(signal) = &raw.signal {
                signal.validate()?;
            }
            let record = self.vector_record(&entity)?;
            prepared.push((entity, record, raw.signal));
        }

        // Store first, so the index never holds records for unstored entities
        let mut previous = Vec::with_capacity(prepared.len());
        for (entity, _, _) in &prepared {
            let step = self.store.get(&entity.id).and_then(|prior| {
                self.store.put(entity)?;
                Ok(prior)
            });
            match step {
                Ok(prior) => previous.push((entity.id.clone(), prior)),
                Err(e) => {
                    self.restore_store(previous);
                    return Err(e);
                }
            }
        }

        let indexed = self.write_index().and_then(|mut index| {
            let records: Vec<VectorRecord> = prepared
                .iter()
                .filter_map(|(_, record, _)| record.clone())
                .collect();
            index.upsert(records)?;
            for (entity, record, _) in &prepared {
                if record.is_none() {
                    index.remove(&entity.id);
                }
            }
            Ok(())
        });
        if let Err(e) = indexed {
            self.restore_store(previous);
            return Err(e);
        }

        let mut signals = self.write_signals()?;
        let mut outcomes = Vec::with_capacity(prepared.len());
        for (entity, record, signal) in prepared {
            match signal {
                Some(signal) => {
                    signals.insert(entity.id.clone(), signal);
                }
                None => {
                    signals.entry(entity.id.clone()).or_default();
                }
            }
            outcomes.push(IngestOutcome {
                entity,
                indexed: record.is_some(),
            });
        }
        Ok(outcomes)
    }

    /// Undo store writes, newest first.
    fn restore_store(&self, applied: Vec<(EntityId, Option<Entity>)>) {
        for (id, prior) in applied.into_iter().rev() {
            let undone = match prior {
                Some(entity) => self.store.put(&entity),
                None => self.store.remove(&id).map(|_| ()),
            };
            if let Err(e) = undone {
                log::warn!("Failed to roll back entity {}: {}", id, e);
            }
        }
    }

    /// Re-classify an entity. The exposure code is recomputed and the
    /// index refreshed, or the record dropped when now suppressed.
    pub fn reclassify(&self, id: &str, sensitivity: Sensitivity) -> Result<Entity> {
        let (updated, reindexed) = {
            let _gate = self.gate()?;
            let entity = self.require(id)?;
            let updated = entity.with_sensitivity(sensitivity)?;
            let (reindexed, _) = self.replace_entity(&updated)?;
            (updated, reindexed)
        };

        log::info!(
            "Reclassified {} to level {} ({})",
            id,
            sensitivity.level,
            updated.exposure()
        );
        if reindexed {
            self.publish(vec![VaultEvent::EntityIndexed {
                entity_id: updated.id.clone(),
                exposure: updated.exposure(),
            }]);
        }
        Ok(updated)
    }

    /// Delete an entity, cascading removal of every relationship touching it.
    /// Returns the removed relationships.
    pub fn delete_entity(&self, id: &str) -> Result<Vec<Relationship>> {
        let (removed, relationships) = {
            let _gate = self.gate()?;
            let removed = self
                .store
                .remove(id)?
                .ok_or_else(|| VaultError::EntityNotFound(id.to_string()))?;
            let relationships = self.write_graph()?.remove_entity(id);
            self.write_index()?.remove(id);
            self.write_signals()?.remove(id);
            (removed, relationships)
        };

        log::info!(
            "Deleted entity {} and {} relationships",
            id,
            relationships.len()
        );
        let mut events: Vec<VaultEvent> = relationships
            .iter()
            .map(VaultEvent::relationship_removed)
            .collect();
        events.push(VaultEvent::EntityRemoved {
            entity_id: removed.id,
        });
        self.publish(events);
        Ok(relationships)
    }

    pub fn get(&self, id: &str) -> Result<Option<Entity>> {
        self.store.get(id)
    }

    pub fn entities(&self) -> Result<Vec<Entity>> {
        self.store.list()
    }

    pub fn is_indexed(&self, id: &str) -> Result<bool> {
        Ok(self.read_index()?.contains(id))
    }

    // --- Search ---

    /// Embed free query text, bounded to the configured input length.
    /// Blank text embeds to the zero vector, which matches nothing.
    pub fn embed_query(&self, text: &str) -> Result<Embedding> {
        let text = policy::truncate_chars(text, self.options.max_input_chars);
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.options.dimension]);
        }
        self.embedder.embed(text, self.options.dimension)
    }

    /// Ranked similarity search under the query's clearance ceiling.
    pub fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>> {
        let vector = self.embed_query(&query.text)?;
        self.search_vector(&vector, query)
    }

    /// Search with a vector embedded by the caller. A zero-magnitude
    /// vector scores 0 against everything and returns no results.
    pub fn search_vector(&self, vector: &[f32], query: &SearchQuery) -> Result<Vec<SearchResult>> {
        if vector.len() != self.options.dimension {
            return Err(VaultError::DimensionMismatch {
                expected: self.options.dimension,
                got: vector.len(),
            });
        }
        if vector.iter().all(|v| *v == 0.0) {
            return Ok(Vec::new());
        }

        let hits = self
            .read_index()?
            .query(vector, query.top_k, Some(&query.filter()))?;

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            if let Some(result) = self.resolve_hit(hit)? {
                results.push(result);
            }
        }
        Ok(results)
    }

    /// Search hits expanded through the graph up to `depth` hops.
    ///
    /// Expansions honour the same clearance ceiling and never include
    /// suppressed entities. Filtered entities are still traversed through,
    /// just not returned.
    pub fn discover(&self, query: &SearchQuery, depth: u32) -> Result<Vec<Discovery>> {
        let vector = self.embed_query(&query.text)?;
        self.discover_vector(&vector, query, depth)
    }

    pub fn discover_vector(&self, vector: &[f32], query: &SearchQuery, depth: u32) -> Result<Vec<Discovery>> {
        let hits = self.search_vector(vector, query)?;

        let mut seen: HashSet<EntityId> = hits.iter().map(|h| h.id.clone()).collect();
        let mut discoveries: Vec<Discovery> = hits
            .iter()
            .map(|hit| Discovery {
                id: hit.id.clone(),
                title: hit.title.clone(),
                tier: hit.tier,
                path: hit.path.clone(),
                score: Some(hit.score),
                depth: 0,
                via: None,
            })
            .collect();

        if depth == 0 {
            return Ok(discoveries);
        }

        let graph = self.read_graph()?;
        for hit in &hits {
            let request = TraversalRequest::new(hit.id.clone())
                .with_max_depth(depth)
                .with_direction(Direction::Both);

            for node in graph.traverse(&self.store, &request)? {
                let entity = node.entity;
                if node.depth == 0 || seen.contains(&entity.id) {
                    continue;
                }
                if entity.sensitivity.level > query.clearance_ceiling || !entity.exposure().may_embed() {
                    continue;
                }
                seen.insert(entity.id.clone());
                discoveries.push(Discovery {
                    id: entity.id,
                    title: entity.title,
                    tier: entity.tier,
                    path: entity.source,
                    score: None,
                    depth: node.depth,
                    via: Some(hit.id.clone()),
                });
            }
        }

        Ok(discoveries)
    }

    // --- Relationships ---

    /// Create a relationship between two existing entities.
    pub fn link(&self, new: NewRelationship) -> Result<Relationship> {
        let relationship = {
            let _gate = self.gate()?;
            self.write_graph()?.add_relationship(&self.store, new)?
        };

        log::debug!(
            "Linked {} -[{}]-> {}",
            relationship.source,
            relationship.relation,
            relationship.target
        );
        self.publish(vec![VaultEvent::RelationshipCreated {
            relationship: relationship.clone(),
        }]);
        Ok(relationship)
    }

    /// Re-insert a stored relationship (snapshot loading). Emits no event.
    pub fn restore_relationship(&self, relationship: Relationship) -> Result<()> {
        let _gate = self.gate()?;
        self.write_graph()?.restore(&self.store, relationship)
    }

    /// Remove a relationship. Returns whether it existed.
    pub fn unlink(&self, id: RelationshipId) -> Result<bool> {
        let removed = {
            let _gate = self.gate()?;
            self.write_graph()?.remove_relationship(id)
        };

        match removed {
            Some(relationship) => {
                self.publish(vec![VaultEvent::relationship_removed(&relationship)]);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn relationships(&self, entity_id: &str, direction: Direction) -> Result<Vec<Relationship>> {
        Ok(self
            .read_graph()?
            .relationships(entity_id, direction)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn all_relationships(&self) -> Result<Vec<Relationship>> {
        Ok(self
            .read_graph()?
            .all_relationships()
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn traverse(&self, request: &TraversalRequest) -> Result<Vec<GraphNode>> {
        self.read_graph()?.traverse(&self.store, request)
    }

    pub fn find_path(&self, from: &str, to: &str) -> Result<Option<GraphPath>> {
        self.read_graph()?.find_path(&self.store, from, to)
    }

    pub fn graph_stats(&self) -> Result<GraphStats> {
        Ok(self.read_graph()?.stats())
    }

    // --- Signals ---

    pub fn signal(&self, id: &str) -> Result<Option<ImportanceSignal>> {
        Ok(self.read_signals()?.get(id).copied())
    }

    pub fn set_signal(&self, id: &str, signal: ImportanceSignal) -> Result<()> {
        signal.validate()?;
        let _gate = self.gate()?;
        self.require(id)?;
        self.write_signals()?.insert(id.to_string(), signal);
        Ok(())
    }

    /// Record a read or edit. Importance moves by `importance_delta`,
    /// clamped to [0.0, 1.0]; the activity timestamp never moves backwards.
    pub fn record_activity(
        &self,
        id: &str,
        at: DateTime<Utc>,
        importance_delta: f32,
    ) -> Result<ImportanceSignal> {
        if !importance_delta.is_finite() {
            return Err(VaultError::Validation(format!(
                "Importance delta {} is not finite",
                importance_delta
            )));
        }
        let _gate = self.gate()?;
        self.require(id)?;

        let mut signals = self.write_signals()?;
        let signal = signals.entry(id.to_string()).or_default();
        signal.importance = (signal.importance + importance_delta).clamp(0.0, 1.0);
        signal.last_active_at = Some(match signal.last_active_at {
            Some(previous) if previous > at => previous,
            _ => at,
        });
        Ok(*signal)
    }

    pub fn set_pinned(&self, id: &str, pinned: bool) -> Result<ImportanceSignal> {
        let _gate = self.gate()?;
        self.require(id)?;
        let mut signals = self.write_signals()?;
        let signal = signals.entry(id.to_string()).or_default();
        signal.pinned = pinned;
        Ok(*signal)
    }

    // --- Lifecycle ---

    /// Evaluate one entity against `policy`. When the tier changes the
    /// exposure code is recomputed and the entity re-embedded, or removed
    /// from the index when now suppressed. Persisting the changed entity
    /// durably is the caller's job when `changed` is set.
    pub fn evolve(&self, id: &str, policy: &EvolutionPolicy, now: DateTime<Utc>) -> Result<EvolutionOutcome> {
        policy.validate()?;
        let mut events = Vec::new();
        let outcome = {
            let _gate = self.gate()?;
            self.evolve_locked(id, policy, now, &mut events)?
        };
        self.publish(events);
        Ok(outcome)
    }

    /// Evolve every entity in the store. Failures are collected, not fatal.
    pub fn evolve_all(&self, policy: &EvolutionPolicy, now: DateTime<Utc>) -> Result<EvolutionReport> {
        policy.validate()?;
        let mut events = Vec::new();
        let mut report = EvolutionReport::default();
        {
            let _gate = self.gate()?;
            for entity in self.store.list()? {
                report.evaluated += 1;
                match self.evolve_locked(&entity.id, policy, now, &mut events) {
                    Ok(outcome) => {
                        for step in &outcome.steps {
                            match step {
                                TransitionKind::Pinned => report.pinned += 1,
                                TransitionKind::Promoted => report.promoted += 1,
                                TransitionKind::Demoted => report.demoted += 1,
                                TransitionKind::Manual => {}
                            }
                        }
                        if outcome.reindexed {
                            report.reindexed += 1;
                        }
                        if outcome.unindexed {
                            report.unindexed += 1;
                        }
                        if outcome.changed {
                            report.changed.push(outcome.entity_id);
                        }
                    }
                    Err(e) => {
                        log::warn!("Evolution failed for {}: {}", entity.id, e);
                        report.failed.push((entity.id, e.to_string()));
                    }
                }
            }
        }
        self.publish(events);

        log::info!(
            "Evolution sweep: {} evaluated, {} changed, {} failed",
            report.evaluated,
            report.changed.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Move an entity to `to` by hand, recorded as a non-automatic
    /// transition. Canonical is reached only by pinning.
    pub fn transition(
        &self,
        id: &str,
        to: RetentionTier,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<EvolutionOutcome> {
        if to == RetentionTier::Canonical {
            return Err(VaultError::Validation(
                "Entities become canonical only by pinning".to_string(),
            ));
        }
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(VaultError::Validation(
                "A manual transition needs a reason".to_string(),
            ));
        }

        let mut events = Vec::new();
        let outcome = {
            let _gate = self.gate()?;
            let entity = self.require(id)?;
            if entity.tier == to {
                EvolutionOutcome {
                    entity_id: entity.id.clone(),
                    from: to,
                    to,
                    exposure: entity.exposure(),
                    steps: Vec::new(),
                    reindexed: false,
                    unindexed: false,
                    changed: false,
                }
            } else {
                let (updated, reindexed, unindexed) =
                    self.apply_tier(&entity, to, reason, false, now, &mut events)?;
                EvolutionOutcome {
                    exposure: updated.exposure(),
                    entity_id: updated.id,
                    from: entity.tier,
                    to,
                    steps: vec![TransitionKind::Manual],
                    reindexed,
                    unindexed,
                    changed: true,
                }
            }
        };
        self.publish(events);
        Ok(outcome)
    }

    /// Archive an entity by hand.
    pub fn archive(&self, id: &str, reason: &str, now: DateTime<Utc>) -> Result<EvolutionOutcome> {
        self.transition(id, RetentionTier::Archived, reason, now)
    }

    /// Tier transitions, oldest first. `None` returns every entity's.
    pub fn history(&self, id: Option<&str>) -> Result<Vec<TierTransition>> {
        Ok(self
            .read_transitions()?
            .iter()
            .filter(|t| id.map_or(true, |id| t.entity_id == id))
            .cloned()
            .collect())
    }

    pub fn stats(&self) -> Result<VaultStats> {
        let entities = self.store.list()?;
        let mut stats = VaultStats {
            entities: entities.len(),
            indexed: self.read_index()?.len(),
            relationships: self.read_graph()?.len(),
            transitions: self.read_transitions()?.len(),
            ..Default::default()
        };
        for entity in &entities {
            *stats.by_tier.entry(entity.tier.to_string()).or_insert(0) += 1;
            *stats
                .by_exposure
                .entry(entity.exposure().to_string())
                .or_insert(0) += 1;
        }
        Ok(stats)
    }

    fn evolve_locked(
        &self,
        id: &str,
        policy: &EvolutionPolicy,
        now: DateTime<Utc>,
        events: &mut Vec<VaultEvent>,
    ) -> Result<EvolutionOutcome> {
        let entity = self.require(id)?;
        let signal = self.read_signals()?.get(id).copied().unwrap_or_default();

        let decision = evaluate(entity.tier, &signal, policy, now);
        if !decision.changed() {
            return Ok(EvolutionOutcome {
                exposure: entity.exposure(),
                entity_id: entity.id,
                from: decision.from,
                to: decision.to,
                steps: Vec::new(),
                reindexed: false,
                unindexed: false,
                changed: false,
            });
        }

        let (updated, reindexed, unindexed) =
            self.apply_tier(&entity, decision.to, &decision.reason, true, now, events)?;
        Ok(EvolutionOutcome {
            exposure: updated.exposure(),
            entity_id: updated.id,
            from: decision.from,
            to: decision.to,
            steps: decision.steps,
            reindexed,
            unindexed,
            changed: true,
        })
    }

    /// Write `entity` at tier `to`, refresh its index record and log the
    /// transition. Queues the resulting events. Caller holds the gate.
    fn apply_tier(
        &self,
        entity: &Entity,
        to: RetentionTier,
        reason: &str,
        automatic: bool,
        now: DateTime<Utc>,
        events: &mut Vec<VaultEvent>,
    ) -> Result<(Entity, bool, bool)> {
        let updated = entity.with_tier(to)?;
        let (reindexed, unindexed) = self.replace_entity(&updated)?;

        self.write_transitions()?.push(TierTransition {
            entity_id: updated.id.clone(),
            from: entity.tier,
            to,
            reason: reason.to_string(),
            automatic,
            at: now,
        });

        log::info!(
            "{} {}: {} -> {} ({}), exposure {}",
            if automatic { "Evolved" } else { "Moved" },
            updated.id,
            entity.tier,
            to,
            reason,
            updated.exposure()
        );
        events.push(VaultEvent::TierChanged {
            entity_id: updated.id.clone(),
            from: entity.tier,
            to,
            exposure: updated.exposure(),
        });
        if reindexed {
            events.push(VaultEvent::EntityIndexed {
                entity_id: updated.id.clone(),
                exposure: updated.exposure(),
            });
        }
        Ok((updated, reindexed, unindexed))
    }

    /// Replace a stored entity and its index record together. Embedding
    /// runs first, and a failed store write restores the old record, so
    /// any error leaves both as they were. Returns (reindexed, unindexed).
    fn replace_entity(&self, updated: &Entity) -> Result<(bool, bool)> {
        let record = self.vector_record(updated)?;
        let previous = self.read_index()?.get(&updated.id).cloned();

        let (reindexed, unindexed) = {
            let mut index = self.write_index()?;
            match record {
                Some(record) => {
                    index.upsert(vec![record])?;
                    (true, false)
                }
                None => (false, index.remove(&updated.id).is_some()),
            }
        };

        if let Err(e) = self.store.put(updated) {
            let mut index = self.write_index()?;
            match previous {
                Some(record) => index.upsert(vec![record])?,
                None => {
                    index.remove(&updated.id);
                }
            }
            return Err(e);
        }
        Ok((reindexed, unindexed))
    }

    fn publish(&self, events: Vec<VaultEvent>) {
        for event in events {
            self.events.emit(event);
        }
    }

    fn vector_record(&self, entity: &Entity) -> Result<Option<VectorRecord>> {
        let text = match policy::embedding_text(entity, self.options.max_input_chars) {
            Some(text) => text,
            None => return Ok(None),
        };
        let vector = self.embedder.embed(&text, self.options.dimension)?;

        Ok(Some(VectorRecord {
            id: entity.id.clone(),
            vector,
            exposure: entity.exposure(),
            tier: entity.tier,
            clearance: entity.sensitivity.level,
            source: entity.source.clone(),
        }))
    }

    fn resolve_hit(&self, hit: SearchHit) -> Result<Option<SearchResult>> {
        Ok(self.store.get(&hit.id)?.map(|entity| SearchResult {
            id: hit.id,
            title: entity.title,
            score: hit.score,
            tier: hit.tier,
            path: hit.source,
        }))
    }

    fn require(&self, id: &str) -> Result<Entity> {
        self.store
            .get(id)?
            .ok_or_else(|| VaultError::EntityNotFound(id.to_string()))
    }

    fn gate(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.writer
            .lock()
            .map_err(|_| VaultError::LockPoisoned("writer gate"))
    }

    fn read_index(&self) -> Result<RwLockReadGuard<'_, SimilarityIndex>> {
        self.index
            .read()
            .map_err(|_| VaultError::LockPoisoned("similarity index"))
    }

    fn write_index(&self) -> Result<RwLockWriteGuard<'_, SimilarityIndex>> {
        self.index
            .write()
            .map_err(|_| VaultError::LockPoisoned("similarity index"))
    }

    fn read_graph(&self) -> Result<RwLockReadGuard<'_, RelationshipGraph>> {
        self.graph
            .read()
            .map_err(|_| VaultError::LockPoisoned("relationship graph"))
    }

    fn write_graph(&self) -> Result<RwLockWriteGuard<'_, RelationshipGraph>> {
        self.graph
            .write()
            .map_err(|_| VaultError::LockPoisoned("relationship graph"))
    }

    fn read_signals(&self) -> Result<RwLockReadGuard<'_, HashMap<EntityId, ImportanceSignal>>> {
        self.signals
            .read()
            .map_err(|_| VaultError::LockPoisoned("signals"))
    }

    fn write_signals(&self) -> Result<RwLockWriteGuard<'_, HashMap<EntityId, ImportanceSignal>>> {
        self.signals
            .write()
            .map_err(|_| VaultError::LockPoisoned("signals"))
    }

    fn read_transitions(&self) -> Result<RwLockReadGuard<'_, Vec<TierTransition>>> {
        self.transitions
            .read()
            .map_err(|_| VaultError::LockPoisoned("transition log"))
    }

    fn write_transitions(&self) -> Result<RwLockWriteGuard<'_, Vec<TierTransition>>> {
        self.transitions
            .write()
            .map_err(|_| VaultError::LockPoisoned("transition log"))
    }
}
