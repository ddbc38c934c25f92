mod evolution;

pub use evolution::{evaluate, EvolutionPolicy, TierDecision, TransitionKind};

use crate::types::{EntityId, ExposureCode, RetentionTier};
use serde::Serialize;

/// Result of evolving one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvolutionOutcome {
    pub entity_id: EntityId,
    pub from: RetentionTier,
    pub to: RetentionTier,
    pub exposure: ExposureCode,
    /// Rules that fired, in order.
    pub steps: Vec<TransitionKind>,
    /// The entity was re-embedded and upserted.
    pub reindexed: bool,
    /// A stale vector record was dropped because the entity is now suppressed.
    pub unindexed: bool,
    /// The caller must persist the entity when this is set.
    pub changed: bool,
}

/// Counts from one sweep over every entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvolutionReport {
    pub evaluated: usize,
    pub promoted: usize,
    pub demoted: usize,
    pub pinned: usize,
    pub reindexed: usize,
    pub unindexed: usize,
    /// Ids of entities whose tier changed.
    pub changed: Vec<EntityId>,
    /// Entities that could not be evolved, with the error message.
    pub failed: Vec<(EntityId, String)>,
}

impl EvolutionReport {
    pub fn has_changes(&self) -> bool {
        !self.changed.is_empty()
    }
}
