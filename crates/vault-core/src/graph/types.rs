use crate::error::VaultError;
use crate::types::{Entity, EntityId, Relationship, RelationshipId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Direction to follow relationships
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Relationships where the entity is the source.
    Outbound,

    /// Relationships where the entity is the target.
    Inbound,

    /// Both.
    Both,
}

impl FromStr for Direction {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "outbound" | "out" => Ok(Direction::Outbound),
            "inbound" | "in" => Ok(Direction::Inbound),
            "both" => Ok(Direction::Both),
            other => Err(VaultError::Validation(format!(
                "Unknown direction '{}' (expected outbound, inbound or both)",
                other
            ))),
        }
    }
}

/// Request for graph traversal
#[derive(Debug, Clone)]
pub struct TraversalRequest {
    pub start: EntityId,

    /// Maximum depth, inclusive. 0 = start entity only.
    pub max_depth: u32,

    pub direction: Direction,

    /// Only follow and report relationships with these types. None = all.
    pub relation_filter: Option<Vec<String>>,
}

impl TraversalRequest {
    pub fn new(start: impl Into<EntityId>) -> Self {
        Self {
            start: start.into(),
            max_depth: 3,
            direction: Direction::Both,
            relation_filter: None,
        }
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_relations(mut self, relations: Vec<String>) -> Self {
        self.relation_filter = Some(relations);
        self
    }

    pub(crate) fn follows(&self, relationship: &Relationship) -> bool {
        match &self.relation_filter {
            Some(relations) => relations.iter().any(|r| *r == relationship.relation),
            None => true,
        }
    }
}

/// One entity reached by a traversal
#[derive(Debug, Clone, Serialize)]
pub struct GraphNode {
    pub entity: Entity,

    /// Relationships touching the entity in the requested direction,
    /// after the type filter.
    pub relationships: Vec<Relationship>,

    /// Hop count from the start.
    pub depth: u32,
}

/// One hop of a path
#[derive(Debug, Clone, Serialize)]
pub struct PathStep {
    pub entity: Entity,
    pub depth: u32,
}

/// A shortest path through the graph
#[derive(Debug, Clone, Serialize)]
pub struct GraphPath {
    /// Ordered entities, start first.
    pub steps: Vec<PathStep>,

    /// Relationships crossed, in order.
    pub relationships: Vec<RelationshipId>,

    /// Number of hops.
    pub length: u32,
}

impl GraphPath {
    pub fn entity_ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.entity.id.as_str()).collect()
    }
}

/// Graph statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub relationships: usize,
    /// Distinct entities touched by at least one relationship.
    pub entities: usize,
    /// Relationship count per type.
    pub relationship_types: BTreeMap<String, usize>,
}
