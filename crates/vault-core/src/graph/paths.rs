use crate::error::Result;
use crate::graph::{Direction, GraphPath, PathStep, RelationshipGraph};
use crate::storage::EntityStore;
use crate::types::{EntityId, RelationshipId};
use std::collections::{HashMap, HashSet, VecDeque};

/// Unweighted shortest path using BFS.
///
/// Relationships are followed in both directions regardless of how they
/// were declared. Only entities present in the store are walked through;
/// a missing start or end is unreachable.
pub fn find_path<S: EntityStore>(
    graph: &RelationshipGraph,
    store: &S,
    from: &str,
    to: &str,
) -> Result<Option<GraphPath>> {
    if !store.contains(from)? || !store.contains(to)? {
        return Ok(None);
    }

    let mut queue = VecDeque::new();
    let mut visited: HashSet<EntityId> = HashSet::new();
    let mut parent: HashMap<EntityId, (EntityId, RelationshipId)> = HashMap::new();

    queue.push_back(from.to_string());
    visited.insert(from.to_string());

    while let Some(current) = queue.pop_front() {
        if current == to {
            return reconstruct_path(store, from, to, &parent);
        }

        for relationship in graph.relationships(&current, Direction::Both) {
            let next = relationship.other_end(&current);
            if visited.contains(next) {
                continue;
            }
            visited.insert(next.clone());
            if !store.contains(next)? {
                continue;
            }
            parent.insert(next.clone(), (current.clone(), relationship.id));
            queue.push_back(next.clone());
        }
    }

    // No path found
    Ok(None)
}

/// Reconstruct path from parent map
fn reconstruct_path<S: EntityStore>(
    store: &S,
    from: &str,
    to: &str,
    parent: &HashMap<EntityId, (EntityId, RelationshipId)>,
) -> Result<Option<GraphPath>> {
    let mut ids = vec![to.to_string()];
    let mut relationships = Vec::new();
    let mut current = to.to_string();

    while current != from {
        match parent.get(&current) {
            Some((prev, relationship_id)) => {
                ids.push(prev.clone());
                relationships.push(*relationship_id);
                current = prev.clone();
            }
            None => return Ok(None),
        }
    }

    ids.reverse();
    relationships.reverse();

    let mut steps = Vec::with_capacity(ids.len());
    for (depth, id) in ids.iter().enumerate() {
        match store.get(id)? {
            Some(entity) => steps.push(PathStep {
                entity,
                depth: depth as u32,
            }),
            None => return Ok(None),
        }
    }

    let length = relationships.len() as u32;
    Ok(Some(GraphPath {
        steps,
        relationships,
        length,
    }))
}
