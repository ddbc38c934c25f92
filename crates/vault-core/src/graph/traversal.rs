use crate::error::Result;
use crate::graph::{GraphNode, RelationshipGraph, TraversalRequest};
use crate::storage::EntityStore;
use crate::types::EntityId;
use std::collections::{HashSet, VecDeque};

/// Breadth-first traversal.
///
/// Entities are marked visited when enqueued, so each is reported once at
/// its minimum depth and cycles terminate. Entities absent from the store
/// are skipped and not expanded.
pub fn traverse<S: EntityStore>(
    graph: &RelationshipGraph,
    store: &S,
    request: &TraversalRequest,
) -> Result<Vec<GraphNode>> {
    let mut result = Vec::new();
    let mut visited: HashSet<EntityId> = HashSet::new();
    let mut queue: VecDeque<(EntityId, u32)> = VecDeque::new();

    queue.push_back((request.start.clone(), 0));
    visited.insert(request.start.clone());

    while let Some((current_id, depth)) = queue.pop_front() {
        let entity = match store.get(&current_id)? {
            Some(entity) => entity,
            None => continue,
        };

        let relationships: Vec<_> = graph
            .relationships(&current_id, request.direction)
            .into_iter()
            .filter(|r| request.follows(r))
            .cloned()
            .collect();

        // Check depth limit before expanding
        if depth < request.max_depth {
            for relationship in &relationships {
                let next_id = relationship.other_end(&current_id);
                if visited.insert(next_id.clone()) {
                    queue.push_back((next_id.clone(), depth + 1));
                }
            }
        }

        result.push(GraphNode {
            entity,
            relationships,
            depth,
        });
    }

    Ok(result)
}
