use crate::error::VaultError;
use crate::graph::*;
use crate::storage::{EntityStore, MemoryStore};
use crate::types::*;
use std::collections::HashMap;

fn create_test_entity(id: &str) -> Entity {
    Entity::from_raw(&RawEntity::new(id, format!("Entity {}", id), "Test body")).unwrap()
}

fn create_test_store(ids: &[&str]) -> MemoryStore {
    let store = MemoryStore::new();
    for id in ids {
        store.put(&create_test_entity(id)).unwrap();
    }
    store
}

fn link(graph: &mut RelationshipGraph, store: &MemoryStore, from: &str, to: &str, relation: &str) -> Relationship {
    graph
        .add_relationship(store, NewRelationship::new(from, to, relation))
        .unwrap()
}

/// Build a small test graph:
/// A -> B -> C
///  \-> D -> E
fn build_test_graph() -> (RelationshipGraph, MemoryStore) {
    let store = create_test_store(&["a", "b", "c", "d", "e"]);
    let mut graph = RelationshipGraph::new();
    link(&mut graph, &store, "a", "b", "references");
    link(&mut graph, &store, "b", "c", "parent_of");
    link(&mut graph, &store, "a", "d", "references");
    link(&mut graph, &store, "d", "e", "blocks");
    (graph, store)
}

fn depths(nodes: &[GraphNode]) -> HashMap<String, u32> {
    nodes.iter().map(|n| (n.entity.id.clone(), n.depth)).collect()
}

#[test]
fn test_add_relationship_indexes_both_directions() {
    let (graph, _store) = build_test_graph();

    assert_eq!(graph.relationships("a", Direction::Outbound).len(), 2);
    assert_eq!(graph.relationships("a", Direction::Inbound).len(), 0);
    assert_eq!(graph.relationships("b", Direction::Inbound).len(), 1);
    assert_eq!(graph.relationships("b", Direction::Both).len(), 2);
    assert_eq!(graph.len(), 4);
}

#[test]
fn test_add_relationship_requires_live_endpoints() {
    let store = create_test_store(&["a"]);
    let mut graph = RelationshipGraph::new();

    let result = graph.add_relationship(&store, NewRelationship::new("a", "ghost", "references"));
    assert!(matches!(result, Err(VaultError::EntityNotFound(id)) if id == "ghost"));
    assert!(graph.is_empty());
}

#[test]
fn test_self_relationship_rejected() {
    let store = create_test_store(&["a"]);
    let mut graph = RelationshipGraph::new();
    let result = graph.add_relationship(&store, NewRelationship::new("a", "a", "references"));
    assert!(matches!(result, Err(VaultError::InvalidRelationship { .. })));
}

#[test]
fn test_parallel_relationships_allowed() {
    let store = create_test_store(&["a", "b"]);
    let mut graph = RelationshipGraph::new();
    let first = link(&mut graph, &store, "a", "b", "references");
    let second = link(&mut graph, &store, "a", "b", "references");
    let third = link(&mut graph, &store, "a", "b", "blocks");

    assert_ne!(first.id, second.id);
    assert_eq!(graph.relationships("a", Direction::Outbound).len(), 3);
    assert_eq!(graph.stats().relationship_types.get("references"), Some(&2));
    assert!(graph.get(third.id).is_some());
}

#[test]
fn test_remove_relationship() {
    let store = create_test_store(&["a", "b"]);
    let mut graph = RelationshipGraph::new();
    let rel = link(&mut graph, &store, "a", "b", "references");

    assert!(graph.remove_relationship(rel.id).is_some());
    assert!(graph.remove_relationship(rel.id).is_none());
    assert!(graph.relationships("a", Direction::Both).is_empty());
    assert!(graph.relationships("b", Direction::Both).is_empty());
}

#[test]
fn test_unknown_entity_has_no_relationships() {
    let (graph, _store) = build_test_graph();
    assert!(graph.relationships("nobody", Direction::Both).is_empty());
}

#[test]
fn test_bfs_traversal_outbound() {
    let (graph, store) = build_test_graph();

    let nodes = graph
        .traverse(
            &store,
            &TraversalRequest::new("a")
                .with_max_depth(2)
                .with_direction(Direction::Outbound),
        )
        .unwrap();

    let d = depths(&nodes);
    assert_eq!(nodes.len(), 5);
    assert_eq!(nodes[0].entity.id, "a");
    assert_eq!(d["a"], 0);
    assert_eq!(d["b"], 1);
    assert_eq!(d["d"], 1);
    assert_eq!(d["c"], 2);
    assert_eq!(d["e"], 2);
}

#[test]
fn test_max_depth_one_returns_direct_neighbors_only() {
    let (graph, store) = build_test_graph();

    let nodes = graph
        .traverse(&store, &TraversalRequest::new("a").with_max_depth(1))
        .unwrap();

    let d = depths(&nodes);
    assert_eq!(d.len(), 3);
    assert_eq!(d["a"], 0);
    assert_eq!(d["b"], 1);
    assert_eq!(d["d"], 1);
    assert!(nodes.iter().all(|n| n.depth <= 1));
}

#[test]
fn test_max_depth_zero_is_start_only() {
    let (graph, store) = build_test_graph();
    let nodes = graph
        .traverse(&store, &TraversalRequest::new("a").with_max_depth(0))
        .unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].depth, 0);
    // Relationships of the start are still reported
    assert_eq!(nodes[0].relationships.len(), 2);
}

#[test]
fn test_inbound_traversal() {
    let (graph, store) = build_test_graph();
    let nodes = graph
        .traverse(
            &store,
            &TraversalRequest::new("c")
                .with_max_depth(5)
                .with_direction(Direction::Inbound),
        )
        .unwrap();

    let d = depths(&nodes);
    assert_eq!(d.len(), 3);
    assert_eq!(d["b"], 1);
    assert_eq!(d["a"], 2);
}

#[test]
fn test_relation_filter_restricts_followed_and_reported() {
    let (graph, store) = build_test_graph();
    let nodes = graph
        .traverse(
            &store,
            &TraversalRequest::new("a")
                .with_max_depth(3)
                .with_relations(vec!["references".to_string()]),
        )
        .unwrap();

    let d = depths(&nodes);
    assert_eq!(d.len(), 3);
    assert!(!d.contains_key("c"));
    assert!(!d.contains_key("e"));
    for node in &nodes {
        assert!(node.relationships.iter().all(|r| r.relation == "references"));
    }
}

#[test]
fn test_cycle_terminates_and_reports_once() {
    let store = create_test_store(&["a", "b", "c"]);
    let mut graph = RelationshipGraph::new();
    link(&mut graph, &store, "a", "b", "references");
    link(&mut graph, &store, "b", "c", "references");
    link(&mut graph, &store, "c", "a", "references");
    link(&mut graph, &store, "b", "a", "references");

    let nodes = graph
        .traverse(&store, &TraversalRequest::new("a").with_max_depth(10))
        .unwrap();

    let d = depths(&nodes);
    assert_eq!(nodes.len(), 3);
    assert_eq!(d["a"], 0);
    assert_eq!(d["b"], 1);
    assert_eq!(d["c"], 1);
}

#[test]
fn test_dense_graph_depth_one() {
    let ids: Vec<String> = (0..8).map(|i| format!("n{}", i)).collect();
    let id_refs: Vec<&str> = ids.iter().map(|s| s.as_str()).collect();
    let store = create_test_store(&id_refs);
    let mut graph = RelationshipGraph::new();
    for from in &id_refs {
        for to in &id_refs {
            if from != to {
                link(&mut graph, &store, from, to, "related");
            }
        }
    }

    let nodes = graph
        .traverse(&store, &TraversalRequest::new("n0").with_max_depth(1))
        .unwrap();
    assert_eq!(nodes.len(), 8);
    assert_eq!(nodes.iter().filter(|n| n.depth == 0).count(), 1);
}

#[test]
fn test_traversal_skips_missing_entities() {
    let (graph, store) = build_test_graph();
    store.remove("b").unwrap();

    let nodes = graph
        .traverse(
            &store,
            &TraversalRequest::new("a")
                .with_max_depth(3)
                .with_direction(Direction::Outbound),
        )
        .unwrap();

    let d = depths(&nodes);
    assert!(!d.contains_key("b"));
    // c is only reachable through b
    assert!(!d.contains_key("c"));
    assert_eq!(d["e"], 2);
}

#[test]
fn test_traversal_from_missing_start_is_empty() {
    let (graph, store) = build_test_graph();
    let nodes = graph.traverse(&store, &TraversalRequest::new("ghost")).unwrap();
    assert!(nodes.is_empty());
}

#[test]
fn test_find_path_chain() {
    let store = create_test_store(&["a", "b", "c"]);
    let mut graph = RelationshipGraph::new();
    let ab = link(&mut graph, &store, "a", "b", "references");
    let bc = link(&mut graph, &store, "b", "c", "references");

    let path = graph.find_path(&store, "a", "c").unwrap().unwrap();
    assert_eq!(path.entity_ids(), vec!["a", "b", "c"]);
    assert_eq!(path.relationships, vec![ab.id, bc.id]);
    assert_eq!(path.length, 2);
    assert_eq!(path.steps[2].depth, 2);
}

#[test]
fn test_find_path_ignores_direction() {
    let store = create_test_store(&["a", "b", "c"]);
    let mut graph = RelationshipGraph::new();
    link(&mut graph, &store, "a", "b", "references");
    link(&mut graph, &store, "b", "c", "references");

    let path = graph.find_path(&store, "c", "a").unwrap().unwrap();
    assert_eq!(path.entity_ids(), vec!["c", "b", "a"]);
}

#[test]
fn test_find_path_shortest_wins() {
    let (mut graph, store) = build_test_graph();
    link(&mut graph, &store, "a", "e", "references");

    let path = graph.find_path(&store, "b", "e").unwrap().unwrap();
    assert_eq!(path.length, 2);
    assert_eq!(path.entity_ids(), vec!["b", "a", "e"]);
}

#[test]
fn test_find_path_unreachable() {
    let store = create_test_store(&["a", "b", "x", "y"]);
    let mut graph = RelationshipGraph::new();
    link(&mut graph, &store, "a", "b", "references");
    link(&mut graph, &store, "x", "y", "references");

    assert!(graph.find_path(&store, "a", "y").unwrap().is_none());
    assert!(graph.find_path(&store, "a", "ghost").unwrap().is_none());
}

#[test]
fn test_find_path_to_self() {
    let (graph, store) = build_test_graph();
    let path = graph.find_path(&store, "a", "a").unwrap().unwrap();
    assert_eq!(path.entity_ids(), vec!["a"]);
    assert_eq!(path.length, 0);
}

#[test]
fn test_find_path_avoids_missing_entities() {
    let (graph, store) = build_test_graph();
    store.remove("b").unwrap();
    assert!(graph.find_path(&store, "a", "c").unwrap().is_none());
}

#[test]
fn test_remove_entity_cascades() {
    let (mut graph, store) = build_test_graph();

    let removed = graph.remove_entity("a");
    assert_eq!(removed.len(), 2);
    assert!(graph.relationships("b", Direction::Both).iter().all(|r| !r.touches("a")));
    assert!(graph.relationships("d", Direction::Both).iter().all(|r| !r.touches("a")));
    assert!(graph.all_relationships().iter().all(|r| !r.touches("a")));
    assert_eq!(graph.len(), 2);

    store.remove("a").unwrap();
    assert!(graph.find_path(&store, "b", "d").unwrap().is_none());
}

#[test]
fn test_stats() {
    let (graph, _store) = build_test_graph();
    let stats = graph.stats();
    assert_eq!(stats.relationships, 4);
    assert_eq!(stats.entities, 5);
    assert_eq!(stats.relationship_types.get("references"), Some(&2));
    assert_eq!(stats.relationship_types.get("blocks"), Some(&1));
}

#[test]
fn test_restore_keeps_id() {
    let (graph, store) = build_test_graph();
    let mut rebuilt = RelationshipGraph::new();
    for rel in graph.all_relationships() {
        rebuilt.restore(&store, rel.clone()).unwrap();
    }
    assert_eq!(rebuilt.len(), graph.len());

    let first = graph.all_relationships()[0].clone();
    assert!(rebuilt.get(first.id).is_some());
    assert!(rebuilt.restore(&store, first).is_err());
}

#[test]
fn test_direction_parse() {
    assert_eq!("outbound".parse::<Direction>().unwrap(), Direction::Outbound);
    assert_eq!("in".parse::<Direction>().unwrap(), Direction::Inbound);
    assert!("sideways".parse::<Direction>().is_err());
}
