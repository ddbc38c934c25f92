use crate::cli::{is_json, LinkArgs, PathArgs, Session, TraverseArgs, UnlinkArgs};
use anyhow::{bail, Context, Result};
use serde_json::Value;
use uuid::Uuid;
use vault_core::{Direction, NewRelationship, TraversalRequest};

pub fn run(args: TraverseArgs, session: &Session) -> Result<()> {
    let json = is_json(&args.format)?;
    let mut request = TraversalRequest::new(args.id.clone())
        .with_max_depth(args.depth.unwrap_or(session.config.graph.max_depth))
        .with_direction(args.direction.parse::<Direction>()?);
    if let Some(relation) = args.relation {
        request = request.with_relations(vec![relation]);
    }

    let nodes = session.vault.traverse(&request)?;

    if json {
        let nodes: Vec<_> = nodes
            .iter()
            .map(|n| {
                serde_json::json!({
                    "id": n.entity.id,
                    "title": n.entity.title,
                    "tier": n.entity.tier,
                    "depth": n.depth,
                    "relationships": n.relationships,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&nodes)?);
        return Ok(());
    }

    if nodes.is_empty() {
        println!("Entity '{}' not found.", args.id);
        return Ok(());
    }

    println!("Subgraph: {} entities (max depth {})", nodes.len(), request.max_depth);
    println!("{}", "─".repeat(70));
    for node in &nodes {
        let indent = "  ".repeat(node.depth as usize);
        println!(
            "{}[{}] {} — {} ({})",
            indent, node.depth, node.entity.id, node.entity.title, node.entity.tier
        );
        for rel in &node.relationships {
            println!("{}    {} --[{}]--> {}", indent, rel.source, rel.relation, rel.target);
        }
    }

    Ok(())
}

pub fn run_path(args: PathArgs, session: &Session) -> Result<()> {
    let json = is_json(&args.format)?;
    let path = session.vault.find_path(&args.from, &args.to)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&path)?);
        return Ok(());
    }

    match path {
        None => println!("No path found between the two entities."),
        Some(path) => {
            println!("{} hop(s):", path.length);
            println!("    {}", path.entity_ids().join(" → "));
        }
    }

    Ok(())
}

pub fn run_link(args: LinkArgs, session: &Session) -> Result<()> {
    let mut new = NewRelationship::new(args.source, args.target, args.relation);
    for pair in &args.metadata {
        let Some((key, raw)) = pair.split_once('=') else {
            bail!("Metadata '{}' is not key=value", pair);
        };
        // Numbers and booleans keep their JSON type
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        new = new.with_metadata(key, value);
    }

    let rel = session.vault.link(new)?;
    session.persist()?;
    println!("Linked {} --[{}]--> {} ({})", rel.source, rel.relation, rel.target, rel.id);
    Ok(())
}

pub fn run_unlink(args: UnlinkArgs, session: &Session) -> Result<()> {
    let id = Uuid::parse_str(&args.id)
        .with_context(|| format!("Invalid relationship id: {}", args.id))?;

    if session.vault.unlink(id)? {
        session.persist()?;
        println!("Removed relationship {}", id);
    } else {
        println!("Relationship {} not found.", id);
    }
    Ok(())
}
