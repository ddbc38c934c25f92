use crate::cli::{is_json, FormatArgs, Session};
use anyhow::Result;

pub fn run(args: FormatArgs, session: &Session) -> Result<()> {
    let json = is_json(&args.format)?;
    let stats = session.vault.stats()?;
    let graph = session.vault.graph_stats()?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "vault": stats,
                "graph": graph,
            }))?
        );
        return Ok(());
    }

    println!();
    println!("Vault Overview");
    println!("{}", "─".repeat(50));
    println!("Entities:      {:>8}", stats.entities);
    for (tier, count) in &stats.by_tier {
        println!("  {:16} {:>8}", tier, count);
    }
    println!("Indexed:       {:>8}", stats.indexed);
    for (exposure, count) in &stats.by_exposure {
        println!("  {:16} {:>8}", exposure, count);
    }
    println!("Relationships: {:>8}", stats.relationships);
    for (relation, count) in &graph.relationship_types {
        println!("  {:16} {:>8}", relation, count);
    }
    println!("Linked:        {:>8}", graph.entities);
    println!("{}", "─".repeat(50));
    println!();

    Ok(())
}
