use crate::cli::{is_json, DiscoverArgs, SearchArgs, Session};
use anyhow::{bail, Result};
use vault_core::{RetentionTier, SearchQuery, MAX_SENSITIVITY_LEVEL};

fn build_query(args: &SearchArgs, session: &Session) -> Result<SearchQuery> {
    let ceiling = args
        .clearance
        .unwrap_or(session.config.search.clearance_ceiling);
    if ceiling > MAX_SENSITIVITY_LEVEL {
        bail!(
            "--clearance must be between 0 and {}, got {}",
            MAX_SENSITIVITY_LEVEL,
            ceiling
        );
    }

    let top_k = args.limit.unwrap_or(session.config.search.top_k);
    let mut query = SearchQuery::new(args.query.clone(), top_k, ceiling);
    if let Some(tier) = &args.tier {
        query = query.with_tier(tier.parse::<RetentionTier>()?);
    }
    Ok(query)
}

pub async fn run(args: SearchArgs, session: &Session) -> Result<()> {
    let json = is_json(&args.format)?;
    let query = build_query(&args, session)?;
    let vector = session.embed_query(&query.text).await?;
    let results = session.vault.search_vector(&vector, &query)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    println!("{:<5} {:<24} {:<12} {}", "SCORE", "ID", "TIER", "TITLE");
    println!("{}", "─".repeat(70));
    for r in &results {
        println!("{:<5.2} {:<24} {:<12} {}", r.score, r.id, r.tier, r.title);
    }
    println!();
    println!("{} result(s)", results.len());

    Ok(())
}

pub async fn run_discover(args: DiscoverArgs, session: &Session) -> Result<()> {
    let json = is_json(&args.search.format)?;
    let query = build_query(&args.search, session)?;
    let depth = args.depth.unwrap_or(session.config.graph.max_depth);
    let vector = session.embed_query(&query.text).await?;
    let found = session.vault.discover_vector(&vector, &query, depth)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&found)?);
        return Ok(());
    }

    if found.is_empty() {
        println!("Nothing discovered.");
        return Ok(());
    }
    println!("Discovered {} entities (depth {})", found.len(), depth);
    println!("{}", "─".repeat(70));
    for d in &found {
        match (&d.score, &d.via) {
            (Some(score), _) => println!("  {:.2}  {} — {} ({})", score, d.id, d.title, d.tier),
            (None, Some(via)) => println!(
                "  {}[{}] {} — {} ({}) via {}",
                "  ".repeat(d.depth as usize),
                d.depth,
                d.id,
                d.title,
                d.tier,
                via
            ),
            (None, None) => println!("  [{}] {} — {} ({})", d.depth, d.id, d.title, d.tier),
        }
    }

    Ok(())
}
