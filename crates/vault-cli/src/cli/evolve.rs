use crate::cli::{is_json, ArchiveArgs, CliVault, EvolveArgs, Session, TransitionArgs};
use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};
use vault_core::{EvolutionOutcome, EvolutionPolicy, EvolutionReport, RetentionTier, TransitionKind};

pub fn run(args: EvolveArgs, session: &Session) -> Result<()> {
    let json = is_json(&args.format)?;
    let policy = session.config.evolution_policy();
    let now = Utc::now();
    let before = session.vault.history(None)?.len();

    let report = match &args.id {
        Some(id) => {
            let outcome = session.vault.evolve(id, &policy, now)?;
            let count = |kind: TransitionKind| outcome.steps.iter().filter(|s| **s == kind).count();
            EvolutionReport {
                evaluated: 1,
                promoted: count(TransitionKind::Promoted),
                demoted: count(TransitionKind::Demoted),
                pinned: count(TransitionKind::Pinned),
                reindexed: usize::from(outcome.reindexed),
                unindexed: usize::from(outcome.unindexed),
                changed: if outcome.changed { vec![outcome.entity_id.clone()] } else { Vec::new() },
                failed: Vec::new(),
            }
        }
        None => session.vault.evolve_all(&policy, now)?,
    };

    if report.has_changes() && !args.dry_run {
        session.persist()?;
    }

    let transitions: Vec<_> = session.vault.history(None)?.into_iter().skip(before).collect();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "report": report,
                "transitions": transitions,
                "dry_run": args.dry_run,
            }))?
        );
        return Ok(());
    }

    println!(
        "Evaluated {} entities: {} changed, {} failed{}",
        report.evaluated,
        report.changed.len(),
        report.failed.len(),
        if args.dry_run { " (dry run)" } else { "" }
    );
    if !transitions.is_empty() {
        println!("{}", "─".repeat(70));
        for t in &transitions {
            println!("  {:<24} {:>10} → {:<10} {}", t.entity_id, t.from, t.to, t.reason);
        }
    }
    for (id, reason) in &report.failed {
        println!("  ! {}: {}", id, reason);
    }

    Ok(())
}

pub fn run_archive(args: ArchiveArgs, session: &Session) -> Result<()> {
    let json = is_json(&args.format)?;
    let outcome = session.vault.archive(&args.id, &args.reason, Utc::now())?;
    finish_manual(outcome, json, session)
}

pub fn run_transition(args: TransitionArgs, session: &Session) -> Result<()> {
    let json = is_json(&args.format)?;
    let tier: RetentionTier = args.tier.parse()?;
    let outcome = session.vault.transition(&args.id, tier, &args.reason, Utc::now())?;
    finish_manual(outcome, json, session)
}

fn finish_manual(outcome: EvolutionOutcome, json: bool, session: &Session) -> Result<()> {
    if outcome.changed {
        session.persist()?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if outcome.changed {
        println!(
            "{}: {} → {} ({})",
            outcome.entity_id, outcome.from, outcome.to, outcome.exposure
        );
    } else {
        println!("{} is already {}", outcome.entity_id, outcome.to);
    }
    Ok(())
}

/// Sweep on the configured interval until Ctrl-C.
pub async fn run_loop(session: &Session) -> Result<()> {
    let policy = session.config.evolution_policy();
    let mut ticker = tokio::time::interval(session.config.sweep_interval());
    info!(
        "Lifecycle loop started (every {}s), press Ctrl-C to stop",
        session.config.lifecycle.interval_secs
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match sweep(session.vault.clone(), policy).await {
                    Ok(report) => {
                        if report.has_changes() {
                            session.persist()?;
                        }
                        for (id, reason) in &report.failed {
                            warn!("Evolution failed for {}: {}", id, reason);
                        }
                    }
                    Err(e) => error!("Sweep failed: {:#}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down...");
                break;
            }
        }
    }

    Ok(())
}

async fn sweep(vault: Arc<CliVault>, policy: EvolutionPolicy) -> Result<EvolutionReport> {
    tokio::task::spawn_blocking(move || vault.evolve_all(&policy, Utc::now()))
        .await
        .context("Sweep task panicked")?
        .map_err(Into::into)
}
