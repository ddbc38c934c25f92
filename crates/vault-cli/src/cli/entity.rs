use crate::cli::{read_json_file, DeleteArgs, ImportArgs, PinArgs, Session, TouchArgs};
use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;
use vault_core::RawEntity;

/// Ingest a JSON array of entities. Re-importing an id replaces it.
pub fn run_import(args: ImportArgs, session: &Session) -> Result<()> {
    let raws: Vec<RawEntity> = read_json_file(&args.path)?;
    let total = raws.len();

    let outcomes = session
        .vault
        .ingest_batch(raws)
        .with_context(|| format!("Failed to import {}", args.path.display()))?;
    let indexed = outcomes.iter().filter(|o| o.indexed).count();
    session.persist()?;

    info!("Imported {} entities from {}", total, args.path.display());
    println!("Imported {} entities ({} indexed, {} withheld from the index)", total, indexed, total - indexed);
    Ok(())
}

pub fn run_delete(args: DeleteArgs, session: &Session) -> Result<()> {
    let removed = session.vault.delete_entity(&args.id)?;
    session.persist()?;
    println!(
        "Deleted {} and {} relationship(s)",
        args.id,
        removed.len()
    );
    Ok(())
}

pub fn run_touch(args: TouchArgs, session: &Session) -> Result<()> {
    let signal = session
        .vault
        .record_activity(&args.id, Utc::now(), args.importance)?;
    session.persist()?;
    println!("{}: importance {:.2}{}", args.id, signal.importance, if signal.pinned { ", pinned" } else { "" });
    Ok(())
}

pub fn run_pin(args: PinArgs, session: &Session) -> Result<()> {
    let signal = session.vault.set_pinned(&args.id, !args.unpin)?;
    session.persist()?;
    println!("{} {}", args.id, if signal.pinned { "pinned" } else { "unpinned" });
    Ok(())
}
