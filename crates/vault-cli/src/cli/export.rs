use crate::cli::{ExportArgs, Session};
use crate::snapshot::Snapshot;
use anyhow::Result;
use std::collections::HashSet;

/// Entities whose privacy flags allow export, and the relationships
/// between them. Output is a vault file that `import` and `--file` accept.
pub fn run(args: ExportArgs, session: &Session) -> Result<()> {
    let full = Snapshot::capture(session.vault.as_ref())?;
    let total = full.entities.len();

    let entities: Vec<_> = full
        .entities
        .into_iter()
        .filter(|e| e.sensitivity.privacy.export_allowed)
        .collect();
    let kept: HashSet<&str> = entities.iter().map(|e| e.id.as_str()).collect();
    let relationships: Vec<_> = full
        .relationships
        .into_iter()
        .filter(|r| kept.contains(r.source.as_str()) && kept.contains(r.target.as_str()))
        .collect();

    let exported = Snapshot {
        entities,
        relationships,
    };

    match args.output {
        Some(path) => {
            exported.save(&path)?;
            eprintln!(
                "Exported {} of {} entities, {} relationships to {}",
                exported.entities.len(),
                total,
                exported.relationships.len(),
                path.display()
            );
        }
        None => println!("{}", serde_json::to_string_pretty(&exported)?),
    }

    Ok(())
}
