use crate::cli::ConfigCommands;
use crate::config::VaultConfig;
use anyhow::{bail, Result};
use std::path::Path;

pub fn run(cmd: ConfigCommands, config_path: &Path) -> Result<()> {
    match cmd {
        ConfigCommands::Validate => validate(config_path),
        ConfigCommands::Show => show(config_path),
    }
}

/// Check the file and summarise the settings the vault would run with.
fn validate(config_path: &Path) -> Result<()> {
    let config = if config_path.exists() {
        VaultConfig::load(config_path)?
    } else {
        println!("{} not found, built-in defaults apply", config_path.display());
        VaultConfig::default()
    };

    let problems = config.validate();
    if !problems.is_empty() {
        println!(
            "{} has {} problem{}:",
            config_path.display(),
            problems.len(),
            if problems.len() == 1 { "" } else { "s" }
        );
        for problem in &problems {
            println!("  {}", problem);
        }
        bail!("Vault cannot start with this configuration");
    }

    println!("{} is valid", config_path.display());
    print_summary(&config);
    Ok(())
}

fn print_summary(config: &VaultConfig) {
    let e = &config.embedding;
    let l = &config.lifecycle;
    println!(
        "  {:<10} {} provider, {} dimensions, input capped at {} chars",
        "embedding", e.provider, e.dimension, e.max_input_chars
    );
    println!(
        "  {:<10} promote at importance {:.2}, archive long-term after {} idle days, sweep every {}s",
        "lifecycle", l.promotion_threshold, l.demotion_after_days, l.interval_secs
    );
    println!(
        "  {:<10} top {} results, clearance ceiling {}",
        "search", config.search.top_k, config.search.clearance_ceiling
    );
    println!("  {:<10} expand up to {} hops", "graph", config.graph.max_depth);
}

fn show(config_path: &Path) -> Result<()> {
    let config = VaultConfig::load_or_default(config_path);
    println!(
        "# Effective vault settings ({} plus defaults)",
        config_path.display()
    );
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
