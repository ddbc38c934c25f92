mod cli;
mod config;
mod snapshot;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, Session, VaultCommands};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so JSON output on stdout stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Config(cmd) => cli::config_cmd::run(cmd, &cli.config),
        Commands::Vault(command) => {
            let session = Session::open(&cli.config, &cli.file)?;
            dispatch(command, &session).await
        }
    }
}

async fn dispatch(command: VaultCommands, session: &Session) -> Result<()> {
    match command {
        VaultCommands::Import(args) => cli::entity::run_import(args, session),
        VaultCommands::Search(args) => cli::search::run(args, session).await,
        VaultCommands::Discover(args) => cli::search::run_discover(args, session).await,
        VaultCommands::Traverse(args) => cli::graph::run(args, session),
        VaultCommands::Path(args) => cli::graph::run_path(args, session),
        VaultCommands::Link(args) => cli::graph::run_link(args, session),
        VaultCommands::Unlink(args) => cli::graph::run_unlink(args, session),
        VaultCommands::Delete(args) => cli::entity::run_delete(args, session),
        VaultCommands::Touch(args) => cli::entity::run_touch(args, session),
        VaultCommands::Pin(args) => cli::entity::run_pin(args, session),
        VaultCommands::Evolve(args) => cli::evolve::run(args, session),
        VaultCommands::Archive(args) => cli::evolve::run_archive(args, session),
        VaultCommands::Transition(args) => cli::evolve::run_transition(args, session),
        VaultCommands::Run => cli::evolve::run_loop(session).await,
        VaultCommands::Export(args) => cli::export::run(args, session),
        VaultCommands::Stats(args) => cli::stats::run(args, session),
    }
}
