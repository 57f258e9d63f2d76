//! Warrant index administration.
//!
//! Usage:
//!   warrant-admin --config warrant.toml bootstrap
//!   warrant-admin migrate --kind widgets [--mapping widgets.json]
//!   warrant-admin status
//!   warrant-admin remove-orphan --kind widgets

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use warrant_admin::{Admin, WarrantConfig, init_logging, load_mapping};
use warrant_storage::{ElasticBackend, IndexState};

#[derive(Parser, Debug)]
#[command(name = "warrant-admin")]
#[command(about = "Index administration for Warrant")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "WARRANT_CONFIG", default_value = "warrant.toml")]
    config: PathBuf,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the first index and alias of every configured kind
    Bootstrap,
    /// Move a kind to a new mapping through a fresh index version
    Migrate {
        #[arg(long)]
        kind: String,
        /// JSON mapping file; defaults to the mapping derived from the config
        #[arg(long)]
        mapping: Option<PathBuf>,
    },
    /// Show the alias binding and document count of every kind
    Status,
    /// Delete the leftover index of an interrupted migration
    RemoveOrphan {
        #[arg(long)]
        kind: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = WarrantConfig::from_file(&args.config)?;
    init_logging(&config.logging, args.verbose)?;

    let backend = Arc::new(ElasticBackend::new(config.elastic.clone())?);
    let admin = Admin::new(backend, config.kinds.clone());

    match args.command {
        Command::Bootstrap => {
            for (kind, state) in admin.bootstrap().await? {
                println!("{kind}: {state}");
            }
        }
        Command::Migrate { kind, mapping } => {
            let mapping = mapping.map(load_mapping).transpose()?;
            let report = admin.migrate(&kind, mapping).await?;
            println!(
                "{}: {} -> {} ({} documents)",
                report.kind, report.from, report.to, report.documents
            );
        }
        Command::Status => {
            for status in admin.status().await? {
                if let IndexState::Migrating { to, .. } = &status.state {
                    warn!(kind = %status.kind, index = %to, "interrupted migration, run remove-orphan");
                }
                match status.documents {
                    Some(n) => println!("{}: {} ({n} documents)", status.kind, status.state),
                    None => println!("{}: {}", status.kind, status.state),
                }
            }
        }
        Command::RemoveOrphan { kind } => match admin.remove_orphan(&kind).await? {
            Some(index) => println!("{kind}: removed {index}"),
            None => info!(%kind, "nothing to remove"),
        },
    }
    Ok(())
}
