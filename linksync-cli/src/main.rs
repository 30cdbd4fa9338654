//! linksync — keeps reciprocal links between stored records consistent.
//!
//! # Usage
//!
//! ```text
//! linksync init
//! linksync links [--json]
//! linksync apply insert|update|delete <type> <id> [--previous <file>] [--batch] [--json]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{apply::ApplyArgs, init::InitArgs, links::LinksArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "linksync",
    version,
    about = "Synchronize bidirectional links between records",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create ~/.linksync/config.yaml if it does not exist.
    Init(InitArgs),

    /// List configured link pairs and whether they resolve.
    Links(LinksArgs),

    /// Run a record lifecycle event through every matching link pair.
    Apply(ApplyArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Links(args) => args.run(),
        Commands::Apply(args) => args.run(),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
