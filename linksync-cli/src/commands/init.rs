//! `linksync init`

use anyhow::{Context, Result};
use clap::Args;

use linksync_core::config;

/// Scaffold the config document.
#[derive(Args, Debug)]
pub struct InitArgs {}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let path = config::config_path().context("could not determine home directory")?;
        let existed = path.exists();

        let config = config::init().context("failed to initialize ~/.linksync")?;

        if existed {
            println!(
                "✓ Config already present ({} link definitions)",
                config.links.len()
            );
        } else {
            println!("✓ Created empty config");
        }
        println!("  Path: {}", path.display());
        Ok(())
    }
}
