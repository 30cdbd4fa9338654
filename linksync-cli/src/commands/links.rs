//! `linksync links` — configured link pairs and their resolution status.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use linksync_core::config::{self, LinkDefinition, LinkSyncConfig};
use linksync_engine::{ConfigSchema, LinkDescriptor};

/// Arguments for `linksync links`.
#[derive(Args, Debug)]
pub struct LinksArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl LinksArgs {
    pub fn run(self) -> Result<()> {
        let config = config::load().context("failed to load config — run `linksync init` first")?;

        let rows = build_rows(&config);
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&LinksJson { links: rows })
                    .context("failed to serialize links JSON")?
            );
            return Ok(());
        }

        print_table(rows);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum LinkStatus {
    Ok,
    Disabled,
    Error,
}

#[derive(Debug, Serialize)]
struct LinkRow {
    key: String,
    status: LinkStatus,
    /// Cardinalities, or the resolution error.
    detail: String,
}

#[derive(Serialize)]
struct LinksJson {
    links: Vec<LinkRow>,
}

#[derive(Tabled)]
struct LinkTableRow {
    #[tabled(rename = "key")]
    key: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "detail")]
    detail: String,
}

fn build_rows(config: &LinkSyncConfig) -> Vec<LinkRow> {
    let schema = ConfigSchema::new(config);
    config
        .links
        .iter()
        .map(|definition| describe(definition, &schema))
        .collect()
}

fn describe(definition: &LinkDefinition, schema: &ConfigSchema<'_>) -> LinkRow {
    match LinkDescriptor::parse(&definition.key, schema) {
        Ok(descriptor) => LinkRow {
            key: definition.key.clone(),
            status: if definition.enabled {
                LinkStatus::Ok
            } else {
                LinkStatus::Disabled
            },
            detail: format!(
                "{} ({}) <-> {} ({})",
                descriptor.local,
                descriptor.local.cardinality,
                descriptor.remote,
                descriptor.remote.cardinality
            ),
        },
        Err(err) => LinkRow {
            key: definition.key.clone(),
            status: LinkStatus::Error,
            detail: err.to_string(),
        },
    }
}

fn status_label(status: LinkStatus) -> &'static str {
    match status {
        LinkStatus::Ok => "OK",
        LinkStatus::Disabled => "DISABLED",
        LinkStatus::Error => "ERROR",
    }
}

fn status_indicator(status: LinkStatus) -> String {
    match status {
        LinkStatus::Ok => "■".green().bold().to_string(),
        LinkStatus::Disabled => "■".bright_black().bold().to_string(),
        LinkStatus::Error => "■".red().bold().to_string(),
    }
}

fn print_table(rows: Vec<LinkRow>) {
    let count = |status| rows.iter().filter(|r| r.status == status).count();
    println!(
        "linksync v{} | {} {} ok  {} {} disabled  {} {} error",
        env!("CARGO_PKG_VERSION"),
        status_indicator(LinkStatus::Ok),
        count(LinkStatus::Ok),
        status_indicator(LinkStatus::Disabled),
        count(LinkStatus::Disabled),
        status_indicator(LinkStatus::Error),
        count(LinkStatus::Error),
    );

    if rows.is_empty() {
        println!("No link pairs configured.");
        return;
    }

    let table_rows: Vec<LinkTableRow> = rows
        .into_iter()
        .map(|row| LinkTableRow {
            key: row.key,
            status: status_label(row.status).to_string(),
            detail: row.detail,
        })
        .collect();
    let mut table = Table::new(table_rows);
    table.with(Style::rounded());
    println!("{table}");
}
