//! `linksync apply <insert|update|delete> <type> <id>`
//!
//! Loads the record from the store, dispatches the event to every configured
//! link pair, then persists the local record: saved if a link pair changed it
//! (insert / update), removed after its links are cleaned up (delete).

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use linksync_core::{
    config, store,
    types::{Record, RecordId, RecordType},
};
use linksync_engine::{
    AddOutcome, Collaborators, ConfigSchema, DispatchMode, DispatchReport, Dispatcher,
    FileRepository, LifecycleEvent, LifecycleKind, SyncReport, TargetAction, TargetReport,
    TargetRuleValidator,
};

/// Arguments for `linksync apply`.
#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Lifecycle event: insert | update | delete.
    #[arg(value_name = "EVENT")]
    pub kind: LifecycleKind,

    /// Record type, as declared in the config.
    #[arg(value_name = "TYPE")]
    pub record_type: String,

    /// Record id.
    pub id: u64,

    /// YAML snapshot of the record before the update. Without it an update
    /// removes no stale links.
    #[arg(long, value_name = "FILE")]
    pub previous: Option<PathBuf>,

    /// Keep going when a link pair fails and report every failure.
    #[arg(long)]
    pub batch: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl ApplyArgs {
    pub fn run(self) -> Result<()> {
        let home = store::home().context("could not determine home directory")?;
        let config = config::load().context("failed to load config — run `linksync init` first")?;

        let record_type = RecordType::from(self.record_type);
        let id = RecordId(self.id);
        let record = store::load_record(&record_type, id)
            .with_context(|| format!("failed to load {record_type}#{id}"))?;

        let previous = match (self.kind, &self.previous) {
            (LifecycleKind::Update, Some(path)) => Some(
                store::read_record(path)
                    .with_context(|| format!("failed to read snapshot '{}'", path.display()))?,
            ),
            (_, Some(_)) => bail!("--previous only applies to update"),
            (_, None) => None,
        };

        let mut event = match self.kind {
            LifecycleKind::Insert => LifecycleEvent::insert(record.clone()),
            LifecycleKind::Update => LifecycleEvent::update(record.clone(), previous),
            LifecycleKind::Delete => LifecycleEvent::delete(record.clone()),
        };
        let mode = if self.batch {
            DispatchMode::Batch
        } else {
            DispatchMode::Direct
        };

        let repository = FileRepository::new(&home);
        let schema = ConfigSchema::new(&config);
        let validator = TargetRuleValidator::new(&repository);
        let outcome = Dispatcher::from_config(&config).dispatch(
            &mut event,
            Collaborators::new(&repository, &schema, &validator),
            mode,
        );

        // Saved targets are never rolled back, so local changes are kept even
        // on failure. A delete with any failed link pair leaves the record in
        // place for a rerun.
        match self.kind {
            LifecycleKind::Insert | LifecycleKind::Update => {
                if event.record != record {
                    store::save_record(&event.record)
                        .with_context(|| format!("failed to save {record_type}#{id}"))?;
                }
            }
            LifecycleKind::Delete => {
                if matches!(&outcome, Ok(report) if report.is_clean()) {
                    store::delete_record(&record_type, id)
                        .with_context(|| format!("failed to remove {record_type}#{id}"))?;
                }
            }
        }

        let report = outcome.with_context(|| format!("{} of {record} failed", self.kind))?;
        if self.json {
            print_json(self.kind, &record, &report)?;
        } else {
            print_report(self.kind, &record, &report);
        }

        if !report.is_clean() {
            bail!("{} link pair(s) failed", report.failures.len());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ApplyJson<'a> {
    event: String,
    record: String,
    record_modified: bool,
    runs: &'a [SyncReport],
    failures: Vec<FailureJson<'a>>,
}

#[derive(Serialize)]
struct FailureJson<'a> {
    link: &'a str,
    error: String,
    /// Per-target outcomes recorded before the pair failed.
    targets: Option<&'a [TargetReport]>,
}

fn print_json(kind: LifecycleKind, record: &Record, report: &DispatchReport) -> Result<()> {
    let payload = ApplyJson {
        event: kind.to_string(),
        record: record.to_string(),
        record_modified: report.record_modified,
        runs: &report.runs,
        failures: report
            .failures
            .iter()
            .map(|f| FailureJson {
                link: &f.link,
                error: f.error.to_string(),
                targets: f.report.as_ref().map(|r| r.targets.as_slice()),
            })
            .collect(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize apply JSON")?
    );
    Ok(())
}

fn print_report(kind: LifecycleKind, record: &Record, report: &DispatchReport) {
    if report.runs.is_empty() && report.failures.is_empty() {
        println!("✓ {kind} {record} — no link pairs apply");
        return;
    }

    let mark = if report.is_clean() { "✓" } else { "✗" };
    println!("{mark} {kind} {record} — {} link pair(s)", report.runs.len());
    for run in &report.runs {
        println!("  {}", run.link.bold());
        print_targets(&run.targets);
    }
    for failure in &report.failures {
        println!("  {} {}: {}", "✗".red().bold(), failure.link, failure.error);
        if let Some(partial) = &failure.report {
            print_targets(&partial.targets);
        }
    }
}

fn print_targets(targets: &[TargetReport]) {
    for target in targets {
        println!(
            "    {} #{}  {}",
            indicator(&target.action),
            target.target,
            describe(&target.action)
        );
    }
}

fn indicator(action: &TargetAction) -> String {
    match action {
        TargetAction::Referenced(o) if o.forward.is_added() || o.backward.is_added() => {
            "✎".green().to_string()
        }
        TargetAction::Dereferenced(o) if o.forward_removed + o.backward_removed > 0 => {
            "✂".yellow().to_string()
        }
        TargetAction::Referenced(_) | TargetAction::Dereferenced(_) => "·".normal().to_string(),
        TargetAction::Missing => "?".bright_black().to_string(),
        TargetAction::Failed { .. } => "✗".red().to_string(),
    }
}

fn describe(action: &TargetAction) -> String {
    match action {
        TargetAction::Referenced(o) => format!(
            "linked (forward: {}, backward: {})",
            add_label(o.forward),
            add_label(o.backward)
        ),
        TargetAction::Dereferenced(o) => format!(
            "unlinked (removed {} forward, {} backward)",
            o.forward_removed, o.backward_removed
        ),
        TargetAction::Missing => "missing, skipped".to_string(),
        TargetAction::Failed { error } => error.clone(),
    }
}

fn add_label(outcome: AddOutcome) -> &'static str {
    match outcome {
        AddOutcome::Added => "added",
        AddOutcome::AlreadyPresent => "already present",
        AddOutcome::CapacityExceeded => "field full",
    }
}
