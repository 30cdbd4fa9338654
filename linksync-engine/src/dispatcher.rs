//! Fans one record lifecycle event out to every configured link pair that
//! touches the record's type and subtype.

use std::fmt;
use std::str::FromStr;

use linksync_core::config::{LinkDefinition, LinkSyncConfig};
use linksync_core::types::Record;

use crate::collaborators::Collaborators;
use crate::descriptor::{FieldRef, LinkDescriptor, LinkKey};
use crate::engine::{SyncEngine, SyncReport};
use crate::error::LinkError;

/// Which lifecycle hook fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleKind {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for LifecycleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleKind::Insert => write!(f, "insert"),
            LifecycleKind::Update => write!(f, "update"),
            LifecycleKind::Delete => write!(f, "delete"),
        }
    }
}

impl FromStr for LifecycleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "insert" => Ok(Self::Insert),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(format!(
                "unknown event '{other}'; expected: insert, update, delete"
            )),
        }
    }
}

/// A record that was just inserted, updated or deleted.
///
/// The record must already be persisted (or, for deletes, still loadable) so
/// that eligibility checks on the far side can see it. `previous` is the
/// state before an update; without it an update removes no stale links.
#[derive(Debug, Clone)]
pub struct LifecycleEvent {
    pub kind: LifecycleKind,
    pub record: Record,
    pub previous: Option<Record>,
}

impl LifecycleEvent {
    pub fn insert(record: Record) -> Self {
        Self {
            kind: LifecycleKind::Insert,
            record,
            previous: None,
        }
    }

    pub fn update(record: Record, previous: Option<Record>) -> Self {
        Self {
            kind: LifecycleKind::Update,
            record,
            previous,
        }
    }

    pub fn delete(record: Record) -> Self {
        Self {
            kind: LifecycleKind::Delete,
            record,
            previous: None,
        }
    }
}

/// How errors from individual link pairs are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// Record every error and keep going.
    Batch,
    /// Return the first error; remaining link pairs are skipped.
    #[default]
    Direct,
}

/// A link pair that failed during a batch dispatch.
#[derive(Debug)]
pub struct DispatchFailure {
    pub link: String,
    pub error: LinkError,
    /// Per-target outcomes up to and including the failure, when the engine
    /// got as far as processing targets.
    pub report: Option<SyncReport>,
}

/// Outcome of one [`Dispatcher::dispatch`] call.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub runs: Vec<SyncReport>,
    pub failures: Vec<DispatchFailure>,
    /// True when some engine changed the event's record in memory, whether
    /// or not its run failed.
    pub record_modified: bool,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Holds the configured link definitions and routes events to engines.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    definitions: Vec<LinkDefinition>,
}

impl Dispatcher {
    /// Dispatcher that runs every one of `definitions`, ignoring `enabled`.
    pub fn new(definitions: Vec<LinkDefinition>) -> Self {
        Self { definitions }
    }

    /// Dispatcher over the config's enabled link definitions.
    pub fn from_config(config: &LinkSyncConfig) -> Self {
        Self::new(config.enabled_links().cloned().collect())
    }

    /// Run the event's operation for every definition whose local
    /// side matches the record, and with the reversed descriptor for every
    /// definition whose remote side matches. A self-referencing pair runs
    /// once.
    ///
    /// A malformed key is always a failure. A well-formed key whose two sides
    /// both name another type/subtype is skipped before resolution, so an
    /// undeclared field only fails events on the records it names.
    pub fn dispatch(
        &self,
        event: &mut LifecycleEvent,
        collaborators: Collaborators<'_>,
        mode: DispatchMode,
    ) -> Result<DispatchReport, LinkError> {
        let mut report = DispatchReport::default();

        for definition in &self.definitions {
            let key = match definition.key.parse::<LinkKey>() {
                Ok(key) => key,
                Err(err) => {
                    record_failure(&mut report, mode, definition.key.clone(), err.into(), None)?;
                    continue;
                }
            };
            if !names(&key.local, &event.record) && !names(&key.remote, &event.record) {
                continue;
            }
            let descriptor = match LinkDescriptor::resolve(&key, collaborators.schema) {
                Ok(descriptor) => descriptor,
                Err(err) => {
                    record_failure(&mut report, mode, definition.key.clone(), err.into(), None)?;
                    continue;
                }
            };

            let mut applicable = Vec::with_capacity(2);
            if descriptor.local.owns(&event.record) {
                applicable.push(descriptor.clone());
            }
            if !descriptor.is_symmetric() && descriptor.remote.owns(&event.record) {
                applicable.push(descriptor.reversed());
            }

            for descriptor in applicable {
                let link = descriptor.to_string();
                tracing::debug!("{} {} via {link}", event.kind, event.record);
                let outcome = run(descriptor, event, collaborators);
                report.record_modified |= outcome.local_modified;
                match outcome.result {
                    Ok(sync) => report.runs.push(sync),
                    Err(err) => record_failure(&mut report, mode, link, err, outcome.partial)?,
                }
            }
        }

        Ok(report)
    }
}

/// What one engine run left behind, successful or not.
struct EngineRun {
    result: Result<SyncReport, LinkError>,
    partial: Option<SyncReport>,
    local_modified: bool,
}

fn run(
    descriptor: LinkDescriptor,
    event: &mut LifecycleEvent,
    collaborators: Collaborators<'_>,
) -> EngineRun {
    let kind = event.kind;
    let previous = event.previous.as_ref();
    let mut engine = match SyncEngine::new(descriptor, &mut event.record, collaborators) {
        Ok(engine) => engine,
        Err(err) => {
            return EngineRun {
                result: Err(err),
                partial: None,
                local_modified: false,
            };
        }
    };
    let result = match kind {
        LifecycleKind::Insert => engine.insert(),
        LifecycleKind::Update => engine.update(previous),
        LifecycleKind::Delete => engine.delete(),
    };
    EngineRun {
        result,
        partial: engine.take_partial_report(),
        local_modified: engine.local_modified(),
    }
}

fn names(side: &FieldRef, record: &Record) -> bool {
    side.record_type == record.record_type && side.subtype == record.subtype
}

fn record_failure(
    report: &mut DispatchReport,
    mode: DispatchMode,
    link: String,
    error: LinkError,
    partial: Option<SyncReport>,
) -> Result<(), LinkError> {
    match mode {
        DispatchMode::Direct => Err(error),
        DispatchMode::Batch => {
            tracing::warn!("{link}: {error}");
            report.failures.push(DispatchFailure {
                link,
                error,
                report: partial,
            });
            Ok(())
        }
    }
}
