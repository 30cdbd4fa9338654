//! Reciprocal link reconciliation for one link pair and one local record.
//!
//! ## Per-target protocol
//!
//! 1. Load the target through the [`EntityRepository`].
//! 2. `reference` or `dereference` it (mutating both records in memory).
//! 3. Save the target, whatever step 2 returned.
//! 4. Invalidate the repository cache for the target.
//!
//! Targets are independent: an error on one is recorded and the loop moves on.
//! The first error is returned once every target has been processed. Nothing
//! is rolled back; each saved target stays saved.
//!
//! The local record is only mutated in memory. The caller persists it,
//! checking [`SyncEngine::local_modified`].

use std::collections::BTreeSet;

use serde::Serialize;

use linksync_core::types::{FieldDescriptor, LanguageTag, Record, RecordId};

use crate::collaborators::{extract_id, Collaborators, EntityRepository};
use crate::descriptor::LinkDescriptor;
use crate::error::{ConfigError, LinkError};

/// De-duplicated target ids of one field across all its language variants.
pub type LinkSet = BTreeSet<RecordId>;

/// Every non-empty target id stored in `field` on `record`. Empty when the
/// field is absent.
pub fn link_set_of(record: &Record, field: &FieldDescriptor) -> LinkSet {
    record.link_targets(&field.field_name).collect()
}

/// True when `field` has a finite cardinality and `link_set` already fills it.
pub fn is_full(link_set: &LinkSet, field: &FieldDescriptor) -> bool {
    field.cardinality.is_reached_by(link_set.len())
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of adding one direction of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddOutcome {
    /// A new entry was appended to every supported language variant.
    Added,
    /// The link already existed; nothing changed.
    AlreadyPresent,
    /// The field is at its cardinality limit; nothing changed.
    CapacityExceeded,
}

impl AddOutcome {
    pub fn is_added(self) -> bool {
        self == Self::Added
    }
}

/// Both directions of a [`SyncEngine::reference`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReferenceOutcome {
    /// local → remote
    pub forward: AddOutcome,
    /// remote → local
    pub backward: AddOutcome,
}

/// Entries removed by a [`SyncEngine::dereference`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DereferenceOutcome {
    pub forward_removed: usize,
    pub backward_removed: usize,
}

/// What happened to one target during a bulk operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TargetAction {
    Referenced(ReferenceOutcome),
    Dereferenced(DereferenceOutcome),
    /// The id is linked but no such record exists any more.
    Missing,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetReport {
    pub target: RecordId,
    #[serde(flatten)]
    pub action: TargetAction,
}

/// Outcome of one `insert` / `update` / `delete` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Key of the descriptor the engine ran with.
    pub link: String,
    pub local: RecordId,
    pub targets: Vec<TargetReport>,
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Reference,
    Dereference,
}

// ---------------------------------------------------------------------------
// SyncEngine
// ---------------------------------------------------------------------------

/// Keeps the reciprocal side of one [`LinkDescriptor`] consistent with one
/// local record.
pub struct SyncEngine<'a> {
    descriptor: LinkDescriptor,
    local: &'a mut Record,
    local_id: RecordId,
    collaborators: Collaborators<'a>,
    local_modified: bool,
    partial_report: Option<SyncReport>,
}

impl<'a> SyncEngine<'a> {
    /// Fails with [`ConfigError::LocalTypeMismatch`] if `local` is not of the
    /// descriptor's local record type.
    pub fn new(
        descriptor: LinkDescriptor,
        local: &'a mut Record,
        collaborators: Collaborators<'a>,
    ) -> Result<Self, LinkError> {
        let local_id = extract_id(&descriptor.local.record_type, local).map_err(|_| {
            ConfigError::LocalTypeMismatch {
                expected: descriptor.local.record_type.clone(),
                found: local.record_type.clone(),
            }
        })?;
        Ok(Self {
            descriptor,
            local,
            local_id,
            collaborators,
            local_modified: false,
            partial_report: None,
        })
    }

    /// True once the engine has added or removed an entry on the local record.
    pub fn local_modified(&self) -> bool {
        self.local_modified
    }

    /// Per-target outcomes of the last bulk operation, if it returned an
    /// error. Targets listed before the failure were saved.
    pub fn take_partial_report(&mut self) -> Option<SyncReport> {
        self.partial_report.take()
    }

    // -----------------------------------------------------------------------
    // Bulk operations
    // -----------------------------------------------------------------------

    /// Establish the reciprocal link on every record the local field points at.
    pub fn insert(&mut self) -> Result<SyncReport, LinkError> {
        let current = link_set_of(self.local, &self.descriptor.local);
        let mut run = Run::new(self.report());
        self.process(current, Op::Reference, &mut run);
        self.finish(run)
    }

    /// Remove reciprocal links for ids dropped since `previous`, then
    /// (re)establish them for every current id.
    ///
    /// Without a snapshot the old link set is taken to be the current one, so
    /// nothing is dereferenced.
    pub fn update(&mut self, previous: Option<&Record>) -> Result<SyncReport, LinkError> {
        let current = link_set_of(self.local, &self.descriptor.local);
        let old = match previous {
            Some(snapshot) => link_set_of(snapshot, &self.descriptor.local),
            None => current.clone(),
        };
        let deleted: Vec<RecordId> = old.difference(&current).copied().collect();
        tracing::debug!(
            "{}: update of {} drops {} link(s)",
            self.descriptor,
            self.local,
            deleted.len()
        );

        let mut run = Run::new(self.report());
        self.process(deleted, Op::Dereference, &mut run);
        self.process(current, Op::Reference, &mut run);
        self.finish(run)
    }

    /// Remove the reciprocal link from every record the local field points at.
    pub fn delete(&mut self) -> Result<SyncReport, LinkError> {
        let current = link_set_of(self.local, &self.descriptor.local);
        let mut run = Run::new(self.report());
        self.process(current, Op::Dereference, &mut run);
        self.finish(run)
    }

    // -----------------------------------------------------------------------
    // Predicates
    // -----------------------------------------------------------------------

    /// The local field links to `target`.
    pub fn references(&self, target: &Record) -> bool {
        target.record_type == self.descriptor.remote.record_type
            && link_set_of(self.local, &self.descriptor.local).contains(&target.id)
    }

    /// `target`'s remote field links back to the local record.
    pub fn referenced_by(&self, target: &Record) -> bool {
        target.record_type == self.descriptor.remote.record_type
            && link_set_of(target, &self.descriptor.remote).contains(&self.local_id)
    }

    /// Both directions are allowed by the eligibility rules.
    pub fn referenceable(&self, target: &Record) -> bool {
        let validator = self.collaborators.validator;
        target.record_type == self.descriptor.remote.record_type
            && validator.is_allowed(&self.descriptor.local, target.id, self.local)
            && validator.is_allowed(&self.descriptor.remote, self.local_id, target)
    }

    // -----------------------------------------------------------------------
    // Single-target mutations
    // -----------------------------------------------------------------------

    /// Link `target` in both directions.
    ///
    /// Ineligibility is the only error. Each direction is attempted on its
    /// own; a duplicate or a full field on one side does not stop the other.
    pub fn reference(&mut self, target: &mut Record) -> Result<ReferenceOutcome, LinkError> {
        let target_id = extract_id(&self.descriptor.remote.record_type, target)?;
        if !self.referenceable(target) {
            return Err(LinkError::InvalidReference {
                field: self.descriptor.local.to_string(),
                target: target_id,
            });
        }
        let outcome = ReferenceOutcome {
            forward: self.add_link_to(target),
            backward: self.add_link_from(target),
        };
        tracing::debug!(
            "{}: {} -> {} forward={:?} backward={:?}",
            self.descriptor,
            self.local,
            target,
            outcome.forward,
            outcome.backward
        );
        Ok(outcome)
    }

    /// Remove every entry linking the two records, in both directions and in
    /// every language variant. Not gated on eligibility.
    pub fn dereference(&mut self, target: &mut Record) -> Result<DereferenceOutcome, LinkError> {
        let target_id = extract_id(&self.descriptor.remote.record_type, target)?;
        let mut outcome = DereferenceOutcome::default();
        if self.references(target) {
            outcome.forward_removed = self
                .local
                .remove_links_to(&self.descriptor.local.field_name, target_id);
            self.local_modified |= outcome.forward_removed > 0;
        }
        if self.referenced_by(target) {
            outcome.backward_removed =
                target.remove_links_to(&self.descriptor.remote.field_name, self.local_id);
        }
        tracing::debug!(
            "{}: {} -/- {} removed forward={} backward={}",
            self.descriptor,
            self.local,
            target,
            outcome.forward_removed,
            outcome.backward_removed
        );
        Ok(outcome)
    }

    /// Append `target` to the local field.
    pub fn add_link_to(&mut self, target: &Record) -> AddOutcome {
        if self.references(target) {
            return AddOutcome::AlreadyPresent;
        }
        let field = &self.descriptor.local;
        if is_full(&link_set_of(self.local, field), field) {
            return AddOutcome::CapacityExceeded;
        }
        let languages = self.languages(field, self.local);
        for language in &languages {
            self.local.push_link(&field.field_name, language, target.id);
        }
        self.local_modified = true;
        AddOutcome::Added
    }

    /// Append the local record to `target`'s remote field.
    pub fn add_link_from(&self, target: &mut Record) -> AddOutcome {
        if self.referenced_by(target) {
            return AddOutcome::AlreadyPresent;
        }
        let field = &self.descriptor.remote;
        if is_full(&link_set_of(target, field), field) {
            return AddOutcome::CapacityExceeded;
        }
        for language in &self.languages(field, target) {
            target.push_link(&field.field_name, language, self.local_id);
        }
        AddOutcome::Added
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn languages(&self, field: &FieldDescriptor, record: &Record) -> Vec<LanguageTag> {
        let languages = self.collaborators.schema.available_languages(field, record);
        if languages.is_empty() {
            vec![LanguageTag::default_tag()]
        } else {
            languages
        }
    }

    fn finish(&mut self, run: Run) -> Result<SyncReport, LinkError> {
        match run.first_error {
            Some(err) => {
                self.partial_report = Some(run.report);
                Err(err)
            }
            None => {
                self.partial_report = None;
                Ok(run.report)
            }
        }
    }

    fn report(&self) -> SyncReport {
        SyncReport {
            link: self.descriptor.to_string(),
            local: self.local_id,
            targets: vec![],
        }
    }

    fn process(&mut self, ids: impl IntoIterator<Item = RecordId>, op: Op, run: &mut Run) {
        let repository: &dyn EntityRepository = self.collaborators.repository;
        let remote_type = self.descriptor.remote.record_type.clone();

        for id in ids {
            let loaded = repository
                .load(&remote_type, &[id])
                .map(|records| records.into_iter().find(|r| r.id == id));
            let mut target = match loaded {
                Ok(Some(target)) => target,
                Ok(None) => {
                    tracing::warn!(
                        "{}: {} links to missing {}#{}; skipping",
                        self.descriptor,
                        self.local,
                        remote_type,
                        id
                    );
                    run.push(id, Ok(TargetAction::Missing));
                    continue;
                }
                Err(err) => {
                    run.push(id, Err(err.into()));
                    continue;
                }
            };

            let outcome = match op {
                Op::Reference => self.reference(&mut target).map(TargetAction::Referenced),
                Op::Dereference => self.dereference(&mut target).map(TargetAction::Dereferenced),
            };
            let saved = repository.save(&target);
            repository.invalidate_cache(&remote_type, &[id]);

            let outcome = outcome.and_then(|action| saved.map(|()| action).map_err(LinkError::from));
            if let Err(err) = &outcome {
                tracing::warn!("{}: {} -> {}: {}", self.descriptor, self.local, target, err);
            }
            run.push(id, outcome);
        }
    }
}

/// Accumulates per-target outcomes and remembers the first error.
struct Run {
    report: SyncReport,
    first_error: Option<LinkError>,
}

impl Run {
    fn new(report: SyncReport) -> Self {
        Self {
            report,
            first_error: None,
        }
    }

    fn push(&mut self, target: RecordId, outcome: Result<TargetAction, LinkError>) {
        let action = match outcome {
            Ok(action) => action,
            Err(err) => {
                let action = TargetAction::Failed {
                    error: err.to_string(),
                };
                self.first_error.get_or_insert(err);
                action
            }
        };
        self.report.targets.push(TargetReport { target, action });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
