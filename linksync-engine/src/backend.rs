//! Collaborators backed by the `~/.linksync/` config document and record
//! store.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use linksync_core::config::LinkSyncConfig;
use linksync_core::error::StoreError;
use linksync_core::store;
use linksync_core::types::{FieldDescriptor, FieldName, Record, RecordId, RecordType, Subtype};

use crate::collaborators::{EligibilityValidator, EntityRepository, FieldSchemaProvider};

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Resolves fields against a loaded [`LinkSyncConfig`].
#[derive(Debug, Clone, Copy)]
pub struct ConfigSchema<'a> {
    config: &'a LinkSyncConfig,
}

impl<'a> ConfigSchema<'a> {
    pub fn new(config: &'a LinkSyncConfig) -> Self {
        Self { config }
    }
}

impl FieldSchemaProvider for ConfigSchema<'_> {
    fn resolve(
        &self,
        record_type: &RecordType,
        subtype: &Subtype,
        field: &FieldName,
    ) -> Option<FieldDescriptor> {
        self.config.resolve_field(record_type, subtype, field)
    }
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// [`EntityRepository`] over the YAML record store, with a read cache.
#[derive(Debug)]
pub struct FileRepository {
    home: PathBuf,
    cache: Mutex<HashMap<(RecordType, RecordId), Record>>,
}

impl FileRepository {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Number of records currently cached.
    pub fn cached(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(RecordType, RecordId), Record>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EntityRepository for FileRepository {
    fn load(&self, record_type: &RecordType, ids: &[RecordId]) -> Result<Vec<Record>, StoreError> {
        let mut records = Vec::with_capacity(ids.len());
        for &id in ids {
            let key = (record_type.clone(), id);
            if let Some(hit) = self.lock().get(&key) {
                records.push(hit.clone());
                continue;
            }
            match store::load_record_at(&self.home, record_type, id) {
                Ok(record) => {
                    self.lock().insert(key, record.clone());
                    records.push(record);
                }
                Err(StoreError::RecordNotFound { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(records)
    }

    fn save(&self, record: &Record) -> Result<(), StoreError> {
        store::save_record_at(&self.home, record)?;
        tracing::debug!("saved {record}");
        Ok(())
    }

    fn invalidate_cache(&self, record_type: &RecordType, ids: &[RecordId]) {
        let mut cache = self.lock();
        for &id in ids {
            cache.remove(&(record_type.clone(), id));
        }
    }
}

// ---------------------------------------------------------------------------
// Eligibility
// ---------------------------------------------------------------------------

/// Allows a candidate when it exists and matches one of the field's
/// [`TargetRule`](linksync_core::types::TargetRule)s. A field without rules
/// accepts any candidate. The context record must carry the field.
#[derive(Clone, Copy)]
pub struct TargetRuleValidator<'a> {
    repository: &'a dyn EntityRepository,
}

impl<'a> TargetRuleValidator<'a> {
    pub fn new(repository: &'a dyn EntityRepository) -> Self {
        Self { repository }
    }
}

impl EligibilityValidator for TargetRuleValidator<'_> {
    fn is_allowed(&self, field: &FieldDescriptor, candidate: RecordId, context: &Record) -> bool {
        if !field.owns(context) {
            return false;
        }
        if field.targets.is_empty() {
            return true;
        }
        field.targets.iter().any(|rule| {
            match self.repository.load(&rule.record_type, &[candidate]) {
                Ok(found) => found.iter().any(|r| r.id == candidate && rule.accepts(r)),
                Err(err) => {
                    tracing::warn!("eligibility lookup of {}#{candidate} failed: {err}", rule.record_type);
                    false
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRepository;
    use linksync_core::types::{Cardinality, LanguageTag, TargetRule};
    use tempfile::TempDir;

    fn tags_field(targets: Vec<TargetRule>) -> FieldDescriptor {
        FieldDescriptor {
            record_type: "Article".into(),
            subtype: "News".into(),
            field_name: "tags".into(),
            cardinality: Cardinality::Unlimited,
            languages: vec![LanguageTag::default_tag()],
            targets,
        }
    }

    #[test]
    fn file_repository_caches_until_invalidated() {
        let home = TempDir::new().unwrap();
        let repo = FileRepository::new(home.path());
        let article = RecordType::from("Article");
        store::save_record_at(home.path(), &Record::new("Article", "News", 1)).unwrap();

        let first = repo.load(&article, &[RecordId(1), RecordId(2)]).unwrap();
        assert_eq!(first.len(), 1, "missing ids are skipped");
        assert_eq!(repo.cached(), 1);

        // A write behind the repository's back is invisible until invalidation.
        let changed = Record::new("Article", "News", 1).with_links("tags", "default", [5]);
        store::save_record_at(home.path(), &changed).unwrap();
        let cached = repo.load(&article, &[RecordId(1)]).unwrap();
        assert!(cached[0].fields.is_empty());

        repo.invalidate_cache(&article, &[RecordId(1)]);
        assert_eq!(repo.cached(), 0);
        let fresh = repo.load(&article, &[RecordId(1)]).unwrap();
        assert_eq!(fresh[0].fields, changed.fields);
    }

    #[test]
    fn file_repository_save_persists() {
        let home = TempDir::new().unwrap();
        let repo = FileRepository::new(home.path());
        repo.save(&Record::new("Tag", "Tag", 3)).unwrap();
        assert!(store::record_path_at(home.path(), &"Tag".into(), RecordId(3)).exists());
    }

    #[test]
    fn validator_without_rules_allows_anything_on_owning_record() {
        let repo = MemoryRepository::new();
        let validator = TargetRuleValidator::new(&repo);
        let field = tags_field(vec![]);
        assert!(validator.is_allowed(&field, RecordId(99), &Record::new("Article", "News", 1)));
        assert!(!validator.is_allowed(&field, RecordId(99), &Record::new("Article", "Blog", 1)));
    }

    #[test]
    fn validator_checks_candidate_against_rules() {
        let repo = MemoryRepository::with_records([
            Record::new("Tag", "Topic", 5),
            Record::new("Tag", "Internal", 6),
        ]);
        let validator = TargetRuleValidator::new(&repo);
        let field = tags_field(vec![TargetRule {
            record_type: "Tag".into(),
            subtype: Some("Topic".into()),
        }]);
        let context = Record::new("Article", "News", 1);

        assert!(validator.is_allowed(&field, RecordId(5), &context));
        assert!(!validator.is_allowed(&field, RecordId(6), &context), "wrong subtype");
        assert!(!validator.is_allowed(&field, RecordId(7), &context), "missing record");
    }
}
