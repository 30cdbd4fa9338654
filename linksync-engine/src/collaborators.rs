//! The three seams the engine consumes: record persistence, field schema and
//! eligibility rules. Concrete implementations live in [`crate::backend`] and
//! [`crate::memory`].

use linksync_core::error::StoreError;
use linksync_core::types::{
    FieldDescriptor, FieldName, LanguageTag, Record, RecordId, RecordType, Subtype,
};

use crate::error::LinkError;

/// Loads and persists records by type and id.
pub trait EntityRepository {
    /// Load every record of `record_type` among `ids`. Ids that do not exist
    /// are simply absent from the result.
    fn load(&self, record_type: &RecordType, ids: &[RecordId]) -> Result<Vec<Record>, StoreError>;

    fn save(&self, record: &Record) -> Result<(), StoreError>;

    /// Drop any cached copy of the given records.
    fn invalidate_cache(&self, record_type: &RecordType, ids: &[RecordId]);
}

/// Resolves link fields against the record schema.
pub trait FieldSchemaProvider {
    fn resolve(
        &self,
        record_type: &RecordType,
        subtype: &Subtype,
        field: &FieldName,
    ) -> Option<FieldDescriptor>;

    /// Language variants `field` supports on `record`. Defaults to the
    /// variants resolved with the field.
    fn available_languages(&self, field: &FieldDescriptor, _record: &Record) -> Vec<LanguageTag> {
        field.languages.clone()
    }
}

/// Domain-specific selection rules for link fields.
pub trait EligibilityValidator {
    /// True if `candidate` is an allowed value for `field` on `context`.
    fn is_allowed(&self, field: &FieldDescriptor, candidate: RecordId, context: &Record) -> bool;
}

/// Borrowed bundle of collaborators handed to engines and the dispatcher.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub repository: &'a dyn EntityRepository,
    pub schema: &'a dyn FieldSchemaProvider,
    pub validator: &'a dyn EligibilityValidator,
}

impl<'a> Collaborators<'a> {
    pub fn new(
        repository: &'a dyn EntityRepository,
        schema: &'a dyn FieldSchemaProvider,
        validator: &'a dyn EligibilityValidator,
    ) -> Self {
        Self {
            repository,
            schema,
            validator,
        }
    }
}

/// Identity of `record`, provided it is of `expected` type.
pub fn extract_id(expected: &RecordType, record: &Record) -> Result<RecordId, LinkError> {
    if record.record_type != *expected {
        return Err(LinkError::TypeMismatch {
            expected: expected.clone(),
            found: record.record_type.clone(),
        });
    }
    Ok(record.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_id_checks_type() {
        let record = Record::new("Article", "News", 4);
        assert_eq!(
            extract_id(&RecordType::from("Article"), &record).expect("id"),
            RecordId(4)
        );

        let err = extract_id(&RecordType::from("Product"), &record).unwrap_err();
        assert!(matches!(err, LinkError::TypeMismatch { .. }));
        assert!(err.to_string().contains("expected Product, found Article"));
    }
}
