//! Error types for linksync-engine.

use thiserror::Error;

use linksync_core::error::StoreError;
use linksync_core::types::{FieldName, RecordId, RecordType, Subtype};

/// A link-pair definition or engine setup that cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The key string does not split into six tokens.
    #[error("malformed link key '{key}': expected 6 parts separated by '~', found {parts}")]
    MalformedKey { key: String, parts: usize },

    /// One of the six tokens is empty. `position` is 1-based.
    #[error("malformed link key '{key}': part {position} is empty")]
    EmptyKeyPart { key: String, position: usize },

    /// One side of the key names a type/subtype/field the schema does not declare.
    #[error("field {record_type}/{subtype}.{field} is not declared in the schema")]
    UnresolvedField {
        record_type: RecordType,
        subtype: Subtype,
        field: FieldName,
    },

    /// The local record handed to the engine is not of the descriptor's local type.
    #[error("local record is a {found}, descriptor expects {expected}")]
    LocalTypeMismatch {
        expected: RecordType,
        found: RecordType,
    },
}

/// All errors that can surface from link synchronization.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("link config error: {0}")]
    Config(#[from] ConfigError),

    /// A record is not of the type its role requires.
    #[error("record type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: RecordType,
        found: RecordType,
    },

    /// `reference` was asked to link a target that is not allowed in one of
    /// the two directions.
    #[error("{target} is not an allowed value for {field} (or the reverse link is not allowed)")]
    InvalidReference { field: String, target: RecordId },

    /// An error from the record repository.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
