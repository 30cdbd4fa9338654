//! linksync core library — record types, schema config, record store, errors.
//!
//! - [`types`] — newtypes, [`Record`], [`FieldDescriptor`]
//! - [`config`] — the YAML schema + link definitions document
//! - [`store`] — YAML file-per-record persistence
//! - [`error`] — [`StoreError`]

pub mod config;
pub mod error;
pub mod store;
pub mod types;

pub use config::{FieldSchema, LinkDefinition, LinkSyncConfig, SubtypeSchema, TypeSchema};
pub use error::StoreError;
pub use types::{
    Cardinality, FieldDescriptor, FieldName, LanguageTag, LanguageVariants, LinkEntry, Record,
    RecordId, RecordType, Subtype, TargetRule,
};
