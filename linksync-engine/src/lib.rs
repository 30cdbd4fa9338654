//! # linksync-engine
//!
//! Keeps reciprocal links between records consistent.
//!
//! Build a [`LinkDescriptor`] from a key string, hand it and a local record to
//! a [`SyncEngine`], and call `insert` / `update` / `delete`. The
//! [`Dispatcher`] does this for every configured link pair that touches a
//! record when a lifecycle event fires.

pub mod backend;
pub mod collaborators;
pub mod descriptor;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod memory;

pub use backend::{ConfigSchema, FileRepository, TargetRuleValidator};
pub use collaborators::{
    extract_id, Collaborators, EligibilityValidator, EntityRepository, FieldSchemaProvider,
};
pub use descriptor::{LinkDescriptor, LinkKey, KEY_DELIMITER};
pub use dispatcher::{
    DispatchFailure, DispatchMode, DispatchReport, Dispatcher, LifecycleEvent, LifecycleKind,
};
pub use engine::{
    is_full, link_set_of, AddOutcome, DereferenceOutcome, LinkSet, ReferenceOutcome, SyncEngine,
    SyncReport, TargetAction, TargetReport,
};
pub use error::{ConfigError, LinkError};
pub use memory::MemoryRepository;
