//! The `~/.linksync/config.yaml` document: record schema plus the list of
//! link-pair definitions.
//!
//! ```yaml
//! version: 1
//! languages: [en, de]
//! types:
//!   - name: Article
//!     subtypes:
//!       - name: Article
//!         fields:
//!           - name: related
//!             cardinality: 2
//!             targets:
//!               - record_type: Article
//! links:
//!   - key: Article~Article~related~Article~Article~related
//! ```

use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::store::{home, linksync_dir_at, set_dir_permissions, write_atomic};
use crate::types::{
    Cardinality, FieldDescriptor, FieldName, LanguageTag, RecordType, Subtype, TargetRule,
};

/// Current config document version.
pub const CONFIG_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Document types
// ---------------------------------------------------------------------------

/// Root of the config document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSyncConfig {
    pub version: u32,
    /// Languages every localized field carries, in display order.
    #[serde(default)]
    pub languages: Vec<LanguageTag>,
    #[serde(default)]
    pub types: Vec<TypeSchema>,
    #[serde(default)]
    pub links: Vec<LinkDefinition>,
}

impl Default for LinkSyncConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            languages: vec![],
            types: vec![],
            links: vec![],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSchema {
    pub name: RecordType,
    #[serde(default)]
    pub subtypes: Vec<SubtypeSchema>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtypeSchema {
    pub name: Subtype,
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

/// Schema of one link field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: FieldName,
    /// Omitted means unlimited. Zero is rejected at parse time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cardinality: Option<NonZeroU32>,
    #[serde(default)]
    pub localized: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<TargetRule>,
}

/// One configured link pair, keyed by its six-token key string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkDefinition {
    pub key: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl LinkSyncConfig {
    /// Look up the schema entry for one field.
    pub fn field(
        &self,
        record_type: &RecordType,
        subtype: &Subtype,
        field: &FieldName,
    ) -> Option<&FieldSchema> {
        self.types
            .iter()
            .find(|t| t.name == *record_type)?
            .subtypes
            .iter()
            .find(|s| s.name == *subtype)?
            .fields
            .iter()
            .find(|f| f.name == *field)
    }

    /// Resolve a field into a full [`FieldDescriptor`], or `None` if the
    /// type, subtype or field is not declared.
    pub fn resolve_field(
        &self,
        record_type: &RecordType,
        subtype: &Subtype,
        field: &FieldName,
    ) -> Option<FieldDescriptor> {
        let schema = self.field(record_type, subtype, field)?;
        Some(FieldDescriptor {
            record_type: record_type.clone(),
            subtype: subtype.clone(),
            field_name: field.clone(),
            cardinality: Cardinality::from_limit(schema.cardinality),
            languages: self.languages_for(schema),
            targets: schema.targets.clone(),
        })
    }

    /// Language variants of a field: the configured languages when
    /// localized, `[default]` otherwise.
    pub fn languages_for(&self, field: &FieldSchema) -> Vec<LanguageTag> {
        if field.localized {
            self.languages.clone()
        } else {
            vec![LanguageTag::default_tag()]
        }
    }

    /// Enabled link definitions in document order.
    pub fn enabled_links(&self) -> impl Iterator<Item = &LinkDefinition> {
        self.links.iter().filter(|l| l.enabled)
    }

    /// Reject documents the engine cannot work with.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.version != CONFIG_VERSION {
            return Err(StoreError::InvalidConfig(format!(
                "unsupported config version {} (expected {CONFIG_VERSION})",
                self.version
            )));
        }
        for t in &self.types {
            for s in &t.subtypes {
                for f in &s.fields {
                    if f.localized && self.languages.is_empty() {
                        return Err(StoreError::InvalidConfig(format!(
                            "field {}/{}.{} is localized but no languages are configured",
                            t.name, s.name, f.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Load / save / init
// ---------------------------------------------------------------------------

/// `<home>/.linksync/config.yaml` — pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    linksync_dir_at(home).join("config.yaml")
}

/// `config_path_at` convenience wrapper.
pub fn config_path() -> Result<PathBuf, StoreError> {
    Ok(config_path_at(&home()?))
}

/// Load and validate the config document.
///
/// Returns `StoreError::ConfigNotFound` if absent,
/// `StoreError::Parse` if malformed YAML,
/// `StoreError::InvalidConfig` if it fails [`LinkSyncConfig::validate`].
pub fn load_at(home: &Path) -> Result<LinkSyncConfig, StoreError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Err(StoreError::ConfigNotFound { path });
    }
    let contents = std::fs::read_to_string(&path)?;
    let config: LinkSyncConfig =
        serde_yaml::from_str(&contents).map_err(|e| StoreError::Parse { path, source: e })?;
    config.validate()?;
    Ok(config)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<LinkSyncConfig, StoreError> {
    load_at(&home()?)
}

/// Atomically save the config document.
pub fn save_at(home: &Path, config: &LinkSyncConfig) -> Result<(), StoreError> {
    let dir = linksync_dir_at(home);
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        set_dir_permissions(&dir)?;
    }
    let yaml = serde_yaml::to_string(config)?;
    write_atomic(&config_path_at(home), &yaml)
}

/// Scaffold an empty config document.
///
/// Idempotent: if the file already exists, loads and returns it unchanged.
pub fn init_at(home: &Path) -> Result<LinkSyncConfig, StoreError> {
    if config_path_at(home).exists() {
        return load_at(home);
    }
    let config = LinkSyncConfig::default();
    save_at(home, &config)?;
    Ok(config)
}

/// `init_at` convenience wrapper.
pub fn init() -> Result<LinkSyncConfig, StoreError> {
    init_at(&home()?)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
