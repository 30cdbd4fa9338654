//! Domain types for linked records.
//!
//! A [`Record`] exposes its link fields as an explicit mapping
//! `field name -> (language tag -> ordered link entries)`. Every access goes
//! through the typed accessors below.

use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroU32;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

macro_rules! name_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

name_newtype!(
    /// Top-level record type, e.g. `Article`.
    RecordType
);
name_newtype!(
    /// Subtype (class) within a record type.
    Subtype
);
name_newtype!(
    /// Name of a link field on a record.
    FieldName
);
name_newtype!(
    /// Locale tag of one language variant of a field.
    LanguageTag
);

impl LanguageTag {
    /// Tag carried by fields that are not localized.
    pub const DEFAULT: &'static str = "default";

    pub fn default_tag() -> Self {
        Self::from(Self::DEFAULT)
    }
}

/// Stable numeric identity of a record within its type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for RecordId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Schema-side types
// ---------------------------------------------------------------------------

/// Maximum number of distinct links a field may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cardinality {
    #[default]
    Unlimited,
    Limited(NonZeroU32),
}

impl Cardinality {
    pub fn from_limit(limit: Option<NonZeroU32>) -> Self {
        limit.map_or(Self::Unlimited, Self::Limited)
    }

    /// True when a link set of `len` distinct ids leaves no room for another.
    pub fn is_reached_by(self, len: usize) -> bool {
        match self {
            Self::Unlimited => false,
            Self::Limited(max) => len >= max.get() as usize,
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cardinality::Unlimited => write!(f, "unlimited"),
            Cardinality::Limited(max) => write!(f, "{max}"),
        }
    }
}

/// A record type / subtype combination a link field may point at.
///
/// `subtype: None` accepts any subtype of `record_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRule {
    pub record_type: RecordType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<Subtype>,
}

impl TargetRule {
    pub fn accepts(&self, record: &Record) -> bool {
        self.record_type == record.record_type
            && self.subtype.as_ref().map_or(true, |s| *s == record.subtype)
    }
}

/// A link field fully resolved against the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub record_type: RecordType,
    pub subtype: Subtype,
    pub field_name: FieldName,
    pub cardinality: Cardinality,
    /// Language variants in schema order. Non-localized fields carry
    /// exactly [`LanguageTag::DEFAULT`].
    pub languages: Vec<LanguageTag>,
    /// Empty means any record of the opposite side's type.
    pub targets: Vec<TargetRule>,
}

impl FieldDescriptor {
    /// True when `record` is of this field's type and subtype.
    pub fn owns(&self, record: &Record) -> bool {
        record.record_type == self.record_type && record.subtype == self.subtype
    }
}

impl fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}.{}", self.record_type, self.subtype, self.field_name)
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One stored pointer inside a link field. Empty entries are tolerated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LinkEntry {
    #[serde(default)]
    pub target: Option<RecordId>,
}

impl LinkEntry {
    pub fn to(target: RecordId) -> Self {
        Self {
            target: Some(target),
        }
    }
}

/// Language variants of one field.
pub type LanguageVariants = BTreeMap<LanguageTag, Vec<LinkEntry>>;

/// A record as seen by the link engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub record_type: RecordType,
    pub subtype: Subtype,
    pub id: RecordId,
    #[serde(default)]
    pub fields: BTreeMap<FieldName, LanguageVariants>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record {
    pub fn new(
        record_type: impl Into<RecordType>,
        subtype: impl Into<Subtype>,
        id: u64,
    ) -> Self {
        Self {
            record_type: record_type.into(),
            subtype: subtype.into(),
            id: RecordId(id),
            fields: BTreeMap::new(),
            updated_at: None,
        }
    }

    /// Builder form of [`Record::push_link`] for a batch of targets.
    pub fn with_links(
        mut self,
        field: impl Into<FieldName>,
        language: impl Into<LanguageTag>,
        targets: impl IntoIterator<Item = u64>,
    ) -> Self {
        let field = field.into();
        let language = language.into();
        for target in targets {
            self.push_link(&field, &language, RecordId(target));
        }
        self
    }

    /// Language variants stored for `field`, if the field is present at all.
    pub fn variants(&self, field: &FieldName) -> Option<&LanguageVariants> {
        self.fields.get(field)
    }

    /// Every non-empty target id stored in `field`, across all languages,
    /// in storage order and with repetitions.
    pub fn link_targets<'a>(&'a self, field: &FieldName) -> impl Iterator<Item = RecordId> + 'a {
        self.variants(field)
            .into_iter()
            .flat_map(|variants| variants.values())
            .flat_map(|entries| entries.iter().filter_map(|e| e.target))
    }

    /// Append a link entry to one language variant of `field`.
    pub fn push_link(&mut self, field: &FieldName, language: &LanguageTag, target: RecordId) {
        self.fields
            .entry(field.clone())
            .or_default()
            .entry(language.clone())
            .or_default()
            .push(LinkEntry::to(target));
    }

    /// Remove every entry of `field` pointing at `target`, in every language.
    /// Returns the number of entries removed.
    pub fn remove_links_to(&mut self, field: &FieldName, target: RecordId) -> usize {
        let Some(variants) = self.fields.get_mut(field) else {
            return 0;
        };
        let mut removed = 0;
        for entries in variants.values_mut() {
            let before = entries.len();
            entries.retain(|e| e.target != Some(target));
            removed += before - entries.len();
        }
        removed
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.record_type, self.id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
