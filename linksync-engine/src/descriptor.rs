//! Link-pair keys and their schema-resolved descriptors.
//!
//! A key names one directional correspondence as six `~`-separated tokens:
//!
//! ```text
//! localType~localSubtype~localField~remoteType~remoteSubtype~remoteField
//! ```

use std::fmt;
use std::str::FromStr;

use linksync_core::types::{FieldDescriptor, FieldName, RecordType, Subtype};

use crate::collaborators::FieldSchemaProvider;
use crate::error::ConfigError;

/// Token separator of the key string.
pub const KEY_DELIMITER: char = '~';

/// One side of a key, not yet resolved against the schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub record_type: RecordType,
    pub subtype: Subtype,
    pub field: FieldName,
}

/// The unresolved six-token key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkKey {
    pub local: FieldRef,
    pub remote: FieldRef,
}

impl LinkKey {
    pub fn reversed(&self) -> Self {
        Self {
            local: self.remote.clone(),
            remote: self.local.clone(),
        }
    }
}

impl FromStr for LinkKey {
    type Err = ConfigError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = key.split(KEY_DELIMITER).collect();
        if parts.len() != 6 {
            return Err(ConfigError::MalformedKey {
                key: key.to_owned(),
                parts: parts.len(),
            });
        }
        if let Some(index) = parts.iter().position(|p| p.is_empty()) {
            return Err(ConfigError::EmptyKeyPart {
                key: key.to_owned(),
                position: index + 1,
            });
        }
        let side = |i: usize| FieldRef {
            record_type: RecordType::from(parts[i]),
            subtype: Subtype::from(parts[i + 1]),
            field: FieldName::from(parts[i + 2]),
        };
        Ok(Self {
            local: side(0),
            remote: side(3),
        })
    }
}

impl fmt::Display for LinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = KEY_DELIMITER;
        write!(
            f,
            "{}{d}{}{d}{}{d}{}{d}{}{d}{}",
            self.local.record_type,
            self.local.subtype,
            self.local.field,
            self.remote.record_type,
            self.remote.subtype,
            self.remote.field,
        )
    }
}

/// A link pair with both sides resolved to full field descriptors.
///
/// A link stored in `local.field_name` on a local record is mirrored by a
/// link stored in `remote.field_name` on the target record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkDescriptor {
    pub local: FieldDescriptor,
    pub remote: FieldDescriptor,
}

impl LinkDescriptor {
    /// Parse a key string and resolve both sides.
    pub fn parse(key: &str, schema: &dyn FieldSchemaProvider) -> Result<Self, ConfigError> {
        Self::resolve(&key.parse()?, schema)
    }

    /// Resolve an already-parsed key.
    pub fn resolve(key: &LinkKey, schema: &dyn FieldSchemaProvider) -> Result<Self, ConfigError> {
        Ok(Self {
            local: resolve_side(&key.local, schema)?,
            remote: resolve_side(&key.remote, schema)?,
        })
    }

    /// The same correspondence seen from the remote side.
    pub fn reversed(&self) -> Self {
        Self {
            local: self.remote.clone(),
            remote: self.local.clone(),
        }
    }

    pub fn key(&self) -> LinkKey {
        let side = |d: &FieldDescriptor| FieldRef {
            record_type: d.record_type.clone(),
            subtype: d.subtype.clone(),
            field: d.field_name.clone(),
        };
        LinkKey {
            local: side(&self.local),
            remote: side(&self.remote),
        }
    }

    /// True when both sides name the same field, so the reversed descriptor
    /// is identical to this one.
    pub fn is_symmetric(&self) -> bool {
        self.local == self.remote
    }
}

impl fmt::Display for LinkDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.key().fmt(f)
    }
}

fn resolve_side(
    side: &FieldRef,
    schema: &dyn FieldSchemaProvider,
) -> Result<FieldDescriptor, ConfigError> {
    schema
        .resolve(&side.record_type, &side.subtype, &side.field)
        .ok_or_else(|| ConfigError::UnresolvedField {
            record_type: side.record_type.clone(),
            subtype: side.subtype.clone(),
            field: side.field.clone(),
        })
}
