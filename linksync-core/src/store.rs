//! File-per-record YAML store.
//!
//! # Storage layout
//!
//! ```text
//! ~/.linksync/
//!   config.yaml               (schema + link definitions — mode 0600)
//!   records/
//!     <record_type>/
//!       <id>.yaml             (one file per record — mode 0600)
//! ```
//!
//! # API pattern
//!
//! Every function has two forms:
//! - `fn_at(home: &Path, …)` — explicit home; used in tests with `TempDir`
//! - `fn(…)` — derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Tests must NEVER call the no-arg wrappers; always use `_at`.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::StoreError;
use crate::types::{Record, RecordId, RecordType};

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.linksync/` — pure, no I/O.
pub fn linksync_dir_at(home: &Path) -> PathBuf {
    home.join(".linksync")
}

/// `<home>/.linksync/records/<type>/`
///
/// Creates the directory (mode `0700`) if it does not yet exist.
pub fn type_dir_at(home: &Path, record_type: &RecordType) -> Result<PathBuf, StoreError> {
    let dir = linksync_dir_at(home).join("records").join(&record_type.0);
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        set_dir_permissions(&dir)?;
    }
    Ok(dir)
}

/// `<home>/.linksync/records/<type>/<id>.yaml` — pure, no I/O.
pub fn record_path_at(home: &Path, record_type: &RecordType, id: RecordId) -> PathBuf {
    linksync_dir_at(home)
        .join("records")
        .join(&record_type.0)
        .join(format!("{id}.yaml"))
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Load a single record from `<home>/.linksync/records/<type>/<id>.yaml`.
///
/// Returns `StoreError::RecordNotFound` if absent,
/// `StoreError::Parse` (with path + line context) if malformed YAML.
pub fn load_record_at(
    home: &Path,
    record_type: &RecordType,
    id: RecordId,
) -> Result<Record, StoreError> {
    let path = record_path_at(home, record_type, id);
    if !path.exists() {
        return Err(StoreError::RecordNotFound { path });
    }
    read_record(&path)
}

/// `load_record_at` convenience wrapper.
pub fn load_record(record_type: &RecordType, id: RecordId) -> Result<Record, StoreError> {
    load_record_at(&home()?, record_type, id)
}

/// Parse a record YAML document from an arbitrary path (e.g. a snapshot
/// handed to the CLI).
pub fn read_record(path: &Path) -> Result<Record, StoreError> {
    let contents = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&contents).map_err(|e| StoreError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// 3. Save (atomic) / delete
// ---------------------------------------------------------------------------

/// Atomically save a record to `<home>/.linksync/records/<type>/<id>.yaml`.
///
/// Stamps `updated_at` on the persisted copy. The caller's value is left as is.
pub fn save_record_at(home: &Path, record: &Record) -> Result<(), StoreError> {
    type_dir_at(home, &record.record_type)?; // create dir + 0700 if absent
    let path = record_path_at(home, &record.record_type, record.id);

    let mut stamped = record.clone();
    stamped.updated_at = Some(Utc::now());
    let yaml = serde_yaml::to_string(&stamped)?;
    write_atomic(&path, &yaml)
}

/// `save_record_at` convenience wrapper.
pub fn save_record(record: &Record) -> Result<(), StoreError> {
    save_record_at(&home()?, record)
}

/// Remove a record file. Returns `false` if it was already absent.
pub fn delete_record_at(
    home: &Path,
    record_type: &RecordType,
    id: RecordId,
) -> Result<bool, StoreError> {
    let path = record_path_at(home, record_type, id);
    if !path.exists() {
        return Ok(false);
    }
    std::fs::remove_file(&path)?;
    Ok(true)
}

/// `delete_record_at` convenience wrapper.
pub fn delete_record(record_type: &RecordType, id: RecordId) -> Result<bool, StoreError> {
    delete_record_at(&home()?, record_type, id)
}

// ---------------------------------------------------------------------------
// Crate helpers
// ---------------------------------------------------------------------------

/// Write flow: `<path>.tmp` sibling → `chmod 0600` → `rename`.
/// `.tmp` is always in the same directory as the target (same filesystem).
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<(), StoreError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!("{file_name}.tmp"));
    std::fs::write(&tmp, contents)?;
    set_file_permissions(&tmp)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

/// The user's home directory, which holds `.linksync/`.
pub fn home() -> Result<PathBuf, StoreError> {
    dirs::home_dir().ok_or(StoreError::HomeNotFound)
}

#[cfg(unix)]
pub(crate) fn set_dir_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
pub(crate) fn set_dir_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
