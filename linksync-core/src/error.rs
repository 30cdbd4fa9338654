//! Error types for linksync-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from config and record store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load — includes file path and line context from serde_yaml.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None` — cannot locate `~/.linksync/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// No record file exists at the expected path.
    #[error("record not found at {path}")]
    RecordNotFound { path: PathBuf },

    /// No config file exists at the expected path.
    #[error("config not found at {path}; run `linksync init` first")]
    ConfigNotFound { path: PathBuf },

    /// The config parsed but describes an unusable schema.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}
