//! TOML configuration file loading.
//!
//! Unlike an application settings file, the bridge config is always named
//! explicitly (`--config PATH`), so a missing file is an error rather than a
//! silent fallback to defaults.  Absent *fields* still fall back to their
//! serde defaults; see [`crate::domain::config`] for the schema.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::BridgeConfig;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Parses configuration from TOML text.
///
/// Only the shape is checked here; endpoints may still be missing because
/// the command line can supply them afterwards.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] if the TOML is malformed or a field has the
/// wrong type.
pub fn parse_config(content: &str) -> Result<BridgeConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Reads and parses the configuration file at `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read (including when it
/// does not exist) and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<BridgeConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config(&content)?;
    tracing::debug!("loaded config from {}", path.display());
    Ok(config)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
