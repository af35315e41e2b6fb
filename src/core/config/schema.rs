//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$TEXBUNDLE_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/texbundle/config.toml`
//! 3. `~/.texbundle/config.toml`
//!
//! # Project Config
//!
//! Located at `.texbundle.toml` next to the root document.
//!
//! # Validation
//!
//! Config values are validated after parsing to ensure they conform to
//! expected formats (e.g., encodings must be labels `encoding_rs` knows).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::EncodingList;

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// encodings = ["utf-8", "latin1"]
/// max_clean_size_mb = 50
///
/// [compile]
/// program = "latexmk"
/// args = ["-pdf", "-interaction=nonstopmode"]
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Candidate encodings, tried in order
    pub encodings: Option<Vec<String>>,

    /// Largest output directory `--force` may remove, in MiB
    pub max_clean_size_mb: Option<u64>,

    /// Typesetting program used for the bibliography
    pub compile: Option<CompileConfig>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_encodings(self.encodings.as_deref())?;

        if self.max_clean_size_mb == Some(0) {
            return Err(ConfigError::InvalidValue(
                "max_clean_size_mb must be greater than zero".to_string(),
            ));
        }

        if let Some(compile) = &self.compile {
            compile.validate()?;
        }

        Ok(())
    }
}

/// Project configuration, stored beside the root document.
///
/// # Example
///
/// ```toml
/// out_dir = "../paper_submission"
/// encodings = ["utf-8"]
/// store_revision = true
/// rename = "ms.tex"
/// compile = true
/// archive = true
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Output directory, relative to the root document's directory
    pub out_dir: Option<PathBuf>,

    /// Candidate encodings, tried in order
    pub encodings: Option<Vec<String>>,

    /// Stamp the copied root with the current commit id
    pub store_revision: Option<bool>,

    /// New name for the copied root document
    pub rename: Option<String>,

    /// Compile once to produce the bibliography
    pub compile: Option<bool>,

    /// Write a zip archive of the output tree
    pub archive: Option<bool>,
}

impl ProjectConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_encodings(self.encodings.as_deref())?;

        if let Some(rename) = &self.rename {
            if rename.is_empty() || rename.contains(['/', '\\']) {
                return Err(ConfigError::InvalidValue(format!(
                    "rename must be a plain file name, got '{}'",
                    rename
                )));
            }
        }

        if let Some(out_dir) = &self.out_dir {
            if out_dir.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "out_dir cannot be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Typesetting program settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CompileConfig {
    /// Program name or path (default: "latexmk")
    pub program: Option<String>,

    /// Arguments placed before the document name
    pub args: Option<Vec<String>>,
}

impl CompileConfig {
    /// Validate the compile configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(program) = &self.program {
            if program.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "compile program cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn validate_encodings(labels: Option<&[String]>) -> Result<(), ConfigError> {
    if let Some(labels) = labels {
        EncodingList::new(labels.iter().cloned())
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
    }
    Ok(())
}
