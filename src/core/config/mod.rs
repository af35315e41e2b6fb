//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! texbundle has two configuration scopes:
//! - **Global**: User-level settings
//! - **Project**: Settings stored next to the root document
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Project config file
//! 4. CLI flags (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$TEXBUNDLE_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/texbundle/config.toml`
//! 3. `~/.texbundle/config.toml`
//!
//! # Project Config Location
//!
//! `.texbundle.toml` in the directory of the root document.
//!
//! # Example
//!
//! ```no_run
//! use texbundle::core::config::Config;
//! use std::path::Path;
//!
//! let result = Config::load(Some(Path::new("/path/to/paper"))).unwrap();
//! let config = result.config;
//!
//! println!("Encodings: {:?}", config.encodings());
//! println!("Compile with: {}", config.compile_program());
//! ```

pub mod schema;

pub use schema::{CompileConfig, GlobalConfig, ProjectConfig};

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

/// File name of the project config.
pub const PROJECT_CONFIG_FILE: &str = ".texbundle.toml";

/// Default output-directory size `--force` may remove.
pub const DEFAULT_MAX_CLEAN_SIZE_MB: u64 = 20;

/// Default typesetting program.
pub const DEFAULT_COMPILE_PROGRAM: &str = "latexmk";

/// Default typesetting arguments.
pub const DEFAULT_COMPILE_ARGS: &[&str] = &["-pdf", "-interaction=nonstopmode"];

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Warnings generated during config loading.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    /// The warning message.
    pub message: String,
    /// The path that triggered the warning.
    pub path: PathBuf,
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
    /// Any warnings generated during loading.
    pub warnings: Vec<ConfigWarning>,
}

/// A place a global config may live.
#[derive(Debug, Clone)]
struct Candidate {
    path: PathBuf,
    /// Named explicitly by the user, so its absence is worth a warning
    explicit: bool,
}

/// Merged configuration from all sources.
///
/// This struct provides accessor methods that apply precedence rules
/// automatically. Project config overrides global config.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: GlobalConfig,
    /// Project configuration (if present)
    pub project: Option<ProjectConfig>,
    /// Path to the global config file (if loaded)
    global_path: Option<PathBuf>,
    /// Directory holding the project config (if loaded)
    project_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// If `project_dir` is provided, also loads `.texbundle.toml` from it.
    ///
    /// # Errors
    ///
    /// Returns an error if config files exist but cannot be parsed.
    /// Missing config files are not an error (defaults are used).
    pub fn load(project_dir: Option<&Path>) -> Result<ConfigLoadResult, ConfigError> {
        Self::load_from(&Self::global_candidates(), project_dir)
    }

    fn load_from(
        candidates: &[Candidate],
        project_dir: Option<&Path>,
    ) -> Result<ConfigLoadResult, ConfigError> {
        let mut warnings = Vec::new();

        let (global, global_path) = Self::load_global(candidates, &mut warnings)?;

        let project = match project_dir {
            Some(dir) => {
                let path = dir.join(PROJECT_CONFIG_FILE);
                if path.is_file() {
                    Some(read_config::<ProjectConfig>(&path)?)
                } else {
                    None
                }
            }
            None => None,
        };

        global.validate()?;
        if let Some(ref p) = project {
            p.validate()?;
        }

        let project_dir = project
            .as_ref()
            .and(project_dir)
            .map(Path::to_path_buf);

        Ok(ConfigLoadResult {
            config: Config {
                global,
                project,
                global_path,
                project_dir,
            },
            warnings,
        })
    }

    fn global_candidates() -> Vec<Candidate> {
        let mut candidates = Vec::new();

        // 1. Check $TEXBUNDLE_CONFIG
        if let Ok(path) = std::env::var("TEXBUNDLE_CONFIG") {
            candidates.push(Candidate {
                path: PathBuf::from(path),
                explicit: true,
            });
        }

        // 2. Check $XDG_CONFIG_HOME/texbundle/config.toml
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            candidates.push(Candidate {
                path: PathBuf::from(xdg_home).join("texbundle/config.toml"),
                explicit: false,
            });
        }

        // 3. Check ~/.texbundle/config.toml
        if let Some(home) = dirs::home_dir() {
            candidates.push(Candidate {
                path: home.join(".texbundle/config.toml"),
                explicit: false,
            });
        }

        candidates
    }

    /// Load the first global config that exists.
    fn load_global(
        candidates: &[Candidate],
        warnings: &mut Vec<ConfigWarning>,
    ) -> Result<(GlobalConfig, Option<PathBuf>), ConfigError> {
        for candidate in candidates {
            if candidate.path.exists() {
                let config = read_config::<GlobalConfig>(&candidate.path)?;
                return Ok((config, Some(candidate.path.clone())));
            }
            if candidate.explicit {
                warnings.push(ConfigWarning {
                    message: "TEXBUNDLE_CONFIG points to a missing file, ignoring it".to_string(),
                    path: candidate.path.clone(),
                });
            }
        }

        // No config found, use defaults
        Ok((GlobalConfig::default(), None))
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Candidate encodings.
    ///
    /// Defaults to `["utf-8"]` if not configured.
    pub fn encodings(&self) -> Vec<String> {
        self.project
            .as_ref()
            .and_then(|p| p.encodings.clone())
            .or_else(|| self.global.encodings.clone())
            .unwrap_or_else(|| vec!["utf-8".to_string()])
    }

    /// Largest output directory `--force` may remove, in bytes.
    ///
    /// Defaults to 20 MiB if not configured. Sizes too large to count in
    /// bytes mean no limit.
    pub fn max_clean_bytes(&self) -> u64 {
        self.global
            .max_clean_size_mb
            .unwrap_or(DEFAULT_MAX_CLEAN_SIZE_MB)
            .saturating_mul(1024 * 1024)
    }

    /// Typesetting program.
    ///
    /// Defaults to "latexmk" if not configured.
    pub fn compile_program(&self) -> &str {
        self.global
            .compile
            .as_ref()
            .and_then(|c| c.program.as_deref())
            .unwrap_or(DEFAULT_COMPILE_PROGRAM)
    }

    /// Typesetting arguments.
    pub fn compile_args(&self) -> Vec<String> {
        self.global
            .compile
            .as_ref()
            .and_then(|c| c.args.clone())
            .unwrap_or_else(|| DEFAULT_COMPILE_ARGS.iter().map(|a| a.to_string()).collect())
    }

    /// Configured output directory, resolved against the project directory.
    pub fn out_dir(&self) -> Option<PathBuf> {
        let out = self.project.as_ref()?.out_dir.as_ref()?;
        Some(match &self.project_dir {
            Some(dir) if out.is_relative() => dir.join(out),
            _ => out.clone(),
        })
    }

    /// Whether to stamp the copied root with the commit id.
    ///
    /// Defaults to `false` if not configured.
    pub fn store_revision(&self) -> bool {
        self.project
            .as_ref()
            .and_then(|p| p.store_revision)
            .unwrap_or(false)
    }

    /// New name for the copied root, if any.
    pub fn rename(&self) -> Option<&str> {
        self.project.as_ref().and_then(|p| p.rename.as_deref())
    }

    /// Whether to compile for the bibliography.
    ///
    /// Defaults to `false` if not configured.
    pub fn compile(&self) -> bool {
        self.project
            .as_ref()
            .and_then(|p| p.compile)
            .unwrap_or(false)
    }

    /// Whether to archive the output tree.
    ///
    /// Defaults to `false` if not configured.
    pub fn archive(&self) -> bool {
        self.project
            .as_ref()
            .and_then(|p| p.archive)
            .unwrap_or(false)
    }

    /// Get the path to the loaded global config file.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    /// Get the path to the loaded project config file.
    pub fn project_config_loaded_from(&self) -> Option<PathBuf> {
        self.project_dir.as_ref().map(|d| d.join(PROJECT_CONFIG_FILE))
    }
}

/// Read and parse a config file.
fn read_config<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn candidate(path: PathBuf, explicit: bool) -> Candidate {
        Candidate { path, explicit }
    }

    #[test]
    fn load_empty_defaults() {
        let temp = TempDir::new().unwrap();
        let result = Config::load_from(&[], Some(temp.path())).unwrap();
        let config = result.config;

        assert_eq!(config.encodings(), vec!["utf-8"]);
        assert_eq!(config.max_clean_bytes(), 20 * 1024 * 1024);
        assert_eq!(config.compile_program(), "latexmk");
        assert!(config.out_dir().is_none());
        assert!(!config.store_revision());
        assert!(!config.archive());
        assert!(config.global_config_loaded_from().is_none());
        assert!(config.project_config_loaded_from().is_none());
    }

    #[test]
    fn first_existing_global_wins() {
        let temp = TempDir::new().unwrap();
        let second = temp.path().join("second.toml");
        fs::write(&second, "max_clean_size_mb = 5\n").unwrap();

        let candidates = [
            candidate(temp.path().join("absent.toml"), false),
            candidate(second.clone(), false),
        ];
        let result = Config::load_from(&candidates, None).unwrap();

        assert_eq!(result.config.max_clean_bytes(), 5 * 1024 * 1024);
        assert_eq!(result.config.global_config_loaded_from(), Some(second.as_path()));
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn huge_clean_limit_saturates() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, format!("max_clean_size_mb = {}\n", i64::MAX)).unwrap();

        let result = Config::load_from(&[candidate(path, false)], None).unwrap();

        assert_eq!(result.config.max_clean_bytes(), u64::MAX);
    }

    #[test]
    fn missing_explicit_global_warns() {
        let temp = TempDir::new().unwrap();
        let candidates = [candidate(temp.path().join("gone.toml"), true)];
        let result = Config::load_from(&candidates, None).unwrap();

        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].message.contains("TEXBUNDLE_CONFIG"));
    }

    #[test]
    fn project_overrides_global() {
        let temp = TempDir::new().unwrap();
        let global = temp.path().join("global.toml");
        fs::write(&global, "encodings = [\"latin1\"]\n").unwrap();
        fs::write(
            temp.path().join(PROJECT_CONFIG_FILE),
            "encodings = [\"utf-8\", \"latin1\"]\nout_dir = \"submission\"\narchive = true\n",
        )
        .unwrap();

        let result = Config::load_from(&[candidate(global, false)], Some(temp.path())).unwrap();
        let config = result.config;

        assert_eq!(config.encodings(), vec!["utf-8", "latin1"]);
        assert_eq!(config.out_dir(), Some(temp.path().join("submission")));
        assert!(config.archive());
        assert_eq!(
            config.project_config_loaded_from(),
            Some(temp.path().join(PROJECT_CONFIG_FILE))
        );
    }

    #[test]
    fn global_used_without_project_value() {
        let temp = TempDir::new().unwrap();
        let global = temp.path().join("global.toml");
        fs::write(
            &global,
            "encodings = [\"latin1\"]\n[compile]\nprogram = \"tectonic\"\nargs = []\n",
        )
        .unwrap();

        let result = Config::load_from(&[candidate(global, false)], None).unwrap();
        assert_eq!(result.config.encodings(), vec!["latin1"]);
        assert_eq!(result.config.compile_program(), "tectonic");
        assert!(result.config.compile_args().is_empty());
    }

    #[test]
    fn invalid_encoding_rejected() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(PROJECT_CONFIG_FILE),
            "encodings = [\"no-such-encoding\"]\n",
        )
        .unwrap();

        let result = Config::load_from(&[], Some(temp.path()));
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn unknown_fields_rejected() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(PROJECT_CONFIG_FILE),
            "archive = true\nunknown_field = true\n",
        )
        .unwrap();

        let result = Config::load_from(&[], Some(temp.path()));
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn absolute_out_dir_kept() {
        let temp = TempDir::new().unwrap();
        let absolute = temp.path().join("elsewhere");
        fs::write(
            temp.path().join(PROJECT_CONFIG_FILE),
            format!("out_dir = {:?}\n", absolute.display().to_string()),
        )
        .unwrap();

        let result = Config::load_from(&[], Some(temp.path())).unwrap();
        assert_eq!(result.config.out_dir(), Some(absolute));
    }
}
