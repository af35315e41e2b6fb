//! engine::output
//!
//! Preparation of the output directory.
//!
//! # Guard
//!
//! An existing output directory is only removed when forced, and never when
//! it holds more than the configured number of bytes or contains the sources
//! themselves. Measuring stops as soon as the limit is crossed.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Errors from preparing the output directory.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("'{}' exists, use --force to replace it", .path.display())]
    AlreadyExists { path: PathBuf },

    #[error("refusing to remove '{}': it holds more than {limit_bytes} bytes", .path.display())]
    DestructiveOverwriteRefused { path: PathBuf, limit_bytes: u64 },

    #[error("output directory '{}' contains the sources in '{}'", .out_dir.display(), .root_dir.display())]
    OverlapsSource { out_dir: PathBuf, root_dir: PathBuf },

    #[error("failed to {action} '{}': {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
}

fn io_err<'a>(action: &'static str, path: &'a Path) -> impl FnOnce(std::io::Error) -> OutputError + 'a {
    move |source| OutputError::Io {
        action,
        path: path.to_path_buf(),
        source,
    }
}

/// Default output directory: `<root dir>_arXiv` beside the root directory.
pub fn default_out_dir(root_dir: &Path) -> PathBuf {
    let absolute = fs::canonicalize(root_dir).unwrap_or_else(|_| root_dir.to_path_buf());
    let name = absolute
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let parent = absolute.parent().unwrap_or_else(|| Path::new("."));
    parent.join(format!("{}_arXiv", name))
}

/// Make `out_dir` an empty, existing directory.
///
/// # Errors
///
/// - [`OutputError::AlreadyExists`] if it exists and `force` is unset
/// - [`OutputError::DestructiveOverwriteRefused`] if it is larger than
///   `max_bytes`
/// - [`OutputError::OverlapsSource`] if removing it would remove `root_dir`
pub fn prepare_output_dir(
    out_dir: &Path,
    root_dir: &Path,
    force: bool,
    max_bytes: u64,
) -> Result<(), OutputError> {
    if out_dir.exists() {
        if !force {
            return Err(OutputError::AlreadyExists {
                path: out_dir.to_path_buf(),
            });
        }

        let out_abs = fs::canonicalize(out_dir).map_err(io_err("resolve", out_dir))?;
        let root_abs = fs::canonicalize(root_dir).map_err(io_err("resolve", root_dir))?;
        if root_abs.starts_with(&out_abs) {
            return Err(OutputError::OverlapsSource {
                out_dir: out_dir.to_path_buf(),
                root_dir: root_dir.to_path_buf(),
            });
        }

        remove_guarded(out_dir, max_bytes)?;
    }

    fs::create_dir_all(out_dir).map_err(io_err("create", out_dir))?;
    Ok(())
}

/// Remove a directory tree unless it holds more than `max_bytes`.
pub fn remove_guarded(dir: &Path, max_bytes: u64) -> Result<(), OutputError> {
    let mut total = 0;
    if !within_size(dir, max_bytes, &mut total)? {
        return Err(OutputError::DestructiveOverwriteRefused {
            path: dir.to_path_buf(),
            limit_bytes: max_bytes,
        });
    }
    debug!(path = %dir.display(), bytes = total, "removing previous output");
    fs::remove_dir_all(dir).map_err(io_err("remove", dir))
}

/// Add up sizes below `path`; false as soon as `limit` is exceeded.
///
/// Symbolic links count by their own size and are not followed.
fn within_size(path: &Path, limit: u64, total: &mut u64) -> Result<bool, OutputError> {
    let meta = fs::symlink_metadata(path).map_err(io_err("inspect", path))?;
    if meta.is_dir() {
        for entry in fs::read_dir(path).map_err(io_err("list", path))? {
            let entry = entry.map_err(io_err("list", path))?;
            if !within_size(&entry.path(), limit, total)? {
                return Ok(false);
            }
        }
    } else {
        *total += meta.len();
    }
    Ok(*total <= limit)
}
