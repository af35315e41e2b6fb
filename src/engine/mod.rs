//! engine
//!
//! Orchestrates a pack run: Prepare -> Walk -> Post-process -> Report.
//!
//! # Architecture
//!
//! 1. **Prepare**: Make the output directory empty ([`output`])
//! 2. **Walk**: Copy everything the root reaches ([`walker`])
//! 3. **Post-process**: Stamp, rename, compile, archive ([`post`])
//! 4. **Report**: Sizes of what was copied ([`report`])
//!
//! # Invariants
//!
//! - Nothing outside the output directory is written, except the moved
//!   `.pdf` and the archive, both placed beside it
//! - Failures abort the run; nothing is rolled back
//!
//! # Example
//!
//! ```no_run
//! use texbundle::core::types::EncodingList;
//! use texbundle::engine::post::LatexmkCompiler;
//! use texbundle::engine::{pack, PackOptions};
//!
//! let options = PackOptions::new("paper/main.tex", "paper_arXiv", EncodingList::default());
//! let compiler = LatexmkCompiler::new("latexmk", vec![], false);
//! let outcome = pack(&options, &compiler).unwrap();
//! println!("{} files", outcome.report.len());
//! ```

pub mod output;
pub mod post;
pub mod report;
pub mod walker;

pub use output::OutputError;
pub use post::{Compiler, PostError};
pub use report::CopyReport;
pub use walker::{CopyState, WalkError, Walker};

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::config::DEFAULT_MAX_CLEAN_SIZE_MB;
use crate::core::types::{EncodingList, Oid};
use crate::git::Git;
use post::BibliographyOutcome;

/// Execution context for commands.
///
/// Contains global settings derived from CLI flags that affect command behavior.
#[derive(Debug, Clone)]
pub struct Context {
    /// Working directory override.
    pub cwd: Option<PathBuf>,
    /// Debug logging enabled.
    pub debug: bool,
    /// Quiet mode (minimal output).
    pub quiet: bool,
    /// Interactive mode enabled.
    pub interactive: bool,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            cwd: None,
            debug: false,
            quiet: false,
            interactive: true,
        }
    }
}

impl Context {
    /// Resolve `path` against the working directory override.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        match &self.cwd {
            Some(cwd) if path.is_relative() => cwd.join(path),
            _ => path.to_path_buf(),
        }
    }
}

/// Errors from a pack run.
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    /// The output directory could not be prepared.
    #[error(transparent)]
    Output(#[from] OutputError),

    /// The walk failed.
    #[error(transparent)]
    Walk(#[from] WalkError),

    /// A post-processing step failed.
    #[error(transparent)]
    Post(#[from] PostError),
}

/// Everything a pack run needs, with CLI and config already merged.
#[derive(Debug, Clone)]
pub struct PackOptions {
    /// The root document
    pub root_doc: PathBuf,
    /// Where the mirror tree goes
    pub out_dir: PathBuf,
    /// Candidate encodings
    pub encodings: EncodingList,
    /// Replace an existing output directory
    pub force: bool,
    /// Size limit for replacing it
    pub max_clean_bytes: u64,
    /// Stamp the copied root with the commit id
    pub store_revision: bool,
    /// New name for the copied root
    pub rename: Option<String>,
    /// Compile once for the bibliography
    pub compile: bool,
    /// Zip the output tree
    pub archive: bool,
}

impl PackOptions {
    /// Options that only copy, with every optional step off.
    pub fn new(
        root_doc: impl Into<PathBuf>,
        out_dir: impl Into<PathBuf>,
        encodings: EncodingList,
    ) -> Self {
        Self {
            root_doc: root_doc.into(),
            out_dir: out_dir.into(),
            encodings,
            force: false,
            max_clean_bytes: DEFAULT_MAX_CLEAN_SIZE_MB * 1024 * 1024,
            store_revision: false,
            rename: None,
            compile: false,
            archive: false,
        }
    }

    /// Directory includes are resolved against.
    pub fn root_dir(&self) -> PathBuf {
        match self.root_doc.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

/// Result of a pack run.
#[derive(Debug)]
pub struct PackOutcome {
    /// Copied files and sizes
    pub report: CopyReport,
    /// The copied root, relative to the output directory
    pub root: PathBuf,
    /// Commit id stamped into the root
    pub revision: Option<Oid>,
    /// What the bibliography step kept
    pub bibliography: Option<BibliographyOutcome>,
    /// Path of the written archive
    pub archive: Option<PathBuf>,
    /// Steps that were skipped, for the user
    pub warnings: Vec<String>,
}

/// Run a full pack.
///
/// # Errors
///
/// The first failure of any stage. Files written before it stay on disk.
pub fn pack(options: &PackOptions, compiler: &dyn Compiler) -> Result<PackOutcome, PackError> {
    let root_dir = options.root_dir();
    output::prepare_output_dir(
        &options.out_dir,
        &root_dir,
        options.force,
        options.max_clean_bytes,
    )?;

    let walker = Walker::new(
        &options.root_doc,
        &options.out_dir,
        options.encodings.clone(),
    );
    let mut root = walker.root_rel().to_path_buf();
    let mut report = walker.copy_all()?;
    let mut warnings = Vec::new();

    let revision = if options.store_revision {
        match Git::open(&root_dir).and_then(|git| git.head_oid()) {
            Ok(oid) => {
                let bytes = post::stamp_revision(&options.out_dir.join(&root), &oid)?;
                report.resize(&root, bytes);
                Some(oid)
            }
            Err(err) => {
                warn!(error = %err, "skipping revision stamp");
                warnings.push(format!("not stamping revision: {}", err));
                None
            }
        }
    } else {
        None
    };

    if let Some(new_name) = &options.rename {
        let new_root = post::rename_root(&options.out_dir, &root, new_name)?;
        report.rename(&root, new_root.clone());
        root = new_root;
    }

    let bibliography = if options.compile {
        Some(post::keep_bibliography(&options.out_dir, &root, compiler)?)
    } else {
        None
    };

    let archive = if options.archive {
        let name = root
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        Some(post::archive(&options.out_dir, &name)?)
    } else {
        None
    };

    debug!(files = report.len(), bytes = report.total_bytes(), "pack finished");
    Ok(PackOutcome {
        report,
        root,
        revision,
        bibliography,
        archive,
        warnings,
    })
}
