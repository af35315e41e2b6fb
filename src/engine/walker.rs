//! engine::walker
//!
//! Recursive traversal of the document graph and copying of every file it
//! reaches.
//!
//! # Overview
//!
//! [`Walker::copy_all`] copies the root document, then reads it line by line:
//!
//! ```text
//! strip -> define* -> expand -> resolve -> copy statics -> copy/recurse documents
//! ```
//!
//! Reading a document stops at `\end{document}`. Copied `.tex` files are
//! comment-stripped in the output tree.
//!
//! # Invariants
//!
//! - Every file is copied at most once; later includes of the same file
//!   only re-walk it
//! - A document never (transitively) includes itself
//! - Everything copied lies below the output directory, mirroring its
//!   position below the root directory
//!
//! # Example
//!
//! ```no_run
//! use texbundle::core::types::EncodingList;
//! use texbundle::engine::walker::Walker;
//!
//! let walker = Walker::new("paper/main.tex", "paper_arXiv", EncodingList::default());
//! let report = walker.copy_all().unwrap();
//! println!("copied {} files", report.len());
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use super::report::{CopiedFile, CopyReport};
use crate::core::error::ParseError;
use crate::core::include::IncludeResolver;
use crate::core::macros::MacroTable;
use crate::core::strip::{strip_file, strip_for_parse, StripFileError, END_DOCUMENT};
use crate::core::types::EncodingList;

/// Errors from walking the document graph.
#[derive(Debug, Error)]
pub enum WalkError {
    /// A line could not be processed.
    #[error("error in line {line_number} of '{}': {line}", .path.display())]
    Line {
        /// Document holding the line
        path: PathBuf,
        /// 1-based line number
        line_number: usize,
        /// The line as read, without its newline
        line: String,
        source: ParseError,
    },

    /// A whole document could not be read.
    #[error("cannot process '{}'", .path.display())]
    Document { path: PathBuf, source: ParseError },

    /// Filesystem failure.
    #[error("failed to {action} '{}'", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
}

impl WalkError {
    /// The parse failure underneath, if any.
    pub fn parse_error(&self) -> Option<&ParseError> {
        match self {
            WalkError::Line { source, .. } | WalkError::Document { source, .. } => Some(source),
            WalkError::Io { .. } => None,
        }
    }

    fn io<'a>(action: &'static str, path: &'a Path) -> impl FnOnce(std::io::Error) -> Self + 'a {
        move |source| WalkError::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Files copied so far, in copy order.
#[derive(Debug, Default)]
pub struct CopyState {
    files: Vec<CopiedFile>,
    seen: HashSet<PathBuf>,
}

impl CopyState {
    /// Check whether `rel_path` was already copied.
    pub fn contains(&self, rel_path: &Path) -> bool {
        self.seen.contains(rel_path)
    }

    /// Record a file that now exists in the output tree.
    pub fn record(&mut self, rel_path: PathBuf, bytes: u64) {
        if self.seen.insert(rel_path.clone()) {
            self.files.push(CopiedFile {
                path: rel_path,
                bytes,
            });
        }
    }

    /// Number of copied files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if nothing was copied.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Finish into a report.
    pub fn into_report(self) -> CopyReport {
        CopyReport::new(self.files)
    }
}

/// Depth-first walker over the include graph of one root document.
#[derive(Debug)]
pub struct Walker {
    root_dir: PathBuf,
    root_rel: PathBuf,
    out_dir: PathBuf,
    encodings: EncodingList,
    resolver: IncludeResolver,
    macros: MacroTable,
    state: CopyState,
    /// Documents currently being read, outermost first
    in_progress: Vec<PathBuf>,
}

impl Walker {
    /// Create a walker for `root_doc`, copying into `out_dir`.
    ///
    /// Includes are resolved against the directory holding `root_doc`.
    pub fn new(
        root_doc: impl AsRef<Path>,
        out_dir: impl Into<PathBuf>,
        encodings: EncodingList,
    ) -> Self {
        let root_doc = root_doc.as_ref();
        let root_dir = match root_doc.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let root_rel = root_doc
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| root_doc.to_path_buf());

        Self {
            resolver: IncludeResolver::new(root_dir.clone()),
            root_dir,
            root_rel,
            out_dir: out_dir.into(),
            encodings,
            macros: MacroTable::new(),
            state: CopyState::default(),
            in_progress: Vec::new(),
        }
    }

    /// The root document, relative to the root directory.
    pub fn root_rel(&self) -> &Path {
        &self.root_rel
    }

    /// Copy the root document and everything it reaches.
    ///
    /// # Errors
    ///
    /// The first failure aborts the walk. Files copied before it stay in
    /// the output tree.
    pub fn copy_all(mut self) -> Result<CopyReport, WalkError> {
        let root = self.root_rel.clone();
        debug!(root = %self.root_dir.join(&root).display(), out = %self.out_dir.display(), "starting walk");
        self.copy_file(&root)?;
        self.walk(&root)?;
        debug!(files = self.state.len(), commands = self.macros.len(), "walk finished");
        Ok(self.state.into_report())
    }

    fn walk(&mut self, rel: &Path) -> Result<(), WalkError> {
        let path = self.root_dir.join(rel);
        let bytes = fs::read(&path).map_err(WalkError::io("read", &path))?;
        let (text, encoding) = self
            .encodings
            .decode(&path, &bytes)
            .map_err(|source| WalkError::Document {
                path: path.clone(),
                source,
            })?;
        debug!(path = %rel.display(), encoding = encoding.name(), "reading document");

        // package internals rely on primitives outside the supported subset
        let is_style = has_extension(rel, "sty");

        self.in_progress.push(rel.to_path_buf());

        let lines: Vec<&str> = text.split_inclusive('\n').collect();
        let mut next = 0;
        while next < lines.len() {
            let line_number = next + 1;
            let raw = lines[next];
            next += 1;

            let stripped = strip_for_parse(raw);
            if stripped.contains(END_DOCUMENT) {
                debug!(path = %rel.display(), line_number, "reached end of document");
                break;
            }

            let context = |source: ParseError| WalkError::Line {
                path: path.clone(),
                line_number,
                line: raw.trim_end().to_string(),
                source,
            };

            let mut line = stripped.into_owned();
            if !is_style {
                loop {
                    let mut rest = lines[next..].iter();
                    match self.macros.define(&line, rest.by_ref()).map_err(context)? {
                        Some(remaining) => {
                            next = lines.len() - rest.len();
                            line = remaining;
                        }
                        None => break,
                    }
                }
                let mut rest = lines[next..].iter();
                line = self.macros.expand(&line, rest.by_ref()).map_err(context)?;
                next = lines.len() - rest.len();
            }

            for file in self.resolver.find_static_includes(&line).map_err(context)? {
                self.copy_file(&file.rel_path)?;
            }

            for doc in self.resolver.find_document_includes(&line).map_err(context)? {
                if doc.recurse && self.in_progress.contains(&doc.rel_path) {
                    let mut chain = self.in_progress.clone();
                    chain.push(doc.rel_path);
                    return Err(context(ParseError::CyclicInclude { chain }));
                }
                self.copy_file(&doc.rel_path)?;
                if doc.recurse {
                    debug!(from = %rel.display(), into = %doc.rel_path.display(), "recursing");
                    self.walk(&doc.rel_path)?;
                }
            }
        }

        self.in_progress.pop();
        Ok(())
    }

    /// Copy one file into the mirror position, once.
    fn copy_file(&mut self, rel: &Path) -> Result<(), WalkError> {
        if self.state.contains(rel) {
            debug!(path = %rel.display(), "already copied");
            return Ok(());
        }

        let src = self.root_dir.join(rel);
        let dst = self.out_dir.join(rel);
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).map_err(WalkError::io("create", parent))?;
        }
        let mut bytes = fs::copy(&src, &dst).map_err(WalkError::io("copy", &src))?;

        if has_extension(rel, "tex") {
            bytes = strip_file(&dst, &self.encodings)
                .map_err(|e| match e {
                    StripFileError::Io { path, source } => WalkError::Io {
                        action: "strip",
                        path,
                        source,
                    },
                    StripFileError::Decode(source) => WalkError::Document {
                        path: src.clone(),
                        source,
                    },
                })?
                .bytes_after;
        }

        debug!(path = %rel.display(), bytes, "copied");
        self.state.record(rel.to_path_buf(), bytes);
        Ok(())
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}
