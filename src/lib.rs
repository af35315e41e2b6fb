//! texbundle - Bundle a LaTeX document with exactly the files it uses
//!
//! Starting from a root document, texbundle follows every include directive
//! (also those hidden behind `\newcommand` definitions), copies just the
//! reachable files into a clean mirror tree and strips authoring comments
//! from the copied sources. The result is ready for upload to a preprint
//! server or a journal.
//!
//! # Architecture
//!
//! The codebase follows a layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Output preparation, graph walk, post-processing, report
//! - [`core`] - Comment stripping, macros, include resolution, config
//! - [`git`] - Single interface for Git (revision stamp)
//! - [`ui`] - User interaction utilities
//!
//! # Correctness Invariants
//!
//! texbundle maintains the following invariants:
//!
//! 1. Only files reachable from the root are copied, each exactly once
//! 2. Nothing resolves outside of the root document's directory
//! 3. An existing output directory is never removed without `--force`
//! 4. Expansion and inclusion cycles fail instead of looping

pub mod cli;
pub mod core;
pub mod engine;
pub mod git;
pub mod ui;
