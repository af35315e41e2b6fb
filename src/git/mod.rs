//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the only doorway to Git. No other module imports `git2`.
//! Reads go through the `git2` crate; the git CLI is never invoked.
//!
//! # Responsibilities
//!
//! - Repository discovery from a document's directory
//! - Resolving HEAD to a commit id for the revision stamp

mod interface;

pub use interface::{Git, GitError};
