//! core
//!
//! Core parsing and resolution for LaTeX sources.
//!
//! # Modules
//!
//! - [`strip`] - Comment stripping, per line and per document
//! - [`brackets`] - Bracket balancing across line boundaries
//! - [`macros`] - User-defined command registration and expansion
//! - [`include`] - Include directive detection and path resolution
//! - [`types`] - Strong types: EncodingList, TextFile, StaticFile, Oid
//! - [`error`] - Failure kinds raised while parsing a line
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Nothing here knows about the walker; each piece is usable on its own
//! - All parsing is line-oriented and purely textual
//! - Resolution never leaves the root directory

pub mod brackets;
pub mod config;
pub mod error;
pub mod include;
pub mod macros;
pub mod strip;
pub mod types;
