//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`EncodingList`] - Ordered, validated candidate text encodings
//! - [`TextFile`] - A document to copy and optionally walk
//! - [`StaticFile`] - An asset to copy, never walked
//! - [`Oid`] - Git commit identifier used for the revision stamp
//!
//! # Validation
//!
//! These types enforce validity at construction time. An unknown encoding
//! label or a malformed object id cannot be represented.
//!
//! # Examples
//!
//! ```
//! use texbundle::core::types::{EncodingList, Oid};
//!
//! let encodings = EncodingList::new(["utf-8", "latin1"]).unwrap();
//! assert_eq!(encodings.labels(), ["utf-8", "latin1"]);
//!
//! assert!(EncodingList::new(["klingon"]).is_err());
//! assert!(Oid::new("not-a-sha").is_err());
//! ```

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use encoding_rs::Encoding;
use thiserror::Error;

use super::error::ParseError;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid object id: {0}")]
    InvalidOid(String),
}

/// Ordered list of candidate encodings for reading documents.
///
/// Each document is decoded with the first candidate that decodes it without
/// error. Labels are anything `encoding_rs` understands (`utf-8`, `latin1`,
/// `windows-1252`, `shift_jis`, ...).
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use texbundle::core::types::EncodingList;
///
/// let encodings = EncodingList::new(["utf-8", "latin1"]).unwrap();
/// let (text, used) = encodings.decode(Path::new("a.tex"), b"caf\xe9").unwrap();
/// assert_eq!(text, "café");
/// assert_eq!(used.name(), "windows-1252");
/// ```
#[derive(Debug, Clone)]
pub struct EncodingList {
    labels: Vec<String>,
    encodings: Vec<&'static Encoding>,
}

impl EncodingList {
    /// Create a validated list.
    ///
    /// # Errors
    ///
    /// - [`ParseError::UnknownEncoding`] for a label `encoding_rs` does not know
    pub fn new<I, S>(labels: I) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = Self {
            labels: Vec::new(),
            encodings: Vec::new(),
        };
        for label in labels {
            let label = label.into();
            let encoding = Encoding::for_label(label.trim().as_bytes())
                .ok_or_else(|| ParseError::UnknownEncoding(label.clone()))?;
            list.labels.push(label);
            list.encodings.push(encoding);
        }
        if list.labels.is_empty() {
            return Ok(Self::default());
        }
        Ok(list)
    }

    /// The labels as given, in order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Decode `bytes` with the first candidate that accepts them.
    ///
    /// Returns the text and the encoding that decoded it, so writers can
    /// round-trip the document in its own encoding.
    ///
    /// # Errors
    ///
    /// - [`ParseError::EncodingExhausted`] when every candidate fails
    pub fn decode<'b>(
        &self,
        path: &Path,
        bytes: &'b [u8],
    ) -> Result<(Cow<'b, str>, &'static Encoding), ParseError> {
        for (label, encoding) in self.labels.iter().zip(&self.encodings) {
            match encoding.decode_without_bom_handling_and_without_replacement(bytes) {
                Some(text) => return Ok((text, encoding)),
                None => {
                    tracing::debug!(path = %path.display(), encoding = %label, "decode failed, trying next encoding");
                }
            }
        }
        Err(ParseError::EncodingExhausted {
            path: path.to_path_buf(),
            encodings: self.labels.clone(),
        })
    }
}

impl Default for EncodingList {
    fn default() -> Self {
        Self {
            labels: vec!["utf-8".to_string()],
            encodings: vec![encoding_rs::UTF_8],
        }
    }
}

/// A document reached through a document include.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFile {
    /// Path relative to the root directory
    pub rel_path: PathBuf,
    /// Whether the walker parses it for further includes
    pub recurse: bool,
}

/// An asset reached through a graphics include.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticFile {
    /// The path exactly as written in the source
    pub written: String,
    /// The resolved path relative to the root directory
    pub rel_path: PathBuf,
}

/// A Git object identifier (SHA-1 or SHA-256).
///
/// OIDs are normalized to lowercase for consistency.
///
/// # Example
///
/// ```
/// use texbundle::core::types::Oid;
///
/// let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
/// assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
/// assert_eq!(oid.short(7), "abc123d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Oid(String);

impl Oid {
    /// Create a new validated object id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOid` if the string is not a valid hex OID.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        // SHA-1 is 40 hex chars, SHA-256 is 64
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }
        if !oid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid(
                "object id must be hexadecimal".into(),
            ));
        }
        Ok(Self(oid))
    }

    /// Get an abbreviated form of the OID.
    pub fn short(&self, len: usize) -> &str {
        let end = len.min(self.0.len());
        &self.0[..end]
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
