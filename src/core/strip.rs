//! core::strip
//!
//! Comment stripping for LaTeX sources.
//!
//! # Rules
//!
//! Applied per physical line, given the previously emitted line:
//!
//! - A pure comment line (first non-blank char is `%`) is dropped. It leaves a
//!   single `%` placeholder behind unless the previous emitted line already
//!   was a placeholder or blank, so paragraph breaks survive without echoing
//!   the removed text.
//! - A line ending in `%` is kept verbatim. The trailing marker suppresses a
//!   line break in the typeset output.
//! - Otherwise the line is cut at the leftmost unescaped `%`.
//!
//! `\%` is a literal percent sign and never starts a comment.
//!
//! # Example
//!
//! ```
//! use texbundle::core::strip::strip_line;
//!
//! assert_eq!(strip_line("text % note\n", None).as_deref(), Some("text\n"));
//! assert_eq!(strip_line("50\\% off\n", None).as_deref(), Some("50\\% off\n"));
//! assert_eq!(strip_line("% only a comment\n", Some("%\n")), None);
//! ```

use std::borrow::Cow;
use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::debug;

use super::error::ParseError;
use super::types::EncodingList;

/// Comment marker.
pub const COMMENT: char = '%';

/// Escape prefix that turns the marker into a literal.
pub const ESCAPE: char = '\\';

/// The bare placeholder left behind for dropped comment lines.
pub const PLACEHOLDER: &str = "%\n";

/// Marker after which nothing of a document is read or copied.
pub const END_DOCUMENT: &str = "\\end{document}";

/// Strip comments from one physical line.
///
/// `line` normally includes its trailing newline. Returns `None` when the
/// line should be dropped entirely.
pub fn strip_line<'a>(line: &'a str, previous: Option<&str>) -> Option<Cow<'a, str>> {
    if line.trim_start().starts_with(COMMENT) {
        return match previous {
            Some(PLACEHOLDER) | Some("\n") => None,
            _ => Some(Cow::Borrowed(PLACEHOLDER)),
        };
    }

    if line.trim_end().ends_with(COMMENT) {
        return Some(Cow::Borrowed(line));
    }

    match leftmost_comment(line) {
        Some(at) => {
            let mut kept = line[..at].trim_end().to_string();
            kept.push('\n');
            Some(Cow::Owned(kept))
        }
        None => Some(Cow::Borrowed(line)),
    }
}

/// Strip a line for parsing purposes, where nothing is ever dropped.
///
/// Pure comment lines become the placeholder.
pub fn strip_for_parse(line: &str) -> Cow<'_, str> {
    strip_line(line, None).unwrap_or(Cow::Borrowed(PLACEHOLDER))
}

/// Byte offset of the leftmost `%` that is not escaped.
///
/// Index zero is never a comment start here: a line starting with the
/// marker is a pure comment line and handled before this is reached.
fn leftmost_comment(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    (1..bytes.len()).find(|&i| bytes[i] == COMMENT as u8 && bytes[i - 1] != ESCAPE as u8)
}

/// Strip a whole document.
///
/// Output stops after the line holding [`END_DOCUMENT`], which is always
/// newline-terminated and followed by one blank line. Stripping the result
/// again yields the same text.
pub fn strip_document(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous: Option<String> = None;

    for line in text.split_inclusive('\n') {
        let Some(stripped) = strip_line(line, previous.as_deref()) else {
            continue;
        };
        out.push_str(&stripped);
        if stripped.contains(END_DOCUMENT) {
            if !stripped.ends_with('\n') {
                out.push('\n');
            }
            out.push('\n');
            debug!(line = stripped.trim(), "reached end of document, stopping");
            break;
        }
        previous = Some(stripped.into_owned());
    }

    out
}

/// Strip comments from a file in place.
///
/// The file is decoded with the first candidate encoding that accepts it and
/// written back in that same encoding, through a sibling temporary file that
/// replaces the original by rename.
pub fn strip_file(path: &Path, encodings: &EncodingList) -> Result<StripOutcome, StripFileError> {
    strip_file_to(path, path, encodings)
}

/// Strip comments from `source` and write the result to `dest`.
///
/// `dest` may equal `source`. It is only replaced once the stripped text
/// has been written completely.
pub fn strip_file_to(
    source: &Path,
    dest: &Path,
    encodings: &EncodingList,
) -> Result<StripOutcome, StripFileError> {
    let bytes = fs::read(source).map_err(|e| StripFileError::Io {
        path: source.to_path_buf(),
        source: e,
    })?;
    let (text, encoding) = encodings.decode(source, &bytes)?;
    let stripped = strip_document(&text);
    let (encoded, _, _) = encoding.encode(&stripped);

    let mut tmp_name = dest.as_os_str().to_owned();
    tmp_name.push("_tmp");
    let tmp_path = Path::new(&tmp_name);

    let write = |p: &Path| -> std::io::Result<()> {
        let mut file = fs::File::create(p)?;
        file.write_all(&encoded)?;
        file.sync_all()
    };
    write(tmp_path).map_err(|e| StripFileError::Io {
        path: tmp_path.to_path_buf(),
        source: e,
    })?;
    fs::rename(tmp_path, dest).map_err(|e| StripFileError::Io {
        path: dest.to_path_buf(),
        source: e,
    })?;

    debug!(
        path = %dest.display(),
        encoding = encoding.name(),
        before = bytes.len(),
        after = encoded.len(),
        "stripped comments"
    );
    Ok(StripOutcome {
        bytes_before: bytes.len() as u64,
        bytes_after: encoded.len() as u64,
    })
}

/// Sizes before and after an in-place strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripOutcome {
    /// File size before stripping
    pub bytes_before: u64,
    /// File size after stripping
    pub bytes_after: u64,
}

/// Errors from [`strip_file`].
#[derive(Debug, thiserror::Error)]
pub enum StripFileError {
    #[error("failed to rewrite '{}': {source}", .path.display())]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Decode(#[from] ParseError),
}

#[cfg(test)]
mod tests {
    use super::*;

    mod lines {
        use super::*;

        fn strip(line: &str) -> Option<String> {
            strip_line(line, None).map(Cow::into_owned)
        }

        #[test]
        fn plain_line_unchanged() {
            assert_eq!(strip("asdf\n").as_deref(), Some("asdf\n"));
        }

        #[test]
        fn comment_line_becomes_placeholder() {
            assert_eq!(strip("%asdf\n").as_deref(), Some("%\n"));
            assert_eq!(strip("   % indented\n").as_deref(), Some("%\n"));
        }

        #[test]
        fn layout_marker_kept() {
            assert_eq!(strip("layout{%  \n").as_deref(), Some("layout{%  \n"));
        }

        #[test]
        fn single_char_before_comment() {
            assert_eq!(strip("a%cc\n").as_deref(), Some("a\n"));
        }

        #[test]
        fn cuts_at_leftmost() {
            assert_eq!(
                strip("inline comment % starts here % oh another\n").as_deref(),
                Some("inline comment\n")
            );
        }

        #[test]
        fn escaped_marker_is_literal() {
            assert_eq!(
                strip("percent \\% but then comment % starts here % oh another\n").as_deref(),
                Some("percent \\% but then comment\n")
            );
            assert_eq!(
                strip("percent \\% \\% but then comment % starts here % oh another\n").as_deref(),
                Some("percent \\% \\% but then comment\n")
            );
        }

        #[test]
        fn only_escaped_markers_unchanged() {
            assert_eq!(strip("50\\% of 10\\%s\n").as_deref(), Some("50\\% of 10\\%s\n"));
        }

        #[test]
        fn placeholder_not_repeated() {
            assert_eq!(strip_line("% again\n", Some("%\n")), None);
            assert_eq!(strip_line("% after blank\n", Some("\n")), None);
            assert_eq!(
                strip_line("% after text\n", Some("text\n")).as_deref(),
                Some("%\n")
            );
        }

        #[test]
        fn inline_comment_after_placeholder() {
            assert_eq!(
                strip_line("text % visible comment\n", Some("%\n")).as_deref(),
                Some("text\n")
            );
        }

        #[test]
        fn parse_strip_never_drops() {
            assert_eq!(strip_for_parse("% c\n"), "%\n");
        }
    }

    mod documents {
        use super::*;

        #[test]
        fn collapses_comment_runs() {
            let text = "a\n% one\n% two\n% three\nb\n";
            assert_eq!(strip_document(text), "a\n%\nb\n");
        }

        #[test]
        fn comment_after_blank_is_dropped() {
            let text = "a\n\n% note\nb\n";
            assert_eq!(strip_document(text), "a\n\nb\n");
        }

        #[test]
        fn stops_after_end_document() {
            let text = "\\begin{document}\nx\n\\end{document}\ntrailing notes\n";
            assert_eq!(
                strip_document(text),
                "\\begin{document}\nx\n\\end{document}\n\n"
            );
        }

        #[test]
        fn commented_end_document_does_not_stop() {
            let text = "x\n% \\end{document}\ny\n";
            assert_eq!(strip_document(text), "x\n%\ny\n");
        }

        #[test]
        fn end_document_without_newline() {
            let text = "x\n\\end{document}";
            let once = strip_document(text);
            assert_eq!(once, "x\n\\end{document}\n\n");
            assert_eq!(strip_document(&once), once);
        }

        #[test]
        fn idempotent() {
            let text = "% header\n\\documentclass{article} % class\n\n% lone\n\
                        \\begin{document}\nHello 100\\% sure.%\n% c1\n% c2\nBye\n\
                        \\end{document}\nignored\n";
            let once = strip_document(text);
            assert_eq!(strip_document(&once), once);
        }
    }

    mod files {
        use super::*;
        use tempfile::TempDir;

        #[test]
        fn rewrites_in_place() {
            let temp = TempDir::new().unwrap();
            let path = temp.path().join("main.tex");
            fs::write(&path, "keep % drop\n% gone\nend\n").unwrap();

            let outcome = strip_file(&path, &EncodingList::default()).unwrap();

            assert_eq!(fs::read_to_string(&path).unwrap(), "keep\n%\nend\n");
            assert!(outcome.bytes_after < outcome.bytes_before);
            assert!(!temp.path().join("main.tex_tmp").exists());
        }

        #[test]
        fn writes_elsewhere() {
            let temp = TempDir::new().unwrap();
            let src = temp.path().join("a.tex");
            let dst = temp.path().join("b.tex");
            fs::write(&src, "x % y\n").unwrap();

            strip_file_to(&src, &dst, &EncodingList::default()).unwrap();

            assert_eq!(fs::read_to_string(&src).unwrap(), "x % y\n");
            assert_eq!(fs::read_to_string(&dst).unwrap(), "x\n");
        }

        #[test]
        fn keeps_source_encoding() {
            let temp = TempDir::new().unwrap();
            let path = temp.path().join("latin.tex");
            // "café % note" in windows-1252
            fs::write(&path, b"caf\xe9 % note\n").unwrap();

            let encodings = EncodingList::new(["utf-8", "latin1"]).unwrap();
            strip_file(&path, &encodings).unwrap();

            assert_eq!(fs::read(&path).unwrap(), b"caf\xe9\n");
        }
    }
}
