//! core::brackets
//!
//! Bracket balancing across line boundaries.
//!
//! A macro body may span several physical lines. [`consume_group`] reads
//! lines from the document until the `{` that opened the body is closed,
//! stripping comments from every line first so a `}` inside a comment is
//! never counted. Counting is purely textual.

use super::error::ParseError;
use super::strip::strip_for_parse;

/// How many lines past the opening one a group may span.
pub const MAX_LOOKAHEAD: usize = 100;

/// A balanced group and whatever followed it on its last line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// The text between the outer brackets
    pub body: String,
    /// Unconsumed tail of the final line, for further parsing
    pub remainder: String,
}

/// Consume characters until the group opened at `first_line[0]` is closed.
///
/// Further lines are pulled from `rest` as needed; lines taken from it are
/// consumed for good.
///
/// # Errors
///
/// - [`ParseError::MalformedDefinition`] if `first_line` does not start with
///   `{`, if input runs out, or if the group is still open after
///   [`MAX_LOOKAHEAD`] further lines
///
/// # Example
///
/// ```
/// use texbundle::core::brackets::consume_group;
///
/// let rest = ["more} % ignored }\n", "done} tail\n"];
/// let group = consume_group("{start {x\n", rest).unwrap();
/// assert_eq!(group.body, "start {x\nmore}\ndone");
/// assert_eq!(group.remainder, " tail\n");
/// ```
pub fn consume_group<I>(first_line: &str, rest: I) -> Result<Group, ParseError>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    if !first_line.starts_with('{') {
        return Err(ParseError::MalformedDefinition(format!(
            "expected '{{' at start of '{}'",
            first_line.trim_end()
        )));
    }

    let mut consumed = String::new();
    let mut depth = 0usize;

    if let Some(group) = scan_line(&strip_for_parse(first_line), &mut consumed, &mut depth) {
        return Ok(group);
    }

    let mut rest = rest.into_iter();
    for _ in 0..MAX_LOOKAHEAD {
        let Some(line) = rest.next() else {
            return Err(unterminated(first_line, "input ended"));
        };
        if let Some(group) = scan_line(&strip_for_parse(line.as_ref()), &mut consumed, &mut depth)
        {
            return Ok(group);
        }
    }

    Err(unterminated(
        first_line,
        &format!("not closed within {} lines", MAX_LOOKAHEAD),
    ))
}

fn scan_line(line: &str, consumed: &mut String, depth: &mut usize) -> Option<Group> {
    for (i, c) in line.char_indices() {
        match c {
            '{' => *depth += 1,
            '}' => *depth = depth.saturating_sub(1),
            _ => {}
        }
        if *depth == 0 {
            // drop the opening bracket
            let body = consumed.get(1..).unwrap_or_default().to_string();
            return Some(Group {
                body,
                remainder: line[i + 1..].to_string(),
            });
        }
        consumed.push(c);
    }
    None
}

fn unterminated(first_line: &str, why: &str) -> ParseError {
    let head: String = first_line.trim_end().chars().take(100).collect();
    ParseError::MalformedDefinition(format!(
        "could not find closing bracket for '{}' ({})",
        head, why
    ))
}

/// Split a balanced `open ... close` group off the start of `text`.
///
/// Returns the inner text and the rest, or `None` if `text` does not start
/// with `open` or the group is not closed within `text`.
///
/// # Example
///
/// ```
/// use texbundle::core::brackets::take_group;
///
/// assert_eq!(take_group("{a{b}}c", '{', '}'), Some(("a{b}", "c")));
/// assert_eq!(take_group("{open", '{', '}'), None);
/// ```
pub fn take_group(text: &str, open: char, close: char) -> Option<(&str, &str)> {
    if !text.starts_with(open) {
        return None;
    }
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some((&text[open.len_utf8()..i], &text[i + close.len_utf8()..]));
            }
        }
    }
    None
}
