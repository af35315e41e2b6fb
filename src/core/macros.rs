//! core::macros
//!
//! User-defined commands: registration and expansion.
//!
//! # Overview
//!
//! Documents often hide include directives behind their own commands:
//!
//! ```latex
//! \newcommand{\fig}[1]{\includegraphics{imgs/#1.png}}
//! \fig{cat}
//! ```
//!
//! The [`MacroTable`] records every `\newcommand` / `\renewcommand` it is
//! shown and rewrites later lines so the include resolver sees
//! `\includegraphics{imgs/cat.png}`.
//!
//! # Scope
//!
//! One table lives for the whole run. Definitions made in a sub-document
//! stay visible after it ends, as they do in LaTeX without grouping.
//!
//! # Invariants
//!
//! - A name maps to exactly one definition at any time
//! - Redefinition requires `\renewcommand`
//! - Expansion never re-enters a command it is already expanding

use std::cmp::Reverse;
use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::brackets::{consume_group, take_group, MAX_LOOKAHEAD};
use super::error::ParseError;
use super::strip::strip_for_parse;

/// `\newcommand`, `\renewcommand` and their starred forms, up to the `{`
/// that opens the body.
///
/// Groups: 1 = `re` when redefining, 2 = name, 3 = arity, 4 = default for
/// the first argument.
static DEFINITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\\(re)?newcommand\*?\s*\{?\s*(\\(?:[A-Za-z@]+|[^A-Za-z@\s]))\s*\}?\s*(?:\[\s*(\d+)\s*\])?\s*(?:\[([^\]]*)\])?\s*\{",
    )
    .expect("definition pattern is valid")
});

/// A user-defined command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroDefinition {
    /// Name including the leading backslash, e.g. `\fig`
    pub name: String,
    /// Raw, unexpanded body with `#1`..`#9` placeholders
    pub body: String,
    /// Number of arguments
    pub arity: usize,
    /// Default for an optional first argument (`\newcommand{\x}[2][d]{..}`)
    pub default: Option<String>,
}

impl MacroDefinition {
    /// Replace `#k` in the body with the k-th argument, verbatim.
    ///
    /// `##` is left alone so nested definitions keep their own parameters.
    ///
    /// # Example
    ///
    /// ```
    /// use texbundle::core::macros::MacroDefinition;
    ///
    /// let def = MacroDefinition {
    ///     name: "\\pair".into(),
    ///     body: "(#1, #2)".into(),
    ///     arity: 2,
    ///     default: None,
    /// };
    /// assert_eq!(def.substitute(&["a".into(), "b".into()]), "(a, b)");
    /// ```
    pub fn substitute(&self, args: &[String]) -> String {
        let mut out = String::with_capacity(self.body.len());
        let mut chars = self.body.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '#' {
                match chars.peek().copied() {
                    Some('#') => {
                        chars.next();
                        out.push_str("##");
                        continue;
                    }
                    Some(d) => {
                        if let Some(k) = d.to_digit(10).map(|k| k as usize) {
                            if (1..=args.len()).contains(&k) {
                                chars.next();
                                out.push_str(&args[k - 1]);
                                continue;
                            }
                        }
                    }
                    None => {}
                }
            }
            out.push(c);
        }
        out
    }
}

/// A definition with its compiled invocation matcher.
#[derive(Debug)]
struct Compiled {
    definition: MacroDefinition,
    invocation: Regex,
}

impl Compiled {
    fn new(definition: MacroDefinition) -> Result<Self, ParseError> {
        let mut pattern = regex::escape(&definition.name);
        // A control word ends at the first non-letter; `\fig` must not
        // match inside `\figure`.
        if definition
            .name
            .chars()
            .last()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '@')
        {
            pattern.push_str("(?:[^A-Za-z@]|$)");
        }
        let invocation = Regex::new(&pattern).map_err(|e| {
            ParseError::MalformedDefinition(format!(
                "cannot compile matcher for {}: {}",
                definition.name, e
            ))
        })?;
        Ok(Self {
            definition,
            invocation,
        })
    }
}

/// Registry of user-defined commands, in registration order.
///
/// # Example
///
/// ```
/// use texbundle::core::macros::MacroTable;
///
/// let mut table = MacroTable::new();
/// let rest = table
///     .define("\\newcommand{\\fig}[1]{\\includegraphics{imgs/#1.png}}\n", Vec::<String>::new())
///     .unwrap();
/// assert_eq!(rest.as_deref(), Some("\n"));
///
/// let line = table.expand("\\fig{cat}\n", Vec::<String>::new()).unwrap();
/// assert_eq!(line, "\\includegraphics{imgs/cat.png}\n");
/// ```
#[derive(Debug, Default)]
pub struct MacroTable {
    order: Vec<String>,
    entries: HashMap<String, Compiled>,
}

impl MacroTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the first command definition found in `line`.
    ///
    /// The body may continue on following lines, which are pulled from
    /// `rest`. Returns `None` when the line holds no definition, otherwise
    /// the line with the definition cut out (the text before it plus the
    /// text after its body), which may hold further definitions.
    ///
    /// # Errors
    ///
    /// - [`ParseError::MalformedDefinition`] for an unterminated body, a
    ///   `\newcommand` of an existing name, or a default argument without
    ///   arity
    pub fn define<I>(&mut self, line: &str, rest: I) -> Result<Option<String>, ParseError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let Some(caps) = DEFINITION.captures(line) else {
            return Ok(None);
        };
        let whole = caps.get(0).expect("group 0 always participates");
        let is_renew = caps.get(1).is_some();
        let name = caps[2].to_string();
        let arity = match caps.get(3) {
            Some(m) => m.as_str().parse::<usize>().map_err(|_| {
                ParseError::MalformedDefinition(format!("invalid arity for {}", name))
            })?,
            None => 0,
        };
        let default = caps.get(4).map(|m| m.as_str().to_string());
        if default.is_some() && arity == 0 {
            return Err(ParseError::MalformedDefinition(format!(
                "{} declares a default argument but takes no arguments",
                name
            )));
        }
        if arity > 9 {
            return Err(ParseError::MalformedDefinition(format!(
                "{} declares {} arguments, at most 9 are allowed",
                name, arity
            )));
        }

        let prefix = &line[..whole.start()];
        // the pattern ends on the opening bracket of the body
        let group = consume_group(&line[whole.end() - 1..], rest)?;

        self.insert(
            MacroDefinition {
                name,
                body: group.body,
                arity,
                default,
            },
            is_renew,
        )?;

        Ok(Some(format!("{}{}", prefix, group.remainder)))
    }

    /// Add a definition.
    ///
    /// An existing definition is replaced only when `replace` is set.
    pub fn insert(&mut self, definition: MacroDefinition, replace: bool) -> Result<(), ParseError> {
        if self.entries.contains_key(&definition.name) {
            if !replace {
                return Err(ParseError::MalformedDefinition(format!(
                    "redefining {} (use \\renewcommand)",
                    definition.name
                )));
            }
            self.entries.remove(&definition.name);
            self.order.retain(|n| n != &definition.name);
        }

        debug!(
            name = %definition.name,
            arity = definition.arity,
            body = %definition.body,
            "caching command"
        );
        let name = definition.name.clone();
        self.entries.insert(name.clone(), Compiled::new(definition)?);
        self.order.push(name);
        Ok(())
    }

    /// Look up a definition by name (with backslash).
    pub fn get(&self, name: &str) -> Option<&MacroDefinition> {
        self.entries.get(name).map(|c| &c.definition)
    }

    /// Number of registered commands.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check if no command is registered.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Rewrite every invocation of every known command in `line`.
    ///
    /// Invocations are replaced leftmost first. A substituted body is
    /// spliced into the line and scanned again from where it starts, so a
    /// command whose body names another command picks up the arguments
    /// that follow it. An argument left open at the end of the line
    /// continues on the lines pulled from `rest`.
    ///
    /// A name not followed by its arguments (`\let\old\fig`) is a reference
    /// to the command, not an invocation, and is left as written.
    ///
    /// # Errors
    ///
    /// - [`ParseError::ArgumentCount`] when an invocation stops short of its
    ///   arguments or one of them is never closed
    /// - [`ParseError::MalformedDefinition`] when a command (directly or
    ///   through others) expands to itself
    pub fn expand<I>(&self, line: &str, rest: I) -> Result<String, ParseError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut rest = rest.into_iter();
        let mut text = line.to_string();
        // bodies still being read, innermost last, with the byte count of
        // the text after each
        let mut active: Vec<(String, usize)> = Vec::new();
        let mut cursor = 0;

        while let Some((start, def)) = self.next_invocation(&text, cursor) {
            while active
                .last()
                .is_some_and(|(_, tail)| text.len() - tail <= start)
            {
                active.pop();
            }

            let after_name = start + def.name.len();
            let before = text.len();
            let Some((args, end)) = parse_arguments(def, &mut text, after_name, &mut rest)? else {
                cursor = after_name;
                continue;
            };
            let pulled = text.len() - before;
            for (_, tail) in active.iter_mut() {
                *tail += pulled;
            }
            // a body whose end the arguments run past is finished
            while active
                .last()
                .is_some_and(|(_, tail)| text.len() - tail < end)
            {
                active.pop();
            }

            if active.iter().any(|(name, _)| name == &def.name) {
                let mut chain: Vec<&str> = active.iter().map(|(name, _)| name.as_str()).collect();
                chain.push(&def.name);
                return Err(ParseError::MalformedDefinition(format!(
                    "recursive command expansion: {}",
                    chain.join(" -> ")
                )));
            }

            let tail = text.len() - end;
            text.replace_range(start..end, &def.substitute(&args));
            active.push((def.name.clone(), tail));
            cursor = start;
        }

        Ok(text)
    }

    /// Find the leftmost invocation at or after `from`. On a tie the
    /// longer name wins.
    fn next_invocation(&self, text: &str, from: usize) -> Option<(usize, &MacroDefinition)> {
        self.order
            .iter()
            .filter_map(|name| self.entries.get(name))
            .filter_map(|c| {
                c.invocation
                    .find_at(text, from)
                    .map(|m| (m.start(), &c.definition))
            })
            .min_by_key(|(start, def)| (*start, Reverse(def.name.len())))
    }
}

/// Read the arguments of an invocation whose name ends at `from`.
///
/// Returns the arguments and the offset just past the last one, or `None`
/// when the name is not followed by its arguments at all. Lines pulled from
/// `rest` to close an argument are appended to `text`.
fn parse_arguments<I>(
    def: &MacroDefinition,
    text: &mut String,
    from: usize,
    rest: &mut I,
) -> Result<Option<(Vec<String>, usize)>, ParseError>
where
    I: Iterator,
    I::Item: AsRef<str>,
{
    let mut args = Vec::with_capacity(def.arity);
    let mut pos = from;
    let mut required = def.arity;
    let mut invoked = false;

    if let Some(default) = &def.default {
        let at = pos + leading_blanks(&text[pos..]);
        match take_group(&text[at..], '[', ']') {
            Some((inner, tail)) => {
                args.push(inner.to_string());
                pos = text.len() - tail.len();
                invoked = true;
            }
            None if text[at..].starts_with('[') => return Ok(None),
            None => args.push(default.clone()),
        }
        required -= 1;
    }

    for _ in 0..required {
        let at = pos + leading_blanks(&text[pos..]);
        if !text[at..].starts_with('{') {
            if !invoked {
                return Ok(None);
            }
            return Err(argument_count(def, text, from, pos, args.len()));
        }

        let mut pulled = 0;
        while take_group(&text[at..], '{', '}').is_none() {
            let next = if pulled < MAX_LOOKAHEAD { rest.next() } else { None };
            let Some(line) = next else {
                return Err(argument_count(def, text, from, text.len(), args.len()));
            };
            text.push_str(&strip_for_parse(line.as_ref()));
            pulled += 1;
        }

        if let Some((inner, tail)) = take_group(&text[at..], '{', '}') {
            args.push(inner.to_string());
            pos = text.len() - tail.len();
        }
        invoked = true;
    }

    Ok(Some((args, pos)))
}

/// The error for an invocation cut short at `pos`, quoting its first line.
fn argument_count(
    def: &MacroDefinition,
    text: &str,
    from: usize,
    pos: usize,
    found: usize,
) -> ParseError {
    let written = text[from..pos].lines().next().unwrap_or_default();
    ParseError::ArgumentCount {
        name: def.name.clone(),
        expected: def.arity,
        found,
        invocation: format!("{}{}", def.name, written.trim_end()),
    }
}

fn leading_blanks(text: &str) -> usize {
    text.len() - text.trim_start_matches([' ', '\t']).len()
}
