//! Line-oriented compiler from query text to a [`QueryTree`].
//!
//! Each line is matched against the productions below, first match wins:
//!
//! 1. inline block: `key(args) { field field alias: expr }`
//! 2. block opener: `key(args) @directive(...) {`, optionally `alias: path {`
//! 3. block closer: `}`
//! 4. fragment spread: `...name`
//! 5. annotated field: `field @skip(if: "...") @default(value: "...")`;
//!    bare names before it (`id name email @default(...)`) stay plain fields
//! 6. aliased field: `alias: expr` or `alias: path`
//! 7. bare field(s): `name`, or `id, name, email`
//!
//! Blank lines and lines starting with `#` are skipped; trailing commas are
//! dropped. The compiler never fails. Lines it cannot place, stray `}` and
//! blocks left open at the end are reported as [`Diagnostic`]s and
//! otherwise ignored. Blocks still open at end of input never reach the
//! returned tree.

use std::{fmt, sync::LazyLock};

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::query::{Directive, FieldSpec, QueryTree};

const QUOTED: &str = r#""(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'"#;

static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"@(\w+)\s*\(\s*(\w+)\s*:\s*({QUOTED}|[^)\s]+)\s*\)"))
        .expect("directive pattern is valid")
});

static BLOCK_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    let directive = format!(r"@\w+\s*\(\s*\w+\s*:\s*(?:{QUOTED}|[^)\s]+)\s*\)");
    Regex::new(&format!(
        r#"^(?:(\w+)\s*:\s*)?([\w.]+)\s*(?:\(((?:[^()"']|{QUOTED})*)\))?\s*((?:{directive}\s*)*)\{{(.*)$"#
    ))
    .expect("block header pattern is valid")
});

static SPREAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\.\.\.\s*(\w+)$").expect("spread pattern is valid"));

static ALIAS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+)\s*:\s*(.+)$").expect("alias pattern is valid"));

static BARE_FIELDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\w.]+(?:[\s,]+[\w.]+)*$").expect("bare field pattern is valid")
});

/// Something the compiler skipped over.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// 1-based line number in the query text
    pub line: usize,
    pub kind: DiagnosticKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticKind {
    /// Line matched no production and was dropped
    UnrecognizedLine(String),
    /// `}` with no open block
    UnmatchedClose,
    /// Block still open at end of input; dropped with its contents
    UnclosedBlock(String),
    /// Block argument or directive that could not be applied
    InvalidArgument(String),
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: ", self.line)?;
        match &self.kind {
            DiagnosticKind::UnrecognizedLine(text) => write!(f, "unrecognized line '{}'", text),
            DiagnosticKind::UnmatchedClose => write!(f, "'}}' without an open block"),
            DiagnosticKind::UnclosedBlock(key) => write!(f, "block '{}' is never closed", key),
            DiagnosticKind::InvalidArgument(arg) => write!(f, "invalid argument '{}'", arg),
        }
    }
}

/// An open multi-line block.
struct Frame {
    key: String,
    directive: Directive,
    tree: QueryTree,
}

pub struct Compiler<'a> {
    source: &'a str,
    root: QueryTree,
    stack: Vec<Frame>,
    /// Bare `{` lines wrapping the whole query
    wrappers: usize,
    line: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Compiler<'a> {
    pub fn new(source: &'a str) -> Self {
        Compiler {
            source,
            root: QueryTree::new(),
            stack: Vec::new(),
            wrappers: 0,
            line: 0,
            diagnostics: Vec::new(),
        }
    }

    pub fn compile(self) -> QueryTree {
        self.compile_with_diagnostics().0
    }

    /// Compile, also returning everything that was skipped.
    pub fn compile_with_diagnostics(mut self) -> (QueryTree, Vec<Diagnostic>) {
        let source = self.source;
        for (index, raw) in source.lines().enumerate() {
            self.line = index + 1;
            self.feed_line(raw);
        }

        while let Some(frame) = self.stack.pop() {
            self.report(DiagnosticKind::UnclosedBlock(frame.key));
        }
        (self.root, self.diagnostics)
    }

    fn report(&mut self, kind: DiagnosticKind) {
        let diagnostic = Diagnostic {
            line: self.line,
            kind,
        };
        debug!(%diagnostic, "query line skipped");
        self.diagnostics.push(diagnostic);
    }

    fn current_tree(&mut self) -> &mut QueryTree {
        match self.stack.last_mut() {
            Some(frame) => &mut frame.tree,
            None => &mut self.root,
        }
    }

    fn feed_line(&mut self, raw: &str) {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            return;
        }
        let line = line.trim_end_matches(',').trim_end();

        if line == "{" {
            if self.stack.is_empty() {
                self.wrappers += 1;
            } else {
                self.report(DiagnosticKind::UnrecognizedLine(line.to_string()));
            }
            return;
        }

        if line.chars().all(|c| c == '}' || c.is_whitespace()) {
            for _ in line.chars().filter(|c| *c == '}') {
                self.close_block();
            }
            return;
        }

        if let Some(caps) = BLOCK_HEADER.captures(line) {
            let alias = caps.get(1).map(|m| m.as_str());
            let key = caps.get(2).map_or("", |m| m.as_str());
            let args = caps.get(3).map(|m| m.as_str());
            let directives = caps.get(4).map_or("", |m| m.as_str());
            let rest = caps.get(5).map_or("", |m| m.as_str());
            self.open_block(alias, key, args, directives, rest);
            return;
        }

        if let Some(caps) = SPREAD.captures(line) {
            self.current_tree().insert_spread(&caps[1]);
            return;
        }

        match self.parse_field(line) {
            Some(fields) => {
                let tree = self.current_tree();
                for (key, spec) in fields {
                    tree.insert(key, spec);
                }
            }
            None => self.report(DiagnosticKind::UnrecognizedLine(line.to_string())),
        }
    }

    fn open_block(
        &mut self,
        alias: Option<&str>,
        key: &str,
        args: Option<&str>,
        directives: &str,
        rest: &str,
    ) {
        let (out_key, path) = match alias {
            Some(alias) => (alias.to_string(), Some(key.to_string())),
            None if key.contains('.') => (key.to_string(), Some(key.to_string())),
            None => (key.to_string(), None),
        };

        let mut directive = Directive {
            path,
            ..Directive::default()
        };
        if let Some(args) = args {
            self.apply_args(&mut directive, args);
        }
        self.apply_directives(&mut directive, directives);

        match find_closing_brace(rest) {
            Some(close) => {
                self.apply_directives(&mut directive, &rest[close + 1..]);
                directive.nested = Some(self.parse_field_list(&rest[..close]));
                self.current_tree()
                    .insert(out_key, FieldSpec::Directive(directive));
            }
            None => {
                self.apply_directives(&mut directive, rest);
                let leftover = DIRECTIVE.replace_all(rest, "");
                if !leftover.trim().is_empty() {
                    self.report(DiagnosticKind::UnrecognizedLine(leftover.trim().to_string()));
                }
                self.stack.push(Frame {
                    key: out_key,
                    directive,
                    tree: QueryTree::new(),
                });
            }
        }
    }

    fn close_block(&mut self) {
        match self.stack.pop() {
            Some(frame) => {
                let spec = FieldSpec::Directive(Directive {
                    nested: Some(frame.tree),
                    ..frame.directive
                });
                self.current_tree().insert(frame.key, spec);
            }
            None if self.wrappers > 0 => self.wrappers -= 1,
            None => self.report(DiagnosticKind::UnmatchedClose),
        }
    }

    /// Apply `filter: "..."`, `limit: N`, `skip: N`.
    fn apply_args(&mut self, directive: &mut Directive, args: &str) {
        for pair in split_top_level(args, b',') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let Some((name, value)) = pair.split_once(':') else {
                self.report(DiagnosticKind::InvalidArgument(pair.to_string()));
                continue;
            };
            let value = unquote(value.trim());
            match name.trim() {
                "filter" => directive.filter = Some(value),
                "limit" => match parse_count(&value) {
                    Some(n) => directive.limit = Some(n),
                    None => self.report(DiagnosticKind::InvalidArgument(pair.to_string())),
                },
                "skip" => match parse_count(&value) {
                    Some(n) => directive.skip = Some(n),
                    None => self.report(DiagnosticKind::InvalidArgument(pair.to_string())),
                },
                _ => self.report(DiagnosticKind::InvalidArgument(pair.to_string())),
            }
        }
    }

    fn apply_directives(&mut self, directive: &mut Directive, text: &str) {
        for caps in DIRECTIVE.captures_iter(text) {
            let raw = &caps[3];
            let quoted = raw.starts_with('"') || raw.starts_with('\'');
            let value = unquote(raw);
            match &caps[1] {
                "skip" => directive.skip_if = Some(value),
                "include" => directive.include_if = Some(value),
                "transform" => directive.transform = Some(value),
                "default" => {
                    // Unquoted defaults are read as JSON literals: 0, true, null
                    let default = if quoted {
                        Value::String(value)
                    } else {
                        serde_json::from_str(&value).unwrap_or(Value::String(value))
                    };
                    directive.default = Some(default);
                }
                _ => self.report(DiagnosticKind::InvalidArgument(caps[0].to_string())),
            }
        }
    }

    /// Fields on a single line: annotated, aliased or bare.
    fn parse_field(&mut self, text: &str) -> Option<Vec<(String, FieldSpec)>> {
        if DIRECTIVE.is_match(text) {
            let mut directive = Directive::default();
            self.apply_directives(&mut directive, text);
            let stripped = DIRECTIVE.replace_all(text, "");
            let remainder = stripped.trim().trim_end_matches(',').trim();

            if let Some(caps) = ALIAS.captures(remainder) {
                directive.path = Some(caps[2].trim().to_string());
                return Some(vec![(caps[1].to_string(), FieldSpec::Directive(directive))]);
            }
            if !BARE_FIELDS.is_match(remainder) {
                return None;
            }

            // `a b c @default(...)`: only the last name carries the directives
            let mut fields = bare_fields(remainder);
            let (key, _) = fields.pop()?;
            if key.contains('.') {
                directive.path = Some(key.clone());
            }
            fields.push((key, FieldSpec::Directive(directive)));
            return Some(fields);
        }

        if let Some(caps) = ALIAS.captures(text) {
            return Some(vec![(caps[1].to_string(), FieldSpec::classify(&caps[2]))]);
        }

        if BARE_FIELDS.is_match(text) {
            return Some(bare_fields(text));
        }

        None
    }

    /// Body of an inline block: `a b alias: expr, other: expr`.
    ///
    /// Aliased fields run to the next top-level comma, so several aliased
    /// fields on one line need commas between them.
    fn parse_field_list(&mut self, body: &str) -> QueryTree {
        let mut tree = QueryTree::new();

        for segment in split_top_level(body, b',') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            if let Some(caps) = SPREAD.captures(segment) {
                tree.insert_spread(&caps[1]);
                continue;
            }

            let (bare, field) = match find_alias_start(segment) {
                Some(start) => (&segment[..start], &segment[start..]),
                None => ("", segment),
            };
            for part in [bare.trim(), field.trim()] {
                if part.is_empty() {
                    continue;
                }
                match self.parse_field(part) {
                    Some(fields) => {
                        for (key, spec) in fields {
                            tree.insert(key, spec);
                        }
                    }
                    None => self.report(DiagnosticKind::UnrecognizedLine(part.to_string())),
                }
            }
        }
        tree
    }
}

/// Compile query text into a tree, skipping anything unrecognized.
///
/// # Examples
///
/// ```
/// use shapeql::{FieldSpec, compile};
///
/// let tree = compile(r#"
///     # who wrote it
///     author {
///         name
///         email @default(value: "n/a")
///     }
///     title
/// "#);
/// assert_eq!(tree.keys().collect::<Vec<_>>(), vec!["author", "title"]);
/// assert_eq!(tree.get("title"), Some(&FieldSpec::Literal("title".into())));
/// ```
pub fn compile(text: &str) -> QueryTree {
    Compiler::new(text).compile()
}

/// Like [`compile`], also returning the diagnostics.
pub fn compile_with_diagnostics(text: &str) -> (QueryTree, Vec<Diagnostic>) {
    Compiler::new(text).compile_with_diagnostics()
}

/// Walk `source` outside quotes, calling `visit(index, byte, depth)` for
/// every byte at nesting depth of `()`/`[]`/`{}`; stops when it returns true.
fn scan(source: &str, mut visit: impl FnMut(usize, u8, i32) -> bool) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut quote: Option<u8> = None;
    let mut depth = 0i32;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(_) if b == b'\\' => i += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => {
                if b == b'"' || b == b'\'' {
                    quote = Some(b);
                } else {
                    if matches!(b, b')' | b']' | b'}') {
                        depth -= 1;
                    }
                    if visit(i, b, depth) {
                        return Some(i);
                    }
                    if matches!(b, b'(' | b'[' | b'{') {
                        depth += 1;
                    }
                }
            }
        }
        i += 1;
    }
    None
}

fn split_top_level(source: &str, separator: u8) -> Vec<&str> {
    let mut parts = vec![];
    let mut start = 0;
    scan(source, |i, b, depth| {
        if b == separator && depth == 0 {
            parts.push(&source[start..i]);
            start = i + 1;
        }
        false
    });
    parts.push(&source[start..]);
    parts
}

/// `id, name email` as literal fields.
fn bare_fields(text: &str) -> Vec<(String, FieldSpec)> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|name| !name.is_empty())
        .map(|name| (name.to_string(), FieldSpec::Literal(name.to_string())))
        .collect()
}

/// Position of the `}` closing an inline block body.
fn find_closing_brace(rest: &str) -> Option<usize> {
    scan(rest, |_, b, depth| b == b'}' && depth < 0)
}

/// Start of the `alias:` part of a list segment, if any.
fn find_alias_start(segment: &str) -> Option<usize> {
    let colon = scan(segment, |_, b, depth| b == b':' && depth == 0)?;
    let before = segment[..colon].trim_end();
    let word_start = before
        .char_indices()
        .rev()
        .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
        .map_or(0, |(i, c)| i + c.len_utf8());
    (word_start < before.len()).then_some(word_start)
}

/// Strip matching quotes and resolve escaped quotes and backslashes.
fn unquote(raw: &str) -> String {
    let mut chars = raw.chars();
    let (Some(first), Some(last)) = (chars.next(), raw.chars().last()) else {
        return raw.to_string();
    };
    if raw.len() < 2 || first != last || !(first == '"' || first == '\'') {
        return raw.to_string();
    }

    let inner = &raw[1..raw.len() - 1];
    let mut result = String::with_capacity(inner.len());
    let mut iter = inner.chars();
    while let Some(ch) = iter.next() {
        if ch == '\\' {
            match iter.next() {
                Some(next) if next == first || next == '\\' => result.push(next),
                Some(next) => {
                    result.push('\\');
                    result.push(next);
                }
                None => result.push('\\'),
            }
        } else {
            result.push(ch);
        }
    }
    result
}

/// Integer block argument; fractional values truncate, negatives are invalid.
fn parse_count(value: &str) -> Option<usize> {
    let value = value.trim();
    value.parse::<usize>().ok().or_else(|| {
        value
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && *f >= 0.0)
            .map(|f| f.trunc() as usize)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_top_level_respects_quotes() {
        assert_eq!(
            split_top_level(r#"filter: "a, b", limit: 2"#, b','),
            vec![r#"filter: "a, b""#, " limit: 2"]
        );
    }

    #[test]
    fn test_find_closing_brace() {
        assert_eq!(find_closing_brace(" name } @include(if: \"x\")"), Some(6));
        assert_eq!(find_closing_brace(" label: '}' }"), Some(12));
        assert_eq!(find_closing_brace(" @skip(if: \"x\")"), None);
    }

    #[test]
    fn test_find_alias_start() {
        assert_eq!(find_alias_start("a b full: x + y"), Some(4));
        assert_eq!(find_alias_start("a b"), None);
        assert_eq!(find_alias_start("x @skip(if: \"y\")"), None);
        assert_eq!(find_alias_start("a→b: x"), Some(4));
        assert_eq!(find_alias_start("→: x"), None);
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote(r#""a \"b\"""#), r#"a "b""#);
        assert_eq!(unquote("'x'"), "x");
        assert_eq!(unquote("plain"), "plain");
        assert_eq!(unquote("\""), "\"");
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("3"), Some(3));
        assert_eq!(parse_count("2.7"), Some(2));
        assert_eq!(parse_count("-1"), None);
        assert_eq!(parse_count("many"), None);
    }
}
