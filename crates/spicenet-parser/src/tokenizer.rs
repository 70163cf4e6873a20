//! Netlist tokenizer: physical lines to logical lines.

use std::iter::{Enumerate, Peekable};
use std::str::Lines;

use crate::error::{Error, Location, Result};

/// One logical line with continuations joined and comments removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine {
    /// 1-based physical line the logical line starts on.
    pub line: usize,
    pub text: String,
}

impl LogicalLine {
    pub fn new(line: usize, text: impl Into<String>) -> Self {
        Self {
            line,
            text: text.into(),
        }
    }

    pub fn location(&self) -> Location {
        Location::line(self.line)
    }
}

/// Lazy iterator over the logical lines of a netlist.
///
/// Iteration is single-pass; build a new tokenizer on the same text to
/// start over.
pub struct Tokenizer<'a> {
    lines: Peekable<Enumerate<Lines<'a>>>,
}

impl<'a> Tokenizer<'a> {
    /// Create a new tokenizer for the given input.
    pub fn new(input: &'a str) -> Self {
        Self {
            lines: input.lines().enumerate().peekable(),
        }
    }

    /// Drop blank and comment lines up to the next significant one.
    fn skip_insignificant(&mut self) {
        while self
            .lines
            .next_if(|(_, raw)| is_insignificant(raw))
            .is_some()
        {}
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Result<LogicalLine>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_insignificant();
        let (index, raw) = self.lines.next()?;
        let line = index + 1;

        let content = strip_comment(raw).trim();
        if content.starts_with('+') {
            return Some(Err(Error::malformed(
                &Location::line(line),
                "continuation line with nothing to continue",
                raw.trim(),
            )));
        }

        let mut text = content.to_string();
        loop {
            self.skip_insignificant();
            let Some((_, next)) = self.lines.next_if(|(_, raw)| is_continuation(raw)) else {
                break;
            };
            let rest = next.trim_start().strip_prefix('+').unwrap_or(next);
            let rest = strip_comment(rest).trim();
            if !rest.is_empty() {
                text.push(' ');
                text.push_str(rest);
            }
        }

        Some(Ok(LogicalLine { line, text }))
    }
}

fn is_insignificant(raw: &str) -> bool {
    let trimmed = raw.trim_start();
    trimmed.starts_with('*') || strip_comment(trimmed).trim().is_empty()
}

fn is_continuation(raw: &str) -> bool {
    raw.trim_start().starts_with('+')
}

/// Cut an inline comment: `;` anywhere, or `$` after whitespace.
fn strip_comment(line: &str) -> &str {
    let mut prev_blank = true;
    for (i, c) in line.char_indices() {
        if c == ';' || (c == '$' && prev_blank) {
            return &line[..i];
        }
        prev_blank = c.is_whitespace();
    }
    line
}

/// Tokenize the entire input.
pub fn logical_lines(input: &str) -> Result<Vec<LogicalLine>> {
    Tokenizer::new(input).collect()
}
