//! Character-level scanning of infrastructure source code.
//!
//! # Responsibilities
//! - Walk source text while skipping string literals and comments
//! - Bound nested `{}`/`()`/`[]` blocks by counting depth
//!
//! # Design Decisions
//! - Depth counting over the character stream, never line heuristics
//! - Template literals are opaque: braces inside `${...}` are ignored
//! - Unbalanced input yields `None`, which callers treat as "no match"

use std::iter::Peekable;
use std::ops::Range;
use std::str::CharIndices;

/// Iterator over the characters of `source` that are code, i.e. outside string
/// literals and comments. Yields absolute byte offsets.
pub struct CodeChars<'a> {
    chars: Peekable<CharIndices<'a>>,
    base: usize,
}

impl<'a> CodeChars<'a> {
    /// Start scanning at byte offset `from`. Returns an empty scanner if
    /// `from` is out of bounds or not on a char boundary.
    pub fn new(source: &'a str, from: usize) -> Self {
        let rest = source.get(from..).unwrap_or("");
        Self {
            chars: rest.char_indices().peekable(),
            base: from,
        }
    }

    fn next_is(&mut self, expected: char) -> bool {
        matches!(self.chars.peek(), Some((_, c)) if *c == expected)
    }

    fn skip_quoted(&mut self, quote: char) {
        while let Some((_, c)) = self.chars.next() {
            match c {
                '\\' => {
                    self.chars.next();
                }
                _ if c == quote => return,
                _ => {}
            }
        }
    }

    fn skip_line_comment(&mut self) {
        for (_, c) in self.chars.by_ref() {
            if c == '\n' {
                return;
            }
        }
    }

    fn skip_block_comment(&mut self) {
        while let Some((_, c)) = self.chars.next() {
            if c == '*' && self.next_is('/') {
                self.chars.next();
                return;
            }
        }
    }
}

impl Iterator for CodeChars<'_> {
    type Item = (usize, char);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((offset, c)) = self.chars.next() {
            match c {
                '"' | '\'' | '`' => self.skip_quoted(c),
                '/' if self.next_is('/') => self.skip_line_comment(),
                '/' if self.next_is('*') => {
                    self.chars.next();
                    self.skip_block_comment();
                }
                _ => return Some((self.base + offset, c)),
            }
        }
        None
    }
}

fn closing_delimiter(open: char) -> Option<char> {
    match open {
        '{' => Some('}'),
        '(' => Some(')'),
        '[' => Some(']'),
        _ => None,
    }
}

/// Byte range of the block opened at `open`, delimiters included.
///
/// `source[open..]` must start with `{`, `(` or `[`.
pub fn balanced_span(source: &str, open: usize) -> Option<Range<usize>> {
    let opener = source.get(open..)?.chars().next()?;
    let closer = closing_delimiter(opener)?;
    let mut depth = 0usize;

    for (offset, c) in CodeChars::new(source, open) {
        if c == opener {
            depth += 1;
        } else if c == closer {
            depth -= 1;
            if depth == 0 {
                return Some(open..offset + c.len_utf8());
            }
        }
    }
    None
}

/// Contents of the block opened at `open`, delimiters excluded.
pub fn balanced_block(source: &str, open: usize) -> Option<&str> {
    let span = balanced_span(source, open)?;
    source.get(span.start + 1..span.end - 1)
}
