// Copyright (c) 2025 - Cowboy AI, Inc.
//! Shell command trees
//!
//! A [`CommandSpec`] is either a single shell fragment or a group of specs
//! joined with one operator:
//!
//! ```text
//! Join::And    a && b && c     every fragment must succeed
//! Join::Or     a || b || c     first success short-circuits
//! Join::Batch  a ; b ; c       run unconditionally, in order
//! ```
//!
//! Rendering wraps nested groups in brace groups (`{ a ; b ; }`) so the
//! shell's precedence (`;` binds looser than `&&`/`||`) always matches the
//! tree. Brace groups run in the current shell, so an `export` inside one is
//! still visible to the fragments after it. [`CommandSpec::parse`] reads the
//! rendered form back.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Operator joining the children of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Join {
    And,
    Or,
    Batch,
}

impl Join {
    pub fn operator(self) -> &'static str {
        match self {
            Join::And => "&&",
            Join::Or => "||",
            Join::Batch => ";",
        }
    }
}

/// Tree of shell fragments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandSpec {
    Fragment(String),
    Group { join: Join, parts: Vec<CommandSpec> },
}

/// Failure to read a rendered command back into a tree
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unbalanced group at byte {0}")]
    Unbalanced(usize),

    #[error("unterminated quote starting at byte {0}")]
    UnterminatedQuote(usize),

    #[error("mixed operators {0:?} and {1:?} in one group")]
    MixedOperators(&'static str, &'static str),

    #[error("empty fragment")]
    EmptyFragment,
}

impl CommandSpec {
    pub fn fragment(text: impl Into<String>) -> Self {
        CommandSpec::Fragment(text.into())
    }

    pub fn and(parts: impl IntoIterator<Item = CommandSpec>) -> Self {
        Self::group(Join::And, parts)
    }

    pub fn or(parts: impl IntoIterator<Item = CommandSpec>) -> Self {
        Self::group(Join::Or, parts)
    }

    pub fn batch(parts: impl IntoIterator<Item = CommandSpec>) -> Self {
        Self::group(Join::Batch, parts)
    }

    /// Build a group, splicing in children that use the same operator.
    ///
    /// A group with a single child collapses to that child.
    pub fn group(join: Join, parts: impl IntoIterator<Item = CommandSpec>) -> Self {
        let mut flat = Vec::new();
        for part in parts {
            match part {
                CommandSpec::Group { join: inner, parts } if inner == join => flat.extend(parts),
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            return flat.remove(0);
        }
        CommandSpec::Group { join, parts: flat }
    }

    /// Leaf fragments in order
    pub fn fragments(&self) -> Vec<&str> {
        match self {
            CommandSpec::Fragment(text) => vec![text.as_str()],
            CommandSpec::Group { parts, .. } => parts.iter().flat_map(|p| p.fragments()).collect(),
        }
    }

    /// Single shell string for this tree
    pub fn render(&self) -> String {
        match self {
            CommandSpec::Fragment(text) => text.clone(),
            CommandSpec::Group { join, parts } => parts
                .iter()
                .map(|part| match part {
                    CommandSpec::Fragment(text) => text.clone(),
                    group => format!("{{ {} ; }}", group.render()),
                })
                .collect::<Vec<_>>()
                .join(&format!(" {} ", join.operator())),
        }
    }

    /// Walk the tree the way the shell would.
    ///
    /// `run` is called for each fragment that would execute, in order, and
    /// reports whether it succeeded. Returns the overall success.
    pub fn evaluate<F>(&self, run: &mut F) -> bool
    where
        F: FnMut(&str) -> bool,
    {
        match self {
            CommandSpec::Fragment(text) => run(text),
            CommandSpec::Group { join, parts } => {
                let mut ok = true;
                for (i, part) in parts.iter().enumerate() {
                    let skip = i > 0
                        && match join {
                            Join::And => !ok,
                            Join::Or => ok,
                            Join::Batch => false,
                        };
                    if !skip {
                        ok = part.evaluate(run);
                    }
                }
                ok
            }
        }
    }

    /// Parse the rendered form produced by [`CommandSpec::render`]
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        parse_group(input, 0)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn parse_group(input: &str, offset: usize) -> Result<CommandSpec, ParseError> {
    let (pieces, join) = split_top_level(input, offset)?;
    let mut parts = Vec::with_capacity(pieces.len());
    for (start, piece) in pieces {
        let trimmed = piece.trim();
        if trimmed.is_empty() {
            return Err(ParseError::EmptyFragment);
        }
        let lead = piece.len() - piece.trim_start().len();
        match unwrap_brace_group(trimmed) {
            Some(inner) => parts.push(parse_group(inner, start + lead + 1)?),
            None => parts.push(CommandSpec::Fragment(trimmed.to_string())),
        }
    }
    Ok(match join {
        Some(join) => CommandSpec::Group { join, parts },
        None => parts.remove(0),
    })
}

/// Whether the byte at `i` opens a brace group (`{` as a word of its own)
fn opens_brace(bytes: &[u8], i: usize) -> bool {
    bytes[i] == b'{'
        && (i == 0 || bytes[i - 1].is_ascii_whitespace())
        && bytes.get(i + 1).map_or(true, u8::is_ascii_whitespace)
}

/// Whether the byte at `i` closes a brace group (`}` after a terminator)
fn closes_brace(bytes: &[u8], i: usize) -> bool {
    bytes[i] == b'}'
        && i > 0
        && (bytes[i - 1] == b';' || bytes[i - 1].is_ascii_whitespace())
        && bytes.get(i + 1).map_or(true, u8::is_ascii_whitespace)
}

/// Body of `s` when the whole string is one brace group, without the
/// trailing `;` terminator
fn unwrap_brace_group(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    if bytes.is_empty() || !opens_brace(bytes, 0) || !closes_brace(bytes, bytes.len() - 1) {
        return None;
    }
    let mut depth = 0usize;
    let mut scanner = Scanner::new(s);
    while let Some((i, _)) = scanner.next_unquoted() {
        if opens_brace(bytes, i) {
            depth += 1;
        } else if closes_brace(bytes, i) {
            depth = depth.saturating_sub(1);
            if depth == 0 && i != bytes.len() - 1 {
                return None;
            }
        }
    }
    let body = s[1..s.len() - 1].trim_end();
    Some(body.strip_suffix(';').unwrap_or(body))
}

type Pieces<'a> = Vec<(usize, &'a str)>;

/// Split on operators outside quotes, parentheses and brace groups
fn split_top_level(input: &str, offset: usize) -> Result<(Pieces<'_>, Option<Join>), ParseError> {
    let bytes = input.as_bytes();
    let mut pieces = Vec::new();
    let mut join: Option<Join> = None;
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut scanner = Scanner::new(input);

    while let Some((i, ch)) = scanner.next_unquoted() {
        let opens = ch == '(' || opens_brace(bytes, i);
        let closes = ch == ')' || closes_brace(bytes, i);
        let found = if opens {
            depth += 1;
            None
        } else if closes {
            depth = depth.checked_sub(1).ok_or(ParseError::Unbalanced(offset + i))?;
            None
        } else {
            match ch {
                '&' if depth == 0 && bytes.get(i + 1) == Some(&b'&') => Some((Join::And, 2)),
                '|' if depth == 0 && bytes.get(i + 1) == Some(&b'|') => Some((Join::Or, 2)),
                ';' if depth == 0 => Some((Join::Batch, 1)),
                _ => None,
            }
        };
        if let Some((op, width)) = found {
            match join {
                Some(existing) if existing != op => {
                    return Err(ParseError::MixedOperators(existing.operator(), op.operator()))
                }
                _ => join = Some(op),
            }
            pieces.push((offset + start, &input[start..i]));
            start = i + width;
            scanner.skip(width - 1);
        }
    }
    if let Some(open) = scanner.open_quote {
        return Err(ParseError::UnterminatedQuote(offset + open));
    }
    if depth != 0 {
        return Err(ParseError::Unbalanced(offset + input.len()));
    }
    pieces.push((offset + start, &input[start..]));
    Ok((pieces, join))
}

/// Character walker that hides quoted regions
struct Scanner<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    open_quote: Option<usize>,
}

impl<'a> Scanner<'a> {
    fn new(s: &'a str) -> Self {
        Self {
            chars: s.char_indices().peekable(),
            open_quote: None,
        }
    }

    fn skip(&mut self, n: usize) {
        for _ in 0..n {
            self.chars.next();
        }
    }

    fn next_unquoted(&mut self) -> Option<(usize, char)> {
        while let Some((i, ch)) = self.chars.next() {
            match ch {
                '\\' => {
                    self.chars.next();
                }
                '\'' | '"' => {
                    self.open_quote = Some(i);
                    let mut closed = false;
                    while let Some((_, inner)) = self.chars.next() {
                        if inner == '\\' && ch == '"' {
                            self.chars.next();
                        } else if inner == ch {
                            closed = true;
                            break;
                        }
                    }
                    if !closed {
                        return None;
                    }
                    self.open_quote = None;
                }
                _ => return Some((i, ch)),
            }
        }
        None
    }
}

/// Quote a word for a POSIX shell
pub fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@%+,".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}
