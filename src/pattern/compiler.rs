//! Compiler from match-template strings to [`MatchToken`] lists.
//!
//! Compilation never fails: sigil usage that is not recognised degrades to
//! literal text.

use crate::config::Config;
use crate::scanner::{extract_block_verbatim, ident_len, skip_whitespace};

use super::token::MatchToken;

const BLOCK_KEYWORD: &str = "block";

/// Compile a match template into tokens.
pub fn compile(template: &str, config: &Config) -> Vec<MatchToken> {
    let mut compiler = Compiler {
        src: template,
        pos: 0,
        config,
        tokens: Vec::new(),
    };
    compiler.compile_all();
    compiler.tokens
}

struct Compiler<'a> {
    src: &'a str,
    pos: usize,
    config: &'a Config,
    tokens: Vec<MatchToken>,
}

impl Compiler<'_> {
    fn compile_all(&mut self) {
        let config = self.config;
        let sigil = config.sigil();
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.pos = skip_whitespace(self.src, self.pos);
                self.tokens.push(MatchToken::RequiredWhitespace);
            } else if self.rest().starts_with(sigil) {
                self.compile_sigil();
            } else {
                self.compile_literal();
            }
        }
    }

    /// Compile the construct starting at a sigil.
    fn compile_sigil(&mut self) {
        let config = self.config;
        let sigil = config.sigil();
        let after = self.pos + sigil.len();

        if self.src[after..].starts_with(sigil) {
            self.pos = after + sigil.len();
            self.tokens.push(MatchToken::OptionalWhitespace);
            return;
        }

        if let Some(block) = self.compile_block(after) {
            self.tokens.push(block);
            return;
        }

        let name_len = ident_len(&self.src[after..]);
        if name_len == 0 {
            // A lone sigil is just text
            self.pos = after;
            self.push_literal(sigil);
            return;
        }
        let name = self.src[after..after + name_len].to_string();
        self.pos = after + name_len;
        let optional = self.eat('?');
        self.tokens.push(MatchToken::Variable { name, optional });
    }

    /// Try `block <name>[?] [{open}] [{close}]` at `after` (just past the sigil).
    ///
    /// Returns `None`, leaving the position untouched, if the text there is
    /// not a block capture.
    fn compile_block(&mut self, after: usize) -> Option<MatchToken> {
        let rest = self.src[after..].strip_prefix(BLOCK_KEYWORD)?;
        let name_start = skip_whitespace(rest, 0);
        if name_start == 0 {
            return None;
        }
        let name_len = ident_len(&rest[name_start..]);
        if name_len == 0 {
            return None;
        }
        let name = rest[name_start..name_start + name_len].to_string();
        self.pos = after + BLOCK_KEYWORD.len() + name_start + name_len;
        let optional = self.eat('?');

        let config = self.config;
        let registry = config.delimiters();
        let default = registry.default_pair();
        let open = self
            .delimiter_template()
            .unwrap_or_else(|| default.open.clone());
        let close = match self.delimiter_template() {
            Some(close) => close,
            None => registry.close_for(&open).unwrap_or(&default.close).to_string(),
        };
        Some(MatchToken::Block {
            name,
            open,
            close,
            optional,
        })
    }

    /// Parse a `{…}` delimiter sub-template, if one follows (after optional
    /// whitespace).
    ///
    /// An empty sub-template means "use the default"; one holding only
    /// whitespace uses that whitespace as the delimiter.
    fn delimiter_template(&mut self) -> Option<String> {
        let config = self.config;
        let default = config.delimiters().default_pair();
        let at = skip_whitespace(self.src, self.pos);
        if !self.src[at..].starts_with(&default.open) {
            return None;
        }
        let block = extract_block_verbatim(self.src, at, &default.open, &default.close);
        self.pos = block.end;
        let trimmed = block.inner.trim();
        if trimmed.is_empty() {
            return (!block.inner.is_empty()).then(|| block.inner.to_string());
        }
        Some(unescape_delimiter(trimmed))
    }

    fn compile_literal(&mut self) {
        let config = self.config;
        let sigil = config.sigil();
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() || self.rest().starts_with(sigil) {
                break;
            }
            self.pos += ch.len_utf8();
        }
        let src = self.src;
        self.push_literal(&src[start..self.pos]);
    }

    /// Append literal text, merging with a preceding literal.
    fn push_literal(&mut self, text: &str) {
        if let Some(MatchToken::Literal(prev)) = self.tokens.last_mut() {
            prev.push_str(text);
        } else {
            self.tokens.push(MatchToken::Literal(text.to_string()));
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn rest(&self) -> &str {
        &self.src[self.pos..]
    }
}

/// Resolve `\"`, `\'` and `\\` in a delimiter sub-template.
fn unescape_delimiter(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\'
            && let Some(&next) = chars.peek()
            && matches!(next, '"' | '\'' | '\\')
        {
            out.push(next);
            chars.next();
        } else {
            out.push(ch);
        }
    }
    out
}
