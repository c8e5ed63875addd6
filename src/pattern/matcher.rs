//! Matcher: walk a [`MatchToken`] list over text from a given offset.
//!
//! All positions are **byte** offsets. Tokens are processed strictly in
//! order with no backtracking: each one either advances the position or
//! fails the whole match. Ambiguous templates are the author's problem.

use std::collections::BTreeMap;

use crate::scanner::{extract_block, skip_whitespace};

use super::token::MatchToken;

/// Captured text keyed by sigil-prefixed variable name (e.g. `$name`).
pub type Captures = BTreeMap<String, String>;

/// A successful match of a token list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// Offset where the match begins.
    pub start: usize,
    /// Offset just past the match.
    pub end: usize,
    pub captures: Captures,
}

/// Match `tokens` against `text` starting exactly at `pos`.
pub fn match_at(text: &str, tokens: &[MatchToken], pos: usize, sigil: &str) -> Option<MatchResult> {
    let start = pos;
    let mut pos = pos;
    let mut captures = Captures::new();

    for (idx, token) in tokens.iter().enumerate() {
        pos = match token {
            MatchToken::Literal(literal) => {
                if !text[pos..].starts_with(literal.as_str()) {
                    return None;
                }
                pos + literal.len()
            }
            MatchToken::RequiredWhitespace => {
                let next = skip_whitespace(text, pos);
                if next == pos && !at_whitespace_boundary(text, start, pos) {
                    return None;
                }
                next
            }
            MatchToken::OptionalWhitespace => skip_whitespace(text, pos),
            MatchToken::Variable { name, optional } => {
                let from = skip_whitespace(text, pos);
                let stop = next_significant(tokens, idx).and_then(MatchToken::stop_text);
                let (value, end) = capture_variable(text, from, stop);
                if value.is_empty() && !optional {
                    return None;
                }
                captures.insert(format!("{sigil}{name}"), value.to_string());
                end
            }
            MatchToken::Block {
                name,
                open,
                close,
                optional,
            } => {
                if text[pos..].starts_with(open.as_str()) {
                    let block = extract_block(text, pos, open, close);
                    captures.insert(format!("{sigil}{name}"), block.inner.to_string());
                    block.end
                } else if *optional {
                    captures.insert(format!("{sigil}{name}"), String::new());
                    pos
                } else {
                    return None;
                }
            }
        };
    }

    Some(MatchResult {
        start,
        end: pos,
        captures,
    })
}

/// Iterate over successive non-overlapping matches, left to right.
pub fn find_all<'t>(text: &'t str, tokens: &'t [MatchToken], sigil: &'t str) -> Matches<'t> {
    Matches {
        text,
        tokens,
        sigil,
        pos: 0,
    }
}

/// Iterator returned by [`find_all`].
///
/// After an empty match the scan moves on by one character, so an empty
/// token list or a template made only of optional parts cannot stall it.
pub struct Matches<'t> {
    text: &'t str,
    tokens: &'t [MatchToken],
    sigil: &'t str,
    pos: usize,
}

impl Iterator for Matches<'_> {
    type Item = MatchResult;

    fn next(&mut self) -> Option<MatchResult> {
        while self.pos < self.text.len() {
            let step = self.text[self.pos..].chars().next().map_or(1, char::len_utf8);
            if let Some(m) = match_at(self.text, self.tokens, self.pos, self.sigil) {
                self.pos = if m.end > self.pos { m.end } else { self.pos + step };
                return Some(m);
            }
            self.pos += step;
        }
        None
    }
}

/// A required gap with no whitespace still matches at the end of the text,
/// or right after whitespace already consumed inside this match (a variable
/// capture stops *after* the whitespace that ends it).
fn at_whitespace_boundary(text: &str, start: usize, pos: usize) -> bool {
    pos == text.len()
        || (pos > start
            && text[start..pos]
                .chars()
                .next_back()
                .is_some_and(char::is_whitespace))
}

/// The next token after `idx` that is not whitespace.
fn next_significant(tokens: &[MatchToken], idx: usize) -> Option<&MatchToken> {
    tokens[idx + 1..].iter().find(|t| !t.is_whitespace())
}

/// Capture a variable starting at `from`.
///
/// With a `stop` text the capture runs until that text or a newline,
/// otherwise until the next whitespace. The value is trimmed at the end;
/// the returned position is where the scan stopped.
fn capture_variable<'a>(text: &'a str, from: usize, stop: Option<&str>) -> (&'a str, usize) {
    let rest = &text[from..];
    let len = rest
        .char_indices()
        .find(|&(i, ch)| match stop {
            Some(stop) => ch == '\n' || rest[i..].starts_with(stop),
            None => ch.is_whitespace(),
        })
        .map_or(rest.len(), |(i, _)| i);
    (rest[..len].trim_end(), from + len)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::pattern::compiler::compile;

    fn mat(template: &str, text: &str, pos: usize) -> Option<(usize, Vec<(String, String)>)> {
        let tokens = compile(template, &Config::default());
        match_at(text, &tokens, pos, "$").map(|m| (m.end, m.captures.into_iter().collect()))
    }

    fn caps(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    // --- Literals and whitespace ---

    #[test]
    fn literal_prefix() {
        assert_eq!(mat("hello", "hello world", 0), Some((5, vec![])));
        assert_eq!(mat("hello", "help", 0), None);
    }

    #[test]
    fn required_whitespace() {
        assert_eq!(mat("a b", "a   b", 0), Some((5, vec![])));
        assert_eq!(mat("a b", "ab", 0), None);
    }

    #[test]
    fn required_whitespace_at_end_of_text() {
        assert_eq!(mat("a b", "a", 0), None);
        assert_eq!(mat("greet $x?", "greet", 0), Some((5, caps(&[("$x", "")]))));
    }

    #[test]
    fn optional_whitespace() {
        assert_eq!(mat("a$$b", "ab", 0), Some((2, vec![])));
        assert_eq!(mat("a$$b", "a \n b", 0), Some((5, vec![])));
    }

    // --- Variables ---

    #[test]
    fn variable_until_whitespace() {
        assert_eq!(
            mat("hello $name", "hello world again", 0),
            Some((11, caps(&[("$name", "world")])))
        );
    }

    #[test]
    fn variable_until_literal() {
        assert_eq!(
            mat("$a + $b", "1 + 2", 0),
            Some((5, caps(&[("$a", "1"), ("$b", "2")])))
        );
        assert_eq!(
            mat("$key=$value;", "x=10;", 0),
            Some((5, caps(&[("$key", "x"), ("$value", "10")])))
        );
    }

    #[test]
    fn variable_before_literal_may_contain_spaces() {
        assert_eq!(
            mat("say $words !", "say hello big world !", 0),
            Some((21, caps(&[("$words", "hello big world")])))
        );
    }

    #[test]
    fn variable_before_literal_stops_at_newline() {
        assert_eq!(mat("say $words !", "say hello\nworld !", 0), None);
    }

    #[test]
    fn variable_skips_leading_whitespace() {
        assert_eq!(mat("x$$$v", "x   y", 0), Some((5, caps(&[("$v", "y")]))));
    }

    #[test]
    fn empty_variable_fails_unless_optional() {
        assert_eq!(mat("[$x]", "[]", 0), None);
        assert_eq!(mat("[$x?]", "[]", 0), Some((2, caps(&[("$x", "")]))));
    }

    // --- Blocks ---

    #[test]
    fn block_capture() {
        assert_eq!(
            mat("fn $name $block body", "fn main { a { b } }", 0),
            Some((19, caps(&[("$body", " a { b } "), ("$name", "main")])))
        );
    }

    #[test]
    fn block_with_custom_delimiters() {
        assert_eq!(
            mat("call $f$block args {(}{)}", "call print(1, (2))", 0),
            Some((18, caps(&[("$args", "1, (2)"), ("$f", "print")])))
        );
    }

    #[test]
    fn block_must_start_at_position() {
        assert_eq!(mat("$block b", "x{y}", 0), None);
    }

    #[test]
    fn optional_block() {
        assert_eq!(
            mat("f$block b? {(}{)};", "f;", 0),
            Some((2, caps(&[("$b", "")])))
        );
    }

    #[test]
    fn unterminated_block_runs_to_end() {
        assert_eq!(
            mat("$block b", "{ open", 0),
            Some((6, caps(&[("$b", " open")])))
        );
    }

    // --- Positions and scanning ---

    #[test]
    fn match_from_offset() {
        assert_eq!(mat("b", "abc", 1), Some((2, vec![])));
        assert_eq!(mat("b", "abc", 0), None);
    }

    #[test]
    fn find_all_left_to_right() {
        let tokens = compile("id $n", &Config::default());
        let found: Vec<(usize, usize)> = find_all("id 1, id 2 id3", &tokens, "$")
            .map(|m| (m.start, m.end))
            .collect();
        assert_eq!(found, vec![(0, 5), (6, 10)]);
    }

    #[test]
    fn find_all_advances_past_empty_matches() {
        let tokens = compile("$block b?", &Config::default());
        let found: Vec<(usize, usize)> = find_all("ab", &tokens, "$")
            .map(|m| (m.start, m.end))
            .collect();
        assert_eq!(found, vec![(0, 0), (1, 1)]);
    }

    #[test]
    fn find_all_handles_multibyte_text() {
        let tokens = compile("ç", &Config::default());
        let found: Vec<usize> = find_all("aç ç", &tokens, "$").map(|m| m.start).collect();
        assert_eq!(found, vec![1, 4]);
    }
}
