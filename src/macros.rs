//! Macro calls: `name(a, b)` or `name a b`, replaced by the macro body with
//! `$0` set to the name and `$1..` to the arguments.
//!
//! A parenthesised call splits its arguments at top-level commas. Without
//! parentheses the arguments are the blank-separated words after the name on
//! the same line, up to the first of `{ } ; ( )`. A bare name with no
//! arguments is not a call.

use tracing::warn;

use crate::config::Config;
use crate::rules::Macro;
use crate::scanner::{extract_block, is_ident_char};

/// How far past its starting length one macro may grow the text.
const MAX_GROWTH: usize = 1 << 20;

/// Characters that end a word argument list.
const WORD_STOPS: &[char] = &['{', '}', ';', '(', ')'];

/// Expand calls of `mac` in `text` until none remain.
///
/// Each pass expands the calls present before it, so a call built from an
/// argument expands on the next pass. Passes stop once the text stops
/// changing, at the iteration cap, or when the text has grown by more than
/// [`MAX_GROWTH`] bytes.
pub(crate) fn expand(mut text: String, mac: &Macro, config: &Config) -> String {
    let limit = text.len().saturating_add(MAX_GROWTH);

    for _ in 0..config.max_iterations() {
        let Some(next) = expand_calls(&text, mac, config.sigil()) else {
            return text;
        };
        if next == text {
            return text;
        }
        text = next;
        if text.len() > limit {
            warn!(name = %mac.name, len = text.len(), "macro expansion exceeded the growth limit");
            return text;
        }
    }

    let max_iterations = config.max_iterations();
    warn!(name = %mac.name, max_iterations, "macro expansion limit reached");
    text
}

/// Expand every call of `mac` in `text` once, or `None` if there is no call.
///
/// Expanded bodies are not rescanned.
pub(crate) fn expand_calls(text: &str, mac: &Macro, sigil: &str) -> Option<String> {
    let name = mac.name.as_str();
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut from = 0;
    let mut expanded = false;

    while let Some(found) = text[from..].find(name) {
        let start = from + found;
        let name_end = start + name.len();
        from = name_end;

        let before = &text[..start];
        if before.ends_with(sigil)
            || before.chars().next_back().is_some_and(is_ident_char)
            || text[name_end..].starts_with(is_ident_char)
        {
            continue;
        }
        let Some((args, end)) = call_args(text, name_end) else {
            continue;
        };
        out.push_str(&text[copied..start]);
        out.push_str(&fill_body(&mac.body, name, &args, sigil));
        copied = end;
        from = end;
        expanded = true;
    }

    if !expanded {
        return None;
    }
    out.push_str(&text[copied..]);
    Some(out)
}

/// The arguments of a call whose name ends at `pos`, and the offset just
/// past the call.
fn call_args(text: &str, pos: usize) -> Option<(Vec<&str>, usize)> {
    let paren = skip_blanks(text, pos);
    if text[paren..].starts_with('(') {
        let block = extract_block(text, paren, "(", ")");
        return Some((split_top_level(block.inner), block.end));
    }

    let mut args = Vec::new();
    let mut end = pos;
    loop {
        let word = skip_blanks(text, end);
        let len = text[word..]
            .find(|ch: char| ch.is_whitespace() || WORD_STOPS.contains(&ch))
            .unwrap_or(text.len() - word);
        if word == end || len == 0 {
            break;
        }
        args.push(&text[word..word + len]);
        end = word + len;
    }
    (!args.is_empty()).then_some((args, end))
}

/// Split at commas outside nested parentheses, trimming each piece.
fn split_top_level(inner: &str) -> Vec<&str> {
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, ch) in inner.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                args.push(inner[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    args.push(inner[start..].trim());
    args
}

/// Offset of the first character at or after `pos` that is not a space or tab.
fn skip_blanks(text: &str, pos: usize) -> usize {
    let rest = &text[pos..];
    pos + (rest.len() - rest.trim_start_matches([' ', '\t']).len())
}

/// Substitute `$0` and `$1..` in one pass. Positions past the last argument
/// become empty; `$1x` is not a position and stays as written.
fn fill_body(body: &str, name: &str, args: &[&str], sigil: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut pos = 0;

    while let Some(found) = body[pos..].find(sigil) {
        out.push_str(&body[pos..pos + found]);
        let digits = pos + found + sigil.len();
        let end = body[digits..]
            .find(|ch: char| !ch.is_ascii_digit())
            .map_or(body.len(), |i| digits + i);
        if end == digits || body[end..].starts_with(is_ident_char) {
            out.push_str(sigil);
            pos = digits;
            continue;
        }
        match body[digits..end].parse::<usize>() {
            Ok(0) => out.push_str(name),
            Ok(n) => out.push_str(args.get(n - 1).copied().unwrap_or("")),
            Err(_) => {}
        }
        pos = end;
    }
    out.push_str(&body[pos..]);
    out
}
