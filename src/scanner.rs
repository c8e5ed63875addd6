//! Delimiter-balanced block extraction.
//!
//! All positions are **byte** offsets into the scanned text.

/// A balanced block located by [`extract_block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block<'a> {
    /// Text between the opening delimiter and its matching close.
    pub inner: &'a str,
    /// Offset just past the closing delimiter, or `text.len()` when the block
    /// is never closed.
    pub end: usize,
}

/// Characters that open (and close) a string literal.
const QUOTES: [char; 3] = ['"', '\'', '`'];

/// Extract the block opened at `open_pos`.
///
/// `open_pos` may point at the opening delimiter or just past it. Nesting is
/// tracked with a depth counter, and delimiters inside `"`, `'` or `` ` ``
/// string literals are ignored (a backslash inside a string skips the next
/// character). When `open == close` no nesting is attempted. An unterminated
/// block runs to the end of `text`.
pub fn extract_block<'a>(text: &'a str, open_pos: usize, open: &str, close: &str) -> Block<'a> {
    scan(text, open_pos, open, close, true)
}

/// Same as [`extract_block`], but quote characters have no special meaning.
pub fn extract_block_verbatim<'a>(
    text: &'a str,
    open_pos: usize,
    open: &str,
    close: &str,
) -> Block<'a> {
    scan(text, open_pos, open, close, false)
}

fn scan<'a>(
    text: &'a str,
    open_pos: usize,
    open: &str,
    close: &str,
    quote_aware: bool,
) -> Block<'a> {
    let open_pos = open_pos.min(text.len());
    let start = if text[open_pos..].starts_with(open) {
        open_pos + open.len()
    } else {
        open_pos
    };

    if open == close {
        return match text[start..].find(close) {
            Some(offset) => Block {
                inner: &text[start..start + offset],
                end: start + offset + close.len(),
            },
            None => unterminated(text, start),
        };
    }

    let mut depth = 1usize;
    let mut quote: Option<char> = None;
    let mut i = start;
    while let Some(ch) = text[i..].chars().next() {
        if let Some(q) = quote {
            i += ch.len_utf8();
            if ch == '\\' {
                // Skip the escaped character as well
                i += text[i..].chars().next().map_or(0, char::len_utf8);
            } else if ch == q {
                quote = None;
            }
            continue;
        }

        let rest = &text[i..];
        if quote_aware && QUOTES.contains(&ch) && !open.contains(ch) && !close.contains(ch) {
            quote = Some(ch);
            i += ch.len_utf8();
        } else if rest.starts_with(open) {
            depth += 1;
            i += open.len();
        } else if rest.starts_with(close) {
            depth -= 1;
            if depth == 0 {
                return Block {
                    inner: &text[start..i],
                    end: i + close.len(),
                };
            }
            i += close.len();
        } else {
            i += ch.len_utf8();
        }
    }
    unterminated(text, start)
}

fn unterminated(text: &str, start: usize) -> Block<'_> {
    Block {
        inner: &text[start..],
        end: text.len(),
    }
}

/// True for characters that may appear in a variable or keyword name.
pub fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// Length in bytes of the identifier at the start of `s` (0 if none).
pub fn ident_len(s: &str) -> usize {
    s.find(|ch: char| !is_ident_char(ch)).unwrap_or(s.len())
}

/// Offset of the first non-whitespace character at or after `pos`.
pub fn skip_whitespace(text: &str, pos: usize) -> usize {
    let rest = &text[pos..];
    pos + (rest.len() - rest.trim_start().len())
}
