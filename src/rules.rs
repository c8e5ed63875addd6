//! Declaration extraction: `pattern { .. } { .. }` rules, `macro name { .. }`
//! definitions and `context { .. }` blocks.
//!
//! Keywords are recognised only at an identifier boundary and must be
//! followed (after optional whitespace, and the name for a macro) by the
//! default opening delimiter. Declarations nested inside another
//! declaration's blocks are never seen here: the scanner steps over each
//! block whole.

use crate::config::Config;
use crate::scanner::{Block, extract_block, ident_len, is_ident_char, skip_whitespace};

/// A rewrite rule: the `pattern { match } { replace }` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub match_template: String,
    pub replace_template: String,
}

impl Rule {
    /// Both templates are stored trimmed.
    pub fn new(match_template: &str, replace_template: &str) -> Self {
        Self {
            match_template: match_template.trim().to_string(),
            replace_template: replace_template.trim().to_string(),
        }
    }
}

/// A `macro name { body }` definition, called as `name(a, b)` or `name a b`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macro {
    pub name: String,
    /// Stored trimmed. `$0` is the name, `$1..` the arguments.
    pub body: String,
}

impl Macro {
    pub fn new(name: &str, body: &str) -> Self {
        Self {
            name: name.to_string(),
            body: body.trim().to_string(),
        }
    }
}

/// The top-level declarations removed from some text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Declarations {
    pub rules: Vec<Rule>,
    pub macros: Vec<Macro>,
    /// The text with the declarations removed.
    pub rest: String,
}

/// A `context { .. }` block located in some text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextBlock<'a> {
    /// Offset of the keyword.
    pub start: usize,
    /// Offset just past the closing delimiter.
    pub end: usize,
    pub body: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Pattern,
    Macro,
    Context,
}

const ALL_KINDS: &[Kind] = &[Kind::Pattern, Kind::Macro, Kind::Context];

/// A declaration keyword followed by its opening delimiter.
#[derive(Debug)]
struct Declaration {
    kind: Kind,
    /// Offset of the keyword (or of its sigil, for nested rules).
    start: usize,
    /// Offset just past the keyword.
    keyword_end: usize,
    /// Offset of the opening delimiter.
    open: usize,
}

/// Remove every top-level `pattern` and `macro` declaration from `text`.
///
/// Rules and macros keep declaration order. A pattern declaration without a
/// replace block is left in place as plain text.
pub fn extract_declarations(text: &str, config: &Config) -> Declarations {
    extract(text, "", &[Kind::Pattern, Kind::Macro], config)
}

/// Remove every top-level `pattern { m } { r }` declaration from `text`.
///
/// Returns the rules in declaration order and the residual text.
pub fn extract_rules(text: &str, config: &Config) -> (Vec<Rule>, String) {
    let found = extract(text, "", &[Kind::Pattern], config);
    (found.rules, found.rest)
}

/// Remove every `$pattern { m } { r }` declaration from a replace template.
pub fn extract_nested_rules(template: &str, config: &Config) -> (Vec<Rule>, String) {
    let found = extract(template, config.sigil(), &[Kind::Pattern], config);
    (found.rules, found.rest)
}

fn extract(text: &str, lead: &str, kinds: &[Kind], config: &Config) -> Declarations {
    let mut found = Declarations::default();
    let mut out = text.to_string();
    let mut from = 0;

    while let Some(decl) = find_declaration(&out, from, lead, kinds, config) {
        let end = match decl.kind {
            Kind::Pattern => {
                let Some((matcher, replace)) = declaration_blocks(&out, decl.open, config) else {
                    from = extract_default(&out, decl.open, config).end;
                    continue;
                };
                found.rules.push(Rule::new(matcher.inner, replace.inner));
                replace.end
            }
            Kind::Macro => {
                let body = extract_default(&out, decl.open, config);
                let name = out[decl.keyword_end..decl.open].trim();
                found.macros.push(Macro::new(name, body.inner));
                body.end
            }
            Kind::Context => {
                from = extract_default(&out, decl.open, config).end;
                continue;
            }
        };
        let (joined, resume) = join_collapsing_newlines(&out[..decl.start], &out[end..]);
        out = joined;
        from = resume;
    }
    found.rest = out;
    found
}

/// Locate the next top-level `context { .. }` block at or after `from`.
///
/// Pattern and macro declarations are stepped over whole, so a context
/// written inside one is left for whenever its text is emitted.
pub fn find_context<'a>(text: &'a str, from: usize, config: &Config) -> Option<ContextBlock<'a>> {
    let mut from = from;
    while let Some(decl) = find_declaration(text, from, "", ALL_KINDS, config) {
        match decl.kind {
            Kind::Pattern => {
                from = match declaration_blocks(text, decl.open, config) {
                    Some((_, replace)) => replace.end,
                    None => extract_default(text, decl.open, config).end,
                };
            }
            Kind::Macro => from = extract_default(text, decl.open, config).end,
            Kind::Context => {
                let block = extract_default(text, decl.open, config);
                return Some(ContextBlock {
                    start: decl.start,
                    end: block.end,
                    body: block.inner,
                });
            }
        }
    }
    None
}

/// True if any top-level `pattern {`, `macro name {` or `context {` remains
/// in `text`.
pub fn has_pending_declarations(text: &str, config: &Config) -> bool {
    find_declaration(text, 0, "", ALL_KINDS, config).is_some()
}

/// The match and replace blocks of the declaration opened at `open`.
fn declaration_blocks<'a>(
    text: &'a str,
    open: usize,
    config: &Config,
) -> Option<(Block<'a>, Block<'a>)> {
    let matcher = extract_default(text, open, config);
    let next = skip_whitespace(text, matcher.end);
    if !text[next..].starts_with(&config.delimiters().default_pair().open) {
        return None;
    }
    Some((matcher, extract_default(text, next, config)))
}

fn extract_default<'a>(text: &'a str, open: usize, config: &Config) -> Block<'a> {
    let pair = config.delimiters().default_pair();
    extract_block(text, open, &pair.open, &pair.close)
}

/// Find the first declaration keyword of one of `kinds` at or after `from`.
///
/// With an empty `lead` the keyword must not follow an identifier character
/// or the sigil; otherwise it must be directly preceded by `lead`.
fn find_declaration(
    text: &str,
    from: usize,
    lead: &str,
    kinds: &[Kind],
    config: &Config,
) -> Option<Declaration> {
    let open = &config.delimiters().default_pair().open;
    let sigil = config.sigil();

    for (i, _) in text[from..].char_indices() {
        let start = from + i;
        let Some(rest) = text[start..].strip_prefix(lead) else {
            continue;
        };
        if lead.is_empty() {
            let before = &text[..start];
            if before.ends_with(sigil) || before.chars().next_back().is_some_and(is_ident_char) {
                continue;
            }
        }
        for &kind in kinds {
            let keyword = match kind {
                Kind::Pattern => config.pattern_keyword(),
                Kind::Macro => config.macro_keyword(),
                Kind::Context => config.context_keyword(),
            };
            let Some(after) = rest.strip_prefix(keyword) else {
                continue;
            };
            let Some(gap) = header_len(kind, after) else {
                continue;
            };
            if after[gap..].starts_with(open.as_str()) {
                let keyword_end = text.len() - after.len();
                return Some(Declaration {
                    kind,
                    start,
                    keyword_end,
                    open: keyword_end + gap,
                });
            }
        }
    }
    None
}

/// Length of what sits between a keyword and its opening delimiter: only
/// whitespace, or for a macro, whitespace then the name.
fn header_len(kind: Kind, after: &str) -> Option<usize> {
    let gap = skip_whitespace(after, 0);
    if kind != Kind::Macro {
        return Some(gap);
    }
    let name = ident_len(&after[gap..]);
    if gap == 0 || name == 0 || after[gap..].starts_with(|ch: char| ch.is_ascii_digit()) {
        return None;
    }
    Some(skip_whitespace(after, gap + name))
}

/// Join the text around a removed declaration.
///
/// Newline runs at the seam collapse to a single newline, and leading
/// newlines are dropped when nothing precedes the seam. Returns the joined
/// text and the offset of the seam.
fn join_collapsing_newlines(left: &str, right: &str) -> (String, usize) {
    let left_trimmed = left.trim_end_matches('\n');
    let left_newline = left_trimmed.len() < left.len();
    let right_trimmed = right.trim_start_matches('\n');
    let right_newline = right_trimmed.len() < right.len();

    let mut joined = String::with_capacity(left.len() + right.len());
    joined.push_str(left_trimmed);
    if left_newline {
        joined.push('\n');
    }
    let seam = joined.len();
    if right_newline && !left_newline && !left.is_empty() {
        joined.push('\n');
    }
    joined.push_str(right_trimmed);
    (joined, seam)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(text: &str) -> (Vec<(String, String)>, String) {
        let (rules, rest) = extract_rules(text, &Config::default());
        (
            rules
                .into_iter()
                .map(|r| (r.match_template, r.replace_template))
                .collect(),
            rest,
        )
    }

    fn rule(m: &str, r: &str) -> (String, String) {
        (m.to_string(), r.to_string())
    }

    #[test]
    fn extracts_single_rule() {
        assert_eq!(
            rules("pattern { hello $name } { Hi $name! }\nhello world"),
            (vec![rule("hello $name", "Hi $name!")], "hello world".to_string())
        );
    }

    #[test]
    fn preserves_declaration_order() {
        let (found, rest) = rules("pattern {a}{1} x pattern{b} {2}");
        assert_eq!(found, vec![rule("a", "1"), rule("b", "2")]);
        assert_eq!(rest, " x ");
    }

    #[test]
    fn newline_runs_collapse() {
        let (_, rest) = rules("one\n\npattern {a}{b}\n\n\ntwo");
        assert_eq!(rest, "one\ntwo");
    }

    #[test]
    fn newline_after_text_is_kept() {
        let (_, rest) = rules("one pattern {a}{b}\ntwo");
        assert_eq!(rest, "one \ntwo");
    }

    #[test]
    fn missing_replace_block_is_plain_text() {
        let (found, rest) = rules("pattern {a} b pattern {c}{d}");
        assert_eq!(found, vec![rule("c", "d")]);
        assert_eq!(rest, "pattern {a} b ");
    }

    #[test]
    fn nested_declaration_stays_in_template() {
        let (found, rest) = rules("pattern { def $x } { pattern { $x } { done } }\nz");
        assert_eq!(found, vec![rule("def $x", "pattern { $x } { done }")]);
        assert_eq!(rest, "z");
    }

    #[test]
    fn keyword_needs_identifier_boundary() {
        let (found, _) = rules("mypattern {a}{b} patterns {c}{d}");
        assert!(found.is_empty());
    }

    #[test]
    fn sigil_prefixed_keyword_is_not_top_level() {
        let (found, rest) = rules("$pattern {a}{b}");
        assert!(found.is_empty());
        assert_eq!(rest, "$pattern {a}{b}");
    }

    #[test]
    fn quoted_braces_inside_templates() {
        let (found, _) = rules(r#"pattern { say "}" } { said }"#);
        assert_eq!(found, vec![rule(r#"say "}""#, "said")]);
    }

    #[test]
    fn unterminated_declaration_runs_to_end() {
        let (found, rest) = rules("x pattern {a} {b");
        assert_eq!(found, vec![rule("a", "b")]);
        assert_eq!(rest, "x ");
    }

    #[test]
    fn nested_rules_in_template() {
        let config = Config::default();
        let (found, rest) = extract_nested_rules("A $pattern {x} {y} B", &config);
        assert_eq!(found, vec![Rule::new("x", "y")]);
        assert_eq!(rest, "A  B");
    }

    #[test]
    fn custom_keyword_and_delimiters() {
        let config = Config::default()
            .with_pattern_keyword("rule")
            .unwrap()
            .with_delimiters("[", "]")
            .unwrap();
        let (found, rest) = extract_rules("rule [a] [b] pattern {c}{d}", &config);
        assert_eq!(found, vec![Rule::new("a", "b")]);
        assert_eq!(rest, " pattern {c}{d}");
    }

    #[test]
    fn context_lookup_skips_rule_templates() {
        let config = Config::default();
        let text = "pattern {a} { context { b } } context { c } tail";
        let ctx = find_context(text, 0, &config).unwrap();
        assert_eq!(ctx.body, " c ");
        assert_eq!(&text[ctx.start..ctx.end], "context { c }");
        assert!(find_context(text, ctx.end, &config).is_none());
    }

    #[test]
    fn pending_declarations() {
        let config = Config::default();
        assert!(has_pending_declarations("x pattern {", &config));
        assert!(has_pending_declarations("context\n{", &config));
        assert!(has_pending_declarations("macro m {", &config));
        assert!(!has_pending_declarations("pattern x context", &config));
        assert!(!has_pending_declarations("$pattern {a}{b}", &config));
        assert!(!has_pending_declarations("macro {", &config));
    }

    #[test]
    fn extracts_macros_with_rules() {
        let config = Config::default();
        let found = extract_declarations("macro sq { $1 * $1 }\npattern {a}{b}\nsq(3) a", &config);
        assert_eq!(found.macros, vec![Macro::new("sq", "$1 * $1")]);
        assert_eq!(found.rules, vec![Rule::new("a", "b")]);
        assert_eq!(found.rest, "sq(3) a");
    }

    #[test]
    fn macro_needs_a_name() {
        let config = Config::default();
        for text in ["macro { x }", "macro 9x { x }", "macrom { x }"] {
            let found = extract_declarations(text, &config);
            assert!(found.macros.is_empty(), "{text}");
            assert_eq!(found.rest, text);
        }
    }

    #[test]
    fn declarations_inside_each_other_stay_put() {
        let config = Config::default();
        let found = extract_declarations("macro m { pattern {a}{b} }", &config);
        assert!(found.rules.is_empty());
        assert_eq!(found.macros, vec![Macro::new("m", "pattern {a}{b}")]);

        let found = extract_declarations("pattern {x} { macro m { y } }", &config);
        assert!(found.macros.is_empty());
        assert_eq!(found.rules, vec![Rule::new("x", "macro m { y }")]);
    }

    #[test]
    fn extract_rules_leaves_macros() {
        let (found, rest) = rules("macro m { 1 } pattern {a}{b}");
        assert_eq!(found, vec![rule("a", "b")]);
        assert_eq!(rest, "macro m { 1 } ");
    }

    #[test]
    fn context_lookup_skips_macro_bodies() {
        let config = Config::default();
        let text = "macro m { context { a } } context { b }";
        let ctx = find_context(text, 0, &config).unwrap();
        assert_eq!(ctx.body, " b ");
    }
}
