//! Substitution engine: apply one rule across a text.
//!
//! For every match the replace template goes through four steps, in order:
//! nested `$pattern` declarations are pulled out, captures are substituted,
//! the nested rules are applied to the result, and meta-variables are
//! resolved. Both textual passes are single left-to-right scans, so inserted
//! text is never scanned again.

use phf::{Map, phf_map};
use tracing::{debug, trace};

use crate::config::Config;
use crate::eval::{EvalScope, Evaluator};
use crate::pattern::{Captures, MatchResult, compile, find_all};
use crate::processor::Counters;
use crate::rules::{Rule, extract_nested_rules};
use crate::scanner::{extract_block, ident_len, skip_whitespace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Meta {
    Unique,
    Eval,
    Clear,
    Prefix,
    Suffix,
    Match,
    Counter,
}

/// Meta-variable names, without the sigil.
const META_VARS: Map<&'static str, Meta> = phf_map! {
    "clear" => Meta::Clear,
    "counter" => Meta::Counter,
    "eval" => Meta::Eval,
    "match" => Meta::Match,
    "prefix" => Meta::Prefix,
    "suffix" => Meta::Suffix,
    "unique" => Meta::Unique,
};

/// Everything a rule application needs from its processor.
pub(crate) struct Substitution<'a> {
    pub config: &'a Config,
    pub counters: &'a mut Counters,
    pub evaluator: &'a dyn Evaluator,
}

impl Substitution<'_> {
    /// Apply `rule` to every non-overlapping match in `text`, left to right.
    ///
    /// Returns `text` unchanged when nothing matches. If any replacement used
    /// `$clear`, the result is only the last replacement produced.
    pub fn apply(&mut self, text: &str, rule: &Rule) -> String {
        let config = self.config;
        let tokens = compile(&rule.match_template, config);
        if tokens.is_empty() {
            return text.to_string();
        }
        let (nested, template) = extract_nested_rules(&rule.replace_template, config);
        if !nested.is_empty() {
            debug!(count = nested.len(), "nested rules in replace template");
        }

        let mut out = String::with_capacity(text.len());
        let mut copied = 0;
        let mut latest = None;
        let mut clear = false;

        for m in find_all(text, &tokens, config.sigil()) {
            out.push_str(&text[copied..m.start]);
            let replacement = self.replacement(text, &m, &template, &nested, &mut clear);
            trace!(
                start = m.start,
                end = m.end,
                matched = &text[m.start..m.end],
                replacement = %replacement,
                "replace"
            );
            out.push_str(&replacement);
            copied = m.end;
            latest = Some(replacement);
        }

        let Some(latest) = latest else {
            return text.to_string();
        };
        if clear {
            return latest;
        }
        out.push_str(&text[copied..]);
        out
    }

    fn replacement(
        &mut self,
        text: &str,
        m: &MatchResult,
        template: &str,
        nested: &[Rule],
        clear: &mut bool,
    ) -> String {
        let mut replacement = substitute_captures(template, &m.captures, self.config.sigil());
        for rule in nested {
            replacement = self.apply(&replacement, rule);
        }
        self.resolve_meta(&replacement, text, m, clear)
    }

    /// Expand meta-variables in one pass over `template`.
    fn resolve_meta(
        &mut self,
        template: &str,
        text: &str,
        m: &MatchResult,
        clear: &mut bool,
    ) -> String {
        let config = self.config;
        let sigil = config.sigil();
        let mut out = String::with_capacity(template.len());
        let mut unique: Option<String> = None;
        let mut pos = 0;

        while let Some(found) = template[pos..].find(sigil) {
            out.push_str(&template[pos..pos + found]);
            pos += found;
            let after = pos + sigil.len();

            if template[after..].starts_with(sigil) {
                // `$$` joins its neighbours
                pos = after + sigil.len();
                continue;
            }
            let name_end = after + ident_len(&template[after..]);
            let Some(&meta) = META_VARS.get(&template[after..name_end]) else {
                out.push_str(sigil);
                pos = after;
                continue;
            };
            pos = name_end;

            match meta {
                Meta::Unique => {
                    out.push_str(unique.get_or_insert_with(|| self.counters.next_unique()));
                }
                Meta::Eval => {
                    let pair = config.delimiters().default_pair();
                    let open_at = skip_whitespace(template, pos);
                    if template[open_at..].starts_with(&pair.open) {
                        let block = extract_block(template, open_at, &pair.open, &pair.close);
                        out.push_str(&self.evaluate(block.inner, text, m));
                        pos = block.end;
                    } else {
                        out.push_str(&template[after - sigil.len()..name_end]);
                    }
                }
                Meta::Clear => {
                    *clear = true;
                    if let Some(ch) = template[pos..].chars().next()
                        && ch.is_whitespace()
                    {
                        pos += ch.len_utf8();
                    }
                }
                Meta::Prefix => out.push_str(&text[..m.start]),
                Meta::Suffix => out.push_str(&text[m.end..]),
                Meta::Match => out.push_str(&text[m.start..m.end]),
                Meta::Counter => {
                    let rest = &template[pos..];
                    if rest.starts_with("++") {
                        self.counters.value += 1;
                        pos += 2;
                    } else if rest.starts_with("--") {
                        self.counters.value -= 1;
                        pos += 2;
                    } else {
                        out.push_str(&self.counters.value.to_string());
                    }
                }
            }
        }
        out.push_str(&template[pos..]);
        out
    }

    fn evaluate(&self, code: &str, text: &str, m: &MatchResult) -> String {
        let scope = EvalScope {
            captures: &m.captures,
            prefix: &text[..m.start],
            suffix: &text[m.end..],
            matched: &text[m.start..m.end],
            sigil: self.config.sigil(),
        };
        self.evaluator.evaluate(code, &scope).unwrap_or_else(|err| {
            debug!(code, %err, "eval failed");
            String::new()
        })
    }
}

/// Replace each `sigil + name` whose whole identifier is a capture.
///
/// A doubled sigil is copied as is and never starts a name.
pub(crate) fn substitute_captures(template: &str, captures: &Captures, sigil: &str) -> String {
    if captures.is_empty() {
        return template.to_string();
    }
    let mut out = String::with_capacity(template.len());
    let mut pos = 0;

    while let Some(found) = template[pos..].find(sigil) {
        out.push_str(&template[pos..pos + found]);
        pos += found;
        let after = pos + sigil.len();

        if template[after..].starts_with(sigil) {
            out.push_str(&template[pos..after + sigil.len()]);
            pos = after + sigil.len();
            continue;
        }
        let name_end = after + ident_len(&template[after..]);
        match captures.get(&template[pos..name_end]) {
            Some(value) if name_end > after => {
                out.push_str(value);
                pos = name_end;
            }
            _ => {
                out.push_str(sigil);
                pos = after;
            }
        }
    }
    out.push_str(&template[pos..]);
    out
}
