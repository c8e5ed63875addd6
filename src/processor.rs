//! The fixpoint driver and the public entry point, [`Processor`].

use tracing::{debug, warn};

use crate::capture::Captured;
use crate::config::Config;
use crate::eval::{Evaluator, ExprEvaluator};
use crate::macros;
use crate::pattern::{compile, find_all};
use crate::rules::{extract_declarations, find_context, has_pending_declarations};
use crate::substitute::Substitution;

const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Mutable state carried across rule applications.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Counters {
    /// `$counter` value.
    pub value: i64,
    /// Next `$unique` id.
    pub unique: u64,
}

impl Counters {
    /// Take the next unique token: `u` followed by the id in base 36.
    pub fn next_unique(&mut self) -> String {
        let mut id = self.unique;
        self.unique += 1;

        let mut digits = Vec::new();
        loop {
            digits.push(BASE36_DIGITS[(id % 36) as usize] as char);
            id /= 36;
            if id == 0 {
                break;
            }
        }
        std::iter::once('u').chain(digits.into_iter().rev()).collect()
    }
}

/// Rewrites text by the `pattern`, `macro` and `context` declarations it
/// contains.
///
/// Counters live in the processor, so `$unique` ids keep increasing across
/// calls to [`process`](Self::process) on the same instance and separate
/// instances never affect each other.
///
/// ```
/// use papagaio::Processor;
///
/// let mut p = Processor::new();
/// let out = p.process("pattern { hello $name } { Hi $name! }\nhello world");
/// assert_eq!(out, "Hi world!");
/// ```
pub struct Processor {
    config: Config,
    counters: Counters,
    evaluator: Box<dyn Evaluator>,
}

impl Default for Processor {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            counters: Counters::default(),
            evaluator: Box::new(ExprEvaluator),
        }
    }

    /// Replace the evaluator used for `$eval{}` bodies.
    pub fn with_evaluator(mut self, evaluator: Box<dyn Evaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The id the next `$unique` will use.
    pub fn unique_counter(&self) -> u64 {
        self.counters.unique
    }

    /// Current `$counter` value.
    pub fn counter(&self) -> i64 {
        self.counters.value
    }

    /// Run `input` to a fixpoint.
    ///
    /// Each iteration expands `context` blocks, removes the top-level
    /// `pattern` and `macro` declarations, applies the rules in declaration
    /// order and then expands calls of the macros. The loop ends when an
    /// iteration changes nothing, when no declaration remains, or after the
    /// configured number of iterations.
    pub fn process(&mut self, input: &str) -> String {
        let max_iterations = self.config.max_iterations();
        let mut text = input.to_string();

        for iteration in 1..=max_iterations {
            let previous = text.clone();
            text = self.process_contexts(&text);

            let found = extract_declarations(&text, &self.config);
            debug!(
                iteration,
                rules = found.rules.len(),
                macros = found.macros.len(),
                "iteration"
            );
            text = found.rest;
            for rule in &found.rules {
                text = self.substitution().apply(&text, rule);
            }
            for mac in &found.macros {
                text = macros::expand(text, mac, &self.config);
            }

            if text == previous || !has_pending_declarations(&text, &self.config) {
                return text;
            }
        }

        warn!(max_iterations, "iteration limit reached; output may be incomplete");
        text
    }

    /// Find every match of a match template in `text`, without rewriting.
    pub fn capture<'a>(&'a self, text: &'a str, template: &str) -> Captured<'a> {
        let tokens = compile(template, &self.config);
        let sigil = self.config.sigil();
        let matches = if tokens.is_empty() {
            Vec::new()
        } else {
            find_all(text, &tokens, sigil).collect()
        };
        Captured::new(text, sigil, matches)
    }

    /// Expand each top-level `context { .. }` block in place.
    ///
    /// A non-empty body runs through [`process`](Self::process) on its own,
    /// so rules declared inside stay inside. The result is trimmed, and a run
    /// of newlines just before the block collapses to one.
    fn process_contexts(&mut self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut copied = 0;

        while let Some(ctx) = find_context(text, copied, &self.config) {
            out.push_str(&text[copied..ctx.start]);
            if ctx.body.trim().is_empty() {
                out.push_str(ctx.body);
            } else {
                let processed = self.process(ctx.body);
                if out.ends_with('\n') {
                    out.truncate(out.trim_end_matches('\n').len());
                    out.push('\n');
                }
                out.push_str(processed.trim());
            }
            copied = ctx.end;
        }

        out.push_str(&text[copied..]);
        out
    }

    fn substitution(&mut self) -> Substitution<'_> {
        Substitution {
            config: &self.config,
            counters: &mut self.counters,
            evaluator: self.evaluator.as_ref(),
        }
    }
}
