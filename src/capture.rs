//! Results of [`Processor::capture`](crate::Processor::capture): the matches
//! of one template in one text, which can be narrowed down and spliced back
//! into the text.

use crate::pattern::MatchResult;
use crate::substitute::substitute_captures;

/// Every match of a template in a text, in order.
///
/// ```
/// use papagaio::Processor;
///
/// let p = Processor::new();
/// let found = p.capture("a=1; b=2; c=3;", "$k=$v;");
/// assert_eq!(found.len(), 3);
/// // A variable skips leading whitespace, so later matches start on the space.
/// assert_eq!(found.only(-1).replace("$k:$v"), "a=1; b=2;c:3");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captured<'a> {
    text: &'a str,
    sigil: &'a str,
    matches: Vec<MatchResult>,
}

impl<'a> Captured<'a> {
    pub(crate) fn new(text: &'a str, sigil: &'a str, matches: Vec<MatchResult>) -> Self {
        Self {
            text,
            sigil,
            matches,
        }
    }

    pub fn matches(&self) -> &[MatchResult] {
        &self.matches
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// The text a match covers.
    pub fn matched(&self, m: &MatchResult) -> &'a str {
        &self.text[m.start..m.end]
    }

    /// Keep the matches `keep` accepts.
    pub fn filter(mut self, mut keep: impl FnMut(&MatchResult) -> bool) -> Self {
        self.matches.retain(|m| keep(m));
        self
    }

    /// Keep only the match at `index`; a negative index counts from the end.
    /// An index out of range keeps nothing.
    pub fn only(mut self, index: isize) -> Self {
        let len = self.matches.len();
        let index = if index < 0 {
            len.checked_sub(index.unsigned_abs())
        } else {
            Some(index.unsigned_abs())
        };
        self.matches = match index {
            Some(i) if i < len => vec![self.matches.swap_remove(i)],
            _ => Vec::new(),
        };
        self
    }

    /// The text with each kept match replaced by `template`, its captures
    /// substituted.
    pub fn replace(&self, template: &str) -> String {
        self.replace_with(|m, _| substitute_captures(template, &m.captures, self.sigil))
    }

    /// The text with each kept match replaced by what `f` returns for it and
    /// the text it covers.
    pub fn replace_with(&self, mut f: impl FnMut(&MatchResult, &str) -> String) -> String {
        let mut out = String::with_capacity(self.text.len());
        let mut copied = 0;
        for m in &self.matches {
            out.push_str(&self.text[copied..m.start]);
            out.push_str(&f(m, self.matched(m)));
            copied = m.end;
        }
        out.push_str(&self.text[copied..]);
        out
    }
}

impl IntoIterator for Captured<'_> {
    type Item = MatchResult;
    type IntoIter = std::vec::IntoIter<MatchResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.matches.into_iter()
    }
}
