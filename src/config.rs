//! Processor configuration: sigil, delimiter pairs and declaration keywords.

use std::fmt;

use crate::scanner::is_ident_char;

/// Default cap on fixpoint iterations for one `process` call.
pub const DEFAULT_MAX_ITERATIONS: usize = 512;

/// An `(open, close)` delimiter pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimiterPair {
    pub open: String,
    pub close: String,
}

impl DelimiterPair {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
        }
    }
}

/// Ordered set of delimiter pairs, unique by opening string.
///
/// The first pair is the default: it brackets declarations, `$eval` bodies
/// and the delimiter sub-templates of `$block` captures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimiterRegistry {
    pairs: Vec<DelimiterPair>,
}

impl Default for DelimiterRegistry {
    fn default() -> Self {
        Self {
            pairs: vec![
                DelimiterPair::new("{", "}"),
                DelimiterPair::new("(", ")"),
                DelimiterPair::new("[", "]"),
            ],
        }
    }
}

impl DelimiterRegistry {
    /// A registry holding only `default`.
    pub fn new(default: DelimiterPair) -> Result<Self, ConfigError> {
        validate_pair(&default)?;
        Ok(Self {
            pairs: vec![default],
        })
    }

    pub fn default_pair(&self) -> &DelimiterPair {
        &self.pairs[0]
    }

    pub fn pairs(&self) -> &[DelimiterPair] {
        &self.pairs
    }

    /// Add a pair; its opening string must not already be registered.
    pub fn register(&mut self, pair: DelimiterPair) -> Result<(), ConfigError> {
        validate_pair(&pair)?;
        if self.close_for(&pair.open).is_some() {
            return Err(ConfigError::DuplicateOpen(pair.open));
        }
        self.pairs.push(pair);
        Ok(())
    }

    /// Replace the default pair. Any other pair sharing its opening string
    /// is dropped.
    fn set_default(&mut self, pair: DelimiterPair) -> Result<(), ConfigError> {
        validate_pair(&pair)?;
        self.pairs.retain(|p| p.open != pair.open);
        self.pairs.insert(0, pair);
        Ok(())
    }

    /// The closing string registered for `open`.
    pub fn close_for(&self, open: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|p| p.open == open)
            .map(|p| p.close.as_str())
    }
}

fn validate_pair(pair: &DelimiterPair) -> Result<(), ConfigError> {
    if pair.open.is_empty() || pair.close.is_empty() {
        return Err(ConfigError::EmptyDelimiter);
    }
    Ok(())
}

/// Errors reported while building a [`Config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    EmptySigil,
    /// The sigil contains identifier or whitespace characters.
    InvalidSigil(String),
    EmptyDelimiter,
    DuplicateOpen(String),
    /// A keyword must be a non-empty identifier.
    InvalidKeyword(String),
    ZeroIterations,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptySigil => write!(f, "Sigil must not be empty"),
            Self::InvalidSigil(s) => {
                write!(f, "Sigil {s:?} must not contain identifier or whitespace characters")
            }
            Self::EmptyDelimiter => write!(f, "Delimiters must not be empty"),
            Self::DuplicateOpen(open) => {
                write!(f, "Opening delimiter {open:?} is already registered")
            }
            Self::InvalidKeyword(k) => write!(f, "Keyword {k:?} is not a valid identifier"),
            Self::ZeroIterations => write!(f, "Iteration cap must be at least 1"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Settings shared by every stage of a [`crate::Processor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    sigil: String,
    delimiters: DelimiterRegistry,
    pattern_keyword: String,
    context_keyword: String,
    macro_keyword: String,
    max_iterations: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sigil: "$".to_string(),
            delimiters: DelimiterRegistry::default(),
            pattern_keyword: "pattern".to_string(),
            context_keyword: "context".to_string(),
            macro_keyword: "macro".to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl Config {
    pub fn sigil(&self) -> &str {
        &self.sigil
    }

    pub fn delimiters(&self) -> &DelimiterRegistry {
        &self.delimiters
    }

    pub fn pattern_keyword(&self) -> &str {
        &self.pattern_keyword
    }

    pub fn context_keyword(&self) -> &str {
        &self.context_keyword
    }

    pub fn macro_keyword(&self) -> &str {
        &self.macro_keyword
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn with_sigil(mut self, sigil: &str) -> Result<Self, ConfigError> {
        if sigil.is_empty() {
            return Err(ConfigError::EmptySigil);
        }
        if sigil.chars().any(|ch| is_ident_char(ch) || ch.is_whitespace()) {
            return Err(ConfigError::InvalidSigil(sigil.to_string()));
        }
        self.sigil = sigil.to_string();
        Ok(self)
    }

    /// Use `open`/`close` as the default delimiter pair.
    pub fn with_delimiters(mut self, open: &str, close: &str) -> Result<Self, ConfigError> {
        self.delimiters.set_default(DelimiterPair::new(open, close))?;
        Ok(self)
    }

    /// Register an extra pair for `$block` captures that name only an opener.
    pub fn register_delimiter(mut self, open: &str, close: &str) -> Result<Self, ConfigError> {
        self.delimiters.register(DelimiterPair::new(open, close))?;
        Ok(self)
    }

    pub fn with_pattern_keyword(mut self, keyword: &str) -> Result<Self, ConfigError> {
        self.pattern_keyword = validate_keyword(keyword)?;
        Ok(self)
    }

    pub fn with_context_keyword(mut self, keyword: &str) -> Result<Self, ConfigError> {
        self.context_keyword = validate_keyword(keyword)?;
        Ok(self)
    }

    pub fn with_macro_keyword(mut self, keyword: &str) -> Result<Self, ConfigError> {
        self.macro_keyword = validate_keyword(keyword)?;
        Ok(self)
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Result<Self, ConfigError> {
        if max_iterations == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        self.max_iterations = max_iterations;
        Ok(self)
    }
}

fn validate_keyword(keyword: &str) -> Result<String, ConfigError> {
    if keyword.is_empty() || !keyword.chars().all(is_ident_char) {
        return Err(ConfigError::InvalidKeyword(keyword.to_string()));
    }
    Ok(keyword.to_string())
}
