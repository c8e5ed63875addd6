//! Token types for compiled match templates.

/// One element of a compiled match template.
///
/// A template like `call $name $block args {(}{)}` compiles to
/// `Literal("call")`, `RequiredWhitespace`, `Variable(name)`,
/// `RequiredWhitespace`, `Block(args, "(", ")")`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchToken {
    Literal(String),
    RequiredWhitespace,
    /// `$$`: a gap that may be empty.
    OptionalWhitespace,
    Variable {
        name: String,
        optional: bool,
    },
    /// A delimiter-balanced capture; the captured text excludes the delimiters.
    Block {
        name: String,
        open: String,
        close: String,
        optional: bool,
    },
}

impl MatchToken {
    pub fn is_whitespace(&self) -> bool {
        matches!(self, Self::RequiredWhitespace | Self::OptionalWhitespace)
    }

    /// The text that ends a variable capture placed just before this token.
    pub fn stop_text(&self) -> Option<&str> {
        match self {
            Self::Literal(text) => Some(text),
            Self::Block { open, .. } => Some(open),
            _ => None,
        }
    }
}
