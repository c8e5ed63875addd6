//! Match templates: compilation to tokens and non-backtracking matching.
//!
//! The `match` half of a `pattern { match } { replace }` declaration is a
//! template, not a regular expression. It compiles to a flat list of
//! [`MatchToken`]s which the matcher walks strictly left to right.
//!
//! # Template syntax
//!
//! Shown with the default sigil `$` and delimiters `{` / `}`.
//!
//! | Token                     | Meaning                                        |
//! |---------------------------|------------------------------------------------|
//! | `text`                    | Literal text                                   |
//! | whitespace                | One or more whitespace characters              |
//! | `$$`                      | Optional whitespace                            |
//! | `$name`                   | Variable capture                               |
//! | `$name?`                  | Optional variable capture                      |
//! | `$block name`             | Balanced `{…}` capture                         |
//! | `$block name {(}{)}`      | Balanced capture with custom delimiters        |
//! | `$block name {[}`         | Opener only; closer taken from the registry    |
//! | `$block name? {(}{)}`     | Optional balanced capture                      |
//! | `$` (no name)             | Literal sigil                                  |

pub mod compiler;
pub mod matcher;
pub mod token;

pub use compiler::compile;
pub use matcher::{Captures, MatchResult, Matches, find_all, match_at};
pub use token::MatchToken;
