//! A text macro engine driven by rewrite rules embedded in the text itself.
//!
//! Input may declare rules as `pattern { match } { replace }`, define
//! macros as `macro name { body }` and scope both with `context { ... }`.
//! [`Processor::process`] removes the declarations, rewrites the rest of the
//! text with them and repeats until nothing changes, no declarations remain,
//! or the iteration limit is reached.
//!
//! # Example
//!
//! ```rust
//! use papagaio::{Config, Processor};
//!
//! let mut p = Processor::new();
//! let out = p.process(
//!     "pattern { fn $name $block body } { function $name() {$body} }\n\
//!      fn main { run(); }",
//! );
//! assert_eq!(out, "function main() { run(); }");
//!
//! // Declarations inside a context only apply inside it.
//! let out = p.process("context { pattern { x } { 1 } x } x");
//! assert_eq!(out, "1 x");
//!
//! // Macros take positional arguments.
//! let out = p.process("macro pair { ($1, $2) }\npair(a, b) pair x y");
//! assert_eq!(out, "(a, b) (x, y)");
//!
//! // Symbols are configurable.
//! let config = Config::default().with_sigil("@").unwrap();
//! let mut p = Processor::with_config(config);
//! assert_eq!(p.process("pattern { hi @who } { Hello @who }\nhi you"), "Hello you");
//! ```

mod capture;
pub mod config;
pub mod eval;
mod macros;
pub mod pattern;
mod processor;
pub mod rules;
pub mod scanner;
mod substitute;

pub use capture::Captured;
pub use config::{Config, ConfigError, DelimiterPair, DelimiterRegistry};
pub use eval::{DisabledEvaluator, EvalError, EvalScope, Evaluator, ExprEvaluator};
pub use pattern::{Captures, MatchResult, MatchToken};
pub use processor::Processor;
pub use rules::{Declarations, Macro, Rule};
