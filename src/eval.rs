//! Evaluation of `$eval{ code }` bodies.
//!
//! The engine only needs "code in, text out", so evaluation sits behind the
//! [`Evaluator`] trait. [`ExprEvaluator`] is the default: a small,
//! side-effect-free expression language.
//!
//! # Expression language
//!
//! | Form                         | Meaning                                   |
//! |------------------------------|-------------------------------------------|
//! | `12`, `1.5`                  | Number                                    |
//! | `"text"`, `'text'`           | String, with `\n`, `\t`, `\\` escapes     |
//! | `true`, `false`              | Boolean                                   |
//! | `prefix`, `suffix`, `match`  | Text around / inside the current match    |
//! | `name`                       | Value of capture `$name`                  |
//! | `c ? a : b`                  | Conditional                               |
//! | `\|\|`, `&&`                 | Short-circuit logic                       |
//! | `== != < <= > >=`            | Comparison                                |
//! | `+ -`, `* / %`               | Arithmetic; `+` concatenates strings      |
//! | `-x`, `!x`, `( x )`          | Negation, not, grouping                   |
//! | `len upper lower trim`       | String builtins, one argument             |
//! | `repeat(s, n)`               | `s` repeated `n` times, at most 1 MiB     |
//! | `str(x)`, `num(x)`           | Conversions                               |
//!
//! A leading `return` and a trailing `;` are accepted and ignored.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use itertools::Itertools;
use phf::{Map, phf_map};

use crate::pattern::Captures;

/// What an `$eval{}` body can see of the current match.
#[derive(Debug, Clone, Copy)]
pub struct EvalScope<'a> {
    pub captures: &'a Captures,
    pub prefix: &'a str,
    pub suffix: &'a str,
    pub matched: &'a str,
    pub sigil: &'a str,
}

impl EvalScope<'_> {
    /// Look up a capture by its bare name (without the sigil).
    pub fn capture(&self, name: &str) -> Option<&str> {
        self.captures
            .get(&format!("{}{name}", self.sigil))
            .map(String::as_str)
    }
}

/// Errors from evaluating an `$eval{}` body.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    Disabled,
    UnexpectedChar(char),
    UnexpectedEnd,
    UnexpectedToken(String),
    UnclosedString,
    InvalidNumber(String),
    UnknownName(String),
    UnknownFunction(String),
    WrongArgCount { name: String, expected: usize },
    NotANumber(String),
    InvalidArgument(String),
    DivisionByZero,
    /// Nesting passes the parser's depth limit.
    TooDeep,
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "Evaluation is disabled"),
            Self::UnexpectedChar(c) => write!(f, "Unexpected character in expression: {c:?}"),
            Self::UnexpectedEnd => write!(f, "Unexpected end of expression"),
            Self::UnexpectedToken(t) => write!(f, "Unexpected token in expression: {t}"),
            Self::UnclosedString => write!(f, "Unclosed string literal in expression"),
            Self::InvalidNumber(n) => write!(f, "Invalid number: {n}"),
            Self::UnknownName(n) => write!(f, "Unknown name: {n}"),
            Self::UnknownFunction(n) => write!(f, "Unknown function: {n}"),
            Self::WrongArgCount { name, expected } => {
                write!(f, "{name} expects {expected} argument(s)")
            }
            Self::NotANumber(v) => write!(f, "Not a number: {v:?}"),
            Self::InvalidArgument(msg) => write!(f, "Invalid argument: {msg}"),
            Self::DivisionByZero => write!(f, "Division by zero"),
            Self::TooDeep => write!(f, "Expression nests too deeply"),
        }
    }
}

impl std::error::Error for EvalError {}

/// Turns an `$eval{}` body into replacement text.
pub trait Evaluator: Send {
    fn evaluate(&self, code: &str, scope: &EvalScope<'_>) -> Result<String, EvalError>;
}

/// The built-in expression language.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExprEvaluator;

impl Evaluator for ExprEvaluator {
    fn evaluate(&self, code: &str, scope: &EvalScope<'_>) -> Result<String, EvalError> {
        let expr = parse(code)?;
        Ok(expr.eval(scope)?.to_string())
    }
}

/// Rejects every body, so `$eval{}` always expands to nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledEvaluator;

impl Evaluator for DisabledEvaluator {
    fn evaluate(&self, _code: &str, _scope: &EvalScope<'_>) -> Result<String, EvalError> {
        Err(EvalError::Disabled)
    }
}

// --- Values ---

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Num(f64),
    Str(String),
    Bool(bool),
}

impl Value {
    fn truthy(&self) -> bool {
        match self {
            Self::Num(n) => *n != 0.0 && !n.is_nan(),
            Self::Str(s) => !s.is_empty(),
            Self::Bool(b) => *b,
        }
    }

    fn to_num(&self) -> Result<f64, EvalError> {
        match self {
            Self::Num(n) => Ok(*n),
            Self::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Self::Str(s) if s.trim().is_empty() => Ok(0.0),
            Self::Str(s) => s
                .trim()
                .parse()
                .map_err(|_| EvalError::NotANumber(s.clone())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Self::Num(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

// --- Builtins ---

/// Longest string `repeat` may build, in bytes.
const MAX_REPEAT_LEN: usize = 1 << 20;

#[derive(Debug, Clone, Copy)]
enum Builtin {
    Len,
    Upper,
    Lower,
    Trim,
    Repeat,
    Str,
    Num,
}

impl Builtin {
    fn arity(self) -> usize {
        match self {
            Self::Repeat => 2,
            _ => 1,
        }
    }

    fn call(self, args: &[Value]) -> Result<Value, EvalError> {
        let text = |i: usize| args[i].to_string();
        Ok(match self {
            Self::Len => Value::Num(text(0).chars().count() as f64),
            Self::Upper => Value::Str(text(0).to_uppercase()),
            Self::Lower => Value::Str(text(0).to_lowercase()),
            Self::Trim => Value::Str(text(0).trim().to_string()),
            Self::Repeat => {
                let s = text(0);
                let count = args[1].to_num()?;
                let invalid = || EvalError::InvalidArgument(format!("repeat count {count}"));
                if !(count.is_finite() && count >= 0.0) {
                    return Err(invalid());
                }
                // `as` saturates, so a huge count still fails the length check.
                let times = count as usize;
                let len = s
                    .len()
                    .checked_mul(times)
                    .filter(|&len| len <= MAX_REPEAT_LEN)
                    .ok_or_else(invalid)?;
                Value::Str(if len == 0 { String::new() } else { s.repeat(times) })
            }
            Self::Str => Value::Str(text(0)),
            Self::Num => Value::Num(args[0].to_num()?),
        })
    }
}

const BUILTINS: Map<&'static str, Builtin> = phf_map! {
    "len" => Builtin::Len,
    "lower" => Builtin::Lower,
    "num" => Builtin::Num,
    "repeat" => Builtin::Repeat,
    "str" => Builtin::Str,
    "trim" => Builtin::Trim,
    "upper" => Builtin::Upper,
};

// --- Lexer ---

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(f64),
    Str(String),
    Ident(String),
    Punct(&'static str),
}

impl fmt::Display for Tok {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Ident(name) => f.write_str(name),
            Self::Punct(p) => f.write_str(p),
        }
    }
}

fn tokenize(code: &str) -> Result<Vec<Tok>, EvalError> {
    let mut chars = code.chars().peekable();
    let mut toks = Vec::new();
    while let Some(&ch) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
        } else if ch.is_ascii_digit() || ch == '.' {
            let text: String = chars
                .peeking_take_while(|&c| c.is_ascii_digit() || c == '.')
                .collect();
            let num: f64 = text.parse().map_err(|_| EvalError::InvalidNumber(text))?;
            toks.push(Tok::Num(num));
        } else if ch.is_alphabetic() || ch == '_' {
            let name: String = chars
                .peeking_take_while(|&c| c.is_alphanumeric() || c == '_')
                .collect();
            toks.push(Tok::Ident(name));
        } else if ch == '"' || ch == '\'' {
            chars.next();
            toks.push(Tok::Str(lex_string(&mut chars, ch)?));
        } else {
            chars.next();
            toks.push(Tok::Punct(lex_punct(ch, &mut chars)?));
        }
    }
    Ok(toks)
}

fn lex_string(chars: &mut Peekable<Chars<'_>>, quote: char) -> Result<String, EvalError> {
    let mut out = String::new();
    loop {
        match chars.next() {
            None => return Err(EvalError::UnclosedString),
            Some(c) if c == quote => return Ok(out),
            Some('\\') => match chars.next() {
                None => return Err(EvalError::UnclosedString),
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some(c) => out.push(c),
            },
            Some(c) => out.push(c),
        }
    }
}

/// Lex an operator whose first character has already been consumed.
fn lex_punct(first: char, chars: &mut Peekable<Chars<'_>>) -> Result<&'static str, EvalError> {
    let mut eat = |expected: char| chars.next_if_eq(&expected).is_some();
    Ok(match first {
        '=' if eat('=') => {
            eat('=');
            "=="
        }
        '!' if eat('=') => {
            eat('=');
            "!="
        }
        '<' if eat('=') => "<=",
        '>' if eat('=') => ">=",
        '&' if eat('&') => "&&",
        '|' if eat('|') => "||",
        '!' => "!",
        '<' => "<",
        '>' => ">",
        '+' => "+",
        '-' => "-",
        '*' => "*",
        '/' => "/",
        '%' => "%",
        '(' => "(",
        ')' => ")",
        ',' => ",",
        '?' => "?",
        ':' => ":",
        ';' => ";",
        c => return Err(EvalError::UnexpectedChar(c)),
    })
}

// --- Parser ---

/// Deepest nesting of groups, unary operators, calls, conditionals and
/// operator chains the parser accepts.
const MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// Short-circuit operators; the right side is evaluated only when needed.
#[derive(Debug, Clone, Copy)]
enum LogicOp {
    Or,
    And,
}

#[derive(Debug, Clone)]
enum Expr {
    Lit(Value),
    Name(String),
    Call(Builtin, Vec<Expr>),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Logic(LogicOp, Box<Expr>, Box<Expr>),
    Cond(Box<Expr>, Box<Expr>, Box<Expr>),
}

fn parse(code: &str) -> Result<Expr, EvalError> {
    let mut toks = tokenize(code)?;
    if toks.last() == Some(&Tok::Punct(";")) {
        toks.pop();
    }
    let start = usize::from(toks.first() == Some(&Tok::Ident("return".to_string())));
    let mut parser = Parser {
        toks,
        pos: start,
        depth: 0,
    };
    let expr = parser.parse_cond()?;
    match parser.toks.get(parser.pos) {
        None => Ok(expr),
        Some(tok) => Err(EvalError::UnexpectedToken(tok.to_string())),
    }
}

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn parse_cond(&mut self) -> Result<Expr, EvalError> {
        let cond = self.parse_logic(LogicOp::Or)?;
        if !self.eat("?") {
            return Ok(cond);
        }
        let then = self.nested(Self::parse_cond)?;
        self.expect(":")?;
        let otherwise = self.nested(Self::parse_cond)?;
        Ok(Expr::Cond(Box::new(cond), Box::new(then), Box::new(otherwise)))
    }

    /// `||` binds looser than `&&`; both bind looser than every [`BinOp`].
    fn parse_logic(&mut self, op: LogicOp) -> Result<Expr, EvalError> {
        let (punct, operand) = match op {
            LogicOp::Or => ("||", Some(LogicOp::And)),
            LogicOp::And => ("&&", None),
        };
        let saved = self.depth;
        let mut lhs = self.parse_logic_operand(operand)?;
        while self.eat(punct) {
            self.descend()?;
            let rhs = self.parse_logic_operand(operand)?;
            lhs = Expr::Logic(op, Box::new(lhs), Box::new(rhs));
        }
        self.depth = saved;
        Ok(lhs)
    }

    fn parse_logic_operand(&mut self, op: Option<LogicOp>) -> Result<Expr, EvalError> {
        match op {
            Some(op) => self.parse_logic(op),
            None => self.parse_binary(0),
        }
    }

    /// Left-associative binary operators, loosest level first.
    fn parse_binary(&mut self, level: usize) -> Result<Expr, EvalError> {
        const LEVELS: &[&[(&str, BinOp)]] = &[
            &[
                ("==", BinOp::Eq),
                ("!=", BinOp::Ne),
                ("<=", BinOp::Le),
                (">=", BinOp::Ge),
                ("<", BinOp::Lt),
                (">", BinOp::Gt),
            ],
            &[("+", BinOp::Add), ("-", BinOp::Sub)],
            &[("*", BinOp::Mul), ("/", BinOp::Div), ("%", BinOp::Rem)],
        ];
        let Some(ops) = LEVELS.get(level) else {
            return self.parse_unary();
        };
        let saved = self.depth;
        let mut lhs = self.parse_binary(level + 1)?;
        while let Some(&(_, op)) = ops.iter().find(|(p, _)| self.peek_punct(p)) {
            self.pos += 1;
            self.descend()?;
            let rhs = self.parse_binary(level + 1)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.depth = saved;
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, EvalError> {
        if self.eat("-") {
            return Ok(Expr::Neg(Box::new(self.nested(Self::parse_unary)?)));
        }
        if self.eat("!") {
            return Ok(Expr::Not(Box::new(self.nested(Self::parse_unary)?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, EvalError> {
        let tok = self.toks.get(self.pos).cloned().ok_or(EvalError::UnexpectedEnd)?;
        self.pos += 1;
        match tok {
            Tok::Num(n) => Ok(Expr::Lit(Value::Num(n))),
            Tok::Str(s) => Ok(Expr::Lit(Value::Str(s))),
            Tok::Punct("(") => {
                let inner = self.nested(Self::parse_cond)?;
                self.expect(")")?;
                Ok(inner)
            }
            Tok::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Lit(Value::Bool(true))),
                "false" => Ok(Expr::Lit(Value::Bool(false))),
                _ if self.eat("(") => self.parse_call(name),
                _ => Ok(Expr::Name(name)),
            },
            tok => Err(EvalError::UnexpectedToken(tok.to_string())),
        }
    }

    /// Parse call arguments; the opening parenthesis is already consumed.
    fn parse_call(&mut self, name: String) -> Result<Expr, EvalError> {
        let builtin = *BUILTINS
            .get(name.as_str())
            .ok_or_else(|| EvalError::UnknownFunction(name.clone()))?;
        let mut args = Vec::new();
        if !self.eat(")") {
            loop {
                args.push(self.nested(Self::parse_cond)?);
                if self.eat(")") {
                    break;
                }
                self.expect(",")?;
            }
        }
        if args.len() != builtin.arity() {
            return Err(EvalError::WrongArgCount {
                name,
                expected: builtin.arity(),
            });
        }
        Ok(Expr::Call(builtin, args))
    }

    /// Run `parse` one level deeper.
    fn nested(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<Expr, EvalError>,
    ) -> Result<Expr, EvalError> {
        let saved = self.depth;
        self.descend()?;
        let expr = parse(self);
        self.depth = saved;
        expr
    }

    fn descend(&mut self) -> Result<(), EvalError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(EvalError::TooDeep);
        }
        Ok(())
    }

    fn peek_punct(&self, punct: &str) -> bool {
        matches!(self.toks.get(self.pos), Some(Tok::Punct(p)) if *p == punct)
    }

    fn eat(&mut self, punct: &str) -> bool {
        let found = self.peek_punct(punct);
        if found {
            self.pos += 1;
        }
        found
    }

    fn expect(&mut self, punct: &str) -> Result<(), EvalError> {
        if self.eat(punct) {
            return Ok(());
        }
        match self.toks.get(self.pos) {
            Some(tok) => Err(EvalError::UnexpectedToken(tok.to_string())),
            None => Err(EvalError::UnexpectedEnd),
        }
    }
}

// --- Evaluation ---

impl Expr {
    fn eval(&self, scope: &EvalScope<'_>) -> Result<Value, EvalError> {
        match self {
            Self::Lit(value) => Ok(value.clone()),
            Self::Name(name) => match name.as_str() {
                "prefix" => Ok(Value::Str(scope.prefix.to_string())),
                "suffix" => Ok(Value::Str(scope.suffix.to_string())),
                "match" => Ok(Value::Str(scope.matched.to_string())),
                _ => scope
                    .capture(name)
                    .map(|v| Value::Str(v.to_string()))
                    .ok_or_else(|| EvalError::UnknownName(name.clone())),
            },
            Self::Call(builtin, args) => {
                let args = args
                    .iter()
                    .map(|arg| arg.eval(scope))
                    .collect::<Result<Vec<_>, _>>()?;
                builtin.call(&args)
            }
            Self::Neg(inner) => Ok(Value::Num(-inner.eval(scope)?.to_num()?)),
            Self::Not(inner) => Ok(Value::Bool(!inner.eval(scope)?.truthy())),
            Self::Cond(cond, then, otherwise) => {
                if cond.eval(scope)?.truthy() {
                    then.eval(scope)
                } else {
                    otherwise.eval(scope)
                }
            }
            Self::Logic(op, lhs, rhs) => {
                let lhs = lhs.eval(scope)?;
                match (op, lhs.truthy()) {
                    (LogicOp::Or, true) | (LogicOp::And, false) => Ok(lhs),
                    _ => rhs.eval(scope),
                }
            }
            Self::Binary(op, lhs, rhs) => binary(*op, lhs.eval(scope)?, rhs.eval(scope)?),
        }
    }
}

fn binary(op: BinOp, lhs: Value, rhs: Value) -> Result<Value, EvalError> {
    use std::cmp::Ordering;

    let ordering = |lhs: &Value, rhs: &Value| -> Result<Option<Ordering>, EvalError> {
        match (lhs, rhs) {
            (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
            _ => Ok(lhs.to_num()?.partial_cmp(&rhs.to_num()?)),
        }
    };

    Ok(match op {
        BinOp::Add => match (&lhs, &rhs) {
            (Value::Str(_), _) | (_, Value::Str(_)) => Value::Str(format!("{lhs}{rhs}")),
            _ => Value::Num(lhs.to_num()? + rhs.to_num()?),
        },
        BinOp::Sub => Value::Num(lhs.to_num()? - rhs.to_num()?),
        BinOp::Mul => Value::Num(lhs.to_num()? * rhs.to_num()?),
        BinOp::Div | BinOp::Rem => {
            let divisor = rhs.to_num()?;
            if divisor == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            let dividend = lhs.to_num()?;
            Value::Num(if op == BinOp::Div {
                dividend / divisor
            } else {
                dividend % divisor
            })
        }
        BinOp::Eq | BinOp::Ne => {
            let equal = match (&lhs, &rhs) {
                (Value::Str(a), Value::Str(b)) => a == b,
                _ => match (lhs.to_num(), rhs.to_num()) {
                    (Ok(a), Ok(b)) => a == b,
                    _ => lhs.to_string() == rhs.to_string(),
                },
            };
            Value::Bool(equal == (op == BinOp::Eq))
        }
        BinOp::Lt => Value::Bool(ordering(&lhs, &rhs)? == Some(Ordering::Less)),
        BinOp::Le => Value::Bool(matches!(
            ordering(&lhs, &rhs)?,
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinOp::Gt => Value::Bool(ordering(&lhs, &rhs)? == Some(Ordering::Greater)),
        BinOp::Ge => Value::Bool(matches!(
            ordering(&lhs, &rhs)?,
            Some(Ordering::Greater | Ordering::Equal)
        )),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_with(code: &str, captures: &[(&str, &str)]) -> Result<String, EvalError> {
        let captures: Captures = captures
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let scope = EvalScope {
            captures: &captures,
            prefix: "before ",
            suffix: " after",
            matched: "hit",
            sigil: "$",
        };
        ExprEvaluator.evaluate(code, &scope)
    }

    fn eval(code: &str) -> String {
        eval_with(code, &[]).unwrap()
    }

    #[test]
    fn arithmetic_and_precedence() {
        assert_eq!(eval("1 + 2 * 3"), "7");
        assert_eq!(eval("(1 + 2) * 3"), "9");
        assert_eq!(eval("10 - 4 - 3"), "3");
        assert_eq!(eval("7 % 4"), "3");
        assert_eq!(eval("-2 * -3"), "6");
    }

    #[test]
    fn fractions_print_naturally() {
        assert_eq!(eval("1 / 4"), "0.25");
        assert_eq!(eval("6 / 3"), "2");
    }

    #[test]
    fn return_and_semicolon_are_ignored() {
        assert_eq!(eval("return 5 + 5;"), "10");
        assert_eq!(eval("  return 'x' "), "x");
    }

    #[test]
    fn string_concatenation_and_coercion() {
        assert_eq!(eval(r#""a" + 1"#), "a1");
        assert_eq!(eval(r#"'line\n' + "two""#), "line\ntwo");
        assert_eq!(eval(r#""4" * "2""#), "8");
        assert_eq!(eval(r#"num("4") + 1"#), "5");
    }

    #[test]
    fn comparisons_and_logic() {
        assert_eq!(eval("3 > 2 && 2 >= 2"), "true");
        assert_eq!(eval("1 == 2 || 'b' < 'a'"), "false");
        assert_eq!(eval(r#""5" == 5"#), "true");
        assert_eq!(eval("1 !== 1"), "false");
        assert_eq!(eval("!0"), "true");
        assert_eq!(eval("0 || 'fallback'"), "fallback");
    }

    #[test]
    fn conditional() {
        assert_eq!(eval("2 > 1 ? 'yes' : 'no'"), "yes");
        assert_eq!(eval("false ? 1 : true ? 2 : 3"), "2");
    }

    #[test]
    fn builtins() {
        assert_eq!(eval("len('héllo')"), "5");
        assert_eq!(eval("upper('abc') + lower('DEF')"), "ABCdef");
        assert_eq!(eval("trim('  x  ')"), "x");
        assert_eq!(eval("repeat('ab', 3)"), "ababab");
        assert_eq!(eval("str(1 + 1) + 1"), "21");
    }

    #[test]
    fn scope_names() {
        assert_eq!(eval("prefix + match + suffix"), "before hit after");
        assert_eq!(
            eval_with("upper(name) + n * 2", &[("$name", "bob"), ("$n", "21")]).unwrap(),
            "BOB42"
        );
    }

    #[test]
    fn errors() {
        assert_eq!(eval_with("1 / 0", &[]), Err(EvalError::DivisionByZero));
        assert_eq!(eval_with("5 % 0", &[]), Err(EvalError::DivisionByZero));
        assert_eq!(
            eval_with("nobody", &[]),
            Err(EvalError::UnknownName("nobody".into()))
        );
        assert_eq!(
            eval_with("shout(1)", &[]),
            Err(EvalError::UnknownFunction("shout".into()))
        );
        assert_eq!(eval_with("'open", &[]), Err(EvalError::UnclosedString));
        assert_eq!(eval_with("", &[]), Err(EvalError::UnexpectedEnd));
        assert_eq!(eval_with("1 2", &[]), Err(EvalError::UnexpectedToken("2".into())));
        assert_eq!(eval_with("a = 1", &[("$a", "x")]), Err(EvalError::UnexpectedChar('=')));
        assert_eq!(
            eval_with("repeat('x')", &[]),
            Err(EvalError::WrongArgCount {
                name: "repeat".into(),
                expected: 2
            })
        );
        assert_eq!(eval_with("'x' - 1", &[]), Err(EvalError::NotANumber("x".into())));
    }

    #[test]
    fn short_circuit_skips_the_right_side() {
        assert_eq!(eval("0 && nobody"), "0");
        assert_eq!(eval("1 || nobody"), "1");
        assert_eq!(eval("true && 'x'"), "x");
        assert_eq!(
            eval_with("1 && nobody", &[]),
            Err(EvalError::UnknownName("nobody".into()))
        );
    }

    #[test]
    fn repeat_output_is_bounded() {
        assert!(matches!(
            eval_with("repeat('ab', 10000000000000000000)", &[]),
            Err(EvalError::InvalidArgument(_))
        ));
        assert!(matches!(
            eval_with("repeat('ab', 600000)", &[]),
            Err(EvalError::InvalidArgument(_))
        ));
        assert!(matches!(
            eval_with("repeat('x', -1)", &[]),
            Err(EvalError::InvalidArgument(_))
        ));
        assert_eq!(eval("repeat('', 10000000000000000000)"), "");
        assert_eq!(eval("len(repeat('ab', 1000))"), "2000");
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let parens = format!("{}1{}", "(".repeat(3000), ")".repeat(3000));
        assert_eq!(eval_with(&parens, &[]), Err(EvalError::TooDeep));
        assert_eq!(eval_with(&format!("{}1", "-".repeat(3000)), &[]), Err(EvalError::TooDeep));
        assert_eq!(eval_with(&format!("{}1", "!".repeat(3000)), &[]), Err(EvalError::TooDeep));
        let chain = vec!["1"; 3000].join(" + ");
        assert_eq!(eval_with(&chain, &[]), Err(EvalError::TooDeep));

        let shallow = format!("{}1{}", "(".repeat(50), ")".repeat(50));
        assert_eq!(eval(&shallow), "1");
        assert_eq!(eval(&format!("{}1", "-".repeat(50))), "1");
    }

    #[test]
    fn disabled_evaluator_always_fails() {
        let captures = Captures::new();
        let scope = EvalScope {
            captures: &captures,
            prefix: "",
            suffix: "",
            matched: "",
            sigil: "$",
        };
        assert_eq!(DisabledEvaluator.evaluate("1", &scope), Err(EvalError::Disabled));
    }
}
