//! Effect expression evaluator for data-driven module and start-bonus values.
//!
//! Content authors write small formulas such as `"+2_per_crew"`,
//! `"6 * planet.solar"` or `"- hvac_base * planet.hvac * 0.8"`. This module
//! interprets a closed grammar over them:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := ('+' | '-') unary | primary
//! primary := number | 'hvac_base' | 'planet.' ident | '(' expr ')'
//! ```
//!
//! Evaluation never fails outward: anything that does not parse, refers to an
//! unknown name, or yields a non-finite number degrades to `0.0`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::constants::{PLANET_FIELD_MISSING, PLANET_FIELD_NEUTRAL};
use crate::data::Planet;
use crate::numbers::finite_or_zero;

const HVAC_BASE_IDENT: &str = "hvac_base";
const PLANET_PREFIX: &str = "planet.";

/// A literal number or a formula string, as authored in content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EffectValue {
    Number(f64),
    Expr(String),
}

impl From<f64> for EffectValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for EffectValue {
    fn from(value: &str) -> Self {
        Self::Expr(value.to_string())
    }
}

/// Inputs a formula may reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvalContext<'a> {
    pub crew_count: u32,
    pub planet: Option<&'a Planet>,
    pub hvac_base: f64,
}

impl EffectValue {
    /// Evaluate to a numeric delta under `ctx`.
    #[must_use]
    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> f64 {
        match self {
            Self::Number(value) => *value,
            Self::Expr(raw) => evaluate_str(raw, ctx),
        }
    }
}

fn compiled(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

fn per_crew_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&PATTERN, r"^\s*([+\-]?\d+(?:\.\d+)?)_per_crew\s*$")
}

fn numeric_prefix_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&PATTERN, r"^\s*[+\-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+\-]?\d+)?")
}

/// Evaluate a raw formula string.
///
/// Rules are tried in order: `N_per_crew`, any formula mentioning `planet.`
/// (unresolved keys become 0 and `hvac_base` is not a known name there), a
/// formula mentioning `hvac_base`, and finally the leading numeric prefix of
/// the string (`"+5_team"` is 5).
#[must_use]
pub fn evaluate_str(raw: &str, ctx: &EvalContext<'_>) -> f64 {
    if let Some(captures) = per_crew_pattern().and_then(|re| re.captures(raw)) {
        let literal = captures
            .get(1)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .unwrap_or(0.0);
        return finite_or_zero(literal * f64::from(ctx.crew_count));
    }

    if raw.contains(PLANET_PREFIX) {
        return evaluate_formula(raw, ctx, PLANET_FIELD_MISSING, false);
    }

    if raw.contains(HVAC_BASE_IDENT) {
        return evaluate_formula(raw, ctx, PLANET_FIELD_NEUTRAL, true);
    }

    numeric_prefix_pattern()
        .and_then(|re| re.find(raw))
        .and_then(|m| m.as_str().trim().parse::<f64>().ok())
        .map_or(0.0, finite_or_zero)
}

fn evaluate_formula(raw: &str, ctx: &EvalContext<'_>, planet_default: f64, allow_hvac: bool) -> f64 {
    let resolve = |ident: &str| -> Option<f64> {
        if let Some(key) = ident.strip_prefix(PLANET_PREFIX) {
            let value = ctx.planet.and_then(|planet| planet.lookup(key));
            return Some(value.unwrap_or(planet_default));
        }
        if allow_hvac && ident == HVAC_BASE_IDENT {
            return Some(ctx.hvac_base);
        }
        None
    };
    match parse_and_eval(raw, &resolve) {
        Ok(value) => finite_or_zero(value),
        Err(err) => {
            log::trace!("effect formula {raw:?} degraded to 0: {err}");
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Open,
    Close,
}

#[derive(Debug, Clone, PartialEq)]
enum FormulaError {
    UnexpectedChar(char),
    BadNumber(String),
    UnknownName(String),
    UnexpectedEnd,
    UnexpectedToken(Token),
}

impl std::fmt::Display for FormulaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnexpectedChar(c) => write!(f, "unexpected character {c:?}"),
            Self::BadNumber(text) => write!(f, "malformed number {text:?}"),
            Self::UnknownName(name) => write!(f, "unknown name {name:?}"),
            Self::UnexpectedEnd => f.write_str("unexpected end of formula"),
            Self::UnexpectedToken(token) => write!(f, "unexpected token {token:?}"),
        }
    }
}

fn tokenize(raw: &str) -> Result<Vec<Token>, FormulaError> {
    let mut tokens = Vec::new();
    let mut chars = raw.char_indices().peekable();
    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '+' | '-' | '*' | '/' | '(' | ')' => {
                chars.next();
                tokens.push(match c {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '(' => Token::Open,
                    _ => Token::Close,
                });
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut end = start;
                while let Some(&(idx, d)) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        end = idx + d.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let text = &raw[start..end];
                let value = text
                    .parse::<f64>()
                    .map_err(|_| FormulaError::BadNumber(text.to_string()))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut end = start;
                while let Some(&(idx, d)) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' || d == '.' {
                        end = idx + d.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(raw[start..end].to_string()));
            }
            other => return Err(FormulaError::UnexpectedChar(other)),
        }
    }
    Ok(tokens)
}

struct Parser<'t, F> {
    tokens: &'t [Token],
    pos: usize,
    resolve: &'t F,
}

impl<F> Parser<'_, F>
where
    F: Fn(&str) -> Option<f64>,
{
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn expr(&mut self) -> Result<f64, FormulaError> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    value += self.term()?;
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> Result<f64, FormulaError> {
        let mut value = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    value *= self.unary()?;
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    value /= self.unary()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn unary(&mut self) -> Result<f64, FormulaError> {
        match self.peek() {
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(-self.unary()?)
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<f64, FormulaError> {
        let resolve = self.resolve;
        match self.advance().cloned() {
            Some(Token::Number(value)) => Ok(value),
            Some(Token::Ident(name)) => resolve(&name).ok_or(FormulaError::UnknownName(name)),
            Some(Token::Open) => {
                let value = self.expr()?;
                match self.advance() {
                    Some(Token::Close) => Ok(value),
                    Some(other) => Err(FormulaError::UnexpectedToken(other.clone())),
                    None => Err(FormulaError::UnexpectedEnd),
                }
            }
            Some(other) => Err(FormulaError::UnexpectedToken(other)),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }
}

fn parse_and_eval<F>(raw: &str, resolve: &F) -> Result<f64, FormulaError>
where
    F: Fn(&str) -> Option<f64>,
{
    let tokens = tokenize(raw)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        resolve,
    };
    let value = parser.expr()?;
    match parser.peek() {
        None => Ok(value),
        Some(token) => Err(FormulaError::UnexpectedToken(token.clone())),
    }
}
