//! Step condition expressions
//!
//! A small boolean grammar evaluated against the variable scope:
//!
//! ```text
//! expr    := or
//! or      := and ( "||" and )*
//! and     := unary ( "&&" unary )*
//! unary   := "!" unary | compare
//! compare := primary ( ( "==" | "!=" | "===" | "!==" | "<" | "<=" | ">" | ">=" ) primary )?
//! primary := number | string | "true" | "false" | "null" | path | "(" expr ")"
//! ```
//!
//! Paths are dotted scope keys such as `$fetch.ok` or `inputs.topic`. A bare
//! path with no exact key falls back to its `$`-prefixed form.

use crate::core::scope::VariableScope;
use crate::core::value::Value;
use std::cmp::Ordering;
use thiserror::Error;
use tracing::debug;

/// Reasons a condition could not be evaluated
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConditionError {
    #[error("unexpected character '{0}' at offset {1}")]
    UnexpectedChar(char, usize),

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("unexpected token {0}")]
    UnexpectedToken(String),

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("cannot order {0} and {1}")]
    TypeMismatch(String, String),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Not,
    And,
    Or,
    Op(CompareKind),
    LParen,
    RParen,
}

/// Parsed condition expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Path(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(Box<Expr>, CompareKind, Box<Expr>),
}

/// Comparison operator in a parsed expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareKind {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

fn is_path_start(c: char) -> bool {
    c == '$' || c == '_' || c.is_ascii_alphabetic()
}

fn is_path_char(c: char) -> bool {
    c == '$' || c == '_' || c == '.' || c == '-' || c.is_ascii_alphanumeric()
}

fn tokenize(source: &str) -> Result<Vec<Token>, ConditionError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '&' if next == Some('&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if next == Some('|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '=' | '!' if next == Some('=') => {
                let op = if c == '=' { CompareKind::Eq } else { CompareKind::Ne };
                // `===` and `!==` behave like `==` and `!=`
                i += if chars.get(i + 2) == Some(&'=') { 3 } else { 2 };
                tokens.push(Token::Op(op));
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '<' | '>' => {
                let inclusive = next == Some('=');
                let op = match (c, inclusive) {
                    ('<', false) => CompareKind::Lt,
                    ('<', true) => CompareKind::Le,
                    ('>', false) => CompareKind::Gt,
                    _ => CompareKind::Ge,
                };
                tokens.push(Token::Op(op));
                i += if inclusive { 2 } else { 1 };
            }
            '\'' | '"' => {
                let quote = c;
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(ConditionError::UnterminatedString),
                        Some('\\') => {
                            if let Some(escaped) = chars.get(i + 1) {
                                text.push(*escaped);
                            }
                            i += 2;
                        }
                        Some(ch) if *ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(ch) => {
                            text.push(*ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(text));
            }
            c if c.is_ascii_digit() || (c == '-' && next.is_some_and(|n| n.is_ascii_digit())) => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let number = literal
                    .parse::<f64>()
                    .map_err(|_| ConditionError::UnexpectedToken(literal.clone()))?;
                tokens.push(Token::Number(number));
            }
            c if is_path_start(c) => {
                let start = i;
                while i < chars.len() && is_path_char(chars[i]) {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(ConditionError::UnexpectedChar(other, i)),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn parse_or(&mut self) -> Result<Expr, ConditionError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ConditionError> {
        let mut left = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ConditionError> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_compare()
    }

    fn parse_compare(&mut self) -> Result<Expr, ConditionError> {
        let left = self.parse_primary()?;
        if let Some(Token::Op(op)) = self.peek().cloned() {
            self.pos += 1;
            let right = self.parse_primary()?;
            return Ok(Expr::Compare(Box::new(left), op, Box::new(right)));
        }
        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<Expr, ConditionError> {
        match self.advance() {
            None => Err(ConditionError::UnexpectedEnd),
            Some(Token::Number(n)) => Ok(Expr::Literal(Value::Number(n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Ident(name)) => Ok(match name.as_str() {
                "true" => Expr::Literal(Value::Bool(true)),
                "false" => Expr::Literal(Value::Bool(false)),
                "null" | "undefined" => Expr::Literal(Value::Null),
                _ => Expr::Path(name),
            }),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    Some(other) => Err(ConditionError::UnexpectedToken(format!("{:?}", other))),
                    None => Err(ConditionError::UnexpectedEnd),
                }
            }
            Some(other) => Err(ConditionError::UnexpectedToken(format!("{:?}", other))),
        }
    }
}

/// Parse a condition expression
pub fn parse(source: &str) -> Result<Expr, ConditionError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(ConditionError::UnexpectedToken(format!("{:?}", token))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::List(_) => "list",
        Value::Map(_) => "map",
    }
}

fn order(left: &Value, right: &Value) -> Result<Ordering, ConditionError> {
    let ordering = match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    };
    ordering.ok_or_else(|| {
        ConditionError::TypeMismatch(type_name(left).to_string(), type_name(right).to_string())
    })
}

impl Expr {
    /// Evaluate against the scope; logical operators short-circuit
    pub fn evaluate(&self, scope: &VariableScope) -> Result<Value, ConditionError> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Path(path) => scope
                .lookup_path(path)
                .cloned()
                .ok_or_else(|| ConditionError::UnknownVariable(path.clone())),
            Expr::Not(inner) => Ok(Value::Bool(!inner.evaluate(scope)?.is_truthy())),
            Expr::And(left, right) => {
                if !left.evaluate(scope)?.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(right.evaluate(scope)?.is_truthy()))
            }
            Expr::Or(left, right) => {
                if left.evaluate(scope)?.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(right.evaluate(scope)?.is_truthy()))
            }
            Expr::Compare(left, kind, right) => {
                let left = left.evaluate(scope)?;
                let right = right.evaluate(scope)?;
                let result = match kind {
                    CompareKind::Eq => left == right,
                    CompareKind::Ne => left != right,
                    CompareKind::Lt => order(&left, &right)? == Ordering::Less,
                    CompareKind::Le => order(&left, &right)? != Ordering::Greater,
                    CompareKind::Gt => order(&left, &right)? == Ordering::Greater,
                    CompareKind::Ge => order(&left, &right)? != Ordering::Less,
                };
                Ok(Value::Bool(result))
            }
        }
    }
}

/// Fail-closed condition evaluation
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// Evaluate `source` against the scope
    ///
    /// Any parse or evaluation error yields `false`.
    pub fn evaluate(source: &str, scope: &VariableScope) -> bool {
        match parse(source).and_then(|expr| expr.evaluate(scope)) {
            Ok(value) => value.is_truthy(),
            Err(e) => {
                debug!("Condition '{}' evaluated to false: {}", source, e);
                false
            }
        }
    }
}
