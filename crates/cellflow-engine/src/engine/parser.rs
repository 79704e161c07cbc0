//! Formula recognition, tokenization and structural validation.
//!
//! Everything here is pure text analysis: no cell values are read.

use thiserror::Error;

use super::cell_ref::GridBounds;
use super::deps::extract_references;

/// Leading marker that turns cell input into a formula.
pub const FORMULA_MARKER: char = '=';

/// A lexical unit of formula text.
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    /// Non-formula input, kept whole.
    Literal(String),
    Number(f64),
    /// A bare name such as `A1`.
    Identifier(String),
    /// A name immediately followed by `(`.
    Function(String),
    /// One of `+ - * / ( )`.
    Operator(char),
    /// `,` between arguments or `:` inside a range.
    Separator(char),
    /// A lexeme that cannot be part of any formula (e.g. `1.2.3`, `$`).
    Invalid(String),
}

/// Tokens plus the identifiers the formula reads.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedFormula {
    pub tokens: Vec<Token>,
    pub dependencies: Vec<String>,
}

/// Structural problems found by [`validate`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormulaError {
    #[error("Unmatched closing parenthesis")]
    UnmatchedClosing,

    #[error("Unmatched opening parenthesis")]
    UnmatchedOpening,

    #[error("Invalid cell reference: {0}")]
    InvalidReference(String),
}

pub fn is_formula(text: &str) -> bool {
    text.trim_start().starts_with(FORMULA_MARKER)
}

/// Formula text without its marker, or None for literal input.
pub fn formula_body(text: &str) -> Option<&str> {
    text.trim_start().strip_prefix(FORMULA_MARKER)
}

/// Parse cell input. Literal input becomes one opaque token with no dependencies.
pub fn parse(text: &str) -> ParsedFormula {
    match formula_body(text) {
        Some(body) => ParsedFormula {
            tokens: tokenize(body),
            dependencies: extract_references(body),
        },
        None => ParsedFormula {
            tokens: vec![Token::Literal(text.to_string())],
            dependencies: Vec::new(),
        },
    }
}

/// Split formula text (marker already stripped) into tokens.
pub fn tokenize(body: &str) -> Vec<Token> {
    let chars: Vec<char> = body.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        match ch {
            c if c.is_whitespace() => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let lexeme: String = chars[start..i].iter().collect();
                tokens.push(match lexeme.parse::<f64>() {
                    Ok(n) => Token::Number(n),
                    Err(_) => Token::Invalid(lexeme),
                });
            }
            c if c.is_ascii_alphabetic() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let name: String = chars[start..i].iter().collect::<String>().to_ascii_uppercase();
                if chars.get(i) == Some(&'(') {
                    tokens.push(Token::Function(name));
                } else {
                    tokens.push(Token::Identifier(name));
                }
            }
            '+' | '-' | '*' | '/' | '(' | ')' => {
                tokens.push(Token::Operator(ch));
                i += 1;
            }
            ',' | ':' => {
                tokens.push(Token::Separator(ch));
                i += 1;
            }
            other => {
                tokens.push(Token::Invalid(other.to_string()));
                i += 1;
            }
        }
    }

    tokens
}

/// Check parenthesis balance and that every referenced cell is inside `bounds`.
/// Literal input is always valid.
pub fn validate(text: &str, bounds: &GridBounds) -> Result<(), FormulaError> {
    let Some(body) = formula_body(text) else {
        return Ok(());
    };

    let mut depth: i64 = 0;
    for ch in body.chars() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(FormulaError::UnmatchedClosing);
                }
            }
            _ => {}
        }
    }
    if depth > 0 {
        return Err(FormulaError::UnmatchedOpening);
    }

    match extract_references(body)
        .into_iter()
        .find(|name| !bounds.is_valid_reference(name))
    {
        Some(name) => Err(FormulaError::InvalidReference(name)),
        None => Ok(()),
    }
}
