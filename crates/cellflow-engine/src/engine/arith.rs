//! Recursive-descent evaluator for fully substituted arithmetic.
//!
//! Grammar:
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := factor (('*' | '/') factor)*
//! factor := ('+' | '-') factor | number | '(' expr ')'
//! ```
//!
//! Division by zero is not an error here; it yields an infinite or NaN result
//! that the caller maps to `#NUM!`.
//!
//! Nesting of parentheses and unary signs is capped at [`MAX_NESTING`] so
//! hostile input fails with an error instead of exhausting the stack.

use thiserror::Error;

use super::parser::Token;

/// Deepest chain of `factor` productions accepted.
pub const MAX_NESTING: usize = 256;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArithError {
    #[error("Unexpected end of expression")]
    UnexpectedEnd,

    #[error("Unexpected token {0:?}")]
    UnexpectedToken(Token),

    #[error("Expression nested deeper than {0} levels")]
    TooDeep(usize),
}

/// Evaluate a token stream containing only numbers, operators and parentheses.
pub fn evaluate_tokens(tokens: &[Token]) -> Result<f64, ArithError> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    match parser.peek() {
        None => Ok(value),
        Some(tok) => Err(ArithError::UnexpectedToken(tok.clone())),
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        self.pos += 1;
        tok
    }

    fn peek_operator(&self) -> Option<char> {
        match self.peek() {
            Some(Token::Operator(op)) => Some(*op),
            _ => None,
        }
    }

    fn expr(&mut self) -> Result<f64, ArithError> {
        let mut acc = self.term()?;
        while let Some(op @ ('+' | '-')) = self.peek_operator() {
            self.pos += 1;
            let rhs = self.term()?;
            acc = if op == '+' { acc + rhs } else { acc - rhs };
        }
        Ok(acc)
    }

    fn term(&mut self) -> Result<f64, ArithError> {
        let mut acc = self.factor()?;
        while let Some(op @ ('*' | '/')) = self.peek_operator() {
            self.pos += 1;
            let rhs = self.factor()?;
            acc = if op == '*' { acc * rhs } else { acc / rhs };
        }
        Ok(acc)
    }

    fn factor(&mut self) -> Result<f64, ArithError> {
        if self.depth >= MAX_NESTING {
            return Err(ArithError::TooDeep(MAX_NESTING));
        }
        self.depth += 1;
        let result = self.factor_inner();
        self.depth -= 1;
        result
    }

    fn factor_inner(&mut self) -> Result<f64, ArithError> {
        match self.next().cloned() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::Operator('-')) => Ok(-self.factor()?),
            Some(Token::Operator('+')) => self.factor(),
            Some(Token::Operator('(')) => {
                let inner = self.expr()?;
                match self.next() {
                    Some(Token::Operator(')')) => Ok(inner),
                    Some(tok) => Err(ArithError::UnexpectedToken(tok.clone())),
                    None => Err(ArithError::UnexpectedEnd),
                }
            }
            Some(tok) => Err(ArithError::UnexpectedToken(tok)),
            None => Err(ArithError::UnexpectedEnd),
        }
    }
}
