use thiserror::Error;

use crate::lexer::LexError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Syntax error at line {line}: expected {expected}, got {found}")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
        line: usize,
    },
    #[error("Syntax error at line {line}: unknown function '{name}' taking {arity} argument(s)")]
    UnknownFunction {
        name: String,
        arity: usize,
        line: usize,
    },
    #[error("Syntax error at line {line}: duplicate function definition '{name}'")]
    DuplicateFunction { name: String, line: usize },
    #[error(transparent)]
    Lex(#[from] LexError),
}

impl ParseError {
    pub fn line(&self) -> usize {
        match self {
            ParseError::UnexpectedToken { line, .. }
            | ParseError::UnknownFunction { line, .. }
            | ParseError::DuplicateFunction { line, .. } => *line,
            ParseError::Lex(error) => error.line(),
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;
