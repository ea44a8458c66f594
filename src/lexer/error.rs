use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("Illegal character '{character}' at line {line}")]
    UnexpectedCharacter { character: char, line: usize },
    #[error("Malformed character literal at line {line}: unexpected {found}")]
    MalformedChar { found: String, line: usize },
    #[error("Invalid dedent to {width} spaces at line {line}")]
    InvalidDedent { width: usize, line: usize },
    #[error("Tabs are not supported for indentation at line {line}")]
    TabIndentation { line: usize },
    #[error("Invalid number literal '{literal}' at line {line}")]
    InvalidNumber { literal: String, line: usize },
}

impl LexError {
    pub fn line(&self) -> usize {
        match self {
            LexError::UnexpectedCharacter { line, .. }
            | LexError::MalformedChar { line, .. }
            | LexError::InvalidDedent { line, .. }
            | LexError::TabIndentation { line }
            | LexError::InvalidNumber { line, .. } => *line,
        }
    }
}

pub type LexResult<T> = Result<T, LexError>;
