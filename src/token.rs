use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

/// Numeric literal as written in the source.
///
/// Fractions are kept until code generation truncates them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(value) => write!(f, "{value}"),
            Number::Float(value) => write!(f, "{value:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenKind<'a> {
    Number(Number),
    Char(char),
    Identifier(&'a str),

    // Keywords
    Def,
    Not,
    Return,
    If,
    Else,

    // Operators
    Minus,   // -
    Plus,    // +
    Star,    // *
    Percent, // %
    Equal,   // =

    // Delimiters
    LParen, // (
    RParen, // )
    Colon,  // :
    Comma,  // ,

    // Structural
    Newline,
    Indent,
    Dedent,
    Eof,
}

impl TokenKind<'_> {
    /// Category name used in diagnostics and token dumps.
    pub fn tag(&self) -> &'static str {
        match self {
            TokenKind::Number(_) => "num",
            TokenKind::Char(_) => "char",
            TokenKind::Identifier(_) => "id",
            TokenKind::Def => "def",
            TokenKind::Not => "not",
            TokenKind::Return => "return",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::Minus => "-",
            TokenKind::Plus => "+",
            TokenKind::Star => "*",
            TokenKind::Percent => "%",
            TokenKind::Equal => "=",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::Colon => ":",
            TokenKind::Comma => ",",
            TokenKind::Newline => "newline",
            TokenKind::Indent => "indent",
            TokenKind::Dedent => "dedent",
            TokenKind::Eof => "eof",
        }
    }

    pub fn same_tag(&self, other: &TokenKind<'_>) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl fmt::Display for TokenKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Number(value) => write!(f, "<num, {value}>"),
            TokenKind::Char(value) => write!(f, "<char, {value:?}>"),
            TokenKind::Identifier(name) => write!(f, "<id, {name}>"),
            other => write!(f, "<{}>", other.tag()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub span: Span,
}

impl<'a> Token<'a> {
    pub fn new(kind: TokenKind<'a>, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn kind(&self) -> &TokenKind<'a> {
        &self.kind
    }

    pub fn span(&self) -> Span {
        self.span
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}
