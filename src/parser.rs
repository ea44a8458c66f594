use rustc_hash::FxHashMap;
use tracing::debug;

use crate::ast::{
    BinaryOperator, Constant, Expression, FunctionDef, Module, Statement, UnaryOperator,
};
use crate::lexer::Lexer;
use crate::token::{Number, Token, TokenKind};

mod error;

pub use error::{ParseError, ParseResult};

/// Functions whose headers have been parsed so far, keyed by name.
///
/// A call is accepted only when its name and argument count match an entry
/// that already exists at the point the call is parsed.
#[derive(Debug, Default, Clone)]
pub struct Signatures {
    arities: FxHashMap<String, usize>,
}

impl Signatures {
    fn declare(&mut self, name: &str, arity: usize) -> bool {
        if self.arities.contains_key(name) {
            return false;
        }
        self.arities.insert(name.to_string(), arity);
        true
    }

    pub fn contains(&self, name: &str, arity: usize) -> bool {
        self.arities.get(name) == Some(&arity)
    }

    pub fn len(&self) -> usize {
        self.arities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arities.is_empty()
    }
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token<'a>,
    peeked: Option<Token<'a>>,
    signatures: Signatures,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> ParseResult<Self> {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token()?;
        Ok(Self {
            lexer,
            current,
            peeked: None,
            signatures: Signatures::default(),
        })
    }

    pub fn signatures(&self) -> &Signatures {
        &self.signatures
    }

    pub fn parse_module(&mut self) -> ParseResult<Module> {
        let mut functions = Vec::new();
        while !matches!(self.current.kind, TokenKind::Eof) {
            functions.push(self.parse_function_def()?);
        }
        debug!(functions = functions.len(), "parsed module");
        Ok(Module { functions })
    }

    fn parse_function_def(&mut self) -> ParseResult<FunctionDef> {
        self.expect(TokenKind::Def)?;
        let line = self.current.span.line;
        let name = self.expect_identifier()?;
        self.expect(TokenKind::LParen)?;

        let mut params = Vec::new();
        if matches!(self.current.kind, TokenKind::Identifier(_)) {
            params.push(self.expect_identifier()?);
            while !matches!(self.current.kind, TokenKind::RParen) {
                self.expect(TokenKind::Comma)?;
                params.push(self.expect_identifier()?);
            }
        }
        self.expect(TokenKind::RParen)?;

        if !self.signatures.declare(&name, params.len()) {
            return Err(ParseError::DuplicateFunction { name, line });
        }
        self.expect(TokenKind::Colon)?;

        let body = if matches!(self.current.kind, TokenKind::Newline) {
            self.advance()?;
            self.parse_suite()?
        } else {
            vec![self.parse_statement()?]
        };

        Ok(FunctionDef { name, params, body })
    }

    fn parse_suite(&mut self) -> ParseResult<Vec<Statement>> {
        self.expect(TokenKind::Indent)?;
        let mut body = Vec::new();
        while !matches!(self.current.kind, TokenKind::Dedent) {
            body.push(self.parse_statement()?);
        }
        self.expect(TokenKind::Dedent)?;
        Ok(body)
    }

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        let statement = match self.current.kind {
            TokenKind::Return => {
                self.advance()?;
                Statement::Return(self.parse_expression()?)
            }
            TokenKind::Identifier(_) => self.parse_assignment()?,
            _ => return Err(self.error("variable or return")),
        };
        self.expect(TokenKind::Newline)?;
        Ok(statement)
    }

    fn parse_assignment(&mut self) -> ParseResult<Statement> {
        let target = self.expect_identifier()?;
        let kind = self.current.kind;
        let augmented = match kind {
            TokenKind::Equal => None,
            TokenKind::Minus if matches!(self.peek()?.kind, TokenKind::Equal) => {
                Some(BinaryOperator::Sub)
            }
            TokenKind::Plus if matches!(self.peek()?.kind, TokenKind::Equal) => {
                Some(BinaryOperator::Add)
            }
            _ => return Err(self.error("=")),
        };

        if augmented.is_some() {
            self.advance()?;
        }
        self.expect(TokenKind::Equal)?;
        let value = self.parse_expression()?;

        let value = match augmented {
            Some(op) => Expression::BinaryOp {
                left: Box::new(Expression::Identifier(target.clone())),
                op,
                right: Box::new(value),
            },
            None => value,
        };
        Ok(Statement::Assign { target, value })
    }

    fn parse_expression(&mut self) -> ParseResult<Expression> {
        let if_true = self.parse_not()?;
        if !matches!(self.current.kind, TokenKind::If) {
            return Ok(if_true);
        }
        self.advance()?;
        let condition = self.parse_not()?;
        self.expect(TokenKind::Else)?;
        let if_false = self.parse_expression()?;
        Ok(Expression::Ternary {
            if_true: Box::new(if_true),
            if_false: Box::new(if_false),
            condition: Box::new(condition),
        })
    }

    fn parse_not(&mut self) -> ParseResult<Expression> {
        if matches!(self.current.kind, TokenKind::Not) {
            self.advance()?;
            let operand = self.parse_expression()?;
            return Ok(Expression::UnaryOp {
                op: UnaryOperator::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_plus_minus()
    }

    fn parse_plus_minus(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_mul_rem()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Sub,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_mul_rem()?;
            expr = Expression::BinaryOp {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn parse_mul_rem(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_term()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Star => BinaryOperator::Mul,
                TokenKind::Percent => BinaryOperator::Rem,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_term()?;
            expr = Expression::BinaryOp {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn parse_term(&mut self) -> ParseResult<Expression> {
        let kind = self.current.kind;
        match kind {
            TokenKind::Number(number) => {
                self.advance()?;
                Ok(Expression::Constant(match number {
                    Number::Int(value) => Constant::Int(value),
                    Number::Float(value) => Constant::Float(value),
                }))
            }
            TokenKind::Char(value) => {
                self.advance()?;
                Ok(Expression::Constant(Constant::Char(value)))
            }
            TokenKind::Identifier(name) => {
                let line = self.current.span.line;
                let name = name.to_string();
                self.advance()?;
                if matches!(self.current.kind, TokenKind::LParen) {
                    self.parse_call(name, line)
                } else {
                    Ok(Expression::Identifier(name))
                }
            }
            _ => Err(self.error("expression")),
        }
    }

    fn parse_call(&mut self, name: String, line: usize) -> ParseResult<Expression> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        if !matches!(self.current.kind, TokenKind::RParen) {
            args.push(self.parse_expression()?);
            while !matches!(self.current.kind, TokenKind::RParen) {
                self.expect(TokenKind::Comma)?;
                args.push(self.parse_expression()?);
            }
        }
        self.expect(TokenKind::RParen)?;

        if !self.signatures.contains(&name, args.len()) {
            return Err(ParseError::UnknownFunction {
                name,
                arity: args.len(),
                line,
            });
        }
        Ok(Expression::Call { name, args })
    }

    fn expect(&mut self, kind: TokenKind<'static>) -> ParseResult<()> {
        if self.current.kind.same_tag(&kind) {
            self.advance()?;
            Ok(())
        } else {
            Err(self.error(kind.tag()))
        }
    }

    fn expect_identifier(&mut self) -> ParseResult<String> {
        if let TokenKind::Identifier(name) = self.current.kind {
            self.advance()?;
            Ok(name.to_string())
        } else {
            Err(self.error("id"))
        }
    }

    fn advance(&mut self) -> ParseResult<Token<'a>> {
        let next = self.next_token()?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn next_token(&mut self) -> ParseResult<Token<'a>> {
        if let Some(token) = self.peeked.take() {
            Ok(token)
        } else {
            Ok(self.lexer.next_token()?)
        }
    }

    fn peek(&mut self) -> ParseResult<&Token<'a>> {
        let token = match self.peeked.take() {
            Some(token) => token,
            None => self.lexer.next_token()?,
        };
        Ok(self.peeked.insert(token))
    }

    fn error(&self, expected: &'static str) -> ParseError {
        ParseError::UnexpectedToken {
            expected,
            found: self.current.kind.to_string(),
            line: self.current.span.line,
        }
    }
}

pub fn parse(input: &str) -> ParseResult<Module> {
    Parser::new(input)?.parse_module()
}
