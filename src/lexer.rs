use std::collections::VecDeque;
use std::{iter::Peekable, str::CharIndices};

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::token::{Number, Span, Token, TokenKind};

mod error;

pub use error::{LexError, LexResult};

const RESERVED: [(&str, TokenKind<'static>); 5] = [
    ("def", TokenKind::Def),
    ("not", TokenKind::Not),
    ("return", TokenKind::Return),
    ("if", TokenKind::If),
    ("else", TokenKind::Else),
];

/// Indentation-aware tokenizer.
///
/// Tokens are produced on demand. Leading spaces of each logical line are
/// measured against `indent_stack` to synthesize `Indent`/`Dedent`, and a
/// multi-level dedent is queued in `pending_tokens` and handed out one
/// token per call.
pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    indent_stack: Vec<usize>,
    pending_tokens: VecDeque<Token<'a>>,
    words: FxHashMap<&'a str, TokenKind<'a>>,
    at_line_start: bool,
    line_has_content: bool,
    eof_reached: bool,
    finished: bool,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        let mut words = FxHashMap::default();
        for (lexeme, kind) in RESERVED {
            words.insert(lexeme, kind);
        }
        Self {
            input,
            chars: input.char_indices().peekable(),
            indent_stack: vec![0],
            pending_tokens: VecDeque::new(),
            words,
            at_line_start: true,
            line_has_content: false,
            eof_reached: false,
            finished: false,
            line: 1,
            column: 0,
        }
    }

    pub fn next_token(&mut self) -> LexResult<Token<'a>> {
        if let Some(token) = self.pending_tokens.pop_front() {
            return Ok(token);
        }

        if self.eof_reached {
            return Ok(Token::new(TokenKind::Eof, self.empty_span()));
        }

        if self.at_line_start {
            self.at_line_start = false;
            if let Some(indent_level) = self.count_indentation()? {
                if let Some(token) = self.dent(indent_level)? {
                    return Ok(token);
                }
            }
        }

        self.skip_whitespace();

        let (start_idx, ch) = match self.chars.peek() {
            Some(&(idx, c)) => (idx, c),
            None => return Ok(self.end_of_input()),
        };

        let start_line = self.line;
        let start_column = self.column;
        let single = |kind| {
            Token::new(
                kind,
                Span {
                    start: start_idx,
                    end: start_idx + ch.len_utf8(),
                    line: start_line,
                    column: start_column,
                },
            )
        };

        let token = match ch {
            '\n' => {
                self.advance_char();
                self.at_line_start = true;
                self.line_has_content = false;
                return Ok(single(TokenKind::Newline));
            }
            '-' => self.advance_with(single(TokenKind::Minus)),
            '+' => self.advance_with(single(TokenKind::Plus)),
            '*' => self.advance_with(single(TokenKind::Star)),
            '%' => self.advance_with(single(TokenKind::Percent)),
            '=' => self.advance_with(single(TokenKind::Equal)),
            '(' => self.advance_with(single(TokenKind::LParen)),
            ')' => self.advance_with(single(TokenKind::RParen)),
            ':' => self.advance_with(single(TokenKind::Colon)),
            ',' => self.advance_with(single(TokenKind::Comma)),
            '\'' => self.read_char(start_idx, start_line, start_column)?,
            c if c.is_ascii_digit() => self.read_number(start_idx, start_line, start_column)?,
            c if c.is_alphabetic() => self.read_word(start_idx, start_line, start_column),
            _ => {
                return Err(LexError::UnexpectedCharacter {
                    character: ch,
                    line: start_line,
                });
            }
        };
        self.line_has_content = true;
        Ok(token)
    }

    /// Measures the indentation of the next logical line, skipping blank
    /// lines. Returns `None` when only whitespace remains.
    fn count_indentation(&mut self) -> LexResult<Option<usize>> {
        loop {
            let mut lookahead = self.chars.clone();
            let mut width = 0;
            let mut blank = false;
            while let Some(&(_, c)) = lookahead.peek() {
                match c {
                    ' ' => {
                        width += 1;
                        lookahead.next();
                    }
                    '\r' => {
                        lookahead.next();
                    }
                    '\t' => return Err(LexError::TabIndentation { line: self.line }),
                    '\n' => {
                        blank = true;
                        break;
                    }
                    _ => break,
                }
            }
            let at_end = lookahead.peek().is_none();

            // consume what the lookahead saw
            while let Some(&(_, c)) = self.chars.peek() {
                if c == ' ' || c == '\r' {
                    self.advance_char();
                } else {
                    break;
                }
            }

            if blank {
                self.advance_char();
                continue;
            }
            if at_end {
                return Ok(None);
            }
            return Ok(Some(width));
        }
    }

    fn dent(&mut self, indent_level: usize) -> LexResult<Option<Token<'a>>> {
        let current_indent = self.indent_stack.last().copied().unwrap_or_default();
        let span = self.empty_span();

        if indent_level > current_indent {
            self.indent_stack.push(indent_level);
            return Ok(Some(Token::new(TokenKind::Indent, span)));
        }

        while let Some(&top) = self.indent_stack.last() {
            if top > indent_level {
                self.indent_stack.pop();
                self.pending_tokens
                    .push_back(Token::new(TokenKind::Dedent, span));
            } else {
                break;
            }
        }
        if self.indent_stack.last() != Some(&indent_level) {
            return Err(LexError::InvalidDedent {
                width: indent_level,
                line: self.line,
            });
        }
        Ok(self.pending_tokens.pop_front())
    }

    fn end_of_input(&mut self) -> Token<'a> {
        self.eof_reached = true;
        let span = self.empty_span();
        if self.line_has_content {
            self.line_has_content = false;
            self.pending_tokens
                .push_back(Token::new(TokenKind::Newline, span));
        }
        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            self.pending_tokens
                .push_back(Token::new(TokenKind::Dedent, span));
        }
        self.pending_tokens
            .pop_front()
            .unwrap_or_else(|| Token::new(TokenKind::Eof, span))
    }

    fn skip_whitespace(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c == ' ' || c == '\r' {
                self.advance_char();
            } else {
                break;
            }
        }
    }

    fn read_word(&mut self, start: usize, line: usize, column: usize) -> Token<'a> {
        self.advance_char();
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_alphabetic() {
                self.advance_char();
            } else {
                break;
            }
        }

        let input = self.input;
        let end = self.current_index();
        let lexeme = &input[start..end];
        let kind = *self
            .words
            .entry(lexeme)
            .or_insert(TokenKind::Identifier(lexeme));
        Token::new(
            kind,
            Span {
                start,
                end,
                line,
                column,
            },
        )
    }

    fn read_number(&mut self, start: usize, line: usize, column: usize) -> LexResult<Token<'a>> {
        let input = self.input;
        let first = self.advance_char().map(|(_, c)| c);

        let number = if first == Some('0') && self.peek_char() == Some('x') {
            self.advance_char();
            let digits_start = self.current_index();
            while self.peek_char().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.advance_char();
            }
            let end = self.current_index();
            let value = i64::from_str_radix(&input[digits_start..end], 16).map_err(|_| {
                LexError::InvalidNumber {
                    literal: input[start..end].to_string(),
                    line,
                }
            })?;
            Number::Int(value)
        } else {
            while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                self.advance_char();
            }
            let fractional = self.peek_char() == Some('.');
            if fractional {
                self.advance_char();
                while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                    self.advance_char();
                }
            }
            let literal = &input[start..self.current_index()];
            let invalid = || LexError::InvalidNumber {
                literal: literal.to_string(),
                line,
            };
            if fractional {
                Number::Float(literal.parse::<f64>().map_err(|_| invalid())?)
            } else {
                Number::Int(literal.parse::<i64>().map_err(|_| invalid())?)
            }
        };

        Ok(Token::new(
            TokenKind::Number(number),
            Span {
                start,
                end: self.current_index(),
                line,
                column,
            },
        ))
    }

    fn read_char(&mut self, start: usize, line: usize, column: usize) -> LexResult<Token<'a>> {
        self.advance_char(); // opening quote
        let value = match self.peek_char() {
            None => {
                return Err(LexError::MalformedChar {
                    found: "end of input".to_string(),
                    line,
                });
            }
            Some(c @ ('\'' | '"' | '\n')) => {
                return Err(LexError::MalformedChar {
                    found: format!("{c:?}"),
                    line,
                });
            }
            Some(c) => c,
        };
        self.advance_char();

        match self.peek_char() {
            Some('\'') => {
                self.advance_char();
            }
            Some(c) => {
                return Err(LexError::MalformedChar {
                    found: format!("{c:?}"),
                    line,
                });
            }
            None => {
                return Err(LexError::MalformedChar {
                    found: "end of input".to_string(),
                    line,
                });
            }
        }

        Ok(Token::new(
            TokenKind::Char(value),
            Span {
                start,
                end: self.current_index(),
                line,
                column,
            },
        ))
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = LexResult<Token<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let result = self.next_token();
        match &result {
            Ok(token) => {
                trace!(line = token.span.line, token = %token, "lexed");
                if token.kind == TokenKind::Eof {
                    self.finished = true;
                }
            }
            Err(_) => self.finished = true,
        }
        Some(result)
    }
}

impl<'a> Lexer<'a> {
    fn advance_char(&mut self) -> Option<(usize, char)> {
        let next = self.chars.next();
        if let Some((_, c)) = next {
            if c == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
        next
    }

    fn advance_with(&mut self, token: Token<'a>) -> Token<'a> {
        self.advance_char();
        token
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn current_index(&mut self) -> usize {
        self.chars
            .peek()
            .map(|(idx, _)| *idx)
            .unwrap_or(self.input.len())
    }

    fn empty_span(&mut self) -> Span {
        let index = self.current_index();
        Span {
            start: index,
            end: index,
            line: self.line,
            column: self.column,
        }
    }
}

pub fn tokenize<'a>(input: &'a str) -> LexResult<Vec<Token<'a>>> {
    Lexer::new(input).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn kinds(input: &str) -> Vec<TokenKind<'_>> {
        tokenize(input)
            .expect("tokenize should succeed")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn test_simple_program() {
        let input = indoc! {"
            def add(a, b):
                n = a + b
                return n
            def main(): return add(1, 2)
        "};
        let expected_tokens = vec![
            TokenKind::Def,
            TokenKind::Identifier("add"),
            TokenKind::LParen,
            TokenKind::Identifier("a"),
            TokenKind::Comma,
            TokenKind::Identifier("b"),
            TokenKind::RParen,
            TokenKind::Colon,
            TokenKind::Newline,
            TokenKind::Indent,
            TokenKind::Identifier("n"),
            TokenKind::Equal,
            TokenKind::Identifier("a"),
            TokenKind::Plus,
            TokenKind::Identifier("b"),
            TokenKind::Newline,
            TokenKind::Return,
            TokenKind::Identifier("n"),
            TokenKind::Newline,
            TokenKind::Dedent,
            TokenKind::Def,
            TokenKind::Identifier("main"),
            TokenKind::LParen,
            TokenKind::RParen,
            TokenKind::Colon,
            TokenKind::Return,
            TokenKind::Identifier("add"),
            TokenKind::LParen,
            TokenKind::Number(Number::Int(1)),
            TokenKind::Comma,
            TokenKind::Number(Number::Int(2)),
            TokenKind::RParen,
            TokenKind::Newline,
            TokenKind::Eof,
        ];
        assert_eq!(kinds(input), expected_tokens);
    }

    #[test]
    fn lexes_hex_and_float_literals() {
        assert_eq!(
            kinds("0x1A 3.5 0 07\n"),
            vec![
                TokenKind::Number(Number::Int(26)),
                TokenKind::Number(Number::Float(3.5)),
                TokenKind::Number(Number::Int(0)),
                TokenKind::Number(Number::Int(7)),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn hex_scan_stops_at_first_non_hex_digit() {
        assert_eq!(
            kinds("0xffg\n"),
            vec![
                TokenKind::Number(Number::Int(255)),
                TokenKind::Identifier("g"),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_char_literal_and_keywords() {
        assert_eq!(
            kinds("x = not 'a' if y else z\n"),
            vec![
                TokenKind::Identifier("x"),
                TokenKind::Equal,
                TokenKind::Not,
                TokenKind::Char('a'),
                TokenKind::If,
                TokenKind::Identifier("y"),
                TokenKind::Else,
                TokenKind::Identifier("z"),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn identifiers_are_alphabetic_runs() {
        assert_eq!(
            kinds("ab1\n"),
            vec![
                TokenKind::Identifier("ab"),
                TokenKind::Number(Number::Int(1)),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn skips_blank_lines_and_closes_blocks() {
        let input = "def f():\n\n    x = 1\n   \n\n    return x\n\ndef main(): return f()";
        let tokens = kinds(input);
        let indents = tokens.iter().filter(|k| **k == TokenKind::Indent).count();
        let dedents = tokens.iter().filter(|k| **k == TokenKind::Dedent).count();
        assert_eq!(indents, 1);
        assert_eq!(dedents, 1);
        assert_eq!(
            &tokens[tokens.len() - 3..],
            &[TokenKind::RParen, TokenKind::Newline, TokenKind::Eof]
        );
    }

    #[test]
    fn multi_level_dedent_emits_one_token_per_level() {
        let input = indoc! {"
            a
              b
                c
            d
        "};
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::Identifier("a"),
                TokenKind::Newline,
                TokenKind::Indent,
                TokenKind::Identifier("b"),
                TokenKind::Newline,
                TokenKind::Indent,
                TokenKind::Identifier("c"),
                TokenKind::Newline,
                TokenKind::Dedent,
                TokenKind::Dedent,
                TokenKind::Identifier("d"),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn open_blocks_are_closed_at_end_of_input() {
        let tokens = kinds("def f():\n    return 1\n");
        assert_eq!(
            &tokens[tokens.len() - 3..],
            &[TokenKind::Newline, TokenKind::Dedent, TokenKind::Eof]
        );
    }

    #[test]
    fn errors_on_invalid_character() {
        let err = tokenize("x = 1 @ 2\n").expect_err("expected lexing failure");
        assert_eq!(
            err,
            LexError::UnexpectedCharacter {
                character: '@',
                line: 1
            }
        );
        assert!(err.to_string().contains("Illegal character '@'"));
    }

    #[test]
    fn errors_on_inconsistent_dedent() {
        let input = "def f():\n    x = 1\n  return x\n";
        let err = tokenize(input).expect_err("expected dedent failure");
        assert_eq!(err, LexError::InvalidDedent { width: 2, line: 3 });
    }

    #[test]
    fn errors_on_tab_indentation() {
        let err = tokenize("def f():\n\treturn 1\n").expect_err("expected tab failure");
        assert_eq!(err, LexError::TabIndentation { line: 2 });
    }

    #[test]
    fn errors_on_malformed_char_literals() {
        let err = tokenize("x = ''\n").expect_err("empty char");
        assert!(matches!(err, LexError::MalformedChar { line: 1, .. }));

        let err = tokenize("x = 'ab'\n").expect_err("two chars");
        assert!(err.to_string().contains("'b'"));

        let err = tokenize("x = 'a").expect_err("unterminated");
        assert!(err.to_string().contains("end of input"));
    }

    #[test]
    fn errors_on_integer_overflow() {
        let err = tokenize("n = 99999999999999999999999999\n").expect_err("expected overflow");
        assert!(err.to_string().contains("Invalid number literal"));
    }

    #[test]
    fn errors_on_empty_hex_literal() {
        let err = tokenize("n = 0x\n").expect_err("expected hex failure");
        assert!(matches!(err, LexError::InvalidNumber { .. }));
    }

    #[test]
    fn tracks_lines_across_blank_lines() {
        let tokens = tokenize("a\n\n\nb\n").expect("tokenize");
        let b = tokens
            .iter()
            .find(|token| token.kind == TokenKind::Identifier("b"))
            .expect("b token");
        assert_eq!(b.span.line, 4);
    }

    #[test]
    fn relexing_token_spans_preserves_tags() {
        let input = indoc! {"
            def f(a, b):
                x = a * b % 0x10
                x -= 'c'
                return x if a else 2.5
            def main():
                return not f(1, 2)
        "};
        let tokens = tokenize(input).expect("tokenize");
        let spanned = tokens.iter().filter(|token| {
            token.span.start < token.span.end && token.kind != TokenKind::Newline
        });
        for token in spanned {
            let fragment = &input[token.span.start..token.span.end];
            let relexed = tokenize(fragment).expect("relex");
            assert!(
                relexed[0].kind.same_tag(&token.kind),
                "{fragment:?} relexed as {} instead of {}",
                relexed[0].kind,
                token.kind
            );
        }
    }

    #[test]
    fn accepts_crlf_line_endings() {
        assert_eq!(
            kinds("x = 1\r\ny = 2\r\n"),
            vec![
                TokenKind::Identifier("x"),
                TokenKind::Equal,
                TokenKind::Number(Number::Int(1)),
                TokenKind::Newline,
                TokenKind::Identifier("y"),
                TokenKind::Equal,
                TokenKind::Number(Number::Int(2)),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }
}
