//! The scanner: source text to [`Token`] stream.
//!
//! Grounded in the teacher's `lexer/scanner.rs` (`Peekable<CharIndices>`,
//! `advance`/`peek`/`peek_at`, line/column bookkeeping). Unlike the teacher's
//! `scan_token() -> Result<Token, LexerError>`, this scanner never fails:
//! a malformed character or unterminated string becomes a `TokenKind::Error`
//! token carrying its own diagnostic text, per spec.md §3 ("`ERROR` tokens
//! carry their diagnostic as their textual payload") and §6.1
//! ("`ERROR` tokens carry diagnostic text"). The token cursor (§4.1) is what
//! turns a run of `Error` tokens into reported diagnostics; the scanner's job
//! is only to classify.

use std::iter::Peekable;
use std::str::CharIndices;

use super::token::{Token, TokenKind};
use crate::span::Span;

pub struct Scanner<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    current_pos: usize,
    line: u32,
    column: u32,
    start_line: u32,
    start_column: u32,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            current_pos: 0,
            line: 1,
            column: 1,
            start_line: 1,
            start_column: 1,
        }
    }

    /// Scan the next token. Returns `Eof` indefinitely once the source is
    /// exhausted (spec.md §6.1).
    pub fn scan_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();
        self.start_line = self.line;
        self.start_column = self.column;

        let Some((_, c)) = self.advance() else {
            return self.make_token(TokenKind::Eof);
        };

        match c {
            '(' => self.make_token(TokenKind::LeftParen),
            ')' => self.make_token(TokenKind::RightParen),
            '{' => self.make_token(TokenKind::LeftBrace),
            '}' => self.make_token(TokenKind::RightBrace),
            ',' => self.make_token(TokenKind::Comma),
            '.' => self.make_token(TokenKind::Dot),
            ';' => self.make_token(TokenKind::Semicolon),
            '+' => self.make_token(TokenKind::Plus),
            '*' => self.make_token(TokenKind::Star),
            '&' => self.make_token(TokenKind::Amp),
            '-' => self.make_token(TokenKind::Minus),
            '/' => {
                if self.peek() == Some('/') {
                    while self.peek().is_some() && self.peek() != Some('\n') {
                        self.advance();
                    }
                    self.scan_token()
                } else {
                    self.make_token(TokenKind::Slash)
                }
            }
            '!' => {
                if self.match_char('=') {
                    self.make_token(TokenKind::BangEqual)
                } else {
                    self.make_token(TokenKind::Bang)
                }
            }
            '=' => {
                if self.match_char('=') {
                    self.make_token(TokenKind::EqualEqual)
                } else {
                    self.make_token(TokenKind::Equal)
                }
            }
            '<' => {
                if self.match_char('=') {
                    self.make_token(TokenKind::LessEqual)
                } else {
                    self.make_token(TokenKind::Less)
                }
            }
            '>' => {
                if self.match_char('=') {
                    self.make_token(TokenKind::GreaterEqual)
                } else {
                    self.make_token(TokenKind::Greater)
                }
            }
            '"' => self.scan_string(),
            c if c.is_ascii_digit() => self.scan_number(c),
            c if c.is_alphabetic() || c == '_' => self.scan_identifier(c),
            other => {
                self.error_token(format!("Unexpected character '{other}'."))
            }
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(' ' | '\t' | '\r') => {
                    self.advance();
                }
                Some('\n') => {
                    self.advance();
                    self.line += 1;
                    self.column = 1;
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while self.peek().is_some() && self.peek() != Some('\n') {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn scan_string(&mut self) -> Token {
        let mut value = String::new();
        loop {
            match self.peek() {
                None => return self.error_token("Unterminated string.".to_string()),
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\n') => {
                    value.push('\n');
                    self.advance();
                    self.line += 1;
                    self.column = 1;
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
        self.make_token(TokenKind::Str(value))
    }

    fn scan_number(&mut self, first: char) -> Token {
        if first == '0' && matches!(self.peek(), Some('x') | Some('X')) {
            self.advance();
            let mut digits = String::new();
            while let Some(c) = self.peek() {
                if c.is_ascii_hexdigit() {
                    digits.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
            return self.make_token(TokenKind::Hexadecimal(digits));
        }

        let mut value = String::from(first);
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                value.push(c);
                self.advance();
            } else {
                break;
            }
        }

        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            value.push('.');
            self.advance();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    value.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
            self.make_token(TokenKind::Number(value))
        } else {
            self.make_token(TokenKind::Integer(value))
        }
    }

    fn scan_identifier(&mut self, first: char) -> Token {
        let mut value = String::from(first);
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                value.push(c);
                self.advance();
            } else {
                break;
            }
        }
        let kind = TokenKind::keyword(&value).unwrap_or(TokenKind::Identifier(value));
        self.make_token(kind)
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        if let Some((pos, c)) = self.chars.next() {
            self.current_pos = pos + c.len_utf8();
            self.column += 1;
            Some((pos, c))
        } else {
            None
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.source[self.current_pos..].chars().nth(n)
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, Span::new(self.start_line, self.start_column))
    }

    fn error_token(&self, message: String) -> Token {
        Token::new(TokenKind::Error(message), Span::new(self.start_line, self.start_column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(source: &str) -> Vec<TokenKind> {
        let mut scanner = Scanner::new(source);
        let mut kinds = Vec::new();
        loop {
            let tok = scanner.scan_token();
            let is_eof = tok.is_eof();
            kinds.push(tok.kind);
            if is_eof {
                break;
            }
        }
        kinds
    }

    #[test]
    fn punctuation() {
        assert_eq!(
            scan("(){};,.+-*&"),
            vec![
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::LeftBrace,
                TokenKind::RightBrace,
                TokenKind::Semicolon,
                TokenKind::Comma,
                TokenKind::Dot,
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::Amp,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn operators() {
        assert_eq!(
            scan("! != = == > >= < <="),
            vec![
                TokenKind::Bang,
                TokenKind::BangEqual,
                TokenKind::Equal,
                TokenKind::EqualEqual,
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::Less,
                TokenKind::LessEqual,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn numbers_and_hex() {
        assert_eq!(
            scan("42 3.14 0x1F"),
            vec![
                TokenKind::Integer("42".to_string()),
                TokenKind::Number("3.14".to_string()),
                TokenKind::Hexadecimal("1F".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn string_literal() {
        assert_eq!(
            scan(r#""hello world""#),
            vec![TokenKind::Str("hello world".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn unterminated_string_is_error_token() {
        let kinds = scan("\"abc");
        assert!(matches!(kinds[0], TokenKind::Error(_)));
    }

    #[test]
    fn keywords() {
        assert_eq!(
            scan("var fun if else while return puts"),
            vec![
                TokenKind::Var,
                TokenKind::Fun,
                TokenKind::If,
                TokenKind::Else,
                TokenKind::While,
                TokenKind::Return,
                TokenKind::Puts,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn line_comment_skipped() {
        assert_eq!(
            scan("1 // comment\n2"),
            vec![
                TokenKind::Integer("1".to_string()),
                TokenKind::Integer("2".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn bad_character_is_error_token() {
        let kinds = scan("@");
        assert!(matches!(kinds[0], TokenKind::Error(_)));
    }

    #[test]
    fn tracks_line_and_column() {
        let mut scanner = Scanner::new("a\nb");
        let first = scanner.scan_token();
        assert_eq!(first.span, Span::new(1, 1));
        let second = scanner.scan_token();
        assert_eq!(second.span, Span::new(2, 1));
    }
}
