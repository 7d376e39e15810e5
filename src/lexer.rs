//! Byte stream to token stream.
//!
//! Scans a source buffer one character at a time, tracking line/column
//! instead of a byte span (positions are reported as `file:line:col`).
//! Reserved words and the literal
//! keywords `true`/`false` are recognized through a small trie seeded
//! once at construction; everything else alphanumeric becomes an
//! interned identifier. Lexer errors are posted to the message sink
//! and recovered from locally — `nextToken` never fails, it emits an
//! `Error`-kind token and keeps going.

use crate::arena::Arena;
use crate::error::{DiagnosticKind, MessageSink};
use crate::intern::{Interner, Symbol};
use crate::token::{Literal, Pos, Repr, Token, TokenKind};
use crate::trie::Trie;

#[derive(Debug, Clone, Copy)]
enum KeywordAction {
    Token(TokenKind),
    True,
    False,
}

/// Seeds the keyword trie used to classify identifiers as reserved
/// words, boolean literals, or plain identifiers.
fn build_keyword_trie(arena: &Arena) -> Trie<'_, KeywordAction> {
    let trie = Trie::new(arena);
    let entries: &[(&[u8], KeywordAction)] = &[
        (b"div", KeywordAction::Token(TokenKind::KwDiv)),
        (b"mod", KeywordAction::Token(TokenKind::KwMod)),
        (b"and", KeywordAction::Token(TokenKind::KwAnd)),
        (b"or", KeywordAction::Token(TokenKind::KwOr)),
        (b"xor", KeywordAction::Token(TokenKind::KwXor)),
        (b"not", KeywordAction::Token(TokenKind::KwNot)),
        (b"return", KeywordAction::Token(TokenKind::KwReturn)),
        (b"if", KeywordAction::Token(TokenKind::KwIf)),
        (b"then", KeywordAction::Token(TokenKind::KwThen)),
        (b"else", KeywordAction::Token(TokenKind::KwElse)),
        (b"while", KeywordAction::Token(TokenKind::KwWhile)),
        (b"do", KeywordAction::Token(TokenKind::KwDo)),
        (b"true", KeywordAction::True),
        (b"false", KeywordAction::False),
    ];
    for &(key, action) in entries {
        trie.put(key, action);
    }
    trie
}

pub struct Lexer<'a> {
    source: &'a [u8],
    byte_pos: usize,
    line: u32,
    col: u32,
    file: Symbol,
    scan_count: u64,
    at_line_start: bool,
    keywords: Trie<'a, KeywordAction>,
}

impl<'a> Lexer<'a> {
    /// `source` must outlive `arena`: the keyword trie caches byte
    /// slices of identifiers straight out of the source buffer rather
    /// than copying them, the same way trie keys elsewhere borrow from
    /// whichever arena backs them.
    pub fn new(source: &'a str, file: Symbol, arena: &'a Arena) -> Self {
        Lexer {
            source: source.as_bytes(),
            byte_pos: 0,
            line: 1,
            col: 1,
            file,
            scan_count: 0,
            at_line_start: true,
            keywords: build_keyword_trie(arena),
        }
    }

    fn peek(&self) -> u8 {
        *self.source.get(self.byte_pos).unwrap_or(&0)
    }

    fn peek_at(&self, offset: usize) -> u8 {
        *self.source.get(self.byte_pos + offset).unwrap_or(&0)
    }

    fn advance(&mut self) -> u8 {
        let c = self.peek();
        self.byte_pos += 1;
        self.scan_count += 1;
        self.col += 1;
        c
    }

    fn pos(&self) -> Pos {
        Pos::new(self.file, self.line, self.col)
    }

    fn skip_whitespace(&mut self) {
        loop {
            match self.peek() {
                b' ' | b'\t' | 0x0b | 0x0c => {
                    self.advance();
                }
                b'\r' => {
                    self.advance();
                    if self.peek() == b'\n' {
                        self.advance();
                    }
                    self.line += 1;
                    self.col = 1;
                    self.at_line_start = true;
                }
                b'\n' => {
                    self.advance();
                    self.line += 1;
                    self.col = 1;
                    self.at_line_start = true;
                }
                _ => return,
            }
        }
    }

    fn skip_alnum(&mut self) {
        while self.peek().is_ascii_alphanumeric() {
            self.advance();
        }
    }

    fn scan_ident(&mut self, interner: &mut Interner) -> (TokenKind, Repr, Literal) {
        let start = self.byte_pos;
        self.advance();
        while self.peek().is_ascii_alphanumeric() || self.peek() == b'_' {
            self.advance();
        }
        let text = std::str::from_utf8(&self.source[start..self.byte_pos]).expect("ASCII identifier");

        match self.keywords.get(text.as_bytes()) {
            Some(KeywordAction::Token(kind)) => (kind, Repr::Owned(text.into()), Literal::None),
            Some(KeywordAction::True) => (TokenKind::BoolLit, Repr::Owned(text.into()), Literal::Bool(true)),
            Some(KeywordAction::False) => (TokenKind::BoolLit, Repr::Owned(text.into()), Literal::Bool(false)),
            None => {
                let sym = interner.intern(text);
                (TokenKind::Ident, Repr::Interned(sym), Literal::None)
            }
        }
    }

    fn scan_hex_number(&mut self, sink: &mut MessageSink, pos: Pos) -> (TokenKind, Literal) {
        let mut result: u64 = 0;
        let mut digits = 0usize;
        let mut overflowed = false;
        loop {
            let c = self.peek();
            let digit = match c {
                b'0'..=b'9' => c - b'0',
                b'a'..=b'f' => c - b'a' + 10,
                b'A'..=b'F' => c - b'A' + 10,
                _ => break,
            };
            if digits >= 16 {
                overflowed = true;
            } else {
                result = (result << 4) | digit as u64;
            }
            digits += 1;
            self.advance();
        }
        if digits == 0 {
            sink.push(DiagnosticKind::InvalidDigit, pos);
            return (TokenKind::Error, Literal::None);
        }
        if overflowed {
            sink.push(DiagnosticKind::IntegerTooBig, pos);
            self.skip_alnum();
            return (TokenKind::Error, Literal::None);
        }
        (TokenKind::IntLit, Literal::UInt(result))
    }

    /// Scans a decimal integer or float literal using incremental
    /// digit-by-digit overflow handling rather than collecting a
    /// substring and parsing it in one shot.
    fn scan_decimal_number(&mut self, sink: &mut MessageSink, pos: Pos) -> (TokenKind, Literal) {
        #[derive(PartialEq)]
        enum Part {
            Main,
            Fraction,
            Exponent,
        }

        let mut int_val: u64 = 0;
        let mut parse_as_int = true;
        let mut float_val: f64 = 0.0;
        let mut part = Part::Main;
        let mut exp: i32 = 0;
        let mut exp_sign: i32 = 1;
        let mut exp_digits: u64 = 0;

        loop {
            let c = self.peek();
            if c.is_ascii_digit() {
                let d = (c - b'0') as u64;
                if parse_as_int || part == Part::Exponent {
                    if int_val > (u64::MAX - d) / 10 {
                        if parse_as_int {
                            parse_as_int = false;
                            float_val = int_val as f64 * 10.0 + d as f64;
                        } else {
                            float_val = f64::INFINITY;
                            while self.peek().is_ascii_digit() {
                                self.advance();
                            }
                            break;
                        }
                    } else if part == Part::Exponent {
                        exp_digits = exp_digits * 10 + d;
                    } else {
                        int_val = int_val * 10 + d;
                    }
                } else if part == Part::Main {
                    float_val = float_val * 10.0 + d as f64;
                } else {
                    exp += 1;
                    float_val = float_val * 10.0 + d as f64;
                }
            } else if c == b'.' && part == Part::Main {
                if parse_as_int {
                    float_val = int_val as f64;
                }
                int_val = 0;
                parse_as_int = false;
                part = Part::Fraction;
            } else if (c == b'e' || c == b'E') && part != Part::Exponent {
                part = Part::Exponent;
                if parse_as_int {
                    float_val = int_val as f64;
                    parse_as_int = false;
                }
                int_val = 0;
                let sign_byte = self.peek_at(1);
                if sign_byte == b'-' || sign_byte == b'+' {
                    exp_sign = if sign_byte == b'-' { -1 } else { 1 };
                    self.advance();
                }
                if !self.peek_at(1).is_ascii_digit() {
                    sink.push(DiagnosticKind::InvalidFloatExponent, pos);
                    self.advance();
                    self.skip_alnum();
                    return (TokenKind::Error, Literal::None);
                }
            } else {
                break;
            }
            self.advance();
        }

        if part != Part::Main {
            let e = exp_sign * exp_digits as i32 - exp;
            float_val *= 10f64.powi(e);
        }

        if parse_as_int {
            (TokenKind::IntLit, Literal::UInt(int_val))
        } else if part != Part::Main {
            (TokenKind::FloatLit, Literal::Float(float_val))
        } else {
            sink.push(DiagnosticKind::IntegerTooBig, pos);
            (TokenKind::Error, Literal::None)
        }
    }

    fn scan_number(&mut self, sink: &mut MessageSink) -> (TokenKind, Literal) {
        let pos = self.pos();
        if self.peek() == b'0' && (self.peek_at(1) == b'x' || self.peek_at(1) == b'X') {
            self.advance();
            self.advance();
            return self.scan_hex_number(sink, pos);
        }
        if self.peek() == b'0' && self.peek_at(1).is_ascii_digit() {
            sink.push(DiagnosticKind::InvalidNumberLeadingZero, pos);
            self.skip_alnum();
            return (TokenKind::Error, Literal::None);
        }
        self.scan_decimal_number(sink, pos)
    }

    fn scan_string(&mut self, sink: &mut MessageSink) -> (TokenKind, Literal) {
        let pos = self.pos();
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek() {
                0 | b'\n' | b'\r' => {
                    sink.push(DiagnosticKind::UnclosedString, pos);
                    return (TokenKind::Error, Literal::Str(value));
                }
                b'"' => {
                    self.advance();
                    return (TokenKind::StringLit, Literal::Str(value));
                }
                b'\\' => {
                    self.advance();
                    let escaped = self.advance();
                    let decoded = match escaped {
                        b'n' => '\n',
                        b't' => '\t',
                        b'r' => '\r',
                        b'0' => '\0',
                        b'\\' => '\\',
                        b'"' => '"',
                        other => {
                            sink.push(DiagnosticKind::BadStringEscape, self.pos());
                            other as char
                        }
                    };
                    value.push(decoded);
                }
                _ => {
                    let c = self.advance();
                    value.push(c as char);
                }
            }
        }
    }

    fn scan_punct(&mut self, sink: &mut MessageSink, pos: Pos) -> (TokenKind, Repr, Literal) {
        let c = self.advance();
        let kind = match c {
            b'+' => TokenKind::Plus,
            b'-' => {
                if self.peek() == b'>' {
                    self.advance();
                    TokenKind::Arrow
                } else {
                    TokenKind::Minus
                }
            }
            b'*' => TokenKind::Star,
            b'/' => TokenKind::Slash,
            b'%' => TokenKind::Percent,
            b';' => TokenKind::Semi,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b',' => TokenKind::Comma,
            b'.' => TokenKind::Dot,
            b':' => TokenKind::Colon,
            b'=' => {
                if self.peek() == b'=' {
                    self.advance();
                    TokenKind::EqEq
                } else {
                    TokenKind::Assign
                }
            }
            b'!' => {
                if self.peek() == b'=' {
                    self.advance();
                    TokenKind::NotEq
                } else {
                    TokenKind::Bang
                }
            }
            b'<' => {
                if self.peek() == b'=' {
                    self.advance();
                    TokenKind::LtEq
                } else {
                    TokenKind::Lt
                }
            }
            b'>' => {
                if self.peek() == b'=' {
                    self.advance();
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            other => {
                sink.push(DiagnosticKind::InvalidCharacter { found: other as char }, pos);
                TokenKind::Error
            }
        };
        (kind, Repr::Owned("".into()), Literal::None)
    }

    /// Scans and returns the next token, allocating it into `arena`.
    /// Never errors: lexer problems are
    /// posted to `sink` and surfaced as an `Error`-kind token.
    pub fn next_token(&mut self, arena: &'a Arena, interner: &mut Interner, sink: &mut MessageSink) -> &'a Token {
        self.skip_whitespace();
        let is_first_on_line = self.at_line_start;
        self.at_line_start = false;
        let pos = self.pos();
        let c = self.peek();

        let (kind, repr, literal) = if c == 0 {
            (TokenKind::Eof, Repr::Owned("".into()), Literal::None)
        } else if c.is_ascii_alphabetic() {
            self.scan_ident(interner)
        } else if c.is_ascii_digit() {
            let (kind, literal) = self.scan_number(sink);
            (kind, Repr::Owned("".into()), literal)
        } else if c == b'"' {
            let (kind, literal) = self.scan_string(sink);
            (kind, Repr::Owned("".into()), literal)
        } else {
            self.scan_punct(sink, pos)
        };

        let can_be_new_symbol = matches!(
            kind,
            TokenKind::Ident | TokenKind::IntLit | TokenKind::FloatLit | TokenKind::StringLit | TokenKind::BoolLit
        );

        let mut token = Token::new(kind, pos, repr).with_literal(literal);
        token.is_first_on_line = is_first_on_line;
        token.can_be_new_symbol = can_be_new_symbol;
        arena.alloc(token)
    }
}
