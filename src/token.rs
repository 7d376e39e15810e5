//! Token shape.
//!
//! A token carries its kind, source position, textual representation
//! (interned for identifiers/keywords, owned for literals) and a
//! discriminated literal payload, plus the two recovery-heuristic
//! flags the parser consults (`is_first_on_line`, `can_be_new_symbol`).
//!
//! Single-character punctuation gets its own `TokenKind` variant
//! rather than being encoded as its raw code point (the C original's
//! `token->kind = ch` trick) — an enum match is the idiomatic Rust
//! equivalent and the parser never needs the numeric value.

use crate::intern::{Interner, Symbol};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    pub file: Symbol,
    pub line: u32,
    pub col: u32,
}

impl Pos {
    pub fn new(file: Symbol, line: u32, col: u32) -> Self {
        Pos { file, line, col }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Single-character punctuation
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    Semi,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Dot,
    Colon,
    Bang,
    Lt,
    Gt,

    // Multi-character operators
    EqEq,
    NotEq,
    LtEq,
    GtEq,
    Arrow,

    Ident,

    // Reserved words
    KwDiv,
    KwMod,
    KwAnd,
    KwOr,
    KwXor,
    KwNot,
    KwReturn,
    KwIf,
    KwThen,
    KwElse,
    KwWhile,
    KwDo,

    IntLit,
    FloatLit,
    BoolLit,
    StringLit,

    Eof,
    Error,
}

impl TokenKind {
    pub fn is_reserved_word(self) -> bool {
        matches!(
            self,
            TokenKind::KwDiv
                | TokenKind::KwMod
                | TokenKind::KwAnd
                | TokenKind::KwOr
                | TokenKind::KwXor
                | TokenKind::KwNot
                | TokenKind::KwReturn
                | TokenKind::KwIf
                | TokenKind::KwThen
                | TokenKind::KwElse
                | TokenKind::KwWhile
                | TokenKind::KwDo
        )
    }
}

/// Textual representation of a token: interned for identifiers and
/// keywords (shared `Symbol`), owned for everything with a
/// per-occurrence literal spelling.
#[derive(Debug, Clone, PartialEq)]
pub enum Repr {
    Interned(Symbol),
    Owned(Box<str>),
}

impl Repr {
    pub fn as_str<'i>(&'i self, interner: &'i Interner) -> &'i str {
        match self {
            Repr::Interned(sym) => interner.resolve(*sym),
            Repr::Owned(s) => s,
        }
    }

    pub fn symbol(&self) -> Option<Symbol> {
        match self {
            Repr::Interned(sym) => Some(*sym),
            Repr::Owned(_) => None,
        }
    }
}

/// Discriminated literal payload. `Char` is omitted: the source
/// language has no character literals and punctuation identity is
/// already carried by `TokenKind`, so the C original's shared `char`
/// payload slot has no Rust counterpart to preserve.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    None,
    SInt(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Pos,
    pub repr: Repr,
    pub literal: Literal,
    pub is_first_on_line: bool,
    pub can_be_new_symbol: bool,
}

impl Token {
    pub fn new(kind: TokenKind, pos: Pos, repr: Repr) -> Self {
        Token {
            kind,
            pos,
            repr,
            literal: Literal::None,
            is_first_on_line: false,
            can_be_new_symbol: false,
        }
    }

    pub fn with_literal(mut self, literal: Literal) -> Self {
        self.literal = literal;
        self
    }

    pub fn text<'i>(&'i self, interner: &'i Interner) -> &'i str {
        self.repr.as_str(interner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pos_stores_line_and_column() {
        let file = Symbol::EMPTY;
        let pos = Pos::new(file, 3, 7);
        assert_eq!(pos.line, 3);
        assert_eq!(pos.col, 7);
    }

    #[test]
    fn repr_interned_resolves_through_interner() {
        let mut interner = Interner::new();
        let sym = interner.intern("foo");
        let repr = Repr::Interned(sym);
        assert_eq!(repr.as_str(&interner), "foo");
    }

    #[test]
    fn repr_owned_does_not_need_interner() {
        let interner = Interner::new();
        let repr = Repr::Owned("123".into());
        assert_eq!(repr.as_str(&interner), "123");
    }

    #[test]
    fn reserved_word_predicate() {
        assert!(TokenKind::KwIf.is_reserved_word());
        assert!(!TokenKind::Ident.is_reserved_word());
    }
}
