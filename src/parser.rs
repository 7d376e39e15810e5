//! Recursive-descent parser with precedence climbing.
//!
//! Builds the tagged-union tree from `ast` directly out of the token
//! stream: no separate CST, no backtracking. Grammar ambiguity between
//! a declaration, an assignment and a bare expression statement is
//! resolved with one token of lookahead beyond the current token
//! (`peek`).
//!
//! Error recovery: a
//! missing token is reported at the *previous* token's position when
//! the current token starts a new line (the user almost certainly just
//! forgot a `;` or `}` at the end of the previous line), and at the
//! current token's position otherwise. `last_error_line` suppresses
//! a pile-up of diagnostics on one bad line; `synchronize` resumes
//! parsing at the next `;`, `}` or EOF.

use std::cell::Cell;

use crate::arena::Arena;
use crate::ast::{new_if_while, Extra, LiteralValue, Node, NodeKind};
use crate::error::{DiagnosticKind, MessageSink};
use crate::intern::{Interner, Symbol};
use crate::lexer::Lexer;
use crate::token::{Literal, Token, TokenKind};
use crate::types::{Type, TypeKind};

/// Maps a bare identifier spelling to a built-in type, the language's
/// only reserved-by-convention names.
fn lookup_type_name(name: &str) -> Option<TypeKind> {
    Some(match name {
        "Void" => TypeKind::Void,
        "Bool" => TypeKind::Bool,
        "UInt8" => TypeKind::UInt8,
        "UInt16" => TypeKind::UInt16,
        "UInt32" => TypeKind::UInt32,
        "UInt64" => TypeKind::UInt64,
        "Int8" => TypeKind::Int8,
        "Int16" => TypeKind::Int16,
        "Int32" => TypeKind::Int32,
        "Int64" => TypeKind::Int64,
        "Float32" => TypeKind::Float32,
        "Float64" => TypeKind::Float64,
        _ => return None,
    })
}

pub struct Parser<'a, 'b> {
    lexer: Lexer<'a>,
    arena: &'a Arena,
    interner: &'b mut Interner,
    sink: &'b mut MessageSink,
    file: Symbol,
    prev: &'a Token,
    cur: &'a Token,
    peek: &'a Token,
    last_error_line: Option<u32>,
    scope_level: u32,
    current_return_type: Type,
}

impl<'a, 'b> Parser<'a, 'b> {
    pub fn new(
        source: &'a str,
        file: Symbol,
        arena: &'a Arena,
        interner: &'b mut Interner,
        sink: &'b mut MessageSink,
    ) -> Self {
        let mut lexer = Lexer::new(source, file, arena);
        let first = lexer.next_token(arena, interner, sink);
        let second = lexer.next_token(arena, interner, sink);
        Parser {
            lexer,
            arena,
            interner,
            sink,
            file,
            prev: first,
            cur: first,
            peek: second,
            last_error_line: None,
            scope_level: 0,
            current_return_type: Type::VOID,
        }
    }

    /// Parses an entire source file: `program := { top-level-item } EOF`.
    /// The implicit top-level block has no surrounding
    /// braces and terminates at EOF instead of `}`. The `Program` node's
    /// own token carries the file name (for `debug::dump`'s module
    /// header), not the first lexed token of the body.
    pub fn parse_program(&mut self) -> &'a Node<'a> {
        let program_token = self.arena.alloc(Token::new(
            TokenKind::Ident,
            self.cur.pos,
            crate::token::Repr::Interned(self.file),
        ));
        let block_token = self.cur;
        let scope = self.new_scope(None, Type::VOID);
        let stmts = self.parse_stmt_list(scope, TokenKind::Eof);
        let block = self.arena.alloc(Node::new(
            NodeKind::Block,
            block_token,
            Extra::Block { scope, stmts: Cell::new(stmts) },
        ));
        let program = self.arena.alloc(Node::leaf(NodeKind::Program, program_token));
        program.next.set(Some(block));
        program
    }

    // ---- token stream plumbing -------------------------------------

    fn advance(&mut self) {
        self.prev = self.cur;
        self.cur = self.peek;
        self.peek = self.lexer.next_token(self.arena, self.interner, self.sink);
    }

    fn symbol_of(&self, token: &Token) -> Symbol {
        token.repr.symbol().unwrap_or(Symbol::EMPTY)
    }

    fn post_error(&mut self, kind: DiagnosticKind, pos: crate::token::Pos) {
        if self.last_error_line == Some(pos.line) {
            return;
        }
        self.last_error_line = Some(pos.line);
        self.sink.push(kind, pos);
    }

    /// Consumes `kind` if present, else
    /// reports it missing at whichever position best matches where the
    /// user's eye would land, and returns `None` without consuming.
    fn expect(&mut self, kind: TokenKind, expected: &str) -> Option<&'a Token> {
        if self.cur.kind == kind {
            let t = self.cur;
            self.advance();
            return Some(t);
        }
        if self.cur.kind != TokenKind::Error {
            if self.cur.is_first_on_line {
                self.post_error(
                    DiagnosticKind::ExpectedTokenMissing { expected: expected.to_string() },
                    self.prev.pos,
                );
            } else {
                self.post_error(
                    DiagnosticKind::UnexpectedToken {
                        expected: expected.to_string(),
                        found: format!("{:?}", self.cur.kind),
                    },
                    self.cur.pos,
                );
            }
        }
        None
    }

    fn expect_semi(&mut self) {
        if self.expect(TokenKind::Semi, "';'").is_none() {
            self.synchronize();
        }
    }

    /// Skips to the next `;`, `}` or EOF, consuming a trailing `;` so
    /// the caller resumes just past the damaged statement.
    fn synchronize(&mut self) {
        while !matches!(self.cur.kind, TokenKind::Semi | TokenKind::RBrace | TokenKind::Eof) {
            self.advance();
        }
        if self.cur.kind == TokenKind::Semi {
            self.advance();
        }
    }

    fn parse_type(&mut self) -> Type {
        if self.cur.kind != TokenKind::Ident {
            self.post_error(
                DiagnosticKind::UnexpectedToken {
                    expected: "a type name".to_string(),
                    found: format!("{:?}", self.cur.kind),
                },
                self.cur.pos,
            );
            return Type::UNKNOWN;
        }
        let text = self.cur.text(self.interner).to_string();
        let kind = match lookup_type_name(&text) {
            Some(k) => k,
            None => {
                self.post_error(DiagnosticKind::UnknownType { name: text }, self.cur.pos);
                self.advance();
                return Type::UNKNOWN;
            }
        };
        self.advance();
        Type::new(kind)
    }

    // ---- scopes ------------------------------------------------------

    fn new_scope(&mut self, parent: Option<&'a Node<'a>>, return_type: Type) -> &'a Node<'a> {
        self.arena.alloc(Node::new(
            NodeKind::Scope,
            self.cur,
            Extra::Scope {
                parent: Cell::new(parent),
                return_type: Cell::new(return_type),
                decls: Cell::new(None),
            },
        ))
    }

    // ---- blocks and statement sequences -------------------------------

    /// `block := '{' { decl | stmt } '}'`. `return_type` is the return
    /// type of the nearest enclosing function, threaded through so
    /// `return` statements nested arbitrarily deep still know it.
    fn parse_block(&mut self, parent_scope: Option<&'a Node<'a>>) -> &'a Node<'a> {
        self.expect(TokenKind::LBrace, "'{'");
        let return_type = self.current_return_type;
        let block = self.parse_block_body(TokenKind::RBrace, parent_scope, return_type);
        self.expect(TokenKind::RBrace, "'}'");
        block
    }

    fn parse_block_body(
        &mut self,
        terminator: TokenKind,
        parent_scope: Option<&'a Node<'a>>,
        return_type: Type,
    ) -> &'a Node<'a> {
        let block_token = self.cur;
        self.scope_level += 1;
        let scope = self.new_scope(parent_scope, return_type);
        let head = self.parse_stmt_list(scope, terminator);
        self.scope_level -= 1;

        self.arena.alloc(Node::new(
            NodeKind::Block,
            block_token,
            Extra::Block { scope, stmts: Cell::new(head) },
        ))
    }

    /// Parses `{ decl | stmt }` up to (not including) `terminator`,
    /// registering each declaration on `scope` in source order. Shared
    /// by the implicit global block (level 0, no scope-depth increment)
    /// and every braced block (which bumps `scope_level` around this
    /// call).
    fn parse_stmt_list(&mut self, scope: &'a Node<'a>, terminator: TokenKind) -> Option<&'a Node<'a>> {
        let mut head: Option<&'a Node<'a>> = None;
        let mut tail: Option<&'a Node<'a>> = None;
        while self.cur.kind != terminator && self.cur.kind != TokenKind::Eof {
            if self.cur.kind == TokenKind::Semi {
                self.advance();
                continue;
            }
            let item = self.parse_item(scope);
            match tail {
                None => head = Some(item),
                Some(t) => t.next.set(Some(item)),
            }
            tail = Some(item);
        }
        head
    }

    /// `top-level-item := decl | stmt`, dispatched on the current token
    /// plus one token of lookahead for the `ident` cases.
    fn parse_item(&mut self, scope: &'a Node<'a>) -> &'a Node<'a> {
        match self.cur.kind {
            TokenKind::LBrace => self.parse_block(Some(scope)),
            TokenKind::KwReturn => self.parse_return(),
            TokenKind::KwIf => self.parse_if(scope),
            TokenKind::KwWhile => self.parse_while(scope),
            TokenKind::Ident if self.peek.kind == TokenKind::Colon => self.parse_decl(scope),
            TokenKind::Ident if self.peek.kind == TokenKind::Assign => self.parse_assignment(),
            _ => self.parse_expr_stmt(),
        }
    }

    // ---- declarations --------------------------------------------------

    /// `decl := ident ':' [ type ] ( '=' expr | ':' const-expr | func-def ) ';'`
    fn parse_decl(&mut self, scope: &'a Node<'a>) -> &'a Node<'a> {
        let name_tok = self.cur;
        self.advance(); // ident
        self.advance(); // ':'
        let level = self.scope_level;

        let decl = if self.cur.kind == TokenKind::Colon {
            self.advance();
            let init = self.parse_expr();
            self.expect_semi();
            self.build_var_decl(name_tok, None, init, true, level)
        } else if self.cur.kind == TokenKind::LParen {
            if level > 0 {
                self.post_error(DiagnosticKind::FuncDeclaredUnderScope, name_tok.pos);
            }
            let funcdef = self.parse_func_def(name_tok);
            self.build_func_decl(name_tok, funcdef, level)
        } else {
            let declared_type = if self.cur.kind == TokenKind::Ident { Some(self.parse_type()) } else { None };
            self.expect(TokenKind::Assign, "'='");
            let init = self.parse_expr();
            self.expect_semi();
            self.build_var_decl(name_tok, declared_type, init, false, level)
        };

        scope.scope_push_decl(decl);
        decl
    }

    fn build_var_decl(
        &mut self,
        name_tok: &'a Token,
        declared_type: Option<Type>,
        init: &'a Node<'a>,
        is_const: bool,
        level: u32,
    ) -> &'a Node<'a> {
        let ident = self.arena.alloc(Node::new(NodeKind::Ident, name_tok, Extra::Ident { decl: Cell::new(None) }));
        let assign = self.arena.alloc(Node::new(NodeKind::Assign, name_tok, Extra::None));
        assign.left.set(Some(ident));
        assign.right.set(Some(init));

        let decl = self.arena.alloc(Node::new(
            NodeKind::Decl,
            name_tok,
            Extra::Decl {
                name: self.symbol_of(name_tok),
                declared_type: Cell::new(declared_type.unwrap_or(Type::UNKNOWN)),
                is_const: Cell::new(is_const),
                is_being_processed: Cell::new(false),
                is_processed: Cell::new(false),
                level: Cell::new(level),
                next_decl: Cell::new(None),
            },
        ));
        decl.left.set(Some(assign));
        decl
    }

    fn build_func_decl(&mut self, name_tok: &'a Token, funcdef: &'a Node<'a>, level: u32) -> &'a Node<'a> {
        let decl = self.arena.alloc(Node::new(
            NodeKind::Decl,
            name_tok,
            Extra::Decl {
                name: self.symbol_of(name_tok),
                declared_type: Cell::new(Type::UNKNOWN),
                is_const: Cell::new(true),
                is_being_processed: Cell::new(false),
                is_processed: Cell::new(false),
                level: Cell::new(level),
                next_decl: Cell::new(None),
            },
        ));
        decl.left.set(Some(funcdef));
        decl
    }

    /// `func-def := '(' [ param { ',' param } ] ')' [ '->' type ] ( block | ';' )`
    fn parse_func_def(&mut self, name_tok: &'a Token) -> &'a Node<'a> {
        self.expect(TokenKind::LParen, "'('");
        let mut head: Option<&'a Node<'a>> = None;
        let mut tail: Option<&'a Node<'a>> = None;
        let mut count: u32 = 0;
        if self.cur.kind != TokenKind::RParen {
            loop {
                let p = self.parse_param(count);
                count += 1;
                match tail {
                    None => head = Some(p),
                    Some(t) => t.next.set(Some(p)),
                }
                tail = Some(p);
                if self.cur.kind == TokenKind::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "')'");
        if let Some(first) = head {
            if let Extra::Param { count: c, .. } = &first.extra {
                c.set(count);
            }
        }

        let return_type = if self.cur.kind == TokenKind::Arrow {
            self.advance();
            self.parse_type()
        } else {
            Type::VOID
        };

        let funcdef = self.arena.alloc(Node::new(
            NodeKind::FuncDef,
            name_tok,
            Extra::FuncDef {
                name: self.symbol_of(name_tok),
                return_type: Cell::new(return_type),
                params: Cell::new(head),
                body: Cell::new(None),
                next_overload: Cell::new(None),
                mangled_name: Cell::new(None),
            },
        ));

        if self.cur.kind == TokenKind::LBrace {
            let prev_ret = self.current_return_type;
            self.current_return_type = return_type;
            let body = self.parse_block(None);
            self.current_return_type = prev_ret;
            if let Extra::FuncDef { body: b, .. } = &funcdef.extra {
                b.set(Some(body));
            }
        } else {
            self.expect_semi();
        }
        funcdef
    }

    fn parse_param(&mut self, index: u32) -> &'a Node<'a> {
        let name_tok = self.cur;
        if name_tok.kind != TokenKind::Ident {
            self.post_error(
                DiagnosticKind::UnexpectedToken {
                    expected: "a parameter name".to_string(),
                    found: format!("{:?}", self.cur.kind),
                },
                self.cur.pos,
            );
        } else {
            self.advance();
        }
        self.expect(TokenKind::Colon, "':'");
        let ty = self.parse_type();
        let param = self.arena.alloc(Node::new(
            NodeKind::Param,
            name_tok,
            Extra::Param { index, count: Cell::new(0) },
        ));
        param.ty.set(ty);
        param
    }

    // ---- statements --------------------------------------------------

    /// `assignment := ident '=' expr ';'`
    fn parse_assignment(&mut self) -> &'a Node<'a> {
        let name_tok = self.cur;
        self.advance();
        let assign_tok = self.cur;
        self.expect(TokenKind::Assign, "'='");
        let rhs = self.parse_expr();
        self.expect_semi();

        let ident = self.arena.alloc(Node::new(NodeKind::Ident, name_tok, Extra::Ident { decl: Cell::new(None) }));
        let node = self.arena.alloc(Node::new(NodeKind::Assign, assign_tok, Extra::None));
        node.left.set(Some(ident));
        node.right.set(Some(rhs));
        node
    }

    /// `return := 'return' [ expr ] ';'`. The node's `ty` is seeded with
    /// the enclosing function's declared return type; a function with no `-> type` defaults to
    /// `Void`.
    fn parse_return(&mut self) -> &'a Node<'a> {
        let ret_tok = self.cur;
        self.advance();
        let expr = if self.cur.kind != TokenKind::Semi { Some(self.parse_expr()) } else { None };
        self.expect_semi();
        let node = self.arena.alloc(Node::new(NodeKind::Return, ret_tok, Extra::None));
        node.ty.set(self.current_return_type);
        node.left.set(expr);
        node
    }

    /// `if := 'if' expr ('then' stmt | block) [ 'else' stmt ]`
    fn parse_if(&mut self, scope: &'a Node<'a>) -> &'a Node<'a> {
        let if_tok = self.cur;
        self.advance();
        let cond = self.parse_expr();
        let body = if self.cur.kind == TokenKind::KwThen {
            self.advance();
            self.parse_item(scope)
        } else {
            self.parse_block(Some(scope))
        };
        let else_body = if self.cur.kind == TokenKind::KwElse {
            self.advance();
            Some(self.parse_item(scope))
        } else {
            None
        };
        self.arena.alloc(new_if_while(NodeKind::If, if_tok, cond, body, else_body))
    }

    /// `while := 'while' expr ('do' stmt | block)`
    fn parse_while(&mut self, scope: &'a Node<'a>) -> &'a Node<'a> {
        let while_tok = self.cur;
        self.advance();
        let cond = self.parse_expr();
        let body = if self.cur.kind == TokenKind::KwDo {
            self.advance();
            self.parse_item(scope)
        } else {
            self.parse_block(Some(scope))
        };
        self.arena.alloc(new_if_while(NodeKind::While, while_tok, cond, body, None))
    }

    /// `stmt := ... | expr ';'`. A bare `expr` followed directly by `=`
    /// is an assignment to something that isn't an identifier (the only
    /// lvalue form the grammar allows) — reported rather than silently
    /// swallowed.
    fn parse_expr_stmt(&mut self) -> &'a Node<'a> {
        let e = self.parse_expr();
        if self.cur.kind == TokenKind::Assign {
            self.post_error(DiagnosticKind::OperandMustBeLvalue, e.token.pos);
            self.advance();
            let _ = self.parse_expr();
        }
        self.expect_semi();
        e
    }

    // ---- expressions: or > and > cmp > add > mul > unary > factor ------

    fn parse_expr(&mut self) -> &'a Node<'a> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> &'a Node<'a> {
        let mut left = self.parse_and();
        loop {
            let kind = match self.cur.kind {
                TokenKind::KwOr => NodeKind::Or,
                TokenKind::KwXor => NodeKind::Xor,
                _ => break,
            };
            let tok = self.cur;
            self.advance();
            let right = self.parse_and();
            left = self.bin_node(kind, tok, left, right);
        }
        left
    }

    fn parse_and(&mut self) -> &'a Node<'a> {
        let mut left = self.parse_cmp();
        while self.cur.kind == TokenKind::KwAnd {
            let tok = self.cur;
            self.advance();
            let right = self.parse_cmp();
            left = self.bin_node(NodeKind::And, tok, left, right);
        }
        left
    }

    /// `cmp-expr := add-expr [ ('==' | '!=' | '<' | '<=' | '>' | '>=') add-expr ]`.
    /// Non-associative: a second relational operator right after a
    /// completed comparison is not consumed here, so it surfaces
    /// naturally as "expected ';'" at the statement boundary instead of
    /// silently chaining (`a < b < c` is rejected, not reinterpreted).
    fn parse_cmp(&mut self) -> &'a Node<'a> {
        let left = self.parse_add();
        let kind = match self.cur.kind {
            TokenKind::EqEq => NodeKind::Eq,
            TokenKind::NotEq => NodeKind::NotEq,
            TokenKind::Lt => NodeKind::Lt,
            TokenKind::LtEq => NodeKind::LtEq,
            TokenKind::Gt => NodeKind::Gt,
            TokenKind::GtEq => NodeKind::GtEq,
            _ => return left,
        };
        let tok = self.cur;
        self.advance();
        let right = self.parse_add();
        self.bin_node(kind, tok, left, right)
    }

    fn parse_add(&mut self) -> &'a Node<'a> {
        let mut left = self.parse_mul();
        loop {
            let kind = match self.cur.kind {
                TokenKind::Plus => NodeKind::Add,
                TokenKind::Minus => NodeKind::Sub,
                _ => break,
            };
            let tok = self.cur;
            self.advance();
            let right = self.parse_mul();
            left = self.bin_node(kind, tok, left, right);
        }
        left
    }

    fn parse_mul(&mut self) -> &'a Node<'a> {
        let mut left = self.parse_unary();
        loop {
            let kind = match self.cur.kind {
                TokenKind::Star => NodeKind::Mul,
                TokenKind::Slash => NodeKind::FDiv,
                TokenKind::KwDiv => NodeKind::SDiv,
                TokenKind::KwMod => NodeKind::SRem,
                _ => break,
            };
            let tok = self.cur;
            self.advance();
            let right = self.parse_unary();
            left = self.bin_node(kind, tok, left, right);
        }
        left
    }

    fn bin_node(&self, kind: NodeKind, tok: &'a Token, left: &'a Node<'a>, right: &'a Node<'a>) -> &'a Node<'a> {
        let node = self.arena.alloc(Node::new(kind, tok, Extra::None));
        node.left.set(Some(left));
        node.right.set(Some(right));
        node
    }

    /// `unary := ['+' | '-' | 'not' | '!'] factor`. `!` parses the same
    /// as `not` but keeps its own token kind so the fix/infer pass can
    /// flag it without re-lexing.
    fn parse_unary(&mut self) -> &'a Node<'a> {
        match self.cur.kind {
            TokenKind::Plus => {
                self.advance();
                self.parse_factor()
            }
            TokenKind::Minus => {
                let tok = self.cur;
                self.advance();
                let operand = self.parse_factor();
                let node = self.arena.alloc(Node::new(NodeKind::Neg, tok, Extra::None));
                node.left.set(Some(operand));
                node
            }
            TokenKind::KwNot | TokenKind::Bang => {
                let tok = self.cur;
                self.advance();
                let operand = self.parse_factor();
                let node = self.arena.alloc(Node::new(NodeKind::Not, tok, Extra::None));
                node.left.set(Some(operand));
                node
            }
            _ => self.parse_factor(),
        }
    }

    /// `factor := literal | ident | call | '(' expr ')'`
    fn parse_factor(&mut self) -> &'a Node<'a> {
        match self.cur.kind {
            TokenKind::LParen => {
                self.advance();
                let e = self.parse_expr();
                self.expect(TokenKind::RParen, "')'");
                e
            }
            TokenKind::IntLit => self.parse_int_literal(),
            TokenKind::FloatLit => self.parse_float_literal(),
            TokenKind::BoolLit => self.parse_bool_literal(),
            TokenKind::Ident => {
                let name_tok = self.cur;
                if self.peek.kind == TokenKind::LParen {
                    self.advance();
                    self.parse_call(name_tok)
                } else {
                    self.advance();
                    self.arena.alloc(Node::new(NodeKind::Ident, name_tok, Extra::Ident { decl: Cell::new(None) }))
                }
            }
            _ => {
                let tok = self.cur;
                self.post_error(
                    DiagnosticKind::UnexpectedToken {
                        expected: "an expression".to_string(),
                        found: format!("{:?}", self.cur.kind),
                    },
                    tok.pos,
                );
                if !matches!(self.cur.kind, TokenKind::Semi | TokenKind::RBrace | TokenKind::Eof) {
                    self.advance();
                }
                self.arena.alloc(Node::leaf(NodeKind::Error, tok))
            }
        }
    }

    fn parse_int_literal(&mut self) -> &'a Node<'a> {
        let tok = self.cur;
        let value = match tok.literal {
            Literal::UInt(v) => v,
            _ => 0,
        };
        self.advance();
        let node = self.arena.alloc(Node::new(NodeKind::IntLit, tok, Extra::Literal(Cell::new(LiteralValue::UInt(value)))));
        node.ty.set(Type::new(TypeKind::smallest_fitting_uint(value)));
        node
    }

    fn parse_float_literal(&mut self) -> &'a Node<'a> {
        let tok = self.cur;
        let value = match tok.literal {
            Literal::Float(f) => f,
            _ => 0.0,
        };
        self.advance();
        let node = self.arena.alloc(Node::new(NodeKind::FloatLit, tok, Extra::Literal(Cell::new(LiteralValue::Float(value)))));
        node.ty.set(Type::new(TypeKind::SoftFloat64));
        node
    }

    fn parse_bool_literal(&mut self) -> &'a Node<'a> {
        let tok = self.cur;
        let value = match tok.literal {
            Literal::Bool(b) => b,
            _ => false,
        };
        self.advance();
        let node = self.arena.alloc(Node::new(NodeKind::BoolLit, tok, Extra::Literal(Cell::new(LiteralValue::Bool(value)))));
        node.ty.set(Type::BOOL);
        node
    }

    /// `call := ident '(' [ expr { ',' expr } ] ')'`
    fn parse_call(&mut self, name_tok: &'a Token) -> &'a Node<'a> {
        self.expect(TokenKind::LParen, "'('");
        let mut args: Option<&'a Node<'a>> = None;
        let mut tail: Option<&'a Node<'a>> = None;
        if self.cur.kind != TokenKind::RParen {
            loop {
                let a = self.parse_expr();
                match tail {
                    None => args = Some(a),
                    Some(t) => t.next.set(Some(a)),
                }
                tail = Some(a);
                if self.cur.kind == TokenKind::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "')'");
        self.arena.alloc(Node::new(
            NodeKind::Call,
            name_tok,
            Extra::Call {
                callee_name: self.symbol_of(name_tok),
                resolved_decl: Cell::new(None),
                resolved_params: Cell::new(None),
                args: Cell::new(args),
                return_type: Cell::new(Type::UNKNOWN),
            },
        ))
    }
}

/// Convenience entry point: parses `source` to completion, posting any
/// diagnostics to `sink` and returning the `Program` root.
pub fn parse<'a>(
    source: &'a str,
    file: Symbol,
    arena: &'a Arena,
    interner: &mut Interner,
    sink: &mut MessageSink,
) -> &'a Node<'a> {
    let mut parser = Parser::new(source, file, arena, interner, sink);
    parser.parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeKind;

    fn parse_src(src: &str) -> (MessageSink, ()) {
        let arena = Arena::new("parser-test");
        let mut interner = Interner::new();
        let mut sink = MessageSink::new();
        let file = interner.intern("test.smm");
        let program = parse(src, file, &arena, &mut interner, &mut sink);
        assert_eq!(program.kind.get(), NodeKind::Program);
        (sink, ())
    }

    fn stmts_of<'a>(program: &'a Node<'a>) -> Vec<&'a Node<'a>> {
        let block = program.next.get().unwrap();
        let Extra::Block { stmts, .. } = &block.extra else { unreachable!() };
        let mut out = Vec::new();
        let mut cur = stmts.get();
        while let Some(n) = cur {
            out.push(n);
            cur = n.next.get();
        }
        out
    }

    #[test]
    fn parses_simple_var_decl() {
        let arena = Arena::new("t");
        let mut interner = Interner::new();
        let mut sink = MessageSink::new();
        let file = interner.intern("t.smm");
        let program = parse("x : Int32 = 5;", file, &arena, &mut interner, &mut sink);
        assert!(!sink.has_errors());
        let stmts = stmts_of(program);
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].kind.get(), NodeKind::Decl);
        assert_eq!(stmts[0].decl_declared_type(), Some(Type::new(TypeKind::Int32)));
        assert!(!stmts[0].decl_is_const());
    }

    #[test]
    fn parses_inferred_type_decl() {
        let arena = Arena::new("t");
        let mut interner = Interner::new();
        let mut sink = MessageSink::new();
        let file = interner.intern("t.smm");
        let program = parse("x : = 1 + 2.5;", file, &arena, &mut interner, &mut sink);
        assert!(!sink.has_errors());
        let stmts = stmts_of(program);
        assert_eq!(stmts[0].decl_declared_type(), Some(Type::UNKNOWN));
    }

    #[test]
    fn parses_const_decl() {
        let arena = Arena::new("t");
        let mut interner = Interner::new();
        let mut sink = MessageSink::new();
        let file = interner.intern("t.smm");
        let program = parse("pi :: 3.14;", file, &arena, &mut interner, &mut sink);
        assert!(!sink.has_errors());
        let stmts = stmts_of(program);
        assert!(stmts[0].decl_is_const());
    }

    #[test]
    fn parses_function_with_params_and_return() {
        let arena = Arena::new("t");
        let mut interner = Interner::new();
        let mut sink = MessageSink::new();
        let file = interner.intern("t.smm");
        let program = parse(
            "add : (a: Int32, b: Int32) -> Int32 { return a + b; }",
            file,
            &arena,
            &mut interner,
            &mut sink,
        );
        assert!(!sink.has_errors());
        let stmts = stmts_of(program);
        assert_eq!(stmts.len(), 1);
        let decl = stmts[0];
        assert_eq!(decl.kind.get(), NodeKind::Decl);
        let funcdef = decl.left.get().unwrap();
        assert_eq!(funcdef.kind.get(), NodeKind::FuncDef);
        let Extra::FuncDef { params, return_type, body, .. } = &funcdef.extra else { unreachable!() };
        assert_eq!(return_type.get(), Type::new(TypeKind::Int32));
        let p0 = params.get().unwrap();
        let Extra::Param { count, .. } = &p0.extra else { unreachable!() };
        assert_eq!(count.get(), 2);
        assert!(body.get().is_some());
    }

    #[test]
    fn parses_extern_function_without_body() {
        let arena = Arena::new("t");
        let mut interner = Interner::new();
        let mut sink = MessageSink::new();
        let file = interner.intern("t.smm");
        let program = parse("puts : (s: Int32) -> Void;", file, &arena, &mut interner, &mut sink);
        assert!(!sink.has_errors());
        let stmts = stmts_of(program);
        let funcdef = stmts[0].left.get().unwrap();
        let Extra::FuncDef { body, .. } = &funcdef.extra else { unreachable!() };
        assert!(body.get().is_none());
    }

    #[test]
    fn parses_if_else_and_while() {
        let arena = Arena::new("t");
        let mut interner = Interner::new();
        let mut sink = MessageSink::new();
        let file = interner.intern("t.smm");
        let program = parse(
            "if x then y = 1; else y = 2; while x do y = y + 1;",
            file,
            &arena,
            &mut interner,
            &mut sink,
        );
        assert!(!sink.has_errors());
        let stmts = stmts_of(program);
        assert_eq!(stmts[0].kind.get(), NodeKind::If);
        assert_eq!(stmts[1].kind.get(), NodeKind::While);
    }

    #[test]
    fn parses_call_with_args() {
        let arena = Arena::new("t");
        let mut interner = Interner::new();
        let mut sink = MessageSink::new();
        let file = interner.intern("t.smm");
        let program = parse("f(1, 2 + 3);", file, &arena, &mut interner, &mut sink);
        assert!(!sink.has_errors());
        let stmts = stmts_of(program);
        assert_eq!(stmts[0].kind.get(), NodeKind::Call);
    }

    #[test]
    fn precedence_mul_binds_tighter_than_add() {
        let arena = Arena::new("t");
        let mut interner = Interner::new();
        let mut sink = MessageSink::new();
        let file = interner.intern("t.smm");
        let program = parse("x = 1 + 2 * 3;", file, &arena, &mut interner, &mut sink);
        assert!(!sink.has_errors());
        let stmts = stmts_of(program);
        let rhs = stmts[0].right.get().unwrap();
        assert_eq!(rhs.kind.get(), NodeKind::Add);
        assert_eq!(rhs.right.get().unwrap().kind.get(), NodeKind::Mul);
    }

    #[test]
    fn unary_minus_binds_tighter_than_mul() {
        let arena = Arena::new("t");
        let mut interner = Interner::new();
        let mut sink = MessageSink::new();
        let file = interner.intern("t.smm");
        let program = parse("x = -a * b;", file, &arena, &mut interner, &mut sink);
        assert!(!sink.has_errors());
        let stmts = stmts_of(program);
        let rhs = stmts[0].right.get().unwrap();
        assert_eq!(rhs.kind.get(), NodeKind::Mul);
        assert_eq!(rhs.left.get().unwrap().kind.get(), NodeKind::Neg);
    }

    #[test]
    fn bang_parses_as_not_but_keeps_bang_token() {
        let arena = Arena::new("t");
        let mut interner = Interner::new();
        let mut sink = MessageSink::new();
        let file = interner.intern("t.smm");
        let program = parse("x = !a;", file, &arena, &mut interner, &mut sink);
        assert!(!sink.has_errors());
        let stmts = stmts_of(program);
        let rhs = stmts[0].right.get().unwrap();
        assert_eq!(rhs.kind.get(), NodeKind::Not);
        assert_eq!(rhs.token.kind, TokenKind::Bang);
    }

    #[test]
    fn missing_semicolon_reports_at_previous_line() {
        let (sink, _) = parse_src("x : Int32 = 5\ny : Int32 = 6;");
        assert!(sink.has_errors());
    }

    #[test]
    fn assignment_to_non_lvalue_is_reported() {
        let (sink, _) = parse_src("f() = 5;");
        assert!(sink.has_errors());
    }

    #[test]
    fn nested_blocks_push_and_pop_scope() {
        let arena = Arena::new("t");
        let mut interner = Interner::new();
        let mut sink = MessageSink::new();
        let file = interner.intern("t.smm");
        let program = parse("{ x : Int32 = 1; }", file, &arena, &mut interner, &mut sink);
        assert!(!sink.has_errors());
        let stmts = stmts_of(program);
        assert_eq!(stmts[0].kind.get(), NodeKind::Block);
    }
}
