//! Type inference.
//!
//! Walks the tree built by `parser` exactly once, resolving every
//! identifier and call against a scope chain kept in a [`Trie`] (the
//! same structure the lexer uses for keywords, reused here as the
//! "push on block entry, pop on exit" identifier dictionary), and
//! assigning every expression node a [`Type`]. Declarations with no
//! explicit type get one deduced from their initializer; function
//! overloads are resolved by exact match first, then by soft
//! (upcast-permitting) match. Diagnostics are best-effort: every
//! failure still leaves the node with *some* type (usually `Unknown`)
//! so later nodes can keep being checked instead of aborting the pass.

use crate::arena::Arena;
use crate::ast::{Extra, Node, NodeKind};
use crate::error::{DiagnosticKind, MessageSink};
use crate::intern::{Interner, Symbol};
use crate::trie::Trie;
use crate::types::{Type, TypeKind};

struct Infer<'a, 'b> {
    arena: &'a Arena,
    interner: &'b mut Interner,
    sink: &'b mut MessageSink,
    ident_dict: Trie<'a, &'a Node<'a>>,
    current_level: u32,
    /// Names ever pushed into `ident_dict`, kept around only to offer
    /// "did you mean" suggestions; never popped, so it may include
    /// names that have since gone out of scope (harmless — a stale
    /// suggestion is still better than none).
    known_names: Vec<Symbol>,
    /// Set while evaluating a const declaration's initializer: identifiers
    /// resolving to a variable or parameter are rejected with
    /// `NonConstInConstExpression` instead of silently taking a
    /// runtime value into what must be a compile-time-evaluable
    /// expression.
    accept_only_consts: bool,
}

/// Runs inference over `program`'s body, mutating every node's `ty`
/// (and, for identifiers, rewriting `kind` to `Const` where they
/// resolve to a constant) in place.
pub fn infer<'a>(program: &'a Node<'a>, arena: &'a Arena, interner: &mut Interner, sink: &mut MessageSink) {
    let mut inf = Infer {
        arena,
        interner,
        sink,
        ident_dict: Trie::new(arena),
        current_level: 0,
        known_names: Vec::new(),
        accept_only_consts: false,
    };
    let block = program.next.get().expect("program always has a body block");
    inf.process_global_symbols(block);
}

fn decl_is_func(decl: &Node) -> bool {
    matches!(decl.left.get().map(|l| l.kind.get()), Some(NodeKind::FuncDef))
}

fn decl_or_param_type(node: &Node) -> Type {
    match node.kind.get() {
        NodeKind::Param => node.ty.get(),
        _ => node.decl_declared_type().unwrap_or(Type::UNKNOWN),
    }
}

/// Common type of two operand types. Float (and `SoftFloat64`, ranked
/// above every concrete float) always wins by promotion rank; two ints
/// of matching signedness widen to the larger; mixed signedness widens
/// to a signed type wide enough to hold the unsigned operand's range,
/// falling back to `Int64` for `UInt64` (callers emit
/// `ComparingSignedAndUnsigned` separately where that matters).
pub(crate) fn common_type(a: Type, b: Type) -> Type {
    // Bool widens to UInt8 before anything else: a bool used as an
    // arithmetic operand is an 8-bit unsigned 0/1, not a distinct rank.
    let a = if a.is_bool() { Type::new(TypeKind::UInt8) } else { a };
    let b = if b.is_bool() { Type::new(TypeKind::UInt8) } else { b };
    if a == b {
        return a;
    }
    if a.is_float() || b.is_float() {
        return if a.rank_cmp(b) == std::cmp::Ordering::Less { b } else { a };
    }
    if a.is_unsigned() == b.is_unsigned() {
        return if a.size_bytes() >= b.size_bytes() { a } else { b };
    }
    let (u, s) = if a.is_unsigned() { (a, b) } else { (b, a) };
    if s.size_bytes() > u.size_bytes() {
        return s;
    }
    Type::new(match u.kind {
        TypeKind::UInt8 => TypeKind::Int16,
        TypeKind::UInt16 => TypeKind::Int32,
        TypeKind::UInt32 => TypeKind::Int64,
        TypeKind::UInt64 => TypeKind::Int64,
        _ => unreachable!(),
    })
}

/// Widens a freshly-inferred type the way a declaration with no
/// explicit type annotation does: an initializer that is itself a
/// named thing — an identifier, a
/// parameter, a call result — keeps exactly the type it already
/// carries, since that type is declared somewhere else. Everything
/// else (a literal, a computed expression) widens one step so the
/// declared variable never ends up narrower than the machine's
/// natural register width, and a bare float literal's `SoftFloat64`
/// never survives into a declared type.
fn deduce_type_from(initializer: &Node, inferred: Type) -> Type {
    if inferred.is_unknown() || matches!(initializer.kind.get(), NodeKind::Ident | NodeKind::Const | NodeKind::Param | NodeKind::Call) {
        return inferred;
    }
    Type::new(match inferred.kind {
        TypeKind::SoftFloat64 => TypeKind::Float32,
        TypeKind::Int8 | TypeKind::Int16 => TypeKind::Int32,
        TypeKind::UInt8 | TypeKind::UInt16 => TypeKind::UInt32,
        other => other,
    })
}

/// Whether a value of type `from` can be passed where `to` is expected
/// without an explicit cast: wider
/// same-signedness ints, ints into any float, `Float32` into
/// `Float64`, and `SoftFloat64` into either concrete float.
fn is_upcast_possible(from: Type, to: Type) -> bool {
    if from == to {
        return true;
    }
    if from.is_int() && to.is_int() {
        return from.is_unsigned() == to.is_unsigned() && to.size_bytes() >= from.size_bytes();
    }
    if from.is_int() && to.is_float() {
        return true;
    }
    if from.kind == TypeKind::SoftFloat64 && to.is_float() {
        return true;
    }
    if from.kind == TypeKind::Float32 && to.kind == TypeKind::Float64 {
        return true;
    }
    false
}

impl<'a, 'b> Infer<'a, 'b> {
    fn key_bytes(&self, sym: Symbol) -> &'a [u8] {
        self.arena.alloc_str(self.interner.resolve(sym)).as_bytes()
    }

    fn visible_names(&self) -> Vec<&str> {
        self.known_names.iter().map(|s| self.interner.resolve(*s)).collect()
    }

    // ---- scope registration -----------------------------------------

    /// Registers a var/const declaration's name in the current scope,
    /// reporting same-scope redefinition (shadowing an outer scope is
    /// fine and not reported).
    fn add_decl_if_new(&mut self, level: u32, decl: &'a Node<'a>) {
        let name = decl.decl_name().expect("var/const decl always has a name");
        let key = self.key_bytes(name);
        if let Some(existing) = self.ident_dict.get(key) {
            if existing.decl_level() == Some(level) {
                let name_str = self.interner.resolve(name).to_string();
                if decl_is_func(existing) {
                    self.sink.push(DiagnosticKind::IdentTaken { name: name_str, taken_as: "function".to_string() }, decl.token.pos);
                } else {
                    self.sink.push(DiagnosticKind::Redefinition { name: name_str }, decl.token.pos);
                }
            }
        }
        self.ident_dict.push(key, decl);
        self.known_names.push(name);
    }

    fn params_match_exactly(a: &'a Node<'a>, b: &'a Node<'a>) -> bool {
        let Extra::FuncDef { params: pa, .. } = &a.extra else { return false };
        let Extra::FuncDef { params: pb, .. } = &b.extra else { return false };
        let mut x = pa.get();
        let mut y = pb.get();
        loop {
            match (x, y) {
                (None, None) => return true,
                (Some(px), Some(py)) => {
                    if px.ty.get() != py.ty.get() {
                        return false;
                    }
                    x = px.next.get();
                    y = py.next.get();
                }
                _ => return false,
            }
        }
    }

    /// Registers a function declaration, chaining it onto an existing
    /// overload set by name or starting a new one. An exact parameter-
    /// type match against an existing overload is a `FuncRedefinition`,
    /// not a new overload.
    fn register_func_decl(&mut self, decl: &'a Node<'a>) {
        let name = decl.decl_name().expect("func decl always has a name");
        let key = self.key_bytes(name);
        let funcdef = decl.left.get().expect("func decl wraps a FuncDef");
        match self.ident_dict.get(key) {
            None => {
                self.ident_dict.push(key, decl);
                self.known_names.push(name);
            }
            Some(existing) => {
                if !decl_is_func(existing) {
                    let name_str = self.interner.resolve(name).to_string();
                    self.sink.push(DiagnosticKind::IdentTaken { name: name_str, taken_as: "variable".to_string() }, decl.token.pos);
                    return;
                }
                let mut cur = existing.left.get().expect("func decl wraps a FuncDef");
                loop {
                    if Self::params_match_exactly(cur, funcdef) {
                        let name_str = self.interner.resolve(name).to_string();
                        self.sink.push(DiagnosticKind::FuncRedefinition { name: name_str }, decl.token.pos);
                        return;
                    }
                    let Extra::FuncDef { next_overload, .. } = &cur.extra else { unreachable!() };
                    match next_overload.get() {
                        Some(n) => cur = n,
                        None => {
                            next_overload.set(Some(funcdef));
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Mangles `name` against `params` into the arena's scratch buffer
    /// and interns the result:
    /// `name` + `_` + each parameter type's display name, in order.
    fn mangle_name(&mut self, name: Symbol, params: Option<&'a Node<'a>>) -> Symbol {
        let name_str = self.interner.resolve(name).to_string();
        let mut count = 0usize;
        let mut p = params;
        while let Some(param) = p {
            count += 1;
            p = param.next.get();
        }
        let max_len = name_str.len() + count * (1 + 11);
        let buf = self.arena.start_alloc(max_len);
        let mut len = 0usize;
        for b in name_str.as_bytes() {
            buf[len] = *b;
            len += 1;
        }
        let mut p = params;
        while let Some(param) = p {
            buf[len] = b'_';
            len += 1;
            for b in param.ty.get().name().as_bytes() {
                buf[len] = *b;
                len += 1;
            }
            p = param.next.get();
        }
        self.arena.end_alloc(len);
        let mangled = std::str::from_utf8(&buf[..len]).expect("ASCII mangled name");
        self.interner.intern(mangled)
    }

    // ---- global / local declaration processing ------------------------

    fn process_global_symbols(&mut self, block: &'a Node<'a>) {
        let Extra::Block { scope, .. } = &block.extra else { unreachable!() };

        let mut d = scope.scope_decls();
        while let Some(decl) = d {
            if decl_is_func(decl) {
                self.register_func_decl(decl);
            }
            d = decl.decl_next();
        }

        let mut d = scope.scope_decls();
        while let Some(decl) = d {
            if !decl_is_func(decl) && decl.decl_is_const() {
                self.add_decl_if_new(0, decl);
            }
            d = decl.decl_next();
        }

        self.process_block_stmts(block);

        let mut d = scope.scope_decls();
        while let Some(decl) = d {
            if decl_is_func(decl) {
                self.process_func_decl_body(decl);
            }
            d = decl.decl_next();
        }
    }

    fn process_func_decl_body(&mut self, decl: &'a Node<'a>) {
        let funcdef = decl.left.get().expect("func decl wraps a FuncDef");
        let Extra::FuncDef { params, body, mangled_name, .. } = &funcdef.extra else { unreachable!() };
        let name = decl.decl_name().unwrap();
        let mangled = self.mangle_name(name, params.get());
        mangled_name.set(Some(mangled));

        let Some(body) = body.get() else { return };

        let mut p = params.get();
        while let Some(param) = p {
            let pname = param.token.repr.symbol().unwrap_or(Symbol::EMPTY);
            self.ident_dict.push(self.key_bytes(pname), param);
            p = param.next.get();
        }

        self.process_block(body, 1);

        let mut p = params.get();
        while let Some(param) = p {
            let pname = param.token.repr.symbol().unwrap_or(Symbol::EMPTY);
            self.ident_dict.pop(self.key_bytes(pname));
            p = param.next.get();
        }
    }

    /// Pre-registers every `const` in `scope` (not yet evaluated) so
    /// forward references within the same scope resolve; vars only
    /// become visible when the main statement walk reaches their own
    /// declaration (use-before-declare enforcement).
    fn process_local_symbols(&mut self, scope: &'a Node<'a>, level: u32) {
        let mut d = scope.scope_decls();
        while let Some(decl) = d {
            if decl.decl_is_const() {
                self.add_decl_if_new(level, decl);
            }
            d = decl.decl_next();
        }
    }

    fn process_block(&mut self, block: &'a Node<'a>, level: u32) {
        let prev_level = self.current_level;
        self.current_level = level;
        let Extra::Block { scope, .. } = &block.extra else { unreachable!() };
        self.process_local_symbols(scope, level);
        self.process_block_stmts(block);

        let mut d = scope.scope_decls();
        while let Some(decl) = d {
            let name = decl.decl_name().unwrap();
            self.ident_dict.pop(self.key_bytes(name));
            d = decl.decl_next();
        }
        self.current_level = prev_level;
    }

    /// Walks a block's statement chain, flagging the first statement
    /// that follows an unconditional `return` as `UnreachableCode`.
    /// Only the first offender per block is reported, the
    /// same "don't pile on" restraint `post_error`'s `last_error_line`
    /// applies within a single line.
    fn process_block_stmts(&mut self, block: &'a Node<'a>) {
        let Extra::Block { stmts, .. } = &block.extra else { unreachable!() };
        let mut s = stmts.get();
        let mut terminated = false;
        let mut reported = false;
        while let Some(stmt) = s {
            if terminated && !reported {
                self.sink.push(DiagnosticKind::UnreachableCode, stmt.token.pos);
                reported = true;
            }
            self.process_statement(stmt);
            if stmt.kind.get() == NodeKind::Return {
                terminated = true;
            }
            s = stmt.next.get();
        }
    }

    fn process_declaration_with_expr(&mut self, decl: &'a Node<'a>) -> Type {
        if decl.decl_processed() {
            return decl.decl_declared_type().unwrap_or(Type::UNKNOWN);
        }
        if decl.decl_being_processed() {
            let name = self.interner.resolve(decl.decl_name().unwrap()).to_string();
            self.sink.push(DiagnosticKind::CircularDefinition { name }, decl.token.pos);
            if let Extra::Decl { declared_type, .. } = &decl.extra {
                declared_type.set(Type::UNKNOWN);
            }
            decl.decl_set_processed(true);
            return Type::UNKNOWN;
        }
        decl.decl_set_being_processed(true);
        let assign = decl.left.get().expect("var/const decl wraps an Assign");
        let expr = assign.right.get().expect("decl assignment always has an initializer");
        let prev_accept_only_consts = self.accept_only_consts;
        self.accept_only_consts = decl.decl_is_const();
        let expr_ty = self.process_expression(expr);
        self.accept_only_consts = prev_accept_only_consts;
        let declared = decl.decl_declared_type().unwrap_or(Type::UNKNOWN);
        let final_ty = if declared.is_unknown() { deduce_type_from(expr, expr_ty) } else { declared };
        if let Extra::Decl { declared_type, .. } = &decl.extra {
            declared_type.set(final_ty);
        }
        decl.decl_set_being_processed(false);
        decl.decl_set_processed(true);
        final_ty
    }

    // ---- statements --------------------------------------------------

    fn process_statement(&mut self, stmt: &'a Node<'a>) {
        match stmt.kind.get() {
            NodeKind::Decl => {
                if decl_is_func(stmt) {
                    // A function declared below global scope already got a
                    // `FuncDeclaredUnderScope` diagnostic from the parser;
                    // it has no initializer to type-check, so there's
                    // nothing left for inference to do with it here.
                } else if stmt.decl_is_const() {
                    if !stmt.decl_processed() {
                        self.process_declaration_with_expr(stmt);
                    }
                } else {
                    self.add_decl_if_new(self.current_level, stmt);
                    self.process_declaration_with_expr(stmt);
                }
            }
            NodeKind::Assign => self.process_assignment(stmt),
            NodeKind::Return => self.process_return(stmt),
            NodeKind::If | NodeKind::While => self.process_if_while(stmt),
            NodeKind::Block => self.process_block(stmt, self.current_level + 1),
            _ => {
                self.process_expression(stmt);
                if stmt.kind.get() != NodeKind::Call {
                    self.sink.push(DiagnosticKind::StatementHasNoEffect, stmt.token.pos);
                }
            }
        }
    }

    fn process_assignment(&mut self, stmt: &'a Node<'a>) {
        let ident = stmt.left.get().expect("assignment always has a target");
        let rhs = stmt.right.get().expect("assignment always has a value");
        let rhs_ty = self.process_expression(rhs);

        let name_sym = ident.token.repr.symbol().unwrap_or(Symbol::EMPTY);
        let key = self.key_bytes(name_sym);
        match self.ident_dict.get(key) {
            None => {
                let candidates = self.visible_names();
                self.sink.undefined_identifier(ident.token.text(self.interner), &candidates, ident.token.pos);
                ident.ty.set(Type::UNKNOWN);
            }
            Some(decl) => {
                if let Extra::Ident { decl: c } = &ident.extra {
                    c.set(Some(decl));
                }
                if decl.decl_is_const() {
                    let name_str = self.interner.resolve(name_sym).to_string();
                    self.sink.push(DiagnosticKind::CannotAssignToConst { name: name_str }, ident.token.pos);
                }
                ident.ty.set(decl_or_param_type(decl));
            }
        }
        stmt.ty.set(rhs_ty);
    }

    fn process_return(&mut self, stmt: &'a Node<'a>) {
        let expected = stmt.ty.get();
        match stmt.left.get() {
            Some(expr) => {
                let got = self.process_expression(expr);
                if expected.is_void() {
                    self.sink.push(DiagnosticKind::NoReturnValueNeeded, stmt.token.pos);
                } else if !types_compatible(got, expected) {
                    self.sink.push(
                        DiagnosticKind::BadReturnType { got: got.name().to_string(), expected: expected.name().to_string() },
                        stmt.token.pos,
                    );
                }
            }
            None => {
                if !expected.is_void() {
                    self.sink.push(DiagnosticKind::FuncMustReturnValue, stmt.token.pos);
                }
            }
        }
    }

    fn process_if_while(&mut self, stmt: &'a Node<'a>) {
        let Extra::IfWhile { cond, body, else_body } = &stmt.extra else { unreachable!() };
        self.process_expression(cond.get());
        self.process_statement(body.get());
        if let Some(e) = else_body.get() {
            self.process_statement(e);
        }
    }

    // ---- expressions ---------------------------------------------------

    fn process_expression(&mut self, node: &'a Node<'a>) -> Type {
        let ty = match node.kind.get() {
            NodeKind::IntLit | NodeKind::FloatLit | NodeKind::BoolLit | NodeKind::Error => node.ty.get(),
            NodeKind::Ident | NodeKind::Const => self.process_ident(node),
            NodeKind::Neg => self.process_neg(node),
            NodeKind::Not => self.process_not(node),
            NodeKind::Call => self.process_call(node),
            k if k.is_bin_op() => self.process_binop(node),
            _ => node.ty.get(),
        };
        node.ty.set(ty);
        ty
    }

    fn process_ident(&mut self, node: &'a Node<'a>) -> Type {
        let name_sym = node.token.repr.symbol().unwrap_or(Symbol::EMPTY);
        let key = self.key_bytes(name_sym);
        match self.ident_dict.get(key) {
            Some(decl) if decl_is_func(decl) => {
                // A function name used as a bare value rather than called;
                // this language has no function-pointer type.
                self.sink.push(DiagnosticKind::InvalidExprUsed, node.token.pos);
                Type::UNKNOWN
            }
            Some(decl) => {
                if decl.decl_is_const() && !decl.decl_processed() {
                    self.process_declaration_with_expr(decl);
                }
                if self.accept_only_consts && !decl.decl_is_const() {
                    self.sink.push(DiagnosticKind::NonConstInConstExpression, node.token.pos);
                    return Type::UNKNOWN;
                }
                if let Extra::Ident { decl: c } = &node.extra {
                    c.set(Some(decl));
                }
                if decl.decl_is_const() {
                    node.kind.set(NodeKind::Const);
                }
                decl_or_param_type(decl)
            }
            None => {
                let candidates = self.visible_names();
                self.sink.undefined_identifier(node.token.text(self.interner), &candidates, node.token.pos);
                Type::UNKNOWN
            }
        }
    }

    fn process_neg(&mut self, node: &'a Node<'a>) -> Type {
        let inner = self.process_expression(node.left.get().expect("Neg always has an operand"));
        if inner.is_unsigned() {
            Type::new(inner.kind.to_signed())
        } else if inner.is_int() || inner.is_float() {
            inner
        } else {
            self.sink.push(
                DiagnosticKind::BadOperandsType { operator: "-".to_string(), got_type: inner.name().to_string() },
                node.token.pos,
            );
            Type::UNKNOWN
        }
    }

    fn process_not(&mut self, node: &'a Node<'a>) -> Type {
        use crate::token::TokenKind;
        if node.token.kind == TokenKind::Bang {
            self.sink.push(DiagnosticKind::BangUsedAsNot, node.token.pos);
        }
        self.process_expression(node.left.get().expect("Not always has an operand"));
        Type::BOOL
    }

    fn process_binop(&mut self, node: &'a Node<'a>) -> Type {
        let l = self.process_expression(node.left.get().expect("binop always has a left operand"));
        let r = self.process_expression(node.right.get().expect("binop always has a right operand"));
        let kind = node.kind.get();

        if kind.is_comparison() {
            if l.is_int() && r.is_int() && l.is_unsigned() != r.is_unsigned() {
                self.sink.push(DiagnosticKind::ComparingSignedAndUnsigned, node.token.pos);
            }
            return Type::BOOL;
        }
        if matches!(kind, NodeKind::And | NodeKind::Or | NodeKind::Xor) {
            if !l.is_bool() || !r.is_bool() {
                self.sink.push(
                    DiagnosticKind::BadOperandsType {
                        operator: format!("{kind:?}"),
                        got_type: format!("{} and {}", l.name(), r.name()),
                    },
                    node.token.pos,
                );
            }
            return Type::BOOL;
        }
        if kind == NodeKind::FDiv {
            return if l.is_float() || r.is_float() {
                common_type(l, r)
            } else if l.is_int() && r.is_int() {
                Type::new(TypeKind::SoftFloat64)
            } else {
                self.sink.push(
                    DiagnosticKind::BadOperandsType { operator: "/".to_string(), got_type: format!("{} and {}", l.name(), r.name()) },
                    node.token.pos,
                );
                Type::UNKNOWN
            };
        }
        if matches!(kind, NodeKind::SDiv | NodeKind::SRem) {
            if !l.is_int() || !r.is_int() {
                self.sink.push(
                    DiagnosticKind::BadOperandsType {
                        operator: if kind == NodeKind::SDiv { "div".to_string() } else { "mod".to_string() },
                        got_type: format!("{} and {}", l.name(), r.name()),
                    },
                    node.token.pos,
                );
                return Type::UNKNOWN;
            }
            let result = common_type(l, r);
            node.kind.set(if result.is_unsigned() { kind.to_unsigned_variant() } else { kind });
            return result;
        }
        // Add, Sub, Mul: shift to float variant when either side is float.
        if l.is_float() || r.is_float() {
            node.kind.set(kind.to_float_variant());
            return common_type(l, r);
        }
        if l.is_int() && r.is_int() {
            return common_type(l, r);
        }
        self.sink.push(
            DiagnosticKind::BadOperandsType { operator: format!("{kind:?}"), got_type: format!("{} and {}", l.name(), r.name()) },
            node.token.pos,
        );
        Type::UNKNOWN
    }

    fn process_call(&mut self, node: &'a Node<'a>) -> Type {
        let Extra::Call { callee_name, resolved_decl, resolved_params, args, return_type } = &node.extra else {
            unreachable!()
        };
        let mut arg_types: Vec<Type> = Vec::new();
        let mut arg_nodes: Vec<&'a Node<'a>> = Vec::new();
        let mut a = args.get();
        while let Some(arg) = a {
            arg_types.push(self.process_expression(arg));
            arg_nodes.push(arg);
            a = arg.next.get();
        }

        let key = self.key_bytes(*callee_name);
        let decl = match self.ident_dict.get(key) {
            Some(d) => d,
            None => {
                let candidates = self.visible_names();
                self.sink.undefined_identifier(node.token.text(self.interner), &candidates, node.token.pos);
                return_type.set(Type::UNKNOWN);
                return Type::UNKNOWN;
            }
        };
        if !decl_is_func(decl) {
            let name_str = self.interner.resolve(*callee_name).to_string();
            self.sink.push(DiagnosticKind::NotAFunction { name: name_str }, node.token.pos);
            return_type.set(Type::UNKNOWN);
            return Type::UNKNOWN;
        }

        match self.resolve_call(decl, &arg_types, &arg_nodes) {
            Some(funcdef) => {
                resolved_decl.set(Some(decl));
                let Extra::FuncDef { params, return_type: rt, .. } = &funcdef.extra else { unreachable!() };
                resolved_params.set(params.get());
                return_type.set(rt.get());
                rt.get()
            }
            None => {
                let name_str = self.interner.resolve(*callee_name).to_string();
                let got_sig = crate::error::format_call_signature(&name_str, &arg_types.iter().map(|t| t.name()).collect::<Vec<_>>());
                let expected_sigs = self.format_overloads(decl, &name_str);
                self.sink.push(DiagnosticKind::GotBadArgs { got_sig, expected_sigs }, node.token.pos);
                return_type.set(Type::UNKNOWN);
                Type::UNKNOWN
            }
        }
    }

    fn format_overloads(&self, decl: &'a Node<'a>, name: &str) -> String {
        let mut sigs: Vec<Vec<&str>> = Vec::new();
        let mut cur = decl.left.get();
        while let Some(funcdef) = cur {
            let Extra::FuncDef { params, next_overload, .. } = &funcdef.extra else { break };
            let mut types = Vec::new();
            let mut p = params.get();
            while let Some(param) = p {
                types.push(param.ty.get().name());
                p = param.next.get();
            }
            sigs.push(types);
            cur = next_overload.get();
        }
        crate::error::format_candidate_signatures(name, &sigs)
    }

    /// Exact match first, then soft (upcast-permitting) match, across
    /// the full overload chain. An exact match returns immediately; a
    /// soft match is remembered but the walk continues, so a later
    /// overload's soft match overwrites an earlier one rather than the
    /// first candidate winning outright.
    fn resolve_call(&self, decl: &'a Node<'a>, arg_types: &[Type], arg_nodes: &[&'a Node<'a>]) -> Option<&'a Node<'a>> {
        let first = decl.left.get()?;
        let mut soft_candidate: Option<&'a Node<'a>> = None;
        let mut cur = Some(first);
        while let Some(funcdef) = cur {
            if Self::params_match_types(funcdef, arg_types, arg_nodes, false) {
                return Some(funcdef);
            }
            if Self::params_match_types(funcdef, arg_types, arg_nodes, true) {
                soft_candidate = Some(funcdef);
            }
            let Extra::FuncDef { next_overload, .. } = &funcdef.extra else { break };
            cur = next_overload.get();
        }
        soft_candidate
    }

    fn params_match_types(funcdef: &'a Node<'a>, arg_types: &[Type], arg_nodes: &[&'a Node<'a>], allow_upcast: bool) -> bool {
        let Extra::FuncDef { params, .. } = &funcdef.extra else { return false };
        let mut p = params.get();
        for (&arg_ty, &arg_node) in arg_types.iter().zip(arg_nodes) {
            let Some(param) = p else { return false };
            let param_ty = param.ty.get();
            let ok = if allow_upcast {
                is_upcast_possible(arg_ty, param_ty) || literal_matches_signed_param(arg_node, arg_ty, param_ty)
            } else {
                arg_ty == param_ty
            };
            if !ok {
                return false;
            }
            p = param.next.get();
        }
        p.is_none()
    }
}

/// A non-negative int-literal argument may match a signed parameter
/// one size class up from its own unsigned kind even though its own
/// type is unsigned: the lexer always types a positive integer literal
/// as the smallest-fitting *unsigned* kind, so a literal like `1000`
/// is `UInt16` even though it fits comfortably in an `Int32` parameter.
fn literal_matches_signed_param(arg: &Node, arg_ty: Type, param_ty: Type) -> bool {
    if arg.kind.get() != NodeKind::IntLit || !arg_ty.is_unsigned() || !param_ty.is_int() || param_ty.is_unsigned() {
        return false;
    }
    let signed_sibling = Type::new(arg_ty.kind.to_signed());
    is_upcast_possible(signed_sibling, param_ty)
}

fn types_compatible(a: Type, b: Type) -> bool {
    a == b || (a.is_int() && b.is_int()) || (a.is_float() && b.is_float()) || (a.is_bool() && b.is_bool())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn run(src: &str) -> (Arena, Interner, MessageSink) {
        let arena = Arena::new("infer-test");
        let mut interner = Interner::new();
        let mut sink = MessageSink::new();
        let file = interner.intern("t.smm");
        let program = parse(src, file, &arena, &mut interner, &mut sink);
        infer(program, &arena, &mut interner, &mut sink);
        (arena, interner, sink)
    }

    fn first_stmt_type(src: &str) -> (Type, MessageSink) {
        let arena = Arena::new("infer-test");
        let mut interner = Interner::new();
        let mut sink = MessageSink::new();
        let file = interner.intern("t.smm");
        let program = parse(src, file, &arena, &mut interner, &mut sink);
        infer(program, &arena, &mut interner, &mut sink);
        let block = program.next.get().unwrap();
        let Extra::Block { stmts, .. } = &block.extra else { unreachable!() };
        let decl = stmts.get().unwrap();
        (decl.decl_declared_type().unwrap(), sink)
    }

    #[test]
    fn int_plus_float_literal_deduces_float32() {
        let (ty, sink) = first_stmt_type("x : = 1 + 2.5;");
        assert!(!sink.has_errors());
        assert_eq!(ty.kind, TypeKind::Float32);
    }

    #[test]
    fn deduced_narrow_int_widens_to_int32() {
        let (ty, sink) = first_stmt_type("x : = 5;");
        assert!(!sink.has_errors());
        assert_eq!(ty.kind, TypeKind::Int32);
    }

    #[test]
    fn deduced_type_from_identifier_copies_verbatim() {
        let arena = Arena::new("infer-test");
        let mut interner = Interner::new();
        let mut sink = MessageSink::new();
        let file = interner.intern("t.smm");
        let program = parse("a : UInt8 = 5; x : = a;", file, &arena, &mut interner, &mut sink);
        infer(program, &arena, &mut interner, &mut sink);
        assert!(!sink.has_errors());
        let block = program.next.get().unwrap();
        let Extra::Block { stmts, .. } = &block.extra else { unreachable!() };
        let second = stmts.get().unwrap().next.get().unwrap();
        assert_eq!(second.decl_declared_type().unwrap().kind, TypeKind::UInt8);
    }

    #[test]
    fn explicit_type_is_kept_over_deduced() {
        let (ty, sink) = first_stmt_type("x : Int32 = 5;");
        assert!(!sink.has_errors());
        assert_eq!(ty.kind, TypeKind::Int32);
    }

    #[test]
    fn undefined_identifier_reports_error() {
        let (_arena, _interner, sink) = run("x = y + 1;");
        assert!(sink.has_errors());
    }

    #[test]
    fn const_forward_reference_resolves() {
        let (_arena, _interner, sink) = run("a :: b + 1; b :: 2;");
        assert!(!sink.has_errors());
    }

    #[test]
    fn circular_constant_definition_is_detected() {
        let (_arena, _interner, sink) = run("a :: b; b :: a;");
        assert!(sink.diagnostics().iter().any(|d| matches!(d.kind, DiagnosticKind::CircularDefinition { .. })));
    }

    #[test]
    fn same_scope_redefinition_is_reported() {
        let (_arena, _interner, sink) = run("x : Int32 = 1; x : Int32 = 2;");
        assert!(sink.diagnostics().iter().any(|d| matches!(d.kind, DiagnosticKind::Redefinition { .. })));
    }

    #[test]
    fn var_used_before_its_declaration_is_undefined() {
        let (_arena, _interner, sink) = run("x = y; y : Int32 = 1;");
        assert!(sink.has_errors());
    }

    #[test]
    fn overload_resolution_picks_exact_match() {
        let src = "f : (a: Int32) -> Int32 { return a; } f : (a: Float64) -> Float64 { return a; } x = f(1);";
        let (_arena, _interner, sink) = run(src);
        assert!(!sink.has_errors());
    }

    #[test]
    fn bad_call_args_report_candidates() {
        let src = "f : (a: Int32) -> Int32 { return a; } x : = f(true);";
        let (_arena, _interner, sink) = run(src);
        assert!(sink.diagnostics().iter().any(|d| matches!(d.kind, DiagnosticKind::GotBadArgs { .. })));
    }

    #[test]
    fn signed_unsigned_comparison_warns() {
        let src = "a : UInt32 = 1; b : Int32 = 2; x = (a == b);";
        let (_arena, _interner, sink) = run(src);
        assert!(sink.diagnostics().iter().any(|d| matches!(d.kind, DiagnosticKind::ComparingSignedAndUnsigned)));
    }

    #[test]
    fn bang_used_as_not_is_flagged() {
        let (_arena, _interner, sink) = run("a : Bool = true; x = !a;");
        assert!(sink.diagnostics().iter().any(|d| matches!(d.kind, DiagnosticKind::BangUsedAsNot)));
    }

    #[test]
    fn variable_in_const_initializer_is_rejected() {
        let (_arena, _interner, sink) = run("v : Int32 = 1; c :: v + 1;");
        assert!(sink.diagnostics().iter().any(|d| matches!(d.kind, DiagnosticKind::NonConstInConstExpression)));
    }

    #[test]
    fn param_in_const_initializer_is_rejected() {
        let src = "f : (a: Int32) -> Int32 { c :: a + 1; return c; }";
        let (_arena, _interner, sink) = run(src);
        assert!(sink.diagnostics().iter().any(|d| matches!(d.kind, DiagnosticKind::NonConstInConstExpression)));
    }

    #[test]
    fn const_referencing_another_const_is_fine() {
        let (_arena, _interner, sink) = run("a :: 1; b :: a + 1;");
        assert!(!sink.diagnostics().iter().any(|d| matches!(d.kind, DiagnosticKind::NonConstInConstExpression)));
    }

    #[test]
    fn statement_after_return_is_unreachable() {
        let src = "f : () -> Int32 { return 1; x : Int32 = 2; }";
        let (_arena, _interner, sink) = run(src);
        assert!(sink.diagnostics().iter().any(|d| matches!(d.kind, DiagnosticKind::UnreachableCode)));
    }

    #[test]
    fn only_first_statement_after_return_is_flagged() {
        let src = "f : () -> Int32 { return 1; x : Int32 = 2; y : Int32 = 3; }";
        let (_arena, _interner, sink) = run(src);
        let count = sink.diagnostics().iter().filter(|d| matches!(d.kind, DiagnosticKind::UnreachableCode)).count();
        assert_eq!(count, 1);
    }

    #[test]
    fn no_unreachable_code_without_a_preceding_return() {
        let (_arena, _interner, sink) = run("x : Int32 = 1; y : Int32 = 2;");
        assert!(!sink.diagnostics().iter().any(|d| matches!(d.kind, DiagnosticKind::UnreachableCode)));
    }
}
