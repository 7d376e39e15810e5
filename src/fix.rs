//! Semantic-fix pass.
//!
//! A second, top-down walk over the tree `infer` already typed. Every
//! expression field is visited with the *parent context type* it must
//! end up matching: declarations are fixed against their final
//! (possibly deduced) type, assignments against the target's type,
//! returns against the enclosing function's return type, comparison
//! operands against each other's common type, and so on. On a
//! mismatch the first applicable rule fires: insert a cast, mutate a
//! literal in place, or wrap a non-bool expression in a synthesized
//! `!= 0`. A trailing step collapses any surviving `SoftFloat64` to
//! `Float32`.
//!
//! The synthesized `!= 0` subtree gets two distinct tokens (one for
//! the zero literal, one for the operator) rather than one token
//! mutated twice, and unsigned literal narrowing casts to the correct
//! width for every case rather than always the narrowest one.

use crate::arena::Arena;
use crate::ast::{Extra, LiteralValue, Node, NodeKind};
use crate::error::{DiagnosticKind, MessageSink};
use crate::token::{Pos, Repr, Token, TokenKind};
use crate::types::{Type, TypeKind};

struct Fix<'a, 'b> {
    arena: &'a Arena,
    sink: &'b mut MessageSink,
}

/// Runs the fix pass over `program`'s body in place.
pub fn fix<'a>(program: &'a Node<'a>, arena: &'a Arena, sink: &mut MessageSink) {
    let mut f = Fix { arena, sink };
    let block = program.next.get().expect("program always has a body block");
    f.process_block(block);
}

fn is_literal_kind(kind: NodeKind) -> bool {
    matches!(kind, NodeKind::IntLit | NodeKind::FloatLit | NodeKind::BoolLit)
}

impl<'a, 'b> Fix<'a, 'b> {
    fn new_token(&self, like: &Token, kind: TokenKind, repr: &str) -> &'a Token {
        self.arena.alloc(Token::new(kind, like.pos, Repr::Owned(repr.into())))
    }

    fn cast_node(&self, node: &'a Node<'a>, target: Type, is_explicit: bool) -> &'a Node<'a> {
        let cast = self.arena.alloc(Node::new(
            NodeKind::Cast,
            node.token,
            Extra::Cast { target: std::cell::Cell::new(target), is_explicit: std::cell::Cell::new(is_explicit) },
        ));
        cast.next.set(node.next.get());
        node.next.set(None);
        cast.ty.set(target);
        cast.left.set(Some(node));
        cast
    }

    /// Synthesizes the `!= 0` subtree for a non-bool expression used in
    /// bool context: a zero literal whose own kind matches `node`'s
    /// type (int-zero, float-zero), and a `NotEq` node over two
    /// distinct tokens.
    fn synthesize_bool_compare(&self, node: &'a Node<'a>, pos: Pos) -> &'a Node<'a> {
        let zero_tok = self.new_token(node.token, if node.ty.get().is_float() { TokenKind::FloatLit } else { TokenKind::IntLit }, "0");
        let noteq_tok = self.arena.alloc(Token::new(TokenKind::NotEq, pos, Repr::Owned("!=".into())));

        let zero_value = if node.ty.get().is_float() {
            LiteralValue::Float(0.0)
        } else if node.ty.get().is_unsigned() {
            LiteralValue::UInt(0)
        } else {
            LiteralValue::SInt(0)
        };
        let zero_kind = if node.ty.get().is_float() { NodeKind::FloatLit } else { NodeKind::IntLit };
        let zero = self.arena.alloc(Node::new(zero_kind, zero_tok, Extra::Literal(std::cell::Cell::new(zero_value))));
        zero.ty.set(node.ty.get());

        let noteq = self.arena.alloc(Node::new(NodeKind::NotEq, noteq_tok, Extra::None));
        noteq.next.set(node.next.get());
        node.next.set(None);
        noteq.left.set(Some(node));
        noteq.right.set(Some(zero));
        noteq.ty.set(Type::BOOL);
        noteq
    }

    /// The single-step fix rule. Returns the (possibly rewritten) node a
    /// caller should keep recursing into, having already applied the
    /// rewrite through `slot`.
    fn fix_expression_types(&mut self, slot: &std::cell::Cell<Option<&'a Node<'a>>>, parent_type: Type, is_parent_cast: bool) -> &'a Node<'a> {
        let node = slot.get().expect("fix_expression_types called on an empty slot");
        let node_type = node.ty.get();
        let mut cast: Option<&'a Node<'a>> = None;

        if parent_type.is_int() && node_type.is_float() {
            let warn_from = if node_type.kind == TypeKind::SoftFloat64 { Type::new(TypeKind::Float32) } else { node_type };
            if !is_parent_cast {
                cast = Some(self.cast_node(node, parent_type, false));
                self.sink.push(
                    DiagnosticKind::ConversionDataLoss { from: warn_from.name().to_string(), to: parent_type.name().to_string() },
                    node.token.pos,
                );
            }
        } else if parent_type.is_float() && node_type.is_int() {
            if node.kind.get() == NodeKind::IntLit {
                let v = match node.literal_value() {
                    Some(LiteralValue::UInt(u)) => u as f64,
                    Some(LiteralValue::SInt(i)) => i as f64,
                    _ => 0.0,
                };
                node.kind.set(NodeKind::FloatLit);
                node.ty.set(parent_type);
                node.set_literal_value(LiteralValue::Float(v));
            } else if !is_parent_cast {
                cast = Some(self.cast_node(node, parent_type, false));
            }
        } else if parent_type.is_int() && node_type.is_int() {
            if parent_type.is_unsigned() == node_type.is_unsigned() {
                if parent_type.size_bytes() > node_type.size_bytes() {
                    if is_literal_kind(node.kind.get()) || node.is_bin_op() {
                        node.ty.set(parent_type);
                    } else if !is_parent_cast {
                        cast = Some(self.cast_node(node, parent_type, false));
                    }
                } else if parent_type.size_bytes() < node_type.size_bytes() {
                    if node.kind.get() == NodeKind::IntLit {
                        truncate_literal_in_place(node, parent_type);
                        self.sink.push(
                            DiagnosticKind::ConversionDataLoss { from: node_type.name().to_string(), to: parent_type.name().to_string() },
                            node.token.pos,
                        );
                    } else if !is_parent_cast {
                        cast = Some(self.cast_node(node, parent_type, false));
                    }
                }
                // equal width, same signedness: nothing to do.
            } else if node.kind.get() != NodeKind::IntLit {
                if !is_parent_cast {
                    cast = Some(self.cast_node(node, parent_type, false));
                }
            } else {
                let sign_changed = reinterpret_literal_in_place(node, parent_type);
                if sign_changed {
                    self.sink.push(
                        DiagnosticKind::ConversionDataLoss { from: node_type.name().to_string(), to: parent_type.name().to_string() },
                        node.token.pos,
                    );
                }
                node.ty.set(parent_type);
            }
        } else if parent_type.is_float() && node_type.is_float() {
            if node_type.kind == TypeKind::SoftFloat64 {
                node.ty.set(parent_type);
            } else if !is_parent_cast {
                cast = Some(self.cast_node(node, parent_type, false));
            }
        } else if parent_type.is_bool() && !node_type.is_bool() {
            if is_literal_kind(node.kind.get()) {
                let truthy = match node.literal_value() {
                    Some(LiteralValue::UInt(u)) => u != 0,
                    Some(LiteralValue::SInt(i)) => i != 0,
                    Some(LiteralValue::Float(f)) => f != 0.0,
                    Some(LiteralValue::Bool(b)) => b,
                    None => false,
                };
                node.kind.set(NodeKind::BoolLit);
                node.ty.set(Type::BOOL);
                node.set_literal_value(LiteralValue::Bool(truthy));
            } else {
                let replacement = self.synthesize_bool_compare(node, node.token.pos);
                slot.set(Some(replacement));
                return replacement;
            }
        } else if !parent_type.is_bool() && node_type.is_bool() && !is_parent_cast {
            self.sink.push(DiagnosticKind::UnexpectedBool, node.token.pos);
        }

        if node.ty.get().kind == TypeKind::SoftFloat64 {
            node.ty.set(Type::new(TypeKind::Float32));
        }

        match cast {
            Some(c) => {
                slot.set(Some(c));
                c
            }
            None => node,
        }
    }

    /// Recursive dispatcher: applies
    /// the single-step fix rule when the parent's context type differs
    /// from the node's own, then recurses into children with the
    /// appropriate next parent type per node kind.
    fn process_expression(&mut self, slot: &std::cell::Cell<Option<&'a Node<'a>>>, parent_type: Type, is_parent_cast: bool) {
        let mut node = slot.get().expect("process_expression called on an empty slot");
        if parent_type != node.ty.get() {
            node = self.fix_expression_types(slot, parent_type, is_parent_cast);
        }

        match node.kind.get() {
            k if matches!(
                k,
                NodeKind::Add | NodeKind::FAdd | NodeKind::Sub | NodeKind::FSub | NodeKind::Mul | NodeKind::FMul
                    | NodeKind::URem | NodeKind::FRem | NodeKind::FDiv
                    | NodeKind::And | NodeKind::Or | NodeKind::Xor
            ) =>
            {
                let own_type = node.ty.get();
                self.process_child(&node.left, own_type, false);
                self.process_child(&node.right, own_type, false);
            }
            NodeKind::UDiv | NodeKind::SDiv | NodeKind::SRem => {
                self.fix_div_mod_operands(node);
                let own_type = node.ty.get();
                self.process_child(&node.left, own_type, false);
                self.process_child(&node.right, own_type, false);
            }
            k if k.is_comparison() => {
                let lt = node.left.get().expect("comparison has a left operand").ty.get();
                let rt = node.right.get().expect("comparison has a right operand").ty.get();
                let new_parent = crate::infer::common_type(lt, rt);
                self.process_child(&node.left, new_parent, false);
                self.process_child(&node.right, new_parent, false);
            }
            NodeKind::Neg | NodeKind::Not => {
                let own_type = node.ty.get();
                self.process_child(&node.left, own_type, false);
            }
            NodeKind::Cast => {
                let target = node.ty.get();
                self.process_child(&node.left, target, true);
                // Cast elision: if the cast's child ended up with exactly
                // the cast's own target type, the cast is redundant.
                if let Some(inner) = node.left.get() {
                    if inner.ty.get() == target {
                        slot.set(Some(inner));
                    }
                }
            }
            NodeKind::Call => {
                if let Extra::Call { resolved_params, args, .. } = &node.extra {
                    let mut param = resolved_params.get();
                    let mut prev_arg: Option<&'a Node<'a>> = None;
                    let mut cur_arg = args.get();
                    while let (Some(p), Some(a)) = (param, cur_arg) {
                        let next_arg = a.next.get();
                        let cell = std::cell::Cell::new(Some(a));
                        self.process_expression(&cell, p.ty.get(), false);
                        let fixed = cell.get().expect("process_expression always leaves a node in the slot");
                        fixed.next.set(next_arg);
                        match prev_arg {
                            None => args.set(Some(fixed)),
                            Some(pa) => pa.next.set(Some(fixed)),
                        }
                        prev_arg = Some(fixed);
                        param = p.next.get();
                        cur_arg = next_arg;
                    }
                }
            }
            NodeKind::Param | NodeKind::Ident | NodeKind::Const | NodeKind::IntLit | NodeKind::FloatLit | NodeKind::BoolLit | NodeKind::Error => {}
            other => unreachable!("unexpected expression kind in fix pass: {other:?}"),
        }
    }

    /// Runs `process_expression` on a child field that isn't directly a
    /// parent's own `Cell` slot (e.g. `node.left`/`node.right`), so the
    /// fix rule can still rewrite through it.
    fn process_child(&mut self, slot: &std::cell::Cell<Option<&'a Node<'a>>>, parent_type: Type, is_parent_cast: bool) {
        if slot.get().is_some() {
            self.process_expression(slot, parent_type, is_parent_cast);
        }
    }

    /// When
    /// neither operand of `SDiv`/`SRem`/`UDiv` is an int, cast both to
    /// `Int32`; when exactly one is a float literal, rewrite that
    /// literal to an int in place (sign-aware, widened to `Int64` if the
    /// other operand is wider than 4 bytes); otherwise cast the bad
    /// operand, widened to at least `Int32`.
    fn fix_div_mod_operands(&self, expr: &'a Node<'a>) {
        let left = expr.left.get().expect("div/mod has a left operand");
        let right = expr.right.get().expect("div/mod has a right operand");
        if left.ty.get().is_int() && right.ty.get().is_int() {
            return;
        }

        let (good, bad, bad_is_left) = if left.ty.get().is_int() {
            (left, right, false)
        } else if right.ty.get().is_int() {
            (right, left, true)
        } else {
            let l_cast = self.cast_node(left, Type::new(TypeKind::Int32), false);
            let r_cast = self.cast_node(right, Type::new(TypeKind::Int32), false);
            expr.left.set(Some(l_cast));
            expr.right.set(Some(r_cast));
            return;
        };

        if bad.kind.get() == NodeKind::FloatLit {
            let fval = match bad.literal_value() {
                Some(LiteralValue::Float(f)) => f,
                _ => 0.0,
            };
            let new_type = if fval >= 0.0 && good.ty.get().is_unsigned() {
                bad.set_literal_value(LiteralValue::UInt(fval as u64));
                good.ty.get()
            } else {
                let signed_ty = if good.ty.get().size_bytes() > 4 { TypeKind::Int64 } else { TypeKind::Int32 };
                bad.set_literal_value(LiteralValue::SInt(fval as i64));
                Type::new(signed_ty)
            };
            bad.kind.set(NodeKind::IntLit);
            bad.ty.set(new_type);
        } else {
            let mut target = good.ty.get();
            if target.size_bytes() < 4 {
                target = Type::new(TypeKind::Int32);
            }
            let replacement = self.cast_node(bad, target, false);
            if bad_is_left {
                expr.left.set(Some(replacement));
            } else {
                expr.right.set(Some(replacement));
            }
        }
    }

    // ---- statement-level traversal -------------------------------------

    fn process_block(&mut self, block: &'a Node<'a>) {
        let Extra::Block { stmts, .. } = &block.extra else { unreachable!() };
        let mut prev: Option<&'a Node<'a>> = None;
        let mut s = stmts.get();
        while let Some(stmt) = s {
            let next = stmt.next.get();
            self.process_statement(stmt);
            // `process_statement` never replaces `stmt` itself (only
            // expression children through their own slots), so the
            // statement chain's `next` links stay intact.
            let _ = (prev, next);
            prev = Some(stmt);
            s = stmt.next.get();
        }
    }

    fn process_statement(&mut self, stmt: &'a Node<'a>) {
        match stmt.kind.get() {
            NodeKind::Decl => {
                if let Extra::Decl { declared_type, .. } = &stmt.extra {
                    if let Some(assign) = stmt.left.get() {
                        if assign.kind.get() == NodeKind::Assign {
                            self.process_child(&assign.right, declared_type.get(), false);
                        } else if assign.kind.get() == NodeKind::FuncDef {
                            self.process_func_body(assign);
                        }
                    }
                }
            }
            NodeKind::Assign => {
                let target_ty = stmt.left.get().expect("assignment has a target").ty.get();
                self.process_child(&stmt.right, target_ty, false);
            }
            NodeKind::Return => {
                let expected = stmt.ty.get();
                if stmt.left.get().is_some() {
                    self.process_child(&stmt.left, expected, false);
                }
            }
            NodeKind::If | NodeKind::While => {
                if let Extra::IfWhile { cond, body, else_body } = &stmt.extra {
                    let cond_cell = std::cell::Cell::new(cond.get());
                    self.process_expression(&cond_cell, Type::BOOL, false);
                    cond.set(cond_cell.get());
                    self.process_statement(body.get());
                    if let Some(e) = else_body.get() {
                        self.process_statement(e);
                    }
                }
            }
            NodeKind::Block => self.process_block(stmt),
            _ => {
                let is_cast = stmt.kind.get() == NodeKind::Cast;
                let own_type = stmt.ty.get();
                let cell = std::cell::Cell::new(Some(stmt));
                self.process_expression(&cell, own_type, is_cast);
            }
        }
    }

    fn process_func_body(&mut self, funcdef: &'a Node<'a>) {
        if let Extra::FuncDef { body, .. } = &funcdef.extra {
            if let Some(b) = body.get() {
                self.process_block(b);
            }
        }
    }
}

/// Truncates an int literal's value to `target`'s width in place,
/// using the correct destination width for every case (`UInt16`/`UInt32`
/// each get their own width, not just `UInt8`).
fn truncate_literal_in_place(node: &Node<'_>, target: Type) {
    let old = match node.literal_value() {
        Some(LiteralValue::UInt(v)) => v as i64,
        Some(LiteralValue::SInt(v)) => v,
        _ => 0,
    };
    let truncated: i64 = match target.kind {
        TypeKind::UInt8 => old as u8 as i64,
        TypeKind::UInt16 => old as u16 as i64,
        TypeKind::UInt32 => old as u32 as i64,
        TypeKind::Int8 => old as i8 as i64,
        TypeKind::Int16 => old as i16 as i64,
        TypeKind::Int32 => old as i32 as i64,
        _ => old,
    };
    if target.is_unsigned() {
        node.set_literal_value(LiteralValue::UInt(truncated as u64));
    } else {
        node.set_literal_value(LiteralValue::SInt(truncated));
    }
    node.ty.set(target);
}

/// Reinterprets an int literal's bit pattern when narrowing across a
/// signedness change, returning whether the value's effective sign
/// changed (used to decide whether to warn).
fn reinterpret_literal_in_place(node: &Node<'_>, target: Type) -> bool {
    let old_signed = match node.literal_value() {
        Some(LiteralValue::SInt(v)) => v,
        Some(LiteralValue::UInt(v)) => v as i64,
        _ => 0,
    };
    let new_value: i64 = match target.kind {
        TypeKind::UInt8 => old_signed as u8 as i64,
        TypeKind::UInt16 => old_signed as u16 as i64,
        TypeKind::UInt32 => old_signed as u32 as i64,
        TypeKind::Int8 => old_signed as i8 as i64,
        TypeKind::Int16 => old_signed as i16 as i64,
        TypeKind::Int32 => old_signed as i32 as i64,
        _ => old_signed,
    };
    if target.is_unsigned() {
        node.set_literal_value(LiteralValue::UInt(new_value as u64));
    } else {
        node.set_literal_value(LiteralValue::SInt(new_value));
    }
    old_signed < 0 || old_signed != new_value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infer::infer;
    use crate::intern::Interner;
    use crate::parser::parse;
    use crate::ast::Extra;

    fn first_decl<'a>(program: &'a Node<'a>) -> &'a Node<'a> {
        let block = program.next.get().unwrap();
        let Extra::Block { stmts, .. } = &block.extra else { unreachable!() };
        stmts.get().unwrap()
    }

    fn reparse<'a>(arena: &'a Arena, src: &'a str) -> (&'a Node<'a>, MessageSink) {
        let mut interner = Interner::new();
        let mut sink = MessageSink::new();
        let file = interner.intern("t.smm");
        let program = parse(src, file, arena, &mut interner, &mut sink);
        infer(program, arena, &mut interner, &mut sink);
        fix(program, arena, &mut sink);
        (program, sink)
    }

    #[test]
    fn int_plus_float_literal_widens_and_rewrites_literal() {
        let arena = Arena::new("t");
        let (program, sink) = reparse(&arena, "x := 1 + 2.5;");
        assert!(!sink.has_errors());
        let decl = first_decl(program);
        assert_eq!(decl.decl_declared_type().unwrap().kind, TypeKind::Float32);
        let assign = decl.left.get().unwrap();
        let add = assign.right.get().unwrap();
        assert_eq!(add.kind.get(), NodeKind::FAdd);
        assert_eq!(add.ty.get().kind, TypeKind::Float32);
        let one = add.left.get().unwrap();
        assert_eq!(one.kind.get(), NodeKind::FloatLit);
        assert_eq!(one.literal_value(), Some(LiteralValue::Float(1.0)));
    }

    #[test]
    fn narrowing_int8_truncates_and_warns() {
        let arena = Arena::new("t");
        let (program, sink) = reparse(&arena, "x : Int8 = 300;");
        assert!(sink.diagnostics().iter().any(|d| matches!(d.kind, DiagnosticKind::ConversionDataLoss { .. })));
        let decl = first_decl(program);
        let assign = decl.left.get().unwrap();
        let lit = assign.right.get().unwrap();
        assert_eq!(lit.ty.get().kind, TypeKind::Int8);
        assert_eq!(lit.literal_value(), Some(LiteralValue::SInt(44)));
    }

    #[test]
    fn signed_unsigned_comparison_gets_common_cast() {
        let arena = Arena::new("t");
        let (_program, sink) = reparse(&arena, "u : UInt32 = 5; i : Int32 = -3; b := u < i;");
        assert!(sink.diagnostics().iter().any(|d| matches!(d.kind, DiagnosticKind::ComparingSignedAndUnsigned)));
        assert!(!sink.has_errors());
    }

    #[test]
    fn non_bool_in_bool_context_gets_noteq_zero_with_distinct_tokens() {
        let arena = Arena::new("t");
        let (program, sink) = reparse(&arena, "f : (a: Int32) -> Void { if a then return; }");
        assert!(!sink.has_errors());
        let block = program.next.get().unwrap();
        let Extra::Block { stmts, .. } = &block.extra else { unreachable!() };
        let decl = stmts.get().unwrap();
        let funcdef = decl.left.get().unwrap();
        let Extra::FuncDef { body, .. } = &funcdef.extra else { unreachable!() };
        let fb = body.get().unwrap();
        let Extra::Block { stmts: fstmts, .. } = &fb.extra else { unreachable!() };
        let if_node = fstmts.get().unwrap();
        let Extra::IfWhile { cond, .. } = &if_node.extra else { unreachable!() };
        let cond = cond.get().unwrap();
        assert_eq!(cond.kind.get(), NodeKind::NotEq);
        let zero = cond.right.get().unwrap();
        assert_ne!(cond.token as *const _, zero.token as *const _);
    }

    #[test]
    fn unexpected_bool_in_non_bool_context_is_an_error() {
        let arena = Arena::new("t");
        let (_program, sink) = reparse(&arena, "b : Bool = true; x : Int32 = b;");
        assert!(sink.diagnostics().iter().any(|d| matches!(d.kind, DiagnosticKind::UnexpectedBool)));
    }

    #[test]
    fn soft_float_collapses_to_float32_everywhere() {
        let arena = Arena::new("t");
        let (program, sink) = reparse(&arena, "x := 1.0 / 2.0; y :: 3 / 4;");
        assert!(!sink.has_errors());
        fn walk_no_softfloat(node: &Node<'_>) {
            assert_ne!(node.ty.get().kind, TypeKind::SoftFloat64);
            if let Some(l) = node.left.get() {
                walk_no_softfloat(l);
            }
            if let Some(r) = node.right.get() {
                walk_no_softfloat(r);
            }
        }
        let block = program.next.get().unwrap();
        let Extra::Block { stmts, .. } = &block.extra else { unreachable!() };
        let mut s = stmts.get();
        while let Some(stmt) = s {
            walk_no_softfloat(stmt);
            s = stmt.next.get();
        }
    }

    #[test]
    fn unsigned_int_div_surfaces_as_udiv() {
        let arena = Arena::new("t");
        let (program, sink) = reparse(&arena, "x := 10 div 3;");
        assert!(!sink.has_errors());
        let decl = first_decl(program);
        let assign = decl.left.get().unwrap();
        let div = assign.right.get().unwrap();
        assert_eq!(div.kind.get(), NodeKind::UDiv);
    }

    #[test]
    fn signed_target_reinterprets_unsigned_literal_without_a_cast_wrapper() {
        let arena = Arena::new("t");
        let (program, sink) = reparse(&arena, "x : Int64 = 5;");
        assert!(!sink.has_errors());
        let decl = first_decl(program);
        let assign = decl.left.get().unwrap();
        let rhs = assign.right.get().unwrap();
        assert_ne!(rhs.kind.get(), NodeKind::Cast);
        assert_eq!(rhs.ty.get().kind, TypeKind::Int64);
        assert_eq!(rhs.literal_value(), Some(LiteralValue::SInt(5)));
    }
}
