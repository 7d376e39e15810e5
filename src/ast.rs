//! Tagged-union AST node shape.
//!
//! Every node shares a common prefix — `kind`, source `token`, `ty`,
//! and the three structural pointers `next`/`left`/`right` — so a
//! generic walk never needs to know which specialized shape it holds.
//! Specialized fields live in [`Extra`], one variant per node kind
//! family: an enum discriminated by `kind` keeps accessors uniform
//! across shapes while the compiler checks exhaustiveness.
//!
//! Fields the inference and fix passes rewrite after construction
//! (`kind`, `ty`, the child pointers, a literal's numeric value) are
//! `Cell`s. Nodes are handed out as plain `&'a Node` arena references;
//! a pass mutates through the parent's `Cell` rather than needing
//! `&mut` access to the tree, so cast insertion and `!= 0` synthesis
//! can rewrite a child without touching anything above it.

use std::cell::Cell;

use crate::intern::Symbol;
use crate::token::Token;
use crate::types::Type;

/// Node kind tag. The arithmetic block `Add..=FRem` must stay
/// contiguous and in this order: the inference pass shifts a kind by
/// a fixed offset (`Add` -> `FAdd` is +1, `SDiv` -> `UDiv` is -1, and
/// so on) instead of matching each pair explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Parser recovery sentinel: stands in for a factor/statement that
    /// failed to parse so the caller has a non-null node to continue
    /// building the tree around.
    Error,
    Program,
    Block,
    Scope,
    Decl,
    Param,
    FuncDef,
    Call,
    If,
    While,
    Return,
    Assign,
    Ident,
    Const,
    IntLit,
    FloatLit,
    BoolLit,
    StringLit,
    Cast,
    Neg,
    Not,

    Add,
    FAdd,
    Sub,
    FSub,
    Mul,
    FMul,
    UDiv,
    SDiv,
    FDiv,
    URem,
    SRem,
    FRem,

    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    And,
    Or,
    Xor,
}

impl NodeKind {
    pub fn is_arith(self) -> bool {
        matches!(
            self,
            NodeKind::Add
                | NodeKind::FAdd
                | NodeKind::Sub
                | NodeKind::FSub
                | NodeKind::Mul
                | NodeKind::FMul
                | NodeKind::UDiv
                | NodeKind::SDiv
                | NodeKind::FDiv
                | NodeKind::URem
                | NodeKind::SRem
                | NodeKind::FRem
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            NodeKind::Eq | NodeKind::NotEq | NodeKind::Lt | NodeKind::LtEq | NodeKind::Gt | NodeKind::GtEq
        )
    }

    pub fn is_bin_op(self) -> bool {
        self.is_arith() || self.is_comparison() || matches!(self, NodeKind::And | NodeKind::Or | NodeKind::Xor)
    }

    pub fn is_ident(self) -> bool {
        matches!(self, NodeKind::Ident | NodeKind::Const)
    }

    /// Shifts an arithmetic kind to its float counterpart (`Add` ->
    /// `FAdd`, `Mul` -> `FMul`, ...). Panics on a non-arithmetic kind;
    /// callers only call this after checking `is_arith`.
    pub fn to_float_variant(self) -> NodeKind {
        use NodeKind::*;
        match self {
            Add => FAdd,
            Sub => FSub,
            Mul => FMul,
            UDiv | SDiv => FDiv,
            URem | SRem => FRem,
            other if matches!(other, FAdd | FSub | FMul | FDiv | FRem) => other,
            other => unreachable!("{other:?} has no float variant"),
        }
    }

    /// Shifts a signed div/mod/rem kind to its unsigned counterpart.
    pub fn to_unsigned_variant(self) -> NodeKind {
        match self {
            NodeKind::SDiv => NodeKind::UDiv,
            NodeKind::SRem => NodeKind::URem,
            other => other,
        }
    }
}

/// Literal node payload, mutable in place: the fix pass rewrites the
/// value (truncating, reinterpreting, or widening to a double) without
/// touching the node's source `token`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LiteralValue {
    SInt(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
}

/// Specialized fields beyond the common prefix, one variant per
/// `NodeKind` family.
pub enum Extra<'a> {
    None,
    Literal(Cell<LiteralValue>),
    Ident {
        decl: Cell<Option<&'a Node<'a>>>,
    },
    Decl {
        name: Symbol,
        declared_type: Cell<Type>,
        is_const: Cell<bool>,
        is_being_processed: Cell<bool>,
        is_processed: Cell<bool>,
        /// Scope nesting depth at declaration, used to detect
        /// same-scope redefinition independent of shadowing.
        level: Cell<u32>,
        /// Links this declaration into its enclosing scope's `decls`
        /// list, independent of the block's statement-execution chain
        /// (the common `next` field) that a declaration also appears
        /// in.
        next_decl: Cell<Option<&'a Node<'a>>>,
    },
    Scope {
        parent: Cell<Option<&'a Node<'a>>>,
        return_type: Cell<Type>,
        decls: Cell<Option<&'a Node<'a>>>,
    },
    Block {
        scope: &'a Node<'a>,
        stmts: Cell<Option<&'a Node<'a>>>,
    },
    Param {
        index: u32,
        /// Total arity of the enclosing function; meaningful only on
        /// the first parameter.
        count: Cell<u32>,
    },
    FuncDef {
        name: Symbol,
        return_type: Cell<Type>,
        params: Cell<Option<&'a Node<'a>>>,
        body: Cell<Option<&'a Node<'a>>>,
        next_overload: Cell<Option<&'a Node<'a>>>,
        mangled_name: Cell<Option<Symbol>>,
    },
    Call {
        callee_name: Symbol,
        resolved_decl: Cell<Option<&'a Node<'a>>>,
        resolved_params: Cell<Option<&'a Node<'a>>>,
        args: Cell<Option<&'a Node<'a>>>,
        return_type: Cell<Type>,
    },
    IfWhile {
        cond: Cell<&'a Node<'a>>,
        body: Cell<&'a Node<'a>>,
        else_body: Cell<Option<&'a Node<'a>>>,
    },
    Cast {
        target: Cell<Type>,
        /// True when this cast was written explicitly in source
        /// rather than synthesized by the fix pass; the "conversion
        /// data loss" warning is suppressed for explicit casts.
        is_explicit: Cell<bool>,
    },
}

/// A single AST node. See the module docs for the shared-prefix /
/// `Extra` split.
pub struct Node<'a> {
    pub kind: Cell<NodeKind>,
    pub token: &'a Token,
    pub ty: Cell<Type>,
    pub next: Cell<Option<&'a Node<'a>>>,
    pub left: Cell<Option<&'a Node<'a>>>,
    pub right: Cell<Option<&'a Node<'a>>>,
    pub extra: Extra<'a>,
}

impl<'a> Node<'a> {
    pub fn new(kind: NodeKind, token: &'a Token, extra: Extra<'a>) -> Self {
        Node {
            kind: Cell::new(kind),
            token,
            ty: Cell::new(Type::UNKNOWN),
            next: Cell::new(None),
            left: Cell::new(None),
            right: Cell::new(None),
            extra,
        }
    }

    pub fn leaf(kind: NodeKind, token: &'a Token) -> Self {
        Node::new(kind, token, Extra::None)
    }

    pub fn is_ident(&self) -> bool {
        self.kind.get().is_ident()
    }

    pub fn is_bin_op(&self) -> bool {
        self.kind.get().is_bin_op()
    }

    pub fn is_lvalue(&self) -> bool {
        matches!(self.kind.get(), NodeKind::Ident)
    }

    pub fn literal_value(&self) -> Option<LiteralValue> {
        match &self.extra {
            Extra::Literal(cell) => Some(cell.get()),
            _ => None,
        }
    }

    pub fn set_literal_value(&self, value: LiteralValue) {
        match &self.extra {
            Extra::Literal(cell) => cell.set(value),
            _ => unreachable!("set_literal_value called on a non-literal node"),
        }
    }

    pub fn decl_is_const(&self) -> bool {
        match &self.extra {
            Extra::Decl { is_const, .. } => is_const.get(),
            _ => false,
        }
    }

    pub fn decl_being_processed(&self) -> bool {
        match &self.extra {
            Extra::Decl { is_being_processed, .. } => is_being_processed.get(),
            _ => false,
        }
    }

    pub fn decl_set_being_processed(&self, value: bool) {
        if let Extra::Decl { is_being_processed, .. } = &self.extra {
            is_being_processed.set(value);
        }
    }

    pub fn decl_processed(&self) -> bool {
        match &self.extra {
            Extra::Decl { is_processed, .. } => is_processed.get(),
            _ => false,
        }
    }

    pub fn decl_set_processed(&self, value: bool) {
        if let Extra::Decl { is_processed, .. } = &self.extra {
            is_processed.set(value);
        }
    }

    pub fn decl_level(&self) -> Option<u32> {
        match &self.extra {
            Extra::Decl { level, .. } => Some(level.get()),
            _ => None,
        }
    }

    pub fn decl_declared_type(&self) -> Option<Type> {
        match &self.extra {
            Extra::Decl { declared_type, .. } => Some(declared_type.get()),
            _ => None,
        }
    }

    pub fn decl_name(&self) -> Option<Symbol> {
        match &self.extra {
            Extra::Decl { name, .. } => Some(*name),
            Extra::FuncDef { name, .. } => Some(*name),
            _ => None,
        }
    }

    pub fn decl_next(&self) -> Option<&'a Node<'a>> {
        match &self.extra {
            Extra::Decl { next_decl, .. } => next_decl.get(),
            _ => None,
        }
    }

    /// Appends `decl` to this scope node's `decls` list, preserving
    /// source order.
    pub fn scope_push_decl(&self, decl: &'a Node<'a>) {
        let Extra::Scope { decls, .. } = &self.extra else {
            unreachable!("scope_push_decl called on a non-scope node");
        };
        match decls.get() {
            None => decls.set(Some(decl)),
            Some(head) => {
                let mut tail = head;
                while let Some(next) = tail.decl_next() {
                    tail = next;
                }
                if let Extra::Decl { next_decl, .. } = &tail.extra {
                    next_decl.set(Some(decl));
                }
            }
        }
    }

    pub fn scope_decls(&self) -> Option<&'a Node<'a>> {
        match &self.extra {
            Extra::Scope { decls, .. } => decls.get(),
            _ => None,
        }
    }
}

/// Constructs the cond/body/else-body node used by both `If` and
/// `While`.
pub fn new_if_while<'a>(
    kind: NodeKind,
    token: &'a Token,
    cond: &'a Node<'a>,
    body: &'a Node<'a>,
    else_body: Option<&'a Node<'a>>,
) -> Node<'a> {
    Node::new(
        kind,
        token,
        Extra::IfWhile {
            cond: Cell::new(cond),
            body: Cell::new(body),
            else_body: Cell::new(else_body),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::token::{Pos, Repr, TokenKind};

    fn tok(arena: &Arena, kind: TokenKind) -> &Token {
        arena.alloc(Token::new(kind, Pos::default(), Repr::Owned("x".into())))
    }

    #[test]
    fn float_variant_shifts_add_family() {
        assert_eq!(NodeKind::Add.to_float_variant(), NodeKind::FAdd);
        assert_eq!(NodeKind::Mul.to_float_variant(), NodeKind::FMul);
        assert_eq!(NodeKind::SDiv.to_float_variant(), NodeKind::FDiv);
    }

    #[test]
    fn unsigned_variant_shifts_only_sdiv_srem() {
        assert_eq!(NodeKind::SDiv.to_unsigned_variant(), NodeKind::UDiv);
        assert_eq!(NodeKind::SRem.to_unsigned_variant(), NodeKind::URem);
        assert_eq!(NodeKind::Add.to_unsigned_variant(), NodeKind::Add);
    }

    #[test]
    fn arith_block_is_contiguous_in_declared_order() {
        let ordered = [
            NodeKind::Add,
            NodeKind::FAdd,
            NodeKind::Sub,
            NodeKind::FSub,
            NodeKind::Mul,
            NodeKind::FMul,
            NodeKind::UDiv,
            NodeKind::SDiv,
            NodeKind::FDiv,
            NodeKind::URem,
            NodeKind::SRem,
            NodeKind::FRem,
        ];
        assert!(ordered.iter().all(|k| k.is_arith()));
    }

    #[test]
    fn literal_value_mutates_through_cell() {
        let arena = Arena::new("ast");
        let t = tok(&arena, TokenKind::IntLit);
        let node = Node::new(NodeKind::IntLit, t, Extra::Literal(Cell::new(LiteralValue::SInt(5))));
        assert_eq!(node.literal_value(), Some(LiteralValue::SInt(5)));
        node.set_literal_value(LiteralValue::Float(5.0));
        assert_eq!(node.literal_value(), Some(LiteralValue::Float(5.0)));
    }

    #[test]
    fn ident_kind_rewrites_to_const_in_place() {
        let arena = Arena::new("ast");
        let t = tok(&arena, TokenKind::Ident);
        let node = Node::new(NodeKind::Ident, t, Extra::Ident { decl: Cell::new(None) });
        assert!(node.is_ident());
        node.kind.set(NodeKind::Const);
        assert_eq!(node.kind.get(), NodeKind::Const);
        assert!(node.is_ident());
    }

    #[test]
    fn child_pointer_rewrite_is_visible_through_parent() {
        let arena = Arena::new("ast");
        let t = tok(&arena, TokenKind::IntLit);
        let original = arena.alloc(Node::new(NodeKind::IntLit, t, Extra::Literal(Cell::new(LiteralValue::SInt(1)))));
        let parent = Node::new(NodeKind::Cast, t, Extra::Cast { target: Cell::new(Type::BOOL), is_explicit: Cell::new(false) });
        parent.left.set(Some(original));

        let replacement = arena.alloc(Node::new(NodeKind::BoolLit, t, Extra::Literal(Cell::new(LiteralValue::Bool(true)))));
        parent.left.set(Some(replacement));
        assert!(matches!(parent.left.get().unwrap().kind.get(), NodeKind::BoolLit));
    }
}
