//! AST dump printer for `-pp1`/`-pp2`/`-pp3`.
//!
//! Walks the arena AST in three top-level passes — global symbols,
//! block/local symbols, expressions — printing to any `io::Write` so
//! the CLI can send the same dump to `-o PATH` or stdout uniformly.

use std::io::{self, Write};

use crate::ast::{Extra, Node, NodeKind};
use crate::intern::Interner;

/// Expressions whose own textual form is already atomic and never
/// need wrapping in parentheses as someone else's operand.
fn needs_parentheses(kind: NodeKind) -> bool {
    !matches!(
        kind,
        NodeKind::Neg
            | NodeKind::Not
            | NodeKind::Cast
            | NodeKind::Call
            | NodeKind::Param
            | NodeKind::Ident
            | NodeKind::Const
            | NodeKind::IntLit
            | NodeKind::FloatLit
            | NodeKind::BoolLit
    )
}

struct Printer<'i, W> {
    interner: &'i Interner,
    out: W,
}

impl<'i, W: Write> Printer<'i, W> {
    fn text(&self, node: &Node<'_>) -> &'i str {
        node.token.text(self.interner)
    }

    fn process_expression(&mut self, expr: &Node<'_>) -> io::Result<()> {
        let kind = expr.kind.get();
        if kind.is_bin_op() {
            let left = expr.left.get().expect("binary op always has a left operand");
            let right = expr.right.get().expect("binary op always has a right operand");

            let lp = needs_parentheses(left.kind.get());
            if lp {
                write!(self.out, "(")?;
            }
            self.process_expression(left)?;
            if lp {
                write!(self.out, ")")?;
            }

            write!(self.out, " {:?}:{} ", kind, expr.ty.get().name())?;

            let rp = needs_parentheses(right.kind.get());
            if rp {
                write!(self.out, "(")?;
            }
            self.process_expression(right)?;
            if rp {
                write!(self.out, ")")?;
            }
            return Ok(());
        }

        match kind {
            NodeKind::Neg | NodeKind::Not | NodeKind::Cast => {
                let left = expr.left.get().expect("unary op always has a left operand");
                write!(self.out, "{:?}:{}(", kind, expr.ty.get().name())?;
                self.process_expression(left)?;
                write!(self.out, ")")
            }
            NodeKind::Call => {
                let Extra::Call { args, return_type, resolved_params, .. } = &expr.extra else {
                    unreachable!("Call node without Call extra")
                };
                write!(self.out, "{}:{}(", self.text(expr), return_type.get().name())?;
                if resolved_params.get().is_some() {
                    let mut arg = args.get();
                    let mut first = true;
                    while let Some(a) = arg {
                        if !first {
                            write!(self.out, ", ")?;
                        }
                        first = false;
                        self.process_expression(a)?;
                        arg = a.next.get();
                    }
                }
                write!(self.out, ")")
            }
            NodeKind::Param | NodeKind::Ident | NodeKind::Const | NodeKind::IntLit | NodeKind::FloatLit | NodeKind::BoolLit => {
                write!(self.out, "{}:{}", self.text(expr), expr.ty.get().name())
            }
            other => unreachable!("unexpected node kind {other:?} in process_expression"),
        }
    }

    /// Prints the declarations local to one scope, one per line,
    /// indented `indent` columns.
    fn process_local_symbols(&mut self, decl: Option<&Node<'_>>, indent: usize) -> io::Result<()> {
        let mut cur = decl;
        while let Some(d) = cur {
            if indent > 0 {
                write!(self.out, "{:indent$}", "", indent = indent)?;
            }
            let ty_name = d.decl_declared_type().unwrap_or(crate::types::Type::UNKNOWN).name();
            if decl_is_func(d) {
                // Functions never appear among a block's *local* decls
                //, but stay
                // defensive rather than panicking on a malformed tree.
                let funcdef = d.left.get().unwrap();
                writeln!(self.out, "{}:{}", self.text(funcdef), ty_name)?;
            } else {
                let assign = d.left.get().expect("var/const decl wraps an Assign");
                let target = assign.left.get().expect("assign always has a target");
                match target.kind.get() {
                    NodeKind::Ident => {
                        writeln!(self.out, "{}:{}", self.text(target), ty_name)?;
                    }
                    NodeKind::Const => {
                        write!(self.out, "{}:{} = ", self.text(target), ty_name)?;
                        let init = assign.right.get().expect("const decl always has an initializer");
                        self.process_expression(init)?;
                        writeln!(self.out)?;
                    }
                    other => unreachable!("declaration target of unknown node kind {other:?}"),
                }
            }
            cur = d.decl_next();
        }
        Ok(())
    }

    fn process_assignment(&mut self, stmt: &Node<'_>) -> io::Result<()> {
        let left = stmt.left.get().expect("assignment always has a target");
        let right = stmt.right.get().expect("assignment always has a value");
        write!(
            self.out,
            "{}:{} =:{} ",
            self.text(left),
            left.ty.get().name(),
            stmt.ty.get().name()
        )?;
        self.process_expression(right)?;
        writeln!(self.out)
    }

    fn process_return(&mut self, stmt: &Node<'_>) -> io::Result<()> {
        write!(self.out, "return ")?;
        if let Some(value) = stmt.left.get() {
            self.process_expression(value)?;
        }
        writeln!(self.out)
    }

    fn process_block(&mut self, block: &Node<'_>, indent: usize) -> io::Result<()> {
        let Extra::Block { stmts, .. } = &block.extra else {
            unreachable!("process_block called on a non-block node")
        };
        let mut stmt = stmts.get();
        while let Some(s) = stmt {
            if indent > 0 {
                write!(self.out, "{:indent$}", "", indent = indent)?;
            }
            match s.kind.get() {
                NodeKind::Block => {
                    let Extra::Block { scope, .. } = &s.extra else { unreachable!() };
                    writeln!(self.out, "{{")?;
                    self.process_local_symbols(scope.scope_decls(), indent + 4)?;
                    self.process_block(s, indent + 4)?;
                    writeln!(self.out, "}}")?;
                }
                NodeKind::Assign => self.process_assignment(s)?,
                NodeKind::Return => self.process_return(s)?,
                NodeKind::If | NodeKind::While => self.process_if_while(s, indent)?,
                _ => {
                    self.process_expression(s)?;
                    writeln!(self.out)?;
                }
            }
            stmt = s.next.get();
        }
        Ok(())
    }

    fn process_if_while(&mut self, stmt: &Node<'_>, indent: usize) -> io::Result<()> {
        let Extra::IfWhile { cond, body, else_body } = &stmt.extra else {
            unreachable!("process_if_while called on a non-if/while node")
        };
        let keyword = if stmt.kind.get() == NodeKind::If { "if" } else { "while" };
        write!(self.out, "{keyword} ")?;
        self.process_expression(cond.get())?;
        writeln!(self.out, " then")?;
        self.process_statement_indented(body.get(), indent)?;
        if let Some(e) = else_body.get() {
            if indent > 0 {
                write!(self.out, "{:indent$}", "", indent = indent)?;
            }
            writeln!(self.out, "else")?;
            self.process_statement_indented(e, indent)?;
        }
        Ok(())
    }

    fn process_statement_indented(&mut self, stmt: &Node<'_>, indent: usize) -> io::Result<()> {
        match stmt.kind.get() {
            NodeKind::Block => {
                let Extra::Block { scope, .. } = &stmt.extra else { unreachable!() };
                if indent > 0 {
                    write!(self.out, "{:indent$}", "", indent = indent)?;
                }
                writeln!(self.out, "{{")?;
                self.process_local_symbols(scope.scope_decls(), indent + 4)?;
                self.process_block(stmt, indent + 4)?;
                if indent > 0 {
                    write!(self.out, "{:indent$}", "", indent = indent)?;
                }
                writeln!(self.out, "}}")
            }
            NodeKind::Assign => {
                if indent > 0 {
                    write!(self.out, "{:indent$}", "", indent = indent + 4)?;
                }
                self.process_assignment(stmt)
            }
            NodeKind::Return => {
                write!(self.out, "{:indent$}", "", indent = indent + 4)?;
                self.process_return(stmt)
            }
            _ => {
                write!(self.out, "{:indent$}", "", indent = indent + 4)?;
                self.process_expression(stmt)?;
                writeln!(self.out)
            }
        }
    }

    fn process_global_symbols(&mut self, decl: Option<&Node<'_>>) -> io::Result<()> {
        let mut cur = decl;
        while let Some(d) = cur {
            if decl_is_func(d) {
                let funcdef = d.left.get().unwrap();
                let Extra::FuncDef { return_type, params, body, .. } = &funcdef.extra else {
                    unreachable!()
                };
                write!(self.out, "{}:{}(", self.text(funcdef), return_type.get().name())?;
                let mut param = params.get();
                let mut first = true;
                while let Some(p) = param {
                    if !first {
                        write!(self.out, ", ")?;
                    }
                    first = false;
                    write!(self.out, "{}:{}", self.text(p), p.ty.get().name())?;
                    param = p.next.get();
                }
                writeln!(self.out, ")")?;
                if let Some(body) = body.get() {
                    let Extra::Block { scope, .. } = &body.extra else { unreachable!() };
                    writeln!(self.out, "{{")?;
                    self.process_local_symbols(scope.scope_decls(), 4)?;
                    self.process_block(body, 4)?;
                    writeln!(self.out, "}}")?;
                }
            } else {
                let assign = d.left.get().expect("var/const decl wraps an Assign");
                let target = assign.left.get().expect("assign always has a target");
                let init = assign.right.get().expect("global var declaration always has an initializer");
                let ty_name = d.decl_declared_type().unwrap_or(crate::types::Type::UNKNOWN).name();
                write!(self.out, "{}:{ty_name} =:{ty_name} ", self.text(target))?;
                self.process_expression(init)?;
                writeln!(self.out)?;
            }
            cur = d.decl_next();
        }
        Ok(())
    }
}

fn decl_is_func(decl: &Node<'_>) -> bool {
    matches!(decl.left.get().map(|l| l.kind.get()), Some(NodeKind::FuncDef))
}

/// Dumps `program` (a `Program` root node) in the textual format:
/// module name, global declarations, then `MAIN CODE:` followed by
/// every top-level statement.
pub fn dump<W: Write>(program: &Node<'_>, interner: &Interner, mut out: W) -> io::Result<()> {
    let module_name = program.token.text(interner);
    writeln!(out, "Module: {module_name}")?;

    let global_block = program.next.get().expect("program always has a body block");
    let Extra::Block { scope, .. } = &global_block.extra else {
        unreachable!("program's next is always a Block node")
    };

    let mut printer = Printer { interner, out };
    printer.process_global_symbols(scope.scope_decls())?;
    writeln!(printer.out, "MAIN CODE:")?;
    printer.process_block(global_block, 0)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::error::MessageSink;
    use crate::fix::fix;
    use crate::infer::infer;
    use crate::parser::parse;

    fn dump_src(src: &str) -> String {
        let arena = Arena::new("debug-test");
        let mut interner = Interner::new();
        let mut sink = MessageSink::new();
        let file = interner.intern("t.smm");
        let program = parse(src, file, &arena, &mut interner, &mut sink);
        infer(program, &arena, &mut interner, &mut sink);
        fix(program, &arena, &mut sink);
        let mut buf = Vec::new();
        dump(program, &interner, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn dumps_module_header_and_main_code_marker() {
        let out = dump_src("x := 1;");
        assert!(out.starts_with("Module: t.smm\n"));
        assert!(out.contains("MAIN CODE:"));
    }

    #[test]
    fn global_var_declaration_shows_assign_and_type() {
        let out = dump_src("x := 5;");
        assert!(out.contains("x:Int32 =:Int32 5:Int32"));
    }

    #[test]
    fn function_declaration_prints_signature_and_body() {
        let out = dump_src("f : (a: Int32) -> Int32 { return a; }");
        assert!(out.contains("f:Int32(a:Int32)"));
        assert!(out.contains("return a:Int32"));
    }

    #[test]
    fn binary_op_prints_kind_and_type_between_operands() {
        let out = dump_src("x := 1 + 2;");
        assert!(out.contains("1:Int32 Add:Int32 2:Int32"));
    }
}
