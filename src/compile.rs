//! Orchestrates lex -> parse -> infer -> fix into one entry point.
//! Every other surface — `cli`, a future backend — goes through
//! [`compile`] rather than calling the individual passes directly.
//!
//! A small hand-written error enum (no `thiserror`/`anyhow`) plus a
//! single function that owns the arena, interner and message sink for
//! one compilation unit.

use std::fmt;

use crate::arena::Arena;
use crate::ast::Node;
use crate::error::MessageSink;
use crate::fix::fix;
use crate::infer::infer;
use crate::intern::Interner;
use crate::parser::parse;

/// Hard cap on the in-memory compile path's input buffer.
pub const MAX_SOURCE_BYTES: usize = 64 * 1024;

#[derive(Debug)]
pub enum CompileError {
    /// Source exceeds [`MAX_SOURCE_BYTES`].
    TooLarge { bytes: usize },
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::TooLarge { bytes } => write!(
                f,
                "source is {bytes} bytes, exceeds the {MAX_SOURCE_BYTES}-byte in-memory compile limit"
            ),
        }
    }
}

impl std::error::Error for CompileError {}

/// How far through the pipeline [`compile`] should run before handing
/// the tree back, matching the CLI's `-pp1`/`-pp2`/`-pp3` dump points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Stop right after parsing.
    Parse,
    /// Parse, then run type inference.
    Infer,
    /// Parse, infer, then run the semantic-fix pass. The default for
    /// any caller that isn't dumping an intermediate tree.
    Fix,
}

/// One compilation unit: the arena-allocated AST plus the interner and
/// message sink used to build it, kept alive as long as the caller
/// needs the tree.
pub struct Unit<'a> {
    pub program: &'a Node<'a>,
    pub interner: Interner,
    pub sink: MessageSink,
}

/// Runs the pipeline over `source` up through `stage` and returns the
/// resulting tree plus every diagnostic posted so far, in source order.
pub fn compile<'a>(
    source: &'a str,
    filename: &str,
    arena: &'a Arena,
    stage: Stage,
) -> Result<Unit<'a>, CompileError> {
    if source.len() > MAX_SOURCE_BYTES {
        return Err(CompileError::TooLarge { bytes: source.len() });
    }

    let mut interner = Interner::new();
    let mut sink = MessageSink::new();
    let file = interner.intern(filename);
    let program = parse(source, file, arena, &mut interner, &mut sink);

    if stage != Stage::Parse {
        infer(program, arena, &mut interner, &mut sink);
    }
    if stage == Stage::Fix {
        fix(program, arena, &mut sink);
    }

    Ok(Unit { program, interner, sink })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_valid_source_without_errors() {
        let arena = Arena::new("compile-test");
        let unit = compile("x := 1 + 2.5;", "t.smm", &arena, Stage::Fix).unwrap();
        assert!(!unit.sink.has_errors());
    }

    #[test]
    fn rejects_source_over_the_size_cap() {
        let arena = Arena::new("compile-test");
        let huge = "x".repeat(MAX_SOURCE_BYTES + 1);
        let err = compile(&huge, "t.smm", &arena, Stage::Fix).unwrap_err();
        assert!(matches!(err, CompileError::TooLarge { .. }));
    }

    #[test]
    fn stage_parse_does_not_run_inference() {
        let arena = Arena::new("compile-test");
        // An undefined identifier is only caught by inference; at the
        // parse stage alone the sink must still be empty.
        let unit = compile("x := y;", "t.smm", &arena, Stage::Parse).unwrap();
        assert!(!unit.sink.has_errors());
    }

    #[test]
    fn stage_infer_catches_undefined_identifiers() {
        let arena = Arena::new("compile-test");
        let unit = compile("x := y;", "t.smm", &arena, Stage::Infer).unwrap();
        assert!(unit.sink.has_errors());
    }

    #[test]
    fn errors_surface_through_the_full_pipeline() {
        let arena = Arena::new("compile-test");
        let unit = compile("x := y;", "t.smm", &arena, Stage::Fix).unwrap();
        assert!(unit.sink.has_errors());
    }
}
