//! Front end for a small statically-typed procedural language: lexer,
//! parser, type-inference pass and semantic-fix pass producing a typed
//! AST. Everything downstream of the fix pass — code
//! generation, a graph/debug printer that walks the finished tree for
//! purposes other than `-ppN`, and any project/build tooling — is an
//! external collaborator and lives outside this crate.

pub mod arena;
pub mod ast;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compile;
pub mod debug;
pub mod error;
pub mod fix;
pub mod infer;
pub mod intern;
pub mod lexer;
pub mod parser;
pub mod style;
pub mod suggest;
pub mod token;
pub mod trie;
pub mod types;

pub use ast::{Extra, Node, NodeKind};
pub use compile::{compile, CompileError, Stage, Unit};
pub use error::{Diagnostic, DiagnosticKind, MessageSink, Severity};
pub use types::{Type, TypeKind};
