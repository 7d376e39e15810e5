//! Message sink and the closed diagnostic taxonomy.
//!
//! All non-fatal conditions from every pass are posted here with their
//! source position; the pass then continues with a best-effort partial
//! result. Nothing in this module ever panics or short-circuits a
//! pass — that's the whole point of a sink instead of `Result`.
//! Fatal conditions (arena exhaustion, dictionary overflow, internal
//! invariant violations, expression-depth overflow) print a
//! diagnostic and terminate the process instead of going through the
//! sink; see [`fatal`].

use crate::style::Style;
use crate::suggest::find_similar;
use crate::token::Pos;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Hint,
}

/// Closed error/warning/hint taxonomy.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticKind {
    // Lexer
    InvalidDigit,
    IntegerTooBig,
    InvalidFloatExponent,
    InvalidNumberLeadingZero,
    InvalidCharacter { found: char },
    BadStringEscape,
    UnclosedString,

    // Parser
    ExpectedTokenMissing { expected: String },
    UnexpectedToken { expected: String, found: String },
    OperandMustBeLvalue,

    // Inference
    UndefinedIdentifier { name: String, suggestion: Option<String> },
    Redefinition { name: String },
    FuncRedefinition { name: String },
    IdentTaken { name: String, taken_as: String },
    UnknownType { name: String },
    BadOperandsType { operator: String, got_type: String },
    GotBadArgs { got_sig: String, expected_sigs: String },
    CannotAssignToConst { name: String },
    NonConstInConstExpression,
    BadReturnType { got: String, expected: String },
    FuncMustReturnValue,
    UnreachableCode,
    FuncDeclaredUnderScope,
    BangUsedAsNot,
    NotAFunction { name: String },
    InvalidExprUsed,
    NoReturnValueNeeded,
    CircularDefinition { name: String },

    // Fix pass
    UnexpectedBool,

    // Warnings
    ConversionDataLoss { from: String, to: String },
    StatementHasNoEffect,
    ComparingSignedAndUnsigned,
}

impl DiagnosticKind {
    pub fn severity(&self) -> Severity {
        use DiagnosticKind::*;
        match self {
            ConversionDataLoss { .. } | StatementHasNoEffect | ComparingSignedAndUnsigned => {
                Severity::Warning
            }
            _ => Severity::Error,
        }
    }

    pub fn message(&self) -> String {
        use DiagnosticKind::*;
        match self {
            InvalidDigit => "invalid digit in number literal".to_string(),
            IntegerTooBig => "integer literal too big (overflows 64-bit unsigned)".to_string(),
            InvalidFloatExponent => "invalid exponent in float literal".to_string(),
            InvalidNumberLeadingZero => "number literal cannot have a leading zero".to_string(),
            InvalidCharacter { found } => format!("unexpected character '{found}'"),
            BadStringEscape => "invalid escape sequence in string literal".to_string(),
            UnclosedString => "unclosed string literal".to_string(),
            ExpectedTokenMissing { expected } => format!("expected {expected}"),
            UnexpectedToken { expected, found } => {
                format!("expected {expected}, got {found}")
            }
            OperandMustBeLvalue => "operand must be an assignable location".to_string(),
            UndefinedIdentifier { name, suggestion } => match suggestion {
                Some(s) => format!("undefined identifier '{name}' (did you mean '{s}'?)"),
                None => format!("undefined identifier '{name}'"),
            },
            Redefinition { name } => format!("'{name}' is already defined in this scope"),
            FuncRedefinition { name } => {
                format!("function '{name}' redefined with the same parameter types")
            }
            IdentTaken { name, taken_as } => {
                format!("'{name}' is already taken as a {taken_as}")
            }
            UnknownType { name } => format!("unknown type '{name}'"),
            BadOperandsType { operator, got_type } => {
                format!("operator '{operator}' cannot be applied to {got_type}")
            }
            GotBadArgs { got_sig, expected_sigs } => {
                format!("call {got_sig} does not match any candidate:\n     {expected_sigs}")
            }
            CannotAssignToConst { name } => format!("cannot assign to constant '{name}'"),
            NonConstInConstExpression => {
                "only constant expressions are allowed here".to_string()
            }
            BadReturnType { got, expected } => {
                format!("return type mismatch: got {got}, expected {expected}")
            }
            FuncMustReturnValue => "function must return a value".to_string(),
            UnreachableCode => "unreachable code".to_string(),
            FuncDeclaredUnderScope => "functions cannot be declared inside a nested scope".to_string(),
            BangUsedAsNot => "'!' used where 'not' was expected".to_string(),
            NotAFunction { name } => format!("'{name}' is not a function"),
            InvalidExprUsed => "invalid expression used in this position".to_string(),
            NoReturnValueNeeded => "function returning Void cannot return a value".to_string(),
            CircularDefinition { name } => format!("circular definition of constant '{name}'"),
            UnexpectedBool => "expected a non-bool expression here".to_string(),
            ConversionDataLoss { from, to } => {
                format!("conversion from {from} to {to} may lose data")
            }
            StatementHasNoEffect => "statement has no effect".to_string(),
            ComparingSignedAndUnsigned => "comparing signed and unsigned values".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub pos: Pos,
}

impl Diagnostic {
    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    /// Renders the diagnostic with an ANSI-colored source snippet.
    pub fn display_with_source(&self, filename: &str, source: &str) -> String {
        let line_content = source.lines().nth(self.pos.line.saturating_sub(1) as usize).unwrap_or("");
        let col = self.pos.col.saturating_sub(1) as usize;
        let underline = format!("{}^", " ".repeat(col));

        let label = match self.severity() {
            Severity::Error => Style::bold_red("error"),
            Severity::Warning => Style::yellow("warning"),
            Severity::Hint => Style::cyan("hint"),
        };
        let location = Style::blue(&format!("{filename}:{}:{}", self.pos.line, self.pos.col));
        let pipe = Style::blue("|");

        format!(
            "{label}: {}\n  {location}\n  {pipe} {line_content}\n  {pipe} {}",
            self.kind.message(),
            Style::red(&underline),
        )
    }
}

/// Accumulates diagnostics with source positions. Append-only
/// from one thread; flushed in insertion order once all
/// passes complete.
#[derive(Debug, Default)]
pub struct MessageSink {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
    warning_count: usize,
    hint_count: usize,
}

impl MessageSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: DiagnosticKind, pos: Pos) {
        match kind.severity() {
            Severity::Error => self.error_count += 1,
            Severity::Warning => self.warning_count += 1,
            Severity::Hint => self.hint_count += 1,
        }
        self.diagnostics.push(Diagnostic { kind, pos });
    }

    /// Posts an `UndefinedIdentifier` diagnostic, attaching a "did you
    /// mean" suggestion drawn from identifiers actually visible at
    /// this point (not a static word list).
    pub fn undefined_identifier(&mut self, name: &str, candidates: &[&str], pos: Pos) {
        let suggestion = find_similar(name, candidates, 2).map(str::to_string);
        self.push(
            DiagnosticKind::UndefinedIdentifier {
                name: name.to_string(),
                suggestion,
            },
            pos,
        );
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn flush(&self, filename: &str, source: &str) {
        for d in &self.diagnostics {
            eprintln!("{}", d.display_with_source(filename, source));
        }
    }
}

/// Builds the "gotCall(sig) expected one of ..." shape used for
/// `GotBadArgs`.
pub fn format_call_signature(name: &str, arg_types: &[&str]) -> String {
    format!("{name}({})", arg_types.join(","))
}

pub fn format_candidate_signatures(name: &str, overloads: &[Vec<&str>]) -> String {
    overloads
        .iter()
        .map(|params| format!("{name}({})", params.join(",")))
        .collect::<Vec<_>>()
        .join("\n     ")
}

/// Fatal conditions: print a diagnostic and terminate.
/// Never routed through [`MessageSink`].
#[cold]
pub fn fatal(message: &str) -> ! {
    eprintln!("{}: {message}", Style::bold_red("fatal"));
    std::process::exit(1);
}
