//! Error types for every pipeline stage, and the `sclp error: <file>:<line>`
//! wire format used to report them.

use std::fmt;
use std::path::PathBuf;

/// A source location: the input file plus a 1-based line number.
/// A line of `0` means "no specific line" (e.g. a whole-program error).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileSpan {
    pub file: PathBuf,
    pub line: usize,
}

impl FileSpan {
    #[must_use]
    pub fn new(file: impl Into<PathBuf>, line: usize) -> Self {
        FileSpan { file: file.into(), line }
    }
}

/// Why a semantic type could not be constructed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeError {
    VoidArrayElement,
    FuncArrayElement,
    ZeroLengthArray,
    FuncReturningFunc,
    FuncReturningArray,
    FuncParamIsFunc,
    VoidVariable,
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            TypeError::VoidArrayElement => "array of void is not allowed",
            TypeError::FuncArrayElement => "array of function type is not allowed",
            TypeError::ZeroLengthArray => "array length must be nonzero",
            TypeError::FuncReturningFunc => "function returning function is not allowed",
            TypeError::FuncReturningArray => "function returning array is not allowed",
            TypeError::FuncParamIsFunc => "function parameter of function type is not allowed",
            TypeError::VoidVariable => "a variable may not have type void",
        };
        f.write_str(msg)
    }
}

/// One symbol-table insertion failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SymbolError {
    VarRedeclared(String),
    FuncRedeclaredDifferentSignature(String),
    FuncShadowsVar(String),
    VarShadowsFunc(String),
    Undeclared(String),
}

impl fmt::Display for SymbolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolError::VarRedeclared(n) => write!(f, "Symbol {n} redeclared"),
            SymbolError::FuncRedeclaredDifferentSignature(n) => {
                write!(f, "Symbol {n} redeclared with a different signature")
            }
            SymbolError::FuncShadowsVar(n) => write!(f, "Symbol {n} redeclared"),
            SymbolError::VarShadowsFunc(n) => write!(f, "Symbol {n} redeclared"),
            SymbolError::Undeclared(n) => write!(f, "Undeclared symbol {n}"),
        }
    }
}

/// A semantic error raised during elaboration or TAC generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SemanticErrorKind {
    BadDeclaration(TypeError),
    Symbol(SymbolError),
    TypeMismatch { context: String, reason: String },
    ConstViolation { what: String },
    IncompleteReturn { func: String },
    VoidReturnMismatch { func: String },
    BreakOutsideLoop,
    ContinueOutsideLoop,
    IgnoredResult { func: String },
    ArityMismatch { func: String, expected: usize, found: usize },
}

impl fmt::Display for SemanticErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemanticErrorKind::BadDeclaration(e) => write!(f, "Bad declaration: {e}"),
            SemanticErrorKind::Symbol(e) => write!(f, "{e}"),
            SemanticErrorKind::TypeMismatch { context, reason } => {
                write!(f, "Type mismatch in {context}: {reason}")
            }
            SemanticErrorKind::ConstViolation { what } => {
                write!(f, "Cannot write through const {what}")
            }
            SemanticErrorKind::IncompleteReturn { func } => {
                write!(f, "Function {func} does not return on all paths")
            }
            SemanticErrorKind::VoidReturnMismatch { func } => {
                write!(f, "Return statement mismatched with declared type of {func}")
            }
            SemanticErrorKind::BreakOutsideLoop => write!(f, "Break statement outside loop"),
            SemanticErrorKind::ContinueOutsideLoop => write!(f, "Continue statement outside loop"),
            SemanticErrorKind::IgnoredResult { func } => {
                write!(f, "Ignored non-void result of call to {func}")
            }
            SemanticErrorKind::ArityMismatch { func, expected, found } => {
                write!(f, "Function {func} expects {expected} arguments, found {found}")
            }
        }
    }
}

/// Register-bank exhaustion, the one internal invariant the redesign makes
/// a typed, reportable error instead of a process abort.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegBank {
    Int,
    Float,
}

impl fmt::Display for RegBank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegBank::Int => f.write_str("integer"),
            RegBank::Float => f.write_str("floating-point"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegAllocError {
    pub bank: RegBank,
    pub func: String,
}

impl fmt::Display for RegAllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} register bank exhausted while compiling {}", self.bank, self.func)
    }
}

/// A failure in the minimal frontend reader (§6a).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// One diagnostic, with an optional auxiliary clause, matching the original
/// program's `sclp error: <file>:<line>\n<message>[: <auxiliary>]` format.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileError {
    pub span: FileSpan,
    pub kind: CompileErrorKind,
    pub aux: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompileErrorKind {
    Parse(ParseError),
    Semantic(SemanticErrorKind),
    RegAlloc(RegAllocError),
}

impl fmt::Display for CompileErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileErrorKind::Parse(e) => write!(f, "{e}"),
            CompileErrorKind::Semantic(e) => write!(f, "{e}"),
            CompileErrorKind::RegAlloc(e) => write!(f, "{e}"),
        }
    }
}

impl CompileError {
    #[must_use]
    pub fn semantic(span: FileSpan, kind: SemanticErrorKind) -> Self {
        CompileError { span, kind: CompileErrorKind::Semantic(kind), aux: None }
    }

    #[must_use]
    pub fn with_aux(mut self, aux: impl Into<String>) -> Self {
        self.aux = Some(aux.into());
        self
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sclp error:")?;
        if self.span.line > 0 {
            write!(f, " {}:{}", self.span.file.display(), self.span.line)?;
        }
        write!(f, "\n{}", self.kind)?;
        if let Some(aux) = &self.aux {
            write!(f, ": {aux}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}
