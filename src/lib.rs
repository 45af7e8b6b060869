//! A statically-typed C-like language compiler targeting MIPS/SPIM
//! assembly: lexer and recursive-descent parser, a typed AST elaborator,
//! three-address code, a register-transfer IR, and an assembly emitter.

pub mod asm;
pub mod ast;
pub mod compiler;
pub mod diagnostics;
pub mod dump;
pub mod frontend;
pub mod parse_tree;
pub mod rtl;
pub mod symtab;
pub mod tac;
pub mod types;

pub use compiler::{CompileOutput, Compiler};
pub use diagnostics::CompileError;
