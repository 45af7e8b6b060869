//! Top-level orchestration (§9): owns every process-wide singleton and
//! drives one source file through parse → elaborate → TAC → RTL → ASM.

use std::path::Path;

use crate::asm;
use crate::ast;
use crate::diagnostics::{CompileError, CompileErrorKind, FileSpan};
use crate::frontend;
use crate::rtl;
use crate::symtab::SymbolTable;
use crate::tac;
use crate::types::TypeRegistry;

/// The pipeline's process-wide state (§5): type interning, the TAC label
/// counter, and the RTL string pool all live here so every function
/// shares one instance across the whole run. The register pool is reset
/// between functions rather than shared, since its allocations never
/// outlive a single function's RTL lowering.
pub struct Compiler {
    pub types: TypeRegistry,
    pub symtab: SymbolTable,
    labels: tac::LabelCounter,
    strings: rtl::StringPool,
    pool: rtl::RegPool,
}

/// Everything produced along the way, kept around so `--show-*` flags
/// can dump any stage without recomputing it.
#[derive(Debug)]
pub struct CompileOutput {
    pub ast: Vec<ast::FuncDefn>,
    pub tac: Vec<tac::Func>,
    pub rtl: Vec<rtl::Func>,
    pub asm: String,
}

impl Compiler {
    #[must_use]
    pub fn new() -> Self {
        Compiler {
            types: TypeRegistry::new(),
            symtab: SymbolTable::new(),
            labels: tac::LabelCounter::default(),
            strings: rtl::StringPool::new(),
            pool: rtl::RegPool::new(),
        }
    }

    /// Runs the full pipeline on one source file through the assembly
    /// stage. `file` is used only for diagnostics.
    pub fn compile(&mut self, src: &str, file: &Path) -> Result<CompileOutput, CompileError> {
        let parse_tree = frontend::parse_program(src, &mut |s| {
            self.strings.get_string_id(s);
        })
        .map_err(|e| CompileError {
            span: FileSpan::new(file.to_path_buf(), e.line),
            kind: CompileErrorKind::Parse(e),
            aux: None,
        })?;

        let mut elaborator = ast::elaborate::Elaborator::new(&mut self.types, &mut self.symtab, file);
        let ast_funcs = elaborator.program(&parse_tree)?;

        let tac_funcs = tac::lower::lower_program(&ast_funcs, &self.types, &mut self.labels);

        let mut rtl_funcs = Vec::with_capacity(tac_funcs.len());
        for f in &tac_funcs {
            let lowered = rtl::lower::lower_func(f, &mut self.pool, &mut self.strings).map_err(|e| CompileError {
                span: FileSpan::new(file.to_path_buf(), 0),
                kind: CompileErrorKind::RegAlloc(e),
                aux: None,
            })?;
            rtl_funcs.push(lowered);
        }

        let asm_text = asm::emit::emit_program(&rtl_funcs, &self.symtab, &self.types, self.strings.entries());

        Ok(CompileOutput { ast: ast_funcs, tac: tac_funcs, rtl: rtl_funcs, asm: asm_text })
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}
