//! Compiler library for a subset of a C-like language, emitting x86-64
//! AT&T-syntax assembly.

pub mod ast;
pub mod basic_block;
pub mod cfg;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod ir;
pub mod lexer;
pub mod lowering;
pub mod parser;
pub mod symbol_table;

use std::fs;
use std::path::Path;

pub use diagnostics::Diagnostics;
pub use error::CompileError;

/// Compiles a whole program. On success, returns the generated assembly
/// alongside the diagnostics collected (which may still hold warnings).
/// Semantic errors are reported through `diagnostics`, not as an `Err`: a
/// syntactically valid program with an ERROR-severity diagnostic still
/// returns `Ok` with empty assembly text, letting the caller decide how to
/// report it (matching the two-layer split in the error handling design —
/// `CompileError` is for tooling failures, not for errors in the program
/// being compiled).
pub fn compile_source(source: &str) -> Result<(String, Diagnostics), CompileError> {
    let program = parser::parse(source)?;
    let output = lowering::Lowering::new().lower(&program);

    if output.diagnostics.has_error() {
        return Ok((String::new(), output.diagnostics));
    }

    let mut asm = String::new();
    cfg::emit_text_section_header(&mut asm);
    cfg::emit_standard_functions(&mut asm, output.need_putchar, output.need_getchar);
    for (func_cfg, frame_size) in &output.functions {
        func_cfg.emit_function(&mut asm, *frame_size);
    }
    Ok((asm, output.diagnostics))
}

pub fn compile_file(path: &Path) -> Result<(String, Diagnostics), CompileError> {
    let source = fs::read_to_string(path)?;
    compile_source(&source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_trivial_main() {
        let (asm, diag) = compile_source("int main() { return 0; }").unwrap();
        assert!(!diag.has_error());
        assert!(asm.contains(".globl main"));
        assert!(asm.contains("ret"));
    }

    #[test]
    fn semantic_error_yields_empty_assembly_but_ok_result() {
        let (asm, diag) = compile_source("int main() { return x; }").unwrap();
        assert!(diag.has_error());
        assert!(asm.is_empty());
    }

    #[test]
    fn syntax_error_is_a_compile_error() {
        assert!(compile_source("int main( { return 0; }").is_err());
    }

    #[test]
    fn putchar_pulls_in_its_builtin_body() {
        let (asm, diag) = compile_source("int main() { putchar('a'); return 0; }").unwrap();
        assert!(!diag.has_error());
        assert!(asm.contains("putchar:"));
        assert!(!asm.contains("getchar:"));
    }
}
