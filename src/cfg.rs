//! Owns the basic blocks of one function and the program-wide preamble.

use std::fmt::Write as _;

use crate::basic_block::{BasicBlock, BlockId};
use crate::config::STACK_ALIGNMENT;

pub struct Cfg {
    pub name: String,
    pub blocks: Vec<BasicBlock>,
}

impl Cfg {
    pub fn new(name: impl Into<String>) -> Self {
        Cfg {
            name: name.into(),
            blocks: Vec::new(),
        }
    }

    /// Creates a block labeled `.bbN`, where `N` comes from a counter shared
    /// across every function in the program (the whole emitted program is one
    /// label namespace, same as the tool this crate is modeled on, which
    /// keeps a single CFG for the entire translation unit).
    pub fn create_block(&mut self, next_label: &mut usize) -> BlockId {
        let label = format!(".bb{next_label}");
        *next_label += 1;
        self.blocks.push(BasicBlock::new(label));
        self.blocks.len() - 1
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id]
    }

    pub fn label_of(&self, id: BlockId) -> String {
        self.blocks[id].label.clone()
    }

    /// Emits `.globl`/function label/prologue, then every block in creation
    /// order. `frame_size` is the unaligned byte count the symbol table
    /// reports for this function; it is rounded up to `STACK_ALIGNMENT`.
    pub fn emit_function(&self, out: &mut String, frame_size: i32) {
        let _ = writeln!(out, ".globl {}", self.name);
        let _ = writeln!(out, "\t.type\t{}, @function", self.name);
        let _ = writeln!(out, "{}:", self.name);
        let _ = writeln!(out, "\tpushq\t%rbp");
        let _ = writeln!(out, "\tmovq\t%rsp, %rbp");
        let aligned = align_frame(frame_size);
        if aligned > 0 {
            let _ = writeln!(out, "\tsubq\t${aligned}, %rsp");
        }
        for block in &self.blocks {
            block.emit(out);
        }
        let _ = writeln!(out);
    }
}

fn align_frame(size: i32) -> i32 {
    let size = size.max(0);
    let rem = size % STACK_ALIGNMENT;
    if rem == 0 {
        size
    } else {
        size + (STACK_ALIGNMENT - rem)
    }
}

pub fn emit_text_section_header(out: &mut String) {
    let _ = writeln!(out, ".text");
}

/// Verbatim bodies for the two built-ins, each a one-byte Linux syscall
/// (`write`=1, `read`=0) against a scratch byte pushed on the stack.
pub fn emit_standard_functions(out: &mut String, need_putchar: bool, need_getchar: bool) {
    if need_putchar {
        emit_putchar(out);
    }
    if need_getchar {
        emit_getchar(out);
    }
}

fn emit_putchar(out: &mut String) {
    let _ = writeln!(out, "putchar:");
    let _ = writeln!(out, "\tpushq\t%rbp");
    let _ = writeln!(out, "\tmovq\t%rsp, %rbp");
    let _ = writeln!(out, "\tpushq\t%rdi");
    let _ = writeln!(out, "\tmov\t$1, %rax");
    let _ = writeln!(out, "\tmov\t$1, %rdi");
    let _ = writeln!(out, "\tmov\t%rsp, %rsi");
    let _ = writeln!(out, "\tmov\t$1, %rdx");
    let _ = writeln!(out, "\tsyscall");
    let _ = writeln!(out, "\tadd\t$8, %rsp");
    let _ = writeln!(out, "\tmovl\t$1, %eax");
    let _ = writeln!(out, "\tleave");
    let _ = writeln!(out, "\tret");
    let _ = writeln!(out);
}

fn emit_getchar(out: &mut String) {
    let _ = writeln!(out, "getchar:");
    let _ = writeln!(out, "\tpushq\t%rbp");
    let _ = writeln!(out, "\tmovq\t%rsp, %rbp");
    let _ = writeln!(out, "\txor\t%eax, %eax");
    let _ = writeln!(out, "\txor\t%edi, %edi");
    let _ = writeln!(out, "\tmovq\t8(%rsp), %r8");
    let _ = writeln!(out, "\tlea\t8(%rsp), %rsi");
    let _ = writeln!(out, "\tmovl\t$1, %edx");
    let _ = writeln!(out, "\tsyscall");
    let _ = writeln!(out, "\tmovzbl\t8(%rsp), %eax");
    let _ = writeln!(out, "\tmovq\t%r8, 8(%rsp)");
    let _ = writeln!(out, "\tleave");
    let _ = writeln!(out, "\tret");
    let _ = writeln!(out);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_block_assigns_unique_labels() {
        let mut cfg = Cfg::new("f");
        let mut counter = 0;
        let a = cfg.create_block(&mut counter);
        let b = cfg.create_block(&mut counter);
        assert_ne!(cfg.label_of(a), cfg.label_of(b));
    }

    #[test]
    fn block_labels_follow_the_bbn_format_dense_from_a_shared_counter() {
        let mut cfg = Cfg::new("f");
        let mut counter = 0;
        let a = cfg.create_block(&mut counter);
        let b = cfg.create_block(&mut counter);
        assert_eq!(cfg.label_of(a), ".bb0");
        assert_eq!(cfg.label_of(b), ".bb1");
    }

    #[test]
    fn frame_size_rounds_up_to_16() {
        let cfg = Cfg::new("f");
        let mut out = String::new();
        cfg.emit_function(&mut out, 4);
        assert!(out.contains("subq\t$16, %rsp"));
    }

    #[test]
    fn zero_frame_omits_subq() {
        let cfg = Cfg::new("f");
        let mut out = String::new();
        cfg.emit_function(&mut out, 0);
        assert!(!out.contains("subq"));
    }

    #[test]
    fn standard_functions_only_emitted_when_needed() {
        let mut out = String::new();
        emit_standard_functions(&mut out, true, false);
        assert!(out.contains("putchar:"));
        assert!(!out.contains("getchar:"));
    }
}
