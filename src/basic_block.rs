//! A labeled, linear run of IR instructions plus its successor edges.
//!
//! The successor edges (`exit_true`/`exit_false`) describe the control-flow
//! graph's shape for lowering's own bookkeeping; the jump that actually
//! reaches a successor at runtime is an explicit [`crate::ir::Instr::Jump`]
//! or [`crate::ir::Instr::CondJump`] appended to the block's instruction
//! list, exactly as the tool this crate is modeled on keeps the two separate.

use std::fmt::Write as _;

use crate::ir::{Instr, ResolvedVar};

pub type BlockId = usize;

#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub label: String,
    pub instrs: Vec<Instr>,
    pub exit_true: Option<BlockId>,
    pub exit_false: Option<BlockId>,
    pub test_var: Option<ResolvedVar>,
}

impl BasicBlock {
    pub fn new(label: String) -> Self {
        BasicBlock {
            label,
            instrs: Vec::new(),
            exit_true: None,
            exit_false: None,
            test_var: None,
        }
    }

    pub fn add_instr(&mut self, instr: Instr) {
        self.instrs.push(instr);
    }

    pub fn emit(&self, out: &mut String) {
        let _ = writeln!(out, "{}:", self.label);
        for instr in &self.instrs {
            instr.emit(out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Type;

    #[test]
    fn emit_writes_label_then_each_instruction() {
        let mut bb = BasicBlock::new(".L0".to_string());
        bb.add_instr(Instr::Ldconst {
            dest: ResolvedVar {
                offset: -4,
                ty: Type::Int,
            },
            value: 7,
        });
        let mut out = String::new();
        bb.emit(&mut out);
        assert!(out.starts_with(".L0:\n"));
        assert!(out.contains("movl\t$7, -4(%rbp)"));
    }
}
