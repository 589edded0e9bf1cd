//! Three-address IR instructions and their x86-64 AT&T assembly emission.
//!
//! Every operand is a [`ResolvedVar`] — an offset from `%rbp` plus a type —
//! resolved by the lowering pass at the moment the instruction is built.
//! Emission never needs to consult the symbol table again.

use std::fmt::Write as _;

use crate::ast::Type;
use crate::config::{CHAR_ARG_REGS, INT_ARG_REGS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedVar {
    pub offset: i32,
    pub ty: Type,
}

fn mem(v: ResolvedVar) -> String {
    format!("{}(%rbp)", v.offset)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Eq,
    Neq,
    Lt,
    Gt,
    Le,
    Ge,
}

impl Cmp {
    fn set_suffix(self) -> &'static str {
        match self {
            Cmp::Eq => "sete",
            Cmp::Neq => "setne",
            Cmp::Lt => "setl",
            Cmp::Gt => "setg",
            Cmp::Le => "setle",
            Cmp::Ge => "setge",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    Ldconst {
        dest: ResolvedVar,
        value: i32,
    },
    Copy {
        dest: ResolvedVar,
        src: ResolvedVar,
    },
    Not {
        dest: ResolvedVar,
        src: ResolvedVar,
    },
    Neg {
        dest: ResolvedVar,
        src: ResolvedVar,
    },
    Add {
        dest: ResolvedVar,
        lhs: ResolvedVar,
        rhs: ResolvedVar,
    },
    Sub {
        dest: ResolvedVar,
        lhs: ResolvedVar,
        rhs: ResolvedVar,
    },
    Mul {
        dest: ResolvedVar,
        lhs: ResolvedVar,
        rhs: ResolvedVar,
    },
    Div {
        dest: ResolvedVar,
        lhs: ResolvedVar,
        rhs: ResolvedVar,
    },
    Mod {
        dest: ResolvedVar,
        lhs: ResolvedVar,
        rhs: ResolvedVar,
    },
    Compare {
        op: Cmp,
        dest: ResolvedVar,
        lhs: ResolvedVar,
        rhs: ResolvedVar,
    },
    And {
        dest: ResolvedVar,
        lhs: ResolvedVar,
        rhs: ResolvedVar,
    },
    Or {
        dest: ResolvedVar,
        lhs: ResolvedVar,
        rhs: ResolvedVar,
    },
    Xor {
        dest: ResolvedVar,
        lhs: ResolvedVar,
        rhs: ResolvedVar,
    },
    AddAssign {
        dest: ResolvedVar,
        value: ResolvedVar,
    },
    SubAssign {
        dest: ResolvedVar,
        value: ResolvedVar,
    },
    MulAssign {
        dest: ResolvedVar,
        value: ResolvedVar,
    },
    DivAssign {
        dest: ResolvedVar,
        value: ResolvedVar,
    },
    CondJump {
        test: ResolvedVar,
        true_label: String,
        false_label: String,
    },
    Jump {
        label: String,
    },
    WParam {
        index: usize,
        src: ResolvedVar,
    },
    RParam {
        index: usize,
        dest: ResolvedVar,
    },
    Call {
        name: String,
        dest: Option<ResolvedVar>,
        argc: usize,
    },
    Ret {
        value: Option<ResolvedVar>,
    },
}

impl Instr {
    pub fn emit(&self, out: &mut String) {
        match self {
            Instr::Ldconst { dest, value } => match dest.ty {
                Type::Char => {
                    let _ = writeln!(out, "\tmovb\t${}, {}", *value as i8, mem(*dest));
                }
                _ => {
                    let _ = writeln!(out, "\tmovl\t${}, {}", value, mem(*dest));
                }
            },
            Instr::Copy { dest, src } => emit_copy(out, *dest, *src),
            Instr::Not { dest, src } => {
                let _ = writeln!(out, "\tcmpl\t$0, {}", mem(*src));
                let _ = writeln!(out, "\tsete\t%al");
                let _ = writeln!(out, "\tmovzbl\t%al, %eax");
                let _ = writeln!(out, "\tmovl\t%eax, {}", mem(*dest));
            }
            Instr::Neg { dest, src } => {
                let _ = writeln!(out, "\tmovl\t{}, %eax", mem(*src));
                let _ = writeln!(out, "\tnegl\t%eax");
                let _ = writeln!(out, "\tmovl\t%eax, {}", mem(*dest));
            }
            Instr::Add { dest, lhs, rhs } => emit_arith(out, "addl", *dest, *lhs, *rhs),
            Instr::Sub { dest, lhs, rhs } => emit_arith(out, "subl", *dest, *lhs, *rhs),
            Instr::Mul { dest, lhs, rhs } => emit_arith(out, "imull", *dest, *lhs, *rhs),
            Instr::Div { dest, lhs, rhs } => {
                let _ = writeln!(out, "\tmovl\t{}, %eax", mem(*lhs));
                let _ = writeln!(out, "\tcltd");
                let _ = writeln!(out, "\tidivl\t{}", mem(*rhs));
                let _ = writeln!(out, "\tmovl\t%eax, {}", mem(*dest));
            }
            Instr::Mod { dest, lhs, rhs } => {
                let _ = writeln!(out, "\tmovl\t{}, %eax", mem(*lhs));
                let _ = writeln!(out, "\tcltd");
                let _ = writeln!(out, "\tmovl\t{}, %ebx", mem(*rhs));
                let _ = writeln!(out, "\tidivl\t%ebx");
                let _ = writeln!(out, "\tmovl\t%edx, {}", mem(*dest));
            }
            Instr::Compare { op, dest, lhs, rhs } => {
                let _ = writeln!(out, "\tmovl\t{}, %eax", mem(*lhs));
                let _ = writeln!(out, "\tcmpl\t{}, %eax", mem(*rhs));
                let _ = writeln!(out, "\t{}\t%al", op.set_suffix());
                let _ = writeln!(out, "\tmovzbl\t%al, %eax");
                let _ = writeln!(out, "\tmovl\t%eax, {}", mem(*dest));
            }
            Instr::And { dest, lhs, rhs } => {
                let _ = writeln!(out, "\tmovl\t{}, %eax", mem(*lhs));
                let _ = writeln!(out, "\tandl\t{}, %eax", mem(*rhs));
                let _ = writeln!(out, "\tmovl\t%eax, {}", mem(*dest));
            }
            Instr::Or { dest, lhs, rhs } => {
                let _ = writeln!(out, "\tmovl\t{}, %eax", mem(*lhs));
                let _ = writeln!(out, "\torl\t{}, %eax", mem(*rhs));
                let _ = writeln!(out, "\tmovl\t%eax, {}", mem(*dest));
            }
            Instr::Xor { dest, lhs, rhs } => {
                let _ = writeln!(out, "\tmovl\t{}, %eax", mem(*lhs));
                let _ = writeln!(out, "\tmovl\t{}, %edx", mem(*rhs));
                let _ = writeln!(out, "\txorl\t%edx, %eax");
                let _ = writeln!(out, "\tmovl\t%eax, {}", mem(*dest));
            }
            Instr::AddAssign { dest, value } => emit_compound(out, "addl", *dest, *value),
            Instr::SubAssign { dest, value } => emit_compound(out, "subl", *dest, *value),
            Instr::MulAssign { dest, value } => emit_compound(out, "imull", *dest, *value),
            Instr::DivAssign { dest, value } => {
                let _ = writeln!(out, "\tmovl\t{}, %eax", mem(*dest));
                let _ = writeln!(out, "\tcltd");
                let _ = writeln!(out, "\tidivl\t{}", mem(*value));
                let _ = writeln!(out, "\tmovl\t%eax, {}", mem(*dest));
            }
            Instr::CondJump {
                test,
                true_label,
                false_label,
            } => {
                let _ = writeln!(out, "\tcmpl\t$0, {}", mem(*test));
                let _ = writeln!(out, "\tjne\t{true_label}");
                let _ = writeln!(out, "\tjmp\t{false_label}");
            }
            Instr::Jump { label } => {
                let _ = writeln!(out, "\tjmp\t{label}");
            }
            Instr::WParam { index, src } => emit_wparam(out, *index, *src),
            Instr::RParam { index, dest } => emit_rparam(out, *index, *dest),
            Instr::Call { name, dest, argc } => {
                let _ = writeln!(out, "\tcall\t{name}");
                if *argc > 6 {
                    let _ = writeln!(out, "\tsubq\t${}, %rsp", (*argc - 6) * 8);
                }
                if let Some(dest) = dest {
                    let _ = writeln!(out, "\tmovl\t%eax, {}", mem(*dest));
                }
            }
            Instr::Ret { value } => {
                if let Some(v) = value {
                    match v.ty {
                        Type::Char => {
                            let _ = writeln!(out, "\tmovsbl\t{}, %eax", mem(*v));
                        }
                        _ => {
                            let _ = writeln!(out, "\tmovl\t{}, %eax", mem(*v));
                        }
                    }
                }
                let _ = writeln!(out, "\tmovq\t%rbp, %rsp");
                let _ = writeln!(out, "\tpopq\t%rbp");
                let _ = writeln!(out, "\tret");
            }
        }
    }
}

fn emit_copy(out: &mut String, dest: ResolvedVar, src: ResolvedVar) {
    match (src.ty, dest.ty) {
        (Type::Char, Type::Int) => {
            let _ = writeln!(out, "\tmovsbl\t{}, %eax", mem(src));
            let _ = writeln!(out, "\tmovl\t%eax, {}", mem(dest));
        }
        (Type::Int, Type::Char) => {
            let _ = writeln!(out, "\tmovl\t{}, %eax", mem(src));
            let _ = writeln!(out, "\tmovb\t%al, {}", mem(dest));
        }
        (Type::Char, Type::Char) => {
            let _ = writeln!(out, "\tmovb\t{}, %al", mem(src));
            let _ = writeln!(out, "\tmovb\t%al, {}", mem(dest));
        }
        _ => {
            let _ = writeln!(out, "\tmovl\t{}, %eax", mem(src));
            let _ = writeln!(out, "\tmovl\t%eax, {}", mem(dest));
        }
    }
}

fn emit_arith(out: &mut String, op: &str, dest: ResolvedVar, lhs: ResolvedVar, rhs: ResolvedVar) {
    let _ = writeln!(out, "\tmovl\t{}, %eax", mem(lhs));
    let _ = writeln!(out, "\t{op}\t{}, %eax", mem(rhs));
    let _ = writeln!(out, "\tmovl\t%eax, {}", mem(dest));
}

fn emit_compound(out: &mut String, op: &str, dest: ResolvedVar, value: ResolvedVar) {
    let _ = writeln!(out, "\tmovl\t{}, %eax", mem(dest));
    let _ = writeln!(out, "\t{op}\t{}, %eax", mem(value));
    let _ = writeln!(out, "\tmovl\t%eax, {}", mem(dest));
}

fn emit_wparam(out: &mut String, index: usize, src: ResolvedVar) {
    if let Some(&reg) = if src.ty == Type::Char {
        CHAR_ARG_REGS.get(index)
    } else {
        INT_ARG_REGS.get(index)
    } {
        match src.ty {
            Type::Char => {
                let _ = writeln!(out, "\tmovb\t{}, %al", mem(src));
                let _ = writeln!(out, "\tmovb\t%al, {reg}");
            }
            _ => {
                let _ = writeln!(out, "\tmovl\t{}, %eax", mem(src));
                let _ = writeln!(out, "\tmovl\t%eax, {reg}");
            }
        }
    } else {
        let _ = writeln!(out, "\tmovslq\t{}, %rax", mem(src));
        let _ = writeln!(out, "\tpushq\t%rax");
    }
}

fn emit_rparam(out: &mut String, index: usize, dest: ResolvedVar) {
    if let Some(&reg) = if dest.ty == Type::Char {
        CHAR_ARG_REGS.get(index)
    } else {
        INT_ARG_REGS.get(index)
    } {
        match dest.ty {
            Type::Char => {
                let _ = writeln!(out, "\tmovb\t{reg}, {}", mem(dest));
            }
            _ => {
                let _ = writeln!(out, "\tmovl\t{reg}, {}", mem(dest));
            }
        }
    } else {
        let stack_slot = 16 + 8 * (index - 6);
        let _ = writeln!(out, "\tmovq\t{stack_slot}(%rbp), %rax");
        match dest.ty {
            Type::Char => {
                let _ = writeln!(out, "\tmovb\t%al, {}", mem(dest));
            }
            _ => {
                let _ = writeln!(out, "\tmovl\t%eax, {}", mem(dest));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(offset: i32, ty: Type) -> ResolvedVar {
        ResolvedVar { offset, ty }
    }

    #[test]
    fn ldconst_int_uses_movl() {
        let mut out = String::new();
        Instr::Ldconst {
            dest: v(-4, Type::Int),
            value: 42,
        }
        .emit(&mut out);
        assert!(out.contains("movl\t$42, -4(%rbp)"));
    }

    #[test]
    fn copy_char_to_int_sign_extends() {
        let mut out = String::new();
        Instr::Copy {
            dest: v(-4, Type::Int),
            src: v(-5, Type::Char),
        }
        .emit(&mut out);
        assert!(out.contains("movsbl"));
    }

    #[test]
    fn div_reads_divisor_directly_from_memory() {
        let mut out = String::new();
        Instr::Div {
            dest: v(-4, Type::Int),
            lhs: v(-8, Type::Int),
            rhs: v(-12, Type::Int),
        }
        .emit(&mut out);
        assert!(out.contains("idivl\t-12(%rbp)"));
    }

    #[test]
    fn mod_copies_divisor_into_register_first() {
        let mut out = String::new();
        Instr::Mod {
            dest: v(-4, Type::Int),
            lhs: v(-8, Type::Int),
            rhs: v(-12, Type::Int),
        }
        .emit(&mut out);
        assert!(out.contains("movl\t-12(%rbp), %ebx"));
        assert!(out.contains("idivl\t%ebx"));
    }

    #[test]
    fn cond_jump_tests_and_branches_both_ways() {
        let mut out = String::new();
        Instr::CondJump {
            test: v(-4, Type::Int),
            true_label: ".L1".into(),
            false_label: ".L2".into(),
        }
        .emit(&mut out);
        assert!(out.contains("jne\t.L1"));
        assert!(out.contains("jmp\t.L2"));
    }

    #[test]
    fn call_with_six_or_fewer_args_has_no_stack_restore() {
        let mut out = String::new();
        Instr::Call {
            name: "f".into(),
            dest: None,
            argc: 6,
        }
        .emit(&mut out);
        assert!(!out.contains("subq"));
    }

    #[test]
    fn call_with_more_than_six_args_restores_the_stack() {
        let mut out = String::new();
        Instr::Call {
            name: "f".into(),
            dest: Some(v(-4, Type::Int)),
            argc: 8,
        }
        .emit(&mut out);
        assert!(out.contains("call\tf"));
        assert!(out.contains("subq\t$16, %rsp"));
        assert!(out.contains("movl\t%eax, -4(%rbp)"));
    }

    #[test]
    fn ret_with_value_moves_into_eax_before_epilogue() {
        let mut out = String::new();
        Instr::Ret {
            value: Some(v(-4, Type::Int)),
        }
        .emit(&mut out);
        assert!(out.contains("movl\t-4(%rbp), %eax"));
        assert!(out.contains("popq\t%rbp"));
        assert!(out.contains("ret"));
    }
}
