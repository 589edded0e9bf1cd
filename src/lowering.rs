//! Semantic analysis and IR construction: walks the AST, populates the
//! symbol table and a [`Cfg`] per function, and reports through
//! [`Diagnostics`].

use crate::ast::*;
use crate::cfg::Cfg;
use crate::config;
use crate::diagnostics::Diagnostics;
use crate::ir::{Cmp, Instr, ResolvedVar};
use crate::symbol_table::{Presence, ScopeId, SymbolTable};

/// Replaces the original tool's shared sentinel descriptor: an expression
/// that failed to resolve yields `Poisoned` and propagates silently through
/// its ancestors, so one ERROR at a leaf never cascades into a pile of
/// derivative ones at every enclosing operator.
enum LowerResult {
    Value(ResolvedVar),
    Poisoned,
}
use LowerResult::{Poisoned, Value};

struct FnCtx {
    current_block: usize,
    scope: ScopeId,
    return_type: Type,
    name: String,
}

/// Everything the CLI driver needs to finish emitting a compiled program.
pub struct LowerOutput {
    pub functions: Vec<(Cfg, i32)>,
    pub diagnostics: Diagnostics,
    pub need_putchar: bool,
    pub need_getchar: bool,
}

pub struct Lowering {
    symtab: SymbolTable,
    diag: Diagnostics,
    /// Shared across every function: block labels (`.bbN`) are dense across
    /// the whole emitted program, not restarting per function, matching the
    /// tool this crate is modeled on (a single CFG for the whole translation
    /// unit).
    block_counter: usize,
}

impl Default for Lowering {
    fn default() -> Self {
        Self::new()
    }
}

impl Lowering {
    pub fn new() -> Self {
        Lowering {
            symtab: SymbolTable::new(),
            diag: Diagnostics::new(),
            block_counter: 0,
        }
    }

    /// Lowers a whole program. Returns one `(Cfg, frame_size)` per function
    /// body that was lowered (`main` last), the diagnostics collected, and
    /// whether either built-in needs its body emitted.
    pub fn lower(mut self, program: &Program) -> LowerOutput {
        self.register_builtins();
        for f in &program.functions {
            self.register_function_header(f);
        }

        let mut cfgs = Vec::new();
        for f in &program.functions {
            cfgs.push(self.lower_function(f));
        }

        match &program.main {
            Some(main) => cfgs.push(self.lower_main(main)),
            None => self.diag.error("no 'main' function defined", 0),
        }

        self.symtab.check_used_functions(&mut self.diag);
        let need_putchar = self.symtab.get_function("putchar").is_some_and(|f| f.called);
        let need_getchar = self.symtab.get_function("getchar").is_some_and(|f| f.called);
        LowerOutput {
            functions: cfgs,
            diagnostics: self.diag,
            need_putchar,
            need_getchar,
        }
    }

    fn register_builtins(&mut self) {
        self.symtab
            .add_function("putchar", Type::Int, Arity::Exact(1), vec![Type::Char], 0);
        self.symtab
            .add_function("getchar", Type::Int, Arity::Exact(0), vec![], 0);
    }

    fn register_function_header(&mut self, f: &FunctionDef) {
        if self.symtab.has_function(&f.name) {
            self.diag.error(
                format!("function '{}' has already been declared", f.name),
                f.line,
            );
            return;
        }
        let param_types = f.params.iter().map(|p| p.ty).collect();
        self.symtab
            .add_function(&f.name, f.return_type, f.arity, param_types, f.line);
    }

    fn lower_function(&mut self, f: &FunctionDef) -> (Cfg, i32) {
        let scope = self.symtab.new_function_scope();
        let mut cfg = Cfg::new(f.name.clone());
        let entry = cfg.create_block(&mut self.block_counter);

        for (i, p) in f.params.iter().enumerate() {
            if self.symtab.has_parameter(scope, &p.name) {
                self.diag.error(
                    format!("parameter '{}' has already been declared", p.name),
                    p.line,
                );
                continue;
            }
            let var = self.symtab.add_parameter(scope, &p.name, p.ty, p.line);
            cfg.block_mut(entry).add_instr(Instr::RParam {
                index: i,
                dest: ResolvedVar {
                    offset: var.offset,
                    ty: var.ty,
                },
            });
        }

        let mut ctx = FnCtx {
            current_block: entry,
            scope,
            return_type: f.return_type,
            name: f.name.clone(),
        };
        let terminates = self.lower_block(&f.body, &mut ctx, &mut cfg);
        self.finish_function_body(&mut ctx, &mut cfg, terminates, f.line);
        self.symtab.check_used_variables(scope, &mut self.diag);
        let frame = self.symtab.memory_space(scope);
        (cfg, frame)
    }

    fn lower_main(&mut self, main: &MainDef) -> (Cfg, i32) {
        if !main.explicit_return_type {
            self.diag
                .warning("'main' has no declared return type, assuming 'int'", main.line);
        }
        let scope = self.symtab.new_function_scope();
        let mut cfg = Cfg::new("main".to_string());
        let entry = cfg.create_block(&mut self.block_counter);
        let mut ctx = FnCtx {
            current_block: entry,
            scope,
            return_type: Type::Int,
            name: "main".to_string(),
        };
        let terminates = self.lower_block(&main.body, &mut ctx, &mut cfg);
        self.finish_function_body(&mut ctx, &mut cfg, terminates, main.line);
        self.symtab.check_used_variables(scope, &mut self.diag);
        let frame = self.symtab.memory_space(scope);
        (cfg, frame)
    }

    /// If control can still fall off the end, synthesizes the right default
    /// return: an ERROR-and-default for a non-void function with no return
    /// anywhere, or the environment-gated default for `main`/a void function.
    fn finish_function_body(&mut self, ctx: &mut FnCtx, cfg: &mut Cfg, terminates: bool, line: u32) {
        if terminates {
            return;
        }
        if ctx.return_type == Type::Void {
            cfg.block_mut(ctx.current_block).add_instr(Instr::Ret { value: None });
            return;
        }
        self.diag.error(
            format!("no 'return' found in non-void function '{}'", ctx.name),
            line,
        );
        let default = if ctx.name == "main" {
            config::default_main_return()
        } else {
            config::default_non_main_return()
        };
        let tmp = self.symtab.add_temp(ctx.scope, Type::Int, line);
        let resolved = ResolvedVar {
            offset: tmp.offset,
            ty: Type::Int,
        };
        cfg.block_mut(ctx.current_block).add_instr(Instr::Ldconst {
            dest: resolved,
            value: default,
        });
        cfg.block_mut(ctx.current_block).add_instr(Instr::Ret {
            value: Some(resolved),
        });
    }

    /// Lowers a sequence of statements. Returns whether control is
    /// guaranteed to have hit a `return` by the end of the sequence.
    fn lower_block(&mut self, stmts: &[Stmt], ctx: &mut FnCtx, cfg: &mut Cfg) -> bool {
        let mut terminates = false;
        for stmt in stmts {
            terminates = self.lower_stmt(stmt, ctx, cfg);
        }
        terminates
    }

    fn lower_stmt(&mut self, stmt: &Stmt, ctx: &mut FnCtx, cfg: &mut Cfg) -> bool {
        match stmt {
            Stmt::VarDecl { ty, names, line } => {
                self.lower_var_decl(*ty, names, *line, ctx, cfg);
                false
            }
            Stmt::Expr(e) => {
                let mark = self.symtab.snapshot(ctx.scope);
                self.lower_expr(e, ctx, cfg);
                self.symtab.restore(ctx.scope, mark);
                false
            }
            Stmt::Return { value, line } => self.lower_return(value.as_ref(), *line, ctx, cfg),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                line,
            } => self.lower_if(cond, then_branch, else_branch.as_deref(), *line, ctx, cfg),
            Stmt::While { cond, body, line } => self.lower_while(cond, body, *line, ctx, cfg),
        }
    }

    fn lower_var_decl(
        &mut self,
        ty: Type,
        names: &[(String, Option<Expr>)],
        line: u32,
        ctx: &mut FnCtx,
        cfg: &mut Cfg,
    ) {
        if ty == Type::Void {
            self.diag.error("cannot declare a variable of type 'void'", line);
            return;
        }
        for (name, init) in names {
            if self.symtab.has_variable(ctx.scope, name) == Presence::Local {
                self.diag
                    .error(format!("variable '{name}' has already been declared"), line);
                continue;
            }
            if self.symtab.has_parameter(ctx.scope, name) {
                self.diag
                    .error(format!("variable '{name}' shadows a parameter"), line);
                continue;
            }
            let var = self.symtab.add_variable(ctx.scope, name, ty, line);
            if let Some(init_expr) = init {
                let mark = self.symtab.snapshot(ctx.scope);
                if let Value(src) = self.lower_expr(init_expr, ctx, cfg) {
                    let dest = ResolvedVar {
                        offset: var.offset,
                        ty: var.ty,
                    };
                    cfg.block_mut(ctx.current_block)
                        .add_instr(Instr::Copy { dest, src });
                }
                self.symtab.restore(ctx.scope, mark);
            }
        }
    }

    fn lower_return(
        &mut self,
        value: Option<&Expr>,
        line: u32,
        ctx: &mut FnCtx,
        cfg: &mut Cfg,
    ) -> bool {
        if ctx.return_type == Type::Void {
            if value.is_some() {
                self.diag.error(
                    format!("function '{}' returns void but a value was returned", ctx.name),
                    line,
                );
            }
            cfg.block_mut(ctx.current_block).add_instr(Instr::Ret { value: None });
            return true;
        }
        match value {
            Some(expr) => {
                let mark = self.symtab.snapshot(ctx.scope);
                match self.lower_expr(expr, ctx, cfg) {
                    Value(v) => {
                        cfg.block_mut(ctx.current_block)
                            .add_instr(Instr::Ret { value: Some(v) });
                    }
                    Poisoned => {
                        cfg.block_mut(ctx.current_block).add_instr(Instr::Ret { value: None });
                    }
                }
                self.symtab.restore(ctx.scope, mark);
            }
            None => {
                self.diag.warning(
                    format!(
                        "empty 'return' in non-void function '{}', returning a default value",
                        ctx.name
                    ),
                    line,
                );
                let default = if ctx.name == "main" {
                    config::default_main_return()
                } else {
                    config::default_non_main_return()
                };
                let tmp = self.symtab.add_temp(ctx.scope, Type::Int, line);
                let resolved = ResolvedVar {
                    offset: tmp.offset,
                    ty: Type::Int,
                };
                cfg.block_mut(ctx.current_block).add_instr(Instr::Ldconst {
                    dest: resolved,
                    value: default,
                });
                cfg.block_mut(ctx.current_block).add_instr(Instr::Ret {
                    value: Some(resolved),
                });
            }
        }
        true
    }

    fn lower_if(
        &mut self,
        cond: &Expr,
        then_branch: &[Stmt],
        else_branch: Option<&[Stmt]>,
        line: u32,
        ctx: &mut FnCtx,
        cfg: &mut Cfg,
    ) -> bool {
        let mark = self.symtab.snapshot(ctx.scope);
        let test = match self.lower_expr(cond, ctx, cfg) {
            Value(v) => v,
            Poisoned => {
                self.symtab.restore(ctx.scope, mark);
                // Condition already failed to resolve; keep lowering both
                // branches straight-line so further diagnostics still surface.
                let saved_scope = ctx.scope;
                ctx.scope = self.symtab.child_scope(saved_scope);
                self.lower_block(then_branch, ctx, cfg);
                self.symtab.check_used_variables(ctx.scope, &mut self.diag);
                if let Some(eb) = else_branch {
                    ctx.scope = self.symtab.child_scope(saved_scope);
                    self.lower_block(eb, ctx, cfg);
                    self.symtab.check_used_variables(ctx.scope, &mut self.diag);
                }
                ctx.scope = saved_scope;
                return false;
            }
        };

        let then_block = cfg.create_block(&mut self.block_counter);
        let else_block = else_branch.map(|_| cfg.create_block(&mut self.block_counter));
        let merge_block = cfg.create_block(&mut self.block_counter);
        let true_label = cfg.label_of(then_block);
        let false_label = cfg.label_of(else_block.unwrap_or(merge_block));

        {
            let cur = cfg.block_mut(ctx.current_block);
            cur.test_var = Some(test);
            cur.exit_true = Some(then_block);
            cur.exit_false = Some(else_block.unwrap_or(merge_block));
            cur.add_instr(Instr::CondJump {
                test,
                true_label,
                false_label,
            });
        }
        self.symtab.restore(ctx.scope, mark);

        let saved_scope = ctx.scope;

        ctx.scope = self.symtab.child_scope(saved_scope);
        ctx.current_block = then_block;
        let then_terminates = self.lower_block(then_branch, ctx, cfg);
        self.seal_to_merge(ctx, cfg, merge_block, then_terminates, line);
        self.symtab.check_used_variables(ctx.scope, &mut self.diag);

        let else_terminates = match else_branch {
            Some(eb) => {
                ctx.scope = self.symtab.child_scope(saved_scope);
                ctx.current_block = else_block.unwrap();
                let t = self.lower_block(eb, ctx, cfg);
                self.seal_to_merge(ctx, cfg, merge_block, t, line);
                self.symtab.check_used_variables(ctx.scope, &mut self.diag);
                t
            }
            None => false,
        };

        ctx.scope = saved_scope;
        ctx.current_block = merge_block;
        else_branch.is_some() && then_terminates && else_terminates
    }

    /// Emits the jump from a branch's tail block into the merge block,
    /// unless that branch already terminated in a `return`.
    fn seal_to_merge(&mut self, ctx: &mut FnCtx, cfg: &mut Cfg, merge: usize, terminated: bool, _line: u32) {
        if terminated {
            return;
        }
        let tail = ctx.current_block;
        let label = cfg.label_of(merge);
        cfg.block_mut(tail).exit_true = Some(merge);
        cfg.block_mut(tail).add_instr(Instr::Jump { label });
    }

    fn lower_while(&mut self, cond: &Expr, body: &[Stmt], line: u32, ctx: &mut FnCtx, cfg: &mut Cfg) -> bool {
        let cond_block = cfg.create_block(&mut self.block_counter);
        let body_block = cfg.create_block(&mut self.block_counter);
        let after_block = cfg.create_block(&mut self.block_counter);

        let cond_label = cfg.label_of(cond_block);
        cfg.block_mut(ctx.current_block).exit_true = Some(cond_block);
        cfg.block_mut(ctx.current_block).add_instr(Instr::Jump { label: cond_label });

        ctx.current_block = cond_block;
        let mark = self.symtab.snapshot(ctx.scope);
        match self.lower_expr(cond, ctx, cfg) {
            Value(test) => {
                let true_label = cfg.label_of(body_block);
                let false_label = cfg.label_of(after_block);
                let cur = cfg.block_mut(cond_block);
                cur.test_var = Some(test);
                cur.exit_true = Some(body_block);
                cur.exit_false = Some(after_block);
                cur.add_instr(Instr::CondJump {
                    test,
                    true_label,
                    false_label,
                });
            }
            Poisoned => {
                let label = cfg.label_of(after_block);
                cfg.block_mut(cond_block).exit_true = Some(after_block);
                cfg.block_mut(cond_block).add_instr(Instr::Jump { label });
            }
        }
        self.symtab.restore(ctx.scope, mark);

        let saved_scope = ctx.scope;
        ctx.scope = self.symtab.child_scope(saved_scope);
        ctx.current_block = body_block;
        self.lower_block(body, ctx, cfg);
        let back_label = cfg.label_of(cond_block);
        cfg.block_mut(ctx.current_block).exit_true = Some(cond_block);
        cfg.block_mut(ctx.current_block).add_instr(Instr::Jump { label: back_label });
        self.symtab.check_used_variables(ctx.scope, &mut self.diag);
        ctx.scope = saved_scope;

        ctx.current_block = after_block;
        let _ = line;
        false
    }

    fn new_temp(&mut self, ctx: &FnCtx, ty: Type, line: u32) -> ResolvedVar {
        let var = self.symtab.add_temp(ctx.scope, ty, line);
        ResolvedVar {
            offset: var.offset,
            ty: var.ty,
        }
    }

    fn lower_expr(&mut self, expr: &Expr, ctx: &mut FnCtx, cfg: &mut Cfg) -> LowerResult {
        match expr {
            Expr::IntLit { text, line } => self.lower_int_lit(text, *line, ctx, cfg),
            Expr::CharLit { value, multi, line } => {
                if *multi {
                    self.diag.warning(
                        "multi-character literal is folded into an 'int' value",
                        *line,
                    );
                }
                let ty = if *multi { Type::Int } else { Type::Char };
                let tmp = self.new_temp(ctx, ty, *line);
                cfg.block_mut(ctx.current_block).add_instr(Instr::Ldconst {
                    dest: tmp,
                    value: *value,
                });
                Value(tmp)
            }
            Expr::Var { name, line } => match self.symtab.get_variable(ctx.scope, name) {
                Some(v) => Value(ResolvedVar {
                    offset: v.offset,
                    ty: v.ty,
                }),
                None => {
                    self.diag
                        .error(format!("variable '{name}' has not been declared"), *line);
                    Poisoned
                }
            },
            Expr::Assign { name, value, line } => self.lower_assign(name, value, *line, ctx, cfg),
            Expr::CompoundAssign {
                op,
                name,
                value,
                line,
            } => self.lower_compound_assign(*op, name, value, *line, ctx, cfg),
            Expr::Unary { op, expr, line } => self.lower_unary(*op, expr, *line, ctx, cfg),
            Expr::Binary { op, lhs, rhs, line } => self.lower_binary(*op, lhs, rhs, *line, ctx, cfg),
            Expr::Call { name, args, line } => self.lower_call(name, args, *line, ctx, cfg),
        }
    }

    fn lower_int_lit(&mut self, text: &str, line: u32, ctx: &mut FnCtx, cfg: &mut Cfg) -> LowerResult {
        let value = match text.parse::<u64>() {
            Ok(raw) => {
                let reduced = (raw % (1u64 << 32)) as i64;
                let mut v = reduced;
                if v > i32::MAX as i64 {
                    v -= 1i64 << 32;
                }
                if raw > u32::MAX as u64 {
                    self.diag.warning(
                        format!("integer literal '{text}' is out of range and was truncated"),
                        line,
                    );
                }
                v as i32
            }
            Err(_) => {
                // Too large even for u64: reduce digit-by-digit modulo 2^32.
                let mut acc: i64 = 0;
                for c in text.chars() {
                    let digit = c.to_digit(10).unwrap() as i64;
                    acc = (acc.wrapping_mul(10).wrapping_add(digit)).rem_euclid(1i64 << 32);
                }
                let mut v = acc;
                if v > i32::MAX as i64 {
                    v -= 1i64 << 32;
                }
                self.diag.warning(
                    format!("integer literal '{text}' is out of range and was truncated"),
                    line,
                );
                v as i32
            }
        };
        let tmp = self.new_temp(ctx, Type::Int, line);
        cfg.block_mut(ctx.current_block)
            .add_instr(Instr::Ldconst { dest: tmp, value });
        Value(tmp)
    }

    fn lower_assign(&mut self, name: &str, value: &Expr, line: u32, ctx: &mut FnCtx, cfg: &mut Cfg) -> LowerResult {
        let rhs = self.lower_expr(value, ctx, cfg);
        match self.symtab.get_variable(ctx.scope, name) {
            None => {
                self.diag
                    .error(format!("variable '{name}' has not been declared"), line);
                Poisoned
            }
            Some(info) => {
                let dest = ResolvedVar {
                    offset: info.offset,
                    ty: info.ty,
                };
                match rhs {
                    Value(src) => {
                        cfg.block_mut(ctx.current_block)
                            .add_instr(Instr::Copy { dest, src });
                        Value(dest)
                    }
                    Poisoned => Poisoned,
                }
            }
        }
    }

    fn lower_compound_assign(
        &mut self,
        op: CompoundOp,
        name: &str,
        value: &Expr,
        line: u32,
        ctx: &mut FnCtx,
        cfg: &mut Cfg,
    ) -> LowerResult {
        let rhs = self.lower_expr(value, ctx, cfg);
        match self.symtab.get_variable(ctx.scope, name) {
            None => {
                self.diag
                    .error(format!("variable '{name}' has not been declared"), line);
                Poisoned
            }
            Some(info) => {
                let dest = ResolvedVar {
                    offset: info.offset,
                    ty: info.ty,
                };
                match rhs {
                    Value(v) => {
                        let instr = match op {
                            CompoundOp::AddAssign => Instr::AddAssign { dest, value: v },
                            CompoundOp::SubAssign => Instr::SubAssign { dest, value: v },
                            CompoundOp::MulAssign => Instr::MulAssign { dest, value: v },
                            CompoundOp::DivAssign => Instr::DivAssign { dest, value: v },
                        };
                        cfg.block_mut(ctx.current_block).add_instr(instr);
                        Value(dest)
                    }
                    Poisoned => Poisoned,
                }
            }
        }
    }

    fn lower_unary(&mut self, op: UnaryOp, expr: &Expr, line: u32, ctx: &mut FnCtx, cfg: &mut Cfg) -> LowerResult {
        match self.lower_expr(expr, ctx, cfg) {
            Value(src) => {
                if src.ty == Type::Void {
                    self.diag.error("cannot perform operations on 'void'", line);
                    return Poisoned;
                }
                let tmp = self.new_temp(ctx, Type::Int, line);
                let instr = match op {
                    UnaryOp::Not => Instr::Not { dest: tmp, src },
                    UnaryOp::Neg => Instr::Neg { dest: tmp, src },
                };
                cfg.block_mut(ctx.current_block).add_instr(instr);
                Value(tmp)
            }
            Poisoned => Poisoned,
        }
    }

    fn lower_binary(
        &mut self,
        op: BinOp,
        lhs: &Expr,
        rhs: &Expr,
        line: u32,
        ctx: &mut FnCtx,
        cfg: &mut Cfg,
    ) -> LowerResult {
        let l = self.lower_expr(lhs, ctx, cfg);
        let r = self.lower_expr(rhs, ctx, cfg);
        let (lv, rv) = match (l, r) {
            (Value(lv), Value(rv)) => (lv, rv),
            _ => return Poisoned,
        };
        if lv.ty == Type::Void || rv.ty == Type::Void {
            self.diag.error("cannot perform operations on 'void'", line);
            return Poisoned;
        }
        let tmp = self.new_temp(ctx, Type::Int, line);
        let instr = match op {
            BinOp::Add => Instr::Add { dest: tmp, lhs: lv, rhs: rv },
            BinOp::Sub => Instr::Sub { dest: tmp, lhs: lv, rhs: rv },
            BinOp::Mul => Instr::Mul { dest: tmp, lhs: lv, rhs: rv },
            BinOp::Div => Instr::Div { dest: tmp, lhs: lv, rhs: rv },
            BinOp::Mod => Instr::Mod { dest: tmp, lhs: lv, rhs: rv },
            BinOp::Eq => Instr::Compare { op: Cmp::Eq, dest: tmp, lhs: lv, rhs: rv },
            BinOp::Neq => Instr::Compare { op: Cmp::Neq, dest: tmp, lhs: lv, rhs: rv },
            BinOp::Lt => Instr::Compare { op: Cmp::Lt, dest: tmp, lhs: lv, rhs: rv },
            BinOp::Gt => Instr::Compare { op: Cmp::Gt, dest: tmp, lhs: lv, rhs: rv },
            BinOp::Le => Instr::Compare { op: Cmp::Le, dest: tmp, lhs: lv, rhs: rv },
            BinOp::Ge => Instr::Compare { op: Cmp::Ge, dest: tmp, lhs: lv, rhs: rv },
            BinOp::And => Instr::And { dest: tmp, lhs: lv, rhs: rv },
            BinOp::Or => Instr::Or { dest: tmp, lhs: lv, rhs: rv },
            BinOp::Xor => Instr::Xor { dest: tmp, lhs: lv, rhs: rv },
        };
        cfg.block_mut(ctx.current_block).add_instr(instr);
        Value(tmp)
    }

    fn lower_call(&mut self, name: &str, args: &[Expr], line: u32, ctx: &mut FnCtx, cfg: &mut Cfg) -> LowerResult {
        let Some(finfo) = self.symtab.get_function(name).cloned() else {
            self.diag
                .error(format!("function '{name}' has not been declared"), line);
            for a in args {
                self.lower_expr(a, ctx, cfg);
            }
            return Poisoned;
        };

        if finfo.line > line {
            self.diag.warning(
                format!("function '{name}' is called before its declaration (implicit function declaration)"),
                line,
            );
        }

        let arity_ok = match finfo.arity {
            Arity::Any => true,
            Arity::Exact(n) => n == args.len(),
        };
        if !arity_ok {
            self.diag.error(
                format!("function '{name}' is called with the wrong number of parameters"),
                line,
            );
        }

        let mark = self.symtab.snapshot(ctx.scope);
        let mut arg_vals = Vec::with_capacity(args.len());
        let mut poisoned = false;
        for a in args {
            match self.lower_expr(a, ctx, cfg) {
                Value(v) => arg_vals.push(v),
                Poisoned => poisoned = true,
            }
        }
        self.symtab.restore(ctx.scope, mark);
        self.symtab.mark_called(name);

        if poisoned || !arity_ok {
            return Poisoned;
        }

        for (i, v) in arg_vals.iter().enumerate().rev() {
            cfg.block_mut(ctx.current_block)
                .add_instr(Instr::WParam { index: i, src: *v });
        }

        if finfo.return_type == Type::Void {
            cfg.block_mut(ctx.current_block).add_instr(Instr::Call {
                name: name.to_string(),
                dest: None,
                argc: args.len(),
            });
            Value(ResolvedVar {
                offset: 0,
                ty: Type::Void,
            })
        } else {
            let tmp = self.new_temp(ctx, finfo.return_type, line);
            cfg.block_mut(ctx.current_block).add_instr(Instr::Call {
                name: name.to_string(),
                dest: Some(tmp),
                argc: args.len(),
            });
            Value(tmp)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn lower_source(src: &str) -> Diagnostics {
        let program = parse(src).unwrap();
        Lowering::new().lower(&program).diagnostics
    }

    #[test]
    fn simple_return_has_no_diagnostics() {
        let diag = lower_source("int main() { return 0; }");
        assert!(!diag.has_error());
        assert!(!diag.has_warning());
    }

    #[test]
    fn redeclared_variable_is_an_error() {
        let diag = lower_source("int main() { int a; int a; return 0; }");
        assert!(diag.has_error());
    }

    #[test]
    fn undeclared_variable_is_an_error_without_cascade() {
        let diag = lower_source("int main() { return x + x; }");
        let errors: Vec<_> = diag
            .entries()
            .iter()
            .filter(|e| e.severity == crate::diagnostics::Severity::Error)
            .collect();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn wrong_arity_call_is_an_error() {
        let diag = lower_source("int f(int a) { return a; } int main() { return f(1, 2); }");
        assert!(diag.has_error());
    }

    #[test]
    fn missing_return_in_int_function_is_an_error() {
        let diag = lower_source("int f() { int a; } int main() { return f(); }");
        assert!(diag.has_error());
    }

    #[test]
    fn unused_variable_is_a_warning_not_an_error() {
        let diag = lower_source("int main() { int a; return 0; }");
        assert!(!diag.has_error());
        assert!(diag.has_warning());
    }

    #[test]
    fn if_else_both_returning_terminates_function() {
        let diag = lower_source("int main() { if (1) { return 1; } else { return 0; } }");
        assert!(!diag.has_error());
    }

    #[test]
    fn shadowing_a_parameter_is_an_error() {
        let diag = lower_source("int f(int a) { int a; return a; } int main() { return f(1); }");
        assert!(diag.has_error());
    }

    #[test]
    fn calling_a_function_declared_later_is_an_implicit_declaration_warning() {
        let diag = lower_source("int f() { return g(); } int g() { return 1; } int main() { return f(); }");
        assert!(!diag.has_error());
        assert!(diag.has_warning());
        assert!(diag
            .entries()
            .iter()
            .any(|e| e.message.contains("implicit function declaration")));
    }

    #[test]
    fn calling_a_function_declared_earlier_has_no_implicit_declaration_warning() {
        let diag = lower_source("int g() { return 1; } int f() { return g(); } int main() { return f(); }");
        assert!(!diag
            .entries()
            .iter()
            .any(|e| e.message.contains("implicit function declaration")));
    }
}
