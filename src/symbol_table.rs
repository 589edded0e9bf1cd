//! Scoped name resolution, stack-slot layout, and usage tracking.
//!
//! Scopes live in a flat arena (`Vec<Scope>`) indexed by [`ScopeId`] rather
//! than a tree of heap nodes linked by back-pointers with a "garbage holder"
//! keeping dead scopes alive: nothing outside this module ever needs to
//! outlive a scope, because [`crate::ir::Instr`] stores resolved operand
//! offsets at insertion time instead of a name plus a pointer back in here.

use std::collections::HashMap;

use crate::ast::{Arity, Type};
use crate::config::PARAM_MANGLE_PREFIX;
use crate::diagnostics::Diagnostics;

pub type ScopeId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarInfo {
    pub offset: i32,
    pub ty: Type,
    pub line: u32,
    pub used: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncInfo {
    pub return_type: Type,
    pub arity: Arity,
    pub param_types: Vec<Type>,
    pub line: u32,
    pub called: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Local,
    Inherited,
    Absent,
}

#[derive(Debug)]
struct Scope {
    vars: HashMap<String, VarInfo>,
    parent: Option<ScopeId>,
    children: Vec<ScopeId>,
    base: i32,
    stack_ptr: i32,
    own_size: i32,
}

/// Arena of lexical scopes for the function currently being lowered, plus
/// the global table of function signatures (functions have no nested scope
/// of their own — they are visible from anywhere, root-only).
#[derive(Debug, Default)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    functions: HashMap<String, FuncInfo>,
}

fn mangle(name: &str) -> String {
    format!("{PARAM_MANGLE_PREFIX}{name}")
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new, unrelated function frame (offset 0, no parent).
    pub fn new_function_scope(&mut self) -> ScopeId {
        self.scopes.push(Scope {
            vars: HashMap::new(),
            parent: None,
            children: Vec::new(),
            base: 0,
            stack_ptr: 0,
            own_size: 0,
        });
        self.scopes.len() - 1
    }

    /// Opens a nested block scope inheriting `parent`'s current stack offset.
    pub fn child_scope(&mut self, parent: ScopeId) -> ScopeId {
        let stack_ptr = self.scopes[parent].stack_ptr;
        self.scopes.push(Scope {
            vars: HashMap::new(),
            parent: Some(parent),
            children: Vec::new(),
            base: stack_ptr,
            stack_ptr,
            own_size: 0,
        });
        let id = self.scopes.len() - 1;
        self.scopes[parent].children.push(id);
        id
    }

    fn root_of(&self, scope: ScopeId) -> ScopeId {
        let mut cur = scope;
        while let Some(parent) = self.scopes[cur].parent {
            cur = parent;
        }
        cur
    }

    pub fn has_variable(&self, scope: ScopeId, name: &str) -> Presence {
        if self.scopes[scope].vars.contains_key(name) {
            return Presence::Local;
        }
        let mut cur = self.scopes[scope].parent;
        while let Some(id) = cur {
            if self.scopes[id].vars.contains_key(name) {
                return Presence::Inherited;
            }
            cur = self.scopes[id].parent;
        }
        Presence::Absent
    }

    /// Whether `name` names a parameter of the function owning `scope`.
    pub fn has_parameter(&self, scope: ScopeId, name: &str) -> bool {
        let root = self.root_of(scope);
        self.scopes[root].vars.contains_key(&mangle(name))
    }

    pub fn add_variable(&mut self, scope: ScopeId, name: &str, ty: Type, line: u32) -> VarInfo {
        let info = self.allocate(scope, ty, line);
        self.scopes[scope].vars.insert(name.to_string(), info.clone());
        info
    }

    pub fn add_parameter(&mut self, scope: ScopeId, name: &str, ty: Type, line: u32) -> VarInfo {
        let info = self.allocate(scope, ty, line);
        self.scopes[scope].vars.insert(mangle(name), info.clone());
        info
    }

    /// Allocates a compiler-generated temporary: reserves frame space and
    /// returns it directly, without a name in the scope — temporaries are
    /// never looked up by name and so never trip the unused-variable check.
    pub fn add_temp(&mut self, scope: ScopeId, ty: Type, line: u32) -> VarInfo {
        self.allocate(scope, ty, line)
    }

    /// Marks the current stack pointer of `scope` so temporaries allocated
    /// after this point can be reclaimed with [`Self::restore`] once the
    /// expression they belong to has been consumed.
    pub fn snapshot(&self, scope: ScopeId) -> i32 {
        self.scopes[scope].stack_ptr
    }

    /// Rewinds `scope`'s stack pointer to a prior [`Self::snapshot`], letting
    /// the next expression's temporaries reuse the same slots. `own_size`
    /// (the frame's high-water mark) is untouched.
    pub fn restore(&mut self, scope: ScopeId, mark: i32) {
        self.scopes[scope].stack_ptr = mark;
    }

    fn allocate(&mut self, scope: ScopeId, ty: Type, line: u32) -> VarInfo {
        let s = &mut self.scopes[scope];
        s.stack_ptr -= ty.size();
        s.own_size = s.own_size.max(s.base - s.stack_ptr);
        VarInfo {
            offset: s.stack_ptr,
            ty,
            line,
            used: false,
        }
    }

    /// Resolves `name` for an expression use, marking it used. Ordinary
    /// locals are searched up the parent chain; a parameter is visible from
    /// anywhere in its function regardless of nesting depth.
    pub fn get_variable(&mut self, scope: ScopeId, name: &str) -> Option<VarInfo> {
        let mut cur = Some(scope);
        while let Some(id) = cur {
            if let Some(v) = self.scopes[id].vars.get_mut(name) {
                v.used = true;
                return Some(v.clone());
            }
            cur = self.scopes[id].parent;
        }
        let root = self.root_of(scope);
        let key = mangle(name);
        if let Some(v) = self.scopes[root].vars.get_mut(&key) {
            v.used = true;
            return Some(v.clone());
        }
        None
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn add_function(
        &mut self,
        name: &str,
        return_type: Type,
        arity: Arity,
        param_types: Vec<Type>,
        line: u32,
    ) {
        self.functions.insert(
            name.to_string(),
            FuncInfo {
                return_type,
                arity,
                param_types,
                line,
                called: false,
            },
        );
    }

    pub fn get_function(&self, name: &str) -> Option<&FuncInfo> {
        self.functions.get(name)
    }

    pub fn mark_called(&mut self, name: &str) {
        if let Some(f) = self.functions.get_mut(name) {
            f.called = true;
        }
    }

    /// Total stack space required by `scope` and everything nested in it —
    /// the deepest point the scope's stack pointer ever reached, used to size
    /// the enclosing function's frame. Slots freed by [`Self::restore`] don't
    /// shrink this; only a later allocation that reaches even deeper grows
    /// it.
    pub fn memory_space(&self, scope: ScopeId) -> i32 {
        let s = &self.scopes[scope];
        s.own_size
            + s.children
                .iter()
                .map(|&c| self.memory_space(c))
                .sum::<i32>()
    }

    pub fn check_used_variables(&self, scope: ScopeId, diag: &mut Diagnostics) {
        for (key, info) in &self.scopes[scope].vars {
            if info.used {
                continue;
            }
            let display_name = key.strip_prefix(PARAM_MANGLE_PREFIX).unwrap_or(key);
            diag.warning(format!("unused variable '{display_name}'"), info.line);
        }
    }

    pub fn check_used_functions(&self, diag: &mut Diagnostics) {
        for (name, info) in &self.functions {
            if info.called || name == "main" || name == "putchar" || name == "getchar" {
                continue;
            }
            diag.warning(format!("unused function '{name}'"), info.line);
        }
    }

    /// Narrows a value to the representable range of `ty` — `char` truncates
    /// to signed 8-bit, `int` passes through.
    pub fn cast(ty: Type, value: i32) -> i32 {
        match ty {
            Type::Char => value as i8 as i32,
            Type::Int | Type::Void => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variable_offsets_grow_downward() {
        let mut st = SymbolTable::new();
        let f = st.new_function_scope();
        let a = st.add_variable(f, "a", Type::Int, 1);
        let b = st.add_variable(f, "b", Type::Char, 2);
        assert_eq!(a.offset, -4);
        assert_eq!(b.offset, -5);
    }

    #[test]
    fn child_scope_inherits_and_extends_stack_pointer() {
        let mut st = SymbolTable::new();
        let f = st.new_function_scope();
        st.add_variable(f, "a", Type::Int, 1);
        let child = st.child_scope(f);
        let b = st.add_variable(child, "b", Type::Int, 2);
        assert_eq!(b.offset, -8);
    }

    #[test]
    fn has_variable_distinguishes_local_from_inherited() {
        let mut st = SymbolTable::new();
        let f = st.new_function_scope();
        st.add_variable(f, "a", Type::Int, 1);
        let child = st.child_scope(f);
        assert_eq!(st.has_variable(f, "a"), Presence::Local);
        assert_eq!(st.has_variable(child, "a"), Presence::Inherited);
        assert_eq!(st.has_variable(child, "nope"), Presence::Absent);
    }

    #[test]
    fn parameter_is_visible_from_nested_blocks_but_not_declarable_twice() {
        let mut st = SymbolTable::new();
        let f = st.new_function_scope();
        st.add_parameter(f, "x", Type::Int, 1);
        let child = st.child_scope(f);
        assert!(st.has_parameter(child, "x"));
        assert_eq!(st.has_variable(child, "x"), Presence::Absent);
        let resolved = st.get_variable(child, "x");
        assert!(resolved.is_some());
    }

    #[test]
    fn memory_space_sums_nested_scopes() {
        let mut st = SymbolTable::new();
        let f = st.new_function_scope();
        st.add_variable(f, "a", Type::Int, 1);
        let child = st.child_scope(f);
        st.add_variable(child, "b", Type::Int, 2);
        assert_eq!(st.memory_space(f), 8);
    }

    #[test]
    fn unused_variable_emits_warning_with_display_name() {
        let mut st = SymbolTable::new();
        let f = st.new_function_scope();
        st.add_parameter(f, "x", Type::Int, 1);
        let mut diags = Diagnostics::new();
        st.check_used_variables(f, &mut diags);
        assert!(diags.has_warning());
        assert!(diags.entries()[0].message.contains("'x'"));
    }

    #[test]
    fn restore_lets_a_later_temp_reuse_a_freed_slot() {
        let mut st = SymbolTable::new();
        let f = st.new_function_scope();
        let mark = st.snapshot(f);
        let first = st.add_temp(f, Type::Int, 1);
        st.restore(f, mark);
        let second = st.add_temp(f, Type::Int, 2);
        assert_eq!(first.offset, second.offset);
    }

    #[test]
    fn restore_does_not_shrink_the_frame_high_water_mark() {
        let mut st = SymbolTable::new();
        let f = st.new_function_scope();
        let mark = st.snapshot(f);
        st.add_temp(f, Type::Int, 1);
        st.restore(f, mark);
        st.add_temp(f, Type::Int, 2);
        assert_eq!(st.memory_space(f), 4);
    }

    #[test]
    fn cast_truncates_char_to_signed_byte() {
        assert_eq!(SymbolTable::cast(Type::Char, 200), -56);
        assert_eq!(SymbolTable::cast(Type::Int, 200), 200);
    }
}
