//! End-to-end tests against the public `compile_source`/`compile_file` API.

use std::io::Write as _;

use csubc::{compile_file, compile_source};

fn ok(src: &str) -> (String, csubc::Diagnostics) {
    let (asm, diag) = compile_source(src).expect("tooling-level compile failure");
    assert!(!diag.has_error(), "unexpected ERROR diagnostics for: {src}");
    (asm, diag)
}

// --- Seed scenarios (spec.md section 8) -----------------------------------

#[test]
fn scenario_a_constant_arithmetic() {
    let (asm, _) = ok("int main(){ return 2+3*4; }");
    assert!(asm.contains("main:"));
}

#[test]
fn scenario_b_locals_and_assignment() {
    let (asm, _) = ok("int main(){ int a=5, b; b=a-2; return b; }");
    assert!(asm.contains("subl") || asm.contains("sub"));
}

#[test]
fn scenario_c_function_call() {
    let (asm, _) = ok("int f(int x){ return x*x; } int main(){ return f(7); }");
    assert!(asm.contains(".globl f"));
    assert!(asm.contains("call\tf"));
}

#[test]
fn scenario_d_while_loop() {
    let (asm, _) = ok("int main(){ int i=0; while(i<10) i+=1; return i; }");
    assert!(asm.contains("jne") && asm.contains("jmp"));
}

#[test]
fn scenario_e_if_else() {
    let (asm, _) = ok("int main(){ if(1==2) return 1; else return 2; }");
    assert!(asm.contains("cmpl"));
}

#[test]
fn scenario_f_void_function_missing_return_is_a_warning_not_error() {
    let (_, diag) = ok("void g(){ } int main(){ g(); }");
    assert!(!diag.has_error());
}

#[test]
fn scenario_g_used_variable_is_not_flagged_unused() {
    let (_, diag) = ok("int main(){ int a; return a+1; }");
    assert!(diag
        .entries()
        .iter()
        .all(|d| !d.message.contains("unused variable 'a'")));
}

#[test]
fn scenario_h_char_constant() {
    let (asm, _) = ok("int main(){ return 'A'; }");
    assert!(asm.contains("movb\t$65") || asm.contains("movl\t$65"));
}

// --- Testable properties (spec.md section 8) -------------------------------

#[test]
fn determinism_same_input_yields_byte_identical_assembly() {
    let src = "int f(int x){ return x*x; } int main(){ int i=0; while(i<10) i+=1; return f(i); }";
    let (a, _) = ok(src);
    let (b, _) = ok(src);
    assert_eq!(a, b);
}

#[test]
fn frame_alignment_subq_is_multiple_of_sixteen() {
    let (asm, _) = ok("int main(){ int a,b,c; a=1; b=2; c=3; return a+b+c; }");
    for line in asm.lines() {
        if let Some(rest) = line.trim().strip_prefix("subq\t$") {
            let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
            let n: i64 = digits.parse().unwrap();
            assert_eq!(n % 16, 0, "subq immediate {n} is not 16-aligned");
        }
    }
}

#[test]
fn block_labels_are_bbn_dense_from_zero_and_emitted_in_creation_order() {
    let (asm, _) = ok("int main(){ if(1==1){ return 1; } else { return 2; } }");
    let labels: Vec<&str> = asm
        .lines()
        .filter(|l| l.starts_with(".bb"))
        .map(|l| l.trim_end_matches(':'))
        .collect();
    assert!(!labels.is_empty(), "expected at least one .bbN label");

    let mut sorted = labels.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(labels.len(), sorted.len(), "duplicate block labels");

    let numbers: Vec<usize> = labels
        .iter()
        .map(|l| {
            l.strip_prefix(".bb")
                .unwrap_or_else(|| panic!("label {l} is not .bbN"))
                .parse()
                .unwrap_or_else(|_| panic!("label {l} has a non-numeric suffix"))
        })
        .collect();
    let mut expected: Vec<usize> = numbers.clone();
    expected.sort();
    assert_eq!(numbers, expected, "labels were not emitted in creation order");
    assert_eq!(expected, (0..expected.len()).collect::<Vec<_>>(), "labels are not dense from 0");
}

#[test]
fn scope_isolation_variable_out_of_its_block_is_undeclared() {
    let (_, diag) = compile_source("int main(){ if(1==1){ int a; a=1; } return a; }").unwrap();
    assert!(diag.has_error());
    assert!(diag
        .entries()
        .iter()
        .any(|d| d.message.contains("has not been declared")));
}

#[test]
fn no_cascade_one_error_per_offending_subexpression() {
    let (_, diag) = compile_source("int main(){ return x+x; }").unwrap();
    assert!(diag.has_error());
    let errors: Vec<_> = diag
        .entries()
        .iter()
        .filter(|d| d.severity == csubc::diagnostics::Severity::Error)
        .collect();
    assert_eq!(errors.len(), 1, "expected exactly one ERROR, got {errors:?}");
}

#[test]
fn arity_enforcement_rejects_wrong_count_for_declared_arity() {
    let (_, diag) =
        compile_source("int f(int x, int y){ return x+y; } int main(){ return f(1); }").unwrap();
    assert!(diag.has_error());
}

#[test]
fn arity_enforcement_void_param_list_rejects_any_argument() {
    let (_, diag) =
        compile_source("int f(void){ return 0; } int main(){ return f(1); }").unwrap();
    assert!(diag.has_error());
}

#[test]
fn arity_enforcement_empty_param_list_accepts_any_argument_count() {
    let (_, diag) = ok("int f(){ return 0; } int main(){ return f(1, 2, 3); }");
    assert!(!diag.has_error());
}

// --- Diagnostics content ----------------------------------------------------

#[test]
fn duplicate_function_is_an_error() {
    let (_, diag) =
        compile_source("int f(){ return 0; } int f(){ return 1; } int main(){ return 0; }")
            .unwrap();
    assert!(diag.has_error());
}

#[test]
fn call_arity_mismatch_and_undeclared_function_are_errors() {
    let (_, diag) = compile_source("int main(){ return undefined_fn(1); }").unwrap();
    assert!(diag.has_error());
    assert!(diag
        .entries()
        .iter()
        .any(|d| d.message.contains("has not been declared")));
}

#[test]
fn multi_character_literal_is_a_warning_not_an_error() {
    let (_, diag) = ok("int main(){ return 'ab'; }");
    assert!(diag.has_warning());
}

#[test]
fn empty_return_in_non_void_function_is_a_warning() {
    let (_, diag) = ok("int main(){ return; }");
    assert!(diag.has_warning());
}

// --- compile_file / tempfile integration -----------------------------------

#[test]
fn compile_file_reads_source_from_disk() {
    let mut file = tempfile::Builder::new()
        .suffix(".c")
        .tempfile()
        .expect("failed to create temp file");
    write!(file, "int main(){{ return 0; }}").unwrap();

    let (asm, diag) = compile_file(file.path()).expect("compile_file failed");
    assert!(!diag.has_error());
    assert!(asm.contains("main:"));
}

#[test]
fn compile_file_surfaces_io_error_for_missing_path() {
    let result = compile_file(std::path::Path::new("/nonexistent/path/does_not_exist.c"));
    assert!(result.is_err());
}
