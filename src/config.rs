//! Compiler-wide constants: calling-convention register tables and the
//! environment-gated default-return behavior.

/// Prefix used internally to store a function parameter under a mangled key,
/// distinct from a same-named local declared in the function's top-level
/// block. Chosen as a control character that can never occur in a lexed
/// identifier, resolving a disagreement in the tool this crate is modeled on
/// between the mangling site and the site that checks for the mangle marker.
pub const PARAM_MANGLE_PREFIX: char = '\u{1}';

/// 32-bit integer-class argument registers, System V AMD64, in parameter order.
pub const INT_ARG_REGS: [&str; 6] = ["%edi", "%esi", "%edx", "%ecx", "%r8d", "%r9d"];

/// 8-bit views of the same registers, used when the parameter type is `char`.
pub const CHAR_ARG_REGS: [&str; 6] = ["%dil", "%sil", "%dl", "%cl", "%r8b", "%r9b"];

pub const STACK_ALIGNMENT: i32 = 16;

/// Exit code synthesized for a fall-off-the-end-of-`main` or empty `return;`
/// in `main`, gated on the `WSLENV` environment variable exactly as the tool
/// this crate reimplements does.
pub fn default_main_return() -> i32 {
    if std::env::var_os("WSLENV").is_some() {
        41
    } else {
        37
    }
}

/// Default return value synthesized for a non-`main` function that falls off
/// its end without an explicit `return`.
pub fn default_non_main_return() -> i32 {
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_main_default_is_always_zero() {
        assert_eq!(default_non_main_return(), 0);
    }

    #[test]
    fn arg_reg_tables_have_six_entries() {
        assert_eq!(INT_ARG_REGS.len(), 6);
        assert_eq!(CHAR_ARG_REGS.len(), 6);
    }
}
