//! Tooling-level error type.
//!
//! Distinct from [`crate::diagnostics::Diagnostics`]: this is the path for
//! CLI misuse, unreadable source files, and parse errors, none of which leave
//! the lowering pass far enough to accumulate semantic diagnostics.

#[derive(Debug)]
pub enum CompileError {
    Io(std::io::Error),
    Parse { message: String, line: u32 },
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::Io(e) => write!(f, "{e}"),
            CompileError::Parse { message, line } => {
                write!(f, "syntax error at line {line}: {message}")
            }
        }
    }
}

impl std::error::Error for CompileError {}

impl From<std::io::Error> for CompileError {
    fn from(e: std::io::Error) -> Self {
        CompileError::Io(e)
    }
}
