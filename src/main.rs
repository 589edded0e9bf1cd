//! Command-line driver: `csubc path/to/file.c`.

use clap::Parser as ClapParser;
use std::path::PathBuf;
use std::process;

#[derive(ClapParser)]
#[command(name = "csubc")]
#[command(about = "Compile a C-like language subset to x86-64 assembly", long_about = None)]
struct Cli {
    /// Source file to compile
    input: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    match csubc::compile_file(&cli.input) {
        Ok((asm, diagnostics)) => {
            if diagnostics.has_error() {
                process::exit(1);
            }
            print!("{asm}");
        }
        Err(e) => {
            eprintln!("{}: {e}", cli.input.display());
            process::exit(1);
        }
    }
}
