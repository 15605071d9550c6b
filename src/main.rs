//! `wick`: a thin driver around [`wickc::compile`].
//!
//! Everything interesting lives in the library (spec.md §1 scopes the file
//! I/O / REPL / CLI driver out of the core entirely — the VM that would
//! actually *run* the compiled chunk is a separate, out-of-scope
//! collaborator too). This binary exists only so the crate has something
//! runnable to exercise the compiler end-to-end: it reads a source file,
//! compiles it, and reports either success or every diagnostic collected
//! during the single pass.

use std::path::PathBuf;
use std::process::ExitCode;

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use colored::Colorize;
use thiserror::Error;

use wickc::diagnostic::Diagnostic;

#[derive(Debug, Error)]
enum CliError {
    #[error("usage: wick <script>")]
    Usage,
    #[error("could not read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(65), // matches the classic Lox "data error" convention
        Err(err) => {
            eprintln!("{}", err.to_string().red());
            ExitCode::from(64)
        }
    }
}

/// Returns `Ok(true)` iff the source compiled with zero diagnostics.
fn run() -> Result<bool, CliError> {
    let mut args = std::env::args_os().skip(1);
    let path = PathBuf::from(args.next().ok_or(CliError::Usage)?);
    if args.next().is_some() {
        return Err(CliError::Usage);
    }

    let source = std::fs::read_to_string(&path).map_err(|source| CliError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let outcome = wickc::compile(&source);
    report(&outcome.diagnostics);

    if outcome.had_error() {
        Ok(false)
    } else {
        let function = outcome.function.expect("no error implies a function");
        eprintln!(
            "compiled '{}': {} top-level bytecode bytes, {} constants",
            path.display(),
            function.chunk.len(),
            function.chunk.constants.len(),
        );
        Ok(true)
    }
}

fn report(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        eprintln!("{}", diagnostic.to_string().red());
    }
}
