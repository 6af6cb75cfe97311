//! Interactive interpreter.
//!
//! ```ignore
//! nanlisp [file.lisp...]
//! ```
//!
//! `init.lisp` in the working directory, if present, is loaded first, then
//! each named file in order; after that, expressions are read from stdin.
//! Arena sizes come from `NANLISP_POOL`, `NANLISP_STACK`, `NANLISP_ALWAYS_GC`
//! and `NANLISP_MARKER`; log verbosity from `NANLISP_LOG`.

use std::path::Path;
use std::process::ExitCode;

use nanlisp::{Config, Interpreter};
use tracing::level_filters::LevelFilter;

fn main() -> ExitCode {
    let level = std::env::var("NANLISP_LOG")
        .ok()
        .and_then(|v| v.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::WARN);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env();
    let mut interp = match Interpreter::with_config(config) {
        Ok(interp) => interp,
        Err(e) => {
            eprintln!("cannot start: {e}");
            return ExitCode::FAILURE;
        }
    };
    interp.attach_terminal(
        Box::new(std::io::stdin().lock()),
        Box::new(std::io::stdout()),
    );

    // Sources are a stack: the last one pushed is read first.
    let files: Vec<String> = std::env::args().skip(1).collect();
    for file in files.iter().rev() {
        if let Err(e) = interp.load(file) {
            eprintln!("cannot load {file}: {e}");
        }
    }
    if Path::new("init.lisp").exists() {
        if let Err(e) = interp.load("init.lisp") {
            eprintln!("cannot load init.lisp: {e}");
        }
    }

    let mut stdout = std::io::stdout();
    match nanlisp::repl(&mut interp, &mut stdout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
