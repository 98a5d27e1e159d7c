//! Per-invocation configuration threaded through every core operation.
//!
//! There is no global mutable state: the ambient flags (`debug`, `verbose`,
//! `force`, `auto_yes`) and the warning/error counters live in a [`Config`]
//! value that each command constructs once and passes down explicitly.

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;

#[derive(Debug, Default)]
pub struct Config {
    pub debug: bool,
    pub verbose: bool,
    pub force: bool,
    pub auto_yes: bool,
    warnings: AtomicUsize,
    errors: AtomicUsize,
}

impl Config {
    pub fn new(debug: bool, verbose: bool, force: bool, auto_yes: bool) -> Self {
        Self {
            debug,
            verbose,
            force,
            auto_yes,
            warnings: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        }
    }

    /// Advisory condition: printed with a stable prefix, counted, never fatal.
    pub fn print_warning(&self, msg: &str) {
        self.warnings.fetch_add(1, Ordering::Relaxed);
        eprintln!("warning: {msg}");
    }

    /// Non-fatal error: the surrounding operation keeps going.
    pub fn print_error(&self, msg: &str) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        eprintln!("error: {msg}");
    }

    pub fn print_verbose(&self, msg: &str) {
        if self.verbose {
            println!("{msg}");
        }
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }

    /// Prompt for confirmation; `--force` and `--yes` answer without asking.
    pub fn confirm(&self, prompt: &str) -> Result<bool> {
        if self.force || self.auto_yes {
            return Ok(true);
        }
        let stdin = io::stdin();
        let mut stdin = stdin.lock();
        let mut stdout = io::stdout();
        confirm_with_io(prompt, &mut stdin, &mut stdout)
    }
}

/// Core, testable implementation that reads from any BufRead and writes to
/// any Write.
pub(crate) fn confirm_with_io<R: BufRead, W: Write>(
    prompt: &str,
    input: &mut R,
    output: &mut W,
) -> Result<bool> {
    write!(output, "{prompt} ")?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;

    let response = line.trim().to_lowercase();
    Ok(response == "y" || response == "yes")
}
