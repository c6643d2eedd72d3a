//! A tree‑walking interpreter for the Lox scripting language.
//!
//! Pipeline: [`scanner`] → [`parser`] → [`resolver`] → [`interpreter`].
//! Each static stage returns its output together with the diagnostics it
//! collected; [`run`] chains them and only executes a program that passed
//! every static check.

pub mod ast;
pub mod callable;
pub mod class;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod stack;
pub mod token;
pub mod value;

use std::io::Write;

use log::info;

use crate::error::LoxError;
use crate::interpreter::{Interpreter, DEFAULT_MAX_CALL_DEPTH};
use crate::parser::Parser;
use crate::resolver::Resolver;

/// Exit status for scripts rejected before execution.
pub const EXIT_STATIC_ERROR: i32 = 65;

/// Exit status for scripts that failed while running.
pub const EXIT_RUNTIME_ERROR: i32 = 70;

/// Result of running one source text through the whole pipeline.
#[derive(Debug)]
pub enum RunOutcome {
    /// The program ran to completion.
    Ok,

    /// Scanning, parsing or resolution failed; nothing was executed.
    StaticErrors(Vec<LoxError>),

    /// Execution stopped at this error.
    RuntimeError(LoxError),
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Ok => 0,
            RunOutcome::StaticErrors(_) => EXIT_STATIC_ERROR,
            RunOutcome::RuntimeError(_) => EXIT_RUNTIME_ERROR,
        }
    }

    /// Every diagnostic, in the order it was produced.
    pub fn diagnostics(&self) -> Vec<&LoxError> {
        match self {
            RunOutcome::Ok => Vec::new(),
            RunOutcome::StaticErrors(errors) => errors.iter().collect(),
            RunOutcome::RuntimeError(error) => vec![error],
        }
    }
}

/// Run `source`, sending `print` output to `output`.
pub fn run(source: &str, output: Box<dyn Write>) -> RunOutcome {
    run_with_depth(source, output, DEFAULT_MAX_CALL_DEPTH)
}

/// [`run`] with an explicit limit on nested user calls.
pub fn run_with_depth(source: &str, output: Box<dyn Write>, max_call_depth: usize) -> RunOutcome {
    let (tokens, mut diagnostics) = scanner::scan_tokens(source);

    let (statements, parse_errors) = Parser::new(&tokens).parse();
    diagnostics.extend(parse_errors);

    // A program that failed to scan or parse is not resolved: the tree is
    // incomplete and would only produce follow‑on noise.
    if !diagnostics.is_empty() {
        info!("Static errors before resolution: {}", diagnostics.len());
        return RunOutcome::StaticErrors(diagnostics);
    }

    let mut interpreter = Interpreter::with_output(output).with_max_call_depth(max_call_depth);

    let resolve_errors: Vec<LoxError> = Resolver::new(&mut interpreter).resolve(&statements);

    if !resolve_errors.is_empty() {
        info!("Resolution failed with {} error(s)", resolve_errors.len());
        return RunOutcome::StaticErrors(resolve_errors);
    }

    match interpreter.interpret(&statements) {
        Ok(()) => RunOutcome::Ok,
        Err(e) => RunOutcome::RuntimeError(e),
    }
}
