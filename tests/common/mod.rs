#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use lox_interpreter as lox;

use lox::RunOutcome;

/// In-memory output sink that tests can read back after a run.
#[derive(Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).expect("output is UTF-8")
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `source` and return everything it printed plus the outcome.
pub fn run(source: &str) -> (String, RunOutcome) {
    let buffer = SharedBuffer::default();
    let outcome = lox::run(source, Box::new(buffer.clone()));
    (buffer.contents(), outcome)
}

/// Run `source`, asserting it succeeds, and return its printed lines.
pub fn run_ok(source: &str) -> Vec<String> {
    let (output, outcome) = run(source);

    assert!(
        matches!(outcome, RunOutcome::Ok),
        "expected success, got {:?} (output so far: {:?})",
        outcome,
        output
    );

    output.lines().map(str::to_string).collect()
}

/// Run `source`, asserting it fails at runtime; returns (output, message).
pub fn run_runtime_error(source: &str) -> (String, String) {
    let (output, outcome) = run(source);

    match outcome {
        RunOutcome::RuntimeError(e) => (output, e.to_string()),
        other => panic!("expected a runtime error, got {:?}", other),
    }
}

/// Run `source`, asserting it is rejected statically; returns the messages.
pub fn run_static_errors(source: &str) -> Vec<String> {
    let (output, outcome) = run(source);

    assert!(output.is_empty(), "nothing should run, got {:?}", output);

    match outcome {
        RunOutcome::StaticErrors(errors) => errors.iter().map(ToString::to_string).collect(),
        other => panic!("expected static errors, got {:?}", other),
    }
}
