//! A long-lived interpreter session.
//!
//! Unlike [`crate::run`], which wraps a program in an implicit `(do ...)` block, an
//! [`Interpreter`] evaluates each top-level form directly in its root frame. Variables
//! and functions defined by one call to [`Interpreter::run`] remain visible to the next,
//! which is what a REPL or an embedding host wants.

use crate::Error;
use crate::ast::Value;
use crate::evaluator::{EvalConfig, Environment, eval_sequence};
use crate::sexpr::{ParseConfig, parse_forms_with_config};
use std::io::{self, Write};

#[derive(Debug, Clone, Default)]
pub struct Interpreter {
    env: Environment,
    parse_config: ParseConfig,
    eval_config: EvalConfig,
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter::default()
    }

    pub fn with_config(parse_config: ParseConfig, eval_config: EvalConfig) -> Self {
        Interpreter {
            env: Environment::new(),
            parse_config,
            eval_config,
        }
    }

    /// The persistent root frame
    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Run source text, printing to stdout
    pub fn run(&mut self, source: &str) -> Result<Value, Error> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        self.run_with_output(source, &mut out)
    }

    /// Run source text, sending `print` output to `out`.
    /// Forms evaluated before an error keep their effects.
    pub fn run_with_output(&mut self, source: &str, out: &mut dyn Write) -> Result<Value, Error> {
        let forms = parse_forms_with_config(source, self.parse_config)?;
        eval_sequence(&forms, &self.env, out, self.eval_config)
    }
}
