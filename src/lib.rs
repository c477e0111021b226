//! plscript - a small embedded S-expression scripting language
//!
//! Source text is parsed into an immutable tree of [`ast::Node`]s and executed by a
//! recursive tree-walking evaluator over a chain of lexically scoped frames.
//!
//! ```text
//! ; variables, blocks and assignment
//! (var a 1)
//! (var b (+ a 1))
//! (do (var a (+ b 5)) (set b (+ a 10)))
//!
//! ; functions are closures, overloaded by arity
//! (def sq (x) (* x x))
//! (def sq (x y) (+ (call sq x) (call sq y)))
//!
//! ; loops with break/continue
//! (var i 0)
//! (loop (lt i 5) (set i (+ i 1)))
//! (print (call sq i) (* a b))
//! ```
//!
//! ## Semantics in brief
//!
//! - Every atom that decodes as a JSON scalar (`1`, `2.5`, `"s"`, `true`, `null`)
//!   is a literal, everything else is a symbol.
//! - A program is a sequence of top-level forms, implicitly wrapped in `(do ...)`.
//! - `and`/`or` evaluate both operands, there is no short circuit.
//! - `break`/`continue`/`return` are carried as explicit control signals and
//!   misuse outside their construct is reported as a [`Error::ControlFlowError`].
//!
//! ## Modules
//!
//! - `sexpr`: S-expression parsing from text
//! - `ast`: syntax tree nodes and runtime values
//! - `evaluator`: environments, closures and the core evaluation engine
//! - `builtinops`: arithmetic, comparison and logical operators
//! - `interpreter`: a session with a persistent root environment

use std::fmt;

/// Maximum parsing depth to prevent stack overflow on deeply nested input
pub const MAX_PARSE_DEPTH: usize = 128;

/// Maximum evaluation depth to prevent stack overflow in recursive evaluation
/// Set higher than parse depth to leave room for recursive function calls
pub const MAX_EVAL_DEPTH: usize = 400;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ParseErrorKind {
    /// Input ended before a `(` found its matching `)`
    UnbalancedParenthesis,
    /// A `)` appeared where an expression was expected
    BadParenthesis,
    /// An expression was expected but there was nothing to read
    EmptyProgram,
    /// Extra input found after the complete top-level form
    TrailingGarbage,
    /// Expression nesting exceeded the maximum parse depth
    TooDeeplyNested,
    /// A whole-number literal does not fit a 64-bit signed integer
    IntegerOutOfRange,
}

impl ParseErrorKind {
    /// The short message reported for this kind of failure
    pub fn message(self) -> &'static str {
        match self {
            ParseErrorKind::UnbalancedParenthesis => "unbalanced parenthesis",
            ParseErrorKind::BadParenthesis => "bad parenthesis",
            ParseErrorKind::EmptyProgram => "empty program",
            ParseErrorKind::TrailingGarbage => "trailing garbage",
            ParseErrorKind::TooDeeplyNested => "expression too deeply nested",
            ParseErrorKind::IntegerOutOfRange => "integer literal out of range",
        }
    }
}

/// A structured error providing detailed information about a parsing failure.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Context snippet from the input showing where the error occurred (max 100 chars)
    pub context: Option<String>,
    /// The problematic token or character encountered, if identifiable
    pub found: Option<String>,
}

impl ParseError {
    /// Create a ParseError with all fields
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        context: Option<String>,
        found: Option<String>,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context,
            found,
        }
    }

    /// Create a ParseError with context and found token extracted from input at a given
    /// byte offset
    pub fn with_context_and_found(
        kind: ParseErrorKind,
        input: &str,
        error_offset: usize,
        found: Option<String>,
    ) -> Self {
        const MAX_CONTEXT: usize = 100;

        let error_offset = error_offset.min(input.len());
        // Show some input before the error, snapped back to a char boundary
        let mut context_start = error_offset.saturating_sub(20);
        while !input.is_char_boundary(context_start) {
            context_start -= 1;
        }

        let context_str: String = input[context_start..].chars().take(MAX_CONTEXT).collect();

        let mut display_context = String::new();
        if context_start > 0 {
            display_context.push_str("[...]");
        }
        display_context.push_str(&context_str);
        if context_start + context_str.len() < input.len() {
            display_context.push_str("[...]");
        }

        // Replace newlines with visible markers for better error display
        let display_context = display_context.replace('\n', "\\n").replace('\r', "");

        Self::new(kind, kind.message(), Some(display_context), found)
    }
}

/// Error types for the interpreter
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed source text
    SyntaxError(ParseError),
    /// Undefined, duplicated or invalid variable, function or parameter names
    NameError(String),
    /// `break`/`continue` outside a loop or `return` outside a function
    ControlFlowError(String),
    /// Unknown forms, wrong operand counts and arithmetic failures
    EvalError(String),
    /// An operator applied to values of the wrong kind
    TypeError(String),
    /// The `print` output could not be written
    OutputError(String),
}

impl Error {
    /// Short machine-friendly name of the error category
    pub fn kind_name(&self) -> &'static str {
        match self {
            Error::SyntaxError(_) => "SyntaxError",
            Error::NameError(_) => "NameError",
            Error::ControlFlowError(_) => "ControlFlowError",
            Error::EvalError(_) => "EvaluationError",
            Error::TypeError(_) => "TypeError",
            Error::OutputError(_) => "OutputError",
        }
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::SyntaxError(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::SyntaxError(e) => {
                write!(f, "SyntaxError: {}", e.message)?;
                if let Some(found) = &e.found {
                    write!(f, "\nFound: {found}")?;
                }
                if let Some(context) = &e.context {
                    write!(f, "\nContext: {context}")?;
                }
                Ok(())
            }
            Error::NameError(msg)
            | Error::ControlFlowError(msg)
            | Error::EvalError(msg)
            | Error::TypeError(msg)
            | Error::OutputError(msg) => write!(f, "{}: {msg}", self.kind_name()),
        }
    }
}

impl std::error::Error for Error {}

pub mod ast;
pub mod builtinops;
pub mod evaluator;
pub mod interpreter;
pub mod sexpr;

pub use ast::{Node, Value};
pub use evaluator::Environment;
pub use interpreter::Interpreter;

/// Parse a whole program into a single `(do ...)` node.
pub fn parse(source: &str) -> Result<Node, Error> {
    sexpr::parse_program(source)
}

/// Evaluate a parsed program in the given root environment, printing to stdout.
pub fn evaluate(node: &Node, env: &Environment) -> Result<Value, Error> {
    evaluator::eval(node, env)
}

/// Parse and evaluate a program in a fresh root environment.
pub fn run(source: &str) -> Result<Value, Error> {
    let program = parse(source)?;
    evaluate(&program, &Environment::new())
}
