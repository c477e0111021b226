use crate::ast::{Node, Value};
use crate::builtinops::{BuiltinOp, OpKind, find_op};
use crate::{Error, MAX_EVAL_DEPTH};
use std::io::{self, Write};

mod environment;

pub use environment::{Environment, Function, Signature};

/// Maximum length of the expression text attached to an error as context
const MAX_CONTEXT: usize = 100;

/// Prefix of the error raised when evaluation nests deeper than allowed
const STACK_EXHAUSTED: &str = "stack exhausted";

/// Evaluator configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalConfig {
    /// Deepest evaluation nesting accepted before failing with "stack exhausted"
    pub max_depth: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig {
            max_depth: MAX_EVAL_DEPTH,
        }
    }
}

/// Why an evaluation step did not produce a plain value.
///
/// `Break` and `Continue` are consumed by the nearest enclosing `loop`, `Return` by
/// the nearest enclosing `call`. Whatever reaches the top of an evaluation
/// unconsumed is reported as a control flow error.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Interrupt {
    Break,
    Continue,
    Return(Value),
    Fault(Error),
}

impl From<Error> for Interrupt {
    fn from(err: Error) -> Self {
        Interrupt::Fault(err)
    }
}

impl Interrupt {
    /// The error reported when this interrupt escapes the whole evaluation
    fn into_error(self) -> Error {
        match self {
            Interrupt::Break => Error::ControlFlowError("break outside a loop".into()),
            Interrupt::Continue => Error::ControlFlowError("continue outside a loop".into()),
            Interrupt::Return(_) => Error::ControlFlowError("`return` outside a function".into()),
            Interrupt::Fault(err) => err,
        }
    }
}

/// Result of one evaluation step: a value, or an interrupt travelling upward
type Outcome = Result<Value, Interrupt>;

fn unknown_expression() -> Interrupt {
    Interrupt::Fault(Error::EvalError("unknown expression".into()))
}

/// Helper function to add expression context to errors
/// Only the innermost failing form is attached
fn add_context(interrupt: Interrupt, expr: &Node) -> Interrupt {
    let with_context = |msg: String| {
        if msg.contains("\n  Context: ") {
            return msg;
        }
        let text: String = expr.to_string().chars().take(MAX_CONTEXT).collect();
        format!("{msg}\n  Context: while evaluating: {text}")
    };
    match interrupt {
        // Whichever form trips the depth check is incidental
        Interrupt::Fault(Error::EvalError(msg)) if msg.starts_with(STACK_EXHAUSTED) => {
            Interrupt::Fault(Error::EvalError(msg))
        }
        Interrupt::Fault(Error::EvalError(msg)) => {
            Interrupt::Fault(Error::EvalError(with_context(msg)))
        }
        Interrupt::Fault(Error::TypeError(msg)) => {
            Interrupt::Fault(Error::TypeError(with_context(msg)))
        }
        // Name and control flow errors carry their own meaning
        other => other,
    }
}

/// Evaluate a node, printing to stdout (public API)
pub fn eval(node: &Node, env: &Environment) -> Result<Value, Error> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    eval_with_output(node, env, &mut out)
}

/// Evaluate a node, sending `print` output to `out`
pub fn eval_with_output(node: &Node, env: &Environment, out: &mut dyn Write) -> Result<Value, Error> {
    eval_with_config(node, env, out, EvalConfig::default())
}

/// Evaluate a node with explicit limits
pub fn eval_with_config(
    node: &Node,
    env: &Environment,
    out: &mut dyn Write,
    config: EvalConfig,
) -> Result<Value, Error> {
    Evaluator::new(out, config).eval_top(node, env)
}

/// Evaluate top-level forms one after another directly in `env`, without opening a
/// block frame, so their bindings stay visible to later evaluations in `env`.
/// Returns the value of the last form, or null when there are none.
pub fn eval_sequence(
    forms: &[Node],
    env: &Environment,
    out: &mut dyn Write,
    config: EvalConfig,
) -> Result<Value, Error> {
    let mut evaluator = Evaluator::new(out, config);
    let mut result = Value::Null;
    for form in forms {
        result = evaluator.eval_top(form, env)?;
    }
    Ok(result)
}

/// Tree-walking evaluator state for one run
struct Evaluator<'o> {
    out: &'o mut dyn Write,
    max_depth: usize,
}

impl<'o> Evaluator<'o> {
    fn new(out: &'o mut dyn Write, config: EvalConfig) -> Self {
        Evaluator {
            out,
            max_depth: config.max_depth,
        }
    }

    fn eval_top(&mut self, node: &Node, env: &Environment) -> Result<Value, Error> {
        self.eval(node, env, 0).map_err(Interrupt::into_error)
    }

    /// Evaluate a node with depth tracking to prevent stack overflow
    fn eval(&mut self, node: &Node, env: &Environment, depth: usize) -> Outcome {
        if depth >= self.max_depth {
            return Err(Error::EvalError(format!(
                "{STACK_EXHAUSTED} (max depth: {})",
                self.max_depth
            ))
            .into());
        }
        match node {
            Node::Literal(value) => Ok(value.clone()),
            // Only variables are visible as plain symbols, never functions
            Node::Symbol(name) => env
                .get(name)
                .ok_or_else(|| Error::NameError("undefined name".into()).into()),
            Node::Form(_) => self
                .eval_form(node, env, depth)
                .map_err(|interrupt| add_context(interrupt, node)),
        }
    }

    /// Dispatch a form on its tag and operand count; the first matching rule wins
    fn eval_form(&mut self, node: &Node, env: &Environment, depth: usize) -> Outcome {
        let Some(tag) = node.tag() else {
            return Err(unknown_expression());
        };
        let depth = depth + 1;

        match (tag, node.operands()) {
            ("val", [operand]) => self.eval_val(operand),
            ("do" | "then" | "else", operands @ [_, ..]) => self.eval_block(operands, env, depth),
            ("var", [name, expr]) => self.eval_var(name, expr, env, depth),
            ("set", [name, expr]) => self.eval_set(name, expr, env, depth),
            ("if" | "?", [cond, yes]) => self.eval_if(cond, yes, None, env, depth),
            ("if" | "?", [cond, yes, no]) => self.eval_if(cond, yes, Some(no), env, depth),
            ("print", args) => self.eval_print(args, env, depth),
            ("loop", [cond, body]) => self.eval_loop(cond, body, env, depth),
            ("break", []) => Err(Interrupt::Break),
            ("continue", []) => Err(Interrupt::Continue),
            ("def", [name, params, body]) => self.eval_def(name, params, body, env),
            ("call", [name, args @ ..]) => self.eval_call(name, args, env, depth),
            ("return", []) => Err(Interrupt::Return(Value::Null)),
            ("return", [expr]) => {
                let value = self.eval(expr, env, depth)?;
                Err(Interrupt::Return(value))
            }
            (op, args) => match find_op(op, args.len()) {
                Some(builtin) => self.eval_op(builtin, args, env, depth),
                None => Err(unknown_expression()),
            },
        }
    }

    /// `(val literal)`: the operand verbatim; a symbol operand yields its own text
    fn eval_val(&mut self, operand: &Node) -> Outcome {
        match operand {
            Node::Literal(value) => Ok(value.clone()),
            Node::Symbol(name) => Ok(Value::String(name.clone())),
            Node::Form(_) => Err(unknown_expression()),
        }
    }

    /// `(do e1 e2 ...)`: a fresh child frame, value of the last operand
    fn eval_block(&mut self, operands: &[Node], env: &Environment, depth: usize) -> Outcome {
        let scope = env.child();
        let mut result = Value::Null;
        for operand in operands {
            result = self.eval(operand, &scope, depth)?;
        }
        Ok(result)
    }

    /// `(var name expr)`: bind in the innermost frame only
    fn eval_var(&mut self, name: &Node, expr: &Node, env: &Environment, depth: usize) -> Outcome {
        let name = variable_name(name)?;
        if env.declares(name) {
            return Err(Error::NameError("duplicated name".into()).into());
        }
        // The new binding does not exist yet, so `expr` sees any outer `name`
        let value = self.eval(expr, env, depth)?;
        env.define(name, value.clone())?;
        Ok(value)
    }

    /// `(set name expr)`: overwrite the nearest existing binding
    fn eval_set(&mut self, name: &Node, expr: &Node, env: &Environment, depth: usize) -> Outcome {
        let name = variable_name(name)?;
        let scope = env
            .resolve(name)
            .ok_or_else(|| Error::NameError("undefined name".into()))?;
        let value = self.eval(expr, env, depth)?;
        scope.overwrite(name, value.clone());
        Ok(value)
    }

    /// `(if cond yes [no])`: condition and chosen branch share one child frame
    fn eval_if(
        &mut self,
        cond: &Node,
        yes: &Node,
        no: Option<&Node>,
        env: &Environment,
        depth: usize,
    ) -> Outcome {
        let scope = env.child();
        if self.eval(cond, &scope, depth)?.is_truthy() {
            self.eval(yes, &scope, depth)
        } else {
            match no {
                Some(no) => self.eval(no, &scope, depth),
                None => Ok(Value::Null),
            }
        }
    }

    /// `(print e...)`: values space-separated on one line
    fn eval_print(&mut self, args: &[Node], env: &Environment, depth: usize) -> Outcome {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, env, depth)?);
        }

        let line = values
            .iter()
            .map(|value| value.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(self.out, "{line}").map_err(|e| Error::OutputError(e.to_string()))?;
        Ok(Value::Null)
    }

    /// `(loop cond body)`: a fresh frame per iteration; value of the last completed body
    fn eval_loop(&mut self, cond: &Node, body: &Node, env: &Environment, depth: usize) -> Outcome {
        let mut result = Value::Null;
        loop {
            let scope = env.child();
            if !self.eval(cond, &scope, depth)?.is_truthy() {
                break;
            }
            match self.eval(body, &scope, depth) {
                Ok(value) => result = value,
                Err(Interrupt::Break) => break,
                Err(Interrupt::Continue) => continue,
                Err(other) => return Err(other),
            }
        }
        Ok(result)
    }

    /// `(def name (params...) body)`: register a closure in the innermost frame
    fn eval_def(&mut self, name: &Node, params: &Node, body: &Node, env: &Environment) -> Outcome {
        let name = name
            .as_symbol()
            .ok_or_else(|| Error::NameError("invalid function name".into()))?;

        let Node::Form(param_nodes) = params else {
            return Err(Error::NameError("invalid argument name".into()).into());
        };
        let mut param_names: Vec<String> = Vec::with_capacity(param_nodes.len());
        for param in param_nodes.iter() {
            let param = param
                .as_symbol()
                .ok_or_else(|| Error::NameError("invalid argument name".into()))?;
            param_names.push(param.to_owned());
        }
        for (i, param) in param_names.iter().enumerate() {
            if param_names[..i].contains(param) {
                return Err(Error::NameError("duplicated argument name".into()).into());
            }
        }

        let arity = param_names.len();
        env.define_function(name, param_names, body.clone())?;
        tracing::debug!(function = %Signature::new(name, arity), "defined function");
        Ok(Value::Null)
    }

    /// `(call name args...)`: arguments in the caller's frame, body in a frame
    /// chained to the function's closure
    fn eval_call(&mut self, name: &Node, args: &[Node], env: &Environment, depth: usize) -> Outcome {
        let name = name
            .as_symbol()
            .ok_or_else(|| Error::NameError("invalid function name".into()))?;
        let function = env
            .get_function(name, args.len())
            .ok_or_else(|| Error::NameError("undefined name".into()))?;

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, env, depth)?);
        }

        let frame = function.closure()?.child();
        for (param, value) in function.params().iter().zip(values) {
            frame.define(param, value)?;
        }

        tracing::trace!(function = %Signature::new(name, args.len()), depth, "call");
        match self.eval(function.body(), &frame, depth) {
            Ok(value) | Err(Interrupt::Return(value)) => Ok(value),
            Err(other) => Err(other),
        }
    }

    /// Operators evaluate every operand, left to right, before applying
    fn eval_op(
        &mut self,
        builtin: &BuiltinOp,
        args: &[Node],
        env: &Environment,
        depth: usize,
    ) -> Outcome {
        match (builtin.op_kind, args) {
            (OpKind::Unary(f), [operand]) => {
                let value = self.eval(operand, env, depth)?;
                Ok(f(value)?)
            }
            (OpKind::Binary(f), [left, right]) => {
                let left = self.eval(left, env, depth)?;
                let right = self.eval(right, env, depth)?;
                Ok(f(left, right)?)
            }
            _ => Err(unknown_expression()),
        }
    }
}

fn variable_name(node: &Node) -> Result<&str, Error> {
    node.as_symbol()
        .ok_or_else(|| Error::NameError("invalid variable name".into()))
}
