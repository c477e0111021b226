//! Built-in operator registry.
//!
//! Operators are the forms whose tag is an arithmetic, comparison or logical
//! symbol. They always receive already-evaluated operands:
//!
//! ```text
//! (+ 1 2)          ; 3
//! (/ 7 2)          ; 3.5, division is always floating point
//! (lt "a" "b")     ; true
//! (and true false) ; false, both sides evaluated
//! (- 5)            ; -5
//! ```
//!
//! ## Typing rules
//!
//! - Integer arithmetic is checked; overflow is an evaluation error, never a wrap.
//! - Mixing integers and floats promotes to float.
//! - `+` also concatenates two strings.
//! - `and`/`or` combine two booleans logically or two integers bitwise.
//! - Anything else is a type error naming the operator.
//!
//! ## Adding New Operations
//!
//! 1. Implement the function with the `UnaryFn` or `BinaryFn` signature
//! 2. Add it to `BUILTIN_OPS` with its identifier and kind
//! 3. Add tests covering edge cases and error conditions

use crate::Error;
use crate::ast::{IntType, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::LazyLock;

pub type UnaryFn = fn(Value) -> Result<Value, Error>;
pub type BinaryFn = fn(Value, Value) -> Result<Value, Error>;

/// The implementation of an operator, which also fixes its operand count
#[derive(Clone, Copy)]
pub enum OpKind {
    Unary(UnaryFn),
    Binary(BinaryFn),
}

impl std::fmt::Debug for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpKind::Unary(_) => write!(f, "Unary(<fn>)"),
            OpKind::Binary(_) => write!(f, "Binary(<fn>)"),
        }
    }
}

/// Definition of a built-in operator
#[derive(Debug, Clone)]
pub struct BuiltinOp {
    /// The form tag that selects this operator
    pub id: &'static str,
    pub op_kind: OpKind,
}

impl BuiltinOp {
    /// Number of operands the operator takes
    pub fn arity(&self) -> usize {
        match self.op_kind {
            OpKind::Unary(_) => 1,
            OpKind::Binary(_) => 2,
        }
    }
}

fn type_error(op: &str, args: &[&Value]) -> Error {
    let kinds: Vec<&str> = args.iter().map(|v| v.type_name()).collect();
    Error::TypeError(format!(
        "unsupported operand type(s) for '{op}': {}",
        kinds.join(", ")
    ))
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Int(n) => Some(*n as f64),
        Value::Float(x) => Some(*x),
        _ => None,
    }
}

/// Apply an arithmetic operator with integer checking and float promotion
fn arithmetic(
    op: &str,
    a: Value,
    b: Value,
    int_op: fn(IntType, IntType) -> Option<IntType>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, Error> {
    if let (Value::Int(x), Value::Int(y)) = (&a, &b) {
        return int_op(*x, *y)
            .map(Value::Int)
            .ok_or_else(|| Error::EvalError(format!("integer overflow in '{op}'")));
    }
    match (as_float(&a), as_float(&b)) {
        (Some(x), Some(y)) => Ok(Value::Float(float_op(x, y))),
        _ => Err(type_error(op, &[&a, &b])),
    }
}

//
// Builtin Operator Implementations
//

fn builtin_add(a: Value, b: Value) -> Result<Value, Error> {
    match (a, b) {
        (Value::String(mut x), Value::String(y)) => {
            x.push_str(&y);
            Ok(Value::String(x))
        }
        (a, b) => arithmetic("+", a, b, IntType::checked_add, |x, y| x + y),
    }
}

fn builtin_sub(a: Value, b: Value) -> Result<Value, Error> {
    arithmetic("-", a, b, IntType::checked_sub, |x, y| x - y)
}

fn builtin_mul(a: Value, b: Value) -> Result<Value, Error> {
    arithmetic("*", a, b, IntType::checked_mul, |x, y| x * y)
}

fn builtin_div(a: Value, b: Value) -> Result<Value, Error> {
    match (as_float(&a), as_float(&b)) {
        (Some(_), Some(y)) if y == 0.0 => Err(Error::EvalError("division by zero".into())),
        (Some(x), Some(y)) => Ok(Value::Float(x / y)),
        _ => Err(type_error("/", &[&a, &b])),
    }
}

fn builtin_eq(a: Value, b: Value) -> Result<Value, Error> {
    Ok(Value::Bool(a == b))
}

fn builtin_ne(a: Value, b: Value) -> Result<Value, Error> {
    Ok(Value::Bool(a != b))
}

/// Order two numbers or two strings; `None` for unordered floats (NaN)
fn compare(op: &str, a: &Value, b: &Value) -> Result<Option<Ordering>, Error> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(Some(x.cmp(y))),
        (Value::String(x), Value::String(y)) => Ok(Some(x.cmp(y))),
        _ => match (as_float(a), as_float(b)) {
            (Some(x), Some(y)) => Ok(x.partial_cmp(&y)),
            _ => Err(type_error(op, &[a, b])),
        },
    }
}

// Macro to generate ordering comparison operators
macro_rules! ordering_comparison {
    ($name:ident, $op_str:expr, $($ordering:pat_param)|+) => {
        fn $name(a: Value, b: Value) -> Result<Value, Error> {
            let ordering = compare($op_str, &a, &b)?;
            Ok(Value::Bool(matches!(ordering, $(Some($ordering))|+)))
        }
    };
}

ordering_comparison!(builtin_lt, "lt", Ordering::Less);
ordering_comparison!(builtin_le, "le", Ordering::Less | Ordering::Equal);
ordering_comparison!(builtin_gt, "gt", Ordering::Greater);
ordering_comparison!(builtin_ge, "ge", Ordering::Greater | Ordering::Equal);

fn builtin_and(a: Value, b: Value) -> Result<Value, Error> {
    match (&a, &b) {
        (Value::Bool(x), Value::Bool(y)) => Ok(Value::Bool(*x && *y)),
        (Value::Int(x), Value::Int(y)) => Ok(Value::Int(x & y)),
        _ => Err(type_error("and", &[&a, &b])),
    }
}

fn builtin_or(a: Value, b: Value) -> Result<Value, Error> {
    match (&a, &b) {
        (Value::Bool(x), Value::Bool(y)) => Ok(Value::Bool(*x || *y)),
        (Value::Int(x), Value::Int(y)) => Ok(Value::Int(x | y)),
        _ => Err(type_error("or", &[&a, &b])),
    }
}

fn builtin_neg(a: Value) -> Result<Value, Error> {
    match a {
        Value::Int(n) => n
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| Error::EvalError("integer overflow in '-'".into())),
        Value::Float(x) => Ok(Value::Float(-x)),
        other => Err(type_error("-", &[&other])),
    }
}

fn builtin_not(a: Value) -> Result<Value, Error> {
    Ok(Value::Bool(!a.is_truthy()))
}

/// Global registry of all built-in operators.
static BUILTIN_OPS: LazyLock<Vec<BuiltinOp>> = LazyLock::new(|| {
    use OpKind::{Binary, Unary};

    let op = |id, op_kind| BuiltinOp { id, op_kind };
    vec![
        // Arithmetic
        op("+", Binary(builtin_add)),
        op("-", Binary(builtin_sub)),
        op("*", Binary(builtin_mul)),
        op("/", Binary(builtin_div)),
        // Comparison
        op("eq", Binary(builtin_eq)),
        op("ne", Binary(builtin_ne)),
        op("ge", Binary(builtin_ge)),
        op("gt", Binary(builtin_gt)),
        op("le", Binary(builtin_le)),
        op("lt", Binary(builtin_lt)),
        // Logic, eager on both sides
        op("and", Binary(builtin_and)),
        op("or", Binary(builtin_or)),
        // Unary
        op("-", Unary(builtin_neg)),
        op("not", Unary(builtin_not)),
    ]
});

/// Lazy static map from id to the operators sharing it (`-` is both unary and binary)
static OPS_BY_ID: LazyLock<HashMap<&'static str, Vec<&'static BuiltinOp>>> = LazyLock::new(|| {
    let mut map: HashMap<&'static str, Vec<&'static BuiltinOp>> = HashMap::new();
    for op in BUILTIN_OPS.iter() {
        map.entry(op.id).or_default().push(op);
    }
    map
});

/// Find the operator selected by a form tag and operand count
pub fn find_op(id: &str, arity: usize) -> Option<&'static BuiltinOp> {
    OPS_BY_ID
        .get(id)?
        .iter()
        .find(|op| op.arity() == arity)
        .copied()
}

/// Get all registered operators
pub fn get_builtin_ops() -> &'static [BuiltinOp] {
    &BUILTIN_OPS
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;

    #[derive(Debug)]
    enum OpResult {
        Returns(Value),
        SpecificError(&'static str),
    }
    use OpResult::*;

    fn apply(id: &str, args: Vec<Value>) -> Result<Value, Error> {
        let op = find_op(id, args.len()).unwrap();
        let mut args = args.into_iter();
        match op.op_kind {
            OpKind::Unary(f) => f(args.next().unwrap()),
            OpKind::Binary(f) => f(args.next().unwrap(), args.next().unwrap()),
        }
    }

    fn run_op_tests(cases: Vec<(&str, Vec<Value>, OpResult)>) {
        for (i, (id, args, expected)) in cases.into_iter().enumerate() {
            let test_id = format!("Op test #{} ({id} {args:?})", i + 1);
            match (apply(id, args), &expected) {
                (Ok(actual), Returns(value)) => {
                    assert_eq!(actual, *value, "{test_id}");
                    // Int and Float compare equal, so pin down the representation too
                    assert_eq!(actual.type_name(), value.type_name(), "{test_id}");
                }
                (Err(err), SpecificError(msg)) => {
                    assert!(err.to_string().contains(msg), "{test_id}: got {err}");
                }
                (actual, _) => panic!("{test_id}: expected {expected:?}, got {actual:?}"),
            }
        }
    }

    fn s(text: &str) -> Value {
        Value::from(text)
    }

    #[test]
    fn test_arithmetic() {
        use Value::{Float, Int};
        run_op_tests(vec![
            ("+", vec![Int(2), Int(3)], Returns(Int(5))),
            ("+", vec![Int(2), Float(0.5)], Returns(Float(2.5))),
            ("+", vec![s("ab"), s("cd")], Returns(s("abcd"))),
            ("-", vec![Int(2), Int(5)], Returns(Int(-3))),
            ("*", vec![Int(4), Int(-6)], Returns(Int(-24))),
            ("*", vec![Float(1.5), Int(2)], Returns(Float(3.0))),
            ("/", vec![Int(7), Int(2)], Returns(Float(3.5))),
            ("/", vec![Int(6), Int(3)], Returns(Float(2.0))),
            ("/", vec![Int(1), Int(0)], SpecificError("division by zero")),
            ("/", vec![Float(1.0), Float(0.0)], SpecificError("division by zero")),
            ("+", vec![Int(i64::MAX), Int(1)], SpecificError("integer overflow")),
            ("*", vec![Int(i64::MIN), Int(-1)], SpecificError("integer overflow")),
            ("+", vec![s("a"), Int(1)], SpecificError("'+': string, integer")),
            ("-", vec![s("a"), s("b")], SpecificError("TypeError")),
            ("*", vec![Value::Null, Int(1)], SpecificError("TypeError")),
            ("+", vec![Value::Bool(true), Int(1)], SpecificError("TypeError")),
        ]);
    }

    #[test]
    fn test_comparison() {
        use Value::{Bool, Float, Int, Null};
        run_op_tests(vec![
            ("eq", vec![Int(1), Int(1)], Returns(Bool(true))),
            ("eq", vec![Int(1), Float(1.0)], Returns(Bool(true))),
            ("eq", vec![s("a"), s("a")], Returns(Bool(true))),
            ("eq", vec![Null, Null], Returns(Bool(true))),
            ("eq", vec![Null, Int(0)], Returns(Bool(false))),
            ("ne", vec![Int(1), s("1")], Returns(Bool(true))),
            ("lt", vec![Int(1), Int(2)], Returns(Bool(true))),
            ("lt", vec![Int(2), Int(2)], Returns(Bool(false))),
            ("le", vec![Int(2), Int(2)], Returns(Bool(true))),
            ("gt", vec![Float(2.5), Int(2)], Returns(Bool(true))),
            ("ge", vec![Int(1), Float(1.5)], Returns(Bool(false))),
            ("lt", vec![s("apple"), s("banana")], Returns(Bool(true))),
            ("gt", vec![Float(f64::NAN), Int(0)], Returns(Bool(false))),
            ("lt", vec![Int(1), s("2")], SpecificError("'lt'")),
            ("ge", vec![Null, Null], SpecificError("TypeError")),
        ]);
    }

    #[test]
    fn test_logic() {
        use Value::{Bool, Int, Null};
        run_op_tests(vec![
            ("and", vec![Bool(true), Bool(false)], Returns(Bool(false))),
            ("and", vec![Bool(true), Bool(true)], Returns(Bool(true))),
            ("or", vec![Bool(false), Bool(true)], Returns(Bool(true))),
            ("or", vec![Bool(false), Bool(false)], Returns(Bool(false))),
            ("and", vec![Int(6), Int(3)], Returns(Int(2))),
            ("or", vec![Int(6), Int(3)], Returns(Int(7))),
            ("and", vec![Bool(true), Int(1)], SpecificError("'and'")),
            ("not", vec![Bool(true)], Returns(Bool(false))),
            ("not", vec![Null], Returns(Bool(true))),
            ("not", vec![s("")], Returns(Bool(true))),
            ("not", vec![Int(3)], Returns(Bool(false))),
        ]);
    }

    #[test]
    fn test_negation() {
        use Value::{Float, Int};
        run_op_tests(vec![
            ("-", vec![Int(5)], Returns(Int(-5))),
            ("-", vec![Float(-0.5)], Returns(Float(0.5))),
            ("-", vec![Int(i64::MIN)], SpecificError("integer overflow")),
            ("-", vec![s("x")], SpecificError("TypeError")),
        ]);
    }

    #[test]
    fn test_lookup_by_arity() {
        assert_eq!(find_op("-", 1).unwrap().arity(), 1);
        assert_eq!(find_op("-", 2).unwrap().arity(), 2);
        assert!(find_op("not", 2).is_none());
        assert!(find_op("+", 1).is_none());
        assert!(find_op("print", 2).is_none());
        assert_eq!(get_builtin_ops().len(), 14);
    }
}
