//! This module defines the syntax tree produced by the parser and the runtime values
//! produced by the evaluator. A [`Node`] is either a literal, a symbol or a
//! parenthesized form; forms share their elements through an `Rc` slice so that
//! function bodies can be kept by closures without copying the tree. [`Value`] covers
//! the scalar data the language computes with. Helper functions such as `lit`,
//! `sym` and `form` make building trees by hand convenient in tests.

use std::fmt;
use std::rc::Rc;

/// Type alias for integer values in the interpreter
pub(crate) type IntType = i64;

/// Runtime value of an expression
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// The absent value, also the result of `print` and `def`
    #[default]
    Null,
    Bool(bool),
    Int(IntType),
    Float(f64),
    String(String),
}

impl Value {
    /// Whether the value counts as true in conditions
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(x) => *x != 0.0,
            Value::String(s) => !s.is_empty(),
        }
    }

    /// Name of the value's kind, used in type errors
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
        }
    }

    /// Decode a JSON scalar into a value. Arrays and objects are not scalars.
    pub(crate) fn from_json(json: serde_json::Value) -> Option<Value> {
        match json {
            serde_json::Value::Null => Some(Value::Null),
            serde_json::Value::Bool(b) => Some(Value::Bool(b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Value::Int)
                .or_else(|| n.as_f64().map(Value::Float)),
            serde_json::Value::String(s) => Some(Value::String(s)),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }

    /// Source text that parses back to this value
    pub fn to_literal_text(&self) -> String {
        match self {
            Value::String(s) => serde_json::Value::String(s.clone()).to_string(),
            Value::Float(x) if x.is_nan() => "NaN".to_owned(),
            Value::Float(x) if *x == f64::INFINITY => "Infinity".to_owned(),
            Value::Float(x) if *x == f64::NEG_INFINITY => "-Infinity".to_owned(),
            other => other.to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            // Numbers compare by magnitude regardless of representation
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::String(a), Value::String(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) if x.is_nan() => write!(f, "nan"),
            // Debug formatting keeps the fractional part: 2.0 rather than 2
            Value::Float(x) => write!(f, "{x:?}"),
            Value::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Int(n as IntType)
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(IntType);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

/// Syntax tree node. Built once by the parser and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A scalar literal
    Literal(Value),
    /// A bare identifier reference
    Symbol(String),
    /// A parenthesized list: tag followed by operands
    Form(Rc<[Node]>),
}

impl Node {
    /// The tag of a form, when its first element is a symbol
    pub fn tag(&self) -> Option<&str> {
        match self {
            Node::Form(elements) => match elements.first() {
                Some(Node::Symbol(name)) => Some(name.as_str()),
                _ => None,
            },
            _ => None,
        }
    }

    /// The operands of a form (every element after the tag)
    pub fn operands(&self) -> &[Node] {
        match self {
            Node::Form(elements) => elements.get(1..).unwrap_or(&[]),
            _ => &[],
        }
    }

    /// The symbol name, if this node is a symbol
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Node::Symbol(name) => Some(name.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Literal(value) => write!(f, "{}", value.to_literal_text()),
            Node::Symbol(name) => write!(f, "{name}"),
            Node::Form(elements) => {
                write!(f, "(")?;
                for (i, elem) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{elem}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Helper function for creating literal nodes
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn lit<T: Into<Value>>(value: T) -> Node {
    Node::Literal(value.into())
}

/// Helper function for creating symbol nodes
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn sym<S: AsRef<str>>(name: S) -> Node {
    Node::Symbol(name.as_ref().to_owned())
}

/// Helper function for creating form nodes from their elements
pub(crate) fn form(elements: Vec<Node>) -> Node {
    Node::Form(elements.into())
}
