//! Lexical scope frames and the closures that capture them.
//!
//! An [`Environment`] is a cheap, reference-counted handle to one frame. Frames
//! point at their parent and never at their children, so any number of sibling
//! frames (successive loop iterations, concurrent calls) can share a parent and a
//! frame lives for as long as some handle to it, or to one of its descendants,
//! is alive.
//!
//! Each frame holds two tables: variables keyed by name, and functions keyed by
//! [`Signature`] (name plus arity). A [`Function`] is registered in the very frame
//! it closes over, so the table refers back to that frame weakly; the function
//! can only be reached by walking a chain that passes through its frame, which
//! keeps the frame alive for the duration of any call.

use crate::Error;
use crate::ast::{Node, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// Key of a function table entry: functions overload on parameter count
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signature {
    pub name: String,
    pub arity: usize,
}

impl Signature {
    pub fn new(name: impl Into<String>, arity: usize) -> Self {
        Signature {
            name: name.into(),
            arity,
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.arity)
    }
}

/// A user-defined function: parameters, body and the frame it was defined in
#[derive(Clone)]
pub struct Function {
    params: Vec<String>,
    body: Node,
    closure: Weak<Scope>,
}

impl Function {
    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn body(&self) -> &Node {
        &self.body
    }

    /// The frame captured at the definition site
    pub(crate) fn closure(&self) -> Result<Environment, Error> {
        self.closure
            .upgrade()
            .map(Environment)
            .ok_or_else(|| Error::EvalError("closure environment no longer exists".into()))
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function(params={:?}, body={})", self.params, self.body)
    }
}

#[derive(Default)]
pub(crate) struct Scope {
    variables: RefCell<HashMap<String, Value>>,
    functions: RefCell<HashMap<Signature, Rc<Function>>>,
    parent: Option<Environment>,
}

/// Handle to one scope frame in the chain
#[derive(Clone, Default)]
pub struct Environment(Rc<Scope>);

impl Environment {
    /// A new root frame with no parent
    pub fn new() -> Self {
        Environment::default()
    }

    /// A new empty frame whose parent is this one
    pub fn child(&self) -> Self {
        Environment(Rc::new(Scope {
            parent: Some(self.clone()),
            ..Scope::default()
        }))
    }

    pub fn parent(&self) -> Option<&Environment> {
        self.0.parent.as_ref()
    }

    /// Iterate over this frame and its ancestors, innermost first
    fn chain(&self) -> impl Iterator<Item = &Environment> {
        std::iter::successors(Some(self), |env| env.parent())
    }

    /// Whether this very frame (not its ancestors) binds `name`
    pub fn declares(&self, name: &str) -> bool {
        self.0.variables.borrow().contains_key(name)
    }

    /// Bind a new variable in this frame
    pub fn define(&self, name: &str, value: Value) -> Result<(), Error> {
        let mut variables = self.0.variables.borrow_mut();
        if variables.contains_key(name) {
            return Err(Error::NameError("duplicated name".into()));
        }
        variables.insert(name.to_owned(), value);
        Ok(())
    }

    /// Look up a variable, innermost frame outward
    pub fn get(&self, name: &str) -> Option<Value> {
        self.chain()
            .find_map(|env| env.0.variables.borrow().get(name).cloned())
    }

    /// The nearest frame in the chain that binds `name`
    pub fn resolve(&self, name: &str) -> Option<Environment> {
        self.chain().find(|env| env.declares(name)).cloned()
    }

    /// Overwrite a binding that already exists in this frame
    pub(crate) fn overwrite(&self, name: &str, value: Value) {
        if let Some(slot) = self.0.variables.borrow_mut().get_mut(name) {
            *slot = value;
        }
    }

    /// Register a function in this frame, closing over this frame
    pub fn define_function(&self, name: &str, params: Vec<String>, body: Node) -> Result<(), Error> {
        let signature = Signature::new(name, params.len());
        let mut functions = self.0.functions.borrow_mut();
        if functions.contains_key(&signature) {
            return Err(Error::NameError("duplicated function name".into()));
        }
        let function = Function {
            params,
            body,
            closure: Rc::downgrade(&self.0),
        };
        functions.insert(signature, Rc::new(function));
        Ok(())
    }

    /// Look up a function by name and arity, innermost frame outward
    pub fn get_function(&self, name: &str, arity: usize) -> Option<Rc<Function>> {
        let signature = Signature::new(name, arity);
        self.chain()
            .find_map(|env| env.0.functions.borrow().get(&signature).cloned())
    }

    /// Get all variable bindings visible from this frame
    /// Returns a Vec of (name, value) pairs sorted by name, inner bindings shadowing outer ones
    pub fn get_all_bindings(&self) -> Vec<(String, Value)> {
        let mut bindings = HashMap::new();
        for env in self.chain() {
            for (name, value) in env.0.variables.borrow().iter() {
                bindings.entry(name.clone()).or_insert_with(|| value.clone());
            }
        }

        let mut result: Vec<_> = bindings.into_iter().collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }

    /// Get the signatures of all functions visible from this frame, sorted
    pub fn get_all_functions(&self) -> Vec<Signature> {
        let mut signatures: Vec<Signature> = self
            .chain()
            .flat_map(|env| env.0.functions.borrow().keys().cloned().collect::<Vec<_>>())
            .collect();
        signatures.sort();
        signatures.dedup();
        signatures
    }

    #[cfg(test)]
    pub(crate) fn ptr_eq(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("variables", &self.0.variables.borrow())
            .field("functions", &self.0.functions.borrow().keys().collect::<Vec<_>>())
            .field("parent", &self.0.parent)
            .finish()
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{lit, sym};

    #[test]
    fn test_define_and_shadow() {
        let root = Environment::new();
        root.define("a", Value::Int(1)).unwrap();

        let inner = root.child();
        assert_eq!(inner.get("a"), Some(Value::Int(1)));
        assert!(!inner.declares("a"));

        inner.define("a", Value::Int(7)).unwrap();
        assert_eq!(inner.get("a"), Some(Value::Int(7)));
        assert_eq!(root.get("a"), Some(Value::Int(1)));

        let err = inner.define("a", Value::Int(8)).unwrap_err();
        assert_eq!(err, Error::NameError("duplicated name".into()));
        assert_eq!(inner.get("missing"), None);
    }

    #[test]
    fn test_resolve_walks_outward() {
        let root = Environment::new();
        root.define("b", Value::Int(2)).unwrap();
        let inner = root.child().child();

        let owner = inner.resolve("b").unwrap();
        assert!(owner.ptr_eq(&root));
        owner.overwrite("b", Value::Int(17));
        assert_eq!(inner.get("b"), Some(Value::Int(17)));
        assert!(!inner.declares("b"));

        assert!(inner.resolve("nope").is_none());
    }

    #[test]
    fn test_sibling_frames_share_parent() {
        let root = Environment::new();
        let first = root.child();
        let second = root.child();
        first.define("x", Value::Int(1)).unwrap();

        assert_eq!(second.get("x"), None);
        assert!(first.parent().unwrap().ptr_eq(second.parent().unwrap()));
    }

    #[test]
    fn test_functions_overload_on_arity() {
        let root = Environment::new();
        root.define_function("f", vec!["x".into()], sym("x")).unwrap();
        root.define_function("f", vec!["x".into(), "y".into()], sym("y"))
            .unwrap();

        assert_eq!(root.get_function("f", 1).unwrap().body(), &sym("x"));
        assert_eq!(root.get_function("f", 2).unwrap().body(), &sym("y"));
        assert!(root.get_function("f", 0).is_none());

        let err = root.define_function("f", vec!["z".into()], lit(1)).unwrap_err();
        assert_eq!(err, Error::NameError("duplicated function name".into()));

        // Functions are not variables
        assert_eq!(root.get("f"), None);
        assert_eq!(
            root.get_all_functions(),
            vec![Signature::new("f", 1), Signature::new("f", 2)]
        );
    }

    #[test]
    fn test_function_found_from_nested_frame() {
        let root = Environment::new();
        let block = root.child();
        block.define_function("g", vec![], lit(1)).unwrap();

        let nested = block.child().child();
        let function = nested.get_function("g", 0).unwrap();
        assert!(function.closure().unwrap().ptr_eq(&block));
        assert!(root.get_function("g", 0).is_none());
    }

    #[test]
    fn test_closure_does_not_keep_frame_alive() {
        let root = Environment::new();
        let block = root.child();
        block.define_function("h", vec![], lit(1)).unwrap();
        let function = block.get_function("h", 0).unwrap();

        drop(block);
        assert!(function.closure().is_err());
    }

    #[test]
    fn test_get_all_bindings_shadowing() {
        let root = Environment::new();
        root.define("a", Value::Int(1)).unwrap();
        root.define("z", Value::Int(26)).unwrap();
        let inner = root.child();
        inner.define("a", Value::Int(2)).unwrap();

        assert_eq!(
            inner.get_all_bindings(),
            vec![("a".into(), Value::Int(2)), ("z".into(), Value::Int(26))]
        );
    }
}
