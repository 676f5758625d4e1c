//! Runtime values.
//!
//! Operator semantics belong to the host; this module only defines the
//! shapes values take while they sit in slots. Values are `Send + Sync` and
//! never reference pooled storage, which is what lets a slot's contents be
//! copied out of a recycled frame.

use std::fmt;
use std::sync::Arc;

use osc_ir::{Symbol, SymbolInterner};

use crate::scope::DurableScope;
use crate::NodeEvaluator;

/// A runtime value.
#[derive(Clone, Default)]
pub enum Value {
    /// Content of a slot that was declared but never assigned.
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    /// Immutable positional values, e.g. an escaped argument list.
    Array(Arc<[Value]>),
    Function(Arc<FunctionValue>),
}

impl Value {
    #[inline]
    pub fn int(n: i64) -> Self {
        Value::Int(n)
    }

    #[inline]
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Value::Str(s.into())
    }

    #[inline]
    pub fn function(f: FunctionValue) -> Self {
        Value::Function(Arc::new(f))
    }

    #[inline]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Integer payload, if this is an `Int`.
    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    #[inline]
    pub fn as_function(&self) -> Option<&Arc<FunctionValue>> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Name of the value's kind, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "exact number",
            Value::Float(_) => "inexact number",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Function(_) => "function",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            // Functions compare by identity
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "Undefined"),
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(n) => write!(f, "Int({n})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Array(items) => f.debug_tuple("Array").field(items).finish(),
            Value::Function(func) => write!(f, "Function({func:?})"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "(undefined)"),
            Value::Null => write!(f, "(null)"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Function(func) => write!(f, "{func}"),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }
}

/// A script function: its body plus the durable scope it closed over.
///
/// Closures may only capture a [`DurableScope`]; a pooled scope has to be
/// escaped through the stack frame first.
pub struct FunctionValue {
    name: Option<Symbol>,
    body: Arc<dyn NodeEvaluator>,
    overridden: Option<Arc<FunctionValue>>,
    closure: Option<DurableScope>,
    encloses_functions: bool,
}

impl FunctionValue {
    pub fn new(name: Option<Symbol>, body: Arc<dyn NodeEvaluator>) -> Self {
        FunctionValue {
            name,
            body,
            overridden: None,
            closure: None,
            encloses_functions: false,
        }
    }

    /// The function this one overrides, answered by `super` in its scope.
    #[must_use]
    pub fn with_overridden(mut self, overridden: Arc<FunctionValue>) -> Self {
        self.overridden = Some(overridden);
        self
    }

    /// Scope the body's free names resolve against.
    #[must_use]
    pub fn with_closure(mut self, closure: DurableScope) -> Self {
        self.closure = Some(closure);
        self
    }

    /// Mark the body as defining functions of its own. Each call then gets
    /// a heap scope, so the inner functions share its live variables.
    #[must_use]
    pub fn with_enclosed_functions(mut self) -> Self {
        self.encloses_functions = true;
        self
    }

    #[inline]
    pub fn name(&self) -> Option<Symbol> {
        self.name
    }

    #[inline]
    pub fn encloses_functions(&self) -> bool {
        self.encloses_functions
    }

    #[inline]
    pub fn body(&self) -> &Arc<dyn NodeEvaluator> {
        &self.body
    }

    #[inline]
    pub fn overridden(&self) -> Option<&Arc<FunctionValue>> {
        self.overridden.as_ref()
    }

    #[inline]
    pub fn closure(&self) -> Option<&DurableScope> {
        self.closure.as_ref()
    }
}

impl fmt::Debug for FunctionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionValue")
            .field("name", &self.name)
            .field("overrides", &self.overridden.is_some())
            .field("closure", &self.closure.is_some())
            .field("encloses_functions", &self.encloses_functions)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for FunctionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name.and_then(|sym| SymbolInterner::global().lookup(sym)) {
            Some(name) => write!(f, "<function {name}>"),
            None => write!(f, "<function>"),
        }
    }
}
