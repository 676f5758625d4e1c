//! The scope chain.
//!
//! A scope is one runtime lexical environment: a shared [`SymbolTable`]
//! shape, the member storage for this activation, and a link to the
//! enclosing scope. Scopes come in two provenances, and the split is in the
//! types:
//!
//! - [`ScopeRef::Pooled`]: lives in the owning `StackFrame`'s arena and is
//!   addressed by a generational [`ScopeHandle`]. Only valid until it is
//!   freed or its depth exits; every access goes through the frame and is
//!   checked.
//! - [`DurableScope`]: heap-owned (`Arc`) and valid indefinitely. Only
//!   these can be captured by a `FunctionValue`.
//!
//! Lookups go own shape, then mixins, then `previous`, ending at the global
//! scope. Pooled scopes are resolved in `stack_frame::chain`; durable ones
//! here.
//!
//! [`SymbolTable`]: osc_ir::SymbolTable

mod durable;
mod global;

use std::fmt;
use std::sync::Arc;

use osc_ir::Symbol;

use crate::errors::{self, EvalError};
use crate::stack_frame::PoolKey;
use crate::{AssignError, FunctionValue, Value};

pub(crate) use durable::declared_symbols;
pub use durable::{DurableScope, HeapScope, ScopeSnapshot};
pub use global::GlobalScope;

/// Generational index of a pooled scope.
///
/// A handle stays the same size as a pair of integers and is `Copy`; using it
/// after the scope is recycled fails with a stale-handle error instead of
/// reaching whatever now occupies the arena entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ScopeHandle(pub(crate) PoolKey);

impl ScopeHandle {
    /// Arena index; reused after the scope is freed.
    #[inline]
    pub fn index(self) -> usize {
        self.0.index
    }

    /// Bumped every time the arena entry is recycled.
    #[inline]
    pub fn generation(self) -> u32 {
        self.0.generation
    }
}

/// A scope of either provenance.
#[derive(Clone, Debug)]
pub enum ScopeRef {
    Pooled(ScopeHandle),
    Durable(DurableScope),
}

impl ScopeRef {
    #[inline]
    pub fn is_pooled(&self) -> bool {
        matches!(self, ScopeRef::Pooled(_))
    }

    /// The durable scope, if this is not pooled.
    #[inline]
    pub fn as_durable(&self) -> Option<&DurableScope> {
        match self {
            ScopeRef::Durable(scope) => Some(scope),
            ScopeRef::Pooled(_) => None,
        }
    }
}

impl From<DurableScope> for ScopeRef {
    fn from(scope: DurableScope) -> Self {
        ScopeRef::Durable(scope)
    }
}

impl From<Arc<GlobalScope>> for ScopeRef {
    fn from(scope: Arc<GlobalScope>) -> Self {
        ScopeRef::Durable(DurableScope::Global(scope))
    }
}

/// Bindings of one function invocation.
#[derive(Clone, Debug)]
pub struct FunctionBinding {
    callee: Arc<FunctionValue>,
    this: Option<Value>,
    super_: Option<Value>,
}

impl FunctionBinding {
    pub fn new(callee: Arc<FunctionValue>, this: Option<Value>, super_: Option<Value>) -> Self {
        FunctionBinding {
            callee,
            this,
            super_,
        }
    }

    #[inline]
    pub fn callee(&self) -> &Arc<FunctionValue> {
        &self.callee
    }

    #[inline]
    pub fn this(&self) -> Option<&Value> {
        self.this.as_ref()
    }

    /// `super` as seen from this invocation: the bound super if a receiver
    /// is bound, else the function the callee overrides, else `null`.
    pub fn super_value(&self) -> Value {
        if self.this.is_some() {
            if let Some(bound) = &self.super_ {
                return bound.clone();
            }
        }
        self.callee
            .overridden()
            .map_or(Value::Null, |f| Value::Function(Arc::clone(f)))
    }
}

/// Kind of a non-global scope.
#[derive(Clone, Debug)]
pub enum ScopeKind {
    Block,
    Function(FunctionBinding),
}

impl ScopeKind {
    /// `this` if this scope answers it; `None` escalates to `previous`.
    pub(crate) fn this(&self) -> Option<Value> {
        match self {
            ScopeKind::Function(binding) => binding.this().cloned(),
            ScopeKind::Block => None,
        }
    }

    pub(crate) fn super_value(&self) -> Option<Value> {
        match self {
            ScopeKind::Function(binding) => Some(binding.super_value()),
            ScopeKind::Block => None,
        }
    }

    pub(crate) fn callee(&self) -> Option<Value> {
        match self {
            ScopeKind::Function(binding) => Some(Value::Function(Arc::clone(binding.callee()))),
            ScopeKind::Block => None,
        }
    }
}

/// Another value's members composed into a scope.
///
/// A mixin is consulted after the scope's own members and before the
/// enclosing scope. Only public members are visible through it.
pub trait MemberSource: Send + Sync {
    /// Value of a public member, if present.
    fn get_member(&self, symbol: Symbol) -> Option<Value>;

    /// Assign a public member.
    ///
    /// Read-only sources reject the write.
    fn set_member(&self, symbol: Symbol, value: Value) -> Result<(), EvalError> {
        let _ = value;
        Err(errors::durable_mutation(Some(symbol)))
    }

    /// Declared member names.
    fn member_symbols(&self, include_private: bool) -> Vec<Symbol>;
}

/// Where a resolved member lives.
#[derive(Clone, Debug)]
pub enum SlotRef {
    /// In a pooled member table; loaded and stored through the frame.
    Pooled(PooledSlot),
    /// In durable storage; loaded and stored directly.
    Durable(DurableSlot),
}

impl SlotRef {
    pub fn symbol(&self) -> Symbol {
        match self {
            SlotRef::Pooled(slot) => slot.symbol,
            SlotRef::Durable(slot) => slot.symbol(),
        }
    }
}

/// A slot in a pooled member table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PooledSlot {
    pub(crate) table: PoolKey,
    pub(crate) index: usize,
    pub(crate) symbol: Symbol,
}

impl PooledSlot {
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn symbol(&self) -> Symbol {
        self.symbol
    }
}

/// A slot in durable storage.
#[derive(Clone)]
pub enum DurableSlot {
    Heap {
        scope: Arc<HeapScope>,
        index: usize,
        symbol: Symbol,
    },
    Snapshot {
        scope: Arc<ScopeSnapshot>,
        index: usize,
        symbol: Symbol,
    },
    Global {
        scope: Arc<GlobalScope>,
        symbol: Symbol,
    },
    Mixin {
        source: Arc<dyn MemberSource>,
        symbol: Symbol,
    },
}

impl DurableSlot {
    pub fn symbol(&self) -> Symbol {
        match self {
            DurableSlot::Heap { symbol, .. }
            | DurableSlot::Snapshot { symbol, .. }
            | DurableSlot::Global { symbol, .. }
            | DurableSlot::Mixin { symbol, .. } => *symbol,
        }
    }

    pub fn load(&self) -> Value {
        match self {
            DurableSlot::Heap { scope, index, .. } => scope.value_at(*index),
            DurableSlot::Snapshot { scope, index, .. } => scope.value_at(*index),
            DurableSlot::Global { scope, symbol } => scope.get(*symbol).unwrap_or_default(),
            DurableSlot::Mixin { source, symbol } => {
                source.get_member(*symbol).unwrap_or_default()
            }
        }
    }

    /// Assign through the slot. Snapshots are immutable.
    pub fn store(&self, value: Value) -> Result<(), EvalError> {
        match self {
            DurableSlot::Heap {
                scope,
                index,
                symbol,
            } => scope.assign_at(*index, *symbol, value),
            DurableSlot::Snapshot { symbol, .. } => Err(errors::durable_mutation(Some(*symbol))),
            DurableSlot::Global { scope, symbol } => scope.store(*symbol, value),
            DurableSlot::Mixin { source, symbol } => source.set_member(*symbol, value),
        }
    }
}

impl fmt::Debug for DurableSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (kind, symbol) = match self {
            DurableSlot::Heap { symbol, .. } => ("Heap", symbol),
            DurableSlot::Snapshot { symbol, .. } => ("Snapshot", symbol),
            DurableSlot::Global { symbol, .. } => ("Global", symbol),
            DurableSlot::Mixin { symbol, .. } => ("Mixin", symbol),
        };
        f.debug_tuple(kind).field(symbol).finish()
    }
}

/// Map a refused assignment to the script error for `symbol`.
pub(crate) fn assign_error(err: AssignError, symbol: Symbol) -> EvalError {
    match err {
        AssignError::Const => errors::const_reassignment(symbol),
        AssignError::Undefined => errors::undefined_assignment(symbol),
    }
}

/// First mixin exposing `symbol`, as a slot.
pub(crate) fn find_in_mixins(
    mixins: &[Arc<dyn MemberSource>],
    symbol: Symbol,
) -> Option<DurableSlot> {
    mixins
        .iter()
        .find(|source| source.get_member(symbol).is_some())
        .map(|source| DurableSlot::Mixin {
            source: Arc::clone(source),
            symbol,
        })
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
