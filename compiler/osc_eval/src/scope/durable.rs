//! Heap-owned scopes: mutable heap scopes, immutable snapshots, and the
//! chain walk over them.

use std::fmt;
use std::sync::Arc;

use osc_ir::{Symbol, SymbolTable};
use parking_lot::RwLock;

use super::{
    assign_error, find_in_mixins, DurableSlot, FunctionBinding, GlobalScope, MemberSource,
    ScopeKind, SlotRef,
};
use crate::errors::{self, EvalError};
use crate::{Attributes, DurableMembers, MemberTable, Slot, Value};

/// A scope that outlives any stack depth.
#[derive(Clone)]
pub enum DurableScope {
    /// Mutable and shared; used for scopes that enclose closures.
    Heap(Arc<HeapScope>),
    /// Immutable copy of a pooled scope taken before it was recycled.
    Snapshot(Arc<ScopeSnapshot>),
    /// Chain terminator.
    Global(Arc<GlobalScope>),
}

impl DurableScope {
    /// Enclosing scope; `None` only for the global scope.
    pub fn previous(&self) -> Option<&DurableScope> {
        match self {
            DurableScope::Heap(scope) => Some(&scope.previous),
            DurableScope::Snapshot(scope) => Some(&scope.previous),
            DurableScope::Global(_) => None,
        }
    }

    /// Block or function; `None` for the global scope.
    pub fn kind(&self) -> Option<&ScopeKind> {
        match self {
            DurableScope::Heap(scope) => Some(&scope.kind),
            DurableScope::Snapshot(scope) => Some(&scope.kind),
            DurableScope::Global(_) => None,
        }
    }

    #[inline]
    pub fn is_snapshot(&self) -> bool {
        matches!(self, DurableScope::Snapshot(_))
    }

    /// Resolve `symbol` on this scope or any enclosing one.
    pub fn lookup(&self, symbol: Symbol) -> Result<SlotRef, EvalError> {
        let mut current = self;
        loop {
            if let Some(slot) = current.find_own(symbol) {
                return Ok(SlotRef::Durable(slot));
            }
            match current.previous() {
                Some(previous) => current = previous,
                None => return Err(errors::no_such_member(symbol)),
            }
        }
    }

    /// This scope's own members and mixins, without walking the chain.
    pub(crate) fn find_own(&self, symbol: Symbol) -> Option<DurableSlot> {
        match self {
            DurableScope::Heap(scope) => scope.find_own(symbol),
            DurableScope::Snapshot(scope) => scope.find_own(symbol),
            DurableScope::Global(scope) => scope.find_own(symbol),
        }
    }

    /// Declare `symbol` in this scope.
    pub fn create_member(&self, symbol: Symbol, attrs: Attributes) -> Result<SlotRef, EvalError> {
        let slot = match self {
            DurableScope::Heap(scope) => scope.create_member(symbol, attrs)?,
            DurableScope::Snapshot(_) => return Err(errors::durable_mutation(Some(symbol))),
            DurableScope::Global(scope) => scope.create_member(symbol, attrs)?,
        };
        Ok(SlotRef::Durable(slot))
    }

    pub fn get_this(&self) -> Result<Value, EvalError> {
        self.escalate(ScopeKind::this, errors::no_this)
    }

    pub fn get_super(&self) -> Result<Value, EvalError> {
        self.escalate(ScopeKind::super_value, errors::no_super)
    }

    pub fn get_callee(&self) -> Result<Value, EvalError> {
        self.escalate(ScopeKind::callee, errors::no_callee)
    }

    /// Walk outward until a scope answers `pick`; the global scope never
    /// does.
    pub(crate) fn escalate(
        &self,
        pick: impl Fn(&ScopeKind) -> Option<Value>,
        missing: fn() -> EvalError,
    ) -> Result<Value, EvalError> {
        let mut current = self;
        loop {
            if let Some(value) = current.kind().and_then(&pick) {
                return Ok(value);
            }
            match current.previous() {
                Some(previous) => current = previous,
                None => return Err(missing()),
            }
        }
    }

    /// Compose `source`'s members into this scope.
    pub fn mixin(&self, source: Arc<dyn MemberSource>) -> Result<(), EvalError> {
        match self {
            DurableScope::Heap(scope) => {
                scope.mixins.write().push(source);
                Ok(())
            }
            DurableScope::Global(scope) => {
                scope.mixin(source);
                Ok(())
            }
            DurableScope::Snapshot(_) => Err(errors::durable_mutation(None)),
        }
    }

    /// Names declared directly in this scope (and its mixins).
    pub fn member_symbols(&self, include_private: bool) -> Vec<Symbol> {
        match self {
            DurableScope::Heap(scope) => scope.own_symbols(include_private),
            DurableScope::Snapshot(scope) => scope.own_symbols(include_private),
            DurableScope::Global(scope) => scope.member_symbols(include_private),
        }
    }
}

impl fmt::Debug for DurableScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DurableScope::Heap(scope) => fmt::Debug::fmt(scope, f),
            DurableScope::Snapshot(scope) => fmt::Debug::fmt(scope, f),
            DurableScope::Global(scope) => fmt::Debug::fmt(scope, f),
        }
    }
}

/// Declared names in `slots`, in slot order.
pub(crate) fn declared_symbols(
    shape: &SymbolTable,
    slots: &[Slot],
    include_private: bool,
) -> Vec<Symbol> {
    let mut found: Vec<(usize, Symbol)> = shape
        .symbols()
        .filter_map(|sym| {
            let idx = shape.get(sym)?;
            let slot = slots.get(idx)?;
            let visible = slot.is_declared() && (include_private || slot.is_public());
            visible.then_some((idx, sym))
        })
        .collect();
    found.sort_unstable_by_key(|&(idx, _)| idx);
    found.into_iter().map(|(_, sym)| sym).collect()
}

fn mixin_symbols(mixins: &[Arc<dyn MemberSource>], include_private: bool, out: &mut Vec<Symbol>) {
    for source in mixins {
        out.extend(source.member_symbols(include_private));
    }
}

/// Mutable scope on the heap.
pub struct HeapScope {
    kind: ScopeKind,
    previous: DurableScope,
    shape: Arc<SymbolTable>,
    members: RwLock<MemberTable>,
    mixins: RwLock<Vec<Arc<dyn MemberSource>>>,
}

impl HeapScope {
    /// A block scope with empty storage.
    pub fn block(previous: DurableScope, shape: Arc<SymbolTable>) -> Arc<Self> {
        let members = MemberTable::with_min_capacity(shape.len());
        Self::build(ScopeKind::Block, previous, shape, members)
    }

    /// A function scope whose leading slots are the call's arguments.
    pub fn function(
        binding: FunctionBinding,
        previous: DurableScope,
        shape: Arc<SymbolTable>,
        members: MemberTable,
    ) -> Arc<Self> {
        Self::build(ScopeKind::Function(binding), previous, shape, members)
    }

    fn build(
        kind: ScopeKind,
        previous: DurableScope,
        shape: Arc<SymbolTable>,
        members: MemberTable,
    ) -> Arc<Self> {
        Arc::new(HeapScope {
            kind,
            previous,
            shape,
            members: RwLock::new(members),
            mixins: RwLock::new(Vec::new()),
        })
    }

    #[inline]
    pub fn kind(&self) -> &ScopeKind {
        &self.kind
    }

    #[inline]
    pub fn shape(&self) -> &Arc<SymbolTable> {
        &self.shape
    }

    /// Copy of the current member values.
    pub fn members(&self) -> DurableMembers {
        self.members.read().safe_copy()
    }

    pub(crate) fn value_at(&self, index: usize) -> Value {
        self.members
            .read()
            .get(index)
            .map(|slot| slot.value().clone())
            .unwrap_or_default()
    }

    pub(crate) fn assign_at(
        &self,
        index: usize,
        symbol: Symbol,
        value: Value,
    ) -> Result<(), EvalError> {
        self.members
            .write()
            .reference_at(index)
            .assign(value)
            .map_err(|e| assign_error(e, symbol))
    }

    fn find_own(self: &Arc<Self>, symbol: Symbol) -> Option<DurableSlot> {
        if let Some(index) = self.shape.get(symbol) {
            if self.members.read().get(index).is_some_and(Slot::is_declared) {
                return Some(DurableSlot::Heap {
                    scope: Arc::clone(self),
                    index,
                    symbol,
                });
            }
        }
        find_in_mixins(&self.mixins.read(), symbol)
    }

    fn create_member(
        self: &Arc<Self>,
        symbol: Symbol,
        attrs: Attributes,
    ) -> Result<DurableSlot, EvalError> {
        let index = self.shape.create(symbol);
        let mut members = self.members.write();
        let slot = members.reference_at(index);
        if slot.is_const() {
            return Err(errors::duplicate_declaration(symbol));
        }
        slot.declare(attrs);
        Ok(DurableSlot::Heap {
            scope: Arc::clone(self),
            index,
            symbol,
        })
    }

    fn own_symbols(&self, include_private: bool) -> Vec<Symbol> {
        let mut out = declared_symbols(&self.shape, self.members.read().slots(), include_private);
        mixin_symbols(&self.mixins.read(), include_private, &mut out);
        out
    }
}

impl MemberSource for HeapScope {
    fn get_member(&self, symbol: Symbol) -> Option<Value> {
        let index = self.shape.get(symbol)?;
        let members = self.members.read();
        let slot = members.get(index)?;
        slot.is_public().then(|| slot.value().clone())
    }

    fn set_member(&self, symbol: Symbol, value: Value) -> Result<(), EvalError> {
        let index = self
            .shape
            .get(symbol)
            .ok_or_else(|| errors::no_such_member(symbol))?;
        let mut members = self.members.write();
        match members.get_mut(index) {
            Some(slot) if slot.is_public() => {
                slot.assign(value).map_err(|e| assign_error(e, symbol))
            }
            _ => Err(errors::no_such_member(symbol)),
        }
    }

    fn member_symbols(&self, include_private: bool) -> Vec<Symbol> {
        self.own_symbols(include_private)
    }
}

impl fmt::Debug for HeapScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeapScope")
            .field("kind", &self.kind)
            .field("members", &*self.members.read())
            .finish_non_exhaustive()
    }
}

/// Immutable copy of a scope, valid after the original is recycled.
pub struct ScopeSnapshot {
    kind: ScopeKind,
    previous: DurableScope,
    shape: Arc<SymbolTable>,
    members: DurableMembers,
    mixins: Arc<[Arc<dyn MemberSource>]>,
}

impl ScopeSnapshot {
    pub(crate) fn new(
        kind: ScopeKind,
        previous: DurableScope,
        shape: Arc<SymbolTable>,
        members: DurableMembers,
        mixins: Arc<[Arc<dyn MemberSource>]>,
    ) -> Self {
        ScopeSnapshot {
            kind,
            previous,
            shape,
            members,
            mixins,
        }
    }

    #[inline]
    pub fn kind(&self) -> &ScopeKind {
        &self.kind
    }

    #[inline]
    pub fn members(&self) -> &DurableMembers {
        &self.members
    }

    pub(crate) fn value_at(&self, index: usize) -> Value {
        self.members
            .get(index)
            .map(|slot| slot.value().clone())
            .unwrap_or_default()
    }

    fn find_own(self: &Arc<Self>, symbol: Symbol) -> Option<DurableSlot> {
        if let Some(index) = self.shape.get(symbol) {
            if self.members.get(index).is_some_and(Slot::is_declared) {
                return Some(DurableSlot::Snapshot {
                    scope: Arc::clone(self),
                    index,
                    symbol,
                });
            }
        }
        find_in_mixins(&self.mixins, symbol)
    }

    fn own_symbols(&self, include_private: bool) -> Vec<Symbol> {
        let mut out = declared_symbols(&self.shape, self.members.slots(), include_private);
        mixin_symbols(&self.mixins, include_private, &mut out);
        out
    }
}

impl MemberSource for ScopeSnapshot {
    fn get_member(&self, symbol: Symbol) -> Option<Value> {
        let slot = self.members.get(self.shape.get(symbol)?)?;
        slot.is_public().then(|| slot.value().clone())
    }

    fn member_symbols(&self, include_private: bool) -> Vec<Symbol> {
        self.own_symbols(include_private)
    }
}

impl fmt::Debug for ScopeSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeSnapshot")
            .field("kind", &self.kind)
            .field("members", &self.members)
            .finish_non_exhaustive()
    }
}
