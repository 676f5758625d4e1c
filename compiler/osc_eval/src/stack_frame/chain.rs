//! Scope-chain operations that may start at a pooled scope.
//!
//! Pooled scopes are only reachable through the frame that owns them, so
//! these live on [`StackFrame`]. Once a walk reaches a durable scope it
//! hands off to [`DurableScope`], which never leads back into the pool.

use std::sync::Arc;

use osc_ir::Symbol;

use super::{pooled, StackFrame};
use crate::errors::{self, EvalError};
use crate::scope::{assign_error, declared_symbols, find_in_mixins};
use crate::{Attributes, MemberSource, PooledSlot, ScopeKind, ScopeRef, Slot, SlotRef, Value};

impl StackFrame {
    /// Declare `symbol` in `scope` itself (not an enclosing scope).
    ///
    /// Redeclaring a non-const member resets it; redeclaring a const one is
    /// a `DuplicateDeclaration`.
    pub fn create_member(
        &mut self,
        scope: &ScopeRef,
        symbol: Symbol,
        attrs: Attributes,
    ) -> Result<SlotRef, EvalError> {
        let handle = match scope {
            ScopeRef::Durable(durable) => return durable.create_member(symbol, attrs),
            ScopeRef::Pooled(handle) => *handle,
        };
        let own = pooled(&self.scopes, handle)?;
        let index = own.shape.create(symbol);
        let table_key = own.members;
        let table = self
            .tables
            .get_mut(table_key)
            .ok_or_else(|| errors::stale_handle("member table"))?;
        let slot = table.reference_at(index);
        if slot.is_const() {
            return Err(errors::duplicate_declaration(symbol));
        }
        slot.declare(attrs);
        Ok(SlotRef::Pooled(PooledSlot {
            table: table_key,
            index,
            symbol,
        }))
    }

    /// Resolve `symbol` starting at `scope`: own members, then mixins, then
    /// the enclosing scope, up to the global scope.
    pub fn lookup_in_scope(
        &self,
        scope: &ScopeRef,
        symbol: Symbol,
    ) -> Result<SlotRef, EvalError> {
        let mut current = scope;
        loop {
            let handle = match current {
                ScopeRef::Durable(durable) => return durable.lookup(symbol),
                ScopeRef::Pooled(handle) => *handle,
            };
            let own = pooled(&self.scopes, handle)?;
            if let Some(index) = own.shape.get(symbol) {
                let table = self
                    .tables
                    .get(own.members)
                    .ok_or_else(|| errors::stale_handle("member table"))?;
                if table.get(index).is_some_and(Slot::is_declared) {
                    return Ok(SlotRef::Pooled(PooledSlot {
                        table: own.members,
                        index,
                        symbol,
                    }));
                }
            }
            if let Some(slot) = find_in_mixins(&own.mixins, symbol) {
                return Ok(SlotRef::Durable(slot));
            }
            current = &own.previous;
        }
    }

    pub fn get_this(&self, scope: &ScopeRef) -> Result<Value, EvalError> {
        self.escalate(scope, ScopeKind::this, errors::no_this)
    }

    pub fn get_super(&self, scope: &ScopeRef) -> Result<Value, EvalError> {
        self.escalate(scope, ScopeKind::super_value, errors::no_super)
    }

    pub fn get_callee(&self, scope: &ScopeRef) -> Result<Value, EvalError> {
        self.escalate(scope, ScopeKind::callee, errors::no_callee)
    }

    fn escalate(
        &self,
        scope: &ScopeRef,
        pick: impl Fn(&ScopeKind) -> Option<Value>,
        missing: fn() -> EvalError,
    ) -> Result<Value, EvalError> {
        let mut current = scope;
        loop {
            let handle = match current {
                ScopeRef::Durable(durable) => return durable.escalate(pick, missing),
                ScopeRef::Pooled(handle) => *handle,
            };
            let own = pooled(&self.scopes, handle)?;
            if let Some(value) = pick(&own.kind) {
                return Ok(value);
            }
            current = &own.previous;
        }
    }

    /// Current value behind `slot`.
    pub fn load(&self, slot: &SlotRef) -> Result<Value, EvalError> {
        match slot {
            SlotRef::Pooled(slot) => {
                let table = self
                    .tables
                    .get(slot.table)
                    .ok_or_else(|| errors::stale_handle("member table"))?;
                Ok(table
                    .get(slot.index)
                    .map(|s| s.value().clone())
                    .unwrap_or_default())
            }
            SlotRef::Durable(slot) => Ok(slot.load()),
        }
    }

    /// Assign through `slot`.
    pub fn store(&mut self, slot: &SlotRef, value: Value) -> Result<(), EvalError> {
        match slot {
            SlotRef::Pooled(slot) => self
                .tables
                .get_mut(slot.table)
                .ok_or_else(|| errors::stale_handle("member table"))?
                .reference_at(slot.index)
                .assign(value)
                .map_err(|e| assign_error(e, slot.symbol)),
            SlotRef::Durable(slot) => slot.store(value),
        }
    }

    /// Compose `source`'s public members into `scope`, after its own.
    pub fn mixin(
        &mut self,
        scope: &ScopeRef,
        source: Arc<dyn MemberSource>,
    ) -> Result<(), EvalError> {
        match scope {
            ScopeRef::Durable(durable) => durable.mixin(source),
            ScopeRef::Pooled(handle) => {
                let own = self
                    .scopes
                    .get_mut(handle.0)
                    .and_then(Option::as_mut)
                    .ok_or_else(|| errors::stale_handle("scope"))?;
                own.mixins.push(source);
                Ok(())
            }
        }
    }

    /// Names declared in `scope` itself, in slot order, then its mixins'.
    /// Private members are listed only when `include_private` is set.
    pub fn member_symbols(
        &self,
        scope: &ScopeRef,
        include_private: bool,
    ) -> Result<Vec<Symbol>, EvalError> {
        let handle = match scope {
            ScopeRef::Durable(durable) => return Ok(durable.member_symbols(include_private)),
            ScopeRef::Pooled(handle) => *handle,
        };
        let own = pooled(&self.scopes, handle)?;
        let table = self
            .tables
            .get(own.members)
            .ok_or_else(|| errors::stale_handle("member table"))?;
        let mut out = declared_symbols(&own.shape, table.slots(), include_private);
        for source in &own.mixins {
            out.extend(source.member_symbols(include_private));
        }
        Ok(out)
    }
}
