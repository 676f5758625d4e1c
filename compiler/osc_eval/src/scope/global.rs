//! The global scope: chain terminator backed by process-wide registrations.

use std::fmt;
use std::sync::{Arc, OnceLock};

use osc_ir::Symbol;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::{assign_error, find_in_mixins, DurableSlot, MemberSource};
use crate::errors::{self, EvalError};
use crate::{Attributes, Slot, Value};

/// Root of every scope chain.
///
/// Members are keyed by symbol directly; there is no shape, since the set of
/// globals is open-ended and shared by every thread.
#[derive(Default)]
pub struct GlobalScope {
    members: RwLock<FxHashMap<Symbol, Slot>>,
    mixins: RwLock<Vec<Arc<dyn MemberSource>>>,
}

impl GlobalScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide global scope.
    pub fn process() -> Arc<GlobalScope> {
        static PROCESS: OnceLock<Arc<GlobalScope>> = OnceLock::new();
        Arc::clone(PROCESS.get_or_init(|| Arc::new(GlobalScope::new())))
    }

    /// Declare a public member and give it a value.
    pub fn define(&self, symbol: Symbol, value: Value) -> Result<(), EvalError> {
        let mut members = self.members.write();
        let slot = Self::declare_in(&mut members, symbol, Attributes::PUBLIC)?;
        slot.assign(value).map_err(|e| assign_error(e, symbol))
    }

    pub(crate) fn create_member(
        self: &Arc<Self>,
        symbol: Symbol,
        attrs: Attributes,
    ) -> Result<DurableSlot, EvalError> {
        Self::declare_in(&mut self.members.write(), symbol, attrs)?;
        tracing::debug!(%symbol, "global member declared");
        Ok(DurableSlot::Global {
            scope: Arc::clone(self),
            symbol,
        })
    }

    fn declare_in(
        members: &mut FxHashMap<Symbol, Slot>,
        symbol: Symbol,
        attrs: Attributes,
    ) -> Result<&mut Slot, EvalError> {
        let slot = members.entry(symbol).or_default();
        if slot.is_const() {
            return Err(errors::duplicate_declaration(symbol));
        }
        slot.declare(attrs);
        Ok(slot)
    }

    pub(crate) fn find_own(self: &Arc<Self>, symbol: Symbol) -> Option<DurableSlot> {
        if self.members.read().contains_key(&symbol) {
            return Some(DurableSlot::Global {
                scope: Arc::clone(self),
                symbol,
            });
        }
        find_in_mixins(&self.mixins.read(), symbol)
    }

    /// Current value of a member, if declared.
    pub fn get(&self, symbol: Symbol) -> Option<Value> {
        self.members
            .read()
            .get(&symbol)
            .map(|slot| slot.value().clone())
    }

    pub(crate) fn store(&self, symbol: Symbol, value: Value) -> Result<(), EvalError> {
        match self.members.write().get_mut(&symbol) {
            Some(slot) => slot.assign(value).map_err(|e| assign_error(e, symbol)),
            None => Err(errors::no_such_member(symbol)),
        }
    }

    pub(crate) fn mixin(&self, source: Arc<dyn MemberSource>) {
        self.mixins.write().push(source);
    }

    /// Declared names, sorted by symbol id, followed by mixin members.
    pub fn member_symbols(&self, include_private: bool) -> Vec<Symbol> {
        let mut out: Vec<Symbol> = self
            .members
            .read()
            .iter()
            .filter(|(_, slot)| include_private || slot.is_public())
            .map(|(&symbol, _)| symbol)
            .collect();
        out.sort_unstable();
        for source in self.mixins.read().iter() {
            out.extend(source.member_symbols(include_private));
        }
        out
    }

    pub fn len(&self) -> usize {
        self.members.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.read().is_empty()
    }
}

impl MemberSource for GlobalScope {
    fn get_member(&self, symbol: Symbol) -> Option<Value> {
        let members = self.members.read();
        let slot = members.get(&symbol)?;
        slot.is_public().then(|| slot.value().clone())
    }

    fn set_member(&self, symbol: Symbol, value: Value) -> Result<(), EvalError> {
        self.store(symbol, value)
    }

    fn member_symbols(&self, include_private: bool) -> Vec<Symbol> {
        GlobalScope::member_symbols(self, include_private)
    }
}

impl fmt::Debug for GlobalScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalScope")
            .field("members", &self.len())
            .finish_non_exhaustive()
    }
}
