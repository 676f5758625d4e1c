//! Member tables: the resizable slot arrays behind scopes and argument
//! lists.
//!
//! A `MemberTable` is plain owned storage. Pooled tables live inside the
//! stack frame and are reached through a `PooledTable` handle; anything that
//! must outlive the pooled table's depth takes a [`DurableMembers`] copy.

use std::fmt;
use std::sync::Arc;

use crate::{Slot, Value};

/// Smallest capacity a table is ever grown to.
pub const MIN_TABLE_CAPACITY: usize = 16;

/// Resizable sequence of [`Slot`]s.
#[derive(Clone, PartialEq)]
pub struct MemberTable {
    slots: Vec<Slot>,
    min_capacity: usize,
}

impl MemberTable {
    pub fn new() -> Self {
        Self::with_min_capacity(MIN_TABLE_CAPACITY)
    }

    /// Create an empty table whose first growth reserves at least
    /// `min_capacity` slots.
    pub fn with_min_capacity(min_capacity: usize) -> Self {
        MemberTable {
            slots: Vec::new(),
            min_capacity: min_capacity.max(1),
        }
    }

    /// Make room for at least `n` slots without reallocating.
    ///
    /// Grows to `max(min_capacity, 2 * capacity)`, doubling until `n` fits.
    pub fn ensure_capacity(&mut self, n: usize) {
        let capacity = self.slots.capacity();
        if n <= capacity {
            return;
        }
        let mut target = capacity.saturating_mul(2).max(self.min_capacity);
        while target < n {
            target = target.saturating_mul(2);
        }
        self.slots.reserve_exact(target - self.slots.len());
    }

    /// Slot at `idx`, extending the table with undeclared slots as needed.
    pub fn reference_at(&mut self, idx: usize) -> &mut Slot {
        if idx >= self.slots.len() {
            self.ensure_capacity(idx + 1);
            self.slots.resize_with(idx + 1, Slot::default);
        }
        &mut self.slots[idx]
    }

    /// Slot at `idx` if it has been materialized.
    #[inline]
    pub fn get(&self, idx: usize) -> Option<&Slot> {
        self.slots.get(idx)
    }

    #[inline]
    pub fn get_mut(&mut self, idx: usize) -> Option<&mut Slot> {
        self.slots.get_mut(idx)
    }

    #[inline]
    pub fn push1(&mut self, a: Value) {
        self.ensure_capacity(self.slots.len() + 1);
        self.slots.push(Slot::with_value(a));
    }

    #[inline]
    pub fn push2(&mut self, a: Value, b: Value) {
        self.ensure_capacity(self.slots.len() + 2);
        self.slots.push(Slot::with_value(a));
        self.slots.push(Slot::with_value(b));
    }

    #[inline]
    pub fn push3(&mut self, a: Value, b: Value, c: Value) {
        self.ensure_capacity(self.slots.len() + 3);
        self.slots.push(Slot::with_value(a));
        self.slots.push(Slot::with_value(b));
        self.slots.push(Slot::with_value(c));
    }

    #[inline]
    pub fn push4(&mut self, a: Value, b: Value, c: Value, d: Value) {
        self.ensure_capacity(self.slots.len() + 4);
        self.slots.push(Slot::with_value(a));
        self.slots.push(Slot::with_value(b));
        self.slots.push(Slot::with_value(c));
        self.slots.push(Slot::with_value(d));
    }

    /// Drop every slot, keeping the backing storage for reuse.
    pub fn reset(&mut self) {
        self.slots.clear();
    }

    /// Copy the live slots into an immutable, exactly-sized array.
    pub fn safe_copy(&self) -> DurableMembers {
        DurableMembers(Arc::from(self.slots.as_slice()))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Slot> {
        self.slots.iter()
    }

    #[inline]
    pub(crate) fn slots(&self) -> &[Slot] {
        &self.slots
    }
}

impl Default for MemberTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemberTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.slots.iter().map(Slot::value))
            .finish()
    }
}

/// Immutable copy of a member table, valid indefinitely.
#[derive(Clone, PartialEq)]
pub struct DurableMembers(Arc<[Slot]>);

impl DurableMembers {
    #[inline]
    pub fn get(&self, idx: usize) -> Option<&Slot> {
        self.0.get(idx)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Slot> {
        self.0.iter()
    }

    #[inline]
    pub(crate) fn slots(&self) -> &[Slot] {
        &self.0
    }

    /// The slot values as a script array.
    pub fn to_array(&self) -> Value {
        Value::Array(self.0.iter().map(|slot| slot.value().clone()).collect())
    }
}

impl fmt::Debug for DurableMembers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.0.iter().map(Slot::value))
            .finish()
    }
}
