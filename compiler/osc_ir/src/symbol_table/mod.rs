//! Shared member index tables ("shapes").
//!
//! A [`SymbolTable`] maps a [`Symbol`] to a dense slot index. One table is
//! shared by every activation of a lexical construct, so lookups must be
//! cheap and safe from any thread while the first activation is still
//! populating it.
//!
//! # Layout
//!
//! Open addressing with double hashing over a prime-sized bucket array:
//!
//! - `h1 = swap_bytes(id) % capacity`
//! - `h2 = 1 + id % (capacity - 2)`
//! - probe `(h1 + i * h2) % capacity` until an empty bucket or the id
//!
//! Buckets are atomics. A writer stores the slot before the key (release),
//! and readers load the key before the slot (acquire), so a reader that sees
//! a key always sees its slot.
//!
//! # Growth
//!
//! Growth builds a complete new [`ProbeState`] off to the side and then
//! replaces the published `Arc` in one step. Readers that cloned the old
//! state keep a consistent (if stale) view; nothing is ever rehashed in
//! place. Writers are serialized by a separate mutex and re-check after
//! acquiring it, like the interner.

mod primes;

use crate::Symbol;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

/// Initial capacity of [`SymbolTable::new`].
pub const DEFAULT_CAPACITY: usize = 10;

/// Load factor of [`SymbolTable::new`].
pub const DEFAULT_LOAD_FACTOR: f64 = 0.75;

/// Marker for an empty bucket. Never a valid [`Symbol`].
const EMPTY: u32 = 0;

/// Error constructing a [`SymbolTable`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SymbolTableError {
    /// Load factor must lie strictly between 0 and 1, and be large enough
    /// that the largest tabulated capacity holds at least one symbol.
    InvalidLoadFactor(f64),
}

impl fmt::Display for SymbolTableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolTableError::InvalidLoadFactor(load) => {
                write!(
                    f,
                    "symbol table load factor must be in (0, 1) and admit one symbol, got {load}"
                )
            }
        }
    }
}

impl std::error::Error for SymbolTableError {}

/// One published generation of the table.
struct ProbeState {
    keys: Box<[AtomicU32]>,
    slots: Box<[AtomicUsize]>,
    len: AtomicUsize,
    /// Largest size allowed before the next growth.
    threshold: usize,
}

/// Result of walking a probe sequence.
enum Probe {
    Found(usize),
    Vacant(usize),
    Exhausted,
}

impl ProbeState {
    fn with_capacity(capacity: usize, load_factor: f64) -> Self {
        ProbeState {
            keys: (0..capacity).map(|_| AtomicU32::new(EMPTY)).collect(),
            slots: (0..capacity).map(|_| AtomicUsize::new(0)).collect(),
            len: AtomicUsize::new(0),
            threshold: threshold(capacity, load_factor),
        }
    }

    #[inline]
    fn capacity(&self) -> usize {
        self.keys.len()
    }

    /// Walk the probe sequence for `key`, returning where it stopped and how
    /// many buckets were inspected.
    fn probe(&self, key: u32) -> (Probe, usize) {
        let capacity = self.capacity();
        let step = 1 + key as usize % (capacity - 2);
        let mut idx = key.swap_bytes() as usize % capacity;

        for visited in 1..=capacity {
            match self.keys[idx].load(Ordering::Acquire) {
                EMPTY => return (Probe::Vacant(idx), visited),
                k if k == key => return (Probe::Found(idx), visited),
                _ => idx = (idx + step) % capacity,
            }
        }
        (Probe::Exhausted, capacity)
    }

    #[inline]
    fn get(&self, key: u32) -> Option<usize> {
        match self.probe(key).0 {
            Probe::Found(idx) => Some(self.slots[idx].load(Ordering::Acquire)),
            Probe::Vacant(_) | Probe::Exhausted => None,
        }
    }

    /// Place a key known to be absent. Caller holds the writer lock.
    fn insert_absent(&self, key: u32, slot: usize) {
        match self.probe(key).0 {
            Probe::Vacant(idx) => {
                self.slots[idx].store(slot, Ordering::Release);
                self.keys[idx].store(key, Ordering::Release);
            }
            Probe::Found(_) => unreachable!("symbol {key} inserted twice"),
            Probe::Exhausted => unreachable!(
                "probe sequence exhausted at capacity {} (load-factor invariant broken)",
                self.capacity()
            ),
        }
    }
}

#[expect(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "capacities are bounded by the prime table, well inside f64 precision"
)]
fn threshold(capacity: usize, load_factor: f64) -> usize {
    (capacity as f64 * load_factor).floor() as usize
}

/// Symbol to dense slot index mapping, shared between threads.
///
/// Slots are assigned `0, 1, 2, ...` in insertion order and never change.
///
/// # Example
///
/// ```
/// use osc_ir::{Symbol, SymbolTable};
///
/// let table = SymbolTable::new();
/// let a = Symbol::new(500).unwrap();
/// let b = Symbol::new(501).unwrap();
/// assert_eq!(table.create(a), 0);
/// assert_eq!(table.create(b), 1);
/// assert_eq!(table.create(a), 0);
/// assert_eq!(table.get(b), Some(1));
/// ```
pub struct SymbolTable {
    state: RwLock<Arc<ProbeState>>,
    writer: Mutex<()>,
    load_factor: f64,
    grow_count: AtomicUsize,
}

impl SymbolTable {
    /// Create an empty table with the default capacity and load factor.
    pub fn new() -> Self {
        Self::build(DEFAULT_CAPACITY, DEFAULT_LOAD_FACTOR)
    }

    /// Create an empty table tuned for an expected number of members.
    ///
    /// `capacity` is rounded up to the next tabulated prime. Fails if
    /// `load_factor` is not strictly between 0 and 1, or is so small that
    /// no tabulated capacity could hold a symbol.
    pub fn with_capacity_and_load(
        capacity: usize,
        load_factor: f64,
    ) -> Result<Self, SymbolTableError> {
        let in_range = load_factor > 0.0 && load_factor < 1.0;
        if !in_range || threshold(primes::LARGEST, load_factor) == 0 {
            return Err(SymbolTableError::InvalidLoadFactor(load_factor));
        }
        Ok(Self::build(capacity, load_factor))
    }

    fn build(capacity: usize, load_factor: f64) -> Self {
        let capacity = primes::prime_at_least(capacity).unwrap_or(primes::LARGEST);
        SymbolTable {
            state: RwLock::new(Arc::new(ProbeState::with_capacity(capacity, load_factor))),
            writer: Mutex::new(()),
            load_factor,
            grow_count: AtomicUsize::new(0),
        }
    }

    /// Clone the currently published state.
    #[inline]
    fn current(&self) -> Arc<ProbeState> {
        Arc::clone(&self.state.read())
    }

    /// Slot assigned to `sym`, if any.
    #[inline]
    pub fn get(&self, sym: Symbol) -> Option<usize> {
        self.current().get(sym.raw())
    }

    /// Slot for `sym`, assigning the next free slot if it is new.
    pub fn create(&self, sym: Symbol) -> usize {
        let key = sym.raw();

        // Fast path: already present
        if let Some(slot) = self.get(sym) {
            return slot;
        }

        let _writer = self.writer.lock();

        // Double-check after acquiring the writer lock
        let mut state = self.current();
        if let Some(slot) = state.get(key) {
            return slot;
        }

        let slot = state.len.load(Ordering::Acquire);
        if slot + 1 > state.threshold {
            state = self.grow(&state, slot + 1);
        }
        state.insert_absent(key, slot);
        state.len.store(slot + 1, Ordering::Release);
        slot
    }

    /// Rebuild into a larger table and publish it. Caller holds the writer
    /// lock.
    fn grow(&self, old: &ProbeState, required: usize) -> Arc<ProbeState> {
        let mut capacity = old.capacity();
        let next = loop {
            capacity = primes::prime_at_least(capacity.saturating_mul(2))
                .unwrap_or_else(|| panic!("symbol table cannot grow past {capacity} buckets"));
            if threshold(capacity, self.load_factor) >= required {
                break ProbeState::with_capacity(capacity, self.load_factor);
            }
        };

        for (key, slot) in old.keys.iter().zip(old.slots.iter()) {
            let key = key.load(Ordering::Acquire);
            if key != EMPTY {
                next.insert_absent(key, slot.load(Ordering::Acquire));
            }
        }
        next.len
            .store(old.len.load(Ordering::Acquire), Ordering::Release);

        let next = Arc::new(next);
        *self.state.write() = Arc::clone(&next);
        self.grow_count.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            from = old.capacity(),
            to = capacity,
            len = required - 1,
            "symbol table grew"
        );
        next
    }

    /// Number of symbols in the table.
    #[inline]
    pub fn len(&self) -> usize {
        self.current().len.load(Ordering::Acquire)
    }

    /// Check if the table holds no symbols.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of buckets in the current generation. Always prime.
    pub fn capacity(&self) -> usize {
        self.current().capacity()
    }

    /// Load factor the table grows at.
    pub fn load_factor(&self) -> f64 {
        self.load_factor
    }

    /// Iterate over the symbols in the current generation, in bucket order.
    ///
    /// The iterator pins the generation that was current when it was
    /// created: it always terminates and never yields a symbol twice.
    /// Symbols inserted into that generation while iterating may or may not
    /// appear; symbols added after the table grows never do.
    pub fn symbols(&self) -> Symbols {
        Symbols {
            state: self.current(),
            next: 0,
        }
    }

    /// Occupancy and probe-length counters for tuning.
    pub fn stats(&self) -> SymbolTableStats {
        let state = self.current();
        let mut stats = SymbolTableStats {
            len: state.len.load(Ordering::Acquire),
            capacity: state.capacity(),
            grow_count: self.grow_count.load(Ordering::Relaxed),
            total_probes: 0,
            longest_probe: 0,
        };
        for key in state.keys.iter() {
            let key = key.load(Ordering::Acquire);
            if key != EMPTY {
                let (_, visited) = state.probe(key);
                stats.total_probes += visited;
                stats.longest_probe = stats.longest_probe.max(visited);
            }
        }
        stats
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.current();
        f.debug_struct("SymbolTable")
            .field("len", &state.len.load(Ordering::Acquire))
            .field("capacity", &state.capacity())
            .field("load_factor", &self.load_factor)
            .finish_non_exhaustive()
    }
}

/// Iterator over a snapshot of a [`SymbolTable`]'s symbols.
pub struct Symbols {
    state: Arc<ProbeState>,
    next: usize,
}

impl Iterator for Symbols {
    type Item = Symbol;

    fn next(&mut self) -> Option<Symbol> {
        while let Some(key) = self.state.keys.get(self.next) {
            self.next += 1;
            if let Some(sym) = Symbol::new(key.load(Ordering::Acquire)) {
                return Some(sym);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.state.capacity() - self.next))
    }
}

impl std::iter::FusedIterator for Symbols {}

/// Counters reported by [`SymbolTable::stats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SymbolTableStats {
    pub len: usize,
    pub capacity: usize,
    /// Times the table has been rebuilt larger.
    pub grow_count: usize,
    /// Buckets inspected to find every present symbol once.
    pub total_probes: usize,
    pub longest_probe: usize,
}

impl SymbolTableStats {
    /// Average buckets inspected per successful lookup.
    #[expect(
        clippy::cast_precision_loss,
        reason = "statistics only; exactness is not needed"
    )]
    pub fn mean_probe(&self) -> f64 {
        if self.len == 0 {
            0.0
        } else {
            self.total_probes as f64 / self.len as f64
        }
    }
}

#[cfg(test)]
mod tests;
