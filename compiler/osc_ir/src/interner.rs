//! Thread-safe symbol interner.
//!
//! Maps source names to [`Symbol`] ids. Ids are minted densely from
//! [`Symbol::FIRST_INTERNED`] and are never recycled, so a symbol stays valid
//! for the life of the process.

use super::Symbol;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::OnceLock;

/// Error when interning a name fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternError {
    /// The id space above [`Symbol::FIRST_INTERNED`] is exhausted.
    Exhausted { count: usize },
}

impl std::fmt::Display for InternError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InternError::Exhausted { count } => write!(
                f,
                "symbol interner exhausted after {count} names (max id is {})",
                u32::MAX
            ),
        }
    }
}

impl std::error::Error for InternError {}

/// Name storage behind the interner lock.
#[derive(Default)]
struct InternState {
    /// Map from name to symbol.
    map: FxHashMap<&'static str, Symbol>,
    /// Names by `raw - FIRST_INTERNED`.
    names: Vec<&'static str>,
}

/// Name <-> [`Symbol`] mapping shared by every thread.
///
/// Reads take the shared lock; a miss upgrades to the exclusive lock and
/// re-checks before inserting.
pub struct SymbolInterner {
    state: RwLock<InternState>,
}

impl SymbolInterner {
    /// Create an empty interner.
    pub fn new() -> Self {
        SymbolInterner {
            state: RwLock::new(InternState::default()),
        }
    }

    /// The process-wide interner.
    pub fn global() -> &'static SymbolInterner {
        static GLOBAL: OnceLock<SymbolInterner> = OnceLock::new();
        GLOBAL.get_or_init(SymbolInterner::new)
    }

    /// Try to intern a name, returning its symbol or an error on overflow.
    pub fn try_intern(&self, name: &str) -> Result<Symbol, InternError> {
        // Fast path: already interned
        if let Some(&sym) = self.state.read().map.get(name) {
            return Ok(sym);
        }

        let mut guard = self.state.write();

        // Double-check after acquiring write lock
        if let Some(&sym) = guard.map.get(name) {
            return Ok(sym);
        }

        let count = guard.names.len();
        let sym = u32::try_from(count)
            .ok()
            .and_then(|offset| offset.checked_add(Symbol::FIRST_INTERNED))
            .and_then(Symbol::new)
            .ok_or(InternError::Exhausted { count })?;

        // Leak the name to get 'static lifetime; symbols are never released.
        let leaked: &'static str = Box::leak(name.to_owned().into_boxed_str());
        guard.names.push(leaked);
        guard.map.insert(leaked, sym);
        Ok(sym)
    }

    /// Intern a name.
    ///
    /// # Panics
    /// Panics if the id space is exhausted (over four billion names).
    pub fn intern(&self, name: &str) -> Symbol {
        self.try_intern(name).unwrap_or_else(|e| panic!("{}", e))
    }

    /// Look up the name of an interned symbol.
    ///
    /// Returns `None` for reserved ids and ids this interner never minted.
    pub fn lookup(&self, sym: Symbol) -> Option<&'static str> {
        let offset = sym.raw().checked_sub(Symbol::FIRST_INTERNED)?;
        let offset = usize::try_from(offset).ok()?;
        self.state.read().names.get(offset).copied()
    }

    /// Get an already-interned symbol without minting a new one.
    pub fn get(&self, name: &str) -> Option<Symbol> {
        self.state.read().map.get(name).copied()
    }

    /// Number of interned names.
    pub fn len(&self) -> usize {
        self.state.read().names.len()
    }

    /// Check if nothing has been interned.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SymbolInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SymbolInterner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolInterner")
            .field("len", &self.len())
            .finish()
    }
}
