//! Member visibility partitions and the per-construct shape cache.

use crate::SymbolTable;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Which members a shared member index table covers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// Every member.
    All,
    /// Public and protected members only (what a subclass or caller sees).
    PublicProtected,
    /// Private members only.
    Private,
}

impl Visibility {
    pub const PARTITIONS: [Visibility; 3] = [
        Visibility::All,
        Visibility::PublicProtected,
        Visibility::Private,
    ];

    #[inline]
    const fn index(self) -> usize {
        match self {
            Visibility::All => 0,
            Visibility::PublicProtected => 1,
            Visibility::Private => 2,
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Visibility::All => "all",
            Visibility::PublicProtected => "public/protected",
            Visibility::Private => "private",
        })
    }
}

/// Memoized shapes for one lexical construct, one per [`Visibility`].
///
/// The first activation to ask for a partition builds it; every later
/// activation on any thread gets the same `Arc`.
#[derive(Default)]
pub struct ShapeSet {
    shapes: [OnceLock<Arc<SymbolTable>>; 3],
}

impl ShapeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shape for `vis`, creating an empty one on first use.
    pub fn get(&self, vis: Visibility) -> Arc<SymbolTable> {
        self.get_or_init(vis, SymbolTable::new)
    }

    /// Shape for `vis`, building it with `init` on first use.
    ///
    /// If two threads race, exactly one `init` result is kept.
    pub fn get_or_init(
        &self,
        vis: Visibility,
        init: impl FnOnce() -> SymbolTable,
    ) -> Arc<SymbolTable> {
        Arc::clone(self.shapes[vis.index()].get_or_init(|| Arc::new(init())))
    }

    /// Whether the shape for `vis` has been built.
    pub fn is_initialized(&self, vis: Visibility) -> bool {
        self.shapes[vis.index()].get().is_some()
    }
}

impl fmt::Debug for ShapeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_map();
        for vis in Visibility::PARTITIONS {
            if let Some(shape) = self.shapes[vis.index()].get() {
                list.entry(&vis, &shape.len());
            }
        }
        list.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Symbol;

    #[test]
    fn test_shape_is_memoized() {
        let set = ShapeSet::new();
        assert!(!set.is_initialized(Visibility::All));
        let a = set.get(Visibility::All);
        let b = set.get(Visibility::All);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(set.is_initialized(Visibility::All));
        assert!(!set.is_initialized(Visibility::Private));
    }

    #[test]
    fn test_partitions_are_independent() {
        let set = ShapeSet::new();
        let all = set.get(Visibility::All);
        let private = set.get(Visibility::Private);
        assert!(!Arc::ptr_eq(&all, &private));

        if let Some(sym) = Symbol::new(600) {
            all.create(sym);
        }
        assert_eq!(all.len(), 1);
        assert!(private.is_empty());
    }

    #[test]
    fn test_init_runs_once_across_threads() {
        let set = ShapeSet::new();
        let shapes: Vec<Arc<SymbolTable>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| s.spawn(|| set.get(Visibility::PublicProtected)))
                .collect();
            handles.into_iter().filter_map(|h| h.join().ok()).collect()
        });
        assert_eq!(shapes.len(), 4);
        assert!(shapes.iter().all(|s| Arc::ptr_eq(s, &shapes[0])));
    }

    #[test]
    fn test_display() {
        assert_eq!(Visibility::PublicProtected.to_string(), "public/protected");
    }
}
