//! Generational free-list pool backing the scope arena and the member-table
//! pool.
//!
//! Entries are never removed: a released entry keeps its storage, bumps its
//! generation, and goes on a LIFO free list, so the next acquire reuses the
//! most recently released (and most likely cache-warm) entry.

/// Generational index into a [`Pool`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct PoolKey {
    pub(crate) index: usize,
    pub(crate) generation: u32,
}

struct Entry<T> {
    generation: u32,
    live: bool,
    /// Depth whose exit reclaims this entry; `None` while owned by another
    /// entry (a scope's member table).
    depth: Option<usize>,
    item: T,
}

pub(crate) struct Pool<T> {
    name: &'static str,
    entries: Vec<Entry<T>>,
    free: Vec<usize>,
    created: usize,
    reused: usize,
}

impl<T> Pool<T> {
    pub(crate) fn new(name: &'static str) -> Self {
        Pool {
            name,
            entries: Vec::new(),
            free: Vec::new(),
            created: 0,
            reused: 0,
        }
    }

    /// Take an entry, reusing a released one when possible. `make` only
    /// runs when the pool has to grow.
    pub(crate) fn acquire(
        &mut self,
        depth: Option<usize>,
        make: impl FnOnce() -> T,
    ) -> (PoolKey, &mut T) {
        if let Some(index) = self.free.pop() {
            self.reused += 1;
            let entry = &mut self.entries[index];
            entry.live = true;
            entry.depth = depth;
            let key = PoolKey {
                index,
                generation: entry.generation,
            };
            return (key, &mut entry.item);
        }

        let index = self.entries.len();
        self.created += 1;
        if (index + 1).is_power_of_two() && index >= 64 {
            tracing::debug!(pool = self.name, entries = index + 1, "pool grew");
        }
        self.entries.push(Entry {
            generation: 0,
            live: true,
            depth,
            item: make(),
        });
        let entry = &mut self.entries[index];
        (
            PoolKey {
                index,
                generation: 0,
            },
            &mut entry.item,
        )
    }

    #[inline]
    fn live_entry(&self, key: PoolKey) -> Option<&Entry<T>> {
        self.entries
            .get(key.index)
            .filter(|e| e.live && e.generation == key.generation)
    }

    #[inline]
    fn live_entry_mut(&mut self, key: PoolKey) -> Option<&mut Entry<T>> {
        self.entries
            .get_mut(key.index)
            .filter(|e| e.live && e.generation == key.generation)
    }

    /// Return an entry to the free list. Returns the item for clearing, or
    /// `None` if `key` is stale.
    pub(crate) fn release(&mut self, key: PoolKey) -> Option<&mut T> {
        let entry = self.live_entry_mut(key)?;
        entry.live = false;
        entry.depth = None;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(key.index);
        Some(&mut self.entries[key.index].item)
    }

    #[inline]
    pub(crate) fn get(&self, key: PoolKey) -> Option<&T> {
        self.live_entry(key).map(|e| &e.item)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, key: PoolKey) -> Option<&mut T> {
        self.live_entry_mut(key).map(|e| &mut e.item)
    }

    /// Depth that will reclaim `key`, if it is live and registered.
    pub(crate) fn depth_of(&self, key: PoolKey) -> Option<usize> {
        self.live_entry(key).and_then(|e| e.depth)
    }

    /// Stop reclaiming `key` at its depth; returns the depth it had.
    pub(crate) fn detach(&mut self, key: PoolKey) -> Option<usize> {
        self.live_entry_mut(key).and_then(|e| e.depth.take())
    }

    pub(crate) fn live(&self) -> usize {
        self.entries.len() - self.free.len()
    }

    pub(crate) fn created(&self) -> usize {
        self.created
    }

    pub(crate) fn reused(&self) -> usize {
        self.reused
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_release_then_acquire_reuses_index() {
        let mut pool: Pool<u32> = Pool::new("test");
        let (a, _) = pool.acquire(Some(0), || 1);
        assert!(pool.release(a).is_some());
        let (b, item) = pool.acquire(Some(0), || 2);
        // Storage is reused as-is; `make` did not run.
        assert_eq!(*item, 1);
        assert_eq!(b.index, a.index);
        assert_ne!(b.generation, a.generation);
        assert_eq!(pool.created(), 1);
        assert_eq!(pool.reused(), 1);
    }

    #[test]
    fn test_stale_key_is_rejected() {
        let mut pool: Pool<u32> = Pool::new("test");
        let (a, _) = pool.acquire(None, || 7);
        pool.release(a);
        assert!(pool.get(a).is_none());
        assert!(pool.release(a).is_none());
        let (b, _) = pool.acquire(None, || 8);
        assert!(pool.get(a).is_none());
        assert_eq!(pool.get(b), Some(&7));
    }

    #[test]
    fn test_lifo_reuse() {
        let mut pool: Pool<u32> = Pool::new("test");
        let (a, _) = pool.acquire(None, || 0);
        let (b, _) = pool.acquire(None, || 0);
        pool.release(a);
        pool.release(b);
        let (c, _) = pool.acquire(None, || 0);
        assert_eq!(c.index, b.index);
        assert_eq!(pool.live(), 1);
    }

    #[test]
    fn test_depth_tracking() {
        let mut pool: Pool<u32> = Pool::new("test");
        let (a, _) = pool.acquire(Some(3), || 0);
        assert_eq!(pool.depth_of(a), Some(3));
        assert_eq!(pool.detach(a), Some(3));
        assert_eq!(pool.depth_of(a), None);
        assert!(pool.get(a).is_some());
    }
}
