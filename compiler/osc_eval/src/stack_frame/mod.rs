//! The per-thread stack frame: call gate, depth bookkeeping, and pools.
//!
//! # Depths
//!
//! Depth 0 is the root (the host, outside any script activation). Every
//! [`StackFrame::eval_node`] pushes one depth for the duration of the call.
//! Each depth records the running evaluator, its current line and scope, and
//! the list of pooled scopes and tables allocated while it was on top; when
//! the depth exits, everything still on that list goes back to the pools.
//!
//! # Pools
//!
//! Scopes and member tables live in generational arenas. A recycled entry
//! bumps its generation, so a [`ScopeHandle`] or [`PooledTable`] that
//! outlived its allocation is detected on use (`StaleHandle`) rather than
//! silently aliasing whatever took its place.
//!
//! # Escape
//!
//! Nothing pooled may be retained past its depth. Errors carry a
//! [`FrameSnapshot`] ([`StackFrame::safe_copy`]); closures capture a
//! [`DurableScope`] ([`StackFrame::escape_scope`]).

mod chain;
mod config;
mod guard;
mod pool;
mod registry;
mod snapshot;

use std::sync::Arc;
use std::thread::ThreadId;

use osc_ir::{SymbolTable, Visibility};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::errors::{self, EvalError};
use crate::scope::{MemberSource, ScopeSnapshot};
use crate::{
    Completion, DurableScope, EvalResult, FunctionBinding, FunctionValue, GlobalScope, HeapScope,
    MemberTable, NodeEvaluator, ScopeHandle, ScopeKind, ScopeRef, Value,
};

pub use config::{FrameConfig, FrameConfigBuilder, DEFAULT_MAX_DEPTH};
pub(crate) use pool::PoolKey;
pub use registry::{
    install_current_stack_frame, registered_threads, remove_current_stack_frame,
    reset_stack_frames, terminate_thread, with_current_stack_frame, TerminationHandle,
};
pub use snapshot::{FrameRecord, FrameSnapshot, FrameView};

use guard::DepthGuard;
use pool::Pool;

/// A scope in the arena.
pub(crate) struct PooledScope {
    kind: ScopeKind,
    previous: ScopeRef,
    shape: Arc<SymbolTable>,
    /// Owned: freed together with the scope.
    members: PoolKey,
    mixins: Vec<Arc<dyn MemberSource>>,
}

/// Something to hand back to a pool when its depth exits.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Allocation {
    Scope(PoolKey),
    Table(PoolKey),
}

#[derive(Default)]
struct DepthEntry {
    evaluator: Option<Arc<dyn NodeEvaluator>>,
    line: u32,
    scope: Option<ScopeRef>,
    allocations: SmallVec<[Allocation; 4]>,
}

impl DepthEntry {
    fn clear(&mut self) {
        self.evaluator = None;
        self.line = 0;
        self.scope = None;
    }
}

/// Handle to a pooled [`MemberTable`].
///
/// Not `Clone`: a table has exactly one owner, which either frees it
/// ([`StackFrame::free_member_table`]), hands it to a function scope
/// ([`StackFrame::allocate_function_scope`]), or lets its depth reclaim it.
#[derive(Debug, PartialEq, Eq)]
pub struct PooledTable {
    key: PoolKey,
}

impl PooledTable {
    #[inline]
    pub fn index(&self) -> usize {
        self.key.index
    }

    #[inline]
    pub fn generation(&self) -> u32 {
        self.key.generation
    }
}

/// Pool counters of one stack frame.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub scopes_created: usize,
    pub scopes_reused: usize,
    pub scopes_live: usize,
    pub tables_created: usize,
    pub tables_reused: usize,
    pub tables_live: usize,
}

/// Execution state of one thread.
///
/// Usually obtained through [`with_current_stack_frame`]; a host that manages
/// its own threads may build one with [`StackFrame::new`] and install it.
pub struct StackFrame {
    config: FrameConfig,
    depth: usize,
    /// Indexed by depth; grows on demand, never shrinks.
    entries: Vec<DepthEntry>,
    scopes: Pool<Option<PooledScope>>,
    tables: Pool<MemberTable>,
    global: Arc<GlobalScope>,
    termination: TerminationHandle,
    registered: Option<ThreadId>,
}

/// Live pooled scope behind `handle`.
fn pooled(
    scopes: &Pool<Option<PooledScope>>,
    handle: ScopeHandle,
) -> Result<&PooledScope, EvalError> {
    scopes
        .get(handle.0)
        .and_then(Option::as_ref)
        .ok_or_else(|| errors::stale_handle("scope"))
}

impl StackFrame {
    /// A frame whose chains end at the process-wide global scope.
    pub fn new(config: FrameConfig) -> Self {
        Self::with_global(config, GlobalScope::process())
    }

    /// A frame with its own global scope.
    pub fn with_global(config: FrameConfig, global: Arc<GlobalScope>) -> Self {
        StackFrame {
            config,
            depth: 0,
            entries: vec![DepthEntry::default()],
            scopes: Pool::new("scopes"),
            tables: Pool::new("member tables"),
            global,
            termination: TerminationHandle::new(),
            registered: None,
        }
    }

    #[inline]
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    #[inline]
    pub fn global(&self) -> &Arc<GlobalScope> {
        &self.global
    }

    /// The global scope as a chain root.
    pub fn global_scope(&self) -> ScopeRef {
        ScopeRef::from(Arc::clone(&self.global))
    }

    /// Handle other threads can use to cancel this frame.
    pub fn termination_handle(&self) -> TerminationHandle {
        self.termination.clone()
    }

    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.termination.is_terminated()
    }

    // Call gate

    /// Run `evaluator` in `scope` one depth down.
    ///
    /// Fails with `StackOverflow` before touching any state when the depth
    /// limit is reached. Whatever the outcome, everything allocated at the
    /// new depth is reclaimed before this returns. A script error leaving
    /// the deepest activation gets the stack snapshot attached.
    pub fn eval_node(
        &mut self,
        evaluator: &Arc<dyn NodeEvaluator>,
        scope: &ScopeRef,
    ) -> EvalResult {
        let limit = self.config.max_depth();
        if self.depth >= limit {
            tracing::warn!(depth = self.depth + 1, limit, "call depth limit exceeded");
            return Err(errors::stack_overflow(self.depth + 1, limit));
        }

        let budget = self.config.stack_budget();
        let mut guard = DepthGuard::enter(self, evaluator, scope);
        let result = budget.run(|| evaluator.eval_node(&mut guard, scope));
        match result {
            Err(err) if err.needs_frames() => Err(err.with_frames(guard.safe_copy())),
            other => other,
        }
    }

    /// Invoke `function` with `arguments` as the leading slots of its scope.
    ///
    /// The function scope is pooled and freed as soon as the body finishes,
    /// unless the function encloses functions of its own: then the
    /// arguments move into a heap scope that its closures keep alive.
    /// `Return` becomes `Normal`.
    pub fn call_function(
        &mut self,
        function: &Arc<FunctionValue>,
        arguments: PooledTable,
        this: Option<Value>,
        super_: Option<Value>,
    ) -> EvalResult {
        let body = Arc::clone(function.body());
        let shape = body.shared_member_index_table(Visibility::All);
        let previous = match function.closure() {
            Some(closure) => closure.clone(),
            None => DurableScope::Global(Arc::clone(&self.global)),
        };

        let result = if function.encloses_functions() {
            let members = self.take_member_table(arguments)?;
            let binding = FunctionBinding::new(Arc::clone(function), this, super_);
            let scope = HeapScope::function(binding, previous, shape, members);
            self.eval_node(&body, &ScopeRef::Durable(DurableScope::Heap(scope)))
        } else {
            let scope = self.allocate_function_scope(
                Arc::clone(function),
                &ScopeRef::Durable(previous),
                shape,
                arguments,
                this,
                super_,
            )?;
            let result = self.eval_node(&body, &scope);
            self.free_scope(&scope);
            result
        };
        match result? {
            Completion::Return(value) => Ok(Completion::Normal(value)),
            other => Ok(other),
        }
    }

    fn push_depth(&mut self, evaluator: &Arc<dyn NodeEvaluator>, scope: &ScopeRef) {
        self.depth += 1;
        if self.entries.len() <= self.depth {
            self.entries.push(DepthEntry::default());
        }
        let entry = &mut self.entries[self.depth];
        entry.evaluator = Some(Arc::clone(evaluator));
        entry.line = 0;
        entry.scope = Some(scope.clone());
    }

    fn pop_depth(&mut self) {
        let depth = self.depth;
        self.reclaim_depth(depth);
        self.entries[depth].clear();
        self.depth -= 1;
    }

    /// Release everything still registered at `depth`, newest first.
    fn reclaim_depth(&mut self, depth: usize) {
        let mut allocations = std::mem::take(&mut self.entries[depth].allocations);
        for allocation in allocations.drain(..).rev() {
            match allocation {
                Allocation::Scope(key) => {
                    self.release_scope(key);
                }
                Allocation::Table(key) => {
                    self.release_table(key);
                }
            }
        }
        // keep the inline buffer's capacity for the next activation
        self.entries[depth].allocations = allocations;
    }

    /// Free everything allocated at the root depth.
    ///
    /// For hosts that allocate outside any `eval_node` between runs.
    pub fn reset(&mut self) {
        self.reclaim_depth(0);
        self.entries[0].clear();
    }

    // Line tracking

    /// Record the current scope and line; fails with `Cancelled` once the
    /// thread has been marked for termination.
    pub fn set_line_number(&mut self, scope: &ScopeRef, line: u32) -> Result<(), EvalError> {
        self.check_terminated()?;
        let entry = &mut self.entries[self.depth];
        entry.scope = Some(scope.clone());
        entry.line = line;
        Ok(())
    }

    /// Record the current line only.
    pub fn set_line(&mut self, line: u32) -> Result<(), EvalError> {
        self.check_terminated()?;
        self.entries[self.depth].line = line;
        Ok(())
    }

    #[inline]
    fn check_terminated(&self) -> Result<(), EvalError> {
        if self.termination.is_terminated() {
            tracing::warn!(depth = self.depth, "evaluation cancelled");
            return Err(errors::cancelled());
        }
        Ok(())
    }

    // Allocation

    /// A block scope drawn from the pool, reclaimed when the current depth
    /// exits.
    pub fn allocate_basic_scope(
        &mut self,
        previous: &ScopeRef,
        shape: Arc<SymbolTable>,
    ) -> ScopeRef {
        let members = self.acquire_table(None, shape.len());
        self.install_scope(ScopeKind::Block, previous.clone(), shape, members)
    }

    /// A function scope whose member storage is `members` (the call's
    /// arguments), reclaimed when the current depth exits.
    ///
    /// The table moves into the scope and is freed with it.
    pub fn allocate_function_scope(
        &mut self,
        callee: Arc<FunctionValue>,
        previous: &ScopeRef,
        shape: Arc<SymbolTable>,
        members: PooledTable,
        this: Option<Value>,
        super_: Option<Value>,
    ) -> Result<ScopeRef, EvalError> {
        let key = members.key;
        let table = self
            .tables
            .get_mut(key)
            .ok_or_else(|| errors::stale_handle("member table"))?;
        table.ensure_capacity(shape.len());
        if let Some(depth) = self.tables.detach(key) {
            self.unregister_allocation(depth, Allocation::Table(key));
        }
        let binding = FunctionBinding::new(callee, this, super_);
        Ok(self.install_scope(ScopeKind::Function(binding), previous.clone(), shape, key))
    }

    fn install_scope(
        &mut self,
        kind: ScopeKind,
        previous: ScopeRef,
        shape: Arc<SymbolTable>,
        members: PoolKey,
    ) -> ScopeRef {
        let depth = self.depth;
        let (key, slot) = self.scopes.acquire(Some(depth), || None);
        *slot = Some(PooledScope {
            kind,
            previous,
            shape,
            members,
            mixins: Vec::new(),
        });
        self.entries[depth].allocations.push(Allocation::Scope(key));
        ScopeRef::Pooled(ScopeHandle(key))
    }

    /// Release a pooled scope before its depth exits. Returns `false` for
    /// durable scopes and handles that are already stale.
    pub fn free_scope(&mut self, scope: &ScopeRef) -> bool {
        let ScopeRef::Pooled(handle) = scope else {
            return false;
        };
        if let Some(depth) = self.scopes.depth_of(handle.0) {
            self.unregister_allocation(depth, Allocation::Scope(handle.0));
        }
        self.release_scope(handle.0)
    }

    fn release_scope(&mut self, key: PoolKey) -> bool {
        let Some(slot) = self.scopes.release(key) else {
            return false;
        };
        if let Some(scope) = slot.take() {
            self.release_table(scope.members);
        }
        true
    }

    /// Backing storage with room for `size` slots, reclaimed when the
    /// current depth exits unless freed or handed to a function scope.
    pub fn allocate_member_table(&mut self, size: usize) -> PooledTable {
        let depth = self.depth;
        let key = self.acquire_table(Some(depth), size);
        self.entries[depth].allocations.push(Allocation::Table(key));
        PooledTable { key }
    }

    /// Return a table to the pool. Returns `false` if it was already
    /// recycled.
    pub fn free_member_table(&mut self, table: PooledTable) -> bool {
        if let Some(depth) = self.tables.detach(table.key) {
            self.unregister_allocation(depth, Allocation::Table(table.key));
        }
        self.release_table(table.key)
    }

    /// Move a pooled table's slots into owned storage and return the
    /// table to the pool.
    pub fn take_member_table(&mut self, table: PooledTable) -> Result<MemberTable, EvalError> {
        let owned = self
            .tables
            .get(table.key)
            .cloned()
            .ok_or_else(|| errors::stale_handle("member table"))?;
        self.free_member_table(table);
        Ok(owned)
    }

    fn acquire_table(&mut self, depth: Option<usize>, size: usize) -> PoolKey {
        let min_capacity = self.config.min_table_capacity();
        let (key, table) = self
            .tables
            .acquire(depth, || MemberTable::with_min_capacity(min_capacity));
        table.ensure_capacity(size);
        key
    }

    fn release_table(&mut self, key: PoolKey) -> bool {
        match self.tables.release(key) {
            Some(table) => {
                table.reset();
                true
            }
            None => false,
        }
    }

    fn unregister_allocation(&mut self, depth: usize, allocation: Allocation) {
        let allocations = &mut self.entries[depth].allocations;
        if let Some(pos) = allocations.iter().rposition(|a| *a == allocation) {
            allocations.swap_remove(pos);
        }
    }

    pub fn table(&self, table: &PooledTable) -> Result<&MemberTable, EvalError> {
        self.tables
            .get(table.key)
            .ok_or_else(|| errors::stale_handle("member table"))
    }

    pub fn table_mut(&mut self, table: &PooledTable) -> Result<&mut MemberTable, EvalError> {
        self.tables
            .get_mut(table.key)
            .ok_or_else(|| errors::stale_handle("member table"))
    }

    /// Member storage of a pooled scope.
    pub fn scope_table(&self, handle: ScopeHandle) -> Result<&MemberTable, EvalError> {
        let scope = pooled(&self.scopes, handle)?;
        self.tables
            .get(scope.members)
            .ok_or_else(|| errors::stale_handle("member table"))
    }

    // Escape

    /// A scope that stays valid after every depth has exited. Pooled chains
    /// are copied into snapshots; durable scopes are returned as-is.
    pub fn escape_scope(&self, scope: &ScopeRef) -> Result<DurableScope, EvalError> {
        match scope {
            ScopeRef::Durable(durable) => Ok(durable.clone()),
            ScopeRef::Pooled(handle) => self.snapshot_chain(*handle, &mut FxHashMap::default()),
        }
    }

    /// Snapshot the pooled prefix of a chain, outermost first, reusing
    /// snapshots already taken for shared prefixes.
    fn snapshot_chain(
        &self,
        handle: ScopeHandle,
        memo: &mut FxHashMap<PoolKey, DurableScope>,
    ) -> Result<DurableScope, EvalError> {
        let mut pending: SmallVec<[(PoolKey, &PooledScope); 8]> = SmallVec::new();
        let mut key = handle.0;
        let mut base = loop {
            if let Some(done) = memo.get(&key) {
                break done.clone();
            }
            let scope = pooled(&self.scopes, ScopeHandle(key))?;
            pending.push((key, scope));
            match &scope.previous {
                ScopeRef::Durable(durable) => break durable.clone(),
                ScopeRef::Pooled(previous) => key = previous.0,
            }
        };

        for (key, scope) in pending.into_iter().rev() {
            let members = self
                .tables
                .get(scope.members)
                .ok_or_else(|| errors::stale_handle("member table"))?
                .safe_copy();
            let snapshot = ScopeSnapshot::new(
                scope.kind.clone(),
                base,
                Arc::clone(&scope.shape),
                members,
                scope.mixins.iter().cloned().collect(),
            );
            base = DurableScope::Snapshot(Arc::new(snapshot));
            memo.insert(key, base.clone());
        }
        Ok(base)
    }

    /// Immutable copy of every active depth, top of stack first.
    ///
    /// Scopes that were already freed while their depth is still active are
    /// recorded as absent.
    pub fn safe_copy(&self) -> FrameSnapshot {
        let mut memo = FxHashMap::default();
        let records = (1..=self.depth)
            .rev()
            .filter_map(|depth| {
                let entry = &self.entries[depth];
                let evaluator = Arc::clone(entry.evaluator.as_ref()?);
                let scope = entry.scope.as_ref().and_then(|scope| match scope {
                    ScopeRef::Durable(durable) => Some(durable.clone()),
                    ScopeRef::Pooled(handle) => self.snapshot_chain(*handle, &mut memo).ok(),
                });
                Some(FrameRecord::new(evaluator, entry.line, scope))
            })
            .collect();
        FrameSnapshot::new(records)
    }

    // Introspection

    /// Number of active activations; 0 outside any `eval_node`.
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[inline]
    pub fn line_number(&self) -> u32 {
        self.entries[self.depth].line
    }

    pub fn current_scope(&self) -> Option<&ScopeRef> {
        self.entries[self.depth].scope.as_ref()
    }

    pub fn current_evaluator(&self) -> Option<&Arc<dyn NodeEvaluator>> {
        self.entries[self.depth].evaluator.as_ref()
    }

    /// Active depths from the top of the stack down to depth 1.
    pub fn frames(&self) -> impl Iterator<Item = FrameView<'_>> + '_ {
        (1..=self.depth).rev().filter_map(move |depth| {
            let entry = &self.entries[depth];
            Some(FrameView {
                evaluator: entry.evaluator.as_ref()?,
                line: entry.line,
                scope: entry.scope.as_ref(),
                depth,
            })
        })
    }

    pub fn pool_stats(&self) -> PoolStats {
        PoolStats {
            scopes_created: self.scopes.created(),
            scopes_reused: self.scopes.reused(),
            scopes_live: self.scopes.live(),
            tables_created: self.tables.created(),
            tables_reused: self.tables.reused(),
            tables_live: self.tables.live(),
        }
    }

    // Registry

    fn register(&mut self) {
        self.registered = Some(registry::register(&self.termination));
    }

    fn unregister(&mut self) {
        if let Some(id) = self.registered.take() {
            registry::deregister(id, &self.termination);
        }
    }
}

impl Drop for StackFrame {
    fn drop(&mut self) {
        self.unregister();
    }
}

impl std::fmt::Debug for StackFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackFrame")
            .field("depth", &self.depth)
            .field("pools", &self.pool_stats())
            .finish_non_exhaustive()
    }
}
