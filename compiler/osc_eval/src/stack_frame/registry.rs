//! Per-thread stack frames and the thread registry.
//!
//! Each thread's frame lives in thread-local storage and is created lazily
//! on first use. A process-wide map from `ThreadId` to [`TerminationHandle`]
//! lets other threads request cooperative cancellation; it is the only lock
//! here and is never held while calling out.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::{FrameConfig, StackFrame};
use crate::errors::{self, EvalError};

/// Cooperative cancellation flag shared between a frame and its
/// controllers.
#[derive(Clone, Debug, Default)]
pub struct TerminationHandle(Arc<AtomicBool>);

impl TerminationHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the owning thread to stop at its next line update.
    pub fn terminate(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn same(&self, other: &TerminationHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

struct Installed {
    frame: StackFrame,
    epoch: u64,
}

thread_local! {
    static CURRENT: RefCell<Option<Installed>> = const { RefCell::new(None) };
}

/// Bumped by [`reset_stack_frames`]; frames from an older epoch are
/// replaced on next access.
static EPOCH: AtomicU64 = AtomicU64::new(0);

fn registry() -> &'static Mutex<FxHashMap<ThreadId, TerminationHandle>> {
    static REGISTRY: OnceLock<Mutex<FxHashMap<ThreadId, TerminationHandle>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(FxHashMap::default()))
}

/// Register `handle` for the calling thread.
pub(super) fn register(handle: &TerminationHandle) -> ThreadId {
    let id = thread::current().id();
    registry().lock().insert(id, handle.clone());
    tracing::debug!(thread = ?id, "stack frame registered");
    id
}

/// Remove `id`'s registration if it still refers to `handle`.
pub(super) fn deregister(id: ThreadId, handle: &TerminationHandle) {
    let mut map = registry().lock();
    if map.get(&id).is_some_and(|h| h.same(handle)) {
        map.remove(&id);
        tracing::debug!(thread = ?id, "stack frame deregistered");
    }
}

/// Run `f` with the calling thread's stack frame, creating it on first use.
///
/// Fails with `FrameBusy` if called from inside another
/// `with_current_stack_frame` on the same thread; evaluators already
/// receive the frame as an argument and should use that.
pub fn with_current_stack_frame<R>(
    f: impl FnOnce(&mut StackFrame) -> R,
) -> Result<R, EvalError> {
    CURRENT.with(|cell| {
        let mut slot = cell.try_borrow_mut().map_err(|_| errors::frame_busy())?;
        let epoch = EPOCH.load(Ordering::Acquire);
        if slot.as_ref().is_some_and(|installed| installed.epoch != epoch) {
            *slot = None;
        }
        let installed = slot.get_or_insert_with(|| {
            let mut frame = StackFrame::new(FrameConfig::default());
            frame.register();
            Installed { frame, epoch }
        });
        Ok(f(&mut installed.frame))
    })
}

/// Make `frame` the calling thread's stack frame, returning the previous
/// one (deregistered) if there was one.
pub fn install_current_stack_frame(
    mut frame: StackFrame,
) -> Result<Option<StackFrame>, EvalError> {
    CURRENT.with(|cell| {
        let mut slot = cell.try_borrow_mut().map_err(|_| errors::frame_busy())?;
        let previous = slot.take().map(|installed| {
            let mut previous = installed.frame;
            previous.unregister();
            previous
        });
        frame.register();
        *slot = Some(Installed {
            frame,
            epoch: EPOCH.load(Ordering::Acquire),
        });
        Ok(previous)
    })
}

/// Detach the calling thread's stack frame, e.g. on thread teardown.
pub fn remove_current_stack_frame() -> Result<Option<StackFrame>, EvalError> {
    CURRENT.with(|cell| {
        let mut slot = cell.try_borrow_mut().map_err(|_| errors::frame_busy())?;
        Ok(slot.take().map(|installed| {
            let mut frame = installed.frame;
            frame.unregister();
            frame
        }))
    })
}

/// Mark thread `id` for termination. Returns whether it had a registered
/// frame.
pub fn terminate_thread(id: ThreadId) -> bool {
    let handle = registry().lock().get(&id).cloned();
    match handle {
        Some(handle) => {
            handle.terminate();
            tracing::warn!(thread = ?id, "thread termination requested");
            true
        }
        None => false,
    }
}

/// Forget every registered frame. Each thread gets a fresh frame the next
/// time it asks for one.
pub fn reset_stack_frames() {
    EPOCH.fetch_add(1, Ordering::AcqRel);
    let cleared = {
        let mut map = registry().lock();
        let n = map.len();
        map.clear();
        n
    };
    tracing::debug!(cleared, "stack frames reset");
}

/// Threads that currently have a registered frame.
pub fn registered_threads() -> Vec<ThreadId> {
    registry().lock().keys().copied().collect()
}
