//! RAII depth guard for the call gate.
//!
//! Holds `&mut StackFrame` and implements `Deref`/`DerefMut`, so the
//! evaluator runs against the guard as if it were the frame. Dropping the
//! guard (normal return, error, or unwinding) reclaims everything allocated
//! at the depth and pops it.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use super::StackFrame;
use crate::{NodeEvaluator, ScopeRef};

pub(super) struct DepthGuard<'f> {
    frame: &'f mut StackFrame,
}

impl<'f> DepthGuard<'f> {
    /// Push a depth. The caller has already checked the depth limit.
    pub(super) fn enter(
        frame: &'f mut StackFrame,
        evaluator: &Arc<dyn NodeEvaluator>,
        scope: &ScopeRef,
    ) -> Self {
        frame.push_depth(evaluator, scope);
        DepthGuard { frame }
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.frame.pop_depth();
    }
}

impl Deref for DepthGuard<'_> {
    type Target = StackFrame;

    fn deref(&self) -> &Self::Target {
        self.frame
    }
}

impl DerefMut for DepthGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.frame
    }
}
