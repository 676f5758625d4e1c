//! Native stack growth for deeply recursive script evaluation.
//!
//! Every script call passes through the stack frame's call gate, which
//! recurses on the host thread. A script depth limit of several thousand
//! frames can exhaust a default 2MB thread stack long before the limit is
//! reached, so the call gate runs each activation inside
//! [`ensure_sufficient_stack`] (or [`StackBudget::run`] when the embedding
//! host wants different sizes).
//!
//! # Platform Support
//!
//! - **Native targets**: `stacker` allocates a new stack segment on demand.
//! - **WASM targets**: passthrough; the engine manages its own stack.

/// Default red zone (128KB). Below this much remaining stack we grow.
pub const DEFAULT_RED_ZONE: usize = 128 * 1024;

/// Default size of each new stack segment (2MB).
pub const DEFAULT_SEGMENT_SIZE: usize = 2 * 1024 * 1024;

/// Red zone and segment size used when growing the native stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StackBudget {
    red_zone: usize,
    segment_size: usize,
}

impl StackBudget {
    /// Create a budget. A segment smaller than the red zone is widened to it,
    /// otherwise every growth would immediately be below the red zone again.
    pub const fn new(red_zone: usize, segment_size: usize) -> Self {
        let segment_size = if segment_size < red_zone {
            red_zone
        } else {
            segment_size
        };
        StackBudget {
            red_zone,
            segment_size,
        }
    }

    #[inline]
    pub const fn red_zone(self) -> usize {
        self.red_zone
    }

    #[inline]
    pub const fn segment_size(self) -> usize {
        self.segment_size
    }

    /// Run `f`, first growing the native stack if less than the red zone
    /// remains.
    #[inline]
    #[cfg(not(target_arch = "wasm32"))]
    pub fn run<R>(self, f: impl FnOnce() -> R) -> R {
        stacker::maybe_grow(self.red_zone, self.segment_size, f)
    }

    /// WASM version - just call directly.
    #[inline]
    #[cfg(target_arch = "wasm32")]
    pub fn run<R>(self, f: impl FnOnce() -> R) -> R {
        f()
    }
}

impl Default for StackBudget {
    fn default() -> Self {
        StackBudget::new(DEFAULT_RED_ZONE, DEFAULT_SEGMENT_SIZE)
    }
}

/// Run `f` with the default [`StackBudget`].
#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    StackBudget::default().run(f)
}

/// Remaining native stack in bytes, if the platform can tell.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn remaining_stack() -> Option<usize> {
    stacker::remaining_stack()
}

/// WASM version - unknown.
#[inline]
#[cfg(target_arch = "wasm32")]
pub fn remaining_stack() -> Option<usize> {
    None
}

#[cfg(test)]
mod tests;
