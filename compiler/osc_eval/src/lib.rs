//! OScript Eval - execution core of the OScript runtime.
//!
//! This crate owns everything a tree-walking evaluator needs to run a node
//! without touching the heap on the common path:
//!
//! - [`StackFrame`]: per-thread call gate, depth bookkeeping, and the pools
//!   from which scopes and member tables are drawn
//! - [`ScopeRef`] / [`DurableScope`]: the scope chain, split by provenance so
//!   that only durable scopes can be captured by closures
//! - [`MemberTable`] / [`Slot`]: value storage behind every scope
//! - [`NodeEvaluator`]: the contract the external evaluator implements
//! - [`EvalError`] / [`Completion`]: error and control-flow results
//!
//! Name resolution data (`Symbol`, `SymbolTable` shapes) lives in `osc_ir`.

pub mod errors;
mod evaluator;
mod member_table;
pub mod scope;
mod slot;
pub mod stack_frame;
mod value;

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;

pub use errors::{Completion, ErrorCategory, EvalError, EvalErrorKind, EvalResult};
pub use evaluator::NodeEvaluator;
pub use member_table::{DurableMembers, MemberTable, MIN_TABLE_CAPACITY};
pub use scope::{
    DurableScope, DurableSlot, FunctionBinding, GlobalScope, HeapScope, MemberSource,
    PooledSlot, ScopeHandle, ScopeKind, ScopeRef, ScopeSnapshot, SlotRef,
};
pub use slot::{AssignError, Attributes, Slot};
pub use stack_frame::{
    install_current_stack_frame, registered_threads, remove_current_stack_frame,
    reset_stack_frames, terminate_thread, with_current_stack_frame, FrameConfig,
    FrameConfigBuilder, FrameRecord, FrameSnapshot, FrameView, PoolStats, PooledTable,
    StackFrame, TerminationHandle, DEFAULT_MAX_DEPTH,
};
pub use value::{FunctionValue, Value};

pub use osc_ir::{Symbol, SymbolInterner, SymbolTable, Visibility};

use std::sync::OnceLock;

static TRACING_INSTALLED: OnceLock<bool> = OnceLock::new();

/// Environment variables consulted for a log filter, in order.
const LOG_FILTER_VARS: [&str; 2] = ["OSC_LOG", "RUST_LOG"];

/// Install a `tracing` subscriber filtered by `OSC_LOG` (or `RUST_LOG`).
///
/// Runs once per process; later calls return the first call's outcome.
/// Returns `true` if this crate's subscriber is the global one. Nothing is
/// installed when neither variable is set, or when the host already set a
/// global subscriber of its own.
///
/// ```
/// let installed = osc_eval::init_tracing();
/// assert_eq!(osc_eval::init_tracing(), installed);
/// ```
///
/// ```bash
/// OSC_LOG=osc_eval=debug my-host script.os   # pool and registry events
/// OSC_LOG=osc_ir=debug my-host script.os     # shape growth
/// ```
pub fn init_tracing() -> bool {
    *TRACING_INSTALLED.get_or_init(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let Some(directives) = LOG_FILTER_VARS
            .iter()
            .find_map(|var| std::env::var(var).ok())
        else {
            return false;
        };
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true))
            .with(EnvFilter::new(directives))
            .try_init()
            .is_ok()
    })
}
