//! The contract between this core and the tree-walking evaluator.

use std::sync::Arc;

use osc_ir::{Symbol, SymbolTable, Visibility};

use crate::{EvalResult, ScopeRef, StackFrame};

/// One executable unit (a function body, block, or statement list) as seen
/// by the call gate.
///
/// Implementations are shared across threads: the same evaluator may run
/// concurrently on several stack frames, each with its own scopes.
pub trait NodeEvaluator: Send + Sync {
    /// Run this node in `scope`.
    ///
    /// Called only by [`StackFrame::eval_node`], which has already pushed a
    /// depth for it. Must be reentrant: nested nodes go back through the
    /// frame's call gate.
    fn eval_node(&self, frame: &mut StackFrame, scope: &ScopeRef) -> EvalResult;

    /// Shape of the scopes this node creates, for one visibility partition.
    ///
    /// Requested on every activation, so implementations memoize it per
    /// construct (see `osc_ir::ShapeSet`).
    fn shared_member_index_table(&self, visibility: Visibility) -> Arc<SymbolTable>;

    /// Function name for stack traces.
    fn name(&self) -> Option<Symbol> {
        None
    }

    /// Source file for stack traces.
    fn file(&self) -> Option<&str> {
        None
    }
}
