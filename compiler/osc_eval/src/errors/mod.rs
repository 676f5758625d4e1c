//! Evaluation errors and completion signals.
//!
//! # Categories
//!
//! Every `EvalErrorKind` belongs to one [`ErrorCategory`]. Only `Script`
//! errors can be observed by script-level handlers; everything else ends the
//! enclosing top-level call and is reported to the host.
//!
//! Factory functions (e.g. `no_such_member()`) are the public way to build
//! errors, mirroring how the call gate and scope chain raise them.

use std::fmt;

use osc_ir::{Symbol, SymbolInterner};

use crate::stack_frame::FrameSnapshot;
use crate::Value;

/// Result of evaluating one node.
pub type EvalResult = Result<Completion, EvalError>;

/// How a node finished when it did not fail.
///
/// Loops consume `Break`/`Continue`, function calls turn `Return` into
/// `Normal`; everything else forwards the signal unchanged.
#[derive(Clone, Debug, PartialEq)]
pub enum Completion {
    Normal(Value),
    Return(Value),
    Break,
    Continue,
}

impl Completion {
    /// Value carried by `Normal`/`Return`; `Undefined` for loop signals.
    pub fn into_value(self) -> Value {
        match self {
            Completion::Normal(v) | Completion::Return(v) => v,
            Completion::Break | Completion::Continue => Value::Undefined,
        }
    }

    #[inline]
    pub fn is_normal(&self) -> bool {
        matches!(self, Completion::Normal(_))
    }
}

/// Who may observe an error.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Script exceptions; catchable by script handlers.
    Script,
    /// Call depth exceeded.
    ResourceExhaustion,
    /// A defect in the evaluator or embedding host.
    InternalInvariantViolation,
    /// Cooperative abort requested from outside the thread.
    Cancellation,
}

/// Typed error condition.
#[derive(Clone, Debug, PartialEq)]
pub enum EvalErrorKind {
    // Script
    /// A value thrown by script code.
    Thrown { value: Value },
    NoSuchMember { symbol: Symbol },
    DuplicateDeclaration { symbol: Symbol },
    ConstReassignment { symbol: Symbol },
    UndefinedAssignment { symbol: Symbol },
    NoThis,
    NoSuper,
    NoCallee,

    // Resource exhaustion
    StackOverflow { depth: usize, limit: usize },

    // Internal invariant violations
    /// A pooled scope or table was used after it was recycled.
    StaleHandle { what: &'static str },
    /// Write attempted through an immutable escaped snapshot.
    DurableMutation { symbol: Option<Symbol> },
    /// The thread's stack frame was requested while already borrowed.
    FrameBusy,

    // Cancellation
    Cancelled,
}

impl EvalErrorKind {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Thrown { .. }
            | Self::NoSuchMember { .. }
            | Self::DuplicateDeclaration { .. }
            | Self::ConstReassignment { .. }
            | Self::UndefinedAssignment { .. }
            | Self::NoThis
            | Self::NoSuper
            | Self::NoCallee => ErrorCategory::Script,
            Self::StackOverflow { .. } => ErrorCategory::ResourceExhaustion,
            Self::StaleHandle { .. } | Self::DurableMutation { .. } | Self::FrameBusy => {
                ErrorCategory::InternalInvariantViolation
            }
            Self::Cancelled => ErrorCategory::Cancellation,
        }
    }
}

/// Display name of a symbol, falling back to its id.
pub(crate) struct SymbolName(pub(crate) Symbol);

impl fmt::Display for SymbolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match SymbolInterner::global().lookup(self.0) {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.0),
        }
    }
}

impl fmt::Display for EvalErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Thrown { value } => write!(f, "{value}"),
            Self::NoSuchMember { symbol } => {
                write!(f, "no such member: {}", SymbolName(*symbol))
            }
            Self::DuplicateDeclaration { symbol } => {
                write!(f, "duplicate declaration of constant: {}", SymbolName(*symbol))
            }
            Self::ConstReassignment { symbol } => {
                write!(f, "cannot assign value to constant: {}", SymbolName(*symbol))
            }
            Self::UndefinedAssignment { symbol } => {
                write!(f, "cannot assign (undefined) to variable: {}", SymbolName(*symbol))
            }
            Self::NoThis => write!(f, "no this!"),
            Self::NoSuper => write!(f, "no super!"),
            Self::NoCallee => write!(f, "no callee!"),
            Self::StackOverflow { depth, limit } => {
                write!(f, "stack overflow: depth {depth} exceeds limit {limit}")
            }
            Self::StaleHandle { what } => write!(f, "use of recycled pooled {what}"),
            Self::DurableMutation { symbol: Some(symbol) } => {
                write!(f, "cannot modify escaped snapshot member: {}", SymbolName(*symbol))
            }
            Self::DurableMutation { symbol: None } => write!(f, "cannot modify escaped snapshot"),
            Self::FrameBusy => write!(f, "stack frame is already borrowed on this thread"),
            Self::Cancelled => write!(f, "thread terminated"),
        }
    }
}

/// Evaluation error.
#[derive(Clone, Debug)]
pub struct EvalError {
    /// Structured error condition.
    pub kind: EvalErrorKind,
    /// Call stack at the original throw site.
    ///
    /// Attached once, by the deepest call gate a script error passes
    /// through; later gates leave it alone.
    pub frames: Option<FrameSnapshot>,
}

impl EvalError {
    #[inline]
    fn from_kind(kind: EvalErrorKind) -> Self {
        EvalError { kind, frames: None }
    }

    #[inline]
    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Whether a script-level handler may catch this error.
    ///
    /// Cancellation is deliberately excluded: a terminated thread must not
    /// be kept alive by a script's `catch`.
    #[inline]
    pub fn is_catchable(&self) -> bool {
        self.category() == ErrorCategory::Script
    }

    /// Whether the call gate should still attach a stack snapshot.
    #[inline]
    pub(crate) fn needs_frames(&self) -> bool {
        self.is_catchable() && self.frames.is_none()
    }

    /// Attach a stack snapshot unless one is already present.
    #[must_use]
    pub fn with_frames(mut self, frames: FrameSnapshot) -> Self {
        if self.frames.is_none() {
            self.frames = Some(frames);
        }
        self
    }

    /// The thrown value, for `Thrown` errors.
    pub fn thrown_value(&self) -> Option<&Value> {
        match &self.kind {
            EvalErrorKind::Thrown { value } => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(frames) = &self.frames {
            write!(f, "\n{frames}")?;
        }
        Ok(())
    }
}

impl std::error::Error for EvalError {}

// Script errors

/// A value thrown by script code.
#[cold]
pub fn thrown(value: Value) -> EvalError {
    EvalError::from_kind(EvalErrorKind::Thrown { value })
}

/// Name not found anywhere on the scope chain.
#[cold]
pub fn no_such_member(symbol: Symbol) -> EvalError {
    EvalError::from_kind(EvalErrorKind::NoSuchMember { symbol })
}

/// Redeclaration of a constant member.
#[cold]
pub fn duplicate_declaration(symbol: Symbol) -> EvalError {
    EvalError::from_kind(EvalErrorKind::DuplicateDeclaration { symbol })
}

/// Second assignment to a constant member.
#[cold]
pub fn const_reassignment(symbol: Symbol) -> EvalError {
    EvalError::from_kind(EvalErrorKind::ConstReassignment { symbol })
}

/// Assignment of `undefined` to a member.
#[cold]
pub fn undefined_assignment(symbol: Symbol) -> EvalError {
    EvalError::from_kind(EvalErrorKind::UndefinedAssignment { symbol })
}

/// `this` requested outside any receiver.
#[cold]
pub fn no_this() -> EvalError {
    EvalError::from_kind(EvalErrorKind::NoThis)
}

/// `super` requested outside any function.
#[cold]
pub fn no_super() -> EvalError {
    EvalError::from_kind(EvalErrorKind::NoSuper)
}

/// `callee` requested outside any function.
#[cold]
pub fn no_callee() -> EvalError {
    EvalError::from_kind(EvalErrorKind::NoCallee)
}

// Resource exhaustion

/// Call depth limit exceeded.
#[cold]
pub fn stack_overflow(depth: usize, limit: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::StackOverflow { depth, limit })
}

// Internal invariant violations

/// A pooled handle outlived its storage.
#[cold]
pub fn stale_handle(what: &'static str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::StaleHandle { what })
}

/// Write through an escaped snapshot, optionally naming the member.
#[cold]
pub fn durable_mutation(symbol: Option<Symbol>) -> EvalError {
    EvalError::from_kind(EvalErrorKind::DurableMutation { symbol })
}

/// Reentrant access to the thread's stack frame.
#[cold]
pub fn frame_busy() -> EvalError {
    EvalError::from_kind(EvalErrorKind::FrameBusy)
}

// Cancellation

/// The thread was marked for termination.
#[cold]
pub fn cancelled() -> EvalError {
    EvalError::from_kind(EvalErrorKind::Cancelled)
}

#[cfg(test)]
mod tests;
