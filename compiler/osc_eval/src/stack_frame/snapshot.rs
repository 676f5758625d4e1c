//! Stack traces: live frame views and escaped frame snapshots.

use std::fmt;
use std::sync::Arc;

use osc_ir::{Symbol, SymbolInterner};

use crate::{DurableScope, NodeEvaluator, ScopeRef};

/// Write one trace line: `name (file:line)`, or `file:line` for anonymous
/// code.
fn write_location(
    f: &mut fmt::Formatter<'_>,
    name: Option<Symbol>,
    file: Option<&str>,
    line: u32,
) -> fmt::Result {
    let file = file.unwrap_or("<unknown>");
    match name {
        Some(sym) => match SymbolInterner::global().lookup(sym) {
            Some(name) => write!(f, "{name} ({file}:{line})"),
            None => write!(f, "{sym} ({file}:{line})"),
        },
        None => write!(f, "{file}:{line}"),
    }
}

/// A live activation on a stack frame, borrowed from it.
pub struct FrameView<'a> {
    pub(super) evaluator: &'a Arc<dyn NodeEvaluator>,
    pub(super) line: u32,
    pub(super) scope: Option<&'a ScopeRef>,
    pub(super) depth: usize,
}

impl<'a> FrameView<'a> {
    #[inline]
    pub fn evaluator(&self) -> &'a Arc<dyn NodeEvaluator> {
        self.evaluator
    }

    #[inline]
    pub fn line(&self) -> u32 {
        self.line
    }

    #[inline]
    pub fn scope(&self) -> Option<&'a ScopeRef> {
        self.scope
    }

    /// 1-based depth of this activation.
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl fmt::Display for FrameView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_location(f, self.evaluator.name(), self.evaluator.file(), self.line)
    }
}

/// One activation of an escaped stack snapshot.
#[derive(Clone)]
pub struct FrameRecord {
    evaluator: Arc<dyn NodeEvaluator>,
    line: u32,
    scope: Option<DurableScope>,
}

impl FrameRecord {
    pub(super) fn new(
        evaluator: Arc<dyn NodeEvaluator>,
        line: u32,
        scope: Option<DurableScope>,
    ) -> Self {
        FrameRecord {
            evaluator,
            line,
            scope,
        }
    }

    #[inline]
    pub fn evaluator(&self) -> &Arc<dyn NodeEvaluator> {
        &self.evaluator
    }

    #[inline]
    pub fn name(&self) -> Option<Symbol> {
        self.evaluator.name()
    }

    #[inline]
    pub fn file(&self) -> Option<&str> {
        self.evaluator.file()
    }

    #[inline]
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Durable copy of the scope that was active at this depth.
    #[inline]
    pub fn scope(&self) -> Option<&DurableScope> {
        self.scope.as_ref()
    }
}

impl fmt::Display for FrameRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_location(f, self.name(), self.file(), self.line)
    }
}

impl fmt::Debug for FrameRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FrameRecord({self})")
    }
}

/// Immutable copy of a stack frame, top of stack first.
///
/// Stays valid after every depth it describes has exited; this is what an
/// error carries as its stack trace.
#[derive(Clone, Default)]
pub struct FrameSnapshot {
    records: Arc<[FrameRecord]>,
}

impl FrameSnapshot {
    pub(super) fn new(records: Vec<FrameRecord>) -> Self {
        FrameSnapshot {
            records: records.into(),
        }
    }

    #[inline]
    pub fn records(&self) -> &[FrameRecord] {
        &self.records
    }

    /// The deepest activation (where the snapshot was taken).
    #[inline]
    pub fn top(&self) -> Option<&FrameRecord> {
        self.records.first()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl fmt::Display for FrameSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, record) in self.records.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  at {record}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for FrameSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.records.iter()).finish()
    }
}
