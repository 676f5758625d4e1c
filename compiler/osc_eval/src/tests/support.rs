//! Test evaluators and helpers.

use std::sync::Arc;

use osc_ir::ShapeSet;

use crate::{
    EvalResult, FrameConfig, FunctionValue, GlobalScope, NodeEvaluator, ScopeRef, StackFrame,
    Symbol, SymbolInterner, SymbolTable, Visibility,
};

type Body = dyn Fn(&mut StackFrame, &ScopeRef) -> EvalResult + Send + Sync;

/// A node whose behavior is a closure.
pub(crate) struct FnEvaluator {
    name: Option<Symbol>,
    file: Option<&'static str>,
    shapes: ShapeSet,
    body: Box<Body>,
}

impl FnEvaluator {
    pub(crate) fn new(
        body: impl Fn(&mut StackFrame, &ScopeRef) -> EvalResult + Send + Sync + 'static,
    ) -> Self {
        FnEvaluator {
            name: None,
            file: None,
            shapes: ShapeSet::new(),
            body: Box::new(body),
        }
    }

    pub(crate) fn named(mut self, name: &str) -> Self {
        self.name = Some(sym(name));
        self
    }

    pub(crate) fn in_file(mut self, file: &'static str) -> Self {
        self.file = Some(file);
        self
    }

    pub(crate) fn into_dyn(self) -> Arc<dyn NodeEvaluator> {
        Arc::new(self)
    }
}

impl NodeEvaluator for FnEvaluator {
    fn eval_node(&self, frame: &mut StackFrame, scope: &ScopeRef) -> EvalResult {
        (self.body)(frame, scope)
    }

    fn shared_member_index_table(&self, visibility: Visibility) -> Arc<SymbolTable> {
        self.shapes.get(visibility)
    }

    fn name(&self) -> Option<Symbol> {
        self.name
    }

    fn file(&self) -> Option<&str> {
        self.file
    }
}

pub(crate) fn sym(name: &str) -> Symbol {
    SymbolInterner::global().intern(name)
}

/// A function value running `evaluator`, with no closure.
pub(crate) fn function(evaluator: Arc<dyn NodeEvaluator>) -> Arc<FunctionValue> {
    Arc::new(FunctionValue::new(evaluator.name(), evaluator))
}

/// A frame with a private global scope, so tests never see each other's
/// globals.
pub(crate) fn isolated_frame(config: FrameConfig) -> StackFrame {
    StackFrame::with_global(config, Arc::new(GlobalScope::new()))
}
