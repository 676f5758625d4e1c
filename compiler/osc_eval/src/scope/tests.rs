use super::*;
use crate::tests::support::{function, sym, FnEvaluator};
use crate::{Attributes, Completion, ErrorCategory, EvalErrorKind, MemberTable};
use osc_ir::SymbolTable;
use pretty_assertions::assert_eq;

fn global() -> Arc<GlobalScope> {
    Arc::new(GlobalScope::new())
}

fn block(previous: DurableScope) -> Arc<HeapScope> {
    HeapScope::block(previous, Arc::new(SymbolTable::new()))
}

fn noop() -> Arc<FunctionValue> {
    function(FnEvaluator::new(|_, _| Ok(Completion::Normal(Value::Null))).into_dyn())
}

fn function_scope(binding: FunctionBinding, previous: DurableScope) -> DurableScope {
    DurableScope::Heap(HeapScope::function(
        binding,
        previous,
        Arc::new(SymbolTable::new()),
        MemberTable::new(),
    ))
}

/// Minimal mixin: a fixed set of public members.
struct Fixed(Vec<(Symbol, Value)>);

impl MemberSource for Fixed {
    fn get_member(&self, symbol: Symbol) -> Option<Value> {
        self.0
            .iter()
            .find(|(s, _)| *s == symbol)
            .map(|(_, v)| v.clone())
    }

    fn member_symbols(&self, _include_private: bool) -> Vec<Symbol> {
        self.0.iter().map(|(s, _)| *s).collect()
    }
}

#[test]
fn test_lookup_walks_outward() {
    let g = global();
    let x = sym("scope_test_outer_x");
    g.define(x, Value::int(1)).unwrap();
    let inner = DurableScope::Heap(block(DurableScope::Global(g)));
    let slot = inner.lookup(x).unwrap();
    assert_eq!(slot.symbol(), x);
    let SlotRef::Durable(slot) = slot else {
        panic!("durable chains resolve to durable slots");
    };
    assert_eq!(slot.load(), Value::int(1));
}

#[test]
fn test_inner_declaration_shadows_outer() {
    let g = global();
    let x = sym("scope_test_shadow_x");
    g.define(x, Value::int(1)).unwrap();
    let inner = DurableScope::Heap(block(DurableScope::Global(Arc::clone(&g))));
    let SlotRef::Durable(slot) = inner.create_member(x, Attributes::PUBLIC).unwrap() else {
        panic!("expected a durable slot");
    };
    slot.store(Value::int(2)).unwrap();
    assert_eq!(g.get(x), Some(Value::int(1)));
    let SlotRef::Durable(found) = inner.lookup(x).unwrap() else {
        panic!("expected a durable slot");
    };
    assert_eq!(found.load(), Value::int(2));
}

#[test]
fn test_missing_member_fails_at_global() {
    let inner = DurableScope::Heap(block(DurableScope::Global(global())));
    let err = inner.lookup(sym("scope_test_missing")).unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::NoSuchMember { .. }));
    assert!(err.is_catchable());
}

#[test]
fn test_own_members_before_mixins_before_previous() {
    let g = global();
    let a = sym("scope_test_mix_a");
    let b = sym("scope_test_mix_b");
    g.define(a, Value::int(100)).unwrap();
    g.define(b, Value::int(200)).unwrap();
    let scope = DurableScope::Heap(block(DurableScope::Global(g)));
    scope
        .mixin(Arc::new(Fixed(vec![(a, Value::int(10)), (b, Value::int(20))])))
        .unwrap();
    let SlotRef::Durable(own) = scope.create_member(a, Attributes::PUBLIC).unwrap() else {
        panic!("expected a durable slot");
    };
    own.store(Value::int(1)).unwrap();

    let load = |symbol| match scope.lookup(symbol).unwrap() {
        SlotRef::Durable(slot) => slot.load(),
        SlotRef::Pooled(_) => panic!("expected a durable slot"),
    };
    assert_eq!(load(a), Value::int(1));
    assert_eq!(load(b), Value::int(20));
}

#[test]
fn test_read_only_mixin_rejects_store() {
    let b = sym("scope_test_ro_b");
    let scope = DurableScope::Heap(block(DurableScope::Global(global())));
    scope.mixin(Arc::new(Fixed(vec![(b, Value::Null)]))).unwrap();
    let SlotRef::Durable(slot) = scope.lookup(b).unwrap() else {
        panic!("expected a durable slot");
    };
    let err = slot.store(Value::int(1)).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::InternalInvariantViolation);
}

#[test]
fn test_const_redeclaration_is_rejected() {
    let c = sym("scope_test_const");
    let scope = DurableScope::Heap(block(DurableScope::Global(global())));
    let slot = scope
        .create_member(c, Attributes::PUBLIC | Attributes::CONST)
        .unwrap();
    let SlotRef::Durable(slot) = slot else {
        panic!("expected a durable slot");
    };
    slot.store(Value::int(1)).unwrap();
    let err = slot.store(Value::int(2)).unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::ConstReassignment { .. }));
    let err = scope.create_member(c, Attributes::PUBLIC).unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::DuplicateDeclaration { .. }));
}

#[test]
fn test_non_const_redeclaration_resets() {
    let v = sym("scope_test_redeclare");
    let scope = DurableScope::Heap(block(DurableScope::Global(global())));
    let SlotRef::Durable(slot) = scope.create_member(v, Attributes::PUBLIC).unwrap() else {
        panic!("expected a durable slot");
    };
    slot.store(Value::int(5)).unwrap();
    scope.create_member(v, Attributes::PRIVATE).unwrap();
    assert!(slot.load().is_undefined());
}

#[test]
fn test_undefined_assignment_is_rejected() {
    let g = global();
    let v = sym("scope_test_undefined");
    g.define(v, Value::int(1)).unwrap();
    let scope = DurableScope::Global(g);
    let SlotRef::Durable(slot) = scope.lookup(v).unwrap() else {
        panic!("expected a durable slot");
    };
    let err = slot.store(Value::Undefined).unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::UndefinedAssignment { .. }));
}

#[test]
fn test_this_super_callee_escalate_through_blocks() {
    let base = noop();
    let callee = Arc::new(
        FunctionValue::new(None, Arc::clone(base.body())).with_overridden(Arc::clone(&base)),
    );
    let this = Value::string("receiver");
    let binding = FunctionBinding::new(Arc::clone(&callee), Some(this.clone()), None);
    let function = function_scope(binding, DurableScope::Global(global()));
    let inner = DurableScope::Heap(block(DurableScope::Heap(block(function))));

    assert_eq!(inner.get_this().unwrap(), this);
    assert_eq!(inner.get_callee().unwrap(), Value::Function(Arc::clone(&callee)));
    // No bound super: the overridden function answers.
    assert_eq!(inner.get_super().unwrap(), Value::Function(base));
}

#[test]
fn test_super_prefers_bound_super_when_this_is_bound() {
    let bound = Value::string("parent");
    let with_this = FunctionBinding::new(noop(), Some(Value::Null), Some(bound.clone()));
    assert_eq!(with_this.super_value(), bound);
    let without_this = FunctionBinding::new(noop(), None, Some(bound));
    assert_eq!(without_this.super_value(), Value::Null);
}

#[test]
fn test_global_has_no_this_super_or_callee() {
    let scope = DurableScope::Heap(block(DurableScope::Global(global())));
    let kinds = [
        scope.get_this().unwrap_err().kind,
        scope.get_super().unwrap_err().kind,
        scope.get_callee().unwrap_err().kind,
    ];
    assert!(matches!(kinds[0], EvalErrorKind::NoThis));
    assert!(matches!(kinds[1], EvalErrorKind::NoSuper));
    assert!(matches!(kinds[2], EvalErrorKind::NoCallee));
}

#[test]
fn test_function_without_this_stops_escalation_for_super_only() {
    let function = function_scope(
        FunctionBinding::new(noop(), None, None),
        DurableScope::Global(global()),
    );
    assert!(matches!(
        function.get_this().unwrap_err().kind,
        EvalErrorKind::NoThis
    ));
    assert_eq!(function.get_super().unwrap(), Value::Null);
}

#[test]
fn test_snapshot_rejects_mutation() {
    let v = sym("scope_test_snap_v");
    let shape = Arc::new(SymbolTable::new());
    let mut members = MemberTable::new();
    let index = shape.create(v);
    members.reference_at(index).declare(Attributes::PUBLIC);
    members.reference_at(index).assign(Value::int(3)).unwrap();
    let snapshot = DurableScope::Snapshot(Arc::new(ScopeSnapshot::new(
        ScopeKind::Block,
        DurableScope::Global(global()),
        shape,
        members.safe_copy(),
        Arc::from(Vec::new()),
    )));

    let SlotRef::Durable(slot) = snapshot.lookup(v).unwrap() else {
        panic!("expected a durable slot");
    };
    assert_eq!(slot.load(), Value::int(3));
    for err in [
        slot.store(Value::int(4)).unwrap_err(),
        snapshot.create_member(v, Attributes::PUBLIC).unwrap_err(),
        snapshot.mixin(Arc::new(Fixed(Vec::new()))).unwrap_err(),
    ] {
        assert!(matches!(err.kind, EvalErrorKind::DurableMutation { .. }));
        assert!(!err.is_catchable());
    }
}

#[test]
fn test_member_symbols() {
    let scope = block(DurableScope::Global(global()));
    let durable = DurableScope::Heap(Arc::clone(&scope));
    let public = sym("scope_test_sym_public");
    let private = sym("scope_test_sym_private");
    let mixed = sym("scope_test_sym_mixed");
    durable.create_member(public, Attributes::PUBLIC).unwrap();
    durable.create_member(private, Attributes::PRIVATE).unwrap();
    durable
        .mixin(Arc::new(Fixed(vec![(mixed, Value::Null)])))
        .unwrap();

    assert_eq!(durable.member_symbols(false), vec![public, mixed]);
    assert_eq!(durable.member_symbols(true), vec![public, private, mixed]);
    // Private members are invisible through the scope used as a mixin.
    assert_eq!(scope.get_member(private), None);
    assert_eq!(scope.get_member(public), Some(Value::Undefined));
}

#[test]
fn test_heap_scope_as_mixin_accepts_public_stores() {
    let source = block(DurableScope::Global(global()));
    let p = sym("scope_test_source_p");
    DurableScope::Heap(Arc::clone(&source))
        .create_member(p, Attributes::PUBLIC)
        .unwrap();
    let target = DurableScope::Heap(block(DurableScope::Global(global())));
    target.mixin(source.clone()).unwrap();
    let SlotRef::Durable(slot) = target.lookup(p).unwrap() else {
        panic!("expected a durable slot");
    };
    slot.store(Value::int(9)).unwrap();
    assert_eq!(source.get_member(p), Some(Value::int(9)));
}

#[test]
fn test_global_define_and_members() {
    let g = global();
    let a = sym("scope_test_global_a");
    assert!(g.is_empty());
    g.define(a, Value::from(true)).unwrap();
    assert_eq!(g.len(), 1);
    assert_eq!(g.get(a), Some(Value::Bool(true)));
    assert_eq!(g.member_symbols(false), vec![a]);
}
