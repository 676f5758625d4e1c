use super::*;
use pretty_assertions::assert_eq;

fn sym(raw: u32) -> Symbol {
    Symbol::new(raw).unwrap_or_else(|| panic!("{raw} is not a valid symbol"))
}

#[test]
fn test_categories() {
    assert_eq!(thrown(Value::int(1)).category(), ErrorCategory::Script);
    assert_eq!(no_such_member(sym(3)).category(), ErrorCategory::Script);
    assert_eq!(no_this().category(), ErrorCategory::Script);
    assert_eq!(
        stack_overflow(11, 10).category(),
        ErrorCategory::ResourceExhaustion
    );
    assert_eq!(
        stale_handle("scope").category(),
        ErrorCategory::InternalInvariantViolation
    );
    assert_eq!(
        durable_mutation(Some(sym(3))).category(),
        ErrorCategory::InternalInvariantViolation
    );
    assert_eq!(cancelled().category(), ErrorCategory::Cancellation);
}

#[test]
fn test_only_script_errors_are_catchable() {
    assert!(thrown(Value::Null).is_catchable());
    assert!(const_reassignment(sym(4)).is_catchable());
    assert!(!stack_overflow(2, 1).is_catchable());
    assert!(!frame_busy().is_catchable());
    assert!(!cancelled().is_catchable());
}

#[test]
fn test_display_uses_interned_name() {
    let name = SymbolInterner::global().intern("errors_test_member");
    assert_eq!(
        no_such_member(name).to_string(),
        "no such member: errors_test_member"
    );
    // Ids the interner never minted fall back to the raw id.
    assert_eq!(no_such_member(sym(7)).to_string(), "no such member: #7");
}

#[test]
fn test_display_messages() {
    assert_eq!(no_this().to_string(), "no this!");
    assert_eq!(no_super().to_string(), "no super!");
    assert_eq!(
        stack_overflow(17, 16).to_string(),
        "stack overflow: depth 17 exceeds limit 16"
    );
    assert_eq!(thrown(Value::string("boom")).to_string(), "boom");
}

#[test]
fn test_thrown_value() {
    let err = thrown(Value::int(9));
    assert_eq!(err.thrown_value(), Some(&Value::int(9)));
    assert_eq!(no_callee().thrown_value(), None);
}

#[test]
fn test_needs_frames_only_for_script_errors() {
    assert!(thrown(Value::Null).needs_frames());
    assert!(!stack_overflow(2, 1).needs_frames());
    assert!(!cancelled().needs_frames());
}

#[test]
fn test_completion_into_value() {
    assert_eq!(Completion::Normal(Value::int(1)).into_value(), Value::int(1));
    assert_eq!(Completion::Return(Value::int(2)).into_value(), Value::int(2));
    assert_eq!(Completion::Break.into_value(), Value::Undefined);
    assert!(Completion::Normal(Value::Null).is_normal());
    assert!(!Completion::Continue.is_normal());
}
