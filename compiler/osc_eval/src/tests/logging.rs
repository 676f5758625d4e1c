use pretty_assertions::assert_eq;

use super::support::{isolated_frame, FnEvaluator};
use crate::{init_tracing, Completion, EvalErrorKind, FrameConfig, Value};

#[test]
fn test_init_tracing_is_idempotent() {
    let installed = init_tracing();
    assert_eq!(init_tracing(), installed);
    assert_eq!(init_tracing(), installed);
}

#[test]
fn test_logging_paths_run_after_init() {
    init_tracing();
    let mut frame = isolated_frame(FrameConfig::builder().max_depth(1).build());
    let body = FnEvaluator::new(|frame, scope| {
        let _ = frame.allocate_member_table(4);
        let inner = FnEvaluator::new(|_, _| Ok(Completion::Normal(Value::Null))).into_dyn();
        frame.eval_node(&inner, scope)
    })
    .into_dyn();
    let global = frame.global_scope();
    let err = frame.eval_node(&body, &global).unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::StackOverflow { depth: 2, limit: 1 }));
    assert_eq!(frame.pool_stats().tables_live, 0);
}
