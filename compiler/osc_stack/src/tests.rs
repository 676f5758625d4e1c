use super::*;

#[test]
fn test_runs_closure_once() {
    let mut calls = 0;
    let result = ensure_sufficient_stack(|| {
        calls += 1;
        "done"
    });
    assert_eq!(result, "done");
    assert_eq!(calls, 1);
}

#[test]
fn test_deep_recursion_with_default_budget() {
    // Large locals per level make this overflow a 2MB test thread without growth.
    fn descend(n: u32) -> u32 {
        ensure_sufficient_stack(|| {
            let pad = [n; 64];
            if n == 0 {
                0
            } else {
                descend(n - 1) + 1 + pad[0] - n
            }
        })
    }

    assert_eq!(descend(50_000), 50_000);
}

#[test]
fn test_custom_budget_recursion() {
    let budget = StackBudget::new(64 * 1024, 512 * 1024);
    fn descend(budget: StackBudget, n: u64) -> u64 {
        budget.run(|| if n == 0 { 0 } else { descend(budget, n - 1) + 2 })
    }

    assert_eq!(descend(budget, 20_000), 40_000);
}

#[test]
fn test_segment_never_smaller_than_red_zone() {
    let budget = StackBudget::new(256 * 1024, 1024);
    assert_eq!(budget.red_zone(), 256 * 1024);
    assert_eq!(budget.segment_size(), 256 * 1024);
}

#[test]
fn test_default_budget() {
    let budget = StackBudget::default();
    assert_eq!(budget.red_zone(), DEFAULT_RED_ZONE);
    assert_eq!(budget.segment_size(), DEFAULT_SEGMENT_SIZE);
}

#[cfg(not(target_arch = "wasm32"))]
#[test]
fn test_remaining_stack_is_reported() {
    assert!(remaining_stack().is_some_and(|bytes| bytes > 0));
}

#[test]
fn test_propagates_result_errors() {
    let result: Result<u8, &str> = ensure_sufficient_stack(|| Err("boom"));
    assert_eq!(result, Err("boom"));
}
