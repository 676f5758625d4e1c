use super::*;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::HashSet;

fn sym(raw: u32) -> Symbol {
    Symbol::new(raw).unwrap_or_else(|| panic!("{raw} is not a valid symbol"))
}

fn is_prime(n: usize) -> bool {
    if n < 2 {
        return false;
    }
    (2..).take_while(|d| d * d <= n).all(|d| n % d != 0)
}

#[test]
fn test_sequential_ids_get_dense_slots() {
    let table = SymbolTable::new();
    assert_eq!(table.create(sym(500)), 0);
    assert_eq!(table.create(sym(501)), 1);
    assert_eq!(table.create(sym(502)), 2);
    assert_eq!(table.get(sym(501)), Some(1));
    assert_eq!(table.len(), 3);
}

#[test]
fn test_create_is_idempotent() {
    let table = SymbolTable::new();
    let first = table.create(sym(42));
    let again = table.create(sym(42));
    assert_eq!(first, again);
    assert_eq!(table.len(), 1);
}

#[test]
fn test_get_missing() {
    let table = SymbolTable::new();
    assert_eq!(table.get(sym(9)), None);
    table.create(sym(10));
    assert_eq!(table.get(sym(9)), None);
    assert!(!table.is_empty());
}

#[test]
fn test_default_capacity_is_prime() {
    let table = SymbolTable::new();
    assert_eq!(table.capacity(), 11);
    assert!((table.load_factor() - DEFAULT_LOAD_FACTOR).abs() < f64::EPSILON);
}

#[test]
fn test_growth_preserves_mappings() {
    let table = SymbolTable::new();
    let ids: Vec<u32> = (500..1_500).collect();
    for (expected, &id) in ids.iter().enumerate() {
        assert_eq!(table.create(sym(id)), expected);
    }
    for (expected, &id) in ids.iter().enumerate() {
        assert_eq!(table.get(sym(id)), Some(expected));
    }
    assert!(is_prime(table.capacity()));
    assert!(table.stats().grow_count > 0);
}

#[test]
fn test_grows_before_exceeding_load_factor() {
    let table = SymbolTable::new();
    // Threshold at capacity 11 and load 0.75 is 8.
    for id in 1..=8 {
        table.create(sym(id));
    }
    assert_eq!(table.capacity(), 11);
    table.create(sym(9));
    assert_eq!(table.capacity(), 23);
}

#[test]
fn test_invalid_load_factor() {
    for bad in [0.0, 1.0, -0.5, 1.5, f64::NAN, 1e-10] {
        let result = SymbolTable::with_capacity_and_load(16, bad);
        assert!(
            matches!(result, Err(SymbolTableError::InvalidLoadFactor(_))),
            "load factor {bad} should be rejected"
        );
    }
}

#[test]
fn test_small_load_factor_still_grows() {
    let Ok(sparse) = SymbolTable::with_capacity_and_load(0, 1e-3) else {
        panic!("valid configuration rejected");
    };
    assert_eq!(sparse.create(sym(500)), 0);
    assert_eq!(sparse.create(sym(501)), 1);
    assert!(sparse.capacity() >= 2000);
}

#[test]
fn test_capacity_rounds_up_to_prime() {
    let Ok(table) = SymbolTable::with_capacity_and_load(100, 0.5) else {
        panic!("valid configuration rejected");
    };
    assert_eq!(table.capacity(), 127);

    let Ok(tiny) = SymbolTable::with_capacity_and_load(0, 0.5) else {
        panic!("valid configuration rejected");
    };
    assert_eq!(tiny.capacity(), 3);
    assert_eq!(tiny.create(sym(1)), 0);
    assert_eq!(tiny.create(sym(2)), 1);
    assert_eq!(tiny.get(sym(1)), Some(0));
}

#[test]
fn test_symbols_during_growth() {
    let table = SymbolTable::new();
    for id in [700, 701, 702, 703] {
        table.create(sym(id));
    }
    let iter = table.symbols();
    // Inserts below the threshold land in the iterated generation; the
    // rest go to a grown one the iterator never sees.
    for id in 800..900 {
        table.create(sym(id));
    }
    let seen: Vec<u32> = iter.map(Symbol::raw).collect();
    let unique: HashSet<u32> = seen.iter().copied().collect();
    assert_eq!(unique.len(), seen.len());
    assert!([700, 701, 702, 703].iter().all(|id| unique.contains(id)));
    assert!(unique.iter().all(|&id| (700..704).contains(&id) || (800..900).contains(&id)));
    assert!(seen.len() < 104);
    assert_eq!(table.symbols().count(), 104);
}

#[test]
fn test_stats() {
    let table = SymbolTable::new();
    assert!(table.stats().mean_probe().abs() < f64::EPSILON);
    for id in 500..520 {
        table.create(sym(id));
    }
    let stats = table.stats();
    assert_eq!(stats.len, 20);
    assert_eq!(stats.capacity, table.capacity());
    assert!(stats.longest_probe >= 1);
    assert!(stats.total_probes >= stats.len);
    assert!(stats.mean_probe() >= 1.0);
}

#[test]
fn test_concurrent_readers_during_growth() {
    let table = SymbolTable::new();
    let total: u32 = 5_000;

    std::thread::scope(|s| {
        let writer = s.spawn(|| {
            for id in 1..=total {
                table.create(sym(id));
            }
        });

        for _ in 0..3 {
            s.spawn(|| {
                // Slot for id k is always k - 1 once visible.
                while table.len() < total as usize {
                    for id in (1..=total).step_by(37) {
                        if let Some(slot) = table.get(sym(id)) {
                            assert_eq!(slot, id as usize - 1);
                        }
                    }
                }
            });
        }

        writer.join().unwrap_or_else(|_| panic!("writer panicked"));
    });

    for id in 1..=total {
        assert_eq!(table.get(sym(id)), Some(id as usize - 1));
    }
}

#[test]
fn test_concurrent_writers_agree() {
    let table = SymbolTable::new();
    let per_thread: Vec<Vec<usize>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| s.spawn(|| (500..800).map(|id| table.create(sym(id))).collect::<Vec<_>>()))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|_| panic!("writer panicked")))
            .collect()
    });

    for other in &per_thread[1..] {
        assert_eq!(&per_thread[0], other);
    }
    let slots: HashSet<usize> = per_thread[0].iter().copied().collect();
    assert_eq!(slots, (0..300).collect());
}

proptest! {
    #[test]
    fn prop_slots_dense_in_insertion_order(
        ids in proptest::collection::vec(1u32..u32::MAX, 0..400),
    ) {
        let table = SymbolTable::new();
        let mut expected: Vec<u32> = Vec::new();
        for &id in &ids {
            let slot = table.create(sym(id));
            match expected.iter().position(|&e| e == id) {
                Some(existing) => prop_assert_eq!(slot, existing),
                None => {
                    prop_assert_eq!(slot, expected.len());
                    expected.push(id);
                }
            }
        }
        prop_assert_eq!(table.len(), expected.len());
        prop_assert!(is_prime(table.capacity()));
        for (slot, &id) in expected.iter().enumerate() {
            prop_assert_eq!(table.get(sym(id)), Some(slot));
        }
    }

    #[test]
    fn prop_load_factor_respected(load in 0.05f64..0.95, n in 0usize..300) {
        let table = SymbolTable::with_capacity_and_load(0, load)
            .unwrap_or_else(|e| panic!("{e}"));
        for id in 1..=n {
            table.create(sym(u32::try_from(id).unwrap_or(u32::MAX)));
        }
        let stats = table.stats();
        prop_assert!(stats.len < stats.capacity);
        prop_assert!(stats.len <= threshold(stats.capacity, load));
    }
}
