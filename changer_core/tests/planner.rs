use changer_core::planner::{Available, plan};
use changer_core::{CoinOpError, CoinType};
use proptest::prelude::*;
use rstest::rstest;

fn tubes(v: &[(u8, u32, u32)]) -> Vec<Available> {
    v.iter()
        .map(|&(t, value, dispensable)| Available {
            coin_type: CoinType(t),
            value,
            dispensable,
        })
        .collect()
}

#[test]
fn thirty_from_five_ten_twenty_five() {
    let avail = tubes(&[(1, 5, 10), (2, 10, 10), (3, 25, 10)]);
    let p = plan(30, &avail).unwrap();
    assert_eq!(p.quantity_of(CoinType(3)), 1);
    assert_eq!(p.quantity_of(CoinType(1)), 1);
    assert_eq!(p.quantity_of(CoinType(2)), 0);
    assert_eq!(p.total(), 30);
    // descending value order
    assert_eq!(p.entries()[0].coin_type, CoinType(3));
}

#[test]
fn seven_is_impossible() {
    let avail = tubes(&[(1, 5, 10), (2, 10, 10), (3, 25, 10)]);
    assert_eq!(
        plan(7, &avail),
        Err(CoinOpError::NoExactChange { amount: 7 })
    );
}

#[rstest]
#[case(&[(1, 20, 3), (2, 50, 1)], 60, &[(1, 3)])]
#[case(&[(2, 3, 2), (3, 4, 1)], 6, &[(2, 2), (3, 0)])]
#[case(&[(1, 5, 1), (2, 10, 0)], 5, &[(1, 1)])]
fn backtracking_recovers_from_greedy(
    #[case] avail: &[(u8, u32, u32)],
    #[case] amount: u32,
    #[case] expected: &[(u8, u32)],
) {
    let p = plan(amount, &tubes(avail)).unwrap();
    assert_eq!(p.total(), u64::from(amount));
    for &(t, q) in expected {
        assert_eq!(p.quantity_of(CoinType(t)), q, "coin type {t}");
    }
}

#[test]
fn limited_stock_is_respected() {
    let avail = tubes(&[(1, 10, 2)]);
    assert!(plan(30, &avail).is_err());
    assert_eq!(plan(20, &avail).unwrap().quantity_of(CoinType(1)), 2);
}

/// Exhaustive reference: can `amount` be formed from the tubes at all?
fn reachable(amount: u32, avail: &[(u32, u32)]) -> bool {
    let mut can = vec![false; amount as usize + 1];
    can[0] = true;
    for &(value, n) in avail {
        if value == 0 {
            continue;
        }
        for _ in 0..n {
            for a in (value as usize..=amount as usize).rev() {
                if can[a - value as usize] {
                    can[a] = true;
                }
            }
        }
    }
    can[amount as usize]
}

proptest! {
    #[test]
    fn plan_succeeds_iff_exact_combination_exists(
        stock in prop::collection::vec((1u32..60, 0u32..6), 1..6),
        amount in 1u32..300,
    ) {
        let avail: Vec<Available> = stock
            .iter()
            .enumerate()
            .map(|(i, &(value, dispensable))| Available {
                coin_type: CoinType(i as u8 + 1),
                value,
                dispensable,
            })
            .collect();
        let oracle = reachable(amount, &stock);
        match plan(amount, &avail) {
            Ok(p) => {
                prop_assert!(oracle);
                prop_assert_eq!(p.total(), u64::from(amount));
                for e in p.entries() {
                    let a = avail.iter().find(|a| a.coin_type == e.coin_type).unwrap();
                    prop_assert!(e.quantity >= 1 && e.quantity <= a.dispensable);
                    prop_assert_eq!(e.value, a.value);
                }
            }
            Err(_) => prop_assert!(!oracle),
        }
    }
}
