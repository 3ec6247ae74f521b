//! Property-based tests for allocation invariants
//!
//! These hold for any well-formed input, not just the reference scenarios.

use std::collections::BTreeSet;

use fairshare_core::{
    MarketConfig, TOLERANCE, VoteMatrix, allocation_for_t, equilibrium, is_decomposable,
    max_min_allocation, solve, solve_approx,
};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// === STRATEGIES ===

/// Total budget plus votes whose rows each sum to it.
fn budget_votes() -> impl Strategy<Value = (f64, VoteMatrix)> {
    (1usize..=6, 1usize..=5, 1.0f64..1000.0).prop_flat_map(|(n, m, total)| {
        prop::collection::vec(prop::collection::vec(0.01f64..1.0, m), n).prop_map(move |weights| {
            let rows = weights
                .into_iter()
                .map(|w| {
                    let s: f64 = w.iter().sum();
                    w.iter().map(|x| x / s * total).collect()
                })
                .collect();
            (total, VoteMatrix::new(rows).unwrap())
        })
    })
}

proptest! {
    #[test]
    fn virtual_median_meets_total((total, votes) in budget_votes()) {
        let allocation = solve(total, &votes);
        let sum: f64 = allocation.iter().sum();
        prop_assert!((sum - total).abs() < TOLERANCE, "sum {} vs total {}", sum, total);
        prop_assert_eq!(allocation.len(), votes.sections());
    }

    #[test]
    fn approximation_meets_total((total, votes) in budget_votes()) {
        let sum: f64 = solve_approx(total, &votes).iter().sum();
        prop_assert!((sum - total).abs() < 1e-9, "sum {} vs total {}", sum, total);
    }

    #[test]
    fn allocations_stay_non_negative((total, votes) in budget_votes()) {
        for x in solve(total, &votes) {
            prop_assert!(x >= 0.0);
        }
        for x in solve_approx(total, &votes) {
            prop_assert!(x >= 0.0);
        }
    }

    #[test]
    fn section_sum_never_drops_as_t_grows((total, votes) in budget_votes()) {
        let mut last = f64::NEG_INFINITY;
        for step in 0..=32 {
            let t = step as f64 / 32.0;
            let sum: f64 = allocation_for_t(total, &votes, t).iter().sum();
            prop_assert!(sum >= last - 1e-9, "sum fell from {} to {} at t={}", last, sum, t);
            last = sum;
        }
    }

    #[test]
    fn bracket_ends_straddle_the_total((total, votes) in budget_votes()) {
        // Column minima at t = 0, column maxima at t = 1.
        let low: f64 = allocation_for_t(total, &votes, 0.0).iter().sum();
        let high: f64 = allocation_for_t(total, &votes, 1.0).iter().sum();
        prop_assert!(low <= total + 1e-9);
        prop_assert!(high >= total - 1e-9);
    }
}

// === RANDOMIZED SWEEPS ===

#[test]
fn decompositions_respect_preferences() {
    let mut rng = StdRng::seed_from_u64(42);

    for _ in 0..200 {
        let n = rng.random_range(1..=6);
        let m = rng.random_range(1..=5);
        let budget: Vec<f64> = (0..m).map(|_| rng.random_range(0.0..100.0)).collect();
        let preferences: Vec<BTreeSet<usize>> = (0..n)
            .map(|_| (0..m).filter(|_| rng.random_bool(0.5)).collect())
            .collect();
        let total: f64 = budget.iter().sum();

        let d = is_decomposable(&budget, &preferences).unwrap();
        assert!(d.flow_value <= total + 1e-9);

        for (i, row) in d.payments.iter().enumerate() {
            for (j, &paid) in row.iter().enumerate() {
                if !preferences[i].contains(&j) {
                    assert_eq!(paid, 0.0, "citizen {i} paid toward unsupported topic {j}");
                }
            }
            assert!(d.paid_by(i) <= total / n as f64 + 1e-9);
        }
        for (j, &amount) in budget.iter().enumerate() {
            assert!(d.received_by(j) <= amount + 1e-9);
        }

        if d.decomposable {
            for i in 0..n {
                assert!((d.paid_by(i) - total / n as f64).abs() < 1e-6);
            }
        }
    }
}

#[test]
fn egalitarian_never_worse_than_equal_split() {
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..25 {
        let n = rng.random_range(1..=4);
        let m = rng.random_range(1..=4);
        let values: Vec<Vec<f64>> = (0..n)
            .map(|_| (0..m).map(|_| rng.random_range(0.0..10.0)).collect())
            .collect();

        let result = max_min_allocation(&values).unwrap();
        let equal_split_min = values
            .iter()
            .map(|row| row.iter().sum::<f64>() / n as f64)
            .fold(f64::INFINITY, f64::min);
        assert!(
            result.min_utility >= equal_split_min - 1e-5,
            "max-min {} below equal split {equal_split_min} for {values:?}",
            result.min_utility
        );

        for j in 0..m {
            let share: f64 = result.shares.iter().map(|r| r[j]).sum();
            assert!((share - 1.0).abs() < 1e-9, "resource {j} sums to {share}");
        }
    }
}

#[test]
fn market_conserves_money_and_goods() {
    let mut rng = StdRng::seed_from_u64(1234);
    let cfg = MarketConfig {
        max_rounds: 2_000,
        ..Default::default()
    };

    for _ in 0..50 {
        let n = rng.random_range(1..=4);
        let m = rng.random_range(1..=4);
        let values: Vec<Vec<f64>> = (0..n)
            .map(|_| {
                let mut row: Vec<f64> = (0..m)
                    .map(|_| if rng.random_bool(0.3) { 0.0 } else { rng.random_range(0.1..10.0) })
                    .collect();
                // Every buyer wants something.
                let pick = rng.random_range(0..m);
                row[pick] = row[pick].max(1.0);
                row
            })
            .collect();
        let budgets: Vec<f64> = (0..n).map(|_| rng.random_range(1.0..100.0)).collect();

        let eq = equilibrium(&values, &budgets, &cfg).unwrap();
        let revenue: f64 = eq.prices.iter().sum();
        let money: f64 = budgets.iter().sum();
        assert!((revenue - money).abs() < 1e-6, "revenue {revenue} vs money {money}");

        for j in 0..m {
            let held: f64 = eq.allocation.iter().map(|r| r[j]).sum();
            assert!((held - 1.0).abs() < 1e-9, "good {j} allocated {held}");
        }
        for (i, row) in eq.allocation.iter().enumerate() {
            for &x in row {
                assert!(x >= 0.0, "buyer {i} holds negative amount {x}");
            }
        }
    }
}
