//! Generalized median budget aggregation with linear virtual votes.
//!
//! Each section gets the citizens' `n` real votes plus `n - 1` virtual votes
//! `min(1, (k + 1) * t) * total` for `k = 0..n-1`. The section's allocation is
//! the median of those `2n - 1` values. Raising `t` raises every virtual vote,
//! so the summed medians grow with `t`; we bisect on `t` until they hit the
//! total budget.
//!
//! The growth in `t` is relied on, not proven, for arbitrary vote matrices.
//! `allocation_for_t` is public so callers and tests can check it.

use crate::error::AllocationError;
use crate::median::median;
use crate::types::{Allocation, Amount, TOLERANCE, VoteMatrix};

/// Bisection limits for the virtual-vote parameter.
///
/// The round cap and the tolerance are independent stopping rules: the search
/// returns as soon as either one fires.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BisectionConfig {
    /// Hard cap on refinement rounds. 50 halvings of [0, 1] is below f64 resolution.
    pub max_rounds: u32,
    /// Early exit once |sum - total| drops below this.
    pub tolerance: f64,
}

impl Default for BisectionConfig {
    fn default() -> Self {
        Self {
            max_rounds: 50,
            tolerance: TOLERANCE,
        }
    }
}

/// Result of the search, including how it ended.
#[derive(Debug, Clone, PartialEq)]
pub struct BisectionOutcome {
    pub allocation: Allocation,
    /// Parameter the allocation was computed at.
    pub t: f64,
    /// Probes evaluated, at most `max_rounds`.
    pub rounds: u32,
    /// Whether the allocation sum is within tolerance of the total.
    pub converged: bool,
}

/// Virtual vote `k` (0-based) for parameter `t`.
pub fn virtual_vote(total_budget: Amount, k: usize, t: f64) -> Amount {
    ((k + 1) as f64 * t).min(1.0) * total_budget
}

/// Per-section medians after injecting the `n - 1` virtual votes for `t`.
pub fn allocation_for_t(total_budget: Amount, votes: &VoteMatrix, t: f64) -> Allocation {
    let n = votes.citizens();
    let virtual_votes: Vec<Amount> = (0..n - 1)
        .map(|k| virtual_vote(total_budget, k, t))
        .collect();

    let mut pool = Vec::with_capacity(2 * n - 1);
    (0..votes.sections())
        .map(|j| {
            pool.clear();
            pool.extend(votes.column(j));
            pool.extend_from_slice(&virtual_votes);
            // Pool holds at least the n >= 1 real votes.
            median(&mut pool).unwrap_or_default()
        })
        .collect()
}

/// Bisect on `t` in [0, 1] until the section medians sum to `total_budget`.
///
/// Never fails: if neither stopping rule reports a hit, the allocation at the
/// midpoint of the final bracket is returned with `converged = false`.
pub fn solve_with(total_budget: Amount, votes: &VoteMatrix, cfg: &BisectionConfig) -> BisectionOutcome {
    let mut low = 0.0_f64;
    let mut high = 1.0_f64;

    for round in 0..cfg.max_rounds {
        let mid = (low + high) / 2.0;
        let allocation = allocation_for_t(total_budget, votes, mid);
        let sum: f64 = allocation.iter().sum();

        #[cfg(feature = "instrument")]
        tracing::info!(
            target: "bisection",
            round = round,
            t = mid,
            sum = sum,
            total = total_budget,
        );

        if (sum - total_budget).abs() < cfg.tolerance {
            return finish(allocation, mid, round + 1, true);
        }
        if sum > total_budget {
            high = mid;
        } else {
            low = mid;
        }
    }

    let t = (low + high) / 2.0;
    let allocation = allocation_for_t(total_budget, votes, t);
    let sum: f64 = allocation.iter().sum();
    let converged = (sum - total_budget).abs() < cfg.tolerance;
    finish(allocation, t, cfg.max_rounds, converged)
}

fn finish(allocation: Allocation, t: f64, rounds: u32, converged: bool) -> BisectionOutcome {
    #[cfg(feature = "instrument")]
    tracing::info!(
        target: "bisection_result",
        t = t,
        rounds = rounds,
        converged = converged,
    );

    BisectionOutcome {
        allocation,
        t,
        rounds,
        converged,
    }
}

/// Aggregate `votes` into a budget summing to `total_budget` (within 1e-6 in
/// the typical case), using the default 50-round bisection.
pub fn solve(total_budget: Amount, votes: &VoteMatrix) -> Allocation {
    solve_with(total_budget, votes, &BisectionConfig::default()).allocation
}

/// [`solve`] on raw rows; fails if the rows are empty or ragged.
pub fn compute_budget(total_budget: Amount, votes: &[Vec<f64>]) -> Result<Allocation, AllocationError> {
    let votes = VoteMatrix::try_from(votes)?;
    Ok(solve(total_budget, &votes))
}
