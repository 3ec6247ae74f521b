//! Fast approximation: per-section medians of the real votes, rescaled so
//! they add up to the total budget.
//!
//! One sort per section, no search. When the aggregation rule genuinely needs
//! virtual votes (raw medians are far from the total), the result can differ
//! from [`super::virtual_median::solve`]; treat it as a best-effort substitute.

use crate::error::AllocationError;
use crate::median::median;
use crate::types::{Allocation, Amount, TOLERANCE, VoteMatrix};

/// Plain median of each section, no virtual votes.
pub fn section_medians(votes: &VoteMatrix) -> Allocation {
    let mut pool = Vec::with_capacity(votes.citizens());
    (0..votes.sections())
        .map(|j| {
            pool.clear();
            pool.extend(votes.column(j));
            median(&mut pool).unwrap_or_default()
        })
        .collect()
}

/// Section medians scaled to sum to `total_budget`.
///
/// - medians already within 1e-6 of the total are returned untouched
/// - all-zero medians fall back to an even split `total / m`
/// - otherwise every median is multiplied by `total / sum`
pub fn solve_approx(total_budget: Amount, votes: &VoteMatrix) -> Allocation {
    let medians = section_medians(votes);
    let sum: f64 = medians.iter().sum();

    if (sum - total_budget).abs() < TOLERANCE {
        return medians;
    }
    if sum == 0.0 {
        let m = medians.len();
        return vec![total_budget / m as f64; m];
    }

    let factor = total_budget / sum;
    medians.into_iter().map(|x| x * factor).collect()
}

/// [`solve_approx`] on raw rows; fails if the rows are empty or ragged.
pub fn compute_budget_efficient(
    total_budget: Amount,
    votes: &[Vec<f64>],
) -> Result<Allocation, AllocationError> {
    let votes = VoteMatrix::try_from(votes)?;
    Ok(solve_approx(total_budget, &votes))
}
