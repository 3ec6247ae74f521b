//! Egalitarian division of divisible resources.
//!
//! Agents value resources linearly (`values[i][j]` per whole unit of `j`).
//! We pick shares `x[i][j]` maximizing the smallest agent utility:
//!
//! ```text
//! maximize   t
//! subject to sum_i x[i][j] <= 1          for every resource j
//!            sum_j v[i][j] x[i][j] >= t  for every agent i
//!            x >= 0
//! ```
//!
//! The LP may leave part of a resource unassigned when nobody needs it to
//! reach `t`. That remainder is handed to whoever values it most, so every
//! resource is fully divided and no utility goes down.

use good_lp::{Expression, Solution, SolverModel, Variable, default_solver, variable, variables};

use crate::error::AllocationError;
use crate::types::{check_non_negative, rectangular_width};

/// Leftover below this is treated as rounding noise.
const LEFTOVER_EPS: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct EgalitarianAllocation {
    /// `shares[i][j]`: fraction of resource `j` given to agent `i`. Columns sum to 1.
    pub shares: Vec<Vec<f64>>,
    /// Utility each agent gets from its shares.
    pub utilities: Vec<f64>,
    /// Smallest entry of `utilities`; the LP optimum.
    pub min_utility: f64,
}

/// Max-min fair shares for non-negative linear valuations.
pub fn max_min_allocation(values: &[Vec<f64>]) -> Result<EgalitarianAllocation, AllocationError> {
    let m = rectangular_width(values, "valuation matrix")?;
    check_non_negative(values, "values")?;
    let n = values.len();

    let mut vars = variables!();
    let t = vars.add(variable().min(0.0));
    let x: Vec<Vec<Variable>> = (0..n)
        .map(|_| (0..m).map(|_| vars.add(variable().min(0.0).max(1.0))).collect())
        .collect();

    let mut problem = vars.maximise(t).using(default_solver);

    for j in 0..m {
        let mut supply = Expression::default();
        for row in &x {
            supply.add_mul(1.0, row[j]);
        }
        problem = problem.with(supply.leq(1.0));
    }

    // t - utility_i <= 0
    for (row_values, row_vars) in values.iter().zip(&x) {
        let mut shortfall = Expression::default();
        shortfall.add_mul(1.0, t);
        for (&v, &var) in row_values.iter().zip(row_vars) {
            shortfall.add_mul(-v, var);
        }
        problem = problem.with(shortfall.leq(0.0));
    }

    let solution = problem
        .solve()
        .map_err(|e| AllocationError::Solver(e.to_string()))?;

    let mut shares: Vec<Vec<f64>> = x
        .iter()
        .map(|row| row.iter().map(|&var| solution.value(var).clamp(0.0, 1.0)).collect())
        .collect();
    hand_out_leftovers(values, &mut shares);

    let utilities: Vec<f64> = values
        .iter()
        .zip(&shares)
        .map(|(v, s)| v.iter().zip(s).map(|(a, b)| a * b).sum())
        .collect();
    let min_utility = utilities.iter().copied().fold(f64::INFINITY, f64::min);

    #[cfg(feature = "instrument")]
    tracing::info!(
        target: "egalitarian",
        agents = n as u64,
        resources = m as u64,
        lp_optimum = solution.value(t),
        min_utility = min_utility,
    );

    Ok(EgalitarianAllocation {
        shares,
        utilities,
        min_utility,
    })
}

/// Make every column sum to exactly 1.
///
/// Overshoot from solver noise is scaled away; any remainder is split evenly
/// among the agents tied for the highest value on that resource.
fn hand_out_leftovers(values: &[Vec<f64>], shares: &mut [Vec<f64>]) {
    let m = values.first().map_or(0, Vec::len);
    for j in 0..m {
        let assigned: f64 = shares.iter().map(|row| row[j]).sum();
        if assigned > 1.0 {
            shares.iter_mut().for_each(|row| row[j] /= assigned);
            continue;
        }
        let leftover = 1.0 - assigned;
        if leftover <= LEFTOVER_EPS {
            continue;
        }

        let best = values
            .iter()
            .map(|row| row[j])
            .fold(f64::NEG_INFINITY, f64::max);
        let winners: Vec<usize> = (0..values.len()).filter(|&i| values[i][j] == best).collect();
        let portion = leftover / winners.len() as f64;
        for i in winners {
            shares[i][j] += portion;
        }
    }
}

/// One line per agent, e.g. `Agent #1 gets 0.53 of resource #1, 1.00 of resource #2.`
pub fn describe(allocation: &EgalitarianAllocation) -> Vec<String> {
    allocation
        .shares
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let parts: Vec<String> = row
                .iter()
                .enumerate()
                .map(|(j, share)| format!("{share:.2} of resource #{}", j + 1))
                .collect();
            format!("Agent #{} gets {}.", i + 1, parts.join(", "))
        })
        .collect()
}
