//! Competitive equilibrium of a linear Fisher market.
//!
//! Buyers hold budgets `B[i]` and value divisible goods linearly. Equilibrium
//! prices and allocations coincide with the optimum of the Eisenberg-Gale
//! program `max sum_i B[i] * ln(u_i)` over feasible allocations.
//!
//! We reach it with proportional-response bidding:
//! - price of a good = sum of bids on it
//! - each buyer receives goods in proportion to their bids
//! - next round, each buyer re-splits their whole budget in proportion to the
//!   utility each good just delivered
//!
//! Bids keep summing to each buyer's budget, so prices always add up to the
//! money in the market.

use crate::error::AllocationError;
use crate::types::{Amount, check_non_negative, rectangular_width};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketConfig {
    /// Hard cap on bidding rounds.
    pub max_rounds: u32,
    /// Stop once no bid moves by more than this.
    pub tolerance: f64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            max_rounds: 10_000,
            tolerance: 1e-10,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketEquilibrium {
    /// `allocation[i][j]`: fraction of good `j` held by buyer `i`.
    pub allocation: Vec<Vec<f64>>,
    /// Price per good. Goods nobody values clear at zero.
    pub prices: Vec<Amount>,
    pub rounds: u32,
    /// False when `max_rounds` ran out before bids settled.
    pub converged: bool,
}

impl MarketEquilibrium {
    /// Buyer's utility under `values`, or `None` if either table lacks that
    /// buyer or the row widths disagree.
    pub fn utility(&self, values: &[Vec<f64>], buyer: usize) -> Option<f64> {
        let row = values.get(buyer)?;
        let held = self.allocation.get(buyer)?;
        if row.len() != held.len() {
            return None;
        }
        Some(row.iter().zip(held).map(|(v, x)| v * x).sum())
    }
}

/// Eisenberg-Gale objective `sum_i B[i] * ln(u_i)` for an allocation.
///
/// Buyers with zero budget contribute nothing; a funded buyer with zero utility
/// sends the objective to negative infinity.
pub fn eisenberg_gale_objective(values: &[Vec<f64>], budgets: &[Amount], allocation: &[Vec<f64>]) -> f64 {
    values
        .iter()
        .zip(budgets)
        .zip(allocation)
        .filter(|((_, b), _)| **b > 0.0)
        .map(|((v, b), x)| {
            let u: f64 = v.iter().zip(x).map(|(a, b)| a * b).sum();
            b * u.ln()
        })
        .sum()
}

/// Equilibrium allocation and prices for `values` and `budgets`.
pub fn equilibrium(
    values: &[Vec<f64>],
    budgets: &[Amount],
    cfg: &MarketConfig,
) -> Result<MarketEquilibrium, AllocationError> {
    if values.len() != budgets.len() {
        return Err(AllocationError::invalid(format!(
            "mismatch in agents and budget sizes: {} agents, {} budgets",
            values.len(),
            budgets.len()
        )));
    }
    let m = rectangular_width(values, "valuation matrix")?;
    check_non_negative(values, "values")?;
    if let Some((i, b)) = budgets.iter().enumerate().find(|(_, b)| !b.is_finite() || **b < 0.0) {
        return Err(AllocationError::invalid(format!(
            "budget of agent {i} = {b} must be finite and non-negative"
        )));
    }
    for (i, (row, &budget)) in values.iter().zip(budgets).enumerate() {
        if budget > 0.0 && row.iter().all(|&v| v == 0.0) {
            return Err(AllocationError::invalid(format!(
                "agent {i} has money but values no good"
            )));
        }
    }

    let mut bids = initial_bids(values, budgets);
    let mut rounds = 0;
    let mut converged = false;
    while rounds < cfg.max_rounds {
        let prices = prices_from(&bids, m);
        let next = respond(values, budgets, &bids, &prices);
        let change = bids
            .iter()
            .flatten()
            .zip(next.iter().flatten())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        bids = next;
        rounds += 1;

        #[cfg(feature = "instrument")]
        tracing::info!(target: "market", round = rounds, max_bid_change = change);

        if change < cfg.tolerance {
            converged = true;
            break;
        }
    }

    let prices = prices_from(&bids, m);
    let n = values.len();
    let allocation = bids
        .iter()
        .map(|row| {
            row.iter()
                .zip(&prices)
                .map(|(&b, &p)| if p > 0.0 { b / p } else { 1.0 / n as f64 })
                .collect()
        })
        .collect();

    #[cfg(feature = "instrument")]
    tracing::info!(
        target: "market_result",
        rounds = rounds,
        converged = converged,
        revenue = prices.iter().sum::<f64>(),
    );

    Ok(MarketEquilibrium {
        allocation,
        prices,
        rounds,
        converged,
    })
}

/// Each buyer spreads their budget in proportion to their values.
fn initial_bids(values: &[Vec<f64>], budgets: &[Amount]) -> Vec<Vec<Amount>> {
    values
        .iter()
        .zip(budgets)
        .map(|(row, &budget)| {
            let total: f64 = row.iter().sum();
            if budget <= 0.0 || total <= 0.0 {
                return vec![0.0; row.len()];
            }
            row.iter().map(|v| budget * v / total).collect()
        })
        .collect()
}

fn prices_from(bids: &[Vec<Amount>], goods: usize) -> Vec<Amount> {
    (0..goods).map(|j| bids.iter().map(|row| row[j]).sum()).collect()
}

/// One proportional-response round.
fn respond(values: &[Vec<f64>], budgets: &[Amount], bids: &[Vec<Amount>], prices: &[Amount]) -> Vec<Vec<Amount>> {
    values
        .iter()
        .zip(budgets)
        .zip(bids)
        .map(|((row, &budget), own)| {
            // utility_j = v_ij * x_ij
            let gains: Vec<f64> = row
                .iter()
                .zip(own)
                .zip(prices)
                .map(|((v, b), p)| if *p > 0.0 { v * b / p } else { 0.0 })
                .collect();
            let utility: f64 = gains.iter().sum();
            if budget <= 0.0 || utility <= 0.0 {
                return own.clone();
            }
            gains.iter().map(|g| budget * g / utility).collect()
        })
        .collect()
}
