use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::budget::BisectionOutcome;
use crate::decompose::Decomposition;
use crate::egalitarian::{EgalitarianAllocation, describe};
use crate::error::AllocationError;
use crate::market::MarketEquilibrium;
use crate::types::VoteMatrix;

// ============================================================================
// Requests from JS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct BudgetRequest {
    pub total_budget: f64,
    pub votes: Vec<Vec<f64>>,
}

impl BudgetRequest {
    pub fn from_json(json: &str) -> Result<Self, AllocationError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn vote_matrix(&self) -> Result<VoteMatrix, AllocationError> {
        VoteMatrix::try_from(self.votes.as_slice())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct DecompositionRequest {
    pub budget: Vec<f64>,
    /// Topics each citizen is willing to fund.
    pub preferences: Vec<Vec<usize>>,
}

impl DecompositionRequest {
    pub fn preference_sets(&self) -> Vec<BTreeSet<usize>> {
        self.preferences
            .iter()
            .map(|topics| topics.iter().copied().collect())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct MarketRequest {
    pub values: Vec<Vec<f64>>,
    pub budgets: Vec<f64>,
}

// ============================================================================
// Reports to JS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct BudgetReport {
    pub allocation: Vec<f64>,
    pub total: f64,
    /// Virtual-vote parameter; absent for the normalized approximation.
    pub t: Option<f64>,
    pub rounds: u32,
    pub converged: bool,
}

impl BudgetReport {
    pub fn from_outcome(outcome: BisectionOutcome) -> Self {
        let total = outcome.allocation.iter().sum();
        Self {
            allocation: outcome.allocation,
            total,
            t: Some(outcome.t),
            rounds: outcome.rounds,
            converged: outcome.converged,
        }
    }

    /// Report for a one-pass result that hits its total by construction.
    pub fn from_approximation(allocation: Vec<f64>) -> Self {
        let total = allocation.iter().sum();
        Self {
            allocation,
            total,
            t: None,
            rounds: 0,
            converged: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct DecompositionReport {
    pub decomposable: bool,
    pub flow_value: f64,
    pub payments: Vec<Vec<f64>>,
}

impl From<Decomposition> for DecompositionReport {
    fn from(d: Decomposition) -> Self {
        Self {
            decomposable: d.decomposable,
            flow_value: d.flow_value,
            payments: d.payments,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct EgalitarianReport {
    pub shares: Vec<Vec<f64>>,
    pub utilities: Vec<f64>,
    pub min_utility: f64,
    /// Human-readable summary, one line per agent.
    pub lines: Vec<String>,
}

impl From<EgalitarianAllocation> for EgalitarianReport {
    fn from(a: EgalitarianAllocation) -> Self {
        let lines = describe(&a);
        Self {
            shares: a.shares,
            utilities: a.utilities,
            min_utility: a.min_utility,
            lines,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct MarketReport {
    pub allocation: Vec<Vec<f64>>,
    pub prices: Vec<f64>,
    pub rounds: u32,
    pub converged: bool,
}

impl From<MarketEquilibrium> for MarketReport {
    fn from(eq: MarketEquilibrium) -> Self {
        Self {
            allocation: eq.allocation,
            prices: eq.prices,
            rounds: eq.rounds,
            converged: eq.converged,
        }
    }
}
