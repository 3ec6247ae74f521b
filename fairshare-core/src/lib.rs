//! Fair-division routines: budget aggregation by generalized medians, budget
//! decomposability, egalitarian division and Fisher market equilibrium.

use wasm_bindgen::prelude::*;

pub mod budget;
pub mod decompose;
pub mod egalitarian;
pub mod error;
pub mod market;
pub mod median;
mod report;
pub mod types;

pub use budget::*;
pub use decompose::{Decomposition, EdmondsKarp, MaxFlow, is_decomposable, is_decomposable_with};
pub use egalitarian::*;
pub use error::*;
pub use market::*;
pub use report::*;
pub use types::*;

#[cfg(feature = "instrument")]
pub use instrument;

// ============================================================================
// WASM API
// ============================================================================

#[wasm_bindgen]
pub struct Allocator {
    bisection: BisectionConfig,
    market: MarketConfig,
}

#[wasm_bindgen]
impl Allocator {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        // Better panic messages in browser console
        console_error_panic_hook::set_once();

        Self {
            bisection: BisectionConfig::default(),
            market: MarketConfig::default(),
        }
    }

    /// Cap on virtual-median bisection rounds (default 50).
    #[wasm_bindgen]
    pub fn set_bisection_rounds(&mut self, rounds: u32) {
        self.bisection.max_rounds = rounds;
    }

    /// Cap on proportional-response bidding rounds (default 10 000).
    #[wasm_bindgen]
    pub fn set_market_rounds(&mut self, rounds: u32) {
        self.market.max_rounds = rounds;
    }

    /// Generalized median with virtual votes
    #[wasm_bindgen]
    pub fn aggregate_budget(&self, request: BudgetRequest) -> Result<BudgetReport, JsError> {
        self.run_budget(&request).map_err(to_js)
    }

    /// Normalized per-section medians
    #[wasm_bindgen]
    pub fn aggregate_budget_approx(&self, request: BudgetRequest) -> Result<BudgetReport, JsError> {
        self.run_budget_approx(&request).map_err(to_js)
    }

    /// Parse a `{"total_budget": .., "votes": [[..], ..]}` document and aggregate it
    #[wasm_bindgen]
    pub fn aggregate_budget_json(&self, request_json: &str) -> Result<BudgetReport, JsError> {
        BudgetRequest::from_json(request_json)
            .and_then(|request| self.run_budget(&request))
            .map_err(to_js)
    }

    #[wasm_bindgen]
    pub fn check_decomposable(&self, request: DecompositionRequest) -> Result<DecompositionReport, JsError> {
        self.run_decomposition(&request).map_err(to_js)
    }

    #[wasm_bindgen]
    pub fn allocate_max_min(&self, values: Vec<f64>, agents: usize) -> Result<EgalitarianReport, JsError> {
        rows_from_flat(values, agents)
            .and_then(|rows| self.run_max_min(&rows))
            .map_err(to_js)
    }

    #[wasm_bindgen]
    pub fn market_equilibrium(&self, request: MarketRequest) -> Result<MarketReport, JsError> {
        self.run_market(&request).map_err(to_js)
    }
}

impl Default for Allocator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Native entry points behind the WASM API
// ============================================================================

impl Allocator {
    pub fn run_budget(&self, request: &BudgetRequest) -> Result<BudgetReport, AllocationError> {
        let votes = request.vote_matrix()?;
        let outcome = solve_with(request.total_budget, &votes, &self.bisection);
        Ok(BudgetReport::from_outcome(outcome))
    }

    pub fn run_budget_approx(&self, request: &BudgetRequest) -> Result<BudgetReport, AllocationError> {
        let votes = request.vote_matrix()?;
        Ok(BudgetReport::from_approximation(solve_approx(
            request.total_budget,
            &votes,
        )))
    }

    pub fn run_decomposition(
        &self,
        request: &DecompositionRequest,
    ) -> Result<DecompositionReport, AllocationError> {
        is_decomposable(&request.budget, &request.preference_sets()).map(Into::into)
    }

    pub fn run_max_min(&self, values: &[Vec<f64>]) -> Result<EgalitarianReport, AllocationError> {
        max_min_allocation(values).map(Into::into)
    }

    pub fn run_market(&self, request: &MarketRequest) -> Result<MarketReport, AllocationError> {
        equilibrium(&request.values, &request.budgets, &self.market).map(Into::into)
    }
}

/// Row-major flat buffer -> `agents` rows.
fn rows_from_flat(values: Vec<f64>, agents: usize) -> Result<Vec<Vec<f64>>, AllocationError> {
    if agents == 0 || values.is_empty() || values.len() % agents != 0 {
        return Err(AllocationError::invalid(format!(
            "{} values cannot be split into {agents} equal rows",
            values.len()
        )));
    }
    let width = values.len() / agents;
    Ok(values.chunks(width).map(<[f64]>::to_vec).collect())
}

fn to_js(err: AllocationError) -> JsError {
    JsError::new(&err.to_string())
}
