//! Budget decomposability.
//!
//! A budget is decomposable when it can be paid for by the citizens so that:
//! - every topic receives exactly its allocated amount
//! - every citizen pays the same share, `total / n`
//! - nobody pays toward a topic they do not support
//!
//! This reduces to max-flow on source -> citizens -> topics -> sink.

pub mod flow;

use std::collections::BTreeSet;

pub use flow::*;

use crate::error::AllocationError;
use crate::types::{Amount, TOLERANCE};

/// Verdict plus the payment plan the max-flow found.
#[derive(Debug, Clone, PartialEq)]
pub struct Decomposition {
    pub decomposable: bool,
    /// Money that could be routed from citizens to topics.
    pub flow_value: Amount,
    /// `payments[i][j]`: amount citizen `i` pays toward topic `j`.
    /// Empty in the trivial case (no citizens, no topics or zero budget).
    pub payments: Vec<Vec<Amount>>,
}

impl Decomposition {
    fn trivial() -> Self {
        Self {
            decomposable: true,
            flow_value: 0.0,
            payments: Vec::new(),
        }
    }

    /// Total paid by citizen `i`.
    pub fn paid_by(&self, citizen: usize) -> Amount {
        self.payments.get(citizen).map(|row| row.iter().sum()).unwrap_or(0.0)
    }

    /// Total received by topic `j`.
    pub fn received_by(&self, topic: usize) -> Amount {
        self.payments
            .iter()
            .map(|row| row.get(topic).copied().unwrap_or(0.0))
            .sum()
    }
}

/// Check decomposability with the built-in [`EdmondsKarp`] engine.
///
/// `preferences[i]` is the set of topic indices citizen `i` is willing to fund.
pub fn is_decomposable(
    budget: &[Amount],
    preferences: &[BTreeSet<usize>],
) -> Result<Decomposition, AllocationError> {
    is_decomposable_with(&EdmondsKarp, budget, preferences)
}

/// Check decomposability with a caller-supplied max-flow engine.
pub fn is_decomposable_with(
    engine: &impl MaxFlow,
    budget: &[Amount],
    preferences: &[BTreeSet<usize>],
) -> Result<Decomposition, AllocationError> {
    let n = preferences.len();
    let m = budget.len();

    if let Some((j, b)) = budget.iter().enumerate().find(|(_, b)| !b.is_finite() || **b < 0.0) {
        return Err(AllocationError::invalid(format!(
            "budget[{j}] = {b} must be finite and non-negative"
        )));
    }
    for (i, prefs) in preferences.iter().enumerate() {
        if let Some(&j) = prefs.iter().find(|&&j| j >= m) {
            return Err(AllocationError::invalid(format!(
                "citizen {i} supports topic {j}, but there are only {m} topics"
            )));
        }
    }

    let total: Amount = budget.iter().sum();
    if n == 0 || m == 0 || total == 0.0 {
        return Ok(Decomposition::trivial());
    }

    // Node layout: source, citizens, topics, sink.
    let source = 0;
    let citizen_node = |i: usize| 1 + i;
    let topic_node = |j: usize| 1 + n + j;
    let sink = 1 + n + m;

    let share = total / n as f64;
    let mut network = FlowNetwork::new(n + m + 2);
    for i in 0..n {
        network.add_arc(source, citizen_node(i), share)?;
    }
    let mut payment_arcs = Vec::new();
    for (i, prefs) in preferences.iter().enumerate() {
        for &j in prefs {
            let arc = network.add_arc(citizen_node(i), topic_node(j), f64::INFINITY)?;
            payment_arcs.push((i, j, arc));
        }
    }
    for (j, &amount) in budget.iter().enumerate() {
        network.add_arc(topic_node(j), sink, amount)?;
    }

    let result = engine.max_flow(&network, source, sink);

    let mut payments = vec![vec![0.0; m]; n];
    for (i, j, arc) in payment_arcs {
        payments[i][j] = result.flow(arc);
    }
    // Rounding in the flow grows with the amounts involved.
    let decomposable = result.value >= total - TOLERANCE * total.max(1.0);

    #[cfg(feature = "instrument")]
    tracing::info!(
        target: "decomposition",
        citizens = n as u64,
        topics = m as u64,
        total = total,
        flow_value = result.value,
        decomposable = decomposable,
    );

    Ok(Decomposition {
        decomposable,
        flow_value: result.value,
        payments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefs(sets: &[&[usize]]) -> Vec<BTreeSet<usize>> {
        sets.iter().map(|s| s.iter().copied().collect()).collect()
    }

    #[test]
    fn classic_example_is_decomposable() {
        let budget = [400.0, 50.0, 50.0, 0.0];
        let preferences = prefs(&[&[0, 1], &[0, 2], &[0, 3], &[1, 2], &[0]]);
        let d = is_decomposable(&budget, &preferences).unwrap();
        assert!(d.decomposable);
        assert!((d.flow_value - 500.0).abs() < 1e-9);

        // Citizen 3 only supports topics 1 and 2, which together need exactly 100.
        assert!((d.payments[3][1] - 50.0).abs() < 1e-9);
        assert!((d.payments[3][2] - 50.0).abs() < 1e-9);
    }

    #[test]
    fn nobody_willing_to_pay_is_not_decomposable() {
        let d = is_decomposable(&[10.0, 20.0], &prefs(&[&[], &[]])).unwrap();
        assert!(!d.decomposable);
        assert_eq!(d.flow_value, 0.0);
    }

    #[test]
    fn partial_support_can_still_cover_everything() {
        let d = is_decomposable(&[50.0, 50.0], &prefs(&[&[0, 1], &[0], &[1]])).unwrap();
        assert!(d.decomposable);
        for i in 0..3 {
            assert!((d.paid_by(i) - 100.0 / 3.0).abs() < 1e-9);
        }
        assert!((d.received_by(0) - 50.0).abs() < 1e-9);
        assert!((d.received_by(1) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn unsupported_topic_blocks_decomposition() {
        let d = is_decomposable(&[20.0, 30.0], &prefs(&[&[0], &[0]])).unwrap();
        assert!(!d.decomposable);
        assert!((d.flow_value - 20.0).abs() < 1e-9);
    }

    #[test]
    fn huge_budget_with_full_support_is_decomposable() {
        for scale in [1e9, 1e12, 1e15] {
            let budget = [0.1 * scale, 0.2 * scale, 0.7 * scale];
            let everyone = vec![&[0, 1, 2][..]; 7];
            let d = is_decomposable(&budget, &prefs(&everyone)).unwrap();
            assert!(d.decomposable, "scale {scale}: flow {} short of {}", d.flow_value, scale);
        }
    }

    #[test]
    fn relative_margin_still_rejects_real_shortfalls() {
        let budget = [2e11, 3e11];
        let d = is_decomposable(&budget, &prefs(&[&[0], &[0]])).unwrap();
        assert!(!d.decomposable);
        assert!((d.flow_value - 2e11).abs() < 1.0);
    }

    #[test]
    fn zero_budget_is_trivially_decomposable() {
        let d = is_decomposable(&[0.0, 0.0, 0.0], &prefs(&[&[], &[]])).unwrap();
        assert!(d.decomposable);
        assert!(d.payments.is_empty());
    }

    #[test]
    fn out_of_range_topic_is_rejected() {
        let err = is_decomposable(&[10.0], &prefs(&[&[0, 3]])).unwrap_err();
        assert!(err.to_string().contains("topic 3"));
    }

    #[test]
    fn negative_budget_is_rejected() {
        assert!(is_decomposable(&[10.0, -1.0], &prefs(&[&[0, 1]])).is_err());
    }
}
