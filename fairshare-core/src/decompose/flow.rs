//! Maximum flow over small directed networks with real capacities.
//!
//! [`MaxFlow`] is the seam the decomposability check talks to; [`EdmondsKarp`]
//! is the built-in engine.

use std::collections::VecDeque;

use crate::error::AllocationError;

/// Residual capacity below this is treated as saturated.
const RESIDUAL_EPS: f64 = 1e-12;

/// Index of an arc in insertion order.
pub type ArcId = usize;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arc {
    pub from: usize,
    pub to: usize,
    /// May be `f64::INFINITY` for unbounded arcs.
    pub capacity: f64,
}

/// Directed network on nodes `0..nodes`.
#[derive(Debug, Clone, Default)]
pub struct FlowNetwork {
    nodes: usize,
    arcs: Vec<Arc>,
}

impl FlowNetwork {
    pub fn new(nodes: usize) -> Self {
        Self {
            nodes,
            arcs: Vec::new(),
        }
    }

    /// Fails if either end is not a node of this network or the capacity is
    /// negative or NaN.
    pub fn add_arc(&mut self, from: usize, to: usize, capacity: f64) -> Result<ArcId, AllocationError> {
        if from >= self.nodes || to >= self.nodes {
            return Err(AllocationError::invalid(format!(
                "arc {from} -> {to} leaves a network of {} nodes",
                self.nodes
            )));
        }
        if capacity.is_nan() || capacity < 0.0 {
            return Err(AllocationError::invalid(format!(
                "arc {from} -> {to} has capacity {capacity}"
            )));
        }
        self.arcs.push(Arc { from, to, capacity });
        Ok(self.arcs.len() - 1)
    }

    pub fn nodes(&self) -> usize {
        self.nodes
    }

    pub fn arcs(&self) -> &[Arc] {
        &self.arcs
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowResult {
    /// Total flow leaving the source.
    pub value: f64,
    /// Flow on each arc, indexed by [`ArcId`].
    pub flows: Vec<f64>,
}

impl FlowResult {
    pub fn flow(&self, arc: ArcId) -> f64 {
        self.flows[arc]
    }
}

/// Maximum `source -> sink` flow.
pub trait MaxFlow {
    fn max_flow(&self, network: &FlowNetwork, source: usize, sink: usize) -> FlowResult;
}

/// Shortest augmenting paths (BFS Ford-Fulkerson). O(V * E^2).
#[derive(Debug, Clone, Copy, Default)]
pub struct EdmondsKarp;

impl MaxFlow for EdmondsKarp {
    fn max_flow(&self, network: &FlowNetwork, source: usize, sink: usize) -> FlowResult {
        let arcs = network.arcs();
        let mut flows = vec![0.0; arcs.len()];
        if source == sink || source >= network.nodes() || sink >= network.nodes() {
            return FlowResult { value: 0.0, flows };
        }

        // Residual edge 2i is arc i forward, 2i + 1 its reverse.
        let mut residual = Vec::with_capacity(2 * arcs.len());
        let mut head = Vec::with_capacity(2 * arcs.len());
        let mut adjacency = vec![Vec::new(); network.nodes()];
        for (i, arc) in arcs.iter().enumerate() {
            residual.push(arc.capacity);
            head.push(arc.to);
            adjacency[arc.from].push(2 * i);

            residual.push(0.0);
            head.push(arc.from);
            adjacency[arc.to].push(2 * i + 1);
        }

        let mut value = 0.0;
        let mut pred: Vec<Option<usize>> = vec![None; network.nodes()];
        loop {
            pred.iter_mut().for_each(|p| *p = None);
            let mut queue = VecDeque::from([source]);
            let mut reached = false;
            'bfs: while let Some(node) = queue.pop_front() {
                for &edge in &adjacency[node] {
                    let next = head[edge];
                    if next == source || pred[next].is_some() || residual[edge] <= RESIDUAL_EPS {
                        continue;
                    }
                    pred[next] = Some(edge);
                    if next == sink {
                        reached = true;
                        break 'bfs;
                    }
                    queue.push_back(next);
                }
            }
            if !reached {
                break;
            }

            let mut bottleneck = f64::INFINITY;
            let mut node = sink;
            while let Some(edge) = pred[node] {
                bottleneck = bottleneck.min(residual[edge]);
                node = head[edge ^ 1];
            }
            if bottleneck.is_infinite() {
                // Unbounded source -> sink path.
                value = f64::INFINITY;
                break;
            }

            let mut node = sink;
            while let Some(edge) = pred[node] {
                residual[edge] -= bottleneck;
                residual[edge ^ 1] += bottleneck;
                node = head[edge ^ 1];
            }
            value += bottleneck;
        }

        for (i, flow) in flows.iter_mut().enumerate() {
            *flow = residual[2 * i + 1];
        }
        FlowResult { value, flows }
    }
}
