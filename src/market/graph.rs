//! Market graph construction.
//!
//! Tokens are nodes, pools are directed edges (one per trade direction),
//! weighted by -ln(fee-adjusted rate) so that a negative-weight cycle is a
//! profitable loop. Rates outside sane bounds are rejected before they can
//! manufacture phantom trillion-dollar cycles.

use alloy_primitives::Address;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::pool::{PoolState, TradeDirection};

const MAX_REASONABLE_RATE: f64 = 1e9;
const MIN_REASONABLE_RATE: f64 = 1e-12;

/// Edge payload: everything a search strategy needs to quote the hop later
/// without touching the data store.
#[derive(Debug, Clone)]
pub struct EdgeData {
    pub pool: PoolState,
    pub direction: TradeDirection,
    /// -ln(effective rate); negative-sum cycles are profitable.
    pub weight: f64,
    pub quality: f64,
}

pub struct MarketGraph {
    pub graph: DiGraph<Address, EdgeData>,
    token_to_node: HashMap<Address, NodeIndex>,
    node_to_token: HashMap<NodeIndex, Address>,
}

impl MarketGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            token_to_node: HashMap::new(),
            node_to_token: HashMap::new(),
        }
    }

    /// Build the graph from a pool snapshot, restricted to the requested
    /// token set. Does not mutate the caller's token list.
    pub fn build(pools: &[PoolState], tokens: &[Address]) -> Self {
        let mut graph = Self::new();
        let mut skipped = 0usize;

        for pool in pools {
            let in_scope = tokens.contains(&pool.token0.address)
                && tokens.contains(&pool.token1.address);
            if !in_scope {
                continue;
            }
            if !graph.add_pool(pool) {
                skipped += 1;
            }
        }

        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            skipped,
            "market graph built"
        );
        graph
    }

    /// Add both directed edges for a pool. Returns false if the pool's
    /// rates fail the sanity checks.
    pub fn add_pool(&mut self, pool: &PoolState) -> bool {
        if pool.liquidity.is_zero() || pool.reserve0.is_zero() || pool.reserve1.is_zero() {
            return false;
        }

        let mut added = false;
        for direction in [TradeDirection::ZeroForOne, TradeDirection::OneForZero] {
            let rate = pool.effective_rate(direction);
            if rate <= 0.0 || !rate.is_finite() {
                continue;
            }
            if !(MIN_REASONABLE_RATE..=MAX_REASONABLE_RATE).contains(&rate) {
                warn!(
                    pool = %pool.address,
                    rate,
                    "rate outside sane bounds, likely a decimal mismatch"
                );
                continue;
            }

            let weight = -rate.ln();
            if !weight.is_finite() {
                continue;
            }

            let (token_in, token_out) = pool.oriented_tokens(direction);
            let from = self.get_or_create_node(token_in.address);
            let to = self.get_or_create_node(token_out.address);
            self.graph.add_edge(
                from,
                to,
                EdgeData {
                    pool: pool.clone(),
                    direction,
                    weight,
                    quality: pool.quality,
                },
            );
            added = true;
        }
        added
    }

    fn get_or_create_node(&mut self, token: Address) -> NodeIndex {
        if let Some(&node) = self.token_to_node.get(&token) {
            return node;
        }
        let node = self.graph.add_node(token);
        self.token_to_node.insert(token, node);
        self.node_to_token.insert(node, token);
        node
    }

    pub fn node_for(&self, token: Address) -> Option<NodeIndex> {
        self.token_to_node.get(&token).copied()
    }

    pub fn token_for(&self, node: NodeIndex) -> Option<Address> {
        self.node_to_token.get(&node).copied()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Rebuild keeping only edges that pass the predicate. Isolated nodes
    /// are dropped with their edges.
    pub fn retain_edges<F>(&self, mut keep: F) -> MarketGraph
    where
        F: FnMut(&EdgeData) -> bool,
    {
        let mut pruned = MarketGraph::new();
        for edge in self.graph.edge_references() {
            if !keep(edge.weight()) {
                continue;
            }
            let from_token = self.node_to_token[&edge.source()];
            let to_token = self.node_to_token[&edge.target()];
            let from = pruned.get_or_create_node(from_token);
            let to = pruned.get_or_create_node(to_token);
            pruned.graph.add_edge(from, to, edge.weight().clone());
        }
        pruned
    }
}

impl Default for MarketGraph {
    fn default() -> Self {
        Self::new()
    }
}
