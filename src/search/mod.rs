//! Path search strategies.
//!
//! Every strategy answers the same contract: given a pruned graph, a set of
//! start tokens and a hop budget, return closed candidate cycles ordered by
//! descending provisional net profit (ties: fewer hops, then less
//! cumulative slippage). The strategy is resolved once per scan cycle into
//! a concrete variant; nothing in the hot path compares strings.

mod bellman_ford;
mod bfs;
mod dfs;
mod path;

pub use bellman_ford::BellmanFordSearch;
pub use bfs::BfsSearch;
pub use dfs::DfsSearch;
pub use path::{
    dedup_paths, signed_delta, sort_paths, ArbitragePath, Hop, GAS_BASE_OVERHEAD, GAS_PER_HOP,
};

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RejectReason;
use crate::evaluate::net_profit_wei;
use crate::market::{EdgeData, MarketGraph};
use crate::slippage::{self, ImpactLevel, SlippageModel};

/// Graph-size thresholds for the auto selector. Below both limits the
/// exhaustive breadth-first pass is affordable; above either, the layered
/// relaxation scales better.
const AUTO_NODE_LIMIT: usize = 48;
const AUTO_EDGE_LIMIT: usize = 192;

/// Configured strategy. `Auto` resolves by graph size, statically per scan
/// cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    Bfs,
    Dfs,
    BellmanFord,
    #[default]
    Auto,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Bfs => write!(f, "bfs"),
            Strategy::Dfs => write!(f, "dfs"),
            Strategy::BellmanFord => write!(f, "bellman-ford"),
            Strategy::Auto => write!(f, "auto"),
        }
    }
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bfs" => Ok(Strategy::Bfs),
            "dfs" => Ok(Strategy::Dfs),
            "bellman-ford" | "bellman_ford" => Ok(Strategy::BellmanFord),
            "auto" => Ok(Strategy::Auto),
            other => Err(format!("unknown strategy: {other}")),
        }
    }
}

/// Concrete algorithm after auto-resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedStrategy {
    Bfs,
    Dfs,
    BellmanFord,
}

impl std::fmt::Display for ResolvedStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolvedStrategy::Bfs => write!(f, "bfs"),
            ResolvedStrategy::Dfs => write!(f, "dfs"),
            ResolvedStrategy::BellmanFord => write!(f, "bellman-ford"),
        }
    }
}

impl Strategy {
    pub fn resolve(self, graph: &MarketGraph) -> ResolvedStrategy {
        match self {
            Strategy::Bfs => ResolvedStrategy::Bfs,
            Strategy::Dfs => ResolvedStrategy::Dfs,
            Strategy::BellmanFord => ResolvedStrategy::BellmanFord,
            Strategy::Auto => {
                if graph.node_count() <= AUTO_NODE_LIMIT && graph.edge_count() <= AUTO_EDGE_LIMIT {
                    ResolvedStrategy::Bfs
                } else {
                    ResolvedStrategy::BellmanFord
                }
            }
        }
    }
}

/// Everything a strategy needs for one search pass. The graph is frozen for
/// the duration; searching a mutating graph is not supported.
pub struct SearchContext<'a> {
    pub graph: &'a MarketGraph,
    pub start_amount: U256,
    pub max_hops: usize,
    pub max_cumulative_slippage: f64,
    pub model: SlippageModel,
    /// Provisional gas price used only to order candidates; the evaluator
    /// and validator re-price against live quotes.
    pub gas_price_wei: u128,
    pub tithe_bps: u32,
}

/// Run the resolved strategy and normalize its output: structural
/// validation, slippage ceiling, dedup, deterministic ordering.
pub fn run(
    strategy: ResolvedStrategy,
    ctx: &SearchContext<'_>,
    start_tokens: &[Address],
) -> Vec<ArbitragePath> {
    let raw = match strategy {
        ResolvedStrategy::Bfs => BfsSearch.search(ctx, start_tokens),
        ResolvedStrategy::Dfs => DfsSearch.search(ctx, start_tokens),
        ResolvedStrategy::BellmanFord => BellmanFordSearch.search(ctx, start_tokens),
    };

    let before = raw.len();
    // Losing cycles go before dedup: a losing rotation must not shadow the
    // profitable traversal of the same pool set.
    let survivors: Vec<ArbitragePath> = raw
        .into_iter()
        .filter(|p| p.is_valid_cycle())
        .filter(|p| p.gross_profit > 0)
        .filter(|p| p.hop_count() <= ctx.max_hops)
        .filter(|p| {
            let ok = p.cumulative_slippage <= ctx.max_cumulative_slippage;
            if !ok {
                debug!(
                    slippage = p.cumulative_slippage,
                    "candidate discarded: {}",
                    RejectReason::ExceedsSlippage
                );
            }
            ok
        })
        .collect();
    let mut paths = dedup_paths(survivors);

    paths.sort_by(|a, b| {
        let net_a = net_profit_wei(a.gross_profit, a.gas_estimate, ctx.gas_price_wei, ctx.tithe_bps);
        let net_b = net_profit_wei(b.gross_profit, b.gas_estimate, ctx.gas_price_wei, ctx.tithe_bps);
        net_b
            .cmp(&net_a)
            .then(a.hop_count().cmp(&b.hop_count()))
            .then(
                a.cumulative_slippage
                    .partial_cmp(&b.cumulative_slippage)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
    });

    debug!(
        strategy = %strategy,
        found = before,
        kept = paths.len(),
        "search pass complete"
    );
    paths
}

/// Quote one edge at the running amount and wrap it as a hop. Errors mean
/// the hop (and any path through it) is disqualified.
pub(crate) fn extend_hop(
    edge: &EdgeData,
    token_in: Address,
    token_out: Address,
    amount_in: U256,
    model: &SlippageModel,
) -> Result<(Hop, f64, bool), RejectReason> {
    let quote = slippage::quote(&edge.pool, edge.direction, amount_in)?;
    let flagged = matches!(model.check(quote.price_impact)?, ImpactLevel::Flagged);
    let hop = Hop {
        pool: edge.pool.address,
        dex: edge.pool.dex,
        token_in,
        token_out,
        amount_in,
        amount_out: quote.amount_out,
        price_impact: quote.price_impact,
        gas_estimate: GAS_PER_HOP,
    };
    Ok((hop, edge.pool.spot_rate(edge.direction), flagged))
}

/// Assemble a finished path from accumulated hops.
pub(crate) fn close_path(
    hops: Vec<Hop>,
    spot_rates: &[f64],
    start_amount: U256,
    flagged: bool,
) -> ArbitragePath {
    let final_amount = hops.last().map(|h| h.amount_out).unwrap_or(start_amount);
    let cumulative = slippage::cumulative_slippage(spot_rates, start_amount, final_amount);
    ArbitragePath::new(hops, start_amount, cumulative, flagged)
}
