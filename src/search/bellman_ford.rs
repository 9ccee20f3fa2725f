//! Bounded Bellman-Ford negative-cycle detection.
//!
//! Edge weights are -ln(fee-adjusted rate), so a cycle whose weights sum
//! negative multiplies rates above 1.0: a profitable loop. Relaxation is
//! layered, one round per allowed hop, which both bounds the search by the
//! hop budget and makes walk reconstruction unambiguous. Reconstructed
//! walks that are not simple cycles are discarded downstream.

use alloy_primitives::Address;
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use super::path::{ArbitragePath, Hop};
use super::{close_path, extend_hop, SearchContext};

/// Guard against float noise promoting a break-even loop to "negative".
const NEGATIVE_EPS: f64 = 1e-12;

pub struct BellmanFordSearch;

impl BellmanFordSearch {
    pub fn search(&self, ctx: &SearchContext<'_>, start_tokens: &[Address]) -> Vec<ArbitragePath> {
        let mut cycles = Vec::new();
        for &token in start_tokens {
            self.search_from(ctx, token, &mut cycles);
        }
        cycles
    }

    fn search_from(
        &self,
        ctx: &SearchContext<'_>,
        start_token: Address,
        cycles: &mut Vec<ArbitragePath>,
    ) {
        let Some(start) = ctx.graph.node_for(start_token) else {
            return;
        };
        let graph = &ctx.graph.graph;
        let n = graph.node_count();
        if n == 0 || ctx.max_hops < 2 {
            return;
        }

        // dist[k][v]: cheapest walk weight start -> v using exactly k edges;
        // parent[k][v]: the edge that achieved it.
        let mut dist = vec![vec![f64::INFINITY; n]; ctx.max_hops + 1];
        let mut parent: Vec<Vec<Option<EdgeIndex>>> = vec![vec![None; n]; ctx.max_hops + 1];
        dist[0][start.index()] = 0.0;

        for k in 1..=ctx.max_hops {
            for edge in graph.edge_references() {
                let u = edge.source().index();
                let v = edge.target().index();
                let through = dist[k - 1][u] + edge.weight().weight;
                if through.is_finite() && through < dist[k][v] {
                    dist[k][v] = through;
                    parent[k][v] = Some(edge.id());
                }
            }
        }

        // A closing edge u -> start that leaves the total negative marks an
        // arbitrage walk of k hops.
        for k in 2..=ctx.max_hops {
            for closing in graph.edges_directed(start, Direction::Incoming) {
                let u = closing.source();
                if u == start {
                    continue;
                }
                let total = dist[k - 1][u.index()] + closing.weight().weight;
                if !total.is_finite() || total >= -NEGATIVE_EPS {
                    continue;
                }
                let Some(mut edge_seq) = self.reconstruct(ctx, &parent, k - 1, start, u) else {
                    continue;
                };
                edge_seq.push(closing.id());
                if let Some(path) = self.assemble(ctx, &edge_seq) {
                    cycles.push(path);
                }
            }
        }
    }

    /// Walk the layered parents back from `v` at layer `k` to the source.
    fn reconstruct(
        &self,
        ctx: &SearchContext<'_>,
        parent: &[Vec<Option<EdgeIndex>>],
        k: usize,
        start: NodeIndex,
        v: NodeIndex,
    ) -> Option<Vec<EdgeIndex>> {
        let graph = &ctx.graph.graph;
        let mut edges = Vec::with_capacity(k);
        let mut node = v;
        for layer in (1..=k).rev() {
            let edge = parent[layer][node.index()]?;
            edges.push(edge);
            node = graph.edge_endpoints(edge)?.0;
        }
        if node != start {
            return None;
        }
        edges.reverse();
        Some(edges)
    }

    /// Re-quote the walk with real amounts.
    fn assemble(&self, ctx: &SearchContext<'_>, edge_seq: &[EdgeIndex]) -> Option<ArbitragePath> {
        let graph = &ctx.graph.graph;
        let mut hops: Vec<Hop> = Vec::with_capacity(edge_seq.len());
        let mut spot_rates = Vec::with_capacity(edge_seq.len());
        let mut flagged = false;
        let mut amount = ctx.start_amount;

        for &edge_idx in edge_seq {
            let (from, to) = graph.edge_endpoints(edge_idx)?;
            let token_in = ctx.graph.token_for(from)?;
            let token_out = ctx.graph.token_for(to)?;
            let data = graph.edge_weight(edge_idx)?;

            let (hop, spot, hop_flagged) =
                extend_hop(data, token_in, token_out, amount, &ctx.model).ok()?;
            amount = hop.amount_out;
            flagged |= hop_flagged;
            spot_rates.push(spot);
            hops.push(hop);
        }

        Some(close_path(hops, &spot_rates, ctx.start_amount, flagged))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testgraph::*;
    use super::*;
    use crate::market::MarketGraph;

    #[test]
    fn detects_the_negative_cycle() {
        let graph = MarketGraph::build(&triangle(), &triangle_tokens());
        let ctx = context(&graph);
        let cycles = BellmanFordSearch.search(&ctx, &[addr(1)]);

        assert!(!cycles.is_empty());
        let best = cycles
            .iter()
            .filter(|p| p.is_valid_cycle())
            .max_by_key(|p| p.gross_profit)
            .unwrap();
        assert_eq!(best.hop_count(), 3);
        assert!(best.gross_profit > 0);
    }

    #[test]
    fn flat_market_has_no_negative_cycle() {
        // All rates 1.0 with a fee on every pool: every loop loses.
        let mut pools = triangle();
        for pool in &mut pools {
            pool.fee = 3000;
            pool.reserve1 = pool.reserve0;
        }
        let graph = MarketGraph::build(&pools, &triangle_tokens());
        let ctx = context(&graph);
        assert!(BellmanFordSearch.search(&ctx, &[addr(1)]).is_empty());
    }

    #[test]
    fn hop_budget_bounds_detection() {
        let graph = MarketGraph::build(&triangle(), &triangle_tokens());
        let mut ctx = context(&graph);
        ctx.max_hops = 2;
        let cycles = BellmanFordSearch.search(&ctx, &[addr(1)]);
        assert!(cycles.iter().all(|p| p.hop_count() <= 2));
    }

    #[test]
    fn matches_dfs_recall_on_small_graph() {
        let graph = MarketGraph::build(&triangle(), &triangle_tokens());
        let ctx = context(&graph);

        let bf: std::collections::HashSet<_> = BellmanFordSearch
            .search(&ctx, &[addr(1)])
            .iter()
            .filter(|p| p.is_valid_cycle() && p.gross_profit > 0)
            .map(|p| p.signature())
            .collect();
        let dfs: std::collections::HashSet<_> = super::super::DfsSearch
            .search(&ctx, &[addr(1)])
            .iter()
            .filter(|p| p.is_valid_cycle() && p.gross_profit > 0)
            .map(|p| p.signature())
            .collect();
        assert_eq!(bf, dfs);
    }
}
