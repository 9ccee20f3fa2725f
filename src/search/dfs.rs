//! Depth-first exhaustive cycle enumeration.
//!
//! Walks every simple path up to the hop budget and records each one that
//! closes back at the start token. Highest recall, highest cost; the
//! thorough option when the cache is off and latency matters less.

use alloy_primitives::Address;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use std::collections::HashSet;

use super::path::{ArbitragePath, Hop};
use super::{close_path, extend_hop, SearchContext};

pub struct DfsSearch;

impl DfsSearch {
    pub fn search(&self, ctx: &SearchContext<'_>, start_tokens: &[Address]) -> Vec<ArbitragePath> {
        let mut cycles = Vec::new();
        for &token in start_tokens {
            let Some(start_node) = ctx.graph.node_for(token) else {
                continue;
            };
            let mut visited = HashSet::from([start_node]);
            self.descend(
                ctx,
                start_node,
                start_node,
                &mut Vec::new(),
                &mut Vec::new(),
                &mut visited,
                false,
                &mut cycles,
            );
        }
        cycles
    }

    #[allow(clippy::too_many_arguments)]
    fn descend(
        &self,
        ctx: &SearchContext<'_>,
        start_node: NodeIndex,
        current: NodeIndex,
        hops: &mut Vec<Hop>,
        spot_rates: &mut Vec<f64>,
        visited: &mut HashSet<NodeIndex>,
        flagged: bool,
        cycles: &mut Vec<ArbitragePath>,
    ) {
        if hops.len() >= ctx.max_hops {
            return;
        }
        let amount_in = hops.last().map(|h| h.amount_out).unwrap_or(ctx.start_amount);

        for edge in ctx.graph.graph.edges(current) {
            let target = edge.target();
            let closes = target == start_node;
            if !closes && visited.contains(&target) {
                continue;
            }
            if closes && hops.is_empty() {
                continue;
            }

            let (Some(token_in), Some(token_out)) =
                (ctx.graph.token_for(current), ctx.graph.token_for(target))
            else {
                continue;
            };

            let Ok((hop, spot, hop_flagged)) =
                extend_hop(edge.weight(), token_in, token_out, amount_in, &ctx.model)
            else {
                continue;
            };

            hops.push(hop);
            spot_rates.push(spot);

            if closes {
                cycles.push(close_path(
                    hops.clone(),
                    spot_rates,
                    ctx.start_amount,
                    flagged || hop_flagged,
                ));
            } else {
                visited.insert(target);
                self.descend(
                    ctx,
                    start_node,
                    target,
                    hops,
                    spot_rates,
                    visited,
                    flagged || hop_flagged,
                    cycles,
                );
                visited.remove(&target);
            }

            hops.pop();
            spot_rates.pop();
        }
    }
}
