//! Breadth-first cycle enumeration.
//!
//! Expands the frontier one hop at a time up to the hop budget, propagating
//! amounts through real quotes as it goes. Exhaustive within the bound;
//! the right tool when the graph is small enough that completeness beats
//! depth.

use alloy_primitives::Address;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use std::collections::{HashSet, VecDeque};

use super::path::{ArbitragePath, Hop};
use super::{close_path, extend_hop, SearchContext};

pub struct BfsSearch;

struct Frontier {
    node: NodeIndex,
    hops: Vec<Hop>,
    spot_rates: Vec<f64>,
    visited: HashSet<NodeIndex>,
    flagged: bool,
}

impl BfsSearch {
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
        let Some(start_node) = ctx.graph.node_for(start_token) else {
            return;
        };

        let mut queue = VecDeque::new();
        queue.push_back(Frontier {
            node: start_node,
            hops: Vec::new(),
            spot_rates: Vec::new(),
            visited: HashSet::from([start_node]),
            flagged: false,
        });

        while let Some(state) = queue.pop_front() {
            if state.hops.len() >= ctx.max_hops {
                continue;
            }
            let amount_in = state
                .hops
                .last()
                .map(|h| h.amount_out)
                .unwrap_or(ctx.start_amount);

            for edge in ctx.graph.graph.edges(state.node) {
                let target = edge.target();
                let token_in = match ctx.graph.token_for(state.node) {
                    Some(t) => t,
                    None => continue,
                };
                let token_out = match ctx.graph.token_for(target) {
                    Some(t) => t,
                    None => continue,
                };

                let closes = target == start_node;
                if !closes && state.visited.contains(&target) {
                    continue;
                }
                // A cycle needs at least two distinct pools.
                if closes && state.hops.is_empty() {
                    continue;
                }

                let Ok((hop, spot, hop_flagged)) =
                    extend_hop(edge.weight(), token_in, token_out, amount_in, &ctx.model)
                else {
                    continue;
                };

                let mut hops = state.hops.clone();
                hops.push(hop);
                let mut spot_rates = state.spot_rates.clone();
                spot_rates.push(spot);
                let flagged = state.flagged || hop_flagged;

                if closes {
                    cycles.push(close_path(hops, &spot_rates, ctx.start_amount, flagged));
                } else if hops.len() < ctx.max_hops {
                    let mut visited = state.visited.clone();
                    visited.insert(target);
                    queue.push_back(Frontier {
                        node: target,
                        hops,
                        spot_rates,
                        visited,
                        flagged,
                    });
                }
            }
        }
    }
}
