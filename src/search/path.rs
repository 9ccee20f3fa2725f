//! Candidate path types and structural validation.
//!
//! A path is an ordered hop sequence that returns to its starting token.
//! Amounts are propagated through real curve quotes at construction time,
//! so a path always knows its gross outcome; net profit is attached later
//! by the evaluator against a live gas quote.

use alloy_primitives::{Address, U256};
use std::collections::HashSet;

use crate::market::Dex;

/// Gas a single swap hop is expected to burn.
pub const GAS_PER_HOP: u64 = 150_000;
/// Fixed overhead for the surrounding transaction (loan setup, transfers).
pub const GAS_BASE_OVERHEAD: u64 = 50_000;

/// One traversal of one pool. Immutable once created.
#[derive(Debug, Clone)]
pub struct Hop {
    pub pool: Address,
    pub dex: Dex,
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    pub amount_out: U256,
    pub price_impact: f64,
    pub gas_estimate: u64,
}

/// A closed candidate cycle with propagated amounts.
#[derive(Debug, Clone)]
pub struct ArbitragePath {
    pub hops: Vec<Hop>,
    pub start_amount: U256,
    pub final_amount: U256,
    /// final - start, in wei of the start token. Can be negative.
    pub gross_profit: i128,
    /// Set by the evaluator; strictly above the profit threshold when set.
    pub net_profit: Option<i128>,
    pub gas_estimate: u64,
    pub cumulative_slippage: f64,
    /// Ranking score in [0, 1]; cache ordering only, never pass/fail.
    pub profitability: Option<f64>,
    /// True when any hop crossed the slippage warning threshold.
    pub flagged: bool,
}

impl ArbitragePath {
    pub fn new(hops: Vec<Hop>, start_amount: U256, cumulative_slippage: f64, flagged: bool) -> Self {
        let final_amount = hops.last().map(|h| h.amount_out).unwrap_or(start_amount);
        let gross_profit = signed_delta(final_amount, start_amount);
        let gas_estimate =
            GAS_BASE_OVERHEAD + hops.iter().map(|h| h.gas_estimate).sum::<u64>();
        Self {
            hops,
            start_amount,
            final_amount,
            gross_profit,
            net_profit: None,
            gas_estimate,
            cumulative_slippage,
            profitability: None,
            flagged,
        }
    }

    pub fn hop_count(&self) -> usize {
        self.hops.len()
    }

    pub fn start_token(&self) -> Option<Address> {
        self.hops.first().map(|h| h.token_in)
    }

    /// Structural validity: a closed simple cycle of at least two hops,
    /// contiguous token chain, no pool reused, no token revisited before
    /// the close.
    pub fn is_valid_cycle(&self) -> bool {
        if self.hops.len() < 2 {
            return false;
        }
        let start = self.hops[0].token_in;
        if self.hops.last().unwrap().token_out != start {
            return false;
        }

        // Hops must chain: out of hop i feeds in of hop i+1.
        for pair in self.hops.windows(2) {
            if pair[0].token_out != pair[1].token_in {
                return false;
            }
        }

        // Intermediate tokens appear once, and never equal the start.
        let mut seen = HashSet::new();
        for hop in &self.hops[..self.hops.len() - 1] {
            if hop.token_out == start || !seen.insert(hop.token_out) {
                return false;
            }
        }

        // No pool traversed twice.
        let pools: HashSet<_> = self.hops.iter().map(|h| h.pool).collect();
        pools.len() == self.hops.len()
    }

    /// Dedup signature: the same cycle found from a different start token
    /// or direction uses the same pool set.
    pub fn signature(&self) -> String {
        let mut pools: Vec<String> = self.hops.iter().map(|h| format!("{:?}", h.pool)).collect();
        pools.sort();
        pools.join("-")
    }

    /// Ordering key: descending profit, then fewer hops, then less
    /// slippage. Uses net profit when the evaluator has attached one,
    /// otherwise the provisional estimate.
    pub fn ranking_profit(&self) -> i128 {
        self.net_profit.unwrap_or(self.gross_profit)
    }
}

/// Sort in the order every strategy must return: best profit first, ties to
/// the shorter then less slippery path.
pub fn sort_paths(paths: &mut [ArbitragePath]) {
    paths.sort_by(|a, b| {
        b.ranking_profit()
            .cmp(&a.ranking_profit())
            .then(a.hop_count().cmp(&b.hop_count()))
            .then(
                a.cumulative_slippage
                    .partial_cmp(&b.cumulative_slippage)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
    });
}

/// Drop cycles already seen under another rotation/direction.
pub fn dedup_paths(paths: Vec<ArbitragePath>) -> Vec<ArbitragePath> {
    let mut seen = HashSet::new();
    paths
        .into_iter()
        .filter(|p| seen.insert(p.signature()))
        .collect()
}

pub fn signed_delta(a: U256, b: U256) -> i128 {
    if a >= b {
        i128::try_from(a - b).unwrap_or(i128::MAX)
    } else {
        i128::try_from(b - a).map(|v| -v).unwrap_or(i128::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    fn hop(pool: u8, token_in: u8, token_out: u8, amount_in: u64, amount_out: u64) -> Hop {
        Hop {
            pool: addr(pool),
            dex: Dex::UniswapV2,
            token_in: addr(token_in),
            token_out: addr(token_out),
            amount_in: U256::from(amount_in),
            amount_out: U256::from(amount_out),
            price_impact: 0.001,
            gas_estimate: GAS_PER_HOP,
        }
    }

    fn cycle_abc() -> ArbitragePath {
        ArbitragePath::new(
            vec![
                hop(10, 1, 2, 1000, 1000),
                hop(11, 2, 3, 1000, 1020),
                hop(12, 3, 1, 1020, 1020),
            ],
            U256::from(1000u64),
            0.01,
            false,
        )
    }

    #[test]
    fn valid_cycle_accepted() {
        let path = cycle_abc();
        assert!(path.is_valid_cycle());
        assert_eq!(path.gross_profit, 20);
        assert_eq!(path.gas_estimate, GAS_BASE_OVERHEAD + 3 * GAS_PER_HOP);
    }

    #[test]
    fn open_path_rejected() {
        let path = ArbitragePath::new(
            vec![hop(10, 1, 2, 1000, 1000), hop(11, 2, 3, 1000, 1000)],
            U256::from(1000u64),
            0.0,
            false,
        );
        assert!(!path.is_valid_cycle());
    }

    #[test]
    fn token_revisit_rejected() {
        // A -> B -> A -> B ... closing at A but revisiting B.
        let path = ArbitragePath::new(
            vec![
                hop(10, 1, 2, 1000, 1000),
                hop(11, 2, 3, 1000, 1000),
                hop(12, 3, 2, 1000, 1000),
                hop(13, 2, 1, 1000, 1000),
            ],
            U256::from(1000u64),
            0.0,
            false,
        );
        assert!(!path.is_valid_cycle());
    }

    #[test]
    fn pool_reuse_rejected() {
        let path = ArbitragePath::new(
            vec![hop(10, 1, 2, 1000, 1000), hop(10, 2, 1, 1000, 1000)],
            U256::from(1000u64),
            0.0,
            false,
        );
        assert!(!path.is_valid_cycle());
    }

    #[test]
    fn signature_ignores_rotation() {
        let rotated = ArbitragePath::new(
            vec![
                hop(11, 2, 3, 1000, 1020),
                hop(12, 3, 1, 1020, 1020),
                hop(10, 1, 2, 1020, 1020),
            ],
            U256::from(1000u64),
            0.01,
            false,
        );
        assert_eq!(cycle_abc().signature(), rotated.signature());
    }

    #[test]
    fn ordering_profit_then_hops_then_slippage() {
        let mut a = cycle_abc();
        a.net_profit = Some(50);
        let mut b = cycle_abc();
        b.net_profit = Some(50);
        b.hops.push(hop(13, 1, 4, 1, 1)); // longer, same profit
        let mut c = cycle_abc();
        c.net_profit = Some(80);

        let mut paths = vec![b.clone(), a.clone(), c.clone()];
        sort_paths(&mut paths);
        assert_eq!(paths[0].net_profit, Some(80));
        assert_eq!(paths[1].hop_count(), 3);
        assert_eq!(paths[2].hop_count(), 4);
    }

    #[test]
    fn signed_delta_handles_both_directions() {
        assert_eq!(signed_delta(U256::from(10u64), U256::from(3u64)), 7);
        assert_eq!(signed_delta(U256::from(3u64), U256::from(10u64)), -7);
    }
}
