//! Profitability evaluation.
//!
//! One profit function prices a candidate everywhere: during search
//! ordering (provisional gas price), here (cached oracle quote) and in the
//! execution validator (live quote). Pass/fail is strictly threshold-based;
//! the profitability score only ranks cache entries.

use std::sync::Arc;
use tracing::debug;

use crate::error::RejectReason;
use crate::gas_oracle::{GasQuote, GasTier};
use crate::market::u256_to_f64;
use crate::scorer::{OpportunityScorer, PathFeatures};
use crate::search::ArbitragePath;

const BPS_DENOM: i128 = 10_000;

/// Net profit in wei of the start token: gross minus gas minus the tithe.
/// The tithe is carved from positive gross only; a losing path owes none.
pub fn net_profit_wei(gross: i128, gas_estimate: u64, gas_price_wei: u128, tithe_bps: u32) -> i128 {
    let gas_cost = (gas_estimate as i128).saturating_mul(gas_price_wei as i128);
    let tithe = if gross > 0 {
        gross.saturating_mul(tithe_bps as i128) / BPS_DENOM
    } else {
        0
    };
    gross.saturating_sub(tithe).saturating_sub(gas_cost)
}

pub struct Evaluator {
    /// Strict floor: a path passes only with net profit above this.
    pub min_profit_threshold: u128,
    pub tithe_bps: u32,
    /// Tier used to price gas during evaluation.
    pub gas_tier: GasTier,
    scorer: Option<Arc<dyn OpportunityScorer>>,
}

impl Evaluator {
    pub fn new(
        min_profit_threshold: u128,
        tithe_bps: u32,
        scorer: Option<Arc<dyn OpportunityScorer>>,
    ) -> Self {
        Self {
            min_profit_threshold,
            tithe_bps,
            gas_tier: GasTier::Standard,
            scorer,
        }
    }

    /// Attach net profit and a ranking score, or reject the path.
    pub fn evaluate(&self, mut path: ArbitragePath, quote: &GasQuote) -> Option<ArbitragePath> {
        let gas_price = quote.effective_price(self.gas_tier);
        let net = net_profit_wei(path.gross_profit, path.gas_estimate, gas_price, self.tithe_bps);

        if net <= self.min_profit_threshold as i128 {
            debug!(
                gross = path.gross_profit,
                net,
                threshold = self.min_profit_threshold,
                "candidate rejected: {}",
                RejectReason::Unprofitable
            );
            return None;
        }

        path.net_profit = Some(net);
        path.profitability = Some(self.score(&path, net));
        Some(path)
    }

    /// Normalized [0, 1] ranking score: profit magnitude plus confidence
    /// from liquidity depth (via worst hop impact) and path brevity.
    fn score(&self, path: &ArbitragePath, net: i128) -> f64 {
        let start = u256_to_f64(path.start_amount);
        let margin = if start > 0.0 { net as f64 / start } else { 0.0 };
        // A 5% margin saturates the profit term.
        let profit_term = (margin / 0.05).clamp(0.0, 1.0);

        let max_hop_impact = path
            .hops
            .iter()
            .map(|h| h.price_impact)
            .fold(0.0f64, f64::max);
        let depth_term = (1.0 - max_hop_impact * 20.0).clamp(0.0, 1.0);
        let brevity_term = 1.0 / (1.0 + 0.2 * (path.hop_count().saturating_sub(2)) as f64);

        let base = profit_term * 0.5 + depth_term * 0.3 + brevity_term * 0.2;

        match &self.scorer {
            Some(scorer) => {
                let features = PathFeatures {
                    hop_count: path.hop_count(),
                    net_margin: margin,
                    max_hop_impact,
                    cumulative_slippage: path.cumulative_slippage,
                    flagged: path.flagged,
                };
                let aux = scorer.score(&features).clamp(0.0, 1.0);
                (base * 0.7 + aux * 0.3).clamp(0.0, 1.0)
            }
            None => base.clamp(0.0, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gas_oracle::testfeed::FixedFeed;
    use crate::market::Dex;
    use crate::scorer::DepthHeuristicScorer;
    use crate::search::{Hop, GAS_PER_HOP};
    use alloy_primitives::{Address, U256};

    fn quote(gas_price_wei: u128) -> GasQuote {
        FixedFeed::legacy(gas_price_wei).quote
    }

    fn path(start: u64, fin: u64) -> ArbitragePath {
        let hops = vec![
            Hop {
                pool: Address::repeat_byte(10),
                dex: Dex::UniswapV2,
                token_in: Address::repeat_byte(1),
                token_out: Address::repeat_byte(2),
                amount_in: U256::from(start),
                amount_out: U256::from(start),
                price_impact: 0.001,
                gas_estimate: GAS_PER_HOP,
            },
            Hop {
                pool: Address::repeat_byte(11),
                dex: Dex::UniswapV2,
                token_in: Address::repeat_byte(2),
                token_out: Address::repeat_byte(1),
                amount_in: U256::from(start),
                amount_out: U256::from(fin),
                price_impact: 0.001,
                gas_estimate: GAS_PER_HOP,
            },
        ];
        ArbitragePath::new(hops, U256::from(start), 0.002, false)
    }

    #[test]
    fn net_profit_deducts_gas_and_tithe() {
        // gross 1e18, gas 350k at 1000 wei, tithe 100 bps
        let net = net_profit_wei(1_000_000_000_000_000_000, 350_000, 1_000, 100);
        let expected = 1_000_000_000_000_000_000i128
            - 1_000_000_000_000_000_000 / 100
            - 350_000 * 1_000;
        assert_eq!(net, expected);
    }

    #[test]
    fn losing_path_owes_no_tithe() {
        let net = net_profit_wei(-1_000, 0, 0, 500);
        assert_eq!(net, -1_000);
    }

    #[test]
    fn rejects_when_net_at_or_below_threshold() {
        let evaluator = Evaluator::new(0, 0, None);
        // Gross profit exactly cancelled by gas: net == 0, not > 0.
        let p = path(1_000_000, 1_350_001);
        let gas_cost = p.gas_estimate as u128; // 1 wei gas price
        let gross = p.gross_profit;
        assert_eq!(gross as u128, gas_cost + 1);

        let accepted = evaluator.evaluate(p.clone(), &quote(1));
        assert!(accepted.is_some(), "one wei above costs must pass a 0 floor");

        let p_even = path(1_000_000, 1_000_000 + gas_cost as u64);
        assert!(evaluator.evaluate(p_even, &quote(1)).is_none());
    }

    #[test]
    fn accepted_path_carries_net_and_score() {
        let evaluator = Evaluator::new(0, 0, None);
        let accepted = evaluator.evaluate(path(1_000_000_000, 1_100_000_000), &quote(1)).unwrap();
        assert!(accepted.net_profit.unwrap() > 0);
        let score = accepted.profitability.unwrap();
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn auxiliary_scorer_blends_into_ranking_only() {
        let plain = Evaluator::new(0, 0, None);
        let assisted = Evaluator::new(0, 0, Some(Arc::new(DepthHeuristicScorer)));

        let p = path(1_000_000_000, 1_100_000_000);
        let a = plain.evaluate(p.clone(), &quote(1)).unwrap();
        let b = assisted.evaluate(p, &quote(1)).unwrap();
        // Same pass/fail and net profit; only the ranking score may move.
        assert_eq!(a.net_profit, b.net_profit);
        assert!((0.0..=1.0).contains(&b.profitability.unwrap()));
    }

    #[test]
    fn higher_margin_ranks_higher() {
        let evaluator = Evaluator::new(0, 0, None);
        let small = evaluator
            .evaluate(path(1_000_000_000, 1_001_000_000), &quote(1))
            .unwrap();
        let large = evaluator
            .evaluate(path(1_000_000_000, 1_100_000_000), &quote(1))
            .unwrap();
        assert!(large.profitability.unwrap() > small.profitability.unwrap());
    }
}
