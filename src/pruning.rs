//! Pre-search pruning filter.
//!
//! Strips edges that cannot carry a profitable trade before the search ever
//! sees them: liquidity floor, quality floor, then a per-hop price-impact
//! estimate at the reference trade size. Runs once per scan cycle, linear in
//! edge count; it must never be called inside a search loop.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RejectReason;
use crate::market::{u256_to_f64, MarketGraph};
use crate::slippage;

/// How hard the filter cuts. Stricter levels shrink the graph: faster
/// search, fewer discovered opportunities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Aggressiveness {
    Low,
    #[default]
    Medium,
    High,
}

impl Aggressiveness {
    /// (liquidity floor multiplier, quality floor multiplier, impact cap
    /// multiplier). Monotone: higher level, stricter everywhere.
    fn scaling(self) -> (f64, f64, f64) {
        match self {
            Aggressiveness::Low => (0.5, 0.75, 1.5),
            Aggressiveness::Medium => (1.0, 1.0, 1.0),
            Aggressiveness::High => (2.0, 1.25, 0.5),
        }
    }
}

impl std::str::FromStr for Aggressiveness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Aggressiveness::Low),
            "medium" => Ok(Aggressiveness::Medium),
            "high" => Ok(Aggressiveness::High),
            other => Err(format!("unknown aggressiveness: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PruningFilter {
    pub aggressiveness: Aggressiveness,
    pub min_pool_liquidity: U256,
    pub max_price_impact_per_hop: f64,
    pub min_pool_quality_score: f64,
}

/// What got cut, for the scan summary.
#[derive(Debug, Default, Clone, Copy)]
pub struct PruneStats {
    pub kept: usize,
    pub low_liquidity: usize,
    pub low_quality: usize,
    pub high_impact: usize,
}

impl PruningFilter {
    /// Apply the three floors in order at the given reference trade size.
    /// Exclusions are expected outcomes, logged at debug only.
    pub fn prune(&self, graph: &MarketGraph, reference_amount: U256) -> (MarketGraph, PruneStats) {
        let (liq_mult, qual_mult, impact_mult) = self.aggressiveness.scaling();

        let liquidity_floor = scale_u256(self.min_pool_liquidity, liq_mult);
        let quality_floor = (self.min_pool_quality_score * qual_mult).min(1.0);
        let impact_cap = self.max_price_impact_per_hop * impact_mult;

        let mut stats = PruneStats::default();
        let pruned = graph.retain_edges(|edge| {
            if edge.pool.liquidity < liquidity_floor {
                stats.low_liquidity += 1;
                debug!(pool = %edge.pool.address, "pruned: {}", RejectReason::InsufficientLiquidity);
                return false;
            }
            if edge.quality < quality_floor {
                stats.low_quality += 1;
                debug!(
                    pool = %edge.pool.address,
                    quality = edge.quality,
                    "pruned: {}",
                    RejectReason::QualityTooLow
                );
                return false;
            }
            match slippage::quote(&edge.pool, edge.direction, reference_amount) {
                Ok(quote) if quote.price_impact <= impact_cap => {
                    stats.kept += 1;
                    true
                }
                _ => {
                    stats.high_impact += 1;
                    debug!(pool = %edge.pool.address, "pruned: {}", RejectReason::ExceedsSlippage);
                    false
                }
            }
        });

        debug!(
            kept = stats.kept,
            low_liquidity = stats.low_liquidity,
            low_quality = stats.low_quality,
            high_impact = stats.high_impact,
            "pruning complete"
        );
        (pruned, stats)
    }
}

fn scale_u256(value: U256, factor: f64) -> U256 {
    // Factors are small config multipliers; route through f64 once and
    // round down. Precision here shapes a threshold, not an amount.
    let scaled = u256_to_f64(value) * factor;
    if scaled <= 0.0 {
        return U256::ZERO;
    }
    U256::from(scaled as u128)
}
