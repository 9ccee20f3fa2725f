//! Auxiliary opportunity scoring.
//!
//! An optional external model can rank candidates; its output is only ever
//! blended into the cache-ranking score. Pass/fail stays strictly
//! threshold-based in the evaluator.

/// Path features handed to a scorer.
#[derive(Debug, Clone, Copy)]
pub struct PathFeatures {
    pub hop_count: usize,
    /// Net profit over start amount.
    pub net_margin: f64,
    /// Worst single-hop price impact on the path.
    pub max_hop_impact: f64,
    pub cumulative_slippage: f64,
    pub flagged: bool,
}

pub trait OpportunityScorer: Send + Sync {
    /// Ranking signal in [0, 1].
    fn score(&self, features: &PathFeatures) -> f64;
}

/// Built-in fallback: deep pools and short paths score well.
pub struct DepthHeuristicScorer;

impl OpportunityScorer for DepthHeuristicScorer {
    fn score(&self, features: &PathFeatures) -> f64 {
        let depth = (1.0 - features.max_hop_impact * 20.0).clamp(0.0, 1.0);
        let brevity = 1.0 / (1.0 + 0.25 * (features.hop_count.saturating_sub(2)) as f64);
        let penalty = if features.flagged { 0.85 } else { 1.0 };
        (depth * 0.6 + brevity * 0.4) * penalty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(hops: usize, impact: f64, flagged: bool) -> PathFeatures {
        PathFeatures {
            hop_count: hops,
            net_margin: 0.01,
            max_hop_impact: impact,
            cumulative_slippage: impact,
            flagged,
        }
    }

    #[test]
    fn deep_short_paths_score_higher() {
        let scorer = DepthHeuristicScorer;
        let good = scorer.score(&features(2, 0.001, false));
        let long = scorer.score(&features(5, 0.001, false));
        let shallow = scorer.score(&features(2, 0.04, false));
        assert!(good > long);
        assert!(good > shallow);
    }

    #[test]
    fn scores_stay_in_unit_interval() {
        let scorer = DepthHeuristicScorer;
        for (hops, impact, flagged) in [(2, 0.0, false), (8, 1.0, true), (3, 0.5, true)] {
            let s = scorer.score(&features(hops, impact, flagged));
            assert!((0.0..=1.0).contains(&s));
        }
    }
}
