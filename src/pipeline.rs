//! The scan pipeline.
//!
//! One logical loop: refresh pool data, build and prune the graph, search,
//! evaluate and cache, validate. The I/O stages (pool refresh, gas quotes,
//! simulation) suspend; graph building, search and evaluation run
//! synchronously against a frozen snapshot so nothing mutates mid-search.
//! A shutdown flag is honored between stages, never inside one, so a
//! cancelled cycle can never cache a partially built path.
//!
//! Collaborators arrive by injection. The pipeline owns no globals.

use alloy_primitives::{Address, U256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{PipelineError, RejectReason};
use crate::evaluate::{Evaluator, OpportunityCache};
use crate::execution::{ExecutionDecision, ExecutionValidator, TxBuilder, TxSimulator};
use crate::gas_oracle::{GasFeed, GasOracle, GasTier};
use crate::market::{MarketGraph, PoolDataStore, PoolProvider};
use crate::pruning::PruningFilter;
use crate::scorer::OpportunityScorer;
use crate::search::{self, ArbitragePath, SearchContext};
use crate::slippage::SlippageModel;

/// Counters for one completed scan cycle.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScanStats {
    pub pools: usize,
    pub graph_edges: usize,
    pub pruned_edges: usize,
    pub candidates: usize,
    pub evaluated: usize,
    pub served_from_cache: bool,
}

pub struct Pipeline {
    config: Config,
    store: PoolDataStore,
    filter: PruningFilter,
    evaluator: Evaluator,
    cache: OpportunityCache,
    validator: ExecutionValidator,
    gas_oracle: Arc<GasOracle>,
    simulator: Option<Arc<dyn TxSimulator>>,
    shutdown: Arc<AtomicBool>,
    last_stats: ScanStats,
}

impl Pipeline {
    pub fn new(
        config: Config,
        provider: Arc<dyn PoolProvider>,
        gas_feed: Arc<dyn GasFeed>,
        scorer: Option<Arc<dyn OpportunityScorer>>,
        simulator: Option<Arc<dyn TxSimulator>>,
        shutdown: Arc<AtomicBool>,
    ) -> Result<Self, PipelineError> {
        config
            .validate()
            .map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;

        let store = PoolDataStore::new(
            provider,
            std::time::Duration::from_secs(config.data.cache_duration_secs),
            std::time::Duration::from_secs(config.data.staleness_ceiling_secs),
            std::time::Duration::from_secs(config.data.request_timeout_secs),
            config.min_pool_liquidity()?,
        );

        let filter = PruningFilter {
            aggressiveness: config.pruning.aggressiveness,
            min_pool_liquidity: config.min_pool_liquidity()?,
            max_price_impact_per_hop: config.pruning.max_price_impact_per_hop,
            min_pool_quality_score: config.pruning.min_pool_quality_score,
        };

        let evaluator = Evaluator::new(
            config.min_profit_threshold_wei()?,
            config.execution.tithe_bps,
            scorer,
        );

        let cache = OpportunityCache::new(
            config.cache.enabled,
            config.cache.max_entries as usize,
            config.cache_ttl(),
            config.cache.min_profitability_score,
        );

        let validator = ExecutionValidator::new(
            TxBuilder {
                gas_safety_multiplier: config.execution.gas_safety_multiplier,
                fee_escalation_pct: config.execution.fee_escalation_pct,
                max_attempts: config.execution.max_retry_attempts,
                gas_tier: GasTier::Fast,
                tithe_recipient: config.tithe_recipient(),
            },
            config.execution.tithe_bps,
        );

        let gas_oracle = Arc::new(GasOracle::new(
            gas_feed,
            config.scan.chain_id,
            std::time::Duration::from_secs(config.gas.refresh_interval_secs),
        ));

        Ok(Self {
            config,
            store,
            filter,
            evaluator,
            cache,
            validator,
            gas_oracle,
            simulator,
            shutdown,
            last_stats: ScanStats::default(),
        })
    }

    fn halted(&self, stage: &str) -> bool {
        let halted = self.shutdown.load(Ordering::Relaxed);
        if halted {
            info!(stage, "shutdown observed, aborting cycle at stage boundary");
        }
        halted
    }

    /// One full discovery pass over the configured token universe.
    /// Returns paths sorted by descending net profit.
    pub async fn find_opportunities(
        &mut self,
        tokens: &[Address],
        start_amount: U256,
    ) -> Result<Vec<ArbitragePath>, PipelineError> {
        let mut stats = ScanStats::default();
        let chain_id = self.config.scan.chain_id;

        // Stage 1: refresh pool data (may suspend).
        if self.halted("refresh") {
            return Ok(Vec::new());
        }
        self.store.refresh(chain_id, tokens).await?;

        // Stage 2: build + prune (synchronous, frozen snapshot).
        if self.halted("graph") {
            return Ok(Vec::new());
        }
        let pools = self.store.pools(chain_id)?;
        stats.pools = pools.len();
        let graph = MarketGraph::build(pools, tokens);
        stats.graph_edges = graph.edge_count();
        let (pruned, prune_stats) = self.filter.prune(&graph, start_amount);
        stats.pruned_edges = prune_stats.low_liquidity + prune_stats.low_quality + prune_stats.high_impact;

        // Stage 3: search (synchronous).
        if self.halted("search") {
            return Ok(Vec::new());
        }
        let strategy = self.config.pathfinding.strategy.resolve(&pruned);
        let cache_key = OpportunityCache::key(tokens, strategy);
        if let Some(cached) = self.cache.get(&cache_key) {
            debug!(key = %cache_key, "serving opportunity from cache");
            stats.served_from_cache = true;
            self.last_stats = stats;
            return Ok(vec![cached]);
        }

        let ctx = SearchContext {
            graph: &pruned,
            start_amount,
            max_hops: self.config.pathfinding.max_hops as usize,
            max_cumulative_slippage: self
                .config
                .pruning
                .max_cumulative_slippage
                .min(self.config.pathfinding.max_slippage),
            model: SlippageModel::new(
                self.config.slippage.warning_threshold,
                self.config.slippage.max_safe_impact,
            ),
            gas_price_wei: self.config.provisional_gas_price_wei()?,
            tithe_bps: self.config.execution.tithe_bps,
        };
        let candidates = search::run(strategy, &ctx, tokens);
        stats.candidates = candidates.len();

        // Stage 4: evaluate + cache (synchronous after one quote read).
        if self.halted("evaluate") {
            return Ok(Vec::new());
        }
        let quote = self.gas_oracle.current().await;
        let mut evaluated: Vec<ArbitragePath> = candidates
            .into_iter()
            .filter_map(|path| self.evaluator.evaluate(path, &quote))
            .collect();
        search::sort_paths(&mut evaluated);
        stats.evaluated = evaluated.len();

        if let Some(best) = evaluated.first() {
            if let Some(score) = best.profitability {
                self.cache.put(cache_key, best.clone(), score);
            }
        }

        info!(
            pools = stats.pools,
            edges = stats.graph_edges,
            pruned = stats.pruned_edges,
            candidates = stats.candidates,
            evaluated = stats.evaluated,
            %strategy,
            "scan cycle complete"
        );
        self.last_stats = stats;
        Ok(evaluated)
    }

    /// Re-validate a candidate against live fee data, then dry-run it when
    /// a simulator is wired in. A revert kills the candidate with its
    /// decoded reason; the dry run never mutates state.
    pub async fn validate_execution(
        &self,
        path: &ArbitragePath,
        executor: Address,
    ) -> ExecutionDecision {
        let decision = self.validator.validate(path, &self.gas_oracle, executor).await;
        let (path, params) = match decision {
            ExecutionDecision::Executable(path, params) => (path, params),
            other => return other,
        };

        if let Some(simulator) = &self.simulator {
            let result = self.validator.simulate(simulator.as_ref(), &params).await;
            if !result.success {
                let reason = RejectReason::SimulationRevert(
                    result.error.unwrap_or_else(|| "execution reverted".to_string()),
                );
                return ExecutionDecision::Rejected(reason.to_string());
            }
            debug!(gas_used = result.gas_used, "dry run passed");
        }
        ExecutionDecision::Executable(path, params)
    }

    pub fn last_stats(&self) -> ScanStats {
        self.last_stats
    }

    pub fn cache_hit_rate(&self) -> (u64, u64) {
        self.cache.hit_rate()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("chain_id", &self.config.scan.chain_id)
            .field("strategy", &self.config.pathfinding.strategy)
            .field("cache_enabled", &self.cache.is_enabled())
            .finish()
    }
}
