//! Pool Data Store - snapshot cache over the external provider.
//!
//! Holds the most recent pool snapshot per chain and decides, per scan
//! cycle, whether to re-fetch or reuse. On provider failure it falls back
//! to the cached snapshot as long as it is younger than the hard staleness
//! ceiling, otherwise it fails closed so no graph is built from junk data.

use alloy_primitives::{Address, U256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::pool::{u256_to_f64, PoolState};
use super::provider::PoolProvider;
use crate::error::PipelineError;

/// Weight of the newest quality observation in the blend. The rest stays
/// with the running score, so one bad reading cannot crater a pool.
const QUALITY_BLEND: f64 = 0.3;

pub struct PoolDataStore {
    provider: Arc<dyn PoolProvider>,
    cache_duration: Duration,
    staleness_ceiling: Duration,
    request_timeout: Duration,
    /// Liquidity level treated as "deep" when observing quality.
    depth_reference: U256,
    snapshots: HashMap<u64, Snapshot>,
}

struct Snapshot {
    pools: Vec<PoolState>,
    fetched_at: Instant,
}

impl PoolDataStore {
    pub fn new(
        provider: Arc<dyn PoolProvider>,
        cache_duration: Duration,
        staleness_ceiling: Duration,
        request_timeout: Duration,
        depth_reference: U256,
    ) -> Self {
        Self {
            provider,
            cache_duration,
            staleness_ceiling,
            request_timeout,
            depth_reference,
            snapshots: HashMap::new(),
        }
    }

    /// Re-fetch pool state for a chain, or reuse the cached snapshot if it
    /// is still fresh. Updates per-pool quality scores on every live fetch.
    pub async fn refresh(
        &mut self,
        chain_id: u64,
        tokens: &[Address],
    ) -> Result<(), PipelineError> {
        if let Some(snapshot) = self.snapshots.get(&chain_id) {
            if snapshot.fetched_at.elapsed() < self.cache_duration {
                debug!(
                    chain_id,
                    age_ms = snapshot.fetched_at.elapsed().as_millis() as u64,
                    "pool snapshot still fresh, skipping fetch"
                );
                return Ok(());
            }
        }

        let fetch = self.provider.list_pools(chain_id, tokens);
        let fetched = match tokio::time::timeout(self.request_timeout, fetch).await {
            Ok(Ok(pools)) => pools,
            Ok(Err(e)) => return self.fall_back(chain_id, e),
            Err(_) => {
                return self.fall_back(chain_id, PipelineError::Timeout(self.request_timeout))
            }
        };

        let previous: HashMap<Address, f64> = self
            .snapshots
            .get(&chain_id)
            .map(|s| s.pools.iter().map(|p| (p.address, p.quality)).collect())
            .unwrap_or_default();

        let now = Instant::now();
        let pools = fetched
            .into_iter()
            .map(|mut pool| {
                let observed = self.observe_quality(&pool);
                let prior = previous.get(&pool.address).copied().unwrap_or(observed);
                pool.quality = (prior * (1.0 - QUALITY_BLEND) + observed * QUALITY_BLEND)
                    .clamp(0.0, 1.0);
                pool.updated_at = now;
                pool
            })
            .collect::<Vec<_>>();

        debug!(chain_id, pools = pools.len(), "pool snapshot refreshed");
        self.snapshots.insert(
            chain_id,
            Snapshot {
                pools,
                fetched_at: now,
            },
        );
        Ok(())
    }

    /// Latest usable snapshot for a chain. Errors if none exists or the
    /// cached one has aged past the ceiling.
    pub fn pools(&self, chain_id: u64) -> Result<&[PoolState], PipelineError> {
        let snapshot = self
            .snapshots
            .get(&chain_id)
            .ok_or_else(|| PipelineError::DataUnavailable(format!("no snapshot for chain {chain_id}")))?;

        let age = snapshot.fetched_at.elapsed();
        if age > self.staleness_ceiling {
            return Err(PipelineError::StaleSnapshot {
                age_secs: age.as_secs(),
                ceiling_secs: self.staleness_ceiling.as_secs(),
            });
        }
        Ok(&snapshot.pools)
    }

    fn fall_back(&self, chain_id: u64, cause: PipelineError) -> Result<(), PipelineError> {
        match self.snapshots.get(&chain_id) {
            Some(snapshot) if snapshot.fetched_at.elapsed() <= self.staleness_ceiling => {
                warn!(
                    chain_id,
                    age_secs = snapshot.fetched_at.elapsed().as_secs(),
                    %cause,
                    "provider unreachable, reusing cached snapshot"
                );
                Ok(())
            }
            _ => Err(cause),
        }
    }

    /// One quality observation from the current reading: how deep the pool
    /// is against the reference, discounted when reserves are lopsided.
    fn observe_quality(&self, pool: &PoolState) -> f64 {
        let depth = if self.depth_reference.is_zero() {
            1.0
        } else {
            (u256_to_f64(pool.liquidity) / u256_to_f64(self.depth_reference)).min(1.0)
        };

        let balance = if pool.reserve0.is_zero() || pool.reserve1.is_zero() {
            0.0
        } else {
            let r0 = u256_to_f64(pool.reserve0)
                * 10f64.powi(-(pool.token0.decimals as i32));
            let r1 = u256_to_f64(pool.reserve1)
                * 10f64.powi(-(pool.token1.decimals as i32));
            let ratio = if r0 < r1 { r0 / r1 } else { r1 / r0 };
            // Anything within ~4 orders of magnitude is normal for priced
            // pairs; below that the snapshot is suspect.
            (ratio.log10() / 4.0 + 1.0).clamp(0.0, 1.0)
        };

        (depth * 0.6 + balance * 0.4).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::pool::{CurveType, Dex, Token};
    use crate::market::provider::StaticPoolProvider;

    fn pool(addr_byte: u8, liquidity: u64) -> PoolState {
        let exp18 = U256::from(10u64).pow(U256::from(18));
        PoolState {
            address: Address::repeat_byte(addr_byte),
            token0: Token::new(Address::repeat_byte(0xa0), 18),
            token1: Token::new(Address::repeat_byte(0xa1), 18),
            reserve0: U256::from(liquidity) * exp18,
            reserve1: U256::from(liquidity) * exp18,
            liquidity: U256::from(liquidity) * exp18,
            fee: 3000,
            dex: Dex::UniswapV2,
            curve: CurveType::ConstantProduct,
            quality: 0.5,
            updated_at: Instant::now(),
        }
    }

    fn tokens() -> Vec<Address> {
        vec![Address::repeat_byte(0xa0), Address::repeat_byte(0xa1)]
    }

    fn store(provider: Arc<dyn PoolProvider>) -> PoolDataStore {
        PoolDataStore::new(
            provider,
            Duration::from_secs(5),
            Duration::from_secs(60),
            Duration::from_secs(2),
            U256::from(100u64) * U256::from(10u64).pow(U256::from(18)),
        )
    }

    #[tokio::test]
    async fn refresh_populates_snapshot() {
        let provider = Arc::new(StaticPoolProvider::with_pools(1, vec![pool(1, 100)]));
        let mut store = store(provider);

        store.refresh(1, &tokens()).await.unwrap();
        let pools = store.pools(1).unwrap();
        assert_eq!(pools.len(), 1);
        assert!(pools[0].quality > 0.0 && pools[0].quality <= 1.0);
    }

    #[tokio::test]
    async fn unknown_chain_fails_closed() {
        let provider = Arc::new(StaticPoolProvider::new());
        let mut store = store(provider);

        let err = store.refresh(7, &tokens()).await.unwrap_err();
        assert!(matches!(err, PipelineError::DataUnavailable(_)));
        assert!(store.pools(7).is_err());
    }

    #[tokio::test]
    async fn provider_failure_reuses_fresh_snapshot() {
        // First refresh succeeds; second hits a provider with the chain
        // removed, and must keep serving the cached snapshot.
        let good = Arc::new(StaticPoolProvider::with_pools(1, vec![pool(1, 100)]));
        let mut store = PoolDataStore::new(
            good,
            Duration::ZERO, // force a re-fetch every time
            Duration::from_secs(60),
            Duration::from_secs(2),
            U256::from(1u64),
        );
        store.refresh(1, &tokens()).await.unwrap();

        store.provider = Arc::new(StaticPoolProvider::new());
        store.refresh(1, &tokens()).await.unwrap();
        assert_eq!(store.pools(1).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn quality_blend_moves_toward_observation() {
        let deep = pool(1, 1000); // well above the reference depth
        let provider = Arc::new(StaticPoolProvider::with_pools(1, vec![deep]));
        let mut store = PoolDataStore::new(
            provider,
            Duration::ZERO,
            Duration::from_secs(60),
            Duration::from_secs(2),
            U256::from(100u64) * U256::from(10u64).pow(U256::from(18)),
        );

        store.refresh(1, &tokens()).await.unwrap();
        let first = store.pools(1).unwrap()[0].quality;
        store.refresh(1, &tokens()).await.unwrap();
        let second = store.pools(1).unwrap()[0].quality;
        // Deep balanced pool observes 1.0; the blend ratchets upward.
        assert!(second >= first);
        assert!(second <= 1.0);
    }
}
