//! External pool-data collaborator seam.
//!
//! The real RPC-backed adapter lives outside this crate; the pipeline only
//! sees this trait. `StaticPoolProvider` serves fixtures for tests;
//! `ManifestPoolProvider` serves a pool-manifest snapshot from disk for
//! offline runs.

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use serde::Deserialize;
#[cfg(test)]
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Instant;

use super::pool::{CurveType, Dex, PoolState, Token};
use crate::error::PipelineError;

#[async_trait]
pub trait PoolProvider: Send + Sync {
    /// Raw reserve/liquidity data for every pool connecting the given
    /// tokens on one chain.
    async fn list_pools(
        &self,
        chain_id: u64,
        tokens: &[Address],
    ) -> Result<Vec<PoolState>, PipelineError>;
}

/// Fixture-backed provider.
#[cfg(test)]
#[derive(Default)]
pub struct StaticPoolProvider {
    pools: HashMap<u64, Vec<PoolState>>,
}

#[cfg(test)]
impl StaticPoolProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pools(chain_id: u64, pools: Vec<PoolState>) -> Self {
        let mut map = HashMap::new();
        map.insert(chain_id, pools);
        Self { pools: map }
    }
}

#[cfg(test)]
#[async_trait]
impl PoolProvider for StaticPoolProvider {
    async fn list_pools(
        &self,
        chain_id: u64,
        tokens: &[Address],
    ) -> Result<Vec<PoolState>, PipelineError> {
        let pools = self
            .pools
            .get(&chain_id)
            .ok_or_else(|| PipelineError::DataUnavailable(format!("no pools for chain {chain_id}")))?;

        Ok(pools
            .iter()
            .filter(|p| {
                tokens.contains(&p.token0.address) && tokens.contains(&p.token1.address)
            })
            .cloned()
            .collect())
    }
}

// ============================================
// MANIFEST PROVIDER
// ============================================

#[derive(Debug, Deserialize)]
struct ManifestFile {
    chain_id: u64,
    pools: Vec<ManifestPool>,
}

#[derive(Debug, Deserialize)]
struct ManifestPool {
    address: String,
    token0: ManifestToken,
    token1: ManifestToken,
    reserve0: String,
    reserve1: String,
    #[serde(default)]
    liquidity: Option<String>,
    fee: u32,
    dex: String,
    #[serde(default)]
    curve: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ManifestToken {
    address: String,
    decimals: u8,
}

/// Pool snapshot loaded from a JSON manifest. Each `list_pools` call
/// re-reads reserves from the manifest as loaded; the data store's refresh
/// timer decides how often that happens.
pub struct ManifestPoolProvider {
    chain_id: u64,
    pools: Vec<PoolState>,
}

impl ManifestPoolProvider {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            PipelineError::DataUnavailable(format!(
                "cannot read pool manifest {}: {e}",
                path.as_ref().display()
            ))
        })?;
        let manifest: ManifestFile = serde_json::from_str(&content)
            .map_err(|e| PipelineError::DataUnavailable(format!("bad pool manifest: {e}")))?;

        let mut pools = Vec::with_capacity(manifest.pools.len());
        for entry in manifest.pools {
            pools.push(Self::convert(entry)?);
        }
        Ok(Self {
            chain_id: manifest.chain_id,
            pools,
        })
    }

    fn convert(entry: ManifestPool) -> Result<PoolState, PipelineError> {
        let bad = |field: &str| {
            PipelineError::DataUnavailable(format!(
                "pool manifest entry {}: bad {field}",
                entry.address
            ))
        };
        let reserve0 = U256::from_str_radix(entry.reserve0.trim(), 10).map_err(|_| bad("reserve0"))?;
        let reserve1 = U256::from_str_radix(entry.reserve1.trim(), 10).map_err(|_| bad("reserve1"))?;
        let liquidity = match &entry.liquidity {
            Some(raw) => U256::from_str_radix(raw.trim(), 10).map_err(|_| bad("liquidity"))?,
            None => reserve0,
        };
        let dex = match entry.dex.to_lowercase().as_str() {
            "uniswap-v2" | "uniswap_v2" => Dex::UniswapV2,
            "uniswap-v3" | "uniswap_v3" => Dex::UniswapV3,
            "sushiswap" => Dex::Sushiswap,
            "camelot" => Dex::Camelot,
            "balancer" => Dex::Balancer,
            _ => return Err(bad("dex")),
        };
        let curve = match entry.curve.as_deref() {
            Some(raw) => CurveType::from_str(raw).map_err(|_| bad("curve"))?,
            None => CurveType::ConstantProduct,
        };

        Ok(PoolState {
            address: Address::from_str(&entry.address).map_err(|_| bad("address"))?,
            token0: Token::new(
                Address::from_str(&entry.token0.address).map_err(|_| bad("token0"))?,
                entry.token0.decimals,
            ),
            token1: Token::new(
                Address::from_str(&entry.token1.address).map_err(|_| bad("token1"))?,
                entry.token1.decimals,
            ),
            reserve0,
            reserve1,
            liquidity,
            fee: entry.fee,
            dex,
            curve,
            quality: 0.5,
            updated_at: Instant::now(),
        })
    }
}

#[async_trait]
impl PoolProvider for ManifestPoolProvider {
    async fn list_pools(
        &self,
        chain_id: u64,
        tokens: &[Address],
    ) -> Result<Vec<PoolState>, PipelineError> {
        if chain_id != self.chain_id {
            return Err(PipelineError::DataUnavailable(format!(
                "manifest covers chain {}, requested {chain_id}",
                self.chain_id
            )));
        }
        Ok(self
            .pools
            .iter()
            .filter(|p| {
                tokens.contains(&p.token0.address) && tokens.contains(&p.token1.address)
            })
            .map(|p| {
                let mut pool = p.clone();
                pool.updated_at = Instant::now();
                pool
            })
            .collect())
    }
}
