//! Market model: pool snapshots, the data store, and the trade graph.

mod graph;
mod pool;
mod provider;
mod store;

pub use graph::{EdgeData, MarketGraph};
pub use pool::{u256_to_f64, CurveType, Dex, PoolState, Token, TradeDirection};
pub use provider::{ManifestPoolProvider, PoolProvider};
#[cfg(test)]
pub use provider::StaticPoolProvider;
pub use store::PoolDataStore;
