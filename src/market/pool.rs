//! Pool and token snapshot types.
//!
//! A `PoolState` is a point-in-time snapshot of one liquidity pool, owned by
//! the `PoolDataStore` and copied into graph edges once per scan cycle. All
//! reserve and liquidity amounts are `U256`; floats appear only as
//! dimensionless rates and scores.

use alloy_primitives::{Address, U256};

/// A token with its on-chain decimal precision. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token {
    pub address: Address,
    pub decimals: u8,
}

impl Token {
    pub fn new(address: Address, decimals: u8) -> Self {
        Self { address, decimals }
    }
}

/// DEX a pool originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dex {
    UniswapV2,
    UniswapV3,
    Sushiswap,
    Camelot,
    Balancer,
}

impl std::fmt::Display for Dex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dex::UniswapV2 => write!(f, "UniV2"),
            Dex::UniswapV3 => write!(f, "UniV3"),
            Dex::Sushiswap => write!(f, "Sushi"),
            Dex::Camelot => write!(f, "Camelot"),
            Dex::Balancer => write!(f, "Balancer"),
        }
    }
}

/// Pricing curve the pool follows. Every curve must answer the same quote
/// signature in the slippage model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CurveType {
    /// x * y = k
    ConstantProduct,
    /// x + y = k (tightly pegged stable pairs)
    ConstantSum,
}

impl std::str::FromStr for CurveType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "constant-product" | "constant_product" | "xyk" => Ok(CurveType::ConstantProduct),
            "constant-sum" | "constant_sum" | "stable" => Ok(CurveType::ConstantSum),
            other => Err(format!("unknown curve type: {other}")),
        }
    }
}

/// Direction of a trade through a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeDirection {
    ZeroForOne,
    OneForZero,
}

/// Point-in-time snapshot of one pool.
#[derive(Debug, Clone)]
pub struct PoolState {
    pub address: Address,
    pub token0: Token,
    pub token1: Token,
    pub reserve0: U256,
    pub reserve1: U256,
    /// Aggregate depth used for floors and confidence, in wei of the quote
    /// asset. For V2-style pools this tracks reserve0.
    pub liquidity: U256,
    /// Fee in basis points of a hundredth (3000 = 0.30%).
    pub fee: u32,
    pub dex: Dex,
    pub curve: CurveType,
    /// Monotonically blended health score in [0, 1].
    pub quality: f64,
    pub updated_at: std::time::Instant,
}

impl PoolState {
    /// Reserves oriented for a trade in the given direction.
    pub fn oriented_reserves(&self, direction: TradeDirection) -> (U256, U256) {
        match direction {
            TradeDirection::ZeroForOne => (self.reserve0, self.reserve1),
            TradeDirection::OneForZero => (self.reserve1, self.reserve0),
        }
    }

    /// Input/output tokens for the given direction.
    pub fn oriented_tokens(&self, direction: TradeDirection) -> (Token, Token) {
        match direction {
            TradeDirection::ZeroForOne => (self.token0, self.token1),
            TradeDirection::OneForZero => (self.token1, self.token0),
        }
    }

    /// Direction that consumes `token_in`, if this pool trades it.
    pub fn direction_from(&self, token_in: Address) -> Option<TradeDirection> {
        if self.token0.address == token_in {
            Some(TradeDirection::ZeroForOne)
        } else if self.token1.address == token_in {
            Some(TradeDirection::OneForZero)
        } else {
            None
        }
    }

    /// Marginal exchange rate (out per in) at zero size, before fees.
    /// Decimal-adjusted so rates for mixed-precision pairs stay comparable.
    pub fn spot_rate(&self, direction: TradeDirection) -> f64 {
        let (reserve_in, reserve_out) = self.oriented_reserves(direction);
        if reserve_in.is_zero() || reserve_out.is_zero() {
            return 0.0;
        }
        let (token_in, token_out) = self.oriented_tokens(direction);
        match self.curve {
            CurveType::ConstantProduct => {
                let raw = u256_to_f64(reserve_out) / u256_to_f64(reserve_in);
                raw * 10f64.powi(token_in.decimals as i32 - token_out.decimals as i32)
            }
            // Pegged pairs trade 1:1 at the margin.
            CurveType::ConstantSum => {
                10f64.powi(token_in.decimals as i32 - token_out.decimals as i32)
            }
        }
    }

    /// Spot rate with the pool fee applied.
    pub fn effective_rate(&self, direction: TradeDirection) -> f64 {
        self.spot_rate(direction) * (1.0 - self.fee as f64 / 1_000_000.0)
    }
}

/// Lossy conversion for ratio math only. Never feed the result back into
/// amount arithmetic.
pub fn u256_to_f64(value: U256) -> f64 {
    let mut out = 0.0f64;
    for (i, limb) in value.as_limbs().iter().enumerate() {
        out += (*limb as f64) * 2f64.powi(64 * i as i32);
    }
    out
}
