//! Slippage / price-impact model.
//!
//! Per-hop quotes are exact integer arithmetic on reserves; price impact and
//! cumulative slippage are dimensionless ratios. Cumulative slippage is
//! multiplicative on effective output: the path total is derived from the
//! ratio of actual final output to the no-impact theoretical output.
//! Summing per-hop percentages overstates impact and produces false
//! negatives, so it is never done here.

use alloy_primitives::U256;

use crate::error::RejectReason;
use crate::market::{u256_to_f64, CurveType, PoolState, TradeDirection};

/// Fee denominator, Uniswap V3 convention (fee of 3000 = 0.30%).
const FEE_DENOM: u64 = 1_000_000;

/// Result of quoting one hop.
#[derive(Debug, Clone, Copy)]
pub struct CurveQuote {
    pub amount_out: U256,
    /// 1 - realized_rate / spot_rate, in [0, 1).
    pub price_impact: f64,
}

/// Thresholds applied to per-hop and cumulative impact.
#[derive(Debug, Clone, Copy)]
pub struct SlippageModel {
    /// Impact above this only flags the path.
    pub warning_threshold: f64,
    /// Impact above this disqualifies the path.
    pub max_safe_impact: f64,
}

impl SlippageModel {
    pub fn new(warning_threshold: f64, max_safe_impact: f64) -> Self {
        Self {
            warning_threshold,
            max_safe_impact,
        }
    }

    /// Classify a hop's impact. `Err` means disqualified.
    pub fn check(&self, price_impact: f64) -> Result<ImpactLevel, RejectReason> {
        if price_impact > self.max_safe_impact {
            Err(RejectReason::ExceedsSlippage)
        } else if price_impact > self.warning_threshold {
            Ok(ImpactLevel::Flagged)
        } else {
            Ok(ImpactLevel::Normal)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImpactLevel {
    Normal,
    Flagged,
}

/// Quote one hop through a pool. Integer math on amounts, float only for
/// the impact ratio.
pub fn quote(
    pool: &PoolState,
    direction: TradeDirection,
    amount_in: U256,
) -> Result<CurveQuote, RejectReason> {
    if amount_in.is_zero() {
        return Err(RejectReason::InsufficientLiquidity);
    }
    let (reserve_in, reserve_out) = pool.oriented_reserves(direction);
    if reserve_in.is_zero() || reserve_out.is_zero() {
        return Err(RejectReason::InsufficientLiquidity);
    }

    let fee_keep = U256::from(FEE_DENOM - pool.fee as u64);
    let amount_in_after_fee = amount_in * fee_keep / U256::from(FEE_DENOM);

    let amount_out = match pool.curve {
        CurveType::ConstantProduct => {
            // x * y = k: out = in_fee * reserve_out / (reserve_in + in_fee)
            let numerator = amount_in_after_fee * reserve_out;
            let denominator = reserve_in + amount_in_after_fee;
            numerator / denominator
        }
        CurveType::ConstantSum => {
            // Pegged 1:1 swap, decimal-rescaled, bounded by what the pool
            // actually holds.
            let (token_in, token_out) = pool.oriented_tokens(direction);
            let rescaled = rescale(amount_in_after_fee, token_in.decimals, token_out.decimals);
            if rescaled >= reserve_out {
                return Err(RejectReason::InsufficientLiquidity);
            }
            rescaled
        }
    };

    if amount_out.is_zero() {
        return Err(RejectReason::InsufficientLiquidity);
    }

    let spot = pool.spot_rate(direction);
    let realized = realized_rate(pool, direction, amount_in, amount_out);
    let price_impact = if spot > 0.0 {
        (1.0 - realized / spot).max(0.0)
    } else {
        1.0
    };

    Ok(CurveQuote {
        amount_out,
        price_impact,
    })
}

/// Cumulative slippage across a path, multiplicative on output: the loss of
/// the realized final amount against the spot-compounded ideal.
///
/// `spot_rates` are the fee-free marginal rates of each hop in order;
/// `start_amount` and `final_amount` are the realized endpoint amounts.
pub fn cumulative_slippage(spot_rates: &[f64], start_amount: U256, final_amount: U256) -> f64 {
    if spot_rates.is_empty() || start_amount.is_zero() {
        return 0.0;
    }
    let ideal: f64 = spot_rates
        .iter()
        .fold(u256_to_f64(start_amount), |amount, rate| amount * rate);
    if ideal <= 0.0 {
        return 0.0;
    }
    (1.0 - u256_to_f64(final_amount) / ideal).clamp(0.0, 1.0)
}

fn realized_rate(
    pool: &PoolState,
    direction: TradeDirection,
    amount_in: U256,
    amount_out: U256,
) -> f64 {
    let (token_in, token_out) = pool.oriented_tokens(direction);
    let raw = u256_to_f64(amount_out) / u256_to_f64(amount_in);
    raw * 10f64.powi(token_in.decimals as i32 - token_out.decimals as i32)
}

fn rescale(amount: U256, from_decimals: u8, to_decimals: u8) -> U256 {
    use std::cmp::Ordering;
    match to_decimals.cmp(&from_decimals) {
        Ordering::Greater => {
            amount * U256::from(10u64).pow(U256::from((to_decimals - from_decimals) as u64))
        }
        Ordering::Less => {
            amount / U256::from(10u64).pow(U256::from((from_decimals - to_decimals) as u64))
        }
        Ordering::Equal => amount,
    }
}
