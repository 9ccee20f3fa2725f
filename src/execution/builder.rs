//! Transaction construction.
//!
//! Turns a validated path into executable transaction parameters: route
//! calldata for the executor contract, a buffered gas limit, and either
//! EIP-1559 or legacy fee fields depending on what the fee market supports.
//! Failed submissions rebuild with a fee escalated by a fixed percentage
//! per attempt, up to the retry cap.

use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;

use crate::error::{PipelineError, RejectReason};
use crate::gas_oracle::{GasQuote, GasTier};
use crate::search::ArbitragePath;

/// Route calldata tag understood by the executor contract.
const ROUTE_SELECTOR: [u8; 4] = [0xa7, 0x1b, 0x3c, 0x44];

/// Selector of the standard Solidity `Error(string)` revert.
const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// Fee fields for the chosen pricing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeePricing {
    Eip1559 {
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
    },
    Legacy {
        gas_price: u128,
    },
}

impl FeePricing {
    /// Worst-case price per gas unit under this pricing.
    pub fn price_ceiling(&self) -> u128 {
        match self {
            FeePricing::Eip1559 {
                max_fee_per_gas, ..
            } => *max_fee_per_gas,
            FeePricing::Legacy { gas_price } => *gas_price,
        }
    }
}

/// Everything needed to submit the arbitrage transaction.
#[derive(Debug, Clone)]
pub struct TxParams {
    pub to: Address,
    pub calldata: Bytes,
    pub gas_limit: u64,
    pub pricing: FeePricing,
    pub min_final_amount: U256,
    pub tithe_recipient: Option<Address>,
}

/// Dry-run outcome from the provider.
#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub success: bool,
    pub gas_used: u64,
    pub error: Option<String>,
}

/// Provider-backed dry-run seam. Must never mutate chain state.
#[async_trait]
pub trait TxSimulator: Send + Sync {
    async fn simulate(&self, tx: &TxParams) -> Result<SimulationResult, PipelineError>;
}

pub struct TxBuilder {
    /// Multiplier applied to the path's gas estimate (default 1.1).
    pub gas_safety_multiplier: f64,
    /// Fee bump per retry attempt, percent (default 10).
    pub fee_escalation_pct: u32,
    pub max_attempts: u32,
    pub gas_tier: GasTier,
    pub tithe_recipient: Option<Address>,
}

impl TxBuilder {
    /// Build the transaction for a given attempt. Attempt 0 prices at the
    /// quoted fee; each later attempt escalates the fee by the configured
    /// percentage. Attempts past the cap are terminal for the opportunity.
    pub fn build(
        &self,
        path: &ArbitragePath,
        quote: &GasQuote,
        executor: Address,
        attempt: u32,
    ) -> Result<TxParams, RejectReason> {
        if attempt >= self.max_attempts {
            return Err(RejectReason::MaxRetriesExceeded);
        }

        let escalation = 100u128 + self.fee_escalation_pct as u128 * attempt as u128;
        let pricing = if quote.supports_eip1559() {
            let base = quote.base_fee_wei.unwrap_or(0);
            let priority = quote.priority_fee_wei.unwrap_or(0) * escalation / 100;
            FeePricing::Eip1559 {
                // Headroom for two base-fee doublings plus the tip.
                max_fee_per_gas: base * 2 + priority,
                max_priority_fee_per_gas: priority,
            }
        } else {
            FeePricing::Legacy {
                gas_price: quote.price_for(self.gas_tier) * escalation / 100,
            }
        };

        let gas_limit = (path.gas_estimate as f64 * self.gas_safety_multiplier).ceil() as u64;

        Ok(TxParams {
            to: executor,
            calldata: encode_route(path),
            gas_limit,
            pricing,
            min_final_amount: path.start_amount,
            tithe_recipient: self.tithe_recipient,
        })
    }
}

/// Compact route encoding for the executor contract: tag, hop count, then
/// per hop the pool, input token and input amount.
fn encode_route(path: &ArbitragePath) -> Bytes {
    let mut data = Vec::with_capacity(4 + 1 + path.hop_count() * 72);
    data.extend_from_slice(&ROUTE_SELECTOR);
    data.push(path.hop_count() as u8);
    for hop in &path.hops {
        data.extend_from_slice(hop.pool.as_slice());
        data.extend_from_slice(hop.token_in.as_slice());
        data.extend_from_slice(&hop.amount_in.to_be_bytes::<32>());
    }
    Bytes::from(data)
}

/// Decode a revert payload into something readable. Standard
/// `Error(string)` data yields the message; anything else yields a hex
/// fragment.
pub fn decode_revert_reason(data: &[u8]) -> String {
    if data.len() >= 68 && data[..4] == ERROR_STRING_SELECTOR {
        // 4-byte selector, 32-byte offset, 32-byte length, then the bytes.
        let len = U256::from_be_slice(&data[36..68]);
        let len = usize::try_from(len).unwrap_or(0);
        if len > 0 && data.len() >= 68 + len {
            if let Ok(message) = std::str::from_utf8(&data[68..68 + len]) {
                return message.to_string();
            }
        }
    }
    if data.is_empty() {
        "execution reverted".to_string()
    } else {
        format!("execution reverted: 0x{}", hex::encode(&data[..data.len().min(32)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gas_oracle::testfeed::FixedFeed;
    use crate::market::Dex;
    use crate::search::{Hop, GAS_PER_HOP};

    fn path() -> ArbitragePath {
        let hops = vec![
            Hop {
                pool: Address::repeat_byte(10),
                dex: Dex::UniswapV2,
                token_in: Address::repeat_byte(1),
                token_out: Address::repeat_byte(2),
                amount_in: U256::from(1_000u64),
                amount_out: U256::from(1_000u64),
                price_impact: 0.0,
                gas_estimate: GAS_PER_HOP,
            },
            Hop {
                pool: Address::repeat_byte(11),
                dex: Dex::UniswapV2,
                token_in: Address::repeat_byte(2),
                token_out: Address::repeat_byte(1),
                amount_in: U256::from(1_000u64),
                amount_out: U256::from(1_020u64),
                price_impact: 0.0,
                gas_estimate: GAS_PER_HOP,
            },
        ];
        ArbitragePath::new(hops, U256::from(1_000u64), 0.0, false)
    }

    fn builder() -> TxBuilder {
        TxBuilder {
            gas_safety_multiplier: 1.1,
            fee_escalation_pct: 10,
            max_attempts: 3,
            gas_tier: GasTier::Fast,
            tithe_recipient: None,
        }
    }

    #[test]
    fn legacy_quote_selects_legacy_pricing() {
        let quote = FixedFeed::legacy(20_000_000_000).quote;
        let tx = builder()
            .build(&path(), &quote, Address::repeat_byte(0xee), 0)
            .unwrap();
        match tx.pricing {
            FeePricing::Legacy { gas_price } => assert_eq!(gas_price, 24_000_000_000),
            other => panic!("expected legacy pricing, got {other:?}"),
        }
    }

    #[test]
    fn eip1559_quote_selects_eip1559_pricing() {
        let quote = FixedFeed::eip1559(10_000_000_000, 2_000_000_000).quote;
        let tx = builder()
            .build(&path(), &quote, Address::repeat_byte(0xee), 0)
            .unwrap();
        match tx.pricing {
            FeePricing::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => {
                assert_eq!(max_priority_fee_per_gas, 2_000_000_000);
                assert_eq!(max_fee_per_gas, 22_000_000_000);
            }
            other => panic!("expected 1559 pricing, got {other:?}"),
        }
    }

    #[test]
    fn gas_limit_carries_safety_buffer() {
        let quote = FixedFeed::legacy(20_000_000_000).quote;
        let tx = builder()
            .build(&path(), &quote, Address::repeat_byte(0xee), 0)
            .unwrap();
        let raw = path().gas_estimate;
        assert_eq!(tx.gas_limit, (raw as f64 * 1.1).ceil() as u64);
    }

    #[test]
    fn fee_escalates_per_attempt() {
        let quote = FixedFeed::legacy(10_000_000_000).quote;
        let b = builder();
        let executor = Address::repeat_byte(0xee);
        let p0 = b.build(&path(), &quote, executor, 0).unwrap().pricing.price_ceiling();
        let p1 = b.build(&path(), &quote, executor, 1).unwrap().pricing.price_ceiling();
        let p2 = b.build(&path(), &quote, executor, 2).unwrap().pricing.price_ceiling();
        assert_eq!(p1, p0 * 110 / 100);
        assert_eq!(p2, p0 * 120 / 100);
    }

    #[test]
    fn attempts_past_cap_are_terminal() {
        let quote = FixedFeed::legacy(10_000_000_000).quote;
        let err = builder()
            .build(&path(), &quote, Address::repeat_byte(0xee), 3)
            .unwrap_err();
        assert_eq!(err, RejectReason::MaxRetriesExceeded);
    }

    #[test]
    fn route_encoding_is_deterministic() {
        let a = encode_route(&path());
        let b = encode_route(&path());
        assert_eq!(a, b);
        assert_eq!(a[..4], ROUTE_SELECTOR);
        assert_eq!(a[4], 2); // hop count
        assert_eq!(a.len(), 5 + 2 * 72);
    }

    #[test]
    fn decodes_standard_revert_string() {
        // Error("nope") ABI encoding.
        let mut data = Vec::new();
        data.extend_from_slice(&ERROR_STRING_SELECTOR);
        data.extend_from_slice(&U256::from(0x20u64).to_be_bytes::<32>());
        data.extend_from_slice(&U256::from(4u64).to_be_bytes::<32>());
        let mut msg = b"nope".to_vec();
        msg.resize(32, 0);
        data.extend_from_slice(&msg);

        assert_eq!(decode_revert_reason(&data), "nope");
    }

    #[test]
    fn opaque_revert_data_yields_generic_message() {
        assert_eq!(decode_revert_reason(&[]), "execution reverted");
        let raw = decode_revert_reason(&[0xde, 0xad, 0xbe, 0xef]);
        assert!(raw.starts_with("execution reverted: 0x"));
    }
}
