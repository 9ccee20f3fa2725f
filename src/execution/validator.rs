//! Execution validation.
//!
//! The last gate before capital moves. A path that looked profitable
//! against a cached gas quote is re-priced against the live quote here;
//! a stale quote is refreshed, never trusted. The decision carries either
//! ready-to-sign transaction parameters or the reason the path died.

use alloy_primitives::Address;
use tracing::{debug, info, warn};

use super::builder::{decode_revert_reason, SimulationResult, TxBuilder, TxParams, TxSimulator};
use crate::error::{PipelineError, RejectReason};
use crate::evaluate::net_profit_wei;
use crate::gas_oracle::{GasOracle, GasQuote};
use crate::search::ArbitragePath;

/// Outcome of validating one candidate. Created fresh per call, never
/// persisted.
#[derive(Debug)]
pub enum ExecutionDecision {
    Executable(ArbitragePath, TxParams),
    Rejected(String),
    Deferred(String),
}

impl ExecutionDecision {
    pub fn is_executable(&self) -> bool {
        matches!(self, ExecutionDecision::Executable(..))
    }
}

pub struct ExecutionValidator {
    pub builder: TxBuilder,
    pub tithe_bps: u32,
}

impl ExecutionValidator {
    pub fn new(builder: TxBuilder, tithe_bps: u32) -> Self {
        Self { builder, tithe_bps }
    }

    /// Re-validate a cached or fresh candidate against live fee data.
    pub async fn validate(
        &self,
        path: &ArbitragePath,
        oracle: &GasOracle,
        executor: Address,
    ) -> ExecutionDecision {
        let quote = oracle.current().await;
        let quote = if quote.is_stale(oracle.refresh_interval()) {
            match oracle.refresh().await {
                Ok(fresh) => fresh,
                Err(e) => {
                    let failure = PipelineError::GasEstimationFailure(e.to_string());
                    warn!(%failure, "deferring candidate until the next cycle");
                    return ExecutionDecision::Deferred(failure.to_string());
                }
            }
        } else {
            quote
        };
        self.validate_with_quote(path, &quote, executor)
    }

    /// Price the candidate against a specific quote: select the fee mode,
    /// buffer the gas limit, recompute net profit at the buffered limit.
    pub fn validate_with_quote(
        &self,
        path: &ArbitragePath,
        quote: &GasQuote,
        executor: Address,
    ) -> ExecutionDecision {
        let params = match self.builder.build(path, quote, executor, 0) {
            Ok(params) => params,
            Err(reason) => return ExecutionDecision::Rejected(reason.to_string()),
        };

        let live_net = net_profit_wei(
            path.gross_profit,
            params.gas_limit,
            params.pricing.price_ceiling(),
            self.tithe_bps,
        );

        if live_net <= 0 {
            debug!(
                gross = path.gross_profit,
                live_net,
                gas_limit = params.gas_limit,
                "candidate no longer pays for itself"
            );
            return ExecutionDecision::Rejected("unprofitable after live gas".to_string());
        }

        info!(
            live_net,
            gas_limit = params.gas_limit,
            eip1559 = quote.supports_eip1559(),
            tithe_recipient = ?params.tithe_recipient,
            "candidate validated for execution"
        );
        ExecutionDecision::Executable(path.clone(), params)
    }

    /// Rebuild after a failed broadcast with an escalated fee. Exhausting
    /// the attempt budget is terminal for this opportunity.
    #[allow(dead_code)]
    pub fn build_with_retry(
        &self,
        path: &ArbitragePath,
        quote: &GasQuote,
        executor: Address,
        attempt: u32,
    ) -> Result<TxParams, RejectReason> {
        self.builder.build(path, quote, executor, attempt)
    }

    /// Dry-run the transaction through the provider seam. Reverts surface
    /// a decoded reason where the payload allows it; raw hex revert data
    /// from the provider is decoded here.
    pub async fn simulate(
        &self,
        simulator: &dyn TxSimulator,
        tx: &TxParams,
    ) -> SimulationResult {
        match simulator.simulate(tx).await {
            Ok(mut result) => {
                let decoded = result
                    .error
                    .as_deref()
                    .and_then(|e| e.strip_prefix("0x"))
                    .and_then(|raw| hex::decode(raw).ok())
                    .map(|bytes| decode_revert_reason(&bytes));
                if let Some(reason) = decoded {
                    result.error = Some(reason);
                }
                result
            }
            Err(e) => SimulationResult {
                success: false,
                gas_used: 0,
                error: Some(format!("simulation transport failure: {e}")),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::gas_oracle::testfeed::FixedFeed;
    use crate::gas_oracle::GasTier;
    use crate::market::Dex;
    use crate::search::{Hop, GAS_PER_HOP};
    use alloy_primitives::U256;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    fn path(start: u64, fin: u64) -> ArbitragePath {
        let hops = vec![
            Hop {
                pool: Address::repeat_byte(10),
                dex: Dex::UniswapV2,
                token_in: Address::repeat_byte(1),
                token_out: Address::repeat_byte(2),
                amount_in: U256::from(start),
                amount_out: U256::from(start),
                price_impact: 0.0,
                gas_estimate: GAS_PER_HOP,
            },
            Hop {
                pool: Address::repeat_byte(11),
                dex: Dex::UniswapV2,
                token_in: Address::repeat_byte(2),
                token_out: Address::repeat_byte(1),
                amount_in: U256::from(start),
                amount_out: U256::from(fin),
                price_impact: 0.0,
                gas_estimate: GAS_PER_HOP,
            },
        ];
        ArbitragePath::new(hops, U256::from(start), 0.0, false)
    }

    fn validator() -> ExecutionValidator {
        ExecutionValidator::new(
            TxBuilder {
                gas_safety_multiplier: 1.1,
                fee_escalation_pct: 10,
                max_attempts: 3,
                gas_tier: GasTier::Fast,
                tithe_recipient: None,
            },
            0,
        )
    }

    #[tokio::test]
    async fn profitable_path_validates_executable() {
        // Profit of 1e15 wei dwarfs gas at 1 wei per unit.
        let oracle = GasOracle::new(Arc::new(FixedFeed::legacy(1)), 1, Duration::from_secs(60));
        let decision = validator()
            .validate(
                &path(1_000_000, 1_000_000_000),
                &oracle,
                Address::repeat_byte(0xee),
            )
            .await;
        assert!(decision.is_executable());
    }

    #[tokio::test]
    async fn live_gas_flips_marginal_path_to_rejected() {
        // Gross profit 1000 wei; live gas at 20 gwei annihilates it.
        let oracle = GasOracle::new(
            Arc::new(FixedFeed::legacy(20_000_000_000)),
            1,
            Duration::from_secs(60),
        );
        let decision = validator()
            .validate(&path(1_000_000, 1_001_000), &oracle, Address::repeat_byte(0xee))
            .await;
        match decision {
            ExecutionDecision::Rejected(reason) => {
                assert_eq!(reason, "unprofitable after live gas")
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn retry_exhaustion_is_terminal() {
        let quote = FixedFeed::legacy(1).quote;
        let v = validator();
        let p = path(1_000_000, 1_000_000_000);
        assert!(v
            .build_with_retry(&p, &quote, Address::repeat_byte(0xee), 2)
            .is_ok());
        assert_eq!(
            v.build_with_retry(&p, &quote, Address::repeat_byte(0xee), 3)
                .unwrap_err(),
            RejectReason::MaxRetriesExceeded
        );
    }

    struct RevertingSimulator;

    #[async_trait]
    impl TxSimulator for RevertingSimulator {
        async fn simulate(&self, _tx: &TxParams) -> Result<SimulationResult, PipelineError> {
            Ok(SimulationResult {
                success: false,
                gas_used: 21_000,
                error: Some("insufficient output amount".to_string()),
            })
        }
    }

    struct DeadSimulator;

    #[async_trait]
    impl TxSimulator for DeadSimulator {
        async fn simulate(&self, _tx: &TxParams) -> Result<SimulationResult, PipelineError> {
            Err(PipelineError::DataUnavailable("rpc down".into()))
        }
    }

    struct HexRevertSimulator;

    #[async_trait]
    impl TxSimulator for HexRevertSimulator {
        async fn simulate(&self, _tx: &TxParams) -> Result<SimulationResult, PipelineError> {
            // ABI-encoded Error("nope") as a provider would return it.
            let mut data = vec![0x08, 0xc3, 0x79, 0xa0];
            data.extend_from_slice(&U256::from(0x20u64).to_be_bytes::<32>());
            data.extend_from_slice(&U256::from(4u64).to_be_bytes::<32>());
            let mut msg = b"nope".to_vec();
            msg.resize(32, 0);
            data.extend_from_slice(&msg);
            Ok(SimulationResult {
                success: false,
                gas_used: 30_000,
                error: Some(format!("0x{}", hex::encode(data))),
            })
        }
    }

    #[tokio::test]
    async fn raw_hex_revert_data_is_decoded() {
        let v = validator();
        let quote = FixedFeed::legacy(1).quote;
        let tx = v
            .build_with_retry(
                &path(1_000_000, 1_000_000_000),
                &quote,
                Address::repeat_byte(0xee),
                0,
            )
            .unwrap();
        let result = v.simulate(&HexRevertSimulator, &tx).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("nope"));
    }

    #[tokio::test]
    async fn simulation_surfaces_revert_reason() {
        let v = validator();
        let quote = FixedFeed::legacy(1).quote;
        let tx = v
            .build_with_retry(
                &path(1_000_000, 1_000_000_000),
                &quote,
                Address::repeat_byte(0xee),
                0,
            )
            .unwrap();

        let result = v.simulate(&RevertingSimulator, &tx).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("insufficient output amount"));

        let dead = v.simulate(&DeadSimulator, &tx).await;
        assert!(!dead.success);
        assert!(dead.error.unwrap().contains("transport failure"));
    }
}
