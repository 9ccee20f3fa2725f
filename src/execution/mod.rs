//! Execution validation and transaction construction.

mod builder;
mod validator;

pub use builder::{
    decode_revert_reason, FeePricing, SimulationResult, TxBuilder, TxParams, TxSimulator,
};
pub use validator::{ExecutionDecision, ExecutionValidator};
