//! Profitability evaluation and the opportunity cache.

mod cache;
mod evaluator;

pub use cache::OpportunityCache;
pub use evaluator::{net_profit_wei, Evaluator};
