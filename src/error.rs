//! Error taxonomy for the scan pipeline.
//!
//! Two tiers: `PipelineError` aborts or skips a cycle (provider-level or
//! configuration failures), `RejectReason` is a per-pool or per-path outcome
//! that never aborts a scan. Every rejection carries a reason string so the
//! logs explain why a candidate disappeared.

use thiserror::Error;

/// Failures that abort a scan cycle (or startup).
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Pool or gas provider unreachable and no usable fallback.
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    /// Cached snapshot exists but is older than the hard staleness ceiling.
    #[error("snapshot stale beyond ceiling ({age_secs}s > {ceiling_secs}s)")]
    StaleSnapshot { age_secs: u64, ceiling_secs: u64 },

    /// The validator could not price the transaction this cycle.
    #[error("gas estimation failed: {0}")]
    GasEstimationFailure(String),

    /// External call exceeded its deadline.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Configuration rejected at load time.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Per-pool / per-candidate outcomes. Expected during normal operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RejectReason {
    #[error("insufficient liquidity")]
    InsufficientLiquidity,

    #[error("pool quality below floor")]
    QualityTooLow,

    #[error("price impact exceeds limit")]
    ExceedsSlippage,

    #[error("net profit below threshold")]
    Unprofitable,

    #[error("simulation reverted: {0}")]
    SimulationRevert(String),

    #[error("max retries exceeded")]
    MaxRetriesExceeded,
}
