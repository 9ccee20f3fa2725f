//! Configuration for the discovery pipeline.
//!
//! Loaded from a TOML file, overridable from environment variables, and
//! validated before the first scan cycle runs. Amount-valued settings are
//! decimal wei strings in the file (TOML integers cap at i64) and parse to
//! integer types at load; they never pass through floating point.

use alloy_primitives::{Address, U256};
use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::PipelineError;
use crate::market::CurveType;
use crate::pruning::Aggressiveness;
use crate::search::Strategy;

// ============================================
// SECTIONS
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Chain to scan (1 = Ethereum mainnet).
    pub chain_id: u64,
    /// Seconds between scan cycles (~1 block).
    pub interval_secs: u64,
    /// Tokens the universe is restricted to; cycles start from each.
    pub tokens: Vec<String>,
    /// Trade size probed per cycle, in wei of the start token.
    pub start_amount: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            interval_secs: 12,
            tokens: vec![
                "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2".to_string(), // WETH
                "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48".to_string(), // USDC
                "0xdAC17F958D2ee523a2206206994597C13D831ec7".to_string(), // USDT
                "0x6B175474E89094C44Da98b954EedcdeCB5BE3830".to_string(), // DAI
                "0x2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599".to_string(), // WBTC
            ],
            start_amount: "1000000000000000000".to_string(), // 1 ETH
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathfindingConfig {
    pub strategy: Strategy,
    /// Hop budget per cycle (3-4 recommended).
    pub max_hops: u32,
    /// Strict net-profit floor, wei.
    pub min_profit_threshold: String,
    /// Ceiling on cumulative path slippage.
    pub max_slippage: f64,
    /// Provisional gas price (wei) for ordering candidates during search.
    pub gas_price: String,
}

impl Default for PathfindingConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Auto,
            max_hops: 4,
            min_profit_threshold: "0".to_string(),
            max_slippage: 0.02,
            gas_price: "20000000000".to_string(), // 20 gwei
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PruningConfig {
    pub aggressiveness: Aggressiveness,
    /// Liquidity floor, wei.
    pub min_pool_liquidity: String,
    pub max_price_impact_per_hop: f64,
    pub max_cumulative_slippage: f64,
    pub min_pool_quality_score: f64,
}

impl Default for PruningConfig {
    fn default() -> Self {
        Self {
            aggressiveness: Aggressiveness::Medium,
            min_pool_liquidity: "50000000000000000000".to_string(), // 50 ETH-equivalent
            max_price_impact_per_hop: 0.01,
            max_cumulative_slippage: 0.03,
            min_pool_quality_score: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: u32,
    pub ttl_seconds: u32,
    pub min_profitability_score: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 256,
            ttl_seconds: 30,
            min_profitability_score: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlippageConfig {
    pub default_curve_type: String,
    /// Impact above this flags the path but keeps it.
    pub warning_threshold: f64,
    /// Impact above this disqualifies the path.
    pub max_safe_impact: f64,
}

impl Default for SlippageConfig {
    fn default() -> Self {
        Self {
            default_curve_type: "constant-product".to_string(),
            warning_threshold: 0.005,
            max_safe_impact: 0.02,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Multiplier on the gas-limit estimate.
    pub gas_safety_multiplier: f64,
    /// Fee bump per retry attempt, percent.
    pub fee_escalation_pct: u32,
    pub max_retry_attempts: u32,
    /// Protocol fee carved from gross profit, basis points.
    pub tithe_bps: u32,
    pub tithe_recipient: Option<String>,
    /// Deployed executor contract.
    pub executor_address: Option<String>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            gas_safety_multiplier: 1.1,
            fee_escalation_pct: 10,
            max_retry_attempts: 3,
            tithe_bps: 0,
            tithe_recipient: None,
            executor_address: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Reuse a pool snapshot younger than this.
    pub cache_duration_secs: u64,
    /// Hard ceiling: beyond this a stale snapshot fails closed.
    pub staleness_ceiling_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            cache_duration_secs: 10,
            staleness_ceiling_secs: 120,
            request_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GasConfig {
    pub refresh_interval_secs: u64,
    pub feed_url: String,
    pub api_key: Option<String>,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 60,
            feed_url: "https://api.etherscan.io/v2/api".to_string(),
            api_key: None,
        }
    }
}

// ============================================
// MAIN CONFIGURATION
// ============================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scan: ScanConfig,
    pub pathfinding: PathfindingConfig,
    pub pruning: PruningConfig,
    pub cache: CacheConfig,
    pub slippage: SlippageConfig,
    pub execution: ExecutionConfig,
    pub data: DataConfig,
    pub gas: GasConfig,
    /// Append validated opportunities as JSON lines here, if set.
    pub opportunity_log_path: Option<String>,
}

impl Config {
    /// Load from a TOML file, then apply environment overrides.
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = match path {
            Some(p) => {
                let content = fs::read_to_string(p)?;
                toml::from_str(&content)?
            }
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Environment overrides for the settings most often flipped per run.
    fn apply_env(&mut self) -> Result<()> {
        if let Ok(v) = env::var("CHAIN_ID") {
            self.scan.chain_id = v.parse()?;
        }
        if let Ok(v) = env::var("SCAN_INTERVAL_SECS") {
            self.scan.interval_secs = v.parse()?;
        }
        if let Ok(v) = env::var("SCAN_TOKENS") {
            self.scan.tokens = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("START_AMOUNT_WEI") {
            self.scan.start_amount = v;
        }
        if let Ok(v) = env::var("STRATEGY") {
            self.pathfinding.strategy = v.parse().map_err(|e: String| eyre!(e))?;
        }
        if let Ok(v) = env::var("MAX_HOPS") {
            self.pathfinding.max_hops = v.parse()?;
        }
        if let Ok(v) = env::var("MIN_PROFIT_THRESHOLD_WEI") {
            self.pathfinding.min_profit_threshold = v;
        }
        if let Ok(v) = env::var("PRUNING_AGGRESSIVENESS") {
            self.pruning.aggressiveness = v.parse().map_err(|e: String| eyre!(e))?;
        }
        if let Ok(v) = env::var("CACHE_ENABLED") {
            self.cache.enabled = v.parse()?;
        }
        if let Ok(v) = env::var("GAS_FEED_API_KEY") {
            self.gas.api_key = Some(v);
        }
        if let Ok(v) = env::var("EXECUTOR_ADDRESS") {
            self.execution.executor_address = Some(v);
        }
        if let Ok(v) = env::var("OPPORTUNITY_LOG_PATH") {
            self.opportunity_log_path = Some(v);
        }
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    // ========== Typed accessors ==========

    pub fn scan_tokens(&self) -> Result<Vec<Address>, PipelineError> {
        let tokens: Vec<Address> = self
            .scan
            .tokens
            .iter()
            .filter_map(|s| Address::from_str(s).ok())
            .collect();
        if tokens.len() != self.scan.tokens.len() {
            return Err(PipelineError::InvalidConfig(
                "scan.tokens contains an unparsable address".to_string(),
            ));
        }
        Ok(tokens)
    }

    pub fn start_amount(&self) -> Result<U256, PipelineError> {
        parse_wei_u256("scan.start_amount", &self.scan.start_amount)
    }

    pub fn min_profit_threshold_wei(&self) -> Result<u128, PipelineError> {
        parse_wei_u128(
            "pathfinding.min_profit_threshold",
            &self.pathfinding.min_profit_threshold,
        )
    }

    pub fn provisional_gas_price_wei(&self) -> Result<u128, PipelineError> {
        parse_wei_u128("pathfinding.gas_price", &self.pathfinding.gas_price)
    }

    pub fn min_pool_liquidity(&self) -> Result<U256, PipelineError> {
        parse_wei_u256("pruning.min_pool_liquidity", &self.pruning.min_pool_liquidity)
    }

    pub fn default_curve_type(&self) -> Result<CurveType, PipelineError> {
        self.slippage
            .default_curve_type
            .parse()
            .map_err(PipelineError::InvalidConfig)
    }

    pub fn executor_address(&self) -> Option<Address> {
        self.execution
            .executor_address
            .as_deref()
            .and_then(|s| Address::from_str(s).ok())
    }

    pub fn tithe_recipient(&self) -> Option<Address> {
        self.execution
            .tithe_recipient
            .as_deref()
            .and_then(|s| Address::from_str(s).ok())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan.interval_secs.max(1))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_seconds as u64)
    }

    // ========== Validation ==========

    /// Reject inconsistent settings before the first cycle. Every limit
    /// here guards an invariant some stage depends on.
    pub fn validate(&self) -> Result<()> {
        self.scan_tokens().map_err(|e| eyre!(e.to_string()))?;
        if self.scan.tokens.len() < 2 {
            return Err(eyre!("scan.tokens needs at least two tokens to form a cycle"));
        }
        self.start_amount().map_err(|e| eyre!(e.to_string()))?;
        self.min_profit_threshold_wei()
            .map_err(|e| eyre!(e.to_string()))?;
        self.provisional_gas_price_wei()
            .map_err(|e| eyre!(e.to_string()))?;
        self.min_pool_liquidity().map_err(|e| eyre!(e.to_string()))?;
        self.default_curve_type().map_err(|e| eyre!(e.to_string()))?;

        if self.pathfinding.max_hops < 2 {
            return Err(eyre!("pathfinding.max_hops < 2 cannot close a cycle"));
        }
        if self.pathfinding.max_hops > 6 {
            return Err(eyre!("pathfinding.max_hops > 6 will cause exponential gas costs"));
        }
        for (name, value) in [
            ("pathfinding.max_slippage", self.pathfinding.max_slippage),
            (
                "pruning.max_price_impact_per_hop",
                self.pruning.max_price_impact_per_hop,
            ),
            (
                "pruning.max_cumulative_slippage",
                self.pruning.max_cumulative_slippage,
            ),
            (
                "pruning.min_pool_quality_score",
                self.pruning.min_pool_quality_score,
            ),
            (
                "cache.min_profitability_score",
                self.cache.min_profitability_score,
            ),
            ("slippage.warning_threshold", self.slippage.warning_threshold),
            ("slippage.max_safe_impact", self.slippage.max_safe_impact),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(eyre!("{name} must be within [0, 1], got {value}"));
            }
        }
        if self.slippage.warning_threshold > self.slippage.max_safe_impact {
            return Err(eyre!(
                "slippage.warning_threshold above max_safe_impact would flag nothing"
            ));
        }
        if self.cache.enabled && self.cache.ttl_seconds == 0 {
            return Err(eyre!("cache.ttl_seconds of 0 makes every entry dead on arrival"));
        }
        if self.execution.gas_safety_multiplier < 1.0 {
            return Err(eyre!("execution.gas_safety_multiplier below 1.0 removes the buffer"));
        }
        if self.execution.max_retry_attempts == 0 {
            return Err(eyre!("execution.max_retry_attempts must be at least 1"));
        }
        if self.execution.max_retry_attempts > 1 && self.execution.fee_escalation_pct == 0 {
            return Err(eyre!(
                "retries without fee escalation would resubmit the identical transaction"
            ));
        }
        if self.execution.tithe_bps > 10_000 {
            return Err(eyre!("execution.tithe_bps above 10000 exceeds the whole profit"));
        }
        if self.data.staleness_ceiling_secs < self.data.cache_duration_secs {
            return Err(eyre!(
                "data.staleness_ceiling_secs below cache_duration_secs can never serve a snapshot"
            ));
        }
        Ok(())
    }

    /// Operator-facing summary printed at startup.
    pub fn print_summary(&self) {
        println!("╔════════════════════════════════════════════════════════════╗");
        println!("║               PROSPECTOR - CONFIGURATION                   ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ Chain ID:          {:<39} ║", self.scan.chain_id);
        println!("║ Scan interval:     {:<39} ║", format!("{}s", self.scan.interval_secs));
        println!("║ Token universe:    {:<39} ║", self.scan.tokens.len());
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ PATHFINDING                                                ║");
        println!("║ • Strategy:        {:<39} ║", format!("{:?}", self.pathfinding.strategy));
        println!("║ • Max hops:        {:<39} ║", self.pathfinding.max_hops);
        println!("║ • Profit floor:    {:<39} ║", format!("{} wei", self.pathfinding.min_profit_threshold));
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ PRUNING                                                    ║");
        println!("║ • Aggressiveness:  {:<39} ║", format!("{:?}", self.pruning.aggressiveness));
        println!("║ • Liquidity floor: {:<39} ║", format!("{} wei", self.pruning.min_pool_liquidity));
        println!("║ • Quality floor:   {:<39} ║", self.pruning.min_pool_quality_score);
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ CACHE                                                      ║");
        println!("║ • Enabled:         {:<39} ║", self.cache.enabled);
        println!("║ • Capacity / TTL:  {:<39} ║", format!("{} / {}s", self.cache.max_entries, self.cache.ttl_seconds));
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ EXECUTION                                                  ║");
        println!("║ • Gas buffer:      {:<39} ║", format!("{:.2}x", self.execution.gas_safety_multiplier));
        println!("║ • Fee escalation:  {:<39} ║", format!("+{}%/attempt, max {}", self.execution.fee_escalation_pct, self.execution.max_retry_attempts));
        println!("║ • Tithe:           {:<39} ║", format!("{} bps", self.execution.tithe_bps));
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

fn parse_wei_u128(name: &str, value: &str) -> Result<u128, PipelineError> {
    value.trim().parse::<u128>().map_err(|_| {
        PipelineError::InvalidConfig(format!("{name} is not a decimal wei amount: {value:?}"))
    })
}

fn parse_wei_u256(name: &str, value: &str) -> Result<U256, PipelineError> {
    U256::from_str_radix(value.trim(), 10).map_err(|_| {
        PipelineError::InvalidConfig(format!("{name} is not a decimal wei amount: {value:?}"))
    })
}

// ============================================
// OPPORTUNITY RECORDS
// ============================================

use chrono::{DateTime, Utc};
use std::io::Write;

/// JSON-line record of a validated opportunity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpportunityRecord {
    pub timestamp: DateTime<Utc>,
    pub strategy: String,
    pub path: Vec<String>,
    pub pools: Vec<String>,
    pub hop_count: usize,
    pub start_amount_wei: String,
    pub gross_profit_wei: i128,
    pub net_profit_wei: i128,
    pub gas_estimate: u64,
    pub cumulative_slippage: f64,
    pub profitability_score: f64,
}

impl OpportunityRecord {
    pub fn append_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", serde_json::to_string(self)?)?;
        Ok(())
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.pathfinding.strategy, Strategy::Auto);
        assert_eq!(config.scan.tokens.len(), 5);
    }

    #[test]
    fn typed_accessors_parse_defaults() {
        let config = Config::default();
        assert_eq!(config.scan_tokens().unwrap().len(), 5);
        assert_eq!(
            config.start_amount().unwrap(),
            U256::from(10u64).pow(U256::from(18))
        );
        assert_eq!(config.provisional_gas_price_wei().unwrap(), 20_000_000_000);
        assert_eq!(config.default_curve_type().unwrap(), CurveType::ConstantProduct);
    }

    #[test]
    fn hop_budget_bounds_enforced() {
        let mut config = Config::default();
        config.pathfinding.max_hops = 1;
        assert!(config.validate().is_err());
        config.pathfinding.max_hops = 7;
        assert!(config.validate().is_err());
        config.pathfinding.max_hops = 4;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn ratio_fields_must_be_unit_interval() {
        let mut config = Config::default();
        config.pruning.min_pool_quality_score = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_wei_string_rejected() {
        let mut config = Config::default();
        config.scan.start_amount = "1.5e18".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn retries_require_escalation() {
        let mut config = Config::default();
        config.execution.fee_escalation_pct = 0;
        assert!(config.validate().is_err());
        config.execution.max_retry_attempts = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn toml_roundtrip_preserves_sections() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.pathfinding.max_hops, config.pathfinding.max_hops);
        assert_eq!(back.scan.start_amount, config.scan.start_amount);
        assert_eq!(back.cache.max_entries, config.cache.max_entries);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let text = r#"
            [pathfinding]
            strategy = "bellman-ford"
            max_hops = 3
        "#;
        let config: Config = toml::from_str(text).unwrap();
        assert_eq!(config.pathfinding.strategy, Strategy::BellmanFord);
        assert_eq!(config.pathfinding.max_hops, 3);
        assert_eq!(config.cache.max_entries, 256); // default preserved
    }
}
