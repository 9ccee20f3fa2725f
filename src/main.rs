//! Prospector - multi-hop arbitrage discovery and validation.
//!
//! Run with: cargo run -- --pools pools.json
//!
//! Each scan cycle walks the pipeline end to end: refresh pool data, build
//! and prune the market graph, search for closed cycles, evaluate against
//! the gas oracle, and validate the survivors for execution. Ctrl-C stops
//! the loop at the next stage boundary.

use alloy_primitives::U256;
use clap::Parser;
use color_eyre::eyre::{eyre, Result};
use console::style;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod evaluate;
mod execution;
mod gas_oracle;
mod market;
mod pipeline;
mod pruning;
mod scorer;
mod search;
mod slippage;

use chrono::Utc;
use config::{Config, OpportunityRecord};
use gas_oracle::HttpGasFeed;
use market::ManifestPoolProvider;
use pipeline::Pipeline;
use scorer::DepthHeuristicScorer;
use search::ArbitragePath;

#[derive(Parser, Debug)]
#[command(name = "prospector", about = "DEX arbitrage discovery pipeline")]
struct Cli {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pool manifest snapshot (JSON) served to the pipeline.
    #[arg(long)]
    pools: PathBuf,

    /// Run a single scan cycle and exit.
    #[arg(long)]
    once: bool,
}

fn print_banner() {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!(
        "{}",
        style(" ⛏  PROSPECTOR - Arbitrage Discovery Pipeline").cyan().bold()
    );
    println!(
        "{}",
        style("    Graph Search | AMM Slippage Model | Gas-Aware Validation").cyan()
    );
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!();
}

fn print_path(index: usize, path: &ArbitragePath) {
    let mut route = String::new();
    for hop in &path.hops {
        route.push_str(&format!("{}…", &format!("{:?}", hop.token_in)[..8]));
        route.push_str(&format!(" -[{}]-> ", hop.dex));
    }
    route.push_str(&format!(
        "{}…",
        &format!("{:?}", path.hops.last().unwrap().token_out)[..8]
    ));

    let net = path.net_profit.unwrap_or(path.gross_profit);
    println!(
        "  {}. {} | {} | net {} wei | {} hops | slippage {:.4}%{}",
        index + 1,
        style("💰 PROFITABLE").green().bold(),
        style(route).cyan(),
        net,
        path.hop_count(),
        path.cumulative_slippage * 100.0,
        if path.flagged {
            style(" [impact warning]").yellow().to_string()
        } else {
            String::new()
        }
    );
}

fn record_opportunity(config: &Config, path: &ArbitragePath, strategy: &str) {
    let Some(log_path) = &config.opportunity_log_path else {
        return;
    };
    let record = OpportunityRecord {
        timestamp: Utc::now(),
        strategy: strategy.to_string(),
        path: path
            .hops
            .iter()
            .map(|h| format!("{:?}", h.token_in))
            .collect(),
        pools: path.hops.iter().map(|h| format!("{:?}", h.pool)).collect(),
        hop_count: path.hop_count(),
        start_amount_wei: path.start_amount.to_string(),
        gross_profit_wei: path.gross_profit,
        net_profit_wei: path.net_profit.unwrap_or(0),
        gas_estimate: path.gas_estimate,
        cumulative_slippage: path.cumulative_slippage,
        profitability_score: path.profitability.unwrap_or(0.0),
    };
    if let Err(e) = record.append_to_file(log_path) {
        warn!(%e, "failed to append opportunity record");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("prospector=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    print_banner();

    let config = Config::load(cli.config.as_ref())?;
    if let Err(e) = config.validate() {
        error!("configuration validation failed: {e}");
        return Err(e);
    }
    config.print_summary();
    println!();

    let tokens = config.scan_tokens().map_err(|e| eyre!(e.to_string()))?;
    let start_amount: U256 = config.start_amount().map_err(|e| eyre!(e.to_string()))?;
    let executor = config.executor_address();
    let interval = config.scan_interval();

    let provider = Arc::new(ManifestPoolProvider::from_file(&cli.pools).map_err(|e| eyre!(e.to_string()))?);
    let gas_feed = Arc::new(HttpGasFeed::new(
        config.gas.feed_url.clone(),
        config.gas.api_key.clone(),
    ));

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested, finishing at the next stage boundary");
                shutdown.store(true, Ordering::Relaxed);
            }
        });
    }

    let mut pipeline = Pipeline::new(
        config.clone(),
        provider,
        gas_feed,
        Some(Arc::new(DepthHeuristicScorer)),
        None, // dry-run simulator is wired in by the hosting deployment
        shutdown.clone(),
    )
    .map_err(|e| eyre!(e.to_string()))?;

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut cycle: u64 = 0;

    loop {
        ticker.tick().await;
        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        cycle += 1;

        let started = std::time::Instant::now();
        let paths = match pipeline.find_opportunities(&tokens, start_amount).await {
            Ok(paths) => paths,
            Err(e) => {
                // Pool-level failures never abort the loop; the next tick
                // retries with whatever snapshot survives.
                warn!(cycle, %e, "scan cycle skipped");
                if cli.once {
                    break;
                }
                continue;
            }
        };
        let stats = pipeline.last_stats();

        println!();
        println!(
            "{}",
            style(format!(
                "═══ SCAN {} ({} pools, {} edges, {} pruned, {:?}) ═══",
                cycle,
                stats.pools,
                stats.graph_edges,
                stats.pruned_edges,
                started.elapsed()
            ))
            .blue()
            .bold()
        );

        if paths.is_empty() {
            println!(
                "{}",
                style("  No profitable cycles this round. Normal in calm markets.").dim()
            );
        } else {
            let strategy = config.pathfinding.strategy.to_string();
            for (i, path) in paths.iter().take(5).enumerate() {
                print_path(i, path);
                record_opportunity(&config, path, &strategy);
            }

            if let Some(executor) = executor {
                let best = &paths[0];
                match pipeline.validate_execution(best, executor).await {
                    execution::ExecutionDecision::Executable(_, params) => {
                        println!(
                            "  {} gas limit {} | min out {} | pricing {:?}",
                            style("✓ validated for execution").green(),
                            params.gas_limit,
                            params.min_final_amount,
                            params.pricing
                        );
                    }
                    execution::ExecutionDecision::Rejected(reason) => {
                        println!("  {} {}", style("✗ rejected:").red(), reason);
                    }
                    execution::ExecutionDecision::Deferred(reason) => {
                        println!("  {} {}", style("○ deferred:").yellow(), reason);
                    }
                }
            } else {
                println!(
                    "  {}",
                    style("(no executor address configured - discovery only)").dim()
                );
            }
        }

        let (hits, misses) = pipeline.cache_hit_rate();
        info!(cycle, hits, misses, "cycle finished");

        if cli.once {
            break;
        }
    }

    println!();
    println!("{}", style(" ✅ SCAN LOOP STOPPED").green().bold());
    Ok(())
}
