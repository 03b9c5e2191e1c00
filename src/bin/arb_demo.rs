//! Demo binary: wires the reference adapters into an `ArbitrageEngine` and
//! runs one detection tick over a hand-built cross-chain USDC scenario.
//! Follows the usual bootstrap shape (tracing init, config load, engine
//! construction, run) with the relay/Unix-socket plumbing replaced by a
//! clap-driven one-shot demo.

use clap::Parser;
use tracing::info;
use xchain_arb_core::adapters::{SourceQuote, StaticBridgeCatalog};
use xchain_arb_core::config::EngineConfig;
use xchain_arb_core::engine::ArbitrageEngine;
use xchain_arb_core::market::MarketSnapshot;
use xchain_arb_core::types::{BridgeConfig, BridgeFee, BridgeId, BridgeKind, ChainId};

#[derive(Parser, Debug)]
#[command(name = "arb-demo", about = "Run one arbitrage detection tick against a scripted price scenario")]
struct Args {
    /// Trade notional in USD evaluated against each detected cycle.
    #[arg(long, default_value_t = 250_000.0)]
    notional: f64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info,xchain_arb_core=debug").init();

    if let Err(e) = metrics_exporter_prometheus::PrometheusBuilder::new().install() {
        tracing::warn!("prometheus exporter not installed: {e}");
    }

    let args = Args::parse();
    let config = EngineConfig::from_env().unwrap_or_else(|e| {
        tracing::warn!("falling back to default config: {e}");
        EngineConfig::default()
    });

    let engine = ArbitrageEngine::new(config)?;
    info!("arbitrage engine initialized");

    let now_ms = 1_700_000_000_000;
    let ethereum = ChainId::new("ethereum");
    let polygon = ChainId::new("polygon");

    engine.aggregator.update(
        "demo-oracle",
        SourceQuote {
            source_id: "demo-oracle".to_string(),
            asset_symbol: "USDC".to_string(),
            chain: ethereum.clone(),
            price: 1.0000,
            liquidity: Some(10_000_000.0),
            timestamp: now_ms,
        },
        now_ms,
    )?;
    engine.aggregator.update(
        "demo-oracle",
        SourceQuote {
            source_id: "demo-oracle".to_string(),
            asset_symbol: "USDC".to_string(),
            chain: polygon.clone(),
            price: 0.9965,
            liquidity: Some(10_000_000.0),
            timestamp: now_ms,
        },
        now_ms,
    )?;

    let bridges = StaticBridgeCatalog::new(vec![BridgeConfig {
        id: BridgeId::new("demo-bridge"),
        kind: BridgeKind::Canonical,
        supported_chains: vec![ethereum.clone(), polygon.clone()],
        trust_level: 95,
        avg_processing_seconds: 900,
        fee: BridgeFee { base: 5.0, percentage: 0.001, min: 5.0, max: 10_000.0 },
        contract_per_chain: Default::default(),
    }]);

    let mut snapshot = MarketSnapshot::default();
    snapshot.chain_gas_price_gwei.insert(ethereum.clone(), 40.0);
    snapshot.chain_gas_price_gwei.insert(polygon.clone(), 60.0);
    snapshot.chain_native_usd_price.insert(ethereum.clone(), 3000.0);
    snapshot.chain_native_usd_price.insert(polygon.clone(), 0.8);

    let evaluations = engine.run_detection_tick(&bridges, &snapshot, args.notional, now_ms).await;

    for evaluation in &evaluations {
        info!(
            opportunity_id = %evaluation.opportunity_id,
            final_score = evaluation.final_score,
            priority = %evaluation.priority,
            net_profit = evaluation.key_metrics.net_profit_usd,
            action = ?evaluation.recommendation.action,
            "evaluation"
        );
    }

    if evaluations.is_empty() {
        info!("no opportunities detected for this scenario");
    }

    Ok(())
}
