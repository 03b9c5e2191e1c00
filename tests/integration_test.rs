//! End-to-end scenarios, exercised through the public crate API the way
//! `arb_demo` does. Follows a "numbered step, assert, log" integration test
//! shape, adapted to this crate's pure-planning scope (no RPC provider, no
//! on-chain registry).

use xchain_arb_core::adapters::{SourceQuote, StaticBridgeCatalog};
use xchain_arb_core::config::EngineConfig;
use xchain_arb_core::engine::ArbitrageEngine;
use xchain_arb_core::market::MarketSnapshot;
use xchain_arb_core::types::{Action, BridgeConfig, BridgeFee, BridgeId, BridgeKind, ChainId, Priority};

fn quote(source_id: &str, asset_symbol: &str, chain: ChainId, price: f64, liquidity: f64, timestamp: u64) -> SourceQuote {
    SourceQuote {
        source_id: source_id.to_string(),
        asset_symbol: asset_symbol.to_string(),
        chain,
        price,
        liquidity: Some(liquidity),
        timestamp,
    }
}

/// Scenario 1: single-chain trivial graph.
#[tokio::test]
async fn single_chain_trivial_graph_detects_low_or_medium_priority_opportunity() {
    let engine = ArbitrageEngine::new(EngineConfig::default()).expect("valid config");
    let now_ms = 10_000;
    let ethereum = ChainId::new("ethereum");

    engine.aggregator.update("oracle", quote("oracle", "USDC", ethereum.clone(), 1.00, 5_000_000.0, now_ms), now_ms).unwrap();
    engine.aggregator.update("oracle", quote("oracle", "DAI", ethereum.clone(), 1.005, 5_000_000.0, now_ms), now_ms).unwrap();

    let bridges = StaticBridgeCatalog::new(vec![]);
    let snapshot = MarketSnapshot::default();
    let evaluations = engine.run_detection_tick(&bridges, &snapshot, 10_000.0, now_ms).await;

    assert!(!evaluations.is_empty(), "expected at least one evaluated cycle");
    assert!(evaluations.iter().any(|e| matches!(e.priority, Priority::Low | Priority::Medium | Priority::High)));
}

/// Scenario 2: cross-chain USDC arbitrage with a real spread and bridge costs.
#[tokio::test]
async fn cross_chain_usdc_arbitrage_is_profitable_and_actionable() {
    let engine = ArbitrageEngine::new(EngineConfig::default()).expect("valid config");
    let now_ms = 10_000;
    let ethereum = ChainId::new("ethereum");
    let polygon = ChainId::new("polygon");

    engine.aggregator.update("oracle", quote("oracle", "USDC", ethereum.clone(), 1.0000, 10_000_000.0, now_ms), now_ms).unwrap();
    engine.aggregator.update("oracle", quote("oracle", "USDC", polygon.clone(), 0.9965, 10_000_000.0, now_ms), now_ms).unwrap();

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

    let evaluations = engine.run_detection_tick(&bridges, &snapshot, 250_000.0, now_ms).await;

    assert!(!evaluations.is_empty(), "expected the Ethereum/Polygon USDC spread to be detected");
    let best = &evaluations[0];
    assert!(best.key_metrics.net_profit_usd > 0.0, "net profit should be positive given the spread");
    assert!(matches!(best.priority, Priority::High | Priority::Medium | Priority::Critical));
    assert!(matches!(best.recommendation.action, Action::ExecuteImmediately | Action::ExecuteOptimized | Action::MonitorClosely));
}

/// Scenario 3: an unprofitable long path is rejected with high confidence.
#[tokio::test]
async fn unprofitable_long_path_is_ignored_and_rejected() {
    let engine = ArbitrageEngine::new(EngineConfig::default()).expect("valid config");
    let now_ms = 100_000;
    let ethereum = ChainId::new("ethereum");
    let fantom = ChainId::new("fantom");

    // Stale-ish (45s old) and a thin, cost-eaten spread.
    engine.aggregator.update("oracle", quote("oracle", "USDC", ethereum.clone(), 1.0000, 50_000.0, now_ms - 45_000), now_ms).unwrap();
    engine.aggregator.update("oracle", quote("oracle", "USDC", fantom.clone(), 1.0012, 50_000.0, now_ms - 45_000), now_ms).unwrap();

    let bridges = StaticBridgeCatalog::new(vec![BridgeConfig {
        id: BridgeId::new("weak-bridge"),
        kind: BridgeKind::ThirdParty,
        supported_chains: vec![ethereum.clone(), fantom.clone()],
        trust_level: 62,
        avg_processing_seconds: 1_800,
        fee: BridgeFee { base: 85.0, percentage: 0.002, min: 85.0, max: 10_000.0 },
        contract_per_chain: Default::default(),
    }]);

    let mut snapshot = MarketSnapshot::default();
    snapshot.chain_gas_price_gwei.insert(ethereum.clone(), 150.0);
    snapshot.chain_gas_price_gwei.insert(fantom.clone(), 150.0);
    snapshot.chain_native_usd_price.insert(ethereum.clone(), 3000.0);
    snapshot.chain_native_usd_price.insert(fantom.clone(), 3000.0);

    let evaluations = engine.run_detection_tick(&bridges, &snapshot, 10_000.0, now_ms).await;

    for evaluation in &evaluations {
        if evaluation.key_metrics.net_profit_usd <= 0.0 {
            assert_eq!(evaluation.priority, Priority::Ignore);
            assert_eq!(evaluation.recommendation.action, Action::Reject);
            assert!(evaluation.recommendation.confidence > 0.8);
        }
    }
}

/// Scenario 4: a price older than `max_age_ms` is excluded from graph construction.
#[tokio::test]
async fn stale_price_is_excluded_from_the_graph() {
    let engine = ArbitrageEngine::new(EngineConfig::default()).expect("valid config");
    let now_ms = 200_000;
    let ethereum = ChainId::new("ethereum");

    // Older than the default 60s max_age.
    engine.aggregator.update("oracle", quote("oracle", "USDC", ethereum.clone(), 1.00, 1_000_000.0, 0), now_ms).unwrap();

    let fresh = engine.aggregator.snapshot_fresh(now_ms);
    assert!(fresh.is_empty(), "a quote older than max_age_ms must not appear in the fresh snapshot");
}

/// Scenario 5: a deviating quote is still recorded but logged as a deviation event.
#[tokio::test]
async fn deviation_guard_logs_but_does_not_block_the_update() {
    let engine = ArbitrageEngine::new(EngineConfig::default()).expect("valid config");
    let now_ms = 10_000;
    let ethereum = ChainId::new("ethereum");

    engine.aggregator.update("oracle-a", quote("oracle-a", "USDC", ethereum.clone(), 1.00, 1_000_000.0, now_ms), now_ms).unwrap();
    let result = engine
        .aggregator
        .update("oracle-b", quote("oracle-b", "USDC", ethereum.clone(), 1.50, 1_000_000.0, now_ms), now_ms)
        .unwrap();

    assert_eq!(result.price, 1.50, "the deviating quote is still recorded");
    assert!(!engine.aggregator.deviation_events().is_empty(), "the deviation must be logged");
}

/// Scenario 6: cycle detection is deterministic across repeated runs on the same graph.
#[tokio::test]
async fn cycle_detection_is_deterministic() {
    let engine = ArbitrageEngine::new(EngineConfig::default()).expect("valid config");
    let now_ms = 10_000;
    let ethereum = ChainId::new("ethereum");

    engine.aggregator.update("oracle", quote("oracle", "USDC", ethereum.clone(), 1.00, 5_000_000.0, now_ms), now_ms).unwrap();
    engine.aggregator.update("oracle", quote("oracle", "DAI", ethereum.clone(), 1.01, 5_000_000.0, now_ms), now_ms).unwrap();
    engine.aggregator.update("oracle", quote("oracle", "USDT", ethereum.clone(), 0.995, 5_000_000.0, now_ms), now_ms).unwrap();

    let bridges = StaticBridgeCatalog::new(vec![]);
    let snapshot = MarketSnapshot::default();

    let first = engine.run_detection_tick(&bridges, &snapshot, 10_000.0, now_ms).await;
    let second = engine.run_detection_tick(&bridges, &snapshot, 10_000.0, now_ms).await;

    let first_ids: Vec<_> = first.iter().map(|e| e.key_metrics.net_profit_usd).collect();
    let second_ids: Vec<_> = second.iter().map(|e| e.key_metrics.net_profit_usd).collect();
    assert_eq!(first.len(), second.len());
    assert_eq!(first_ids, second_ids, "identical inputs must yield identically-ranked results");
}
