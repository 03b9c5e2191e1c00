//! Top-level orchestration: strict happens-before chain
//! "price snapshot -> graph build -> cycle detect -> evaluate -> emit"
//! within a single detection tick, generalized from a single relay-fed
//! engine to the abstract (chain, asset) universe this crate models.

use crate::adapters::BridgeCatalog;
use crate::asset_map::AssetMapper;
use crate::circuit_breaker::EvaluationCircuitBreaker;
use crate::config::EngineConfig;
use crate::error::ArbResult;
use crate::evaluator::{self, ComprehensiveEvaluation, OpportunityCache};
use crate::events::EventBus;
use crate::feed::PriceAggregator;
use crate::graph::{self, ArbitrageGraph};
use crate::cycle;
use crate::market::MarketSnapshot;
use crate::types::{ArbitrageOpportunity, AssetPriceKey, Cycle, EdgeKind, ExecutionPath, ExecutionStep, StepKind};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const DEFAULT_SWAP_GAS_UNITS: f64 = 150_000.0;
const DEFAULT_BRIDGE_GAS_UNITS: f64 = 200_000.0;

/// Walks a detected cycle's nodes and reconstructs the concrete execution
/// path by picking, for each hop, the best-ranked parallel edge between the
/// two nodes (same tie-break family as the cycle detector: lowest weight,
/// then lowest `cost_time_s`).
fn execution_path_for_cycle(cycle: &Cycle, graph: &ArbitrageGraph) -> ExecutionPath {
    let n = cycle.path.len();
    let mut steps = Vec::with_capacity(n);
    for i in 0..n {
        let from = &cycle.path[i];
        let to = &cycle.path[(i + 1) % n];
        let Some(edges) = graph.edges.get(from) else { continue };
        let best = edges
            .iter()
            .filter(|e| &e.to == to)
            .min_by(|a, b| a.weight.partial_cmp(&b.weight).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.cost_time_s.partial_cmp(&b.cost_time_s).unwrap_or(std::cmp::Ordering::Equal)));
        let Some(edge) = best else { continue };
        let kind = match edge.kind {
            EdgeKind::Swap => StepKind::Swap,
            EdgeKind::Bridge => StepKind::Bridge,
        };
        let gas_estimate = match edge.kind {
            // Real gas-unit counts come from simulating the actual calldata
            // (out of scope here); these are the commonly observed ballpark
            // figures for a DEX swap vs. a bridge deposit/claim pair.
            EdgeKind::Swap => DEFAULT_SWAP_GAS_UNITS,
            EdgeKind::Bridge => DEFAULT_BRIDGE_GAS_UNITS,
        };
        steps.push(ExecutionStep {
            kind,
            chain: from.0.clone(),
            protocol: edge.protocol.clone(),
            contract: edge.contract.clone(),
            gas_estimate,
            time_estimate_s: edge.cost_time_s,
            dependencies: if i == 0 { vec![] } else { vec![i - 1] },
        });
    }
    steps
}

fn opportunity_from_cycle(cycle: &Cycle, notional: f64, now_ms: u64) -> ArbitrageOpportunity {
    let source = &cycle.path[0];
    let target = cycle.path.get(1).unwrap_or(source);
    let expected_profit = cycle.profit_margin.max(0.0) * notional;
    let net_profit = expected_profit - cycle.gas_cost;
    ArbitrageOpportunity {
        id: Uuid::new_v4().to_string(),
        asset: source.1.clone(),
        source_chain: source.0.clone(),
        target_chain: target.0.clone(),
        source_price: 0.0,
        target_price: 0.0,
        notional,
        expected_profit,
        est_gas_cost: cycle.gas_cost,
        bridge_fee: 0.0,
        net_profit,
        profit_margin: if notional > 0.0 { net_profit / notional } else { 0.0 },
        execution_time_s: cycle.execution_time_s,
        risk_score: 0.0,
        confidence: cycle.confidence,
        timestamp: now_ms,
        execution_paths: vec![],
    }
}

/// The engine owns the price table (via the aggregator), the asset
/// equivalence table, event fan-out, the evaluation circuit breaker, and
/// the bounded opportunity cache. One detection tick at a time; concurrent
/// ticks are the caller's responsibility to serialize if desired.
pub struct ArbitrageEngine {
    pub config: EngineConfig,
    pub aggregator: Arc<PriceAggregator>,
    pub asset_mapper: AssetMapper,
    pub events: EventBus,
    pub cache: Arc<OpportunityCache>,
    pub circuit_breaker: Arc<EvaluationCircuitBreaker>,
}

impl ArbitrageEngine {
    pub fn new(config: EngineConfig) -> ArbResult<Self> {
        config.validate()?;
        let events = EventBus::new(1_024);
        let aggregator = PriceAggregator::new(config.aggregator.clone(), events.producer());
        let asset_mapper = AssetMapper::bootstrap();
        let cache = crate::evaluator::new_shared_cache(1_000);
        let circuit_breaker = Arc::new(EvaluationCircuitBreaker::new(config.circuit_breaker));

        Ok(Self { config, aggregator, asset_mapper, events, cache, circuit_breaker })
    }

    /// Run one full detection tick: snapshot -> graph -> cycles -> evaluate
    /// -> emit. Returns the evaluations produced this tick, already sorted
    /// descending by `final_score`.
    pub async fn run_detection_tick(&self, bridges: &dyn BridgeCatalog, snapshot: &MarketSnapshot, notional: f64, now_ms: u64) -> Vec<ComprehensiveEvaluation> {
        if !self.circuit_breaker.allows_evaluation() {
            warn!("evaluation circuit breaker open, skipping detection tick");
            return Vec::new();
        }

        let tick_started = std::time::Instant::now();
        let prices = self.aggregator.snapshot_fresh(now_ms);
        let graph = graph::build_graph(&prices, &self.asset_mapper, bridges, &self.config.graph);
        let cycles = cycle::detect_cycles(&graph, self.config.arbitrage.min_profit_threshold, self.config.arbitrage.max_cycles_per_tick);
        metrics::counter!("arb_cycles_found_total").increment(cycles.len() as u64);

        info!(node_count = graph.node_count(), edge_count = graph.edge_count(), cycle_count = cycles.len(), "detection tick");

        let mut batch = Vec::with_capacity(cycles.len());
        for found in &cycles {
            let path = execution_path_for_cycle(found, &graph);
            if path.is_empty() {
                continue;
            }
            let opportunity = opportunity_from_cycle(found, notional, now_ms);
            let keys: Vec<AssetPriceKey> = found.path.clone();
            batch.push((opportunity, path, keys));
        }

        let evaluations = evaluator::evaluate_batch(
            &batch,
            snapshot,
            now_ms,
            &self.config.evaluator,
            &self.config.cost_constants,
            &self.config.risk_weights,
            &self.config.feasibility_weights,
            &self.config.optimizer,
            &self.config.arbitrage,
        )
        .await;

        for evaluation in &evaluations {
            self.circuit_breaker.record_success(evaluation.priority);
            self.cache.insert(evaluation.clone());
            if evaluation.priority != crate::types::Priority::Ignore {
                self.events.producer().emit_opportunity(evaluation.clone());
                metrics::counter!("arb_opportunities_emitted_total").increment(1);
            }
        }

        metrics::histogram!("arb_evaluation_latency_seconds").record(tick_started.elapsed().as_secs_f64());
        evaluations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::StaticBridgeCatalog;
    use crate::adapters::SourceQuote;

    fn now() -> u64 {
        10_000
    }

    #[tokio::test]
    async fn single_chain_trivial_graph_yields_an_opportunity() {
        let config = EngineConfig::default();
        let engine = ArbitrageEngine::new(config).expect("valid config");

        engine
            .aggregator
            .update(
                "test-source",
                SourceQuote {
                    source_id: "test-source".to_string(),
                    asset_symbol: "USDC".to_string(),
                    chain: crate::types::ChainId::new("ethereum"),
                    price: 1.00,
                    liquidity: Some(5_000_000.0),
                    timestamp: now(),
                },
                now(),
            )
            .expect("valid quote");
        engine
            .aggregator
            .update(
                "test-source",
                SourceQuote {
                    source_id: "test-source".to_string(),
                    asset_symbol: "DAI".to_string(),
                    chain: crate::types::ChainId::new("ethereum"),
                    price: 1.005,
                    liquidity: Some(5_000_000.0),
                    timestamp: now(),
                },
                now(),
            )
            .expect("valid quote");

        let bridges = StaticBridgeCatalog::new(vec![]);
        let snapshot = MarketSnapshot::default();
        let evaluations = engine.run_detection_tick(&bridges, &snapshot, 10_000.0, now()).await;
        assert!(!evaluations.is_empty());
    }
}
