//! External collaborator ports.
//!
//! These traits are capability interfaces, not concrete integrations — their
//! production implementations (chain RPC clients, bridge aggregator APIs,
//! a real KV store) are explicitly out of scope. What ships
//! here are the port definitions plus small in-memory reference
//! implementations used by tests and the demo binary, the same way a
//! pluggable strategy is kept behind an `async_trait` object rather than a
//! concrete struct.

use crate::error::ArbResult;
use crate::evaluator::ComprehensiveEvaluation;
use crate::types::{BridgeConfig, BridgeId, ChainId};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// What a price source adapter pushes into the aggregator's sink.
#[derive(Debug, Clone)]
pub struct SourceQuote {
    pub source_id: String,
    pub asset_symbol: String,
    pub chain: ChainId,
    pub price: f64,
    pub liquidity: Option<f64>,
    pub timestamp: u64,
}

/// Port: a price source, pull or push or oracle. `start` begins emitting
/// `SourceQuote`s into `sink`; the call is expected to run until the
/// connection ends (push) or `stop()` is invoked (pull). Implementations
/// must be idempotent on `stop`.
#[async_trait]
pub trait PriceSourceAdapter: Send + Sync {
    async fn start(&self, sink: mpsc::Sender<SourceQuote>) -> ArbResult<()>;
    async fn stop(&self) -> ArbResult<()>;
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy)]
pub struct GasPriceInfo {
    pub price_gwei: f64,
    pub base_fee_gwei: Option<f64>,
    pub priority_fee_gwei: Option<f64>,
}

/// Port: chain-level facts needed by the cost calculators and graph builder.
/// Failures surface as "chain unavailable"; the graph builder omits edges
/// sourced from unavailable chains rather than failing the whole tick.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    async fn current_gas_price(&self, chain: &ChainId) -> ArbResult<GasPriceInfo>;
    async fn block_number(&self, chain: &ChainId) -> ArbResult<u64>;
    async fn estimate_gas(&self, chain: &ChainId, tx_kind: &str) -> ArbResult<u64>;
}

/// Port: which bridges connect a pair of chains, and what they'd charge.
pub trait BridgeCatalog: Send + Sync {
    fn bridges(&self, from: &ChainId, to: &ChainId) -> Vec<BridgeConfig>;
    fn fee_estimate(&self, bridge: &BridgeId, amount: f64) -> Option<f64>;
}

/// Port: optional warm-start store for custom asset mappings.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> ArbResult<()>;
    async fn get(&self, key: &str) -> ArbResult<Option<String>>;
    async fn exists(&self, key: &str) -> ArbResult<bool>;
}

/// Port: receives completed evaluations. Delivery is by value (copy-on-emit)
/// so subscribers never see a shared reference into engine state.
pub trait OpportunitySubscriber: Send + Sync {
    fn on_opportunity(&self, evaluation: ComprehensiveEvaluation);
}

// ---------------------------------------------------------------------
// Reference (test/demo-only) implementations.
// ---------------------------------------------------------------------

/// A price source that replays a fixed schedule of quotes, one per `tick()`
/// call. Intended for tests and the demo binary — not a production adapter.
pub struct FixedScheduleSource {
    name: String,
    schedule: parking_lot::Mutex<Vec<SourceQuote>>,
}

impl FixedScheduleSource {
    pub fn new(name: impl Into<String>, schedule: Vec<SourceQuote>) -> Self {
        Self {
            name: name.into(),
            schedule: parking_lot::Mutex::new(schedule),
        }
    }
}

#[async_trait]
impl PriceSourceAdapter for FixedScheduleSource {
    async fn start(&self, sink: mpsc::Sender<SourceQuote>) -> ArbResult<()> {
        let quotes: Vec<SourceQuote> = self.schedule.lock().drain(..).collect();
        for quote in quotes {
            if sink.send(quote).await.is_err() {
                break;
            }
        }
        Ok(())
    }

    async fn stop(&self) -> ArbResult<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A `BridgeCatalog` backed by a fixed list, for tests and demos.
#[derive(Default)]
pub struct StaticBridgeCatalog {
    bridges: Vec<BridgeConfig>,
}

impl StaticBridgeCatalog {
    pub fn new(bridges: Vec<BridgeConfig>) -> Self {
        Self { bridges }
    }
}

impl BridgeCatalog for StaticBridgeCatalog {
    fn bridges(&self, from: &ChainId, to: &ChainId) -> Vec<BridgeConfig> {
        self.bridges
            .iter()
            .filter(|b| b.supports(from, to))
            .cloned()
            .collect()
    }

    fn fee_estimate(&self, bridge: &BridgeId, amount: f64) -> Option<f64> {
        self.bridges
            .iter()
            .find(|b| &b.id == bridge)
            .map(|b| b.fee.estimate(amount))
    }
}

/// A `ChainAdapter` backed by a fixed table of gas prices, for tests and demos.
#[derive(Default)]
pub struct StaticChainAdapter {
    gas_prices: HashMap<ChainId, GasPriceInfo>,
    block_numbers: HashMap<ChainId, u64>,
}

impl StaticChainAdapter {
    pub fn new(gas_prices: HashMap<ChainId, GasPriceInfo>) -> Self {
        Self {
            gas_prices,
            block_numbers: HashMap::new(),
        }
    }
}

#[async_trait]
impl ChainAdapter for StaticChainAdapter {
    async fn current_gas_price(&self, chain: &ChainId) -> ArbResult<GasPriceInfo> {
        self.gas_prices.get(chain).copied().ok_or_else(|| {
            crate::error::ArbError::transient("chain_adapter", format!("{chain} unavailable"))
        })
    }

    async fn block_number(&self, chain: &ChainId) -> ArbResult<u64> {
        Ok(self.block_numbers.get(chain).copied().unwrap_or_default())
    }

    async fn estimate_gas(&self, _chain: &ChainId, tx_kind: &str) -> ArbResult<u64> {
        Ok(match tx_kind {
            "swap" => 150_000,
            "bridge" => 200_000,
            _ => 100_000,
        })
    }
}

/// An in-memory `KvStore` for tests and the demo binary.
#[derive(Default, Clone)]
pub struct InMemoryKvStore {
    map: Arc<DashMap<String, String>>,
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn set(&self, key: &str, value: &str, _ttl: Option<Duration>) -> ArbResult<()> {
        self.map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> ArbResult<Option<String>> {
        Ok(self.map.get(key).map(|v| v.clone()))
    }

    async fn exists(&self, key: &str) -> ArbResult<bool> {
        Ok(self.map.contains_key(key))
    }
}

/// A subscriber that just records everything it receives, for tests.
#[derive(Default)]
pub struct RecordingSubscriber {
    pub received: parking_lot::Mutex<Vec<ComprehensiveEvaluation>>,
}

impl OpportunitySubscriber for RecordingSubscriber {
    fn on_opportunity(&self, evaluation: ComprehensiveEvaluation) {
        self.received.lock().push(evaluation);
    }
}
