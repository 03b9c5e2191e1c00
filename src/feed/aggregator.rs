//! Multi-source price fan-in with a deviation guard and freshness bookkeeping.
//! The price table is the only long-lived shared mutable state in the whole
//! engine: single writer on the `update` path, many readers via
//! [`PriceAggregator::snapshot_fresh`], using `parking_lot::RwLock` rather
//! than `tokio::sync::RwLock` since the update path here is pure and
//! synchronous rather than awaiting a chain RPC.

use crate::adapters::{PriceSourceAdapter, SourceQuote};
use crate::config::AggregatorConfig;
use crate::error::{ArbError, ArbResult};
use crate::events::EventProducer;
use crate::types::{AssetId, AssetPrice, AssetPriceKey};
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};

const DEVIATION_LOG_CAPACITY: usize = 256;
const DISPERSION_WINDOW_SAMPLES: usize = 8;
/// How far into the future a quote's timestamp may sit before it's rejected
/// as malformed — allows for small clock skew between sources.
const FUTURE_SKEW_MS: u64 = 2_000;

#[derive(Debug, Clone)]
pub struct DeviationEvent {
    pub key: AssetPriceKey,
    pub previous_price: f64,
    pub incoming_price: f64,
    pub deviation_fraction: f64,
    pub timestamp: u64,
}

struct Sample {
    timestamp: u64,
    price: f64,
}

pub struct PriceAggregator {
    config: AggregatorConfig,
    table: RwLock<HashMap<AssetPriceKey, AssetPrice>>,
    deviation_log: RwLock<VecDeque<DeviationEvent>>,
    recent_samples: RwLock<HashMap<AssetPriceKey, VecDeque<Sample>>>,
    events: EventProducer,
    running: AtomicBool,
    shutdown: Arc<Notify>,
}

/// Strip ticker-style quote suffixes (`USDT`, `BUSD`, `USD`) when deriving a
/// canonical asset id from a raw symbol, e.g. `"BTCUSDT"` -> `"BTC"`.
/// Longest suffix checked first so `BUSD` isn't mistaken for a trailing `USD`.
pub fn normalize_symbol(symbol: &str) -> String {
    for suffix in ["BUSD", "USDT", "USD"] {
        if symbol.len() > suffix.len() && symbol.ends_with(suffix) {
            return symbol[..symbol.len() - suffix.len()].to_string();
        }
    }
    symbol.to_string()
}

impl PriceAggregator {
    pub fn new(config: AggregatorConfig, events: EventProducer) -> Arc<Self> {
        Arc::new(Self {
            config,
            table: RwLock::new(HashMap::new()),
            deviation_log: RwLock::new(VecDeque::new()),
            recent_samples: RwLock::new(HashMap::new()),
            events,
            running: AtomicBool::new(true),
            shutdown: Arc::new(Notify::new()),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The aggregator's `update` contract. Synchronous and
    /// pure apart from the table write: validates, deviation-guards, unions
    /// sources, recomputes confidence/slippage, stores, and emits.
    pub fn update(&self, source_id: &str, quote: SourceQuote, now_ms: u64) -> ArbResult<AssetPrice> {
        if !self.is_running() {
            return Err(ArbError::Cancelled("aggregator stopped".to_string()));
        }
        if !(quote.price.is_finite()) || quote.price <= 0.0 {
            return Err(ArbError::malformed(
                source_id,
                format!("non-positive or non-finite price: {}", quote.price),
            ));
        }
        if quote.timestamp > now_ms.saturating_add(FUTURE_SKEW_MS) {
            return Err(ArbError::malformed(
                source_id,
                "quote timestamp is in the future",
            ));
        }

        let asset = AssetId::new(normalize_symbol(&quote.asset_symbol));
        let key: AssetPriceKey = (quote.chain.clone(), asset.clone());

        let previous = self.table.read().get(&key).cloned();

        if let Some(prev) = &previous {
            let deviation = (quote.price - prev.price).abs() / prev.price;
            if deviation > self.config.price_validation_threshold {
                warn!(
                    "deviation guard tripped for {:?}: {:.4} -> {:.4} ({:.2}%)",
                    key,
                    prev.price,
                    quote.price,
                    deviation * 100.0
                );
                self.record_deviation(DeviationEvent {
                    key: key.clone(),
                    previous_price: prev.price,
                    incoming_price: quote.price,
                    deviation_fraction: deviation,
                    timestamp: quote.timestamp,
                });
            }
        }

        let mut sources = previous
            .as_ref()
            .map(|p| p.sources.clone())
            .unwrap_or_default();
        if !sources.iter().any(|s| s == source_id) {
            sources.push(source_id.to_string());
        }

        self.push_sample(&key, quote.timestamp, quote.price);

        let confidence = self.compute_confidence(&key, sources.len(), quote.timestamp, now_ms);
        let liquidity = quote
            .liquidity
            .unwrap_or_else(|| previous.as_ref().map(|p| p.liquidity).unwrap_or(0.0));
        let slippage = self.compute_slippage(liquidity);

        let entry = AssetPrice {
            asset,
            chain: quote.chain,
            price: quote.price,
            liquidity,
            slippage,
            timestamp: quote.timestamp,
            sources,
        };

        self.table.write().insert(key, entry.clone());
        self.events.emit_price_update(entry.clone());
        metrics::counter!("arb_prices_ingested_total").increment(1);
        let _ = confidence; // folded into entry via slippage/age already; exposed via `confidence_of`
        Ok(entry)
    }

    /// Confidence is not stored on `AssetPrice` directly but is recomputed on demand from source count,
    /// short-window dispersion, and age — exactly the three inputs.
    pub fn confidence_of(&self, key: &AssetPriceKey, now_ms: u64) -> f64 {
        let Some(entry) = self.table.read().get(key).cloned() else {
            return 0.0;
        };
        self.compute_confidence(key, entry.sources.len(), entry.timestamp, now_ms)
    }

    fn compute_confidence(&self, key: &AssetPriceKey, source_count: usize, ts: u64, now_ms: u64) -> f64 {
        let source_factor = (source_count.min(5) as f64) / 5.0;

        let dispersion = self.dispersion_of(key);
        let dispersion_factor = (1.0 - dispersion.min(1.0)).max(0.0);

        let age_s = now_ms.saturating_sub(ts) as f64 / 1000.0;
        let age_factor = (-age_s / self.config.confidence_age_decay_s.max(1.0)).exp();

        (0.5 * source_factor + 0.3 * dispersion_factor + 0.2 * age_factor).clamp(0.0, 1.0)
    }

    fn dispersion_of(&self, key: &AssetPriceKey) -> f64 {
        let samples = self.recent_samples.read();
        let Some(window) = samples.get(key) else {
            return 0.0;
        };
        if window.len() < 2 {
            return 0.0;
        }
        let mean: f64 = window.iter().map(|s| s.price).sum::<f64>() / window.len() as f64;
        if mean <= 0.0 {
            return 0.0;
        }
        let variance: f64 = window
            .iter()
            .map(|s| (s.price - mean).powi(2))
            .sum::<f64>()
            / window.len() as f64;
        (variance.sqrt() / mean).max(0.0)
    }

    /// `clamp(reference_liquidity / liquidity, 0, 0.1)` when liquidity is
    /// known and positive, else the configured default of 10%.
    fn compute_slippage(&self, liquidity: f64) -> f64 {
        if liquidity > 0.0 {
            (self.config.reference_liquidity_usd / liquidity).clamp(0.0, 0.1)
        } else {
            0.1
        }
    }

    fn push_sample(&self, key: &AssetPriceKey, timestamp: u64, price: f64) {
        let mut samples = self.recent_samples.write();
        let window = samples.entry(key.clone()).or_insert_with(VecDeque::new);
        window.push_back(Sample { timestamp, price });
        while window.len() > DISPERSION_WINDOW_SAMPLES {
            window.pop_front();
        }
    }

    fn record_deviation(&self, event: DeviationEvent) {
        metrics::counter!("arb_deviation_events_total").increment(1);
        let mut log = self.deviation_log.write();
        log.push_back(event);
        while log.len() > DEVIATION_LOG_CAPACITY {
            log.pop_front();
        }
    }

    pub fn deviation_events(&self) -> Vec<DeviationEvent> {
        self.deviation_log.read().iter().cloned().collect()
    }

    pub fn get(&self, key: &AssetPriceKey) -> Option<AssetPrice> {
        self.table.read().get(key).cloned()
    }

    /// Snapshot of every non-stale entry — the read side of the single-writer,
    /// many-readers discipline. Callers (the graph builder) get an owned copy,
    /// never a reference into the live table.
    pub fn snapshot_fresh(&self, now_ms: u64) -> Vec<AssetPrice> {
        self.table
            .read()
            .values()
            .filter(|p| !p.is_stale(now_ms, self.config.max_age_ms))
            .cloned()
            .collect()
    }

    pub fn snapshot_all(&self) -> Vec<AssetPrice> {
        self.table.read().values().cloned().collect()
    }

    /// Evict stale entries from the table outright. Distinct from `snapshot_fresh`'s filtering, which leaves
    /// the table untouched; call this periodically to bound memory.
    pub fn evict_stale(&self, now_ms: u64) -> usize {
        let mut table = self.table.write();
        let before = table.len();
        table.retain(|_, p| !p.is_stale(now_ms, self.config.max_age_ms));
        before - table.len()
    }

    /// Supervise one configured source: calls `adapter.start` in a loop, and
    /// on any return (clean end-of-stream or error) waits the fixed
    /// `reconnect_delay` before retrying — no exponential backoff, so one
    /// flaky source can't starve the others by hogging an ever-growing
    /// backoff window that never retries.
    pub fn spawn_source(
        self: &Arc<Self>,
        adapter: Arc<dyn PriceSourceAdapter>,
        reconnect_delay: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let aggregator = self.clone();
        let shutdown = self.shutdown.clone();
        let name = adapter.name().to_string();

        tokio::spawn(async move {
            let (tx, mut rx) = mpsc::channel::<SourceQuote>(256);

            let consumer_aggregator = aggregator.clone();
            let consumer_name = name.clone();
            let consumer = tokio::spawn(async move {
                while let Some(quote) = rx.recv().await {
                    let now_ms = now_ms();
                    if let Err(e) = consumer_aggregator.update(&consumer_name, quote, now_ms) {
                        debug!("source {consumer_name} quote rejected: {e}");
                    }
                }
            });

            loop {
                if !aggregator.is_running() {
                    break;
                }
                let start = adapter.start(tx.clone());
                tokio::select! {
                    result = start => {
                        if let Err(e) = result {
                            warn!("source {name} failed: {e}");
                        } else {
                            debug!("source {name} ended stream, will reconnect");
                        }
                    }
                    _ = shutdown.notified() => break,
                }

                if !aggregator.is_running() {
                    break;
                }
                tokio::select! {
                    _ = tokio::time::sleep(reconnect_delay) => {}
                    _ = shutdown.notified() => break,
                }
            }

            drop(tx);
            let _ = consumer.await;
            info!("source {name} loop stopped");
        })
    }

    /// Stop all source loops and mark the aggregator cancelled. In-flight
    /// operations must observe this at their next suspension point rather
    /// than being killed mid-mutation.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_waiters();
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChainId;

    fn bus() -> (Arc<PriceAggregator>, EventProducer) {
        let bus = crate::events::EventBus::new(64);
        let producer = bus.producer();
        std::mem::forget(bus); // keep the dispatcher alive for the test's duration
        (PriceAggregator::new(AggregatorConfig::default(), producer.clone()), producer)
    }

    fn quote(symbol: &str, chain: &str, price: f64, liquidity: Option<f64>, ts: u64) -> SourceQuote {
        SourceQuote {
            source_id: "test".to_string(),
            asset_symbol: symbol.to_string(),
            chain: ChainId::new(chain),
            price,
            liquidity,
            timestamp: ts,
        }
    }

    #[test]
    fn normalizes_ticker_suffixes() {
        assert_eq!(normalize_symbol("BTCUSDT"), "BTC");
        assert_eq!(normalize_symbol("ETHBUSD"), "ETH");
        assert_eq!(normalize_symbol("MATICUSD"), "MATIC");
        assert_eq!(normalize_symbol("USDC"), "USDC");
    }

    #[tokio::test]
    async fn rejects_non_positive_price() {
        let (agg, _producer) = bus();
        let err = agg
            .update("src", quote("USDC", "ethereum", -1.0, None, 1_000), 1_000)
            .unwrap_err();
        assert!(matches!(err, ArbError::MalformedData { .. }));
    }

    #[tokio::test]
    async fn rejects_future_timestamp() {
        let (agg, _producer) = bus();
        let err = agg
            .update("src", quote("USDC", "ethereum", 1.0, None, 1_000_000), 1_000)
            .unwrap_err();
        assert!(matches!(err, ArbError::MalformedData { .. }));
    }

    #[tokio::test]
    async fn deviation_guard_accepts_but_logs() {
        let (agg, _producer) = bus();
        agg.update("src_a", quote("BTC", "ethereum", 100.0, Some(1.0), 1_000), 1_000)
            .unwrap();
        let updated = agg
            .update("src_b", quote("BTC", "ethereum", 108.0, Some(1.0), 1_500), 1_500)
            .unwrap();
        assert_eq!(updated.price, 108.0);
        let events = agg.deviation_events();
        assert_eq!(events.len(), 1);
        assert!((events[0].deviation_fraction - 0.08).abs() < 1e-9);
    }

    #[tokio::test]
    async fn sources_accumulate_as_a_union() {
        let (agg, _producer) = bus();
        agg.update("src_a", quote("BTC", "ethereum", 100.0, Some(1.0), 1_000), 1_000)
            .unwrap();
        let updated = agg
            .update("src_b", quote("BTC", "ethereum", 100.2, Some(1.0), 1_200), 1_200)
            .unwrap();
        assert_eq!(updated.sources, vec!["src_a".to_string(), "src_b".to_string()]);
    }

    #[tokio::test]
    async fn stale_price_excluded_from_snapshot() {
        let (agg, _producer) = bus();
        agg.update("src", quote("BTC", "ethereum", 100.0, Some(1.0), 0), 0)
            .unwrap();
        // max_age_ms default is 60_000; 120_000ms later it's stale.
        let fresh = agg.snapshot_fresh(120_000);
        assert!(fresh.is_empty());
    }

    #[tokio::test]
    async fn slippage_defaults_without_liquidity() {
        let (agg, _producer) = bus();
        let entry = agg
            .update("src", quote("BTC", "ethereum", 100.0, None, 1_000), 1_000)
            .unwrap();
        assert_eq!(entry.slippage, 0.1);
    }
}
