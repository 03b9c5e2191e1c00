//! Shared identifiers and data-model records.
//!
//! Identifiers are opaque, string-backed newtypes: equality is structural,
//! and nothing downstream is allowed to assume a particular address format
//! (EVM, Solana, Cosmos, ...). That is deliberate — the core models a
//! cross-chain universe, not a single virtual machine.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(ChainId);
string_id!(AssetId);
string_id!(BridgeId);
string_id!(Protocol);
string_id!(Address);

/// `(chain, asset)` — the key of the price table and the node id of the graph.
pub type AssetPriceKey = (ChainId, AssetId);

/// A single aggregated price entry, keyed by `(chain, asset)` in the feed aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetPrice {
    pub asset: AssetId,
    pub chain: ChainId,
    /// Always `> 0`; enforced at ingestion, never at the read side.
    pub price: f64,
    pub liquidity: f64,
    /// 0..1
    pub slippage: f64,
    /// Monotonic milliseconds, not wall-clock-adjustable.
    pub timestamp: u64,
    pub sources: Vec<String>,
}

impl AssetPrice {
    pub fn key(&self) -> AssetPriceKey {
        (self.chain.clone(), self.asset.clone())
    }

    pub fn is_stale(&self, now_ms: u64, max_age_ms: u64) -> bool {
        now_ms.saturating_sub(self.timestamp) > max_age_ms
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    Pull,
    Push,
    Oracle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSource {
    pub name: String,
    pub kind: SourceKind,
    pub endpoint: String,
    pub chains_served: Vec<ChainId>,
    /// Lower is preferred.
    pub priority: i32,
    pub rate_limit_ms: u64,
}

/// Per-chain facts about a canonical asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainAssetInfo {
    pub address: Address,
    pub decimals: u8,
    pub is_native: bool,
    pub is_wrapped: bool,
    pub wrapped_of: Option<AssetId>,
    pub native_of: Option<ChainId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BridgeKind {
    Canonical,
    ThirdParty,
    Optimistic,
    Zk,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BridgeFee {
    pub base: f64,
    pub percentage: f64,
    pub min: f64,
    pub max: f64,
}

impl BridgeFee {
    /// `clamp(base + notional * percentage, min, max)`.
    pub fn estimate(&self, notional: f64) -> f64 {
        let raw = self.base + notional * self.percentage;
        raw.clamp(self.min, self.max)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub id: BridgeId,
    pub kind: BridgeKind,
    pub supported_chains: Vec<ChainId>,
    /// 0..100
    pub trust_level: u8,
    pub avg_processing_seconds: u64,
    pub fee: BridgeFee,
    pub contract_per_chain: std::collections::HashMap<ChainId, Address>,
}

impl BridgeConfig {
    pub fn supports(&self, a: &ChainId, b: &ChainId) -> bool {
        self.supported_chains.contains(a) && self.supported_chains.contains(b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeKind {
    Swap,
    Bridge,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub to: AssetPriceKey,
    pub kind: EdgeKind,
    pub cost_absolute: f64,
    pub cost_time_s: f64,
    pub protocol: Protocol,
    pub contract: Option<Address>,
    /// Precomputed Bellman-Ford weight: `-(ln(p_v/p_u) - cost_absolute/p_u)`.
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub node_id: AssetPriceKey,
    pub price: f64,
    pub liquidity: f64,
    pub last_update: u64,
}

/// A found, profitable, closed walk through the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cycle {
    /// `len >= 3`; first and last are conceptually the same node (not repeated in storage).
    pub path: Vec<AssetPriceKey>,
    pub profit_margin: f64,
    pub gas_cost: f64,
    pub execution_time_s: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKind {
    Swap,
    Bridge,
    Transfer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub kind: StepKind,
    pub chain: ChainId,
    pub protocol: Protocol,
    pub contract: Option<Address>,
    pub gas_estimate: f64,
    pub time_estimate_s: f64,
    /// Indices of prior steps in the same path this step depends on.
    pub dependencies: Vec<usize>,
}

pub type ExecutionPath = Vec<ExecutionStep>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrageOpportunity {
    pub id: String,
    pub asset: AssetId,
    pub source_chain: ChainId,
    pub target_chain: ChainId,
    pub source_price: f64,
    pub target_price: f64,
    /// Trade size this opportunity was sized and evaluated against, in USD.
    pub notional: f64,
    pub expected_profit: f64,
    pub est_gas_cost: f64,
    pub bridge_fee: f64,
    pub net_profit: f64,
    pub profit_margin: f64,
    pub execution_time_s: f64,
    /// 0..100, higher = riskier.
    pub risk_score: f64,
    /// 0..1
    pub confidence: f64,
    pub timestamp: u64,
    pub execution_paths: Vec<ExecutionPath>,
}

impl ArbitrageOpportunity {
    /// The notional this opportunity was actually evaluated against, not a
    /// re-derivation from venue prices (a unit price is not a trade size).
    pub fn notional(&self) -> f64 {
        self.notional
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
    Ignore,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
            Priority::Ignore => "ignore",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    ExecuteImmediately,
    ExecuteOptimized,
    MonitorClosely,
    Defer,
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: Action,
    pub confidence: f64,
    pub reasoning: Vec<String>,
    pub conditions: Vec<String>,
    pub timeline: String,
    pub alternatives: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrengthsWeaknesses {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
}
