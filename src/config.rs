//! Layered configuration.
//!
//! Every magic number a naive implementation would hard-code — the $1k MEV
//! saturation point, the $1M reference liquidity, the 60-second confidence
//! age decay — is a named field here with a documented default.
//! `EngineConfig::validate` is the single place construction-time errors
//! are allowed to originate from.

use crate::error::{ArbError, ArbResult};
use crate::types::{ChainId, PriceSource};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskTolerance {
    Conservative,
    Moderate,
    Aggressive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    pub chains: Vec<ChainId>,
    pub update_interval_ms: u64,
    pub cache_expiry_s: u64,
    pub sources: Vec<PriceSource>,
    pub websocket_reconnect_delay_ms: u64,
    /// Deviation fraction: an incoming quote further than this from the
    /// current aggregate trips the deviation guard (still accepted).
    pub price_validation_threshold: f64,
    /// A price with `now - timestamp > max_age_ms` is excluded from graph construction.
    pub max_age_ms: u64,
    /// "60-second age decay" here — governs how fast confidence decays with age.
    pub confidence_age_decay_s: f64,
    /// Reference liquidity used to derive a default slippage estimate when
    /// the venue's own liquidity figure is unknown.
    pub reference_liquidity_usd: f64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            chains: vec![],
            update_interval_ms: 1_000,
            cache_expiry_s: 300,
            sources: vec![],
            websocket_reconnect_delay_ms: 5_000,
            price_validation_threshold: 0.05,
            max_age_ms: 60_000,
            confidence_age_decay_s: 60.0,
            reference_liquidity_usd: 1_000_000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ArbitrageThresholds {
    pub min_profit_threshold: f64,
    pub max_risk_score: f64,
    pub max_execution_time_s: f64,
    /// Top-N cycles retained per detection tick.
    pub max_cycles_per_tick: usize,
}

impl Default for ArbitrageThresholds {
    fn default() -> Self {
        Self {
            min_profit_threshold: 0.002,
            max_risk_score: 70.0,
            max_execution_time_s: 120.0,
            max_cycles_per_tick: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CostWeights {
    pub gas: f64,
    pub bridge: f64,
    pub time: f64,
    pub slippage: f64,
    pub mev: f64,
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            gas: 0.25,
            bridge: 0.2,
            time: 0.2,
            slippage: 0.2,
            mev: 0.15,
        }
    }
}

/// Named constants behind the cost calculators, never hard-coded in the
/// calculators themselves.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CostConstants {
    pub gas_buffer_multiplier: f64,
    pub default_slippage_fraction: f64,
    pub time_risk_rate_per_s: f64,
    /// Notional at which MEV frontrun risk saturates.
    pub mev_frontrun_saturation_usd: f64,
    pub mev_cost_cap: f64,
    pub default_gas_price_gwei: f64,
    /// Upper-bound estimate of how much a cost could be reduced by a
    /// structural change (batching, alternative bridge, L2 routing) — the
    /// "optimization potential" each calculator here also returns.
    pub structural_optimization_potential_fraction: f64,
    /// Risk floor applied to every bridge hop regardless of trust level —
    /// governance/upgrade-key risk that no trust score fully prices out.
    pub governance_risk_floor: f64,
}

impl Default for CostConstants {
    fn default() -> Self {
        Self {
            gas_buffer_multiplier: 1.2,
            default_slippage_fraction: 0.005,
            time_risk_rate_per_s: 0.001,
            mev_frontrun_saturation_usd: 1_000.0,
            mev_cost_cap: 0.9,
            default_gas_price_gwei: 30.0,
            structural_optimization_potential_fraction: 0.2,
            governance_risk_floor: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub max_alternative_paths: usize,
    pub simulation_rounds: u32,
    pub cost_weights: CostWeights,
    pub risk_tolerance: RiskTolerance,
    pub parallel_simulations: usize,
    /// Seed for the Monte-Carlo sampler; fixed so ranking is deterministic.
    pub simulation_seed: u64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_alternative_paths: 5,
            simulation_rounds: 1_000,
            cost_weights: CostWeights::default(),
            risk_tolerance: RiskTolerance::Moderate,
            parallel_simulations: 4,
            simulation_seed: 0x5EED_C0FF_EE42,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskWeights {
    pub market: f64,
    pub execution: f64,
    pub liquidity: f64,
    pub mev: f64,
    pub technical: f64,
    pub counterparty: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            market: 0.20,
            execution: 0.18,
            liquidity: 0.16,
            mev: 0.16,
            technical: 0.15,
            counterparty: 0.15,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeasibilityWeights {
    pub technical: f64,
    pub resource: f64,
    pub timing: f64,
    pub infrastructure: f64,
}

impl Default for FeasibilityWeights {
    fn default() -> Self {
        Self {
            technical: 0.25,
            resource: 0.25,
            timing: 0.25,
            infrastructure: 0.25,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProfitabilityGate {
    pub min_profit_usd: f64,
    pub min_margin: f64,
}

impl Default for ProfitabilityGate {
    fn default() -> Self {
        Self {
            min_profit_usd: 5.0,
            min_margin: 0.001,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeasibilityGate {
    pub min_score: f64,
    pub max_time_s: f64,
}

impl Default for FeasibilityGate {
    fn default() -> Self {
        Self {
            min_score: 40.0,
            max_time_s: 600.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PrioritizationWeights {
    pub profit: f64,
    pub risk: f64,
    pub feasibility: f64,
    pub time: f64,
}

impl Default for PrioritizationWeights {
    fn default() -> Self {
        Self {
            profit: 0.35,
            risk: 0.25,
            feasibility: 0.25,
            time: 0.15,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    pub max_acceptable_risk: f64,
    pub profitability: ProfitabilityGate,
    pub feasibility: FeasibilityGate,
    pub weights: PrioritizationWeights,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            max_acceptable_risk: 75.0,
            profitability: ProfitabilityGate::default(),
            feasibility: FeasibilityGate::default(),
            weights: PrioritizationWeights::default(),
        }
    }
}

/// Per-chain facts the graph builder needs that aren't part of a price
/// entry: which DEX protocols it should fan swap edges out over, and the
/// flat USD gas estimate to attach to a same-chain swap edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    pub dexes_per_chain: std::collections::HashMap<ChainId, Vec<crate::types::Protocol>>,
    pub chain_gas_cost_estimate_usd: std::collections::HashMap<ChainId, f64>,
    pub default_swap_gas_cost_usd: f64,
    pub typical_swap_time_s: f64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            dexes_per_chain: std::collections::HashMap::new(),
            chain_gas_cost_estimate_usd: std::collections::HashMap::new(),
            default_swap_gas_cost_usd: 5.0,
            typical_swap_time_s: 15.0,
        }
    }
}

/// Circuit breaker over the *evaluation* pipeline — generalized from an
/// execution-guarding config shape (see `circuit_breaker.rs`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    pub max_consecutive_failures: u32,
    pub cooldown_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 5,
            cooldown_ms: 60_000,
        }
    }
}

/// Top-level configuration bundle. Construction (`EngineConfig::validate`) is the
/// only place a configuration error is allowed to escape the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub aggregator: AggregatorConfig,
    pub arbitrage: ArbitrageThresholds,
    pub graph: GraphConfig,
    pub cost_constants: CostConstants,
    pub optimizer: OptimizerConfig,
    pub risk_weights: RiskWeights,
    pub feasibility_weights: FeasibilityWeights,
    pub evaluator: EvaluatorConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            aggregator: AggregatorConfig::default(),
            arbitrage: ArbitrageThresholds::default(),
            graph: GraphConfig::default(),
            cost_constants: CostConstants::default(),
            optimizer: OptimizerConfig::default(),
            risk_weights: RiskWeights::default(),
            feasibility_weights: FeasibilityWeights::default(),
            evaluator: EvaluatorConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Layer environment overrides over the defaults, mirroring `ArbitrageConfig::from_env`.
    pub fn from_env() -> ArbResult<Self> {
        let mut config = Self::default();

        if let Ok(v) = env::var("ARB_MIN_PROFIT_THRESHOLD") {
            config.arbitrage.min_profit_threshold = v
                .parse()
                .map_err(|_| ArbError::config("ARB_MIN_PROFIT_THRESHOLD must be a float"))?;
        }
        if let Ok(v) = env::var("ARB_MAX_RISK_SCORE") {
            config.arbitrage.max_risk_score = v
                .parse()
                .map_err(|_| ArbError::config("ARB_MAX_RISK_SCORE must be a float"))?;
        }
        if let Ok(v) = env::var("ARB_SIMULATION_ROUNDS") {
            config.optimizer.simulation_rounds = v
                .parse()
                .map_err(|_| ArbError::config("ARB_SIMULATION_ROUNDS must be an integer"))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Construction-time validation.
    pub fn validate(&self) -> ArbResult<()> {
        let risk_sum = self.risk_weights.market
            + self.risk_weights.execution
            + self.risk_weights.liquidity
            + self.risk_weights.mev
            + self.risk_weights.technical
            + self.risk_weights.counterparty;
        if !(0.0..=2.0).contains(&risk_sum) {
            return Err(ArbError::config(format!(
                "risk weights must sum within [0, 2], got {risk_sum}"
            )));
        }

        let feas_sum = self.feasibility_weights.technical
            + self.feasibility_weights.resource
            + self.feasibility_weights.timing
            + self.feasibility_weights.infrastructure;
        if !(0.0..=2.0).contains(&feas_sum) {
            return Err(ArbError::config(format!(
                "feasibility weights must sum within [0, 2], got {feas_sum}"
            )));
        }

        let prio_sum = self.evaluator.weights.profit
            + self.evaluator.weights.risk
            + self.evaluator.weights.feasibility
            + self.evaluator.weights.time;
        if !(0.0..=2.0).contains(&prio_sum) {
            return Err(ArbError::config(format!(
                "prioritization weights must sum within [0, 2], got {prio_sum}"
            )));
        }

        if self.optimizer.simulation_rounds == 0 {
            return Err(ArbError::config("simulation_rounds must be > 0"));
        }
        if self.optimizer.max_alternative_paths == 0 {
            return Err(ArbError::config("max_alternative_paths must be > 0"));
        }
        if self.aggregator.max_age_ms == 0 {
            return Err(ArbError::config("aggregator.max_age_ms must be > 0"));
        }

        Ok(())
    }
}
