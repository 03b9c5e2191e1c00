//! Risk Assessor: six 0..100 sub-scores (higher = riskier) combined with
//! configurable weights, generalized from a single execution-gate decision
//! into a full composite score feeding the evaluator.

use crate::config::{CostConstants, RiskWeights};
use crate::cost::mev_risk_fraction;
use crate::market::MarketSnapshot;
use crate::types::{AssetPriceKey, ExecutionPath};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RiskLevel {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl RiskLevel {
    /// `<20 very_low, <40 low, <60 medium, <80 high, else very_high`.
    pub fn from_score(score: f64) -> Self {
        if score < 20.0 {
            RiskLevel::VeryLow
        } else if score < 40.0 {
            RiskLevel::Low
        } else if score < 60.0 {
            RiskLevel::Medium
        } else if score < 80.0 {
            RiskLevel::High
        } else {
            RiskLevel::VeryHigh
        }
    }
}

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct RiskAssessment {
    pub market: f64,
    pub execution: f64,
    pub liquidity: f64,
    pub mev: f64,
    pub technical: f64,
    pub counterparty: f64,
    pub overall: f64,
    pub level: RiskLevel,
}

/// Annualized volatility from log returns of recent price samples
/// (oldest-first). `0.0` with fewer than two samples rather than panicking
/// on an empty history.
fn realized_volatility(history: &[f64]) -> f64 {
    if history.len() < 2 {
        return 0.0;
    }
    let returns: Vec<f64> = history
        .windows(2)
        .filter(|w| w[0] > 0.0 && w[1] > 0.0)
        .map(|w| (w[1] / w[0]).ln())
        .collect();
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    // Assume ~daily samples; annualize with sqrt(365) the way a realized-vol
    // estimator conventionally does.
    variance.sqrt() * (365f64).sqrt()
}

fn market_risk(path: &ExecutionPath, snapshot: &MarketSnapshot, notional: f64, keys: &[AssetPriceKey]) -> f64 {
    let vol: f64 = keys
        .iter()
        .map(|k| realized_volatility(snapshot.price_history.get(k).map(|v| v.as_slice()).unwrap_or(&[])))
        .fold(0.0, f64::max);

    let min_liquidity = keys
        .iter()
        .map(|k| snapshot.liquidity(k))
        .filter(|l| *l > 0.0)
        .fold(f64::INFINITY, f64::min);
    let price_impact = if min_liquidity.is_finite() && min_liquidity > 0.0 {
        (notional / min_liquidity).min(0.1)
    } else {
        0.1
    };

    let distinct_chains = {
        let mut chains: Vec<_> = path.iter().map(|s| s.chain.clone()).collect();
        chains.dedup();
        chains.len()
    };
    let correlation_risk = if distinct_chains > 1 { 0.5 } else { 0.2 };

    let price_impact_score = (price_impact / 0.1) * 100.0;
    (vol * 100.0 * 0.4 + price_impact_score * 0.3 + correlation_risk * 100.0 * 0.3).clamp(0.0, 100.0)
}

fn execution_risk(path: &ExecutionPath, gas_cost_usd: f64, expected_profit: f64) -> f64 {
    let steps = path.len() as f64;
    let total_time: f64 = path.iter().map(|s| s.time_estimate_s).sum();
    let gas_ratio = if expected_profit > 0.0 { (gas_cost_usd / expected_profit).min(2.0) } else { 2.0 };

    (steps * 6.0 + total_time * 0.05 + gas_ratio * 25.0).clamp(0.0, 100.0)
}

fn liquidity_risk(snapshot: &MarketSnapshot, keys: &[AssetPriceKey], slippage_fraction: f64) -> f64 {
    let min_liquidity = keys
        .iter()
        .map(|k| snapshot.liquidity(k))
        .filter(|l| *l > 0.0)
        .fold(f64::INFINITY, f64::min);
    let depth_score = if min_liquidity.is_finite() {
        (1.0 - (min_liquidity / 10_000_000.0).min(1.0)).max(0.0)
    } else {
        1.0
    };
    let herfindahl = keys
        .iter()
        .map(|k| snapshot.herfindahl(k))
        .fold(0.0, f64::max);

    (depth_score * 100.0 * 0.4 + herfindahl * 100.0 * 0.3 + slippage_fraction * 100.0 * 0.3).clamp(0.0, 100.0)
}

fn technical_risk(path: &ExecutionPath, snapshot: &MarketSnapshot) -> f64 {
    let avg_multiplier = {
        let mut chains: Vec<_> = path.iter().map(|s| s.chain.clone()).collect();
        chains.dedup();
        if chains.is_empty() {
            1.0
        } else {
            chains.iter().map(|c| snapshot.base_risk_multiplier(c)).sum::<f64>() / chains.len() as f64
        }
    };
    let has_risky_contract = path.iter().any(|s| s.contract.as_ref().map(|c| snapshot.known_risky_contracts.contains(c)).unwrap_or(false));

    let base = (avg_multiplier - 1.0).max(0.0) * 60.0; // multiplier 1.0 -> 0, 1.5 -> 30
    let penalty = if has_risky_contract { 40.0 } else { 0.0 };
    (base + penalty).clamp(0.0, 100.0)
}

fn counterparty_risk(path: &ExecutionPath, snapshot: &MarketSnapshot, constants: &CostConstants) -> f64 {
    let bridge_count = path.iter().filter(|s| s.kind == crate::types::StepKind::Bridge).count() as f64;
    let unsafe_protocol_penalty = if path.iter().any(|s| !snapshot.known_safe_protocols.is_empty() && !snapshot.known_safe_protocols.contains(&s.protocol)) {
        20.0
    } else {
        0.0
    };
    (bridge_count * 15.0 + unsafe_protocol_penalty + constants.governance_risk_floor).clamp(0.0, 100.0)
}

/// Compose all six sub-scores into the final 0..100 assessment.
pub fn assess_risk(
    path: &ExecutionPath,
    snapshot: &MarketSnapshot,
    keys: &[AssetPriceKey],
    notional: f64,
    gas_cost_usd: f64,
    expected_profit: f64,
    slippage_fraction: f64,
    weights: &RiskWeights,
    cost_constants: &CostConstants,
) -> RiskAssessment {
    let market = market_risk(path, snapshot, notional, keys);
    let execution = execution_risk(path, gas_cost_usd, expected_profit);
    let liquidity = liquidity_risk(snapshot, keys, slippage_fraction);
    let mev = mev_risk_fraction(path, snapshot, keys, notional, cost_constants) * 100.0;
    let technical = technical_risk(path, snapshot);
    let counterparty = counterparty_risk(path, snapshot, cost_constants);

    let overall = (market * weights.market
        + execution * weights.execution
        + liquidity * weights.liquidity
        + mev * weights.mev
        + technical * weights.technical
        + counterparty * weights.counterparty)
        .clamp(0.0, 100.0);

    RiskAssessment {
        market,
        execution,
        liquidity,
        mev,
        technical,
        counterparty,
        overall,
        level: RiskLevel::from_score(overall),
    }
}
