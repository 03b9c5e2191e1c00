//! Feasibility Analyzer: four 0..100 sub-scores (higher = more feasible),
//! bottlenecks, and proposed alternatives, generalized from a pass/fail
//! execution gate's warning list into a scored feasibility report the
//! evaluator composes alongside risk.

use crate::config::FeasibilityWeights;
use crate::market::MarketSnapshot;
use crate::types::{AssetPriceKey, ExecutionPath};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Bottleneck {
    pub name: String,
    /// 0..100, higher = more severe.
    pub severity: f64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FeasibilityAlternative {
    pub description: String,
    /// Signed estimate of how much choosing this alternative would move
    /// the overall feasibility score.
    pub estimated_feasibility_change: f64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FeasibilityAssessment {
    pub technical: f64,
    pub resource: f64,
    pub timing: f64,
    pub infrastructure: f64,
    pub overall: f64,
    pub bottlenecks: Vec<Bottleneck>,
    pub alternatives: Vec<FeasibilityAlternative>,
}

fn technical_score(path: &ExecutionPath, snapshot: &MarketSnapshot) -> f64 {
    let step_penalty = (path.len() as f64 - 1.0).max(0.0) * 8.0;
    let unsafe_penalty = if path
        .iter()
        .any(|s| !snapshot.known_safe_protocols.is_empty() && !snapshot.known_safe_protocols.contains(&s.protocol))
    {
        15.0
    } else {
        0.0
    };
    (100.0 - step_penalty - unsafe_penalty).clamp(0.0, 100.0)
}

fn resource_score(snapshot: &MarketSnapshot, keys: &[AssetPriceKey], notional: f64, gas_cost_usd: f64) -> f64 {
    let min_liquidity = keys
        .iter()
        .map(|k| snapshot.liquidity(k))
        .filter(|l| *l > 0.0)
        .fold(f64::INFINITY, f64::min);
    let liquidity_adequacy = if min_liquidity.is_finite() && min_liquidity > 0.0 {
        (min_liquidity / (notional * 2.0).max(1.0)).min(1.0)
    } else {
        0.3
    };
    // Gas budget adequacy: a trade whose gas cost is a tiny fraction of
    // notional is well within budget; one that eats into it isn't.
    let gas_budget_adequacy = if notional > 0.0 { (1.0 - (gas_cost_usd / notional).min(1.0)) } else { 0.0 };

    ((liquidity_adequacy * 0.6 + gas_budget_adequacy * 0.4) * 100.0).clamp(0.0, 100.0)
}

fn timing_score(path: &ExecutionPath, snapshot: &MarketSnapshot, opportunity_age_s: f64, max_execution_time_s: f64, volatility: f64) -> f64 {
    let total_time: f64 = path.iter().map(|s| s.time_estimate_s).sum();
    let window_adequacy = if max_execution_time_s > 0.0 {
        (1.0 - (total_time / max_execution_time_s).min(1.0)).max(0.0)
    } else {
        0.0
    };
    let age_penalty = (opportunity_age_s / 60.0).min(1.0);

    let congestion = path
        .iter()
        .map(|s| snapshot.congestion(&s.chain))
        .fold(0.0, f64::max);

    (window_adequacy * 100.0 * 0.4 + (1.0 - age_penalty) * 100.0 * 0.3 + (1.0 - volatility.min(1.0)) * 100.0 * 0.15
        + (1.0 - congestion) * 100.0 * 0.15)
        .clamp(0.0, 100.0)
}

fn infrastructure_score(path: &ExecutionPath, snapshot: &MarketSnapshot) -> f64 {
    let reliabilities: Vec<f64> = {
        let mut chains: Vec<_> = path.iter().map(|s| s.chain.clone()).collect();
        chains.dedup();
        chains.iter().map(|c| snapshot.reliability(c)).collect()
    };
    if reliabilities.is_empty() {
        return 100.0;
    }
    let avg = reliabilities.iter().sum::<f64>() / reliabilities.len() as f64;
    // Percentage-difference fix: `(highest - lowest) / lowest`,
    // not the reference design's `highest - lowest / lowest`.
    let dispersion_penalty = MarketSnapshot::percentage_difference(&reliabilities) * 50.0;
    ((avg * 100.0) - dispersion_penalty).clamp(0.0, 100.0)
}

/// Score the four dimensions, combine with configured weights, and surface
/// named bottlenecks plus candidate alternatives.
pub fn assess_feasibility(
    path: &ExecutionPath,
    snapshot: &MarketSnapshot,
    keys: &[AssetPriceKey],
    notional: f64,
    gas_cost_usd: f64,
    opportunity_age_s: f64,
    max_execution_time_s: f64,
    volatility: f64,
    weights: &FeasibilityWeights,
) -> FeasibilityAssessment {
    let technical = technical_score(path, snapshot);
    let resource = resource_score(snapshot, keys, notional, gas_cost_usd);
    let timing = timing_score(path, snapshot, opportunity_age_s, max_execution_time_s, volatility);
    let infrastructure = infrastructure_score(path, snapshot);

    let overall = (technical * weights.technical
        + resource * weights.resource
        + timing * weights.timing
        + infrastructure * weights.infrastructure)
        .clamp(0.0, 100.0);

    let mut bottlenecks = Vec::new();
    for (name, score) in [
        ("technical_complexity", technical),
        ("resource_adequacy", resource),
        ("timing_window", timing),
        ("infrastructure_reliability", infrastructure),
    ] {
        if score < 50.0 {
            bottlenecks.push(Bottleneck { name: name.to_string(), severity: 100.0 - score });
        }
    }
    bottlenecks.sort_by(|a, b| b.severity.partial_cmp(&a.severity).unwrap_or(std::cmp::Ordering::Equal));

    let mut alternatives = Vec::new();
    if resource < 60.0 {
        alternatives.push(FeasibilityAlternative {
            description: "reduce trade size to ease liquidity and gas-budget pressure".to_string(),
            estimated_feasibility_change: (60.0 - resource) * weights.resource * 0.5,
        });
    }
    if timing < 60.0 {
        alternatives.push(FeasibilityAlternative {
            description: "delay execution until network congestion subsides".to_string(),
            estimated_feasibility_change: (60.0 - timing) * weights.timing * 0.5,
        });
    }
    if technical < 60.0 {
        alternatives.push(FeasibilityAlternative {
            description: "route through a different DEX/bridge combination with fewer hops".to_string(),
            estimated_feasibility_change: (60.0 - technical) * weights.technical * 0.5,
        });
    }

    FeasibilityAssessment { technical, resource, timing, infrastructure, overall, bottlenecks, alternatives }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AssetId, ChainId, ExecutionStep, Protocol, StepKind};

    fn step(chain: &str) -> ExecutionStep {
        ExecutionStep {
            kind: StepKind::Swap,
            chain: ChainId::new(chain),
            protocol: Protocol::new("proto"),
            contract: None,
            gas_estimate: 100_000.0,
            time_estimate_s: 10.0,
            dependencies: vec![],
        }
    }

    #[test]
    fn overall_score_bounded_and_weighted() {
        let snap = MarketSnapshot::default();
        let path = vec![step("ethereum")];
        let keys = vec![(ChainId::new("ethereum"), AssetId::new("USDC"))];
        let assessment = assess_feasibility(&path, &snap, &keys, 10_000.0, 20.0, 5.0, 120.0, 0.1, &crate::config::FeasibilityWeights::default());
        assert!(assessment.overall >= 0.0 && assessment.overall <= 100.0);
    }

    #[test]
    fn stale_aged_opportunity_hurts_timing_score() {
        let snap = MarketSnapshot::default();
        let path = vec![step("ethereum")];
        let keys = vec![(ChainId::new("ethereum"), AssetId::new("USDC"))];
        let fresh = assess_feasibility(&path, &snap, &keys, 10_000.0, 20.0, 1.0, 120.0, 0.1, &crate::config::FeasibilityWeights::default());
        let stale = assess_feasibility(&path, &snap, &keys, 10_000.0, 20.0, 600.0, 120.0, 0.1, &crate::config::FeasibilityWeights::default());
        assert!(stale.timing < fresh.timing);
    }

    #[test]
    fn percentage_difference_drives_infrastructure_dispersion_penalty() {
        let mut snap = MarketSnapshot::default();
        snap.chain_reliability.insert(ChainId::new("ethereum"), 0.99);
        snap.chain_reliability.insert(ChainId::new("fantom"), 0.60);
        let path = vec![step("ethereum"), step("fantom")];
        let score = infrastructure_score(&path, &snap);
        // Correct precedence would meaningfully penalize the 0.99 vs 0.60 gap;
        // the buggy `highest - lowest/lowest` form would barely move the score.
        assert!(score < 70.0);
    }
}
