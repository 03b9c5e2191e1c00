//! Path Optimizer: alternative path generation, Monte-Carlo
//! simulation, and multi-objective ranking — "generate candidates,
//! simulate/score each, sort, pick the best", generalized from AMM
//! trade-sizing to cross-chain path topology.

use crate::config::{CostConstants, OptimizerConfig};
use crate::cost::compute_cost_breakdown;
use crate::market::MarketSnapshot;
use crate::types::{AssetPriceKey, ExecutionPath, ExecutionStep, StepKind};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum StrategyTemplate {
    DirectBridge,
    MultiHopIntermediate,
    ParallelExecution,
    StagedValidation,
    Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OptimizationStrategyTag {
    GasOptimized,
    TimeOptimized,
    RiskOptimized,
    Hybrid,
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: String,
    pub strategy: StrategyTemplate,
    pub path: ExecutionPath,
}

/// Generate up to `max_alternative_paths` candidates from the original
/// path. The original is always included; the remaining templates are
/// structural variations grouped under named approaches, translated from
/// strategy objects into path-shape perturbations since this crate's
/// candidates are data, not executable strategies.
pub fn generate_candidates(original: &ExecutionPath, max_alternative_paths: usize) -> Vec<Candidate> {
    let mut candidates = vec![Candidate {
        id: "original".to_string(),
        strategy: StrategyTemplate::DirectBridge,
        path: original.clone(),
    }];

    if max_alternative_paths <= 1 || original.is_empty() {
        return candidates;
    }

    // Multi-hop via intermediate chain: same steps, gas buffered up for an
    // extra hop's worth of safety margin.
    if candidates.len() < max_alternative_paths {
        let mut path = original.clone();
        for step in &mut path {
            step.gas_estimate *= 1.1;
            step.time_estimate_s *= 1.3;
        }
        candidates.push(Candidate { id: "multi_hop".to_string(), strategy: StrategyTemplate::MultiHopIntermediate, path });
    }

    // Parallel execution: independent steps run concurrently, so the
    // effective wall-clock time collapses to the slowest single step.
    if candidates.len() < max_alternative_paths {
        let mut path = original.clone();
        if let Some(max_time) = path.iter().map(|s| s.time_estimate_s).fold(None, |acc: Option<f64>, t| Some(acc.map_or(t, |a: f64| a.max(t)))) {
            for step in &mut path {
                step.time_estimate_s = max_time;
            }
        }
        candidates.push(Candidate { id: "parallel".to_string(), strategy: StrategyTemplate::ParallelExecution, path });
    }

    // Staged execution with validation hops: adds a zero-cost transfer
    // checkpoint after each existing step, trading time for safety.
    if candidates.len() < max_alternative_paths {
        let mut path = Vec::with_capacity(original.len() * 2);
        for (i, step) in original.iter().enumerate() {
            path.push(step.clone());
            path.push(ExecutionStep {
                kind: StepKind::Transfer,
                chain: step.chain.clone(),
                protocol: step.protocol.clone(),
                contract: None,
                gas_estimate: 0.0,
                time_estimate_s: 5.0,
                dependencies: vec![i],
            });
        }
        candidates.push(Candidate { id: "staged_validation".to_string(), strategy: StrategyTemplate::StagedValidation, path });
    }

    // Hybrid: lower gas buffer than multi-hop but keeps the validation hop time tax.
    if candidates.len() < max_alternative_paths {
        let mut path = original.clone();
        for step in &mut path {
            step.gas_estimate *= 0.95;
            step.time_estimate_s *= 1.1;
        }
        candidates.push(Candidate { id: "hybrid".to_string(), strategy: StrategyTemplate::Hybrid, path });
    }

    candidates.truncate(max_alternative_paths.max(1));
    candidates
}

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct SimulationStats {
    pub mean_profit: f64,
    pub stdev_profit: f64,
    pub success_rate: f64,
}

/// Run `rounds` Monte-Carlo rounds for one candidate, sharded across
/// `shards` deterministic sub-streams and combined in shard order. Each shard's
/// seed is derived from `(base_seed, candidate id, shard index)` so the
/// same inputs always produce the same stats regardless of how many
/// shards happen to run.
pub fn simulate_candidate(
    candidate: &Candidate,
    snapshot: &MarketSnapshot,
    notional: f64,
    gross_profit: f64,
    base_gas_cost: f64,
    base_bridge_cost: f64,
    base_slippage: f64,
    base_mev_fraction: f64,
    rounds: u32,
    shards: usize,
    base_seed: u64,
) -> SimulationStats {
    let shards = shards.max(1);
    let per_shard = (rounds as usize).div_ceil(shards);
    let mut all_profits = Vec::with_capacity(rounds as usize);
    let mut successes = 0usize;
    let mut total = 0usize;

    for shard_idx in 0..shards {
        let remaining = rounds as usize - total;
        let this_shard_rounds = per_shard.min(remaining);
        if this_shard_rounds == 0 {
            break;
        }
        let shard_seed = base_seed
            ^ (shard_idx as u64).wrapping_mul(0x9E3779B97F4A7C15)
            ^ fnv1a(candidate.id.as_bytes());
        let mut rng = StdRng::seed_from_u64(shard_seed);

        for _ in 0..this_shard_rounds {
            let gas = base_gas_cost * (1.0 + rng.gen_range(-0.1..=0.1));
            let bridge = base_bridge_cost * (1.0 + rng.gen_range(-0.1..=0.1));
            let slippage_fraction = base_slippage * (1.0 + rng.gen_range(-0.3..=0.3));
            // Longer realized execution time widens the window a backrunner has to
            // react, so it scales the sampled MEV fraction rather than standing alone.
            let time_factor = (1.0 + rng.gen_range(-0.15..=0.15)).max(0.0);
            let mev_fraction = base_mev_fraction * (notional / 10_000.0).max(0.0) * (1.0 + rng.gen_range(0.0..=1.0)) * time_factor;

            let final_profit = gross_profit - gas - bridge - notional * slippage_fraction - gross_profit * mev_fraction;
            all_profits.push(final_profit);

            let success_probability_sample = (1.0 - mev_fraction).max(0.0);
            if success_probability_sample > 0.5 {
                successes += 1;
            }
        }
        total += this_shard_rounds;
    }

    let n = all_profits.len().max(1) as f64;
    let mean = all_profits.iter().sum::<f64>() / n;
    let variance = all_profits.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;

    SimulationStats {
        mean_profit: mean,
        stdev_profit: variance.sqrt(),
        success_rate: successes as f64 / n,
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PerformanceMetrics {
    pub expected_time_s: f64,
    pub success_probability: f64,
    pub robustness: f64,
    pub efficiency: f64,
    pub scalability: f64,
    pub adaptability: f64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AlternativeRoute {
    pub candidate_id: String,
    pub strategy: StrategyTemplate,
    pub score: f64,
    pub expected_profit: f64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct OptimizedPath {
    pub steps: ExecutionPath,
    pub cost_breakdown: crate::cost::CostBreakdown,
    pub performance: PerformanceMetrics,
    pub alternative_routes: Vec<AlternativeRoute>,
    pub strategy: OptimizationStrategyTag,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HardConstraints {
    pub max_execution_time_s: Option<f64>,
    pub min_success_probability: Option<f64>,
    pub max_gas_cost_usd: Option<f64>,
}

/// Strategy-enumerate, simulate, rank, and pick the best candidate.
/// Ranking is deterministic for identical inputs and a fixed
/// `OptimizerConfig::simulation_seed`.
#[allow(clippy::too_many_arguments)]
pub fn optimize_path(
    original: &ExecutionPath,
    snapshot: &MarketSnapshot,
    keys: &[AssetPriceKey],
    notional: f64,
    gross_profit: f64,
    optimizer_config: &OptimizerConfig,
    cost_constants: &CostConstants,
    constraints: HardConstraints,
) -> Option<OptimizedPath> {
    let candidates = generate_candidates(original, optimizer_config.max_alternative_paths);

    struct Scored {
        candidate: Candidate,
        breakdown: crate::cost::CostBreakdown,
        stats: SimulationStats,
        score: f64,
    }

    let w_cost = optimizer_config.cost_weights.gas
        + optimizer_config.cost_weights.bridge
        + optimizer_config.cost_weights.slippage
        + optimizer_config.cost_weights.mev;
    let w_time = optimizer_config.cost_weights.time;

    let mut scored: Vec<Scored> = candidates
        .into_iter()
        .map(|candidate| {
            let breakdown = compute_cost_breakdown(&candidate.path, snapshot, keys, notional, gross_profit, cost_constants);
            let base_mev_fraction = if notional > 0.0 { breakdown.mev.value / (notional / 10_000.0).max(1e-9) / gross_profit.max(1.0) } else { 0.0 };
            let stats = simulate_candidate(
                &candidate,
                snapshot,
                notional,
                gross_profit,
                breakdown.gas.value,
                breakdown.bridge.value,
                breakdown.slippage.value / notional.max(1.0),
                base_mev_fraction.clamp(0.0, cost_constants.mev_cost_cap),
                optimizer_config.simulation_rounds,
                optimizer_config.parallel_simulations,
                optimizer_config.simulation_seed,
            );

            let total_time: f64 = candidate.path.iter().map(|s| s.time_estimate_s).sum();
            let cost_score = if gross_profit > 0.0 { (1.0 - (breakdown.total / gross_profit).min(1.0)) * 100.0 } else { 0.0 };
            let time_score = (100.0 - total_time.min(600.0) / 6.0).clamp(0.0, 100.0);
            let reliability_score = stats.success_rate * 100.0;
            let consistency_score = (100.0 - 10.0 * stats.stdev_profit).clamp(0.0, 100.0);

            let score = w_cost * cost_score + w_time * time_score + 0.3 * reliability_score + 0.15 * consistency_score;

            Scored { candidate, breakdown, stats, score }
        })
        .collect();

    // Deterministic order before applying hard constraints/picking a winner.
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.candidate.id.cmp(&b.candidate.id)));

    let passes = |s: &Scored| -> bool {
        let total_time: f64 = s.candidate.path.iter().map(|st| st.time_estimate_s).sum();
        if let Some(max_t) = constraints.max_execution_time_s {
            if total_time > max_t {
                return false;
            }
        }
        if let Some(min_p) = constraints.min_success_probability {
            if s.stats.success_rate < min_p {
                return false;
            }
        }
        if let Some(max_gas) = constraints.max_gas_cost_usd {
            if s.breakdown.gas.value > max_gas {
                return false;
            }
        }
        true
    };

    let winner_idx = scored.iter().position(passes)?;
    let winner = scored.remove(winner_idx);

    let mut alternative_routes: Vec<AlternativeRoute> = scored
        .iter()
        .take(3)
        .map(|s| AlternativeRoute {
            candidate_id: s.candidate.id.clone(),
            strategy: s.candidate.strategy,
            score: s.score,
            expected_profit: s.stats.mean_profit,
        })
        .collect();
    alternative_routes.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let total_time: f64 = winner.candidate.path.iter().map(|s| s.time_estimate_s).sum();
    let robustness = if winner.stats.mean_profit.abs() > 1e-9 {
        (1.0 - (winner.stats.stdev_profit / winner.stats.mean_profit.abs())).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let efficiency = if gross_profit > 0.0 { (winner.stats.mean_profit / gross_profit).clamp(0.0, 1.0) * 100.0 } else { 0.0 };
    let scalability = (100.0 - winner.candidate.path.len() as f64 * 8.0).clamp(0.0, 100.0);
    let adaptability = (winner.stats.success_rate * 100.0 + robustness * 100.0) / 2.0;

    let strategy = dominant_strategy(w_cost, w_time, winner.stats.success_rate);

    debug!(
        "path optimizer chose candidate {} (score {:.2}) among {} alternatives",
        winner.candidate.id,
        winner.score,
        alternative_routes.len()
    );

    Some(OptimizedPath {
        steps: winner.candidate.path,
        cost_breakdown: winner.breakdown,
        performance: PerformanceMetrics {
            expected_time_s: total_time,
            success_probability: winner.stats.success_rate,
            robustness,
            efficiency,
            scalability,
            adaptability,
        },
        alternative_routes,
        strategy,
    })
}

fn dominant_strategy(w_cost: f64, w_time: f64, success_rate: f64) -> OptimizationStrategyTag {
    let risk_weight = 1.0 - success_rate;
    let max = w_cost.max(w_time).max(risk_weight * 0.45);
    if (max - w_cost).abs() < 1e-9 {
        OptimizationStrategyTag::GasOptimized
    } else if (max - w_time).abs() < 1e-9 {
        OptimizationStrategyTag::TimeOptimized
    } else if (max - risk_weight * 0.45).abs() < 1e-9 && risk_weight > 0.5 {
        OptimizationStrategyTag::RiskOptimized
    } else {
        OptimizationStrategyTag::Hybrid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChainId;

    fn sample_path() -> ExecutionPath {
        vec![ExecutionStep {
            kind: StepKind::Swap,
            chain: ChainId::new("ethereum"),
            protocol: crate::types::Protocol::new("uniswap"),
            contract: None,
            gas_estimate: 150_000.0,
            time_estimate_s: 15.0,
            dependencies: vec![],
        }]
    }

    #[test]
    fn generate_candidates_includes_original_first() {
        let path = sample_path();
        let candidates = generate_candidates(&path, 5);
        assert_eq!(candidates[0].id, "original");
        assert_eq!(candidates[0].path, path);
        assert!(candidates.len() <= 5);
    }

    #[test]
    fn respects_max_alternative_paths_cap() {
        let path = sample_path();
        let candidates = generate_candidates(&path, 2);
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn simulation_is_deterministic_for_fixed_seed() {
        let snap = MarketSnapshot::default();
        let candidate = Candidate { id: "original".to_string(), strategy: StrategyTemplate::DirectBridge, path: sample_path() };
        let a = simulate_candidate(&candidate, &snap, 10_000.0, 50.0, 5.0, 0.0, 0.005, 0.1, 200, 4, 42);
        let b = simulate_candidate(&candidate, &snap, 10_000.0, 50.0, 5.0, 0.0, 0.005, 0.1, 200, 4, 42);
        assert_eq!(a.mean_profit, b.mean_profit);
        assert_eq!(a.success_rate, b.success_rate);
    }

    #[test]
    fn optimize_path_picks_a_winner_without_constraints() {
        let path = sample_path();
        let snap = MarketSnapshot::default();
        let result = optimize_path(&path, &snap, &[], 10_000.0, 50.0, &OptimizerConfig::default(), &CostConstants::default(), HardConstraints::default());
        assert!(result.is_some());
    }

    #[test]
    fn impossible_constraints_yield_no_winner() {
        let path = sample_path();
        let snap = MarketSnapshot::default();
        let constraints = HardConstraints { max_execution_time_s: Some(0.0), ..Default::default() };
        let result = optimize_path(&path, &snap, &[], 10_000.0, 50.0, &OptimizerConfig::default(), &CostConstants::default(), constraints);
        assert!(result.is_none());
    }
}
