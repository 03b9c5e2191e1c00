//! Opportunity Evaluator: composes the risk, feasibility, and
//! cost/profitability analyzers into one `ComprehensiveEvaluation`, assigns
//! a priority band and a recommendation, and caches recent results. Follows
//! the "run several checks, aggregate into one verdict with warnings" shape
//! for the composite evaluation, and a TTL-cache pattern for the bounded
//! opportunity cache.

use crate::config::EvaluatorConfig;
use crate::cost::CostBreakdown;
use crate::feasibility::FeasibilityAssessment;
use crate::market::MarketSnapshot;
use crate::optimizer::OptimizedPath;
use crate::risk::RiskAssessment;
use crate::types::{Action, ArbitrageOpportunity, Priority, Recommendation, StrengthsWeaknesses};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct ProfitabilityAssessment {
    pub net_profit: f64,
    pub profit_margin: f64,
    /// 0..100, higher = more profitable.
    pub score: f64,
    pub meets_min_profit: bool,
    pub meets_min_margin: bool,
}

fn assess_profitability(opportunity: &ArbitrageOpportunity, config: &EvaluatorConfig) -> ProfitabilityAssessment {
    let meets_min_profit = opportunity.net_profit >= config.profitability.min_profit_usd;
    let meets_min_margin = opportunity.profit_margin >= config.profitability.min_margin;

    // Saturating score: profit at 5x the minimum threshold maxes out at 100.
    let profit_component = if config.profitability.min_profit_usd > 0.0 {
        (opportunity.net_profit / (config.profitability.min_profit_usd * 5.0)).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let margin_component = if config.profitability.min_margin > 0.0 {
        (opportunity.profit_margin / (config.profitability.min_margin * 5.0)).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let score = ((profit_component * 0.6 + margin_component * 0.4) * 100.0).clamp(0.0, 100.0);

    ProfitabilityAssessment { net_profit: opportunity.net_profit, profit_margin: opportunity.profit_margin, score, meets_min_profit, meets_min_margin }
}

/// Urgency derived from execution window pressure and opportunity age:
/// the less time there is before the opportunity likely closes, the higher
/// the score.
fn time_sensitivity_score(opportunity: &ArbitrageOpportunity, now_ms: u64, max_execution_time_s: f64) -> f64 {
    let age_s = now_ms.saturating_sub(opportunity.timestamp) as f64 / 1000.0;
    let age_urgency = (age_s / 30.0).clamp(0.0, 1.0);
    let window_urgency = if max_execution_time_s > 0.0 {
        (1.0 - (opportunity.execution_time_s / max_execution_time_s).min(1.0)).clamp(0.0, 1.0)
    } else {
        0.0
    };
    ((age_urgency * 0.5 + window_urgency * 0.5) * 100.0).clamp(0.0, 100.0)
}

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct ScoringBreakdown {
    pub profitability_score: f64,
    pub risk_score: f64,
    pub feasibility_score: f64,
    pub time_sensitivity_score: f64,
}

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct KeyMetrics {
    pub net_profit_usd: f64,
    pub profit_margin: f64,
    pub execution_time_s: f64,
    pub risk_score: f64,
    pub feasibility_score: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ComprehensiveEvaluation {
    pub opportunity_id: String,
    pub scoring: ScoringBreakdown,
    pub risk: RiskAssessment,
    pub profitability: ProfitabilityAssessment,
    pub feasibility: FeasibilityAssessment,
    pub final_score: f64,
    pub priority: Priority,
    pub recommendation: Recommendation,
    pub strengths_weaknesses: StrengthsWeaknesses,
    pub key_metrics: KeyMetrics,
    pub execution_plan: OptimizedPath,
}

/// `≥90 critical`, `≥75 high`, `≥50 medium`, `≥25 low`, else `ignore`.
fn priority_from_score(score: f64) -> Priority {
    if score >= 90.0 {
        Priority::Critical
    } else if score >= 75.0 {
        Priority::High
    } else if score >= 50.0 {
        Priority::Medium
    } else if score >= 25.0 {
        Priority::Low
    } else {
        Priority::Ignore
    }
}

fn build_recommendation(
    priority: Priority,
    hard_gate_failed: bool,
    profitability: &ProfitabilityAssessment,
    risk: &RiskAssessment,
    feasibility: &FeasibilityAssessment,
) -> Recommendation {
    let mut reasoning = Vec::new();
    let mut conditions = Vec::new();
    let mut alternatives = Vec::new();

    if hard_gate_failed {
        if !profitability.meets_min_profit || !profitability.meets_min_margin {
            reasoning.push("net profit or margin below the configured minimum".to_string());
        }
        if risk.overall > 0.0 {
            reasoning.push(format!("overall risk score {:.1} exceeds tolerance", risk.overall));
        }
        if feasibility.overall > 0.0 {
            reasoning.push(format!("feasibility score {:.1} below floor", feasibility.overall));
        }
        alternatives.extend(feasibility.alternatives.iter().map(|a| a.description.clone()));
        return Recommendation {
            action: Action::Reject,
            confidence: 0.85,
            reasoning,
            conditions,
            timeline: "n/a".to_string(),
            alternatives,
        };
    }

    let action = match priority {
        Priority::Critical => Action::ExecuteImmediately,
        Priority::High => Action::ExecuteOptimized,
        Priority::Medium => Action::MonitorClosely,
        Priority::Low => Action::Defer,
        Priority::Ignore => Action::Reject,
    };

    reasoning.push(format!("profitability score {:.1}", profitability.score));
    reasoning.push(format!("overall risk score {:.1} ({:?})", risk.overall, risk.level));
    reasoning.push(format!("feasibility score {:.1}", feasibility.overall));

    if risk.overall > 50.0 {
        conditions.push("confirm gas price has not spiked since evaluation".to_string());
    }
    if feasibility.timing < 60.0 {
        conditions.push("re-check opportunity freshness before submission".to_string());
    }

    alternatives.extend(feasibility.alternatives.iter().map(|a| a.description.clone()));

    let confidence = ((profitability.score + (100.0 - risk.overall) + feasibility.overall) / 300.0).clamp(0.0, 1.0);
    let timeline = match priority {
        Priority::Critical => "immediate".to_string(),
        Priority::High => "within seconds".to_string(),
        Priority::Medium => "within the next few minutes".to_string(),
        Priority::Low | Priority::Ignore => "monitor only".to_string(),
    };

    Recommendation { action, confidence, reasoning, conditions, timeline, alternatives }
}

fn build_strengths_weaknesses(profitability: &ProfitabilityAssessment, risk: &RiskAssessment, feasibility: &FeasibilityAssessment) -> StrengthsWeaknesses {
    let mut sw = StrengthsWeaknesses::default();
    if profitability.score >= 60.0 {
        sw.strengths.push("strong expected profitability".to_string());
    } else {
        sw.weaknesses.push("thin profitability margin".to_string());
    }
    if risk.overall < 40.0 {
        sw.strengths.push("low composite risk".to_string());
    } else {
        sw.weaknesses.push(format!("elevated {:?} risk", risk.level));
    }
    if feasibility.overall >= 60.0 {
        sw.strengths.push("high execution feasibility".to_string());
    } else {
        sw.weaknesses.push("feasibility constrained by one or more bottlenecks".to_string());
    }
    for b in &feasibility.bottlenecks {
        sw.weaknesses.push(format!("bottleneck: {} (severity {:.0})", b.name, b.severity));
    }
    sw
}

/// Runs the four analyzers concurrently and composes
/// the result. The analyzers are pure CPU-bound computations here, so the
/// `tokio::join!` dispatch matters for overlap with other in-flight ticks
/// rather than for I/O concurrency within this call.
#[allow(clippy::too_many_arguments)]
pub async fn evaluate_opportunity(
    opportunity: &ArbitrageOpportunity,
    path: &crate::types::ExecutionPath,
    snapshot: &MarketSnapshot,
    keys: &[crate::types::AssetPriceKey],
    now_ms: u64,
    config: &EvaluatorConfig,
    cost_constants: &crate::config::CostConstants,
    risk_weights: &crate::config::RiskWeights,
    feasibility_weights: &crate::config::FeasibilityWeights,
    optimizer_config: &crate::config::OptimizerConfig,
    arbitrage_thresholds: &crate::config::ArbitrageThresholds,
) -> ComprehensiveEvaluation {
    let notional = opportunity.notional();
    let gross_profit = opportunity.expected_profit;

    let (risk, feasibility, profitability, optimized) = tokio::join!(
        async {
            crate::risk::assess_risk(
                path,
                snapshot,
                keys,
                notional,
                opportunity.est_gas_cost,
                gross_profit,
                cost_constants.default_slippage_fraction,
                risk_weights,
                cost_constants,
            )
        },
        async {
            crate::feasibility::assess_feasibility(
                path,
                snapshot,
                keys,
                notional,
                opportunity.est_gas_cost,
                now_ms.saturating_sub(opportunity.timestamp) as f64 / 1000.0,
                arbitrage_thresholds.max_execution_time_s,
                0.0,
                feasibility_weights,
            )
        },
        async { assess_profitability(opportunity, config) },
        async {
            crate::optimizer::optimize_path(
                path,
                snapshot,
                keys,
                notional,
                gross_profit,
                optimizer_config,
                cost_constants,
                crate::optimizer::HardConstraints {
                    max_execution_time_s: Some(arbitrage_thresholds.max_execution_time_s),
                    min_success_probability: None,
                    max_gas_cost_usd: None,
                },
            )
        },
    );

    let time_score = time_sensitivity_score(opportunity, now_ms, arbitrage_thresholds.max_execution_time_s);

    let final_score = (config.weights.profit * profitability.score
        + config.weights.risk * (100.0 - risk.overall)
        + config.weights.feasibility * feasibility.overall
        + config.weights.time * time_score)
        .clamp(0.0, 100.0);

    let hard_gate_failed =
        risk.overall > config.max_acceptable_risk || feasibility.overall < config.feasibility.min_score || !profitability.meets_min_profit;

    let priority = if hard_gate_failed { Priority::Ignore } else { priority_from_score(final_score) };
    let recommendation = build_recommendation(priority, hard_gate_failed, &profitability, &risk, &feasibility);
    let strengths_weaknesses = build_strengths_weaknesses(&profitability, &risk, &feasibility);

    let execution_plan = optimized.unwrap_or_else(|| crate::optimizer::OptimizedPath {
        steps: path.clone(),
        cost_breakdown: CostBreakdown {
            gas: crate::cost::CostComponent { value: opportunity.est_gas_cost, optimization_potential: 0.0 },
            bridge: crate::cost::CostComponent { value: opportunity.bridge_fee, optimization_potential: 0.0 },
            slippage: crate::cost::CostComponent { value: 0.0, optimization_potential: 0.0 },
            time: crate::cost::CostComponent { value: 0.0, optimization_potential: 0.0 },
            mev: crate::cost::CostComponent { value: 0.0, optimization_potential: 0.0 },
            total: opportunity.est_gas_cost + opportunity.bridge_fee,
        },
        performance: crate::optimizer::PerformanceMetrics {
            expected_time_s: opportunity.execution_time_s,
            success_probability: 0.0,
            robustness: 0.0,
            efficiency: 0.0,
            scalability: 0.0,
            adaptability: 0.0,
        },
        alternative_routes: vec![],
        strategy: crate::optimizer::OptimizationStrategyTag::Hybrid,
    });

    debug!(
        opportunity_id = %opportunity.id,
        final_score,
        priority = %priority,
        "evaluated opportunity"
    );

    ComprehensiveEvaluation {
        opportunity_id: opportunity.id.clone(),
        scoring: ScoringBreakdown {
            profitability_score: profitability.score,
            risk_score: risk.overall,
            feasibility_score: feasibility.overall,
            time_sensitivity_score: time_score,
        },
        risk,
        profitability,
        feasibility,
        final_score,
        priority,
        recommendation,
        strengths_weaknesses,
        key_metrics: KeyMetrics {
            net_profit_usd: opportunity.net_profit,
            profit_margin: opportunity.profit_margin,
            execution_time_s: opportunity.execution_time_s,
            risk_score: risk.overall,
            feasibility_score: feasibility.overall,
            confidence: opportunity.confidence,
        },
        execution_plan,
    }
}

/// Batch evaluation: map over inputs, then descending-score sort.
pub async fn evaluate_batch(
    opportunities: &[(ArbitrageOpportunity, crate::types::ExecutionPath, Vec<crate::types::AssetPriceKey>)],
    snapshot: &MarketSnapshot,
    now_ms: u64,
    config: &EvaluatorConfig,
    cost_constants: &crate::config::CostConstants,
    risk_weights: &crate::config::RiskWeights,
    feasibility_weights: &crate::config::FeasibilityWeights,
    optimizer_config: &crate::config::OptimizerConfig,
    arbitrage_thresholds: &crate::config::ArbitrageThresholds,
) -> Vec<ComprehensiveEvaluation> {
    let mut results = Vec::with_capacity(opportunities.len());
    for (opportunity, path, keys) in opportunities {
        let evaluation = evaluate_opportunity(
            opportunity,
            path,
            snapshot,
            keys,
            now_ms,
            config,
            cost_constants,
            risk_weights,
            feasibility_weights,
            optimizer_config,
            arbitrage_thresholds,
        )
        .await;
        results.push(evaluation);
    }
    results.sort_by(|a, b| b.final_score.partial_cmp(&a.final_score).unwrap_or(std::cmp::Ordering::Equal));
    results
}

/// Bounded, LRU-evicted cache of recent evaluations keyed by opportunity id,
/// generalized from a fixed TTL map to an explicit LRU so capacity, not
/// just age, bounds memory.
pub struct OpportunityCache {
    entries: DashMap<String, ComprehensiveEvaluation>,
    order: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl OpportunityCache {
    pub fn new(capacity: usize) -> Self {
        Self { entries: DashMap::new(), order: Mutex::new(VecDeque::new()), capacity: capacity.max(1) }
    }

    pub fn insert(&self, evaluation: ComprehensiveEvaluation) {
        let id = evaluation.opportunity_id.clone();
        if self.entries.insert(id.clone(), evaluation).is_none() {
            let mut order = self.order.lock();
            order.push_back(id);
            while order.len() > self.capacity {
                if let Some(evicted) = order.pop_front() {
                    self.entries.remove(&evicted);
                }
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<ComprehensiveEvaluation> {
        self.entries.get(id).map(|e| e.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub type SharedOpportunityCache = Arc<OpportunityCache>;

pub fn new_shared_cache(capacity: usize) -> SharedOpportunityCache {
    Arc::new(OpportunityCache::new(capacity))
}
