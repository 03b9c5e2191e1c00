//! Cost Calculators: five pure functions, each
//! `(path, market_snapshot, trade_notional) -> structured cost`, plus a
//! bounded "optimization potential" estimate per calculator, generalized
//! from a single-chain gas/oracle lookup to the cross-chain per-step model
//! `ExecutionPath` requires.
//!
//! All saturation/decay constants are [`crate::config::CostConstants`]
//! fields, never literals in these functions.

use crate::config::CostConstants;
use crate::market::MarketSnapshot;
use crate::types::{AssetPriceKey, ExecutionPath, StepKind};

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CostComponent {
    pub value: f64,
    /// Bounded upper estimate of how much this cost could be reduced by a
    /// structural change (batching, alternative bridge, L2 routing).
    pub optimization_potential: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CostBreakdown {
    pub gas: CostComponent,
    pub bridge: CostComponent,
    pub slippage: CostComponent,
    pub time: CostComponent,
    pub mev: CostComponent,
    pub total: f64,
}

/// Per-step gas cost, never an even split of a single total: `gas_units * gas_price_gwei * 1e-9` converted to USD via
/// the step's own chain's native-token price, summed, then buffered.
pub fn gas_cost(path: &ExecutionPath, snapshot: &MarketSnapshot, constants: &CostConstants) -> CostComponent {
    let mut total_usd = 0.0;
    for step in path {
        let gas_price_gwei = snapshot.gas_price_gwei(&step.chain, constants.default_gas_price_gwei);
        let native_usd = snapshot.native_usd_price(&step.chain);
        let gas_native = step.gas_estimate * gas_price_gwei * 1e-9;
        total_usd += gas_native * native_usd;
    }
    let value = total_usd * constants.gas_buffer_multiplier;
    CostComponent {
        value,
        optimization_potential: value * constants.structural_optimization_potential_fraction,
    }
}

/// Sum of `clamp(base + notional * percentage, min, max)` across bridge steps.
pub fn bridge_fee_cost(path: &ExecutionPath, snapshot: &MarketSnapshot, notional: f64, constants: &CostConstants) -> CostComponent {
    let mut total = 0.0;
    for step in path.iter().filter(|s| s.kind == StepKind::Bridge) {
        let fee = snapshot
            .bridge_fee_by_protocol
            .get(&step.protocol)
            .map(|f| f.estimate(notional))
            .unwrap_or(0.0);
        total += fee;
    }
    CostComponent {
        value: total,
        optimization_potential: total * constants.structural_optimization_potential_fraction,
    }
}

/// `notional * slippage_fraction` per swap step, defaulting when the venue
/// has no known slippage figure.
pub fn slippage_cost(path: &ExecutionPath, snapshot: &MarketSnapshot, notional: f64, constants: &CostConstants) -> CostComponent {
    let mut total = 0.0;
    for step in path.iter().filter(|s| s.kind == StepKind::Swap) {
        let fraction = snapshot
            .slippage_fraction_by_protocol
            .get(&step.protocol)
            .copied()
            .unwrap_or(constants.default_slippage_fraction);
        total += notional * fraction;
    }
    CostComponent {
        value: total,
        optimization_potential: total * constants.structural_optimization_potential_fraction,
    }
}

/// Cumulative step time * per-second risk rate * expected gross profit.
pub fn time_opportunity_cost(path: &ExecutionPath, gross_profit: f64, constants: &CostConstants) -> CostComponent {
    let total_time: f64 = path.iter().map(|s| s.time_estimate_s).sum();
    let value = total_time * constants.time_risk_rate_per_s * gross_profit.max(0.0);
    CostComponent {
        value,
        optimization_potential: value * constants.structural_optimization_potential_fraction,
    }
}

/// `max(frontrun, sandwich, backrun)` clipped to `0..mev_cost_cap`, expressed in dollars against expected gross profit.
pub fn mev_cost(path: &ExecutionPath, snapshot: &MarketSnapshot, keys: &[AssetPriceKey], notional: f64, gross_profit: f64, constants: &CostConstants) -> CostComponent {
    let fraction = mev_risk_fraction(path, snapshot, keys, notional, constants);
    let value = fraction * gross_profit.max(0.0);
    CostComponent {
        value,
        optimization_potential: value * constants.structural_optimization_potential_fraction,
    }
}

/// The 0..mev_cost_cap risk fraction shared by the cost calculator and the
/// risk assessor's MEV sub-score.
pub fn mev_risk_fraction(path: &ExecutionPath, snapshot: &MarketSnapshot, keys: &[AssetPriceKey], notional: f64, constants: &CostConstants) -> f64 {
    let gas_price_gwei = path
        .first()
        .map(|s| snapshot.gas_price_gwei(&s.chain, constants.default_gas_price_gwei))
        .unwrap_or(constants.default_gas_price_gwei);

    // Frontrun risk grows with profit (saturating), falls with gas price.
    let saturation = (notional / constants.mev_frontrun_saturation_usd.max(1.0)).min(1.0);
    let gas_relief = 1.0 / (1.0 + gas_price_gwei / 50.0);
    let frontrun = saturation * gas_relief;

    // Sandwich risk grows with slippage, falls with liquidity.
    let avg_slippage = {
        let swaps: Vec<f64> = path
            .iter()
            .filter(|s| s.kind == StepKind::Swap)
            .map(|s| {
                snapshot
                    .slippage_fraction_by_protocol
                    .get(&s.protocol)
                    .copied()
                    .unwrap_or(constants.default_slippage_fraction)
            })
            .collect();
        if swaps.is_empty() {
            0.0
        } else {
            swaps.iter().sum::<f64>() / swaps.len() as f64
        }
    };
    let min_liquidity = keys
        .iter()
        .map(|k| snapshot.liquidity(k))
        .filter(|l| *l > 0.0)
        .fold(f64::INFINITY, f64::min);
    let liquidity_factor = if min_liquidity.is_finite() {
        (min_liquidity / 1_000_000.0).max(0.1)
    } else {
        0.1
    };
    let sandwich = (avg_slippage * 20.0 / liquidity_factor).min(1.0);

    // Backrun risk grows with bridge-hop count (more settlement windows to race).
    let bridge_hops = path.iter().filter(|s| s.kind == StepKind::Bridge).count() as f64;
    let backrun = (bridge_hops * 0.05).min(1.0);

    frontrun.max(sandwich).max(backrun).clamp(0.0, constants.mev_cost_cap)
}

/// Aggregate all five calculators into one breakdown.
pub fn compute_cost_breakdown(
    path: &ExecutionPath,
    snapshot: &MarketSnapshot,
    keys: &[AssetPriceKey],
    notional: f64,
    gross_profit: f64,
    constants: &CostConstants,
) -> CostBreakdown {
    let gas = gas_cost(path, snapshot, constants);
    let bridge = bridge_fee_cost(path, snapshot, notional, constants);
    let slippage = slippage_cost(path, snapshot, notional, constants);
    let time = time_opportunity_cost(path, gross_profit, constants);
    let mev = mev_cost(path, snapshot, keys, notional, gross_profit, constants);
    let total = gas.value + bridge.value + slippage.value + time.value + mev.value;
    CostBreakdown { gas, bridge, slippage, time, mev, total }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChainId, ExecutionStep, Protocol};

    fn step(kind: StepKind, chain: &str, gas: f64, time: f64, protocol: &str) -> ExecutionStep {
        ExecutionStep {
            kind,
            chain: ChainId::new(chain),
            protocol: Protocol::new(protocol),
            contract: None,
            gas_estimate: gas,
            time_estimate_s: time,
            dependencies: vec![],
        }
    }

    fn snapshot() -> MarketSnapshot {
        let mut s = MarketSnapshot::default();
        s.chain_gas_price_gwei.insert(ChainId::new("ethereum"), 30.0);
        s.chain_native_usd_price.insert(ChainId::new("ethereum"), 3000.0);
        s
    }

    #[test]
    fn gas_cost_uses_per_chain_price_not_even_split() {
        let snap = snapshot();
        let constants = CostConstants::default();
        let path = vec![step(StepKind::Swap, "ethereum", 150_000.0, 15.0, "uniswap")];
        let cost = gas_cost(&path, &snap, &constants);
        // 150_000 * 30e-9 * 3000 = 13.5, * buffer 1.2 = 16.2
        assert!((cost.value - 16.2).abs() < 1e-6);
    }

    #[test]
    fn mev_cost_zero_for_zero_profit_path() {
        let snap = snapshot();
        let constants = CostConstants::default();
        let path = vec![step(StepKind::Swap, "ethereum", 100_000.0, 10.0, "uniswap")];
        let cost = mev_cost(&path, &snap, &[], 100.0, 0.0, &constants);
        assert_eq!(cost.value, 0.0);
    }

    #[test]
    fn mev_risk_fraction_capped() {
        let snap = snapshot();
        let constants = CostConstants::default();
        let path = vec![
            step(StepKind::Bridge, "ethereum", 100_000.0, 10.0, "bridge-a"),
            step(StepKind::Bridge, "polygon", 100_000.0, 10.0, "bridge-b"),
            step(StepKind::Bridge, "arbitrum", 100_000.0, 10.0, "bridge-c"),
            step(StepKind::Bridge, "fantom", 100_000.0, 10.0, "bridge-d"),
            step(StepKind::Bridge, "optimism", 100_000.0, 10.0, "bridge-e"),
        ];
        let fraction = mev_risk_fraction(&path, &snap, &[], 1_000_000.0, &constants);
        assert!(fraction <= constants.mev_cost_cap);
    }

    #[test]
    fn mev_risk_fraction_falls_with_liquidity() {
        let mut snap = snapshot();
        let key: AssetPriceKey = (ChainId::new("ethereum"), crate::types::AssetId::new("USDC"));
        let path = vec![step(StepKind::Swap, "ethereum", 100_000.0, 10.0, "uniswap")];
        snap.slippage_fraction_by_protocol.insert(Protocol::new("uniswap"), 0.02);

        snap.liquidity_by_chain_asset.insert(key.clone(), 100_000.0);
        let thin = mev_risk_fraction(&path, &snap, std::slice::from_ref(&key), 1_000.0, &CostConstants::default());

        snap.liquidity_by_chain_asset.insert(key.clone(), 50_000_000.0);
        let deep = mev_risk_fraction(&path, &snap, std::slice::from_ref(&key), 1_000.0, &CostConstants::default());

        assert!(deep < thin, "sandwich risk should fall as liquidity rises: deep={deep} thin={thin}");
    }

    #[test]
    fn breakdown_total_sums_components() {
        let snap = snapshot();
        let constants = CostConstants::default();
        let path = vec![step(StepKind::Swap, "ethereum", 150_000.0, 15.0, "uniswap")];
        let breakdown = compute_cost_breakdown(&path, &snap, &[], 10_000.0, 50.0, &constants);
        let expected = breakdown.gas.value
            + breakdown.bridge.value
            + breakdown.slippage.value
            + breakdown.time.value
            + breakdown.mev.value;
        assert!((breakdown.total - expected).abs() < 1e-9);
    }
}
