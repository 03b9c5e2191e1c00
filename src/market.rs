//! Market context shared by the cost calculators, risk assessor, and
//! feasibility analyzer. These three components all need
//! the same per-chain/per-protocol facts (gas price, native token USD
//! price, bridge fee schedules, liquidity, recent price history) but none
//! of them owns that data — it is assembled once per detection tick from
//! the `ChainAdapter`/`BridgeCatalog` ports and handed down by reference,
//! the same "snapshot, don't hold a lock" discipline the aggregator uses
//! for its own price table.

use crate::types::{Address, AssetPriceKey, BridgeFee, ChainId, Protocol};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct MarketSnapshot {
    pub chain_gas_price_gwei: HashMap<ChainId, f64>,
    pub chain_native_usd_price: HashMap<ChainId, f64>,
    pub bridge_fee_by_protocol: HashMap<Protocol, BridgeFee>,
    pub slippage_fraction_by_protocol: HashMap<Protocol, f64>,
    pub liquidity_by_chain_asset: HashMap<AssetPriceKey, f64>,
    /// Oldest-first recent price samples, used for realized-volatility and
    /// dispersion calculations.
    pub price_history: HashMap<AssetPriceKey, Vec<f64>>,
    pub known_risky_contracts: HashSet<Address>,
    pub known_safe_protocols: HashSet<Protocol>,
    /// Per-chain base risk multiplier.
    pub chain_base_risk_multiplier: HashMap<ChainId, f64>,
    /// 0..1 infrastructure reliability per chain.
    pub chain_reliability: HashMap<ChainId, f64>,
    /// 0..1 current network congestion per chain.
    pub chain_congestion: HashMap<ChainId, f64>,
    /// Venue liquidity breakdown for a pair, used for Herfindahl concentration.
    pub venue_liquidity_by_chain_asset: HashMap<AssetPriceKey, Vec<f64>>,
}

impl MarketSnapshot {
    pub fn gas_price_gwei(&self, chain: &ChainId, default_gwei: f64) -> f64 {
        self.chain_gas_price_gwei
            .get(chain)
            .copied()
            .unwrap_or(default_gwei)
    }

    pub fn native_usd_price(&self, chain: &ChainId) -> f64 {
        self.chain_native_usd_price
            .get(chain)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn base_risk_multiplier(&self, chain: &ChainId) -> f64 {
        self.chain_base_risk_multiplier
            .get(chain)
            .copied()
            .unwrap_or(1.0)
    }

    pub fn reliability(&self, chain: &ChainId) -> f64 {
        self.chain_reliability.get(chain).copied().unwrap_or(0.95)
    }

    pub fn congestion(&self, chain: &ChainId) -> f64 {
        self.chain_congestion.get(chain).copied().unwrap_or(0.2)
    }

    pub fn liquidity(&self, key: &AssetPriceKey) -> f64 {
        self.liquidity_by_chain_asset.get(key).copied().unwrap_or(0.0)
    }

    /// `(highest - lowest) / lowest` — the fixed form of the percentage
    /// difference the reference feasibility logic computed with the wrong
    /// operator precedence. Returns 0 for fewer than two
    /// finite, positive values.
    pub fn percentage_difference(values: &[f64]) -> f64 {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite() && *v > 0.0).collect();
        if finite.len() < 2 {
            return 0.0;
        }
        let highest = finite.iter().cloned().fold(f64::MIN, f64::max);
        let lowest = finite.iter().cloned().fold(f64::MAX, f64::min);
        if lowest <= 0.0 {
            return 0.0;
        }
        (highest - lowest) / lowest
    }

    /// Herfindahl-Hirschman concentration index (sum of squared market
    /// shares) across venues for a pair — 1.0 means a single venue holds
    /// all the liquidity, 1/n means it's evenly split across n venues.
    pub fn herfindahl(&self, key: &AssetPriceKey) -> f64 {
        let Some(venues) = self.venue_liquidity_by_chain_asset.get(key) else {
            return 1.0;
        };
        let total: f64 = venues.iter().sum();
        if total <= 0.0 {
            return 1.0;
        }
        venues.iter().map(|v| (v / total).powi(2)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_difference_uses_correct_precedence() {
        // Reference bug would compute highest - (lowest / lowest) = highest - 1.
        assert!((MarketSnapshot::percentage_difference(&[100.0, 110.0]) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn percentage_difference_needs_two_values() {
        assert_eq!(MarketSnapshot::percentage_difference(&[100.0]), 0.0);
    }

    #[test]
    fn herfindahl_single_venue_is_one() {
        let mut snap = MarketSnapshot::default();
        let key = (ChainId::new("ethereum"), crate::types::AssetId::new("USDC"));
        snap.venue_liquidity_by_chain_asset.insert(key.clone(), vec![1_000_000.0]);
        assert_eq!(snap.herfindahl(&key), 1.0);
    }

    #[test]
    fn herfindahl_even_split_across_four() {
        let mut snap = MarketSnapshot::default();
        let key = (ChainId::new("ethereum"), crate::types::AssetId::new("USDC"));
        snap.venue_liquidity_by_chain_asset
            .insert(key.clone(), vec![250.0, 250.0, 250.0, 250.0]);
        assert!((snap.herfindahl(&key) - 0.25).abs() < 1e-9);
    }
}
