//! Arbitrage Graph Builder.
//!
//! Rebuilt fresh every detection tick from a price snapshot; never mutated
//! after hand-off to the cycle detector. Generalized from a per-request
//! swap graph over live pool data on one EVM chain into "(chain, asset)
//! nodes with swap and bridge edges across the whole cross-chain universe."

use crate::adapters::BridgeCatalog;
use crate::asset_map::AssetMapper;
use crate::config::GraphConfig;
use crate::types::{AssetPrice, AssetPriceKey, EdgeKind, GraphEdge, GraphNode, Protocol};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct ArbitrageGraph {
    pub nodes: HashMap<AssetPriceKey, GraphNode>,
    pub edges: HashMap<AssetPriceKey, Vec<GraphEdge>>,
}

impl ArbitrageGraph {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(|v| v.len()).sum()
    }

    pub fn price_of(&self, key: &AssetPriceKey) -> Option<f64> {
        self.nodes.get(key).map(|n| n.price)
    }
}

/// `w = -(ln(p_v/p_u) - cost_absolute/p_u)`. Log space turns
/// the product of ratios around a cycle into a sum the relaxation algorithm
/// can compare; a negative total corresponds to multiplicative return > 1.
fn edge_weight(p_u: f64, p_v: f64, cost_absolute: f64) -> f64 {
    if p_u <= 0.0 || p_v <= 0.0 || !p_u.is_finite() || !p_v.is_finite() {
        return f64::INFINITY;
    }
    let ratio = p_v / p_u;
    if ratio <= 0.0 || !ratio.is_finite() {
        return f64::INFINITY;
    }
    -(ratio.ln() - cost_absolute / p_u)
}

/// Whether the mapper has both chains registered for this canonical asset —
/// the "equivalence info" the graph builder consults before assuming two
/// same-symbol prices on different chains are the same fungible asset.
fn mapper_confirms_route(mapper: &AssetMapper, asset: &crate::types::AssetId, a: &crate::types::ChainId, b: &crate::types::ChainId) -> bool {
    let chains = mapper.known_chains(asset);
    chains.contains(a) && chains.contains(b)
}

/// Build the per-tick graph from a non-stale price snapshot. Numerical
/// pathologies (`p <= 0`, NaN) are rejected here rather than propagated as
/// an edge with an undefined weight.
pub fn build_graph(
    prices: &[AssetPrice],
    mapper: &AssetMapper,
    bridges: &dyn BridgeCatalog,
    config: &GraphConfig,
) -> ArbitrageGraph {
    let mut graph = ArbitrageGraph::default();

    for p in prices {
        if !p.price.is_finite() || p.price <= 0.0 {
            debug!("graph builder: rejecting non-positive/NaN price for {:?}", p.key());
            continue;
        }
        graph.nodes.insert(
            p.key(),
            GraphNode {
                node_id: p.key(),
                price: p.price,
                liquidity: p.liquidity,
                last_update: p.timestamp,
            },
        );
    }

    let keys: Vec<AssetPriceKey> = graph.nodes.keys().cloned().collect();

    for from in &keys {
        let from_node = &graph.nodes[from];
        let mut out_edges = Vec::new();

        for to in &keys {
            if from == to {
                continue;
            }
            let to_node = &graph.nodes[to];

            if from.0 == to.0 {
                // Same chain: one swap edge per configured DEX. Without a
                // configured DEX list for the chain, fall back to a single
                // generic venue so the graph still models the route.
                let dexes = config
                    .dexes_per_chain
                    .get(&from.0)
                    .cloned()
                    .unwrap_or_else(|| vec![Protocol::new("generic-dex")]);
                let cost_absolute = config
                    .chain_gas_cost_estimate_usd
                    .get(&from.0)
                    .copied()
                    .unwrap_or(config.default_swap_gas_cost_usd);

                for protocol in dexes {
                    let weight = edge_weight(from_node.price, to_node.price, cost_absolute);
                    out_edges.push(GraphEdge {
                        to: to.clone(),
                        kind: EdgeKind::Swap,
                        cost_absolute,
                        cost_time_s: config.typical_swap_time_s,
                        protocol,
                        contract: None,
                        weight,
                    });
                }
            } else if from.1 == to.1 && mapper_confirms_route(mapper, &from.1, &from.0, &to.0) {
                // Different chains, same canonical asset *and* the mapper
                // actually knows both chains for it: one
                // bridge edge per bridge that serves both chains.
                for bridge in bridges.bridges(&from.0, &to.0) {
                    let cost_absolute = bridge.fee.base + to_node.price * bridge.fee.percentage;
                    let weight = edge_weight(from_node.price, to_node.price, cost_absolute);
                    out_edges.push(GraphEdge {
                        to: to.clone(),
                        kind: EdgeKind::Bridge,
                        cost_absolute,
                        cost_time_s: bridge.avg_processing_seconds as f64,
                        protocol: Protocol::new(bridge.id.as_str()),
                        contract: bridge.contract_per_chain.get(&to.0).cloned(),
                        weight,
                    });
                }
            }
        }

        if !out_edges.is_empty() {
            graph.edges.insert(from.clone(), out_edges);
        }
    }

    debug!(
        "graph built: {} nodes, {} edges",
        graph.node_count(),
        graph.edge_count()
    );
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::StaticBridgeCatalog;
    use crate::types::{AssetId, ChainId};

    fn price(chain: &str, asset: &str, p: f64) -> AssetPrice {
        AssetPrice {
            asset: AssetId::new(asset),
            chain: ChainId::new(chain),
            price: p,
            liquidity: 1_000_000.0,
            slippage: 0.001,
            timestamp: 1_000,
            sources: vec!["test".to_string()],
        }
    }

    #[test]
    fn single_chain_emits_swap_edges_both_directions() {
        let mapper = AssetMapper::bootstrap();
        let bridges = StaticBridgeCatalog::default();
        let prices = vec![price("ethereum", "USDC", 1.00), price("ethereum", "DAI", 1.005)];
        let graph = build_graph(&prices, &mapper, &bridges, &GraphConfig::default());

        assert_eq!(graph.node_count(), 2);
        let usdc = (ChainId::new("ethereum"), AssetId::new("USDC"));
        let dai = (ChainId::new("ethereum"), AssetId::new("DAI"));
        assert!(graph.edges.get(&usdc).unwrap().iter().any(|e| e.to == dai));
        assert!(graph.edges.get(&dai).unwrap().iter().any(|e| e.to == usdc));
    }

    #[test]
    fn rejects_non_positive_price() {
        let mapper = AssetMapper::bootstrap();
        let bridges = StaticBridgeCatalog::default();
        let prices = vec![price("ethereum", "USDC", -1.0), price("ethereum", "DAI", 1.0)];
        let graph = build_graph(&prices, &mapper, &bridges, &GraphConfig::default());
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn cross_chain_same_asset_gets_bridge_edge() {
        let mapper = AssetMapper::bootstrap();
        let eth_addr = mapper.addresses(&AssetId::new("USDC"))[&ChainId::new("ethereum")].clone();
        let poly_addr = mapper.addresses(&AssetId::new("USDC"))[&ChainId::new("polygon")].clone();
        let _ = (eth_addr, poly_addr); // mapper already knows these canonicalize together

        let bridge = crate::types::BridgeConfig {
            id: crate::types::BridgeId::new("stargate"),
            kind: crate::types::BridgeKind::ThirdParty,
            supported_chains: vec![ChainId::new("ethereum"), ChainId::new("polygon")],
            trust_level: 80,
            avg_processing_seconds: 600,
            fee: crate::types::BridgeFee {
                base: 5.0,
                percentage: 0.001,
                min: 5.0,
                max: 500.0,
            },
            contract_per_chain: HashMap::new(),
        };
        let bridges = StaticBridgeCatalog::new(vec![bridge]);

        let prices = vec![price("ethereum", "USDC", 1.0000), price("polygon", "USDC", 0.9965)];
        let graph = build_graph(&prices, &mapper, &bridges, &GraphConfig::default());

        let eth = (ChainId::new("ethereum"), AssetId::new("USDC"));
        let poly = (ChainId::new("polygon"), AssetId::new("USDC"));
        let edges = graph.edges.get(&eth).expect("eth -> poly bridge edge");
        assert!(edges.iter().any(|e| e.to == poly && e.kind == EdgeKind::Bridge));
    }

    #[test]
    fn different_assets_same_chain_no_cross_chain_edge() {
        let mapper = AssetMapper::bootstrap();
        let bridges = StaticBridgeCatalog::default();
        let prices = vec![price("ethereum", "USDC", 1.0), price("polygon", "DAI", 1.0)];
        let graph = build_graph(&prices, &mapper, &bridges, &GraphConfig::default());
        // Different chains, different (non-canonically-equal) assets: no edge at all.
        let eth = (ChainId::new("ethereum"), AssetId::new("USDC"));
        assert!(graph.edges.get(&eth).is_none());
    }
}
