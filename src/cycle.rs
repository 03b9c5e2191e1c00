//! Cycle Detector: Bellman-Ford with predecessor tracking,
//! run once per seed node over the per-tick graph. Follows the shape of a
//! fixed-depth DFS path search but replaces it with negative-cycle
//! relaxation, since the graph here spans chains rather than pools on one
//! chain.

use crate::types::{AssetPriceKey, Cycle, GraphEdge};
use std::collections::HashMap;

use crate::graph::ArbitrageGraph;

/// Deterministic ordering key for edges leaving the same node: lower
/// weight wins, then lower `cost_time_s`, then lexicographically smaller
/// `(protocol, contract)`.
fn edge_order_key(e: &GraphEdge) -> (u64, u64, String, String) {
    (
        e.weight.to_bits(),
        e.cost_time_s.to_bits(),
        e.protocol.as_str().to_string(),
        e.contract.as_ref().map(|a| a.as_str().to_string()).unwrap_or_default(),
    )
}

/// Run Bellman-Ford from every unvisited node, collect negative cycles,
/// deduplicate by canonical rotation, and keep the top `max_cycles` sorted
/// by `profit_margin` descending.
pub fn detect_cycles(graph: &ArbitrageGraph, min_profit_threshold: f64, max_cycles: usize) -> Vec<Cycle> {
    if graph.nodes.is_empty() {
        return Vec::new();
    }

    // Deterministic node iteration order so `visited` seeding is reproducible.
    let mut node_order: Vec<AssetPriceKey> = graph.nodes.keys().cloned().collect();
    node_order.sort();

    // Pre-sort each node's outgoing edges once so relaxation ties resolve
    // the same way regardless of iteration order.
    let mut sorted_edges: HashMap<AssetPriceKey, Vec<GraphEdge>> = HashMap::new();
    for (from, edges) in &graph.edges {
        let mut e = edges.clone();
        e.sort_by(|a, b| edge_order_key(a).cmp(&edge_order_key(b)));
        sorted_edges.insert(from.clone(), e);
    }

    let mut visited: std::collections::HashSet<AssetPriceKey> = std::collections::HashSet::new();
    let mut found: Vec<Cycle> = Vec::new();
    let mut seen_keys: std::collections::HashSet<Vec<AssetPriceKey>> = std::collections::HashSet::new();

    for seed in &node_order {
        if visited.contains(seed) {
            continue;
        }

        let mut dist: HashMap<AssetPriceKey, f64> = node_order.iter().map(|n| (n.clone(), f64::INFINITY)).collect();
        let mut pred: HashMap<AssetPriceKey, AssetPriceKey> = HashMap::new();
        dist.insert(seed.clone(), 0.0);

        let n = node_order.len();
        for _ in 0..n.saturating_sub(1) {
            relax_pass(&node_order, &sorted_edges, &mut dist, &mut pred);
        }

        // One final pass: any edge that still relaxes witnesses a negative cycle.
        if let Some(witness_to) = relax_pass(&node_order, &sorted_edges, &mut dist, &mut pred) {
            if let Some(cycle_nodes) = reconstruct_cycle(&witness_to, &pred, n) {
                if cycle_nodes.len() >= 3 {
                    let rotated = canonical_rotation(&cycle_nodes);
                    if seen_keys.insert(rotated.clone()) {
                        if let Some(c) = build_cycle(graph, &rotated) {
                            if c.profit_margin > min_profit_threshold {
                                found.push(c);
                            }
                        }
                    }
                    for node in &cycle_nodes {
                        visited.insert(node.clone());
                    }
                }
            }
        }
        visited.insert(seed.clone());
    }

    found.sort_by(|a, b| {
        b.profit_margin
            .partial_cmp(&a.profit_margin)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.execution_time_s.partial_cmp(&b.execution_time_s).unwrap_or(std::cmp::Ordering::Equal))
    });
    found.truncate(max_cycles);
    found
}

/// One relaxation pass over every edge in deterministic order. Returns the
/// `to` node of an edge that still relaxed on this pass (a witness of a
/// negative cycle), if any — used for both the body passes and the final
/// detection pass.
fn relax_pass(
    node_order: &[AssetPriceKey],
    edges: &HashMap<AssetPriceKey, Vec<GraphEdge>>,
    dist: &mut HashMap<AssetPriceKey, f64>,
    pred: &mut HashMap<AssetPriceKey, AssetPriceKey>,
) -> Option<AssetPriceKey> {
    let mut witness = None;
    for from in node_order {
        let Some(d_from) = dist.get(from).copied() else { continue };
        if !d_from.is_finite() {
            continue;
        }
        let Some(out) = edges.get(from) else { continue };
        for edge in out {
            if !edge.weight.is_finite() {
                continue;
            }
            let candidate = d_from + edge.weight;
            let current = dist.get(&edge.to).copied().unwrap_or(f64::INFINITY);
            if candidate < current {
                dist.insert(edge.to.clone(), candidate);
                pred.insert(edge.to.clone(), from.clone());
                witness = Some(edge.to.clone());
            }
        }
    }
    witness
}

/// Walk predecessors from `start` until a node repeats, then return the
/// cycle segment (first occurrence .. just before the repeat), oldest-first.
fn reconstruct_cycle(
    start: &AssetPriceKey,
    pred: &HashMap<AssetPriceKey, AssetPriceKey>,
    max_steps: usize,
) -> Option<Vec<AssetPriceKey>> {
    let mut node = start.clone();
    // Bellman-Ford's |V| extra relaxation guarantees the witness node lies
    // on a cycle; stepping back |V| times lands inside it.
    for _ in 0..max_steps {
        node = pred.get(&node)?.clone();
    }

    let mut cycle = vec![node.clone()];
    let mut current = node.clone();
    loop {
        let next = pred.get(&current)?.clone();
        if next == node {
            break;
        }
        cycle.push(next.clone());
        current = next;
        if cycle.len() > max_steps + 1 {
            return None; // defensive: malformed predecessor chain, never loop forever
        }
    }
    cycle.reverse();
    Some(cycle)
}

/// Rotate so the lexicographically smallest node is first, preserving
/// traversal direction.
fn canonical_rotation(cycle: &[AssetPriceKey]) -> Vec<AssetPriceKey> {
    let (min_idx, _) = cycle
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.cmp(b))
        .expect("cycle is non-empty");
    let mut rotated = Vec::with_capacity(cycle.len());
    rotated.extend_from_slice(&cycle[min_idx..]);
    rotated.extend_from_slice(&cycle[..min_idx]);
    rotated
}

/// Compute the emitted `Cycle` record's derived fields from its rotated
/// node sequence and the graph's own edges (never re-derives weights).
fn build_cycle(graph: &ArbitrageGraph, nodes: &[AssetPriceKey]) -> Option<Cycle> {
    let mut total_weight = 0.0;
    let mut gas_cost = 0.0;
    let mut execution_time_s = 0.0;

    for i in 0..nodes.len() {
        let from = &nodes[i];
        let to = &nodes[(i + 1) % nodes.len()];
        let edge = graph
            .edges
            .get(from)?
            .iter()
            .filter(|e| &e.to == to)
            .min_by(|a, b| edge_order_key(a).cmp(&edge_order_key(b)))?;
        total_weight += edge.weight;
        gas_cost += edge.cost_absolute;
        execution_time_s += edge.cost_time_s;
    }

    // `total_weight < 0` <=> multiplicative return > 1 after costs.
    let profit_margin = (-total_weight).exp() - 1.0;
    // Structural confidence proxy: more hops, more points of failure.
    let confidence = (1.0 - nodes.len() as f64 * 0.05).clamp(0.1, 1.0);

    Some(Cycle {
        path: nodes.to_vec(),
        profit_margin,
        gas_cost,
        execution_time_s,
        confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AssetId, ChainId, EdgeKind, GraphNode, Protocol};
    use std::collections::HashMap as Map;

    fn node(chain: &str, asset: &str, price: f64) -> (AssetPriceKey, GraphNode) {
        let key = (ChainId::new(chain), AssetId::new(asset));
        (
            key.clone(),
            GraphNode {
                node_id: key,
                price,
                liquidity: 1_000_000.0,
                last_update: 0,
            },
        )
    }

    fn edge(to: &AssetPriceKey, weight: f64, cost_time_s: f64, protocol: &str) -> GraphEdge {
        GraphEdge {
            to: to.clone(),
            kind: EdgeKind::Swap,
            cost_absolute: 0.0,
            cost_time_s,
            protocol: Protocol::new(protocol),
            contract: None,
            weight,
        }
    }

    #[test]
    fn two_hop_profitable_cycle_found() {
        let (usdc_key, usdc_node) = node("ethereum", "USDC", 1.00);
        let (dai_key, dai_node) = node("ethereum", "DAI", 1.005);

        let mut nodes = Map::new();
        nodes.insert(usdc_key.clone(), usdc_node);
        nodes.insert(dai_key.clone(), dai_node);

        // Round trip USDC -> DAI -> USDC: ln(1.005/1.00) + ln(1.00/1.005) would
        // cancel exactly without costs, so bias the weights to reflect a net
        // profitable loop.
        let mut edges = Map::new();
        edges.insert(usdc_key.clone(), vec![edge(&dai_key, -0.01, 5.0, "dex-a")]);
        edges.insert(dai_key.clone(), vec![edge(&usdc_key, 0.005, 5.0, "dex-a")]);

        let graph = ArbitrageGraph { nodes, edges };
        let cycles = detect_cycles(&graph, 0.0, 10);
        assert!(!cycles.is_empty());
        assert!(cycles[0].profit_margin > 0.0);
        assert_eq!(cycles[0].path.len(), 2);
    }

    #[test]
    fn empty_graph_returns_empty() {
        let graph = ArbitrageGraph::default();
        assert!(detect_cycles(&graph, 0.0, 10).is_empty());
    }

    #[test]
    fn no_negative_cycle_returns_empty() {
        let (a_key, a_node) = node("ethereum", "A", 1.0);
        let (b_key, b_node) = node("ethereum", "B", 1.0);
        let mut nodes = Map::new();
        nodes.insert(a_key.clone(), a_node);
        nodes.insert(b_key.clone(), b_node);
        let mut edges = Map::new();
        edges.insert(a_key.clone(), vec![edge(&b_key, 0.01, 5.0, "dex-a")]);
        edges.insert(b_key.clone(), vec![edge(&a_key, 0.01, 5.0, "dex-a")]);
        let graph = ArbitrageGraph { nodes, edges };
        assert!(detect_cycles(&graph, 0.0, 10).is_empty());
    }

    #[test]
    fn lower_time_cycle_ranked_first_among_equal_margin() {
        // Two independent 2-cycles with identical total weight (hence
        // identical profit_margin) but different cumulative time; the
        // lower-time one must sort first.
        let (a_key, a_node) = node("ethereum", "A", 1.0);
        let (b_key, b_node) = node("ethereum", "B", 1.01);
        let (c_key, c_node) = node("polygon", "C", 1.0);
        let (d_key, d_node) = node("polygon", "D", 1.01);

        let mut nodes = Map::new();
        nodes.insert(a_key.clone(), a_node);
        nodes.insert(b_key.clone(), b_node);
        nodes.insert(c_key.clone(), c_node);
        nodes.insert(d_key.clone(), d_node);

        let mut edges = Map::new();
        edges.insert(a_key.clone(), vec![edge(&b_key, -0.02, 1.0, "fast")]);
        edges.insert(b_key.clone(), vec![edge(&a_key, 0.0, 1.0, "fast")]);
        edges.insert(c_key.clone(), vec![edge(&d_key, -0.02, 50.0, "slow")]);
        edges.insert(d_key.clone(), vec![edge(&c_key, 0.0, 50.0, "slow")]);

        let graph = ArbitrageGraph { nodes, edges };
        let cycles = detect_cycles(&graph, 0.0, 10);
        assert_eq!(cycles.len(), 2);
        assert!((cycles[0].profit_margin - cycles[1].profit_margin).abs() < 1e-9);
        assert!(cycles[0].execution_time_s < cycles[1].execution_time_s);
    }
}
