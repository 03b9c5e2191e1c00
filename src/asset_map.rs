//! Asset Mapper.
//!
//! Canonicalizes per-chain token addresses into a single cross-chain asset
//! identity: a bundled default table plus a reverse index kept consistent
//! with the forward one, generalized from a single-chain EVM registry to
//! opaque multi-chain identifiers.

use crate::types::{Address, AssetId, ChainAssetInfo, ChainId};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Forward + reverse asset index. Both indices are updated atomically
/// under a single write lock so a reader never observes one without the other.
pub struct AssetMapper {
    inner: Arc<RwLock<Inner>>,
}

struct Inner {
    // canonical asset -> per-chain info
    forward: HashMap<AssetId, HashMap<ChainId, ChainAssetInfo>>,
    // (chain, address) -> canonical asset
    reverse: HashMap<(ChainId, Address), AssetId>,
}

impl Default for AssetMapper {
    fn default() -> Self {
        Self::bootstrap()
    }
}

impl AssetMapper {
    fn empty() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                forward: HashMap::new(),
                reverse: HashMap::new(),
            })),
        }
    }

    /// Bootstrap from the bundled default table: native/wrapped ETH, USDC, WBTC, MATIC,
    /// the commonly cross-chain-traded assets.
    pub fn bootstrap() -> Self {
        let mapper = Self::empty();
        for (asset, chain, info) in DEFAULT_ASSET_TABLE.iter() {
            mapper
                .insert(asset.clone(), chain.clone(), info.clone())
                .expect("bundled default table must be internally consistent");
        }
        info!("asset mapper bootstrapped with default table");
        mapper
    }

    /// Add or replace a chain entry for a canonical asset at runtime.
    ///
    /// Invariant: every `(chain, address)` maps to at most one
    /// canonical asset — re-pointing an address away from its current asset
    /// first removes the stale reverse entry.
    pub fn insert(
        &self,
        asset: AssetId,
        chain: ChainId,
        info: ChainAssetInfo,
    ) -> Result<(), String> {
        let mut guard = self.inner.write();

        if let Some(existing) = guard.reverse.get(&(chain.clone(), info.address.clone())) {
            if existing != &asset {
                return Err(format!(
                    "{:?} on {:?} already maps to {:?}, refusing to remap to {:?}",
                    info.address, chain, existing, asset
                ));
            }
        }

        guard
            .reverse
            .insert((chain.clone(), info.address.clone()), asset.clone());
        guard
            .forward
            .entry(asset)
            .or_insert_with(HashMap::new)
            .insert(chain, info);
        Ok(())
    }

    pub fn canonical(&self, chain: &ChainId, address: &Address) -> Option<AssetId> {
        self.inner
            .read()
            .reverse
            .get(&(chain.clone(), address.clone()))
            .cloned()
    }

    pub fn addresses(&self, asset: &AssetId) -> HashMap<ChainId, Address> {
        self.inner
            .read()
            .forward
            .get(asset)
            .map(|m| {
                m.iter()
                    .map(|(c, info)| (c.clone(), info.address.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn equivalents(
        &self,
        chain: &ChainId,
        address: &Address,
    ) -> HashMap<ChainId, ChainAssetInfo> {
        let guard = self.inner.read();
        let Some(asset) = guard.reverse.get(&(chain.clone(), address.clone())) else {
            return HashMap::new();
        };
        guard.forward.get(asset).cloned().unwrap_or_default()
    }

    pub fn wrapped_of(&self, chain: &ChainId, address: &Address) -> Option<AssetId> {
        let guard = self.inner.read();
        let asset = guard.reverse.get(&(chain.clone(), address.clone()))?;
        let info = guard.forward.get(asset)?.get(chain)?;
        info.wrapped_of.clone()
    }

    pub fn native_of(&self, asset: &AssetId) -> Option<ChainId> {
        let guard = self.inner.read();
        guard
            .forward
            .get(asset)?
            .values()
            .find(|info| info.is_native)
            .and_then(|info| info.native_of.clone())
    }

    /// Same canonical asset reachable from two distinct chains — the predicate
    /// the graph builder uses to decide whether a bridge edge is possible.
    pub fn same_asset(&self, a: (&ChainId, &Address), b: (&ChainId, &Address)) -> bool {
        match (self.canonical(a.0, a.1), self.canonical(b.0, b.1)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    pub fn known_chains(&self, asset: &AssetId) -> Vec<ChainId> {
        self.inner
            .read()
            .forward
            .get(asset)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl Clone for AssetMapper {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Bundled default table: native/wrapped ETH, USDC, WBTC, MATIC. Static data,
/// built once on first access rather than on every `bootstrap()` call.
static DEFAULT_ASSET_TABLE: Lazy<Vec<(AssetId, ChainId, ChainAssetInfo)>> = Lazy::new(build_default_asset_table);

fn build_default_asset_table() -> Vec<(AssetId, ChainId, ChainAssetInfo)> {
    let mut rows = Vec::new();

    let mut native = |asset: &str, chain: &str, address: &str| {
        rows.push((
            AssetId::new(asset),
            ChainId::new(chain),
            ChainAssetInfo {
                address: Address::new(address),
                decimals: 18,
                is_native: true,
                is_wrapped: false,
                wrapped_of: None,
                native_of: Some(ChainId::new(chain)),
            },
        ));
    };
    let mut wrapped = |asset: &str, chain: &str, address: &str, wraps: &str| {
        rows.push((
            AssetId::new(asset),
            ChainId::new(chain),
            ChainAssetInfo {
                address: Address::new(address),
                decimals: 18,
                is_native: false,
                is_wrapped: true,
                wrapped_of: Some(AssetId::new(wraps)),
                native_of: None,
            },
        ));
    };
    let mut stable = |asset: &str, chain: &str, address: &str, decimals: u8| {
        rows.push((
            AssetId::new(asset),
            ChainId::new(chain),
            ChainAssetInfo {
                address: Address::new(address),
                decimals,
                is_native: false,
                is_wrapped: false,
                wrapped_of: None,
                native_of: None,
            },
        ));
    };

    native("ETH", "ethereum", "0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE");
    wrapped(
        "ETH",
        "ethereum",
        "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2",
        "ETH",
    );
    wrapped("ETH", "polygon", "0x7ceB23fD6bC0adD59E62ac25578270cFf1b9f619", "ETH");
    wrapped("ETH", "arbitrum", "0x82aF49447D8a07e3bd95BD0d56f35241523fBab1", "ETH");

    native("MATIC", "polygon", "0x0000000000000000000000000000000000001010");
    wrapped(
        "MATIC",
        "polygon",
        "0x0d500B1d8E8eF31E21C99d1Db9A6444d3ADf1270",
        "MATIC",
    );
    wrapped(
        "MATIC",
        "ethereum",
        "0x7D1AfA7B718fb893dB30A3aBc0Cfc608AaCfeBB0",
        "MATIC",
    );

    stable("USDC", "ethereum", "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", 6);
    stable("USDC", "polygon", "0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174", 6);
    stable("USDC", "arbitrum", "0xaf88d065e77c8cC2239327C5EDb3A432268e5831", 6);
    stable("USDC", "fantom", "0x04068DA6C83AFCFA0e13ba15A6696662335D5B75", 6);

    stable("USDT", "ethereum", "0xdAC17F958D2ee523a2206206994597C13D831ec7", 6);
    stable("USDT", "polygon", "0xc2132D05D31c914a87C6611C10748AEb04B58e8F", 6);

    stable(
        "WBTC",
        "ethereum",
        "0x2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599",
        8,
    );
    stable("WBTC", "polygon", "0x1BFD67037B42Cf73acF2047067bd4F2C47D9BfD6", 8);

    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_canonical_address() {
        let mapper = AssetMapper::bootstrap();
        let asset = AssetId::new("USDC");
        let chain = ChainId::new("ethereum");
        let addrs = mapper.addresses(&asset);
        let addr = addrs.get(&chain).expect("usdc on ethereum in default table");
        assert_eq!(mapper.canonical(&chain, addr), Some(asset));
    }

    #[test]
    fn same_asset_across_chains() {
        let mapper = AssetMapper::bootstrap();
        let eth = ChainId::new("ethereum");
        let poly = ChainId::new("polygon");
        let eth_usdc = mapper.addresses(&AssetId::new("USDC"))[&eth].clone();
        let poly_usdc = mapper.addresses(&AssetId::new("USDC"))[&poly].clone();
        assert!(mapper.same_asset((&eth, &eth_usdc), (&poly, &poly_usdc)));
    }

    #[test]
    fn reverse_index_rejects_conflicting_remap() {
        let mapper = AssetMapper::bootstrap();
        let chain = ChainId::new("ethereum");
        let addr = mapper.addresses(&AssetId::new("USDC"))[&chain].clone();
        let result = mapper.insert(
            AssetId::new("NOTUSDC"),
            chain,
            ChainAssetInfo {
                address: addr,
                decimals: 6,
                is_native: false,
                is_wrapped: false,
                wrapped_of: None,
                native_of: None,
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn unmapped_address_has_no_equivalents() {
        let mapper = AssetMapper::bootstrap();
        let chain = ChainId::new("ethereum");
        let unknown = Address::new("0xdeadbeef");
        assert!(mapper.equivalents(&chain, &unknown).is_empty());
        assert!(mapper.canonical(&chain, &unknown).is_none());
    }
}
