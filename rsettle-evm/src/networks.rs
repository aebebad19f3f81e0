//! Preset network configurations for common EVM chains.
//!
//! These are a starting point for a [`NetworkRegistry`]; deployments are
//! expected to inject their own registry when they need other chains or
//! private RPC endpoints.

use rsettle::networks::{ChainId, NativeCurrency, NetworkInfo, NetworkRegistry};
use url::Url;

/// Ethereum Mainnet chain ID.
pub const ETHEREUM_MAINNET: ChainId = ChainId::new(1);

/// Gnosis Chain (xDai) chain ID.
pub const GNOSIS: ChainId = ChainId::new(100);

/// Polygon Mainnet chain ID.
pub const POLYGON_MAINNET: ChainId = ChainId::new(137);

/// Sepolia (testnet) chain ID.
pub const SEPOLIA: ChainId = ChainId::new(11_155_111);

struct Preset {
    name: &'static str,
    chain_id: ChainId,
    chain_name: &'static str,
    rpc_url: &'static str,
    explorer_url: &'static str,
    currency: (&'static str, &'static str),
}

const PRESETS: &[Preset] = &[
    Preset {
        name: "mainnet",
        chain_id: ETHEREUM_MAINNET,
        chain_name: "Ethereum Mainnet",
        rpc_url: "https://cloudflare-eth.com",
        explorer_url: "https://etherscan.io",
        currency: ("Ether", "ETH"),
    },
    Preset {
        name: "matic",
        chain_id: POLYGON_MAINNET,
        chain_name: "Polygon Mainnet",
        rpc_url: "https://polygon-rpc.com/",
        explorer_url: "https://polygonscan.com",
        currency: ("MATIC", "MATIC"),
    },
    Preset {
        name: "sepolia",
        chain_id: SEPOLIA,
        chain_name: "Sepolia",
        rpc_url: "https://rpc.sepolia.org",
        explorer_url: "https://sepolia.etherscan.io",
        currency: ("Sepolia Ether", "ETH"),
    },
    Preset {
        name: "xdai",
        chain_id: GNOSIS,
        chain_name: "Gnosis",
        rpc_url: "https://rpc.gnosischain.com",
        explorer_url: "https://gnosisscan.io",
        currency: ("xDAI", "xDAI"),
    },
];

/// Returns `(identifier, info)` pairs for all preset networks.
#[must_use]
pub fn known_networks() -> Vec<(&'static str, NetworkInfo)> {
    PRESETS
        .iter()
        .filter_map(|preset| {
            let rpc_url = Url::parse(preset.rpc_url).ok()?;
            let mut info = NetworkInfo::new(preset.chain_id, rpc_url)
                .with_chain_name(preset.chain_name)
                .with_native_currency(NativeCurrency {
                    name: preset.currency.0.to_owned(),
                    symbol: preset.currency.1.to_owned(),
                    decimals: 18,
                });
            if let Ok(explorer) = Url::parse(preset.explorer_url) {
                info = info.with_block_explorer_url(explorer);
            }
            Some((preset.name, info))
        })
        .collect()
}

/// Returns all preset network identifiers.
#[must_use]
pub fn known_network_ids() -> Vec<&'static str> {
    PRESETS.iter().map(|preset| preset.name).collect()
}

/// Builds a [`NetworkRegistry`] holding every preset network.
#[must_use]
pub fn known_registry() -> NetworkRegistry {
    NetworkRegistry::from_networks(known_networks())
}
