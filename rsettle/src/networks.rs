//! Network identification and the injected network registry.
//!
//! A [`NetworkRegistry`] maps lowercase network identifiers (`"matic"`,
//! `"mainnet"`, ...) to the chain id a wallet must be on and the RPC URL to
//! offer when the wallet does not know the chain yet.
//!
//! The registry is plain configuration data. It is built by the application
//! (from preset data such as `rsettle_evm::known_networks()` or from a JSON
//! document) and handed to the [`NetworkGateway`](crate::gateway::NetworkGateway)
//! at construction.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use url::Url;

/// An EIP-155 chain id as exchanged with wallets (`"0x89"` for Polygon).
///
/// Serializes to a `0x`-prefixed lowercase hex string, as required by
/// `wallet_switchEthereumChain`. Deserializes from a hex string, a decimal
/// string, or a JSON number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChainId(u64);

impl ChainId {
    /// Creates a chain id from its numeric value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for ChainId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Error returned when parsing an invalid chain id string.
#[derive(Debug, thiserror::Error)]
#[error("Invalid chain id {0:?}")]
pub struct ChainIdFormatError(String);

impl FromStr for ChainId {
    type Err = ChainIdFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let parsed = match trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => trimmed.parse(),
        };
        parsed
            .map(Self)
            .map_err(|_| ChainIdFormatError(s.to_owned()))
    }
}

impl Serialize for ChainId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ChainId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ChainIdVisitor;

        impl de::Visitor<'_> for ChainIdVisitor {
            type Value = ChainId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a hex or decimal chain id")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<ChainId, E> {
                Ok(ChainId(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<ChainId, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(ChainIdVisitor)
    }
}

/// Native currency advertised to the wallet when adding a chain (EIP-3085).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    /// Currency name (e.g. `"MATIC"`).
    pub name: String,
    /// Ticker symbol.
    pub symbol: String,
    /// Decimal places, 18 on every EVM chain in practice.
    pub decimals: u8,
}

/// Everything the gateway needs to move a wallet onto one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    /// Chain id the wallet must report.
    pub chain_id: ChainId,
    /// Fallback RPC endpoint offered in `wallet_addEthereumChain`.
    #[serde(alias = "fallbackRpcUrl")]
    pub rpc_url: Url,
    /// Human-readable chain name shown by the wallet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_name: Option<String>,
    /// Native currency of the chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_currency: Option<NativeCurrency>,
    /// Block explorer shown by the wallet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_explorer_url: Option<Url>,
}

impl NetworkInfo {
    /// Creates network info with only the mandatory fields.
    #[must_use]
    pub const fn new(chain_id: ChainId, rpc_url: Url) -> Self {
        Self {
            chain_id,
            rpc_url,
            chain_name: None,
            native_currency: None,
            block_explorer_url: None,
        }
    }

    /// Sets the chain name.
    #[must_use]
    pub fn with_chain_name(mut self, name: impl Into<String>) -> Self {
        self.chain_name = Some(name.into());
        self
    }

    /// Sets the native currency.
    #[must_use]
    pub fn with_native_currency(mut self, currency: NativeCurrency) -> Self {
        self.native_currency = Some(currency);
        self
    }

    /// Sets the block explorer URL.
    #[must_use]
    pub fn with_block_explorer_url(mut self, url: Url) -> Self {
        self.block_explorer_url = Some(url);
        self
    }
}

/// Registry of supported networks keyed by lowercase identifier.
///
/// Iteration order is alphabetical, so the registry can be enumerated
/// deterministically.
///
/// # Example
///
/// ```
/// use rsettle::networks::{ChainId, NetworkInfo, NetworkRegistry};
///
/// let registry = NetworkRegistry::from_json(
///     r#"{ "matic": { "chainId": "0x89", "rpcUrl": "https://polygon-rpc.com/" } }"#,
/// )
/// .unwrap();
///
/// assert_eq!(registry.get("MATIC").unwrap().chain_id, ChainId::new(137));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, NetworkInfo>",
    into = "BTreeMap<String, NetworkInfo>"
)]
pub struct NetworkRegistry {
    networks: BTreeMap<String, NetworkInfo>,
}

impl NetworkRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry from `(identifier, info)` pairs.
    #[must_use]
    pub fn from_networks<I, K>(networks: I) -> Self
    where
        I: IntoIterator<Item = (K, NetworkInfo)>,
        K: AsRef<str>,
    {
        let mut registry = Self::new();
        for (name, info) in networks {
            registry.register(name.as_ref(), info);
        }
        registry
    }

    /// Parses a registry from a JSON object of `identifier → NetworkInfo`.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the document is malformed.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Registers (or replaces) a network.
    pub fn register(&mut self, name: &str, info: NetworkInfo) {
        self.networks.insert(name.to_lowercase(), info);
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with_network(mut self, name: &str, info: NetworkInfo) -> Self {
        self.register(name, info);
        self
    }

    /// Looks a network up by identifier, ignoring case.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&NetworkInfo> {
        self.networks.get(&name.to_lowercase())
    }

    /// Finds the identifier registered for a chain id.
    #[must_use]
    pub fn name_by_chain_id(&self, chain_id: ChainId) -> Option<&str> {
        self.networks
            .iter()
            .find(|(_, info)| info.chain_id == chain_id)
            .map(|(name, _)| name.as_str())
    }

    /// Iterates over all registered networks in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &NetworkInfo)> {
        self.networks.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of registered networks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.networks.len()
    }

    /// Returns `true` if no networks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }
}

impl From<BTreeMap<String, NetworkInfo>> for NetworkRegistry {
    fn from(value: BTreeMap<String, NetworkInfo>) -> Self {
        Self::from_networks(value)
    }
}

impl From<NetworkRegistry> for BTreeMap<String, NetworkInfo> {
    fn from(value: NetworkRegistry) -> Self {
        value.networks
    }
}
