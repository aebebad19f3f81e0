//! Currency metadata and the registry it is resolved from.

use std::future::Future;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// How a currency is transferred on-chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurrencyKind {
    /// The chain's native asset.
    #[serde(rename = "ETH")]
    Native,
    /// An ERC20 token.
    #[serde(rename = "ERC20")]
    Erc20,
}

/// Metadata of a payment currency.
///
/// Resolved from a [`CurrencyRegistry`] once per settlement attempt and not
/// cached beyond it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyInfo {
    /// Registry identifier (e.g. `"USDC-matic"`).
    pub id: String,
    /// Ticker symbol.
    pub symbol: String,
    /// Native asset or token.
    #[serde(rename = "type")]
    pub kind: CurrencyKind,
    /// Contract address for tokens, symbol for native assets.
    pub value: String,
    /// Network the currency lives on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    /// Decimal precision of the base unit.
    pub decimals: u8,
    /// Symbol the rate oracle knows this currency by.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange_code: Option<String>,
}

impl CurrencyInfo {
    /// Returns the token contract address for ERC20 currencies.
    #[must_use]
    pub fn token_address(&self) -> Option<Address> {
        match self.kind {
            CurrencyKind::Erc20 => self.value.parse().ok(),
            CurrencyKind::Native => None,
        }
    }

    /// Compares `value` with this currency's value, ignoring case.
    #[must_use]
    pub fn matches_value(&self, value: &str) -> bool {
        self.value.eq_ignore_ascii_case(value)
    }

    /// Symbol to query the rate oracle with: the exchange code when present,
    /// the ticker symbol otherwise.
    #[must_use]
    pub fn exchange_symbol(&self) -> &str {
        self.exchange_code.as_deref().unwrap_or(&self.symbol)
    }
}

/// Resolves currency identifiers or contract addresses to metadata.
pub trait CurrencyRegistry: Send + Sync {
    /// Error type for registry failures.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Looks up one currency by identifier or contract address.
    ///
    /// Returns `Ok(None)` when the registry does not know the currency.
    fn currency(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<CurrencyInfo>, Self::Error>> + Send;

    /// Lists every currency the registry knows.
    fn currencies(&self) -> impl Future<Output = Result<Vec<CurrencyInfo>, Self::Error>> + Send;
}

impl<T: CurrencyRegistry> CurrencyRegistry for std::sync::Arc<T> {
    type Error = T::Error;

    fn currency(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<CurrencyInfo>, Self::Error>> + Send {
        (**self).currency(id)
    }

    fn currencies(&self) -> impl Future<Output = Result<Vec<CurrencyInfo>, Self::Error>> + Send {
        (**self).currencies()
    }
}
