//! Wire types of the currency registry API.

use rsettle::currency::{CurrencyInfo, CurrencyKind};
use serde::{Deserialize, Serialize};

/// Currency type tag of native assets.
pub const NATIVE_TYPE: &str = "ETH";

/// Currency type tag of ERC20 tokens.
pub const ERC20_TYPE: &str = "ERC20";

/// A currency as returned by `GET /currency` and `GET /currency/<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyRecord {
    /// Registry identifier (e.g. `"USDC-matic"`).
    pub id: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Ticker symbol.
    pub symbol: String,
    /// Currency type (`"ETH"`, `"ERC20"`, `"ISO4217"`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Decimal precision.
    pub decimals: u8,
    /// Token contract address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Currency hash, used as the value when no address is present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// Network identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    /// Extra metadata.
    #[serde(default, alias = "metadata", skip_serializing_if = "Option::is_none")]
    pub meta: Option<CurrencyMeta>,
}

/// Metadata block of a [`CurrencyRecord`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyMeta {
    /// Exchange listings keyed by exchange.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange_info: Option<ExchangeInfo>,
}

/// Exchange listings of a currency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeInfo {
    /// CryptoCompare listing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cryptocompare: Option<ExchangeListing>,
}

/// A currency code on one exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeListing {
    /// Symbol on the exchange.
    pub code: String,
}

/// Error converting a [`CurrencyRecord`] into [`CurrencyInfo`].
#[derive(Debug, thiserror::Error)]
pub enum CurrencyRecordError {
    /// The record is not a native asset or ERC20 token.
    #[error("Currency {id} has unsupported type {kind}")]
    UnsupportedType {
        /// Record identifier.
        id: String,
        /// Record type tag.
        kind: String,
    },
    /// An ERC20 record carries neither address nor hash.
    #[error("Token {id} has no contract address")]
    MissingAddress {
        /// Record identifier.
        id: String,
    },
}

impl CurrencyRecord {
    /// The CryptoCompare code of this currency, if listed.
    #[must_use]
    pub fn exchange_code(&self) -> Option<&str> {
        self.meta
            .as_ref()?
            .exchange_info
            .as_ref()?
            .cryptocompare
            .as_ref()
            .map(|listing| listing.code.as_str())
    }
}

impl TryFrom<CurrencyRecord> for CurrencyInfo {
    type Error = CurrencyRecordError;

    fn try_from(record: CurrencyRecord) -> Result<Self, Self::Error> {
        let exchange_code = record.exchange_code().map(str::to_owned);
        let (kind, value) = match record.kind.as_str() {
            NATIVE_TYPE => (CurrencyKind::Native, record.symbol.clone()),
            ERC20_TYPE => {
                let value = record
                    .address
                    .or(record.hash)
                    .ok_or_else(|| CurrencyRecordError::MissingAddress {
                        id: record.id.clone(),
                    })?;
                (CurrencyKind::Erc20, value)
            }
            _ => {
                return Err(CurrencyRecordError::UnsupportedType {
                    id: record.id,
                    kind: record.kind,
                });
            }
        };
        Ok(Self {
            id: record.id,
            symbol: record.symbol,
            kind,
            value,
            network: record.network,
            decimals: record.decimals,
            exchange_code,
        })
    }
}
