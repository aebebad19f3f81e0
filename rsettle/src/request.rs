//! The invoice snapshot a settlement attempt pays.
//!
//! A [`Request`] is fetched from a request registry by the caller and is
//! read-only to the pipeline. Only the fields the pipeline consumes are
//! modelled; unknown fields are ignored on deserialization.

use std::collections::BTreeMap;
use std::str::FromStr;

use alloy_primitives::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};

use crate::conversion::parse_decimal;
use crate::error::ConversionError;

/// An invoice to be paid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Identifier of the request in its registry.
    pub request_id: String,
    /// Invoice currency code (e.g. `"EUR"`, `"USDC-matic"`).
    pub currency: String,
    /// Structured description of the invoice currency, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency_info: Option<RequestCurrency>,
    /// Amount owed, in the invoice currency's smallest unit.
    #[serde(deserialize_with = "string_or_number")]
    pub expected_amount: String,
    /// Extension name to extension data.
    #[serde(default)]
    pub extensions: BTreeMap<String, Extension>,
}

/// Invoice currency as recorded on the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCurrency {
    /// Currency type tag (`"ISO4217"`, `"ETH"`, `"ERC20"`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Fiat code, native symbol, or token contract address.
    pub value: String,
    /// Network the currency lives on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
}

/// One extension attached to a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extension {
    /// Extension family (`"payment-network"`, `"content-data"`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Protocol variant within the family.
    pub id: String,
    /// Variant-specific values.
    #[serde(default)]
    pub values: Map<String, Value>,
    /// Extension version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Extension {
    /// Creates an extension with no values.
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            values: Map::new(),
            version: None,
        }
    }

    /// Sets a value.
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.values.insert(key.into(), value);
        self
    }
}

impl Request {
    /// Creates a request without extensions.
    pub fn new(
        request_id: impl Into<String>,
        currency: impl Into<String>,
        expected_amount: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            currency: currency.into(),
            currency_info: None,
            expected_amount: expected_amount.into(),
            extensions: BTreeMap::new(),
        }
    }

    /// Sets the structured invoice currency.
    #[must_use]
    pub fn with_currency_info(mut self, info: RequestCurrency) -> Self {
        self.currency_info = Some(info);
        self
    }

    /// Attaches an extension under `name`.
    #[must_use]
    pub fn with_extension(mut self, name: impl Into<String>, extension: Extension) -> Self {
        self.extensions.insert(name.into(), extension);
        self
    }

    /// The expected amount as a decimal number.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError::InvalidAmount`] if the amount is not numeric.
    pub fn expected_amount(&self) -> Result<Decimal, ConversionError> {
        parse_decimal(&self.expected_amount)
    }

    /// The expected amount as an integer in base units.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError::InvalidAmount`] if the amount is not a
    /// non-negative integer.
    pub fn expected_amount_units(&self) -> Result<U256, ConversionError> {
        parse_units(&self.expected_amount)
    }
}

/// Parses a non-negative integer amount in base units.
pub(crate) fn parse_units(value: &str) -> Result<U256, ConversionError> {
    U256::from_str(value.trim()).map_err(|_| ConversionError::InvalidAmount {
        value: value.to_owned(),
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(Number),
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s,
        StringOrNumber::Number(n) => n.to_string(),
    })
}
