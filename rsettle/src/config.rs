//! Settlement tuning knobs.
//!
//! All fields have defaults, so an empty JSON object is a valid configuration:
//!
//! ```json
//! {
//!   "slippagePercent": "3",
//!   "confirmations": 1,
//!   "currencyAliases": { "jEUR-matic": "EUR" }
//! }
//! ```

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::conversion::DEFAULT_SLIPPAGE_PERCENT;

/// Options applied to every settlement attempt of an orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementConfig {
    /// Slippage tolerance added to converted amounts, in percent.
    #[serde(default = "default_slippage_percent")]
    pub slippage_percent: Decimal,
    /// Confirmations awaited for approvals and payments.
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,
    /// Invoice currency codes to rewrite before querying the rate oracle.
    #[serde(default = "default_currency_aliases")]
    pub currency_aliases: HashMap<String, String>,
}

fn default_slippage_percent() -> Decimal {
    DEFAULT_SLIPPAGE_PERCENT
}

const fn default_confirmations() -> u64 {
    1
}

fn default_currency_aliases() -> HashMap<String, String> {
    HashMap::from([("jEUR-matic".to_owned(), "EUR".to_owned())])
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            slippage_percent: DEFAULT_SLIPPAGE_PERCENT,
            confirmations: default_confirmations(),
            currency_aliases: default_currency_aliases(),
        }
    }
}

impl SettlementConfig {
    /// Parses a configuration document.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the document is malformed.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Sets the slippage tolerance.
    #[must_use]
    pub fn with_slippage_percent(mut self, slippage_percent: Decimal) -> Self {
        self.slippage_percent = slippage_percent;
        self
    }

    /// Sets the number of confirmations to await.
    #[must_use]
    pub fn with_confirmations(mut self, confirmations: u64) -> Self {
        self.confirmations = confirmations;
        self
    }

    /// Adds a currency alias.
    #[must_use]
    pub fn with_currency_alias(mut self, currency: impl Into<String>, symbol: impl Into<String>) -> Self {
        self.currency_aliases.insert(currency.into(), symbol.into());
        self
    }

    /// Symbol the rate oracle knows the invoice `currency` by.
    #[must_use]
    pub fn oracle_symbol<'a>(&'a self, currency: &'a str) -> &'a str {
        self.currency_aliases
            .get(currency)
            .map_or(currency, String::as_str)
    }
}
