//! Payment-network classification.
//!
//! A request declares how it can be paid through exactly one extension whose
//! `type` is [`PAYMENT_NETWORK_TYPE`]. The extension `id` selects a
//! [`PaymentNetworkVariant`]; the extension `values` carry the parameters that
//! variant needs.

use std::fmt;

use alloy_primitives::{Address, U256};
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::conversion::parse_decimal;
use crate::error::ClassificationError;
use crate::request::{Extension, Request, parse_units};

/// Extension `type` tag of payment networks.
pub const PAYMENT_NETWORK_TYPE: &str = "payment-network";

/// Extension ids of the supported payment networks.
pub mod ids {
    /// Fiat-denominated request paid in an accepted ERC20 through a conversion proxy.
    pub const ANY_TO_ERC20_PROXY: &str = "pn-any-to-erc20-proxy";
    /// ERC20 payment through a proxy that also transfers a fee.
    pub const ERC20_FEE_PROXY: &str = "pn-erc20-fee-proxy-contract";
    /// Plain ERC20 payment through a proxy.
    pub const ERC20_PROXY: &str = "pn-erc20-proxy-contract";
    /// Native payment through a fee proxy.
    pub const ETH_FEE_PROXY: &str = "pn-eth-fee-proxy-contract";
    /// Native payment referenced in the transaction input data.
    pub const ETH_INPUT_DATA: &str = "pn-eth-input-data";
}

/// The on-chain settlement protocol a request accepts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PaymentNetworkVariant {
    /// Fiat invoice paid in an ERC20 through a conversion proxy.
    AnyToErc20Proxy,
    /// ERC20 invoice paid through a fee proxy.
    Erc20FeeProxy,
    /// ERC20 invoice paid through a plain proxy.
    Erc20Proxy,
    /// Native-currency invoice paid through a fee proxy.
    EthProxy,
    /// Native-currency invoice paid with reference in input data.
    EthInputData,
    /// Any other extension id.
    Unsupported(String),
}

impl PaymentNetworkVariant {
    /// Maps an extension id to its variant.
    #[must_use]
    pub fn from_id(id: &str) -> Self {
        match id {
            ids::ANY_TO_ERC20_PROXY => Self::AnyToErc20Proxy,
            ids::ERC20_FEE_PROXY => Self::Erc20FeeProxy,
            ids::ERC20_PROXY => Self::Erc20Proxy,
            ids::ETH_FEE_PROXY => Self::EthProxy,
            ids::ETH_INPUT_DATA => Self::EthInputData,
            other => Self::Unsupported(other.to_owned()),
        }
    }

    /// The extension id of this variant.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::AnyToErc20Proxy => ids::ANY_TO_ERC20_PROXY,
            Self::Erc20FeeProxy => ids::ERC20_FEE_PROXY,
            Self::Erc20Proxy => ids::ERC20_PROXY,
            Self::EthProxy => ids::ETH_FEE_PROXY,
            Self::EthInputData => ids::ETH_INPUT_DATA,
            Self::Unsupported(id) => id,
        }
    }

    /// Whether the payment amount comes from a fiat conversion.
    #[must_use]
    pub const fn requires_conversion(&self) -> bool {
        matches!(self, Self::AnyToErc20Proxy)
    }

    /// Whether the payer spends an ERC20 and thus needs an allowance.
    #[must_use]
    pub const fn is_erc20(&self) -> bool {
        matches!(
            self,
            Self::AnyToErc20Proxy | Self::Erc20FeeProxy | Self::Erc20Proxy
        )
    }

    /// Whether the payer spends the chain's native asset.
    #[must_use]
    pub const fn is_native(&self) -> bool {
        matches!(self, Self::EthProxy | Self::EthInputData)
    }
}

impl fmt::Display for PaymentNetworkVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Values of a conversion payment network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionParameters {
    /// Network the payment must happen on.
    pub network: String,
    /// Token contracts the payee accepts.
    pub accepted_tokens: Vec<Address>,
    /// Fee in the invoice currency's unit, zero when absent.
    pub fee_amount: Decimal,
    /// Payee address.
    pub payment_address: Address,
    /// Fee recipient.
    pub fee_address: Option<Address>,
}

impl ConversionParameters {
    /// Whether `token` is one of the accepted tokens.
    #[must_use]
    pub fn accepts(&self, token: Address) -> bool {
        self.accepted_tokens.contains(&token)
    }
}

/// Values of a fee proxy payment network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeProxyParameters {
    /// Payee address.
    pub payment_address: Address,
    /// Fee recipient.
    pub fee_address: Option<Address>,
    /// Fee in base units, zero when absent.
    pub fee_amount: U256,
}

/// Values of a proxy or input-data payment network without fees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyParameters {
    /// Payee address.
    pub payment_address: Address,
}

/// Parameters extracted for one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantParameters {
    /// See [`PaymentNetworkVariant::AnyToErc20Proxy`].
    AnyToErc20Proxy(ConversionParameters),
    /// See [`PaymentNetworkVariant::Erc20FeeProxy`].
    Erc20FeeProxy(FeeProxyParameters),
    /// See [`PaymentNetworkVariant::Erc20Proxy`].
    Erc20Proxy(ProxyParameters),
    /// See [`PaymentNetworkVariant::EthProxy`].
    EthProxy(FeeProxyParameters),
    /// See [`PaymentNetworkVariant::EthInputData`].
    EthInputData(ProxyParameters),
}

impl VariantParameters {
    /// Fee added to the invoice amount, in base units, for direct variants.
    #[must_use]
    pub const fn fee_units(&self) -> U256 {
        match self {
            Self::Erc20FeeProxy(p) | Self::EthProxy(p) => p.fee_amount,
            _ => U256::ZERO,
        }
    }

    /// Network required by the variant itself, if it names one.
    #[must_use]
    pub fn network(&self) -> Option<&str> {
        match self {
            Self::AnyToErc20Proxy(p) => Some(&p.network),
            _ => None,
        }
    }
}

/// Returns the single payment-network extension of `request`.
fn payment_network_extension(request: &Request) -> Result<&Extension, ClassificationError> {
    let mut found = request
        .extensions
        .values()
        .filter(|ext| ext.kind == PAYMENT_NETWORK_TYPE);
    let first = found.next().ok_or(ClassificationError::NoPaymentNetwork)?;
    let rest: Vec<&Extension> = found.collect();
    if rest.is_empty() {
        Ok(first)
    } else {
        let ids = std::iter::once(first)
            .chain(rest)
            .map(|ext| ext.id.clone())
            .collect();
        Err(ClassificationError::AmbiguousPaymentNetwork { ids })
    }
}

/// Determines which payment-network variant `request` uses.
///
/// An unknown extension id yields [`PaymentNetworkVariant::Unsupported`]
/// rather than an error, so callers can decide how to report it.
///
/// # Errors
///
/// - [`ClassificationError::NoPaymentNetwork`] without a payment-network extension
/// - [`ClassificationError::AmbiguousPaymentNetwork`] with more than one
pub fn classify(request: &Request) -> Result<PaymentNetworkVariant, ClassificationError> {
    payment_network_extension(request).map(|ext| PaymentNetworkVariant::from_id(&ext.id))
}

/// Extracts the parameters `variant` needs from `request`.
///
/// # Errors
///
/// - the errors of [`classify`]
/// - [`ClassificationError::UnsupportedPaymentNetwork`] for
///   [`PaymentNetworkVariant::Unsupported`] or if `variant` is not the
///   request's variant
/// - [`ClassificationError::MissingParameter`] or
///   [`ClassificationError::InvalidParameter`] for absent or malformed values
pub fn extract_parameters(
    request: &Request,
    variant: &PaymentNetworkVariant,
) -> Result<VariantParameters, ClassificationError> {
    let ext = payment_network_extension(request)?;
    if matches!(variant, PaymentNetworkVariant::Unsupported(_)) || ext.id != variant.id() {
        return Err(ClassificationError::UnsupportedPaymentNetwork {
            id: variant.id().to_owned(),
        });
    }
    let values = Values {
        id: &ext.id,
        values: &ext.values,
    };

    Ok(match variant {
        PaymentNetworkVariant::AnyToErc20Proxy => {
            let accepted_tokens = values.addresses("acceptedTokens")?;
            if accepted_tokens.is_empty() {
                return Err(values.invalid("acceptedTokens", &Value::Array(Vec::new())));
            }
            VariantParameters::AnyToErc20Proxy(ConversionParameters {
                network: values.string("network")?.to_owned(),
                accepted_tokens,
                fee_amount: values.decimal_or_zero("feeAmount")?,
                payment_address: values.address("paymentAddress")?,
                fee_address: values.optional_address("feeAddress")?,
            })
        }
        PaymentNetworkVariant::Erc20FeeProxy | PaymentNetworkVariant::EthProxy => {
            let params = FeeProxyParameters {
                payment_address: values.address("paymentAddress")?,
                fee_address: values.optional_address("feeAddress")?,
                fee_amount: values.units_or_zero("feeAmount")?,
            };
            if matches!(variant, PaymentNetworkVariant::EthProxy) {
                VariantParameters::EthProxy(params)
            } else {
                VariantParameters::Erc20FeeProxy(params)
            }
        }
        PaymentNetworkVariant::Erc20Proxy => VariantParameters::Erc20Proxy(ProxyParameters {
            payment_address: values.address("paymentAddress")?,
        }),
        PaymentNetworkVariant::EthInputData => VariantParameters::EthInputData(ProxyParameters {
            payment_address: values.address("paymentAddress")?,
        }),
        PaymentNetworkVariant::Unsupported(id) => {
            return Err(ClassificationError::UnsupportedPaymentNetwork { id: id.clone() });
        }
    })
}

/// Typed accessors over an extension's `values`.
struct Values<'a> {
    id: &'a str,
    values: &'a Map<String, Value>,
}

impl<'a> Values<'a> {
    fn missing(&self, field: &'static str) -> ClassificationError {
        ClassificationError::MissingParameter {
            id: self.id.to_owned(),
            field,
        }
    }

    fn invalid(&self, field: &'static str, value: &Value) -> ClassificationError {
        ClassificationError::InvalidParameter {
            id: self.id.to_owned(),
            field,
            value: value.to_string(),
        }
    }

    fn get(&self, field: &'static str) -> Option<&'a Value> {
        self.values.get(field).filter(|v| !v.is_null())
    }

    fn string(&self, field: &'static str) -> Result<&'a str, ClassificationError> {
        let value = self.get(field).ok_or_else(|| self.missing(field))?;
        value
            .as_str()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| self.invalid(field, value))
    }

    fn parse_address(&self, field: &'static str, value: &Value) -> Result<Address, ClassificationError> {
        value
            .as_str()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.invalid(field, value))
    }

    fn address(&self, field: &'static str) -> Result<Address, ClassificationError> {
        let value = self.get(field).ok_or_else(|| self.missing(field))?;
        self.parse_address(field, value)
    }

    fn optional_address(&self, field: &'static str) -> Result<Option<Address>, ClassificationError> {
        self.get(field)
            .map(|value| self.parse_address(field, value))
            .transpose()
    }

    fn addresses(&self, field: &'static str) -> Result<Vec<Address>, ClassificationError> {
        let value = self.get(field).ok_or_else(|| self.missing(field))?;
        let items = value.as_array().ok_or_else(|| self.invalid(field, value))?;
        items
            .iter()
            .map(|item| self.parse_address(field, item))
            .collect()
    }

    fn decimal_or_zero(&self, field: &'static str) -> Result<Decimal, ClassificationError> {
        let Some(value) = self.get(field) else {
            return Ok(Decimal::ZERO);
        };
        let parsed = match value {
            Value::String(s) => parse_decimal(s).ok(),
            Value::Number(n) => parse_decimal(&n.to_string()).ok(),
            _ => None,
        };
        parsed
            .filter(|d| !d.is_sign_negative())
            .ok_or_else(|| self.invalid(field, value))
    }

    fn units_or_zero(&self, field: &'static str) -> Result<U256, ClassificationError> {
        let Some(value) = self.get(field) else {
            return Ok(U256::ZERO);
        };
        let parsed = match value {
            Value::String(s) => parse_units(s).ok(),
            Value::Number(n) => parse_units(&n.to_string()).ok(),
            _ => None,
        };
        parsed.ok_or_else(|| self.invalid(field, value))
    }
}
