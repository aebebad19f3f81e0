//! Fiat to crypto spend-ceiling arithmetic.
//!
//! Pure and deterministic: no I/O, no clock. All arithmetic is done in
//! [`Decimal`] and only the final result is expanded to base units.
//!
//! The conversion follows the rate convention of the invoice data, where the
//! fiat amount is expressed in hundredths:
//!
//! ```text
//! crypto  = (amount + fee) * rate / 100
//! ceiling = round_2dp(crypto + slippage * crypto / 100)
//! ```
//!
//! Rounding is half away from zero. When rounding would bring the ceiling
//! under `crypto` itself, `crypto` rounded up to 2 decimals is used instead,
//! so the ceiling never falls below the unbuffered conversion.

use std::fmt;

use alloy_primitives::U256;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::ConversionError;

/// Slippage tolerance applied when none is configured, in percent.
pub const DEFAULT_SLIPPAGE_PERCENT: Decimal = Decimal::from_parts(3, 0, 0, false, 0);

/// Decimal places the ceiling is rounded to before base-unit expansion.
pub const CEILING_DECIMAL_PLACES: u32 = 2;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Maximum amount a payer authorizes for one payment, in the smallest unit of
/// the payment currency. Always strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpendCeiling(U256);

impl SpendCeiling {
    /// Returns the ceiling in base units.
    #[must_use]
    pub const fn amount(self) -> U256 {
        self.0
    }
}

impl fmt::Display for SpendCeiling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<SpendCeiling> for U256 {
    fn from(value: SpendCeiling) -> Self {
        value.0
    }
}

/// Inputs of one conversion, gathered once per settlement attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionQuote {
    /// Crypto units per 100 fiat units.
    pub rate: Decimal,
    /// Decimal precision of the payment currency.
    pub decimals: u8,
    /// Slippage tolerance in percent.
    pub slippage_percent: Decimal,
}

impl ConversionQuote {
    /// Creates a quote.
    #[must_use]
    pub const fn new(rate: Decimal, decimals: u8, slippage_percent: Decimal) -> Self {
        Self {
            rate,
            decimals,
            slippage_percent,
        }
    }

    /// Applies this quote to an invoice amount and fee.
    ///
    /// # Errors
    ///
    /// See [`compute_spend_ceiling`].
    pub fn spend_ceiling(
        &self,
        fiat_amount: Decimal,
        fee_amount: Decimal,
    ) -> Result<SpendCeiling, ConversionError> {
        compute_spend_ceiling(
            fiat_amount,
            fee_amount,
            self.rate,
            self.decimals,
            self.slippage_percent,
        )
    }
}

/// Computes the bounded spend ceiling for a fiat invoice.
///
/// # Errors
///
/// - [`ConversionError::RateUnavailable`] if `rate` is zero or negative
/// - [`ConversionError::NegativeSlippage`] if `slippage_percent` is negative
/// - [`ConversionError::NonPositiveAmount`] if `fiat_amount + fee_amount <= 0`
///   or either of them is negative
/// - [`ConversionError::Overflow`] if the result does not fit
pub fn compute_spend_ceiling(
    fiat_amount: Decimal,
    fee_amount: Decimal,
    rate: Decimal,
    decimals: u8,
    slippage_percent: Decimal,
) -> Result<SpendCeiling, ConversionError> {
    if rate <= Decimal::ZERO {
        return Err(ConversionError::rate_unavailable(format!(
            "rate must be positive, got {rate}"
        )));
    }
    if slippage_percent.is_sign_negative() && !slippage_percent.is_zero() {
        return Err(ConversionError::NegativeSlippage);
    }
    if fiat_amount.is_sign_negative() || fee_amount.is_sign_negative() {
        return Err(ConversionError::NonPositiveAmount);
    }

    let total = fiat_amount
        .checked_add(fee_amount)
        .ok_or(ConversionError::Overflow)?;
    if total.is_zero() {
        return Err(ConversionError::NonPositiveAmount);
    }

    let crypto = total
        .checked_mul(rate)
        .and_then(|v| v.checked_div(HUNDRED))
        .ok_or(ConversionError::Overflow)?;
    let buffer = slippage_percent
        .checked_mul(crypto)
        .and_then(|v| v.checked_div(HUNDRED))
        .ok_or(ConversionError::Overflow)?;
    let inflated = crypto
        .checked_add(buffer)
        .ok_or(ConversionError::Overflow)?;

    let rounded = inflated.round_dp_with_strategy(
        CEILING_DECIMAL_PLACES,
        RoundingStrategy::MidpointAwayFromZero,
    );
    let ceiling = if rounded < crypto {
        crypto.round_dp_with_strategy(CEILING_DECIMAL_PLACES, RoundingStrategy::AwayFromZero)
    } else {
        rounded
    };

    let units = to_base_units(ceiling, decimals)?;
    if units.is_zero() {
        return Err(ConversionError::NonPositiveAmount);
    }
    Ok(SpendCeiling(units))
}

/// Expands a positive decimal amount to base units of a currency with `decimals` places.
///
/// Amounts more precise than the currency are rounded up.
fn to_base_units(amount: Decimal, decimals: u8) -> Result<U256, ConversionError> {
    let decimals = u32::from(decimals);
    let amount = if amount.scale() > decimals {
        amount.round_dp_with_strategy(decimals, RoundingStrategy::AwayFromZero)
    } else {
        amount
    };
    let mantissa =
        u128::try_from(amount.mantissa()).map_err(|_| ConversionError::NonPositiveAmount)?;
    let exponent = decimals.saturating_sub(amount.scale());
    U256::from(10u8)
        .checked_pow(U256::from(exponent))
        .and_then(|scale| U256::from(mantissa).checked_mul(scale))
        .ok_or(ConversionError::Overflow)
}

/// Parses an amount given as a decimal string, also accepting scientific notation.
///
/// # Errors
///
/// Returns [`ConversionError::InvalidAmount`] if `value` is not a number.
pub fn parse_decimal(value: &str) -> Result<Decimal, ConversionError> {
    let trimmed = value.trim();
    trimmed
        .parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| ConversionError::InvalidAmount {
            value: value.to_owned(),
        })
}
