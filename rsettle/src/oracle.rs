//! Reference rate lookup.

use std::future::Future;
use std::sync::Arc;

use rust_decimal::Decimal;

/// Source of fiat to crypto reference rates.
pub trait RateOracle: Send + Sync {
    /// Error type for lookup failures.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns how many units of `to` one unit of `from` is worth, or
    /// `Ok(None)` if the oracle has no rate for the pair.
    fn rate(
        &self,
        from: &str,
        to: &str,
    ) -> impl Future<Output = Result<Option<Decimal>, Self::Error>> + Send;
}

impl<T: RateOracle> RateOracle for Arc<T> {
    type Error = T::Error;

    fn rate(
        &self,
        from: &str,
        to: &str,
    ) -> impl Future<Output = Result<Option<Decimal>, Self::Error>> + Send {
        (**self).rate(from, to)
    }
}
