//! A [`RateOracle`] over a JSON price endpoint.
//!
//! The endpoint answers `GET <price_url>?<from_key>=EUR&<to_key>=ETH` with an
//! object keyed by target symbol, e.g. `{"ETH": 0.02}`. By default the keys are
//! `from` and `to`; [`RateOracleClient::cryptocompare`] targets the
//! CryptoCompare API, which names them `fsym` and `tsyms`.

use std::time::Duration;

use http::HeaderMap;
use rsettle::conversion::parse_decimal;
use rsettle::oracle::RateOracle;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use url::Url;

use crate::constants::CRYPTOCOMPARE_API_URL;
use crate::error::HttpClientError;
use crate::transport::{Transport, join, parse_base_url};

/// Fetches reference rates from a remote price endpoint.
#[derive(Clone, Debug)]
pub struct RateOracleClient {
    base_url: Url,
    price_url: Url,
    from_key: &'static str,
    to_key: &'static str,
    transport: Transport,
}

impl RateOracleClient {
    /// Constructs a client for `<base_url>/price?from=..&to=..`.
    ///
    /// # Errors
    ///
    /// Returns [`HttpClientError::UrlParse`] if URL construction fails.
    pub fn try_new(base_url: Url) -> Result<Self, HttpClientError> {
        let price_url = join(&base_url, "./price", "Failed to construct ./price URL")?;
        Ok(Self {
            base_url,
            price_url,
            from_key: "from",
            to_key: "to",
            transport: Transport::default(),
        })
    }

    /// Constructs a client for the public CryptoCompare API.
    ///
    /// # Errors
    ///
    /// Returns [`HttpClientError::UrlParse`] if URL construction fails.
    pub fn cryptocompare() -> Result<Self, HttpClientError> {
        Ok(Self::try_new(parse_base_url(CRYPTOCOMPARE_API_URL)?)?.with_query_keys("fsym", "tsyms"))
    }

    /// Renames the query parameters carrying the source and target symbols.
    #[must_use]
    pub const fn with_query_keys(mut self, from_key: &'static str, to_key: &'static str) -> Self {
        self.from_key = from_key;
        self.to_key = to_key;
        self
    }

    /// Attaches custom headers (e.g. an API key) to all future requests.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.transport.set_headers(headers);
        self
    }

    /// Sets a timeout for all future requests.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.transport.set_timeout(timeout);
        self
    }

    /// Returns the base URL used by this client.
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the computed `./price` URL.
    pub const fn price_url(&self) -> &Url {
        &self.price_url
    }

    /// Returns any custom headers configured on the client.
    pub const fn headers(&self) -> &HeaderMap {
        self.transport.headers()
    }

    /// Returns the configured timeout, if any.
    pub const fn timeout(&self) -> Option<Duration> {
        self.transport.timeout()
    }

    /// Sends `GET /price` and reads the rate for `to`.
    ///
    /// # Errors
    ///
    /// Returns [`HttpClientError`] if the request fails or the rate is not a number.
    #[cfg_attr(
        feature = "telemetry",
        tracing::instrument(name = "rsettle.rate_oracle.price", skip_all, err, fields(from = %from, to = %to))
    )]
    pub async fn price(&self, from: &str, to: &str) -> Result<Option<Decimal>, HttpClientError> {
        let context = "GET /price";
        let body: Map<String, Value> = self
            .transport
            .get_json(
                &self.price_url,
                &[(self.from_key, from), (self.to_key, to)],
                context,
                false,
            )
            .await?
            .unwrap_or_default();

        let value = body.get(to).or_else(|| {
            body.iter()
                .find(|(symbol, _)| symbol.eq_ignore_ascii_case(to))
                .map(|(_, value)| value)
        });
        let Some(value) = value else {
            return Ok(None);
        };
        let parsed = match value {
            Value::Number(n) => parse_decimal(&n.to_string()).ok(),
            Value::String(s) => parse_decimal(s).ok(),
            _ => None,
        };
        parsed
            .map(Some)
            .ok_or_else(|| HttpClientError::UnexpectedPayload {
                context,
                reason: format!("rate for {to} is not a number: {value}"),
            })
    }
}

impl RateOracle for RateOracleClient {
    type Error = HttpClientError;

    async fn rate(&self, from: &str, to: &str) -> Result<Option<Decimal>, HttpClientError> {
        self.price(from, to).await
    }
}

impl TryFrom<&str> for RateOracleClient {
    type Error = HttpClientError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_new(parse_base_url(value)?)
    }
}

impl TryFrom<String> for RateOracleClient {
    type Error = HttpClientError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}
