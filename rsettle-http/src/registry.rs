//! A [`CurrencyRegistry`] over the currency API.
//!
//! `GET <base>/currency` lists known currencies; `GET <base>/currency/<id>`
//! resolves one identifier or token address. Only native and ERC20 records are
//! surfaced: fiat and other record types are skipped when listing and rejected
//! when looked up directly.

use std::time::Duration;

use http::HeaderMap;
use rsettle::currency::{CurrencyInfo, CurrencyRegistry};
use url::Url;

use crate::constants::DEFAULT_CURRENCY_API_URL;
use crate::error::HttpClientError;
use crate::transport::{Transport, join, parse_base_url};
use crate::types::{CurrencyRecord, CurrencyRecordError};

/// Client for the currency registry API.
#[derive(Clone, Debug)]
pub struct CurrencyRegistryClient {
    base_url: Url,
    currency_url: Url,
    transport: Transport,
}

impl CurrencyRegistryClient {
    /// Constructs a client rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`HttpClientError::UrlParse`] if URL construction fails.
    pub fn try_new(base_url: Url) -> Result<Self, HttpClientError> {
        let currency_url = join(&base_url, "./currency", "Failed to construct ./currency URL")?;
        Ok(Self {
            base_url,
            currency_url,
            transport: Transport::default(),
        })
    }

    /// Constructs a client for the public currency API.
    ///
    /// # Errors
    ///
    /// Returns [`HttpClientError::UrlParse`] if URL construction fails.
    pub fn public() -> Result<Self, HttpClientError> {
        Self::try_new(parse_base_url(DEFAULT_CURRENCY_API_URL)?)
    }

    /// Attaches custom headers to all future requests.
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

    /// Returns the computed `./currency` URL.
    pub const fn currency_url(&self) -> &Url {
        &self.currency_url
    }

    /// Sends `GET /currency/<id>`. A `404` yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`HttpClientError`] if the request fails.
    #[cfg_attr(
        feature = "telemetry",
        tracing::instrument(name = "rsettle.currency_registry.record", skip_all, err, fields(id = %id))
    )]
    pub async fn record(&self, id: &str) -> Result<Option<CurrencyRecord>, HttpClientError> {
        let mut record_url = self.currency_url.clone();
        record_url
            .path_segments_mut()
            .map_err(|()| HttpClientError::UrlParse {
                context: "Failed to construct ./currency/<id> URL",
                source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
            })?
            .push(id);
        self.transport
            .get_json(&record_url, &[], "GET /currency/<id>", true)
            .await
    }

    /// Sends `GET /currency`.
    ///
    /// # Errors
    ///
    /// Returns [`HttpClientError`] if the request fails.
    #[cfg_attr(
        feature = "telemetry",
        tracing::instrument(name = "rsettle.currency_registry.records", skip_all, err)
    )]
    pub async fn records(&self) -> Result<Vec<CurrencyRecord>, HttpClientError> {
        let records = self
            .transport
            .get_json(&self.currency_url, &[], "GET /currency", false)
            .await?;
        Ok(records.unwrap_or_default())
    }
}

impl CurrencyRegistry for CurrencyRegistryClient {
    type Error = HttpClientError;

    async fn currency(&self, id: &str) -> Result<Option<CurrencyInfo>, HttpClientError> {
        let Some(record) = self.record(id).await? else {
            return Ok(None);
        };
        CurrencyInfo::try_from(record)
            .map(Some)
            .map_err(|e| HttpClientError::UnexpectedPayload {
                context: "GET /currency/<id>",
                reason: e.to_string(),
            })
    }

    async fn currencies(&self) -> Result<Vec<CurrencyInfo>, HttpClientError> {
        let records = self.records().await?;
        let mut currencies = Vec::with_capacity(records.len());
        for record in records {
            match CurrencyInfo::try_from(record) {
                Ok(info) => currencies.push(info),
                Err(CurrencyRecordError::UnsupportedType { .. }) => {}
                Err(e) => {
                    #[cfg(feature = "telemetry")]
                    tracing::warn!(error = %e, "Skipping malformed currency record");
                    #[cfg(not(feature = "telemetry"))]
                    let _ = e;
                }
            }
        }
        Ok(currencies)
    }
}

impl TryFrom<&str> for CurrencyRegistryClient {
    type Error = HttpClientError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_new(parse_base_url(value)?)
    }
}

impl TryFrom<String> for CurrencyRegistryClient {
    type Error = HttpClientError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}
