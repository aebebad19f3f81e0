//! JSON-over-HTTP plumbing shared by the clients.

use std::fmt::Display;
use std::time::Duration;

use http::{HeaderMap, StatusCode};
use reqwest::Client;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::HttpClientError;

/// A `reqwest` client plus the headers and timeout applied to every request.
#[derive(Clone, Debug, Default)]
pub(crate) struct Transport {
    client: Client,
    headers: HeaderMap,
    timeout: Option<Duration>,
}

impl Transport {
    pub(crate) const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub(crate) const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub(crate) fn set_headers(&mut self, headers: HeaderMap) {
        self.headers = headers;
    }

    pub(crate) fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }

    /// Sends `GET url?query` and decodes a `200` JSON body.
    ///
    /// With `allow_missing`, a `404` yields `Ok(None)` instead of an error.
    pub(crate) async fn get_json<R>(
        &self,
        url: &Url,
        query: &[(&str, &str)],
        context: &'static str,
        allow_missing: bool,
    ) -> Result<Option<R>, HttpClientError>
    where
        R: DeserializeOwned,
    {
        let mut url = url.clone();
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        let mut req = self.client.get(url);
        for (key, value) in &self.headers {
            req = req.header(key, value);
        }
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        let http_response = req
            .send()
            .await
            .map_err(|e| HttpClientError::Http { context, source: e })?;

        let status = http_response.status();
        let result = if status == StatusCode::OK {
            http_response
                .json::<R>()
                .await
                .map(Some)
                .map_err(|e| HttpClientError::JsonDeserialization { context, source: e })
        } else if status == StatusCode::NOT_FOUND && allow_missing {
            Ok(None)
        } else {
            let body = http_response
                .text()
                .await
                .map_err(|e| HttpClientError::ResponseBodyRead { context, source: e })?;
            Err(HttpClientError::HttpStatus {
                context,
                status,
                body,
            })
        };

        record_result_on_span(&result);

        result
    }
}

/// Joins `path` onto `base`, mapping failures to [`HttpClientError::UrlParse`].
pub(crate) fn join(base: &Url, path: &str, context: &'static str) -> Result<Url, HttpClientError> {
    base.join(path)
        .map_err(|e| HttpClientError::UrlParse { context, source: e })
}

/// Parses a base URL, normalizing it to end with a single slash.
pub(crate) fn parse_base_url(value: &str) -> Result<Url, HttpClientError> {
    let mut normalized = value.trim_end_matches('/').to_owned();
    normalized.push('/');
    Url::parse(&normalized).map_err(|e| HttpClientError::UrlParse {
        context: "Failed to parse base url",
        source: e,
    })
}

/// Records the outcome of a request on the current tracing span.
#[cfg(feature = "telemetry")]
fn record_result_on_span<R, E: Display>(result: &Result<R, E>) {
    let span = tracing::Span::current();
    match result {
        Ok(_) => {
            span.record("otel.status_code", "OK");
        }
        Err(err) => {
            span.record("otel.status_code", "ERROR");
            span.record("error.message", tracing::field::display(err));
            tracing::event!(tracing::Level::ERROR, error = %err, "HTTP collaborator request failed");
        }
    }
}

/// Noop if telemetry feature is off.
#[cfg(not(feature = "telemetry"))]
fn record_result_on_span<R, E: Display>(_result: &Result<R, E>) {}
