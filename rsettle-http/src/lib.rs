//! HTTP collaborators for the rsettle payment pipeline.
//!
//! Provides the wire types of the currency registry API and (feature-gated)
//! clients implementing [`rsettle::oracle::RateOracle`] and
//! [`rsettle::currency::CurrencyRegistry`] over JSON endpoints.
//!
//! # Modules
//!
//! - [`constants`] - Default service URLs
//! - [`types`] - Currency registry wire types
//! - [`error`] - HTTP client error types (feature: `client`)
//! - [`oracle`] - Price endpoint client (feature: `client`)
//! - [`registry`] - Currency registry client (feature: `client`)
//!
//! # Feature Flags
//!
//! - `client` - reqwest-based clients (enabled by default)
//! - `telemetry` - tracing spans on outbound requests

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod constants;
pub mod types;

#[cfg(feature = "client")]
pub mod error;
#[cfg(feature = "client")]
pub mod oracle;
#[cfg(feature = "client")]
pub mod registry;
#[cfg(feature = "client")]
mod transport;

#[cfg(feature = "client")]
pub use error::HttpClientError;
#[cfg(feature = "client")]
pub use oracle::RateOracleClient;
#[cfg(feature = "client")]
pub use registry::CurrencyRegistryClient;
