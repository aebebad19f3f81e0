//! Default endpoints of the collaborator services.

/// Default base URL of the currency registry API.
pub const DEFAULT_CURRENCY_API_URL: &str = "https://api.request.network/";

/// Base URL of the CryptoCompare price API.
pub const CRYPTOCOMPARE_API_URL: &str = "https://min-api.cryptocompare.com/data/";
