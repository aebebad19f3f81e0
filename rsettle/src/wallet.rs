//! The wallet capability consumed by the pipeline.
//!
//! Modelled on EIP-1193: a single `request({ method, params })` entry point
//! plus the wallet's currently selected chain. The pipeline only reads the
//! session (chain id, accounts) and asks for network changes; signing and
//! broadcasting happen behind the [`PaymentExecutor`](crate::executor::PaymentExecutor).

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::networks::ChainId;

/// EIP-1193 method names used by the pipeline.
pub mod methods {
    /// Lists the accounts the wallet exposes.
    pub const ETH_ACCOUNTS: &str = "eth_accounts";
    /// Reads the active chain id.
    pub const ETH_CHAIN_ID: &str = "eth_chainId";
    /// Asks the wallet to switch to a known chain (EIP-3326).
    pub const WALLET_SWITCH_ETHEREUM_CHAIN: &str = "wallet_switchEthereumChain";
    /// Asks the wallet to add a chain (EIP-3085).
    pub const WALLET_ADD_ETHEREUM_CHAIN: &str = "wallet_addEthereumChain";
}

/// Error code returned by `wallet_switchEthereumChain` when the wallet does not know the chain.
pub const CHAIN_NOT_ADDED: i64 = 4902;

/// Error code returned when the user rejects a wallet prompt (EIP-1193).
pub const USER_REJECTED: i64 = 4001;

/// A single EIP-1193 request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletRequest {
    /// JSON-RPC method name.
    pub method: Cow<'static, str>,
    /// Positional parameters.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Value>,
}

impl WalletRequest {
    /// Creates a request without parameters.
    pub fn new(method: impl Into<Cow<'static, str>>) -> Self {
        Self {
            method: method.into(),
            params: Vec::new(),
        }
    }

    /// Appends a positional parameter.
    #[must_use]
    pub fn with_param(mut self, param: Value) -> Self {
        self.params.push(param);
        self
    }
}

/// Error surfaced by the wallet, shaped like EIP-1193 `ProviderRpcError`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletError {
    /// Numeric error code, when the wallet supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    /// Human-readable message.
    pub message: String,
    /// Extra data attached by the wallet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "Wallet error {code}: {}", self.message),
            None => write!(f, "Wallet error: {}", self.message),
        }
    }
}

impl std::error::Error for WalletError {}

impl WalletError {
    /// Creates an error without a code.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            data: None,
        }
    }

    /// Creates an error with a numeric code.
    pub fn with_code(code: i64, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
            data: None,
        }
    }

    /// Returns `true` if the wallet reported an unknown chain.
    #[must_use]
    pub const fn is_chain_not_added(&self) -> bool {
        matches!(self.code, Some(CHAIN_NOT_ADDED))
    }

    /// Returns `true` if the user rejected the prompt.
    #[must_use]
    pub const fn is_user_rejected(&self) -> bool {
        matches!(self.code, Some(USER_REJECTED))
    }
}

/// A connected wallet session.
///
/// The session is owned by the wallet: callers must not assume the chain id
/// stays the same between two calls.
pub trait Wallet: Send + Sync {
    /// Returns the chain the wallet is currently connected to.
    ///
    /// This is a read of the session state, not a prompt.
    fn chain_id(&self) -> impl Future<Output = Result<ChainId, WalletError>> + Send;

    /// Sends an EIP-1193 request to the wallet.
    fn request(
        &self,
        request: WalletRequest,
    ) -> impl Future<Output = Result<Value, WalletError>> + Send;

    /// Returns the accounts exposed by the wallet, first one being the active account.
    fn accounts(&self) -> impl Future<Output = Result<Vec<Address>, WalletError>> + Send {
        async move {
            let value = self
                .request(WalletRequest::new(methods::ETH_ACCOUNTS))
                .await?;
            serde_json::from_value(value)
                .map_err(|e| WalletError::new(format!("malformed eth_accounts response: {e}")))
        }
    }
}

impl<T: Wallet> Wallet for Arc<T> {
    fn chain_id(&self) -> impl Future<Output = Result<ChainId, WalletError>> + Send {
        (**self).chain_id()
    }

    fn request(
        &self,
        request: WalletRequest,
    ) -> impl Future<Output = Result<Value, WalletError>> + Send {
        (**self).request(request)
    }

    fn accounts(&self) -> impl Future<Output = Result<Vec<Address>, WalletError>> + Send {
        (**self).accounts()
    }
}
