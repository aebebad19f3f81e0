//! EIP-1193 wallet backed by an alloy [`Provider`].
//!
//! Requests are forwarded verbatim as JSON-RPC calls. JSON-RPC error
//! responses keep their numeric `code`, so wallet-level signals such as
//! `4902` (unknown chain) reach the gateway unchanged.

use alloy_json_rpc::ErrorPayload;
use alloy_provider::Provider;
use alloy_transport::TransportError;
use rsettle::networks::ChainId;
use rsettle::wallet::{Wallet, WalletError, WalletRequest};
use serde_json::Value;

/// A [`Wallet`] speaking JSON-RPC through an alloy provider.
///
/// Works with any provider whose backend understands the wallet methods
/// (`wallet_switchEthereumChain`, `wallet_addEthereumChain`), e.g. a node
/// exposed by a browser-extension bridge or a local development wallet.
#[derive(Debug, Clone)]
pub struct RpcWallet<P> {
    provider: P,
}

impl<P> RpcWallet<P> {
    /// Wraps `provider`.
    pub const fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Returns the wrapped provider.
    pub const fn provider(&self) -> &P {
        &self.provider
    }

    /// Unwraps the provider.
    pub fn into_inner(self) -> P {
        self.provider
    }
}

impl<P: Provider> Wallet for RpcWallet<P> {
    async fn chain_id(&self) -> Result<ChainId, WalletError> {
        self.provider
            .get_chain_id()
            .await
            .map(ChainId::new)
            .map_err(wallet_error)
    }

    #[cfg_attr(
        feature = "telemetry",
        tracing::instrument(name = "rsettle.rpc_wallet.request", skip_all, err, fields(method = %request.method))
    )]
    async fn request(&self, request: WalletRequest) -> Result<Value, WalletError> {
        let WalletRequest { method, params } = request;
        self.provider
            .raw_request::<_, Value>(method, params)
            .await
            .map_err(wallet_error)
    }
}

/// Maps a transport failure onto the EIP-1193 error shape.
///
/// JSON-RPC error responses keep `code`, `message` and `data`; anything else
/// (connection failures, malformed responses) becomes a code-less error.
#[must_use]
pub fn wallet_error(err: TransportError) -> WalletError {
    err.as_error_resp()
        .map_or_else(|| WalletError::new(err.to_string()), from_payload)
}

fn from_payload(payload: &ErrorPayload) -> WalletError {
    WalletError {
        code: Some(payload.code),
        message: payload.message.to_string(),
        data: payload
            .data
            .as_ref()
            .and_then(|raw| serde_json::from_str(raw.get()).ok()),
    }
}
