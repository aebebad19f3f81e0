//! Moves a wallet onto the network a payment needs.
//!
//! The switch protocol is two-step: ask the wallet to switch, and only when it
//! answers with [`CHAIN_NOT_ADDED`](crate::wallet::CHAIN_NOT_ADDED) ask it to
//! add the chain. Error-code inspection stays inside this module.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use url::Url;

use crate::error::NetworkError;
use crate::networks::{ChainId, NativeCurrency, NetworkInfo, NetworkRegistry};
use crate::wallet::{Wallet, WalletRequest, methods};

/// `wallet_addEthereumChain` parameter object (EIP-3085).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddEthereumChainParameter<'a> {
    chain_id: ChainId,
    chain_name: &'a str,
    rpc_urls: [&'a Url; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    native_currency: Option<&'a NativeCurrency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    block_explorer_urls: Option<[&'a Url; 1]>,
}

/// Ensures a wallet is connected to a registered network.
#[derive(Debug, Clone)]
pub struct NetworkGateway {
    registry: Arc<NetworkRegistry>,
}

impl NetworkGateway {
    /// Creates a gateway over the given registry.
    #[must_use]
    pub fn new(registry: NetworkRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Returns the registry this gateway consults.
    #[must_use]
    pub fn registry(&self) -> &NetworkRegistry {
        &self.registry
    }

    /// Looks up a network identifier.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::UnsupportedNetwork`] if the identifier is not registered.
    pub fn resolve(&self, network: &str) -> Result<&NetworkInfo, NetworkError> {
        self.registry
            .get(network)
            .ok_or_else(|| NetworkError::UnsupportedNetwork {
                network: network.to_owned(),
            })
    }

    /// Makes sure `wallet` is on `network`, prompting a switch if needed.
    ///
    /// Does not send any request when the wallet is already on the target
    /// chain. Otherwise sends `wallet_switchEthereumChain`, and if the wallet
    /// reports the chain as unknown, a single `wallet_addEthereumChain`.
    ///
    /// # Errors
    ///
    /// - [`NetworkError::UnsupportedNetwork`] for an unregistered identifier
    /// - [`NetworkError::ChainRead`] if the active chain cannot be read
    /// - [`NetworkError::ManualInstallRequired`] if adding the chain failed
    /// - [`NetworkError::NetworkSwitch`] for any other switch failure
    #[cfg_attr(
        feature = "telemetry",
        tracing::instrument(name = "rsettle.gateway.ensure_network", skip(self, wallet), err)
    )]
    pub async fn ensure_network<W: Wallet>(
        &self,
        network: &str,
        wallet: &W,
    ) -> Result<ChainId, NetworkError> {
        let info = self.resolve(network)?;
        let target = info.chain_id;

        let current = wallet
            .chain_id()
            .await
            .map_err(|source| NetworkError::ChainRead { source })?;
        if current == target {
            return Ok(target);
        }

        #[cfg(feature = "telemetry")]
        tracing::info!(%current, %target, network, "Requesting wallet network switch");

        let switch = WalletRequest::new(methods::WALLET_SWITCH_ETHEREUM_CHAIN)
            .with_param(json!({ "chainId": target }));
        match wallet.request(switch).await {
            Ok(_) => Ok(target),
            Err(error) if error.is_chain_not_added() => {
                #[cfg(feature = "telemetry")]
                tracing::info!(%target, network, "Chain unknown to wallet, requesting add");

                wallet
                    .request(add_chain_request(network, info))
                    .await
                    .map_err(|source| NetworkError::ManualInstallRequired {
                        network: network.to_owned(),
                        source,
                    })?;
                Ok(target)
            }
            Err(source) => Err(NetworkError::NetworkSwitch {
                network: network.to_owned(),
                source,
            }),
        }
    }
}

fn add_chain_request(network: &str, info: &NetworkInfo) -> WalletRequest {
    let parameter = AddEthereumChainParameter {
        chain_id: info.chain_id,
        chain_name: info.chain_name.as_deref().unwrap_or(network),
        rpc_urls: [&info.rpc_url],
        native_currency: info.native_currency.as_ref(),
        block_explorer_urls: info.block_explorer_url.as_ref().map(|url| [url]),
    };
    WalletRequest::new(methods::WALLET_ADD_ETHEREUM_CHAIN).with_param(json!(parameter))
}
