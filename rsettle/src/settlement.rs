//! End-to-end settlement of one request.
//!
//! [`SettlementOrchestrator::settle`] runs these steps in order; the first
//! failure ends the attempt and is returned tagged with its
//! [`SettlementStep`]:
//!
//! 1. resolve the payer from the wallet's accounts
//! 2. classify the payment network and extract its parameters
//! 3. resolve the payment currency and check it fits the request
//! 4. move the wallet onto the currency's network
//! 5. for conversion payments, quote a spend ceiling
//! 6. check the payer's solvency
//! 7. for token payments, ensure the proxy's allowance
//! 8. re-verify the network and submit the payment
//! 9. wait for confirmation and return the transaction hash

use alloy_primitives::{Address, TxHash, U256};
use tokio::sync::Mutex;

use crate::allowance::{AllowanceContext, AllowanceManager};
use crate::config::SettlementConfig;
use crate::conversion::ConversionQuote;
use crate::currency::{CurrencyInfo, CurrencyKind, CurrencyRegistry};
use crate::error::{
    ClassificationError, ConversionError, ExecutionError, SettlementError, SettlementErrorKind,
    SettlementStep, at,
};
use crate::executor::{ConversionSettings, PaymentExecutor, PendingTransaction};
use crate::gateway::NetworkGateway;
use crate::oracle::RateOracle;
use crate::payment_network::{
    PaymentNetworkVariant, VariantParameters, classify, extract_parameters,
};
use crate::request::Request;
use crate::wallet::Wallet;

/// Composes the gateway, the collaborators and the executor into the
/// "pay this request" operation.
///
/// Attempts on one orchestrator are serialized: a second `settle` call waits
/// until the first has finished, so two state-changing wallet operations are
/// never in flight at the same time.
#[derive(Debug)]
pub struct SettlementOrchestrator<O, C, E> {
    gateway: NetworkGateway,
    oracle: O,
    registry: C,
    executor: E,
    config: SettlementConfig,
    session: Mutex<()>,
}

/// What the payment will spend, decided before any state-changing call.
struct PaymentPlan {
    network: String,
    currency: CurrencyInfo,
    required: U256,
    settings: Option<ConversionSettings>,
}

impl<O, C, E> SettlementOrchestrator<O, C, E>
where
    O: RateOracle,
    C: CurrencyRegistry,
    E: PaymentExecutor,
{
    /// Creates an orchestrator with the default [`SettlementConfig`].
    pub fn new(gateway: NetworkGateway, oracle: O, registry: C, executor: E) -> Self {
        Self {
            gateway,
            oracle,
            registry,
            executor,
            config: SettlementConfig::default(),
            session: Mutex::new(()),
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: SettlementConfig) -> Self {
        self.config = config;
        self
    }

    /// The network gateway.
    pub const fn gateway(&self) -> &NetworkGateway {
        &self.gateway
    }

    /// The active configuration.
    pub const fn config(&self) -> &SettlementConfig {
        &self.config
    }

    /// Pays `request` from `wallet`'s first account with `payment_currency`,
    /// a currency identifier or token address known to the registry.
    ///
    /// # Errors
    ///
    /// Returns a [`SettlementError`] naming the step that failed and carrying
    /// the originating error.
    #[cfg_attr(
        feature = "telemetry",
        tracing::instrument(
            name = "rsettle.settle",
            skip_all,
            err,
            fields(request_id = %request.request_id, payment_currency = %payment_currency)
        )
    )]
    pub async fn settle<W: Wallet>(
        &self,
        request: &Request,
        wallet: &W,
        payment_currency: &str,
    ) -> Result<TxHash, SettlementError> {
        let _session = self.session.lock().await;

        let payer = self.resolve_payer(wallet).await?;

        let variant = classify(request).map_err(at(SettlementStep::Classify))?;
        if let PaymentNetworkVariant::Unsupported(id) = &variant {
            return Err(SettlementError::new(
                SettlementStep::Classify,
                ClassificationError::UnsupportedPaymentNetwork { id: id.clone() },
            ));
        }
        let params = extract_parameters(request, &variant).map_err(at(SettlementStep::Classify))?;

        let (currency, network) = self
            .resolve_currency(request, &variant, &params, payment_currency)
            .await
            .map_err(at(SettlementStep::ResolveCurrency))?;

        self.gateway
            .ensure_network(&network, wallet)
            .await
            .map_err(at(SettlementStep::EnsureNetwork))?;

        let plan = self
            .plan(request, &variant, &params, currency, network)
            .await
            .map_err(at(SettlementStep::Quote))?;

        self.check_solvency(request, payer, &plan)
            .await
            .map_err(at(SettlementStep::Solvency))?;

        if variant.is_erc20() {
            let ctx = AllowanceContext {
                request,
                variant: &variant,
                payer,
                network: &plan.network,
                required: plan.required,
                settings: plan.settings.as_ref(),
            };
            AllowanceManager::new(&self.executor, &self.gateway, self.config.confirmations)
                .ensure_allowance(&ctx, wallet)
                .await
                .map_err(at(SettlementStep::Allowance))?;
        }

        self.gateway
            .ensure_network(&plan.network, wallet)
            .await
            .map_err(at(SettlementStep::Submit))?;
        let pending = self
            .executor
            .pay_request(request, payer, plan.settings.as_ref())
            .await
            .map_err(|e| ExecutionError::Submission {
                source: Box::new(e),
            })
            .map_err(at(SettlementStep::Submit))?;
        let tx_hash = pending.tx_hash();

        #[cfg(feature = "telemetry")]
        tracing::info!(%tx_hash, "Payment submitted, awaiting confirmation");

        let receipt = pending
            .wait(self.config.confirmations)
            .await
            .map_err(|e| ExecutionError::Confirmation {
                tx_hash,
                source: Box::new(e),
            })
            .map_err(at(SettlementStep::Confirm))?;
        if !receipt.status {
            return Err(SettlementError::new(
                SettlementStep::Confirm,
                ExecutionError::TransactionReverted { tx_hash },
            ));
        }

        #[cfg(feature = "telemetry")]
        tracing::info!(tx_hash = %receipt.transaction_hash, block = ?receipt.block_number, "Request settled");

        Ok(receipt.transaction_hash)
    }

    async fn resolve_payer<W: Wallet>(&self, wallet: &W) -> Result<Address, SettlementError> {
        let no_address = |source| {
            SettlementError::new(
                SettlementStep::ResolveWallet,
                SettlementErrorKind::NoWalletAddress { source },
            )
        };
        let accounts = wallet.accounts().await.map_err(|e| no_address(Some(e)))?;
        accounts.into_iter().next().ok_or_else(|| no_address(None))
    }

    /// Looks up the payment currency and checks it can pay this request.
    async fn resolve_currency(
        &self,
        request: &Request,
        variant: &PaymentNetworkVariant,
        params: &VariantParameters,
        payment_currency: &str,
    ) -> Result<(CurrencyInfo, String), ConversionError> {
        let currency = self
            .registry
            .currency(payment_currency)
            .await
            .map_err(|e| ConversionError::CurrencyResolution {
                currency: payment_currency.to_owned(),
                reason: "registry lookup failed".to_owned(),
                source: Some(Box::new(e)),
            })?
            .ok_or_else(|| ConversionError::currency(payment_currency, "unknown currency"))?;

        let network = currency
            .network
            .clone()
            .ok_or_else(|| ConversionError::currency(payment_currency, "currency has no network"))?;

        let expected_kind = if variant.is_native() {
            CurrencyKind::Native
        } else {
            CurrencyKind::Erc20
        };
        if currency.kind != expected_kind {
            return Err(ConversionError::currency(
                payment_currency,
                format!("{variant} cannot be paid in a {:?} currency", currency.kind),
            ));
        }

        if let VariantParameters::AnyToErc20Proxy(conversion) = params {
            if !network.eq_ignore_ascii_case(&conversion.network) {
                return Err(ConversionError::currency(
                    payment_currency,
                    format!(
                        "currency is on {network}, request must be paid on {}",
                        conversion.network
                    ),
                ));
            }
            let accepted = currency
                .token_address()
                .is_some_and(|token| conversion.accepts(token));
            if !accepted {
                return Err(ConversionError::currency(
                    payment_currency,
                    "token is not accepted by the payee",
                ));
            }
        } else {
            let (matches, required) = match &request.currency_info {
                Some(invoice) => (
                    currency.matches_value(&invoice.value)
                        && invoice
                            .network
                            .as_deref()
                            .is_none_or(|pinned| pinned.eq_ignore_ascii_case(&network)),
                    invoice.value.as_str(),
                ),
                None if !request.currency.is_empty() => (
                    currency.id.eq_ignore_ascii_case(&request.currency),
                    request.currency.as_str(),
                ),
                None => {
                    return Err(ConversionError::currency(
                        payment_currency,
                        "request does not name the currency it must be paid in",
                    ));
                }
            };
            if !matches {
                return Err(ConversionError::currency(
                    payment_currency,
                    format!("request must be paid in {required}"),
                ));
            }
        }

        Ok((currency, network))
    }

    /// Decides the amount the payment needs, quoting a rate for conversions.
    async fn plan(
        &self,
        request: &Request,
        variant: &PaymentNetworkVariant,
        params: &VariantParameters,
        currency: CurrencyInfo,
        network: String,
    ) -> Result<PaymentPlan, ConversionError> {
        let VariantParameters::AnyToErc20Proxy(conversion) = params else {
            let required = request
                .expected_amount_units()?
                .checked_add(params.fee_units())
                .ok_or(ConversionError::Overflow)?;
            return Ok(PaymentPlan {
                network,
                currency,
                required,
                settings: None,
            });
        };
        debug_assert!(variant.requires_conversion());

        let from = self.config.oracle_symbol(&request.currency);
        let to = currency.exchange_symbol();
        let rate = self
            .oracle
            .rate(from, to)
            .await
            .map_err(|e| ConversionError::RateUnavailable {
                reason: format!("{from}/{to} lookup failed"),
                source: Some(Box::new(e)),
            })?
            .ok_or_else(|| ConversionError::rate_unavailable(format!("no {from}/{to} rate")))?;

        let quote = ConversionQuote::new(rate, currency.decimals, self.config.slippage_percent);
        let ceiling = quote.spend_ceiling(request.expected_amount()?, conversion.fee_amount)?;

        #[cfg(feature = "telemetry")]
        tracing::info!(%from, %to, %rate, %ceiling, "Spend ceiling computed");

        Ok(PaymentPlan {
            network,
            required: ceiling.amount(),
            settings: Some(ConversionSettings {
                currency: currency.clone(),
                max_to_spend: ceiling,
            }),
            currency,
        })
    }

    async fn check_solvency(
        &self,
        request: &Request,
        payer: Address,
        plan: &PaymentPlan,
    ) -> Result<(), ExecutionError> {
        let (operation, solvent) = match &plan.settings {
            Some(settings) => (
                "is_solvent",
                self.executor
                    .is_solvent(payer, &settings.currency, plan.required)
                    .await,
            ),
            None => (
                "has_sufficient_funds",
                self.executor.has_sufficient_funds(request, payer).await,
            ),
        };
        let solvent = solvent.map_err(|e| ExecutionError::Query {
            operation,
            source: Box::new(e),
        })?;
        if !solvent {
            #[cfg(feature = "telemetry")]
            tracing::warn!(%payer, currency = %plan.currency.id, required = %plan.required, "Payer is not solvent");
            return Err(ExecutionError::InsufficientFunds { payer });
        }
        Ok(())
    }
}
