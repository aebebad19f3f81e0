//! The payment-execution capability.
//!
//! Everything that builds, signs or broadcasts a transaction lives behind
//! [`PaymentExecutor`]. The pipeline decides *when* each operation runs and
//! interprets the results; it never encodes contract calls itself.

use std::future::Future;
use std::sync::Arc;

use alloy_primitives::{Address, TxHash, U256};

use crate::conversion::SpendCeiling;
use crate::currency::CurrencyInfo;
use crate::payment_network::PaymentNetworkVariant;
use crate::request::Request;

/// Payment settings for conversion payments: which token pays the invoice and
/// how much of it the payer authorizes at most.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionSettings {
    /// The token used to pay.
    pub currency: CurrencyInfo,
    /// Upper bound on the amount spent, in the token's base units.
    pub max_to_spend: SpendCeiling,
}

/// Size of an ERC20 approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalAmount {
    /// Approve exactly this many base units.
    Exact(U256),
    /// Approve the maximum amount, as conversion proxies expect.
    Unlimited,
}

impl ApprovalAmount {
    /// Picks the approval size a variant needs to pay `required`.
    #[must_use]
    pub const fn for_variant(variant: &PaymentNetworkVariant, required: U256) -> Self {
        match variant {
            PaymentNetworkVariant::AnyToErc20Proxy => Self::Unlimited,
            _ => Self::Exact(required),
        }
    }

    /// The approved amount in base units.
    #[must_use]
    pub const fn amount(self) -> U256 {
        match self {
            Self::Exact(amount) => amount,
            Self::Unlimited => U256::MAX,
        }
    }
}

/// Outcome of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionReceipt {
    /// Hash of the transaction.
    pub transaction_hash: TxHash,
    /// `true` if execution succeeded, `false` if it reverted.
    pub status: bool,
    /// Block the transaction was included in.
    pub block_number: Option<u64>,
}

/// A broadcast transaction that has not been awaited yet.
pub trait PendingTransaction: Send {
    /// Error type for confirmation failures.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Hash of the broadcast transaction.
    fn tx_hash(&self) -> TxHash;

    /// Waits until the transaction has `confirmations` confirmations.
    fn wait(
        self,
        confirmations: u64,
    ) -> impl Future<Output = Result<TransactionReceipt, Self::Error>> + Send;
}

/// Builds and submits payment-related transactions for a connected payer.
///
/// The `settings` argument is `Some` for conversion payments and `None` for
/// payments in the invoice currency itself.
pub trait PaymentExecutor: Send + Sync {
    /// Error type for executor failures.
    type Error: std::error::Error + Send + Sync + 'static;
    /// Handle returned for submitted transactions.
    type Pending: PendingTransaction;

    /// Whether `payer` holds at least `amount` of `currency`.
    fn is_solvent(
        &self,
        payer: Address,
        currency: &CurrencyInfo,
        amount: U256,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send;

    /// Whether `payer` can pay `request` in its own currency, fees included.
    fn has_sufficient_funds(
        &self,
        request: &Request,
        payer: Address,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send;

    /// Current allowance of `payer` for the proxy that will pay `request`.
    fn check_token_allowance(
        &self,
        request: &Request,
        payer: Address,
        settings: Option<&ConversionSettings>,
    ) -> impl Future<Output = Result<U256, Self::Error>> + Send;

    /// Submits an approval of `amount` for the proxy that will pay `request`.
    fn approve_token(
        &self,
        request: &Request,
        payer: Address,
        settings: Option<&ConversionSettings>,
        amount: ApprovalAmount,
    ) -> impl Future<Output = Result<Self::Pending, Self::Error>> + Send;

    /// Submits the payment of `request`.
    fn pay_request(
        &self,
        request: &Request,
        payer: Address,
        settings: Option<&ConversionSettings>,
    ) -> impl Future<Output = Result<Self::Pending, Self::Error>> + Send;
}

impl<T: PaymentExecutor> PaymentExecutor for Arc<T> {
    type Error = T::Error;
    type Pending = T::Pending;

    fn is_solvent(
        &self,
        payer: Address,
        currency: &CurrencyInfo,
        amount: U256,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send {
        (**self).is_solvent(payer, currency, amount)
    }

    fn has_sufficient_funds(
        &self,
        request: &Request,
        payer: Address,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send {
        (**self).has_sufficient_funds(request, payer)
    }

    fn check_token_allowance(
        &self,
        request: &Request,
        payer: Address,
        settings: Option<&ConversionSettings>,
    ) -> impl Future<Output = Result<U256, Self::Error>> + Send {
        (**self).check_token_allowance(request, payer, settings)
    }

    fn approve_token(
        &self,
        request: &Request,
        payer: Address,
        settings: Option<&ConversionSettings>,
        amount: ApprovalAmount,
    ) -> impl Future<Output = Result<Self::Pending, Self::Error>> + Send {
        (**self).approve_token(request, payer, settings, amount)
    }

    fn pay_request(
        &self,
        request: &Request,
        payer: Address,
        settings: Option<&ConversionSettings>,
    ) -> impl Future<Output = Result<Self::Pending, Self::Error>> + Send {
        (**self).pay_request(request, payer, settings)
    }
}
