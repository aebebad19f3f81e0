//! Error taxonomy for the settlement pipeline.
//!
//! Each layer owns one error enum. Higher layers never reinterpret a lower
//! layer's error: the orchestrator wraps whatever failed in a
//! [`SettlementError`] whose [`step`](SettlementError::step) records where the
//! attempt stopped.

use std::fmt;

use alloy_primitives::{Address, TxHash, U256};

use crate::allowance::AllowanceState;
use crate::wallet::WalletError;

/// Type-erased error raised by an external collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures of the network layer ([`NetworkGateway`](crate::gateway::NetworkGateway)).
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// The network identifier is not present in the injected registry.
    #[error("Network {network} not supported")]
    UnsupportedNetwork {
        /// The requested network identifier.
        network: String,
    },
    /// The wallet refused or failed the chain switch.
    #[error("Error connecting to {network} network")]
    NetworkSwitch {
        /// The requested network identifier.
        network: String,
        /// Error reported by the wallet.
        #[source]
        source: WalletError,
    },
    /// The wallet does not know the chain and refused to add it.
    #[error("Please manually install the {network} network into your wallet")]
    ManualInstallRequired {
        /// The requested network identifier.
        network: String,
        /// Error reported by the wallet for the add-chain request.
        #[source]
        source: WalletError,
    },
    /// The wallet's active chain could not be read.
    #[error("Failed to read the wallet's active chain")]
    ChainRead {
        /// Error reported by the wallet.
        #[source]
        source: WalletError,
    },
}

/// Failures of the conversion layer: currency metadata, rates and arithmetic.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    /// No usable conversion rate.
    #[error("Rate unavailable: {reason}")]
    RateUnavailable {
        /// What was missing.
        reason: String,
        /// Oracle error, when the lookup itself failed.
        #[source]
        source: Option<BoxError>,
    },
    /// The payment currency could not be resolved to usable metadata.
    #[error("Cannot resolve currency {currency}: {reason}")]
    CurrencyResolution {
        /// The currency identifier or address that was looked up.
        currency: String,
        /// What was missing or inconsistent.
        reason: String,
        /// Registry error, when the lookup itself failed.
        #[source]
        source: Option<BoxError>,
    },
    /// The invoice total (amount plus fee) is zero or negative.
    #[error("Amount to convert must be strictly positive")]
    NonPositiveAmount,
    /// A negative slippage tolerance was supplied.
    #[error("Slippage tolerance must not be negative")]
    NegativeSlippage,
    /// An amount string could not be parsed.
    #[error("Invalid amount {value:?}")]
    InvalidAmount {
        /// The offending value.
        value: String,
    },
    /// The amount does not fit the target representation.
    #[error("Amount overflows the currency's base-unit representation")]
    Overflow,
}

impl ConversionError {
    pub(crate) fn rate_unavailable(reason: impl Into<String>) -> Self {
        Self::RateUnavailable {
            reason: reason.into(),
            source: None,
        }
    }

    pub(crate) fn currency(currency: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CurrencyResolution {
            currency: currency.into(),
            reason: reason.into(),
            source: None,
        }
    }
}

/// Failures while classifying a request's payment network.
#[derive(Debug, thiserror::Error)]
pub enum ClassificationError {
    /// The request carries no `payment-network` extension.
    #[error("Request has no payment-network extension")]
    NoPaymentNetwork,
    /// The request carries more than one `payment-network` extension.
    #[error("Request has several payment-network extensions: {}", .ids.join(", "))]
    AmbiguousPaymentNetwork {
        /// Ids of all payment-network extensions found.
        ids: Vec<String>,
    },
    /// The payment-network id is not one this crate can settle.
    #[error("Unsupported payment network {id}")]
    UnsupportedPaymentNetwork {
        /// The extension id.
        id: String,
    },
    /// A field required by the variant is absent.
    #[error("Payment network {id} is missing {field}")]
    MissingParameter {
        /// The extension id.
        id: String,
        /// Name of the missing field.
        field: &'static str,
    },
    /// A field is present but malformed.
    #[error("Payment network {id} has an invalid {field}: {value}")]
    InvalidParameter {
        /// The extension id.
        id: String,
        /// Name of the malformed field.
        field: &'static str,
        /// The offending value, rendered as JSON.
        value: String,
    },
}

/// Failures of the ERC20 approval step.
#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    /// `approve` was called outside the `Insufficient` state.
    #[error("Cannot approve from allowance state {state:?}")]
    InvalidState {
        /// The state the manager was in.
        state: AllowanceState,
    },
    /// The wallet or executor refused to issue the approval.
    #[error("Approval transaction rejected")]
    Rejected {
        /// Underlying executor error.
        #[source]
        source: BoxError,
    },
    /// The approval was broadcast but never confirmed.
    #[error("Approval transaction {tx_hash} was not confirmed")]
    Confirmation {
        /// Hash of the approval transaction.
        tx_hash: TxHash,
        /// Underlying error.
        #[source]
        source: BoxError,
    },
    /// The approval was mined but reverted.
    #[error("Approval transaction {tx_hash} reverted")]
    Reverted {
        /// Hash of the approval transaction.
        tx_hash: TxHash,
    },
    /// The approval confirmed yet the allowance is still too low.
    #[error("Allowance {allowance} still below required {required} after approval")]
    StillInsufficient {
        /// Allowance read after approval.
        allowance: U256,
        /// Amount the payment needs.
        required: U256,
    },
}

/// Failures of the [`AllowanceManager`](crate::allowance::AllowanceManager).
#[derive(Debug, thiserror::Error)]
pub enum AllowanceError {
    /// Network re-verification before approval failed.
    #[error(transparent)]
    Network(#[from] NetworkError),
    /// Approval failed.
    #[error(transparent)]
    Approval(#[from] ApprovalError),
    /// The allowance could not be read.
    #[error("Failed to read token allowance")]
    Query {
        /// Underlying executor error.
        #[source]
        source: BoxError,
    },
}

/// Failures of the execution layer (solvency, approval, payment).
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// The payer cannot cover the amount.
    #[error("{payer} does not have enough funds to pay this request")]
    InsufficientFunds {
        /// The payer's address.
        payer: Address,
    },
    /// Approval failed.
    #[error(transparent)]
    Approval(#[from] ApprovalError),
    /// The payment transaction was mined but reverted.
    #[error("Transaction {tx_hash} reverted")]
    TransactionReverted {
        /// Hash of the payment transaction.
        tx_hash: TxHash,
    },
    /// A read-only executor query failed.
    #[error("Executor query {operation} failed")]
    Query {
        /// Name of the failed query.
        operation: &'static str,
        /// Underlying executor error.
        #[source]
        source: BoxError,
    },
    /// The payment transaction could not be submitted.
    #[error("Payment submission failed")]
    Submission {
        /// Underlying executor error.
        #[source]
        source: BoxError,
    },
    /// The payment transaction was broadcast but not confirmed.
    #[error("Payment transaction {tx_hash} was not confirmed")]
    Confirmation {
        /// Hash of the payment transaction.
        tx_hash: TxHash,
        /// Underlying error.
        #[source]
        source: BoxError,
    },
}

/// Pipeline step at which a settlement attempt stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettlementStep {
    /// Resolving the payer address from the wallet.
    ResolveWallet,
    /// Classifying the payment network.
    Classify,
    /// Resolving payment currency metadata.
    ResolveCurrency,
    /// Switching the wallet to the payment network.
    EnsureNetwork,
    /// Fetching a rate and computing the spend ceiling.
    Quote,
    /// Checking the payer's balance.
    Solvency,
    /// Checking and raising the ERC20 allowance.
    Allowance,
    /// Submitting the payment transaction.
    Submit,
    /// Waiting for the payment confirmation.
    Confirm,
}

impl SettlementStep {
    /// Stable lowercase name of the step.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ResolveWallet => "resolve_wallet",
            Self::Classify => "classify",
            Self::ResolveCurrency => "resolve_currency",
            Self::EnsureNetwork => "ensure_network",
            Self::Quote => "quote",
            Self::Solvency => "solvency",
            Self::Allowance => "allowance",
            Self::Submit => "submit",
            Self::Confirm => "confirm",
        }
    }
}

impl fmt::Display for SettlementStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What went wrong in a settlement attempt.
#[derive(Debug, thiserror::Error)]
pub enum SettlementErrorKind {
    /// The wallet exposes no account.
    #[error("No wallet address available")]
    NoWalletAddress {
        /// Wallet error, if the account lookup itself failed.
        #[source]
        source: Option<WalletError>,
    },
    /// See [`ClassificationError`].
    #[error(transparent)]
    Classification(#[from] ClassificationError),
    /// See [`ConversionError`].
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    /// See [`NetworkError`].
    #[error(transparent)]
    Network(#[from] NetworkError),
    /// See [`ExecutionError`].
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl From<AllowanceError> for SettlementErrorKind {
    fn from(value: AllowanceError) -> Self {
        match value {
            AllowanceError::Network(e) => Self::Network(e),
            AllowanceError::Approval(e) => Self::Execution(ExecutionError::Approval(e)),
            AllowanceError::Query { source } => Self::Execution(ExecutionError::Query {
                operation: "check_token_allowance",
                source,
            }),
        }
    }
}

impl From<ApprovalError> for SettlementErrorKind {
    fn from(value: ApprovalError) -> Self {
        Self::Execution(ExecutionError::Approval(value))
    }
}

/// A failed settlement attempt: the originating error plus the step it came from.
#[derive(Debug, thiserror::Error)]
#[error("settlement failed at {step}: {kind}")]
pub struct SettlementError {
    /// The step that failed.
    pub step: SettlementStep,
    /// The originating error.
    #[source]
    pub kind: SettlementErrorKind,
}

impl SettlementError {
    /// Creates a settlement error for `step`.
    pub fn new(step: SettlementStep, kind: impl Into<SettlementErrorKind>) -> Self {
        Self {
            step,
            kind: kind.into(),
        }
    }

    /// Returns `true` when the attempt failed on insufficient funds.
    #[must_use]
    pub const fn is_insufficient_funds(&self) -> bool {
        matches!(
            self.kind,
            SettlementErrorKind::Execution(ExecutionError::InsufficientFunds { .. })
        )
    }

    /// Returns `true` when the attempt failed while approving the token.
    #[must_use]
    pub const fn is_approval(&self) -> bool {
        matches!(
            self.kind,
            SettlementErrorKind::Execution(ExecutionError::Approval(_))
        )
    }

    /// Returns `true` when the user has to add the network by hand.
    #[must_use]
    pub const fn is_manual_install_required(&self) -> bool {
        matches!(
            self.kind,
            SettlementErrorKind::Network(NetworkError::ManualInstallRequired { .. })
        )
    }
}

/// Returns a closure tagging an error with `step`, for use with `map_err`.
pub(crate) fn at<E>(step: SettlementStep) -> impl FnOnce(E) -> SettlementError
where
    E: Into<SettlementErrorKind>,
{
    move |e| SettlementError::new(step, e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settlement_error_keeps_step_and_kind() {
        let err = SettlementError::new(
            SettlementStep::EnsureNetwork,
            NetworkError::UnsupportedNetwork {
                network: "fantom".into(),
            },
        );
        assert_eq!(err.step, SettlementStep::EnsureNetwork);
        assert_eq!(
            err.to_string(),
            "settlement failed at ensure_network: Network fantom not supported"
        );
    }

    #[test]
    fn test_allowance_error_maps_to_execution_layer() {
        let kind: SettlementErrorKind = AllowanceError::Approval(ApprovalError::Reverted {
            tx_hash: TxHash::ZERO,
        })
        .into();
        assert!(matches!(
            kind,
            SettlementErrorKind::Execution(ExecutionError::Approval(ApprovalError::Reverted { .. }))
        ));
    }

    #[test]
    fn test_allowance_network_error_stays_network() {
        let kind: SettlementErrorKind = AllowanceError::Network(NetworkError::UnsupportedNetwork {
            network: "matic".into(),
        })
        .into();
        assert!(matches!(kind, SettlementErrorKind::Network(_)));
    }
}
