//! ERC20 allowance state machine.
//!
//! One [`AllowanceManager`] lives for one settlement attempt and walks
//!
//! ```text
//! Unknown -> Checking -> Sufficient
//!                     -> Insufficient -> Approving -> Approved
//!                                                  -> Failed
//! ```
//!
//! A failed approval is final for the attempt; it is never retried here.

use alloy_primitives::{Address, U256};

use crate::error::{AllowanceError, ApprovalError, BoxError};
use crate::executor::{
    ApprovalAmount, ConversionSettings, PaymentExecutor, PendingTransaction, TransactionReceipt,
};
use crate::gateway::NetworkGateway;
use crate::payment_network::PaymentNetworkVariant;
use crate::request::Request;
use crate::wallet::Wallet;

/// Allowance state of one settlement attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AllowanceState {
    /// Nothing checked yet.
    #[default]
    Unknown,
    /// Allowance query in flight.
    Checking,
    /// The allowance covers the payment.
    Sufficient,
    /// The allowance must be raised before paying.
    Insufficient,
    /// Approval transaction in flight.
    Approving,
    /// Approval confirmed.
    Approved,
    /// Checking or approving failed.
    Failed,
}

/// What an allowance check is about.
#[derive(Debug, Clone, Copy)]
pub struct AllowanceContext<'a> {
    /// The request being paid.
    pub request: &'a Request,
    /// Its payment-network variant.
    pub variant: &'a PaymentNetworkVariant,
    /// The payer.
    pub payer: Address,
    /// Network identifier approvals must be issued on.
    pub network: &'a str,
    /// Amount the proxy will pull, in base units.
    pub required: U256,
    /// Conversion settings, for conversion payments.
    pub settings: Option<&'a ConversionSettings>,
}

/// Checks and raises the allowance the payment proxy needs.
#[derive(Debug)]
pub struct AllowanceManager<'a, E> {
    executor: &'a E,
    gateway: &'a NetworkGateway,
    confirmations: u64,
    state: AllowanceState,
}

impl<'a, E: PaymentExecutor> AllowanceManager<'a, E> {
    /// Creates a manager in the [`AllowanceState::Unknown`] state.
    #[must_use]
    pub const fn new(executor: &'a E, gateway: &'a NetworkGateway, confirmations: u64) -> Self {
        Self {
            executor,
            gateway,
            confirmations,
            state: AllowanceState::Unknown,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> AllowanceState {
        self.state
    }

    fn transition(&mut self, next: AllowanceState) {
        #[cfg(feature = "telemetry")]
        tracing::debug!(from = ?self.state, to = ?next, "Allowance state transition");
        self.state = next;
    }

    /// Compares the payer's allowance with `ctx.required`.
    ///
    /// Native-currency variants are [`AllowanceState::Sufficient`] without
    /// any executor or wallet call.
    ///
    /// # Errors
    ///
    /// Returns [`AllowanceError::Query`] if the allowance cannot be read; the
    /// state becomes [`AllowanceState::Failed`].
    pub async fn check_allowance(
        &mut self,
        ctx: &AllowanceContext<'_>,
    ) -> Result<AllowanceState, AllowanceError> {
        if !ctx.variant.is_erc20() {
            self.transition(AllowanceState::Sufficient);
            return Ok(self.state);
        }

        self.transition(AllowanceState::Checking);
        let allowance = match self.read_allowance(ctx).await {
            Ok(allowance) => allowance,
            Err(e) => {
                self.transition(AllowanceState::Failed);
                return Err(e);
            }
        };
        if allowance >= ctx.required {
            self.transition(AllowanceState::Sufficient);
        } else {
            #[cfg(feature = "telemetry")]
            tracing::info!(%allowance, required = %ctx.required, "Allowance too low");
            self.transition(AllowanceState::Insufficient);
        }
        Ok(self.state)
    }

    async fn read_allowance(&self, ctx: &AllowanceContext<'_>) -> Result<U256, AllowanceError> {
        self.executor
            .check_token_allowance(ctx.request, ctx.payer, ctx.settings)
            .await
            .map_err(|e| AllowanceError::Query {
                source: Box::new(e),
            })
    }

    /// Issues an approval sized for the variant and waits for it.
    ///
    /// Only valid in the [`AllowanceState::Insufficient`] state. The wallet's
    /// network is verified again right before the approval is issued.
    ///
    /// # Errors
    ///
    /// - [`ApprovalError::InvalidState`] outside [`AllowanceState::Insufficient`]
    /// - [`AllowanceError::Network`] if the wallet is not on `ctx.network`
    /// - [`ApprovalError::Rejected`], [`ApprovalError::Confirmation`] or
    ///   [`ApprovalError::Reverted`] if the approval did not go through
    #[cfg_attr(
        feature = "telemetry",
        tracing::instrument(name = "rsettle.allowance.approve", skip_all, err, fields(payer = %ctx.payer))
    )]
    pub async fn approve<W: Wallet>(
        &mut self,
        ctx: &AllowanceContext<'_>,
        wallet: &W,
    ) -> Result<TransactionReceipt, AllowanceError> {
        if self.state != AllowanceState::Insufficient {
            return Err(ApprovalError::InvalidState { state: self.state }.into());
        }
        self.transition(AllowanceState::Approving);

        let result = self.submit_approval(ctx, wallet).await;
        match &result {
            Ok(_) => self.transition(AllowanceState::Approved),
            Err(_) => self.transition(AllowanceState::Failed),
        }
        result
    }

    async fn submit_approval<W: Wallet>(
        &self,
        ctx: &AllowanceContext<'_>,
        wallet: &W,
    ) -> Result<TransactionReceipt, AllowanceError> {
        self.gateway.ensure_network(ctx.network, wallet).await?;

        let amount = ApprovalAmount::for_variant(ctx.variant, ctx.required);
        let pending = self
            .executor
            .approve_token(ctx.request, ctx.payer, ctx.settings, amount)
            .await
            .map_err(|e| ApprovalError::Rejected {
                source: Box::new(e),
            })?;
        let tx_hash = pending.tx_hash();

        #[cfg(feature = "telemetry")]
        tracing::info!(%tx_hash, ?amount, "Approval submitted");

        let receipt = pending
            .wait(self.confirmations)
            .await
            .map_err(|e| ApprovalError::Confirmation {
                tx_hash,
                source: Box::new(e) as BoxError,
            })?;
        if !receipt.status {
            return Err(ApprovalError::Reverted { tx_hash }.into());
        }
        Ok(receipt)
    }

    /// Checks the allowance and, if it is too low, approves and checks again.
    ///
    /// # Errors
    ///
    /// The errors of [`check_allowance`](Self::check_allowance) and
    /// [`approve`](Self::approve), plus [`ApprovalError::StillInsufficient`]
    /// if the confirmed approval did not raise the allowance enough.
    pub async fn ensure_allowance<W: Wallet>(
        &mut self,
        ctx: &AllowanceContext<'_>,
        wallet: &W,
    ) -> Result<AllowanceState, AllowanceError> {
        if self.check_allowance(ctx).await? == AllowanceState::Sufficient {
            return Ok(self.state);
        }
        self.approve(ctx, wallet).await?;

        let allowance = match self.read_allowance(ctx).await {
            Ok(allowance) => allowance,
            Err(e) => {
                self.transition(AllowanceState::Failed);
                return Err(e);
            }
        };
        if allowance < ctx.required {
            self.transition(AllowanceState::Failed);
            return Err(ApprovalError::StillInsufficient {
                allowance,
                required: ctx.required,
            }
            .into());
        }
        Ok(self.state)
    }
}
