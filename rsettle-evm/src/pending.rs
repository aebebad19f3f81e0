//! [`PendingTransaction`] over alloy's pending transaction builder.

use std::time::Duration;

use alloy_network::Ethereum;
use alloy_primitives::TxHash;
use alloy_provider::{PendingTransactionBuilder, PendingTransactionError};
use alloy_rpc_types_eth::TransactionReceipt as RpcReceipt;
use rsettle::executor::{PendingTransaction, TransactionReceipt};

/// Default time to wait for a receipt before giving up.
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(30);

/// A broadcast transaction awaiting confirmation.
#[derive(Debug)]
pub struct EvmPendingTransaction {
    inner: PendingTransactionBuilder<Ethereum>,
    timeout: Option<Duration>,
}

impl EvmPendingTransaction {
    /// Wraps a pending transaction returned by an alloy provider.
    #[must_use]
    pub const fn new(inner: PendingTransactionBuilder<Ethereum>) -> Self {
        Self {
            inner,
            timeout: Some(DEFAULT_RECEIPT_TIMEOUT),
        }
    }

    /// Overrides the receipt timeout. `None` waits indefinitely.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the configured receipt timeout.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl From<PendingTransactionBuilder<Ethereum>> for EvmPendingTransaction {
    fn from(inner: PendingTransactionBuilder<Ethereum>) -> Self {
        Self::new(inner)
    }
}

impl PendingTransaction for EvmPendingTransaction {
    type Error = PendingTransactionError;

    fn tx_hash(&self) -> TxHash {
        *self.inner.tx_hash()
    }

    #[cfg_attr(
        feature = "telemetry",
        tracing::instrument(name = "rsettle.pending_transaction.wait", skip(self), err, fields(tx_hash = %self.inner.tx_hash()))
    )]
    async fn wait(self, confirmations: u64) -> Result<TransactionReceipt, PendingTransactionError> {
        let receipt = self
            .inner
            .with_required_confirmations(confirmations)
            .with_timeout(self.timeout)
            .get_receipt()
            .await?;
        Ok(receipt_outcome(&receipt))
    }
}

/// Reduces an RPC receipt to the fields the pipeline inspects.
#[must_use]
pub fn receipt_outcome(receipt: &RpcReceipt) -> TransactionReceipt {
    TransactionReceipt {
        transaction_hash: receipt.transaction_hash,
        status: receipt.status(),
        block_number: receipt.block_number,
    }
}
