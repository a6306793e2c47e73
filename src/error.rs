//! Closed error taxonomy for the option lifecycle.
//!
//! Callers branch on these kinds rather than string-matching messages.
//! Collaborator-internal causes ride along as `anyhow::Error` sources so the
//! deepest available cause text can be surfaced to the user.

use thiserror::Error;

/// Failure of a single `create_option` invocation.
#[derive(Debug, Error)]
pub enum CreateOptionError {
    /// No active wallet session; resolved locally, no collaborator is contacted.
    #[error("Wallet is not connected. Please connect your wallet and try again.")]
    WalletNotConnected,

    /// Bad or missing user input; resolved locally, no collaborator is contacted.
    #[error("{0}")]
    InvalidInput(String),

    /// Another creation is still in flight on this orchestrator.
    #[error("An option creation is already in progress.")]
    AlreadyInFlight,

    /// The transaction builder failed; nothing was signed or submitted,
    /// so retrying is safe.
    #[error("Failed to build the option transaction: {0}")]
    BuildFailed(#[source] anyhow::Error),

    /// The signing gateway failed. The transaction may have partially
    /// executed; retrying is NOT guaranteed safe.
    #[error("Failed to sign or submit the option transaction: {0}")]
    SignOrSubmitFailed(#[from] SigningError),
}

impl CreateOptionError {
    /// User-facing message: the deepest available cause, never a stack trace.
    pub fn user_message(&self) -> String {
        match self {
            Self::BuildFailed(cause) => {
                format!("Failed to build the option transaction: {}", cause.root_cause())
            }
            Self::SignOrSubmitFailed(cause) => cause.to_string(),
            other => other.to_string(),
        }
    }
}

/// Failure of one step of the sign-and-submit chain. Each gateway step maps
/// to exactly one variant so callers can tell how far the transaction got.
#[derive(Debug, Error)]
pub enum SigningError {
    /// Freezing the transaction against the signer's network context failed.
    #[error("Failed to freeze the transaction: {0}")]
    FreezeFailed(#[source] anyhow::Error),

    /// The wallet refused to sign (or the signing channel errored).
    #[error("The wallet denied the signature request: {0}")]
    SignatureDenied(#[source] anyhow::Error),

    /// The wallet never answered within the configured window.
    #[error("Timed out waiting for the wallet signature")]
    SignatureTimeout,

    /// Submitting the signed transaction to the ledger failed.
    #[error("Failed to submit the transaction to the ledger: {0}")]
    SubmissionFailed(#[source] anyhow::Error),

    /// The transaction was submitted but no receipt could be fetched.
    #[error("Could not fetch the transaction receipt: {0}")]
    ReceiptUnavailable(#[source] anyhow::Error),
}

/// Option store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to scan the option store: {0}")]
    ScanFailed(#[source] anyhow::Error),

    #[error("Failed to delete option record: {0}")]
    DeleteFailed(#[source] anyhow::Error),

    #[error("Failed to write option record: {0}")]
    WriteFailed(#[source] anyhow::Error),
}

/// On-chain settlement failure for a single expired option.
#[derive(Debug, Error)]
#[error("On-chain settlement failed: {0}")]
pub struct SettlementError(#[from] pub anyhow::Error);

/// Why one record in a sweep could not be fully purged.
#[derive(Debug, Error)]
pub enum SweepFailureCause {
    /// Settlement failed; the record stays in the store and is retried on
    /// the next sweep.
    #[error("{0}")]
    Settlement(#[from] SettlementError),

    /// The record settled on-chain but the store delete failed. On-chain
    /// and off-chain state have diverged; flag for manual reconciliation.
    #[error("Settled on-chain but failed to purge from the store: {0}")]
    PurgeAfterSettleFailed(#[source] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_user_message_surfaces_root_cause() {
        let err = CreateOptionError::BuildFailed(
            anyhow!("connection refused").context("POST /writeOption failed"),
        );
        assert!(err.user_message().contains("connection refused"));
    }

    #[test]
    fn test_signing_error_wraps_into_create_error() {
        let err: CreateOptionError = SigningError::SignatureTimeout.into();
        assert!(matches!(
            err,
            CreateOptionError::SignOrSubmitFailed(SigningError::SignatureTimeout)
        ));
    }

    #[test]
    fn test_purge_failure_is_distinct_from_settlement_failure() {
        let purge = SweepFailureCause::PurgeAfterSettleFailed(StoreError::DeleteFailed(anyhow!(
            "disk full"
        )));
        assert!(purge.to_string().contains("Settled on-chain"));
    }
}
