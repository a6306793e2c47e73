//! Signing gateway: freeze → sign → execute → receipt.
//!
//! The gateway drives a wallet-backed signer through the four steps of
//! getting an unsigned transaction onto the ledger. Each step fails with its
//! own [`SigningError`] variant so callers know exactly how far the
//! transaction got; on success exactly one terminal receipt is returned,
//! never a partial one.

use super::{FrozenTransaction, Receipt, SignedTransaction, SubmittedTransaction,
    UnsignedOptionTransaction};
use crate::error::SigningError;
use crate::wallet::SignerContext;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// A wallet-backed signer scoped to one network, topic, and account.
///
/// The private key never enters this process; `sign` suspends while the
/// wallet user approves out-of-process.
#[async_trait]
pub trait LedgerSigner: Send + Sync {
    fn context(&self) -> &SignerContext;

    /// Finalize the transaction against this signer's network context.
    async fn freeze(&self, tx: &UnsignedOptionTransaction) -> Result<FrozenTransaction>;

    /// Obtain the wallet signature. May suspend for unbounded wallet latency.
    async fn sign(&self, tx: FrozenTransaction) -> Result<SignedTransaction>;

    /// Submit the signed transaction to the ledger.
    async fn execute(&self, tx: SignedTransaction) -> Result<SubmittedTransaction>;

    /// Fetch the receipt for a submitted transaction.
    async fn receipt(&self, tx: &SubmittedTransaction) -> Result<Receipt>;
}

/// Derives a signer from a signer context.
///
/// The orchestrator derives a fresh signer per invocation so concurrent
/// sessions never share signer state.
pub trait SignerProvider: Send + Sync {
    fn signer(&self, context: SignerContext) -> Arc<dyn LedgerSigner>;
}

/// Drives the sign-and-submit chain over any [`LedgerSigner`].
pub struct SigningGateway {
    /// Cap on the wallet-approval wait; converts a hung signature request
    /// into `SignatureTimeout`.
    signature_timeout: Duration,
}

impl SigningGateway {
    pub fn new(signature_timeout: Duration) -> Self {
        Self { signature_timeout }
    }

    /// Sign and submit one transaction, returning its terminal receipt.
    #[instrument(skip_all, fields(account = %signer.context().account_id))]
    pub async fn sign_and_submit(
        &self,
        unsigned: &UnsignedOptionTransaction,
        signer: &dyn LedgerSigner,
    ) -> Result<Receipt, SigningError> {
        let frozen = signer
            .freeze(unsigned)
            .await
            .map_err(SigningError::FreezeFailed)?;
        debug!("Transaction frozen");

        let signed = match tokio::time::timeout(self.signature_timeout, signer.sign(frozen)).await
        {
            Err(_) => return Err(SigningError::SignatureTimeout),
            Ok(Err(cause)) => return Err(SigningError::SignatureDenied(cause)),
            Ok(Ok(signed)) => signed,
        };
        debug!("Wallet signature obtained");

        let submitted = signer
            .execute(signed)
            .await
            .map_err(SigningError::SubmissionFailed)?;

        let receipt = signer
            .receipt(&submitted)
            .await
            .map_err(SigningError::ReceiptUnavailable)?;

        info!(
            transaction_id = %receipt.transaction_id,
            status = %receipt.status,
            "Transaction confirmed"
        );
        Ok(receipt)
    }
}

/// Signer backed by a wallet relay service.
///
/// The relay holds the pairing with the user's wallet; this client freezes
/// the transaction, long-polls the relay for the wallet's approval, then
/// submits and fetches the receipt on the scoped network.
pub struct RelaySigner {
    http: Client,
    base_url: String,
    context: SignerContext,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelayTxResponse {
    tx_bytes: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelaySubmitResponse {
    transaction_id: String,
}

impl RelaySigner {
    pub fn new(base_url: &str, context: SignerContext) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(180))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self::with_client(http, base_url, context))
    }

    fn with_client(http: Client, base_url: &str, context: SignerContext) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            context,
        }
    }

    fn scoped_body(&self, tx_bytes: &str) -> serde_json::Value {
        serde_json::json!({
            "network": self.context.network,
            "topic": self.context.topic,
            "accountId": self.context.account_id,
            "txBytes": tx_bytes,
        })
    }

    async fn post_tx(&self, route: &str, tx_bytes: &str) -> Result<RelayTxResponse> {
        let url = format!("{}/{}", self.base_url, route);
        let response = self
            .http
            .post(&url)
            .json(&self.scoped_body(tx_bytes))
            .send()
            .await
            .with_context(|| format!("Failed to reach wallet relay at /{route}"))?
            .error_for_status()
            .with_context(|| format!("Wallet relay refused /{route}"))?;

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse wallet relay /{route} response"))
    }
}

#[async_trait]
impl LedgerSigner for RelaySigner {
    fn context(&self) -> &SignerContext {
        &self.context
    }

    async fn freeze(&self, tx: &UnsignedOptionTransaction) -> Result<FrozenTransaction> {
        let response = self.post_tx("freeze", &tx.tx_bytes).await?;
        Ok(FrozenTransaction {
            tx_bytes: response.tx_bytes,
        })
    }

    async fn sign(&self, tx: FrozenTransaction) -> Result<SignedTransaction> {
        // Long-poll: the relay answers once the wallet user approves or rejects.
        let response = self.post_tx("sign", &tx.tx_bytes).await?;
        Ok(SignedTransaction {
            tx_bytes: response.tx_bytes,
        })
    }

    async fn execute(&self, tx: SignedTransaction) -> Result<SubmittedTransaction> {
        let url = format!("{}/execute", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&self.scoped_body(&tx.tx_bytes))
            .send()
            .await
            .context("Failed to reach wallet relay at /execute")?
            .error_for_status()
            .context("Ledger submission failed")?;

        let body: RelaySubmitResponse = response
            .json()
            .await
            .context("Failed to parse submission response")?;

        Ok(SubmittedTransaction {
            transaction_id: body.transaction_id,
        })
    }

    async fn receipt(&self, tx: &SubmittedTransaction) -> Result<Receipt> {
        let url = format!(
            "{}/receipt/{}?network={}",
            self.base_url, tx.transaction_id, self.context.network
        );
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .context("Failed to reach wallet relay for receipt")?
            .error_for_status()
            .context("Receipt not available")?;

        response.json().await.context("Failed to parse receipt")
    }
}

/// [`SignerProvider`] that hands out [`RelaySigner`]s for one relay URL.
pub struct RelaySignerProvider {
    http: Client,
    relay_url: String,
}

impl RelaySignerProvider {
    pub fn new(relay_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(180))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            relay_url: relay_url.to_string(),
        })
    }
}

impl SignerProvider for RelaySignerProvider {
    fn signer(&self, context: SignerContext) -> Arc<dyn LedgerSigner> {
        Arc::new(RelaySigner::with_client(
            self.http.clone(),
            &self.relay_url,
            context,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::mock::MockSigner;

    fn test_context() -> SignerContext {
        SignerContext {
            network: "testnet".to_string(),
            topic: "topic-1".to_string(),
            account_id: "0.0.777".to_string(),
        }
    }

    fn unsigned() -> UnsignedOptionTransaction {
        UnsignedOptionTransaction {
            tx_bytes: "deadbeef".to_string(),
            metadata: "meta".to_string(),
            writer_nft_serial: 7,
        }
    }

    #[tokio::test]
    async fn test_happy_path_returns_one_terminal_receipt() {
        let signer = MockSigner::succeeding(test_context());
        let gateway = SigningGateway::new(Duration::from_secs(5));

        let receipt = gateway.sign_and_submit(&unsigned(), &signer).await.unwrap();
        assert_eq!(receipt.status, "SUCCESS");
        assert_eq!(signer.sign_calls(), 1);
    }

    #[tokio::test]
    async fn test_freeze_failure_maps_to_freeze_failed() {
        let signer = MockSigner::failing_at_freeze(test_context());
        let gateway = SigningGateway::new(Duration::from_secs(5));

        let err = gateway
            .sign_and_submit(&unsigned(), &signer)
            .await
            .unwrap_err();
        assert!(matches!(err, SigningError::FreezeFailed(_)));
        // The wallet was never prompted.
        assert_eq!(signer.sign_calls(), 0);
    }

    #[tokio::test]
    async fn test_denied_signature_maps_to_signature_denied() {
        let signer = MockSigner::denying_signature(test_context());
        let gateway = SigningGateway::new(Duration::from_secs(5));

        let err = gateway
            .sign_and_submit(&unsigned(), &signer)
            .await
            .unwrap_err();
        assert!(matches!(err, SigningError::SignatureDenied(_)));
    }

    #[tokio::test]
    async fn test_hung_wallet_maps_to_signature_timeout() {
        let signer = MockSigner::hanging_on_sign(test_context());
        let gateway = SigningGateway::new(Duration::from_millis(50));

        let err = gateway
            .sign_and_submit(&unsigned(), &signer)
            .await
            .unwrap_err();
        assert!(matches!(err, SigningError::SignatureTimeout));
    }

    #[tokio::test]
    async fn test_submission_failure_maps_to_submission_failed() {
        let signer = MockSigner::failing_at_execute(test_context());
        let gateway = SigningGateway::new(Duration::from_secs(5));

        let err = gateway
            .sign_and_submit(&unsigned(), &signer)
            .await
            .unwrap_err();
        assert!(matches!(err, SigningError::SubmissionFailed(_)));
    }

    #[tokio::test]
    async fn test_missing_receipt_maps_to_receipt_unavailable() {
        let signer = MockSigner::failing_at_receipt(test_context());
        let gateway = SigningGateway::new(Duration::from_secs(5));

        let err = gateway
            .sign_and_submit(&unsigned(), &signer)
            .await
            .unwrap_err();
        assert!(matches!(err, SigningError::ReceiptUnavailable(_)));
    }
}
