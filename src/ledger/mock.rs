//! In-memory ledger collaborators for tests and paper mode.
//!
//! Behavior is scripted at construction; call counters let tests assert
//! which collaborators were (or were never) contacted.

use super::{
    FrozenTransaction, Receipt, SignedTransaction, SubmittedTransaction,
    UnsignedOptionTransaction,
};
use crate::error::SettlementError;
use crate::ledger::builder::{TransactionBuilder, WriteOptionRequest};
use crate::ledger::settlement::OptionSettler;
use crate::ledger::signing::LedgerSigner;
use crate::wallet::SignerContext;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Builder that mints serials locally instead of calling the backend.
pub struct MockBuilder {
    next_serial: AtomicI64,
    build_calls: AtomicU64,
    failure: Option<String>,
}

impl MockBuilder {
    pub fn new() -> Self {
        Self {
            next_serial: AtomicI64::new(1),
            build_calls: AtomicU64::new(0),
            failure: None,
        }
    }

    /// A builder whose every call fails with the given message.
    pub fn failing(message: &str) -> Self {
        Self {
            next_serial: AtomicI64::new(1),
            build_calls: AtomicU64::new(0),
            failure: Some(message.to_string()),
        }
    }

    pub fn build_calls(&self) -> u64 {
        self.build_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransactionBuilder for MockBuilder {
    async fn write_option(
        &self,
        request: &WriteOptionRequest,
    ) -> Result<UnsignedOptionTransaction> {
        self.build_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = &self.failure {
            return Err(anyhow!("{message}"));
        }

        let serial = self.next_serial.fetch_add(1, Ordering::SeqCst);
        Ok(UnsignedOptionTransaction {
            tx_bytes: format!("mock-tx-{}-{}", request.token_id, serial),
            metadata: format!("mock-meta-{serial}"),
            writer_nft_serial: serial,
        })
    }
}

/// How the mock signer behaves on each step of the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignerScript {
    Succeed,
    FailFreeze,
    DenySignature,
    HangOnSign,
    FailExecute,
    FailReceipt,
}

/// Signer with scripted behavior and per-step call counters.
pub struct MockSigner {
    context: SignerContext,
    script: SignerScript,
    sign_calls: AtomicU64,
}

impl MockSigner {
    pub fn succeeding(context: SignerContext) -> Self {
        Self::with_script(context, SignerScript::Succeed)
    }

    pub fn failing_at_freeze(context: SignerContext) -> Self {
        Self::with_script(context, SignerScript::FailFreeze)
    }

    pub fn denying_signature(context: SignerContext) -> Self {
        Self::with_script(context, SignerScript::DenySignature)
    }

    pub fn hanging_on_sign(context: SignerContext) -> Self {
        Self::with_script(context, SignerScript::HangOnSign)
    }

    pub fn failing_at_execute(context: SignerContext) -> Self {
        Self::with_script(context, SignerScript::FailExecute)
    }

    pub fn failing_at_receipt(context: SignerContext) -> Self {
        Self::with_script(context, SignerScript::FailReceipt)
    }

    fn with_script(context: SignerContext, script: SignerScript) -> Self {
        Self {
            context,
            script,
            sign_calls: AtomicU64::new(0),
        }
    }

    pub fn sign_calls(&self) -> u64 {
        self.sign_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerSigner for MockSigner {
    fn context(&self) -> &SignerContext {
        &self.context
    }

    async fn freeze(&self, tx: &UnsignedOptionTransaction) -> Result<FrozenTransaction> {
        if self.script == SignerScript::FailFreeze {
            return Err(anyhow!("node unreachable on {}", self.context.network));
        }
        Ok(FrozenTransaction {
            tx_bytes: format!("frozen:{}", tx.tx_bytes),
        })
    }

    async fn sign(&self, tx: FrozenTransaction) -> Result<SignedTransaction> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        match self.script {
            SignerScript::DenySignature => Err(anyhow!("user rejected the request")),
            SignerScript::HangOnSign => {
                // Simulates a wallet approval that never arrives.
                tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                unreachable!("hung signer woke up")
            }
            _ => Ok(SignedTransaction {
                tx_bytes: format!("signed:{}", tx.tx_bytes),
            }),
        }
    }

    async fn execute(&self, tx: SignedTransaction) -> Result<SubmittedTransaction> {
        if self.script == SignerScript::FailExecute {
            return Err(anyhow!("ledger rejected the transaction"));
        }
        Ok(SubmittedTransaction {
            transaction_id: format!("tx@{}", tx.tx_bytes.len()),
        })
    }

    async fn receipt(&self, tx: &SubmittedTransaction) -> Result<Receipt> {
        if self.script == SignerScript::FailReceipt {
            return Err(anyhow!("receipt query timed out"));
        }
        Ok(Receipt {
            transaction_id: tx.transaction_id.clone(),
            status: "SUCCESS".to_string(),
        })
    }
}

/// Settler that records settled ids and fails only where scripted.
pub struct MockSettler {
    failing_ids: HashSet<String>,
    settled: Arc<RwLock<Vec<String>>>,
}

impl MockSettler {
    pub fn new() -> Self {
        Self {
            failing_ids: HashSet::new(),
            settled: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Settler that fails for exactly the given ids.
    pub fn failing_for<I: IntoIterator<Item = S>, S: Into<String>>(ids: I) -> Self {
        Self {
            failing_ids: ids.into_iter().map(Into::into).collect(),
            settled: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Ids settled so far, in settlement order.
    pub async fn settled(&self) -> Vec<String> {
        self.settled.read().await.clone()
    }
}

impl Default for MockSettler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OptionSettler for MockSettler {
    async fn settle_on_chain(&self, id: &str) -> Result<(), SettlementError> {
        if self.failing_ids.contains(id) {
            return Err(SettlementError(anyhow!("contract call reverted for {id}")));
        }
        self.settled.write().await.push(id.to_string());
        Ok(())
    }
}

/// Signer provider that hands out mock signers for paper mode.
pub struct MockSignerProvider;

impl crate::ledger::signing::SignerProvider for MockSignerProvider {
    fn signer(&self, context: SignerContext) -> Arc<dyn LedgerSigner> {
        Arc::new(MockSigner::succeeding(context))
    }
}
