//! Ledger boundary: transaction building, signing/submission, settlement.
//!
//! The ledger itself is an external collaborator. This module owns the
//! transaction payload types as they move through the pipeline and the
//! traits each collaborator is consumed through.

pub mod builder;
pub mod mock;
pub mod settlement;
pub mod signing;

pub use builder::{HttpTransactionBuilder, TransactionBuilder, WriteOptionRequest};
pub use mock::{MockBuilder, MockSettler, MockSigner, MockSignerProvider};
pub use settlement::{HttpSettler, OptionSettler};
pub use signing::{LedgerSigner, RelaySigner, RelaySignerProvider, SignerProvider, SigningGateway};

use serde::{Deserialize, Serialize};

/// An option-mint transaction built server-side but not yet signed.
///
/// `tx_bytes` is opaque to this system; only the wallet signing layer
/// understands it. Consumed exactly once by the signing gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsignedOptionTransaction {
    /// Serialized transaction payload (opaque)
    pub tx_bytes: String,
    /// Auxiliary data required at signing time (e.g., NFT content)
    pub metadata: String,
    /// Serial assigned to the writer's option position by the build step
    pub writer_nft_serial: i64,
}

/// A transaction finalized against the signer's network context.
#[derive(Debug, Clone)]
pub struct FrozenTransaction {
    pub tx_bytes: String,
}

/// A frozen transaction carrying the wallet's signature.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub tx_bytes: String,
}

/// Handle to a transaction that has been submitted to the ledger.
#[derive(Debug, Clone)]
pub struct SubmittedTransaction {
    pub transaction_id: String,
}

/// Ledger-issued confirmation of a submitted transaction's final status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub transaction_id: String,
    /// Terminal status code as reported by the ledger (e.g., "SUCCESS")
    pub status: String,
}
