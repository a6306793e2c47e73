//! Wallet session capability.
//!
//! The session is an explicit capability object passed into the orchestrator,
//! so concurrent sessions in one process are representable and testable. The
//! capability never holds a private key; it only carries the pairing data
//! needed to derive a signer scoped to a network and pairing topic.

use serde::{Deserialize, Serialize};

/// Pairing data saved when the wallet approved the connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairingData {
    /// Relay topic the wallet listens on for signature requests
    pub topic: String,
    /// Account the wallet paired with
    pub paired_account: String,
}

/// A wallet session: either connected (with pairing data) or not.
#[derive(Debug, Clone, Default)]
pub struct WalletSession {
    pairing: Option<PairingData>,
}

/// Everything a ledger signer needs to route a signature request:
/// which network, which relay topic, and which account signs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerContext {
    pub network: String,
    pub topic: String,
    pub account_id: String,
}

impl WalletSession {
    /// A session backed by an approved pairing.
    pub fn connected(pairing: PairingData) -> Self {
        Self {
            pairing: Some(pairing),
        }
    }

    /// A session with no active pairing.
    pub fn disconnected() -> Self {
        Self { pairing: None }
    }

    pub fn is_connected(&self) -> bool {
        self.pairing.is_some()
    }

    /// Derive the signer scope for this session on the given network.
    ///
    /// Returns `None` when no wallet is paired.
    pub fn signer_context(&self, network: &str, account_id: &str) -> Option<SignerContext> {
        self.pairing.as_ref().map(|pairing| SignerContext {
            network: network.to_string(),
            topic: pairing.topic.clone(),
            account_id: account_id.to_string(),
        })
    }
}
