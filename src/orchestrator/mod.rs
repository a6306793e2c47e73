//! Option creation orchestration.
//!
//! Coordinates one `create_option` invocation end to end: wallet check,
//! input validation, transaction build, wallet signature, ledger submission.
//! The whole chain is observable through a single tagged-union state machine
//! (`Idle → InFlight → Failed | Succeeded`), so a pending indicator, an error
//! message, and a success confirmation can never be shown at once.

use crate::config::{LedgerConfig, OrchestratorConfig};
use crate::error::CreateOptionError;
use crate::ledger::builder::{TransactionBuilder, WriteOptionRequest};
use crate::ledger::signing::{SignerProvider, SigningGateway};
use crate::wallet::WalletSession;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Call or put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    pub fn is_call(&self) -> bool {
        matches!(self, OptionType::Call)
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionType::Call => write!(f, "call"),
            OptionType::Put => write!(f, "put"),
        }
    }
}

/// Raw option terms as captured from the form, consumed once per submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionRequest {
    /// Identifier of the underlying asset
    pub token_id: String,
    /// Quantity of underlying
    pub amount: String,
    /// Price paid by the buyer (empty means zero)
    pub premium: String,
    /// Strike price
    pub strike: String,
    /// Expiry date, YYYY-MM-DD
    pub expiry: String,
    pub option_type: OptionType,
}

/// Validated, typed option terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionTerms {
    pub token_id: String,
    pub amount: Decimal,
    pub premium: Decimal,
    pub strike: Decimal,
    pub expiry: NaiveDate,
    pub option_type: OptionType,
}

impl OptionRequest {
    /// Check the submission invariant and parse into typed terms.
    ///
    /// Field presence is checked before any parsing so a half-filled form
    /// always reads as "fill out all fields" rather than a parse error.
    pub fn validate(&self) -> Result<OptionTerms, String> {
        if self.token_id.trim().is_empty()
            || self.amount.trim().is_empty()
            || self.strike.trim().is_empty()
            || self.expiry.trim().is_empty()
        {
            return Err("Please fill out all fields.".to_string());
        }

        let amount = Decimal::from_str(self.amount.trim())
            .ok()
            .filter(|a| *a > Decimal::ZERO)
            .ok_or_else(|| "Amount must be a positive number.".to_string())?;

        let strike = Decimal::from_str(self.strike.trim())
            .ok()
            .filter(|s| *s > Decimal::ZERO)
            .ok_or_else(|| "Strike price must be a positive number.".to_string())?;

        let premium = if self.premium.trim().is_empty() {
            Decimal::ZERO
        } else {
            Decimal::from_str(self.premium.trim())
                .ok()
                .filter(|p| *p >= Decimal::ZERO)
                .ok_or_else(|| "Premium must be a non-negative number.".to_string())?
        };

        let expiry = NaiveDate::parse_from_str(self.expiry.trim(), "%Y-%m-%d")
            .map_err(|_| "Expiry must be a valid date (YYYY-MM-DD).".to_string())?;

        Ok(OptionTerms {
            token_id: self.token_id.trim().to_string(),
            amount,
            premium,
            strike,
            expiry,
            option_type: self.option_type,
        })
    }
}

/// What the user sees after a fully confirmed creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuccessSummary {
    pub token_id: String,
    pub amount: Decimal,
    pub strike: Decimal,
    pub premium: Decimal,
    pub expiry: NaiveDate,
    pub option_type: OptionType,
    pub writer_nft_serial: i64,
    /// Terminal ledger status of the mint transaction
    pub status: String,
}

impl SuccessSummary {
    /// Confirmation message echoing the submitted terms verbatim.
    pub fn message(&self) -> String {
        format!(
            "You have created an {} option for {} for {} with strike price of {} \
             with a premium of {} that expires on {}. View this NFT in your wallet.",
            self.option_type,
            self.token_id,
            self.amount,
            self.strike,
            self.premium,
            self.expiry.format("%Y-%m-%d"),
        )
    }
}

/// Observable state of one orchestrator.
///
/// Linear: `Idle → InFlight → Failed | Succeeded`, with terminal states
/// returning to `Idle` only through [`OptionOrchestrator::reset`]. A
/// `Succeeded` state also signals that local form input should be cleared.
#[derive(Debug, Clone, PartialEq)]
pub enum CreationState {
    Idle,
    InFlight,
    Failed(String),
    Succeeded(SuccessSummary),
}

/// Drives the option creation workflow.
pub struct OptionOrchestrator {
    builder: Arc<dyn TransactionBuilder>,
    signers: Arc<dyn SignerProvider>,
    gateway: SigningGateway,
    network: String,
    escrow_account: String,
    enforce_future_expiry: bool,
    state: watch::Sender<CreationState>,
}

impl OptionOrchestrator {
    pub fn new(
        builder: Arc<dyn TransactionBuilder>,
        signers: Arc<dyn SignerProvider>,
        ledger: &LedgerConfig,
        orchestrator: &OrchestratorConfig,
    ) -> Self {
        let (state, _) = watch::channel(CreationState::Idle);
        Self {
            builder,
            signers,
            gateway: SigningGateway::new(Duration::from_secs(ledger.signature_timeout_secs)),
            network: ledger.network.clone(),
            escrow_account: ledger.escrow_account.clone(),
            enforce_future_expiry: orchestrator.enforce_future_expiry,
            state,
        }
    }

    /// Watch the creation state machine (for rendering pending/error/success).
    pub fn subscribe(&self) -> watch::Receiver<CreationState> {
        self.state.subscribe()
    }

    /// Explicit user action returning a terminal state to `Idle`.
    ///
    /// Ignored while a creation is in flight.
    pub fn reset(&self) {
        if !matches!(*self.state.borrow(), CreationState::InFlight) {
            self.state.send_replace(CreationState::Idle);
        }
    }

    /// Create a covered option for `account_id`.
    ///
    /// Preconditions are checked in order and short-circuit before any
    /// collaborator is contacted: active wallet session first, then the
    /// request invariant. Build failures are safe to retry (nothing was
    /// signed); sign/submit failures are not, since the transaction may
    /// have partially executed.
    pub async fn create_option(
        &self,
        account_id: &str,
        session: &WalletSession,
        request: OptionRequest,
    ) -> Result<SuccessSummary, CreateOptionError> {
        // Check-and-set under the channel's lock so two tasks can never both
        // claim the in-flight slot.
        let claimed = self.state.send_if_modified(|state| {
            if matches!(state, CreationState::InFlight) {
                false
            } else {
                *state = CreationState::InFlight;
                true
            }
        });
        if !claimed {
            return Err(CreateOptionError::AlreadyInFlight);
        }

        let result = self.run(account_id, session, request).await;
        match &result {
            Ok(summary) => {
                self.state
                    .send_replace(CreationState::Succeeded(summary.clone()));
            }
            Err(err) => {
                warn!(account_id, error = %err, "Option creation failed");
                self.state
                    .send_replace(CreationState::Failed(err.user_message()));
            }
        }
        result
    }

    async fn run(
        &self,
        account_id: &str,
        session: &WalletSession,
        request: OptionRequest,
    ) -> Result<SuccessSummary, CreateOptionError> {
        if !session.is_connected() {
            return Err(CreateOptionError::WalletNotConnected);
        }

        let terms = request.validate().map_err(CreateOptionError::InvalidInput)?;

        if self.enforce_future_expiry && terms.expiry <= Utc::now().date_naive() {
            return Err(CreateOptionError::InvalidInput(
                "The expiry date must be in the future.".to_string(),
            ));
        }

        info!(
            account_id,
            token_id = %terms.token_id,
            option_type = %terms.option_type,
            "Creating covered option"
        );

        let unsigned = self
            .builder
            .write_option(&WriteOptionRequest {
                account_id: account_id.to_string(),
                token_id: terms.token_id.clone(),
                amount: terms.amount,
                strike: terms.strike,
                is_call: terms.option_type.is_call(),
                premium: terms.premium,
                expiry: terms.expiry.format("%Y-%m-%d").to_string(),
                escrow_account: self.escrow_account.clone(),
            })
            .await
            .map_err(CreateOptionError::BuildFailed)?;

        let context = session
            .signer_context(&self.network, account_id)
            .ok_or(CreateOptionError::WalletNotConnected)?;
        let signer = self.signers.signer(context);

        let receipt = self
            .gateway
            .sign_and_submit(&unsigned, signer.as_ref())
            .await?;

        info!(
            account_id,
            writer_nft_serial = unsigned.writer_nft_serial,
            status = %receipt.status,
            "Covered option created"
        );

        Ok(SuccessSummary {
            token_id: terms.token_id,
            amount: terms.amount,
            strike: terms.strike,
            premium: terms.premium,
            expiry: terms.expiry,
            option_type: terms.option_type,
            writer_nft_serial: unsigned.writer_nft_serial,
            status: receipt.status,
        })
    }
}
