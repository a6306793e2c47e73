//! # Covered Options
//!
//! Lifecycle engine for tokenized covered options: orchestrates the
//! multi-step creation of an option NFT (validate → build → sign → submit)
//! and periodically sweeps expired option records (scan → settle → purge).
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `wallet`: Wallet session capability and signer scoping
//! - `ledger`: Transaction builder, signing gateway, and settlement boundaries
//! - `orchestrator`: Option creation workflow and its state machine
//! - `store`: Option record persistence (SQLite)
//! - `sweeper`: Expiry reconciliation pass
//! - `server`: HTTP sweep trigger endpoint
//! - `error`: Closed error taxonomy shared across the crate

pub mod config;
pub mod error;
pub mod ledger;
pub mod orchestrator;
pub mod server;
pub mod store;
pub mod sweeper;
pub mod wallet;

pub use config::Config;
