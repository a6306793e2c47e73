//! Configuration management for the covered option engine.
//!
//! Loads settings from environment variables and config files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Ledger and builder-service settings
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Option store settings
    #[serde(default)]
    pub store: StoreConfig,
    /// Expiry sweep settings
    #[serde(default)]
    pub sweep: SweepConfig,
    /// Creation orchestration settings
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Named ledger network the signer is scoped to (e.g., "testnet")
    #[serde(default = "default_network")]
    pub network: String,
    /// Base URL of the backend service that builds and wipes option transactions
    #[serde(default = "default_builder_url")]
    pub builder_url: String,
    /// Base URL of the wallet relay used to obtain signatures
    #[serde(default = "default_relay_url")]
    pub relay_url: String,
    /// Ledger account holding writer collateral until settlement or expiry
    #[serde(default)]
    pub escrow_account: String,
    /// How long to wait for an out-of-process wallet approval
    #[serde(default = "default_signature_timeout")]
    pub signature_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Table holding option records
    #[serde(default = "default_table")]
    pub table: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Seconds between scheduled sweeps in serve mode
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,
    /// Listen address for the sweep trigger endpoint
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Reject option requests whose expiry date is not strictly in the
    /// future. Disable to preserve the legacy permissive behavior.
    #[serde(default = "default_enforce_future_expiry")]
    pub enforce_future_expiry: bool,
}

// Default value functions
fn default_network() -> String {
    "testnet".to_string()
}

fn default_builder_url() -> String {
    "http://localhost:3001".to_string()
}

fn default_relay_url() -> String {
    "http://localhost:3002".to_string()
}

fn default_signature_timeout() -> u64 {
    120
}

fn default_db_path() -> String {
    "data/options.db".to_string()
}

fn default_table() -> String {
    "options".to_string()
}

fn default_sweep_interval() -> u64 {
    3600
}

fn default_listen_addr() -> String {
    "0.0.0.0:8787".to_string()
}

fn default_enforce_future_expiry() -> bool {
    true
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::default().separator("__").prefix("COV"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.ledger.network.is_empty(), "ledger network must be set");

        anyhow::ensure!(
            self.ledger.signature_timeout_secs > 0,
            "signature_timeout_secs must be positive"
        );

        anyhow::ensure!(
            self.sweep.interval_secs > 0,
            "sweep interval_secs must be positive"
        );

        // The table name is interpolated into SQL statements and cannot be
        // bound as a parameter.
        anyhow::ensure!(
            !self.store.table.is_empty()
                && self
                    .store
                    .table
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_'),
            "store table must be a simple identifier"
        );

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ledger: LedgerConfig::default(),
            store: StoreConfig::default(),
            sweep: SweepConfig::default(),
            orchestrator: OrchestratorConfig::default(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            builder_url: default_builder_url(),
            relay_url: default_relay_url(),
            escrow_account: String::new(),
            signature_timeout_secs: default_signature_timeout(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            table: default_table(),
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sweep_interval(),
            listen_addr: default_listen_addr(),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            enforce_future_expiry: default_enforce_future_expiry(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_unsafe_table_name() {
        let mut config = Config::default();
        config.store.table = "options; DROP TABLE options".to_string();
        assert!(config.validate().is_err());
    }
}
