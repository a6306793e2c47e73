//! Transaction builder client.
//!
//! The backend service constructs the unsigned option-mint transaction
//! (collateral transfer to escrow plus NFT mint) from the option terms.
//! This module only consumes that boundary.

use super::UnsignedOptionTransaction;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Terms sent to the builder service, mirroring its `writeOption` route.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteOptionRequest {
    pub account_id: String,
    pub token_id: String,
    pub amount: Decimal,
    pub strike: Decimal,
    pub is_call: bool,
    pub premium: Decimal,
    /// Expiry date in YYYY-MM-DD form
    pub expiry: String,
    /// Escrow account that will hold the writer's collateral
    pub escrow_account: String,
}

/// Builds an unsigned option transaction from option terms.
///
/// Implemented externally; a build failure means nothing was signed or
/// submitted, so the caller may retry safely.
#[async_trait]
pub trait TransactionBuilder: Send + Sync {
    async fn write_option(&self, request: &WriteOptionRequest)
        -> Result<UnsignedOptionTransaction>;
}

/// HTTP client for the builder service.
pub struct HttpTransactionBuilder {
    http: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct WriteOptionResponse {
    data: WriteOptionData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WriteOptionData {
    signed_tx: String,
    metadata: String,
    writer_nft_serial: i64,
}

impl HttpTransactionBuilder {
    /// Create a new builder client for the given service base URL.
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl TransactionBuilder for HttpTransactionBuilder {
    #[instrument(skip(self, request), fields(token_id = %request.token_id))]
    async fn write_option(
        &self,
        request: &WriteOptionRequest,
    ) -> Result<UnsignedOptionTransaction> {
        let url = format!("{}/writeOption", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .context("Failed to reach the transaction builder service")?;

        let response = response
            .error_for_status()
            .context("Builder service rejected the option terms")?;

        let body: WriteOptionResponse = response
            .json()
            .await
            .context("Failed to parse builder service response")?;

        debug!(
            writer_nft_serial = body.data.writer_nft_serial,
            "Unsigned option transaction built"
        );

        Ok(UnsignedOptionTransaction {
            tx_bytes: body.data.signed_tx,
            metadata: body.data.metadata,
            writer_nft_serial: body.data.writer_nft_serial,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_request() -> WriteOptionRequest {
        WriteOptionRequest {
            account_id: "0.0.777".to_string(),
            token_id: "0.0.123".to_string(),
            amount: dec!(10),
            strike: dec!(5),
            is_call: true,
            premium: dec!(1),
            expiry: "2025-01-01".to_string(),
            escrow_account: "0.0.999".to_string(),
        }
    }

    #[tokio::test]
    async fn test_write_option_parses_builder_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/writeOption"))
            .and(body_partial_json(serde_json::json!({
                "accountId": "0.0.777",
                "tokenId": "0.0.123",
                "isCall": true,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {
                    "signedTx": "0a1b2c",
                    "metadata": "ipfs://option-meta",
                    "writerNftSerial": 42
                }
            })))
            .mount(&server)
            .await;

        let builder = HttpTransactionBuilder::new(&server.uri()).unwrap();
        let unsigned = builder.write_option(&sample_request()).await.unwrap();

        assert_eq!(unsigned.tx_bytes, "0a1b2c");
        assert_eq!(unsigned.metadata, "ipfs://option-meta");
        assert_eq!(unsigned.writer_nft_serial, 42);
    }

    #[tokio::test]
    async fn test_write_option_surfaces_server_rejection() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/writeOption"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let builder = HttpTransactionBuilder::new(&server.uri()).unwrap();
        let err = builder.write_option(&sample_request()).await.unwrap_err();

        assert!(err.to_string().contains("rejected"));
    }
}
