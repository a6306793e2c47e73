//! On-chain settlement of expired options.
//!
//! Settlement voids an expired option on-chain (burning the writer NFT and
//! releasing escrowed collateral) before its record may be purged from the
//! store. The trait is the seam: swap in a direct contract call if the
//! product lands on different wipe semantics.

use crate::error::SettlementError;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

/// Settles one expired option on-chain.
///
/// Contract: returns `Ok(())` only once the void is confirmed on-chain.
/// A record whose settlement failed must not be deleted from the store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OptionSettler: Send + Sync {
    async fn settle_on_chain(&self, id: &str) -> Result<(), SettlementError>;
}

/// Settler that voids options through the backend service's wipe route.
pub struct HttpSettler {
    http: Client,
    base_url: String,
}

impl HttpSettler {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl OptionSettler for HttpSettler {
    #[instrument(skip(self))]
    async fn settle_on_chain(&self, id: &str) -> Result<(), SettlementError> {
        let url = format!("{}/wipeOption", self.base_url);
        self.http
            .post(&url)
            .json(&serde_json::json!({ "optionId": id }))
            .send()
            .await
            .context("Failed to reach the settlement service")?
            .error_for_status()
            .context("Settlement service reported a wipe failure")?;

        debug!(%id, "Expired option voided on-chain");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_settle_posts_option_id_to_wipe_route() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/wipeOption"))
            .and(body_json(serde_json::json!({ "optionId": "opt-1" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let settler = HttpSettler::new(&server.uri()).unwrap();
        settler.settle_on_chain("opt-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_settle_failure_is_a_settlement_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/wipeOption"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let settler = HttpSettler::new(&server.uri()).unwrap();
        let err = settler.settle_on_chain("opt-1").await.unwrap_err();
        assert!(err.to_string().contains("settlement failed"));
    }
}
