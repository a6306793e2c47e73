//! HTTP trigger for on-demand sweeps.
//!
//! Only `POST /sweep` runs a sweep. `OPTIONS` is acknowledged for preflight
//! and every other method is refused with a structured 405 before the store
//! is ever touched. Cross-origin negotiation beyond the preflight
//! acknowledgement is the gateway's concern; the response bodies here are
//! the contract.

use crate::error::SweepFailureCause;
use crate::sweeper::{ExpirySweeper, SweepReport};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Structured response body for every sweep-trigger outcome.
#[derive(Debug, Clone, Serialize)]
pub struct SweepResponse {
    pub status: u16,
    pub message: String,
    pub detail: String,
}

impl SweepResponse {
    fn new(status: StatusCode, message: &str, detail: String) -> (StatusCode, Json<Self>) {
        (
            status,
            Json(Self {
                status: status.as_u16(),
                message: message.to_string(),
                detail,
            }),
        )
    }
}

/// Build the sweep-trigger router.
pub fn router(sweeper: Arc<ExpirySweeper>) -> Router {
    Router::new()
        .route(
            "/sweep",
            post(trigger_sweep)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .with_state(sweeper)
}

async fn trigger_sweep(
    State(sweeper): State<Arc<ExpirySweeper>>,
) -> (StatusCode, Json<SweepResponse>) {
    info!("Sweep triggered over HTTP");
    match sweeper.run_sweep(Utc::now()).await {
        Err(err) => SweepResponse::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to fetch items from the option store.",
            err.to_string(),
        ),
        Ok(report) if report.is_clean() => SweepResponse::new(
            StatusCode::OK,
            "OK",
            "Expired NFTs deleted.".to_string(),
        ),
        Ok(report) => failure_response(&report),
    }
}

/// Reports the first failing stage in sequence order, matching the staged
/// handling the sweep itself performs: a settlement failure anywhere in the
/// batch outranks a purge anomaly. The full breakdown is in the logs.
fn failure_response(report: &SweepReport) -> (StatusCode, Json<SweepResponse>) {
    let first = report
        .failed
        .iter()
        .find(|f| matches!(f.cause, SweepFailureCause::Settlement(_)))
        .unwrap_or(&report.failed[0]);
    let (message, detail) = match &first.cause {
        SweepFailureCause::Settlement(cause) => {
            ("Failed to wipe expired NFTs on-chain.", cause.to_string())
        }
        SweepFailureCause::PurgeAfterSettleFailed(cause) => (
            "Failed to delete expired NFTs from the store.",
            cause.to_string(),
        ),
    };
    SweepResponse::new(StatusCode::INTERNAL_SERVER_ERROR, message, detail)
}

async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn method_not_allowed() -> (StatusCode, Json<SweepResponse>) {
    SweepResponse::new(
        StatusCode::METHOD_NOT_ALLOWED,
        "Method Not Allowed",
        "POST method is required.".to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::ledger::mock::MockSettler;
    use crate::store::{MemoryOptionStore, MockOptionStore, OptionRecord, OptionStore};
    use anyhow::anyhow;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::{DateTime, Utc};
    use tower::ServiceExt;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn seeded_router() -> (Arc<MemoryOptionStore>, Router) {
        let store = Arc::new(MemoryOptionStore::new());
        store
            .put(&OptionRecord::new("opt-1", ts("2020-01-01T00:00:00Z")))
            .unwrap();
        store
            .put(&OptionRecord::new("opt-2", ts("2999-01-01T00:00:00Z")))
            .unwrap();

        let sweeper = Arc::new(ExpirySweeper::new(
            store.clone(),
            Arc::new(MockSettler::new()),
        ));
        (store, router(sweeper))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_post_runs_sweep_and_reports_ok() {
        let (store, app) = seeded_router();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/sweep")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["message"], "OK");
        assert_eq!(body["detail"], "Expired NFTs deleted.");

        let remaining = store.list().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].pk, "opt-2");
    }

    #[tokio::test]
    async fn test_get_is_refused_without_touching_the_store() {
        let mut store = MockOptionStore::new();
        store.expect_scan_expired().never();
        store.expect_delete().never();

        let sweeper = Arc::new(ExpirySweeper::new(
            Arc::new(store),
            Arc::new(MockSettler::new()),
        ));
        let app = router(sweeper);

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/sweep")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let body = body_json(response).await;
        assert_eq!(body["detail"], "POST method is required.");
    }

    #[tokio::test]
    async fn test_options_preflight_is_acknowledged() {
        let (_store, app) = seeded_router();

        let response = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/sweep")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_settlement_failure_reports_the_wipe_stage() {
        let store = Arc::new(MemoryOptionStore::new());
        store
            .put(&OptionRecord::new("opt-1", ts("2020-01-01T00:00:00Z")))
            .unwrap();

        let sweeper = Arc::new(ExpirySweeper::new(
            store,
            Arc::new(MockSettler::failing_for(["opt-1"])),
        ));
        let app = router(sweeper);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/sweep")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Failed to wipe expired NFTs on-chain.");
    }

    #[tokio::test]
    async fn test_mixed_failures_report_the_wipe_stage_first() {
        // opt-1 settles but cannot be purged; opt-2 fails settlement. The
        // wipe stage comes first in the sweep sequence, so its message wins
        // even though the purge anomaly happened on an earlier record.
        let mut store = MockOptionStore::new();
        store
            .expect_scan_expired()
            .returning(|_| Ok(vec!["opt-1".to_string(), "opt-2".to_string()]));
        store
            .expect_delete()
            .returning(|_| Err(StoreError::DeleteFailed(anyhow!("io error"))));

        let sweeper = Arc::new(ExpirySweeper::new(
            Arc::new(store),
            Arc::new(MockSettler::failing_for(["opt-2"])),
        ));
        let app = router(sweeper);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/sweep")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Failed to wipe expired NFTs on-chain.");
    }
}
