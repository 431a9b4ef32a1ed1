//! HTTP surface.
//!
//! - `POST /ingest` – Ingest the configured documents directory. Accepts an optional
//!   `{ "deleteIndex": true }` body and returns the run summary.
//! - `POST /reply` – Answer a question. Validation failures map to `400`, other failures to
//!   `500`; the body is `{ "error": kind, "message": text }`.
//! - `GET /metrics` – Ingestion counters since startup.

use crate::ingestion::{IngestionError, IngestionSummary};
use crate::metrics::MetricsSnapshot;
use crate::reply::{ReplyError, ReplyRequest, ReplyResponse};
use crate::service::RagApi;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Build the HTTP router.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: RagApi + 'static,
{
    Router::new()
        .route("/ingest", post(ingest::<S>))
        .route("/reply", post(reply::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .with_state(service)
}

/// Request body for `POST /ingest`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngestRequest {
    #[serde(default)]
    delete_index: bool,
}

async fn ingest<S>(
    State(service): State<Arc<S>>,
    body: Option<Json<IngestRequest>>,
) -> Result<Json<IngestionSummary>, AppError>
where
    S: RagApi,
{
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let summary = service.ingest(request.delete_index).await?;
    tracing::info!(
        files = summary.files.len(),
        failures = summary.failures.len(),
        chunks_indexed = summary.chunks_indexed(),
        "Ingest request completed"
    );
    Ok(Json(summary))
}

async fn reply<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<ReplyRequest>,
) -> Result<Json<ReplyResponse>, AppError>
where
    S: RagApi,
{
    Ok(Json(service.reply(request).await?))
}

async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: RagApi,
{
    Json(service.metrics_snapshot())
}

enum AppError {
    Ingestion(IngestionError),
    Reply(ReplyError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            Self::Ingestion(error) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INGESTION_ERROR",
                error.to_string(),
            ),
            Self::Reply(error) => {
                let status = error.status_code();
                if status.is_server_error() {
                    tracing::error!(error = %error, "Reply failed");
                } else {
                    tracing::debug!(error = %error, "Reply rejected");
                }
                (status, error.kind(), error.to_string())
            }
        };
        (status, Json(json!({ "error": kind, "message": message }))).into_response()
    }
}

impl From<IngestionError> for AppError {
    fn from(inner: IngestionError) -> Self {
        Self::Ingestion(inner)
    }
}

impl From<ReplyError> for AppError {
    fn from(inner: ReplyError) -> Self {
        Self::Reply(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::create_router;
    use crate::ingestion::{IngestionError, IngestionSummary};
    use crate::metrics::MetricsSnapshot;
    use crate::reply::{ReplyError, ReplyRequest, ReplyResponse};
    use crate::service::RagApi;
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Default)]
    struct StubService {
        ingest_calls: Mutex<Vec<bool>>,
        reply_calls: Mutex<Vec<ReplyRequest>>,
    }

    #[async_trait]
    impl RagApi for StubService {
        async fn ingest(&self, delete_index: bool) -> Result<IngestionSummary, IngestionError> {
            self.ingest_calls.lock().await.push(delete_index);
            Ok(IngestionSummary {
                skipped_entries: 2,
                ..IngestionSummary::default()
            })
        }

        async fn reply(&self, request: ReplyRequest) -> Result<ReplyResponse, ReplyError> {
            let rejected = request.user_id.is_none();
            self.reply_calls.lock().await.push(request);
            if rejected {
                return Err(ReplyError::InvalidRequest("No userId sent".into()));
            }
            Ok(ReplyResponse {
                answer: "Heat pumps move heat.".into(),
                standalone_question: "How do heat pumps work?".into(),
                sources: Vec::new(),
            })
        }

        fn metrics_snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot {
                files_ingested: 3,
                files_failed: 1,
                chunks_indexed: 42,
                batches_abandoned: 0,
            }
        }
    }

    async fn send(
        service: Arc<StubService>,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                request = request.header("content-type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = create_router(service)
            .oneshot(request.body(body).expect("request"))
            .await
            .expect("router response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[tokio::test]
    async fn ingest_accepts_empty_body() {
        let service = Arc::new(StubService::default());
        let (status, body) = send(service.clone(), Method::POST, "/ingest", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["skipped_entries"], 2);
        assert_eq!(*service.ingest_calls.lock().await, vec![false]);
    }

    #[tokio::test]
    async fn ingest_forwards_delete_flag() {
        let service = Arc::new(StubService::default());
        let (status, _) = send(
            service.clone(),
            Method::POST,
            "/ingest",
            Some(json!({ "deleteIndex": true })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(*service.ingest_calls.lock().await, vec![true]);
    }

    #[tokio::test]
    async fn reply_returns_answer() {
        let service = Arc::new(StubService::default());
        let (status, body) = send(
            service.clone(),
            Method::POST,
            "/reply",
            Some(json!({
                "consentAccepted": true,
                "userId": "u1",
                "sessionId": "s1",
                "query": "how do heat pumps work"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "Heat pumps move heat.");
        assert_eq!(body["standaloneQuestion"], "How do heat pumps work?");
        let calls = service.reply_calls.lock().await;
        assert_eq!(calls[0].session_id.as_deref(), Some("s1"));
    }

    #[tokio::test]
    async fn reply_errors_map_to_status_and_body() {
        let service = Arc::new(StubService::default());
        let (status, body) = send(
            service,
            Method::POST,
            "/reply",
            Some(json!({ "consentAccepted": true })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "REQUEST_ERROR");
        assert_eq!(body["message"], "No userId sent");
    }

    #[tokio::test]
    async fn metrics_returns_snapshot() {
        let service = Arc::new(StubService::default());
        let (status, body) = send(service, Method::GET, "/metrics", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["filesIngested"], 3);
        assert_eq!(body["chunksIndexed"], 42);
    }
}
