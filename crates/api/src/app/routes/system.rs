use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use tracing::{info, warn};

use crate::app::dto::{IndexSyncStatus, ReindexFailure, ReindexResponse};
use crate::app::services::AppServices;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Retry queue stats for every kind.
pub async fn index_sync(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    let kinds: Vec<IndexSyncStatus> = services
        .sync_targets()
        .iter()
        .map(|t| IndexSyncStatus {
            kind: t.kind(),
            stats: t.retry_stats(),
        })
        .collect();
    Json(serde_json::json!({ "kinds": kinds }))
}

/// Reconcile every kind's index with its record store.
pub async fn reindex(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    info!("REST request to reindex all kinds");

    let mut body = ReindexResponse::default();
    for target in services.sync_targets() {
        match target.reconcile().await {
            Ok(report) => body.reports.push(report),
            Err(err) => {
                warn!(kind = target.kind(), error = %err, "reindex failed");
                body.errors.push(ReindexFailure {
                    kind: target.kind(),
                    message: err.to_string(),
                });
            }
        }
    }

    let status = if body.errors.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body)).into_response()
}
