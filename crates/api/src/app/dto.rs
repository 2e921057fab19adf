use axum::http::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use storefront_core::EntityId;
use storefront_infra::sync::{ReconcileReport, RetryQueueStats};

/// Header carrying the alert key of a successful write, e.g. `storefront.cart.created`.
pub const ALERT_HEADER: &str = "x-storefront-alert";
/// Header carrying the identity the alert refers to.
pub const PARAMS_HEADER: &str = "x-storefront-params";

// -------------------------
// Request DTOs
// -------------------------

/// Query string of `GET /api/{resource}`.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub user_id: Option<i64>,
}

/// Query string of `GET /api/_search/{resource}`.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
}

impl SearchParams {
    /// Query text; an absent or blank query matches everything.
    pub fn text(&self) -> &str {
        match self.query.as_deref().map(str::trim) {
            Some(q) if !q.is_empty() => q,
            _ => "*",
        }
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct IndexSyncStatus {
    pub kind: &'static str,
    #[serde(flatten)]
    pub stats: RetryQueueStats,
}

#[derive(Debug, Serialize)]
pub struct ReindexFailure {
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug, Default, Serialize)]
pub struct ReindexResponse {
    pub reports: Vec<ReconcileReport>,
    pub errors: Vec<ReindexFailure>,
}

/// Alert headers for a successful write of `kind`.
pub fn alert_headers(kind: &str, action: &str, id: EntityId) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(v) = HeaderValue::from_str(&format!("storefront.{kind}.{action}")) {
        headers.insert(ALERT_HEADER, v);
    }
    headers.insert(PARAMS_HEADER, HeaderValue::from(id.get()));
    headers
}
