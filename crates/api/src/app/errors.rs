use axum::http::{HeaderValue, StatusCode};
use axum::response::IntoResponse;
use serde_json::json;
use tracing::error;

use storefront_infra::record_store::RecordStoreError;
use storefront_infra::sync::SyncError;

/// Header naming the reason a request was rejected, e.g. `error.idexists`.
pub const ERROR_HEADER: &str = "x-storefront-error";

pub fn sync_error_to_response(entity: &'static str, err: SyncError) -> axum::response::Response {
    match err {
        SyncError::InvalidArgument { key, message } => {
            json_error(StatusCode::BAD_REQUEST, key, message, entity)
        }
        SyncError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg, entity)
        }
        SyncError::NotFound { kind, id } => json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("{kind} {id} not found"),
            entity,
        ),
        SyncError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg, entity),
        SyncError::RecordStore(RecordStoreError::Unavailable(msg)) => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "store_unavailable",
            msg,
            entity,
        ),
        SyncError::RecordStore(e) => {
            error!(entity, error = %e, "record store failure");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_error",
                e.to_string(),
                entity,
            )
        }
        SyncError::SearchUnavailable(msg) => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "search_unavailable",
            msg,
            entity,
        ),
    }
}

/// Error body `{"error", "message", "entity"}`. 400s also carry [`ERROR_HEADER`].
pub fn json_error(
    status: StatusCode,
    code: &str,
    message: impl Into<String>,
    entity: &str,
) -> axum::response::Response {
    let mut response = (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
            "entity": entity,
        })),
    )
        .into_response();

    if status == StatusCode::BAD_REQUEST {
        if let Ok(value) = HeaderValue::from_str(&format!("error.{code}")) {
            response.headers_mut().insert(ERROR_HEADER, value);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use storefront_core::EntityId;

    use super::*;

    #[test]
    fn identity_errors_are_bad_requests_with_reason_header() {
        let response = sync_error_to_response("shippingAddress", SyncError::id_exists("shippingAddress"));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[ERROR_HEADER], "error.idexists");
    }

    #[test]
    fn status_mapping() {
        let cases = [
            (SyncError::not_found("cart", EntityId::new(1)), StatusCode::NOT_FOUND),
            (SyncError::Conflict("dup".into()), StatusCode::CONFLICT),
            (SyncError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (
                SyncError::RecordStore(RecordStoreError::Unavailable("down".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                SyncError::RecordStore(RecordStoreError::Storage("broken".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (SyncError::SearchUnavailable("down".into()), StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (err, status) in cases {
            let response = sync_error_to_response("cart", err);
            assert_eq!(response.status(), status);
            assert_eq!(
                response.headers().contains_key(ERROR_HEADER),
                status == StatusCode::BAD_REQUEST
            );
        }
    }
}
