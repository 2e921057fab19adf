//! Generic CRUD + search routes, mounted once per entity kind.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tracing::debug;

use storefront_core::{Entity, EntityId, UserId};
use storefront_infra::sync::SyncError;

use crate::app::services::Synchronizer;
use crate::app::{dto, errors};

type SyncState<E> = State<Arc<Synchronizer<E>>>;

/// Routes for `E`, relative to `/api`:
///
/// - `POST /{resource}`, `PUT /{resource}`, `GET /{resource}[?user_id=N]`
/// - `GET /{resource}/:id`, `DELETE /{resource}/:id`
/// - `GET /_search/{resource}?query=...`
pub fn router<E: Entity>(sync: Arc<Synchronizer<E>>) -> Router {
    Router::new()
        .route(
            &format!("/{}", E::RESOURCE),
            post(create::<E>).put(update::<E>).get(list::<E>),
        )
        .route(
            &format!("/{}/:id", E::RESOURCE),
            get(get_one::<E>).delete(delete::<E>),
        )
        .route(&format!("/_search/{}", E::RESOURCE), get(search::<E>))
        .with_state(sync)
}

fn bad_body<E: Entity>(rejection: JsonRejection) -> axum::response::Response {
    errors::json_error(
        StatusCode::BAD_REQUEST,
        "invalid_body",
        rejection.body_text(),
        E::KIND,
    )
}

fn parse_id<E: Entity>(raw: &str) -> Result<EntityId, axum::response::Response> {
    raw.parse::<EntityId>()
        .map_err(|e| errors::sync_error_to_response(E::KIND, SyncError::from(e)))
}

pub async fn create<E: Entity>(
    State(sync): SyncState<E>,
    body: Result<Json<E>, JsonRejection>,
) -> axum::response::Response {
    let Json(candidate) = match body {
        Ok(b) => b,
        Err(rejection) => return bad_body::<E>(rejection),
    };
    debug!(kind = E::KIND, ?candidate, "REST request to save");

    let created = match sync.create(candidate).await {
        Ok(c) => c,
        Err(e) => return errors::sync_error_to_response(E::KIND, e),
    };
    let Some(id) = created.id() else {
        return errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            "created record has no identity",
            E::KIND,
        );
    };

    let mut headers = dto::alert_headers(E::KIND, "created", id);
    if let Ok(location) = HeaderValue::from_str(&format!("/api/{}/{id}", E::RESOURCE)) {
        headers.insert(header::LOCATION, location);
    }
    (StatusCode::CREATED, headers, Json(created)).into_response()
}

pub async fn update<E: Entity>(
    State(sync): SyncState<E>,
    body: Result<Json<E>, JsonRejection>,
) -> axum::response::Response {
    let Json(candidate) = match body {
        Ok(b) => b,
        Err(rejection) => return bad_body::<E>(rejection),
    };
    debug!(kind = E::KIND, ?candidate, "REST request to update");

    match sync.update(candidate).await {
        Ok(updated) => {
            let headers = updated
                .id()
                .map(|id| dto::alert_headers(E::KIND, "updated", id))
                .unwrap_or_default();
            (StatusCode::OK, headers, Json(updated)).into_response()
        }
        Err(e) => errors::sync_error_to_response(E::KIND, e),
    }
}

pub async fn list<E: Entity>(
    State(sync): SyncState<E>,
    params: Result<Query<dto::ListParams>, QueryRejection>,
) -> axum::response::Response {
    let Query(params) = match params {
        Ok(p) => p,
        Err(rejection) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_query",
                rejection.body_text(),
                E::KIND,
            );
        }
    };
    debug!(kind = E::KIND, user_id = ?params.user_id, "REST request to get all");

    let result = match params.user_id {
        Some(user) => sync.list_by_owner(UserId::new(user)).await,
        None => sync.list_all().await,
    };
    match result {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(e) => errors::sync_error_to_response(E::KIND, e),
    }
}

pub async fn get_one<E: Entity>(
    State(sync): SyncState<E>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id::<E>(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    debug!(kind = E::KIND, %id, "REST request to get");

    match sync.get(id).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(e) => errors::sync_error_to_response(E::KIND, e),
    }
}

pub async fn delete<E: Entity>(
    State(sync): SyncState<E>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id::<E>(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    debug!(kind = E::KIND, %id, "REST request to delete");

    match sync.delete(id).await {
        Ok(()) => (
            StatusCode::NO_CONTENT,
            dto::alert_headers(E::KIND, "deleted", id),
        )
            .into_response(),
        Err(e) => errors::sync_error_to_response(E::KIND, e),
    }
}

pub async fn search<E: Entity>(
    State(sync): SyncState<E>,
    Query(params): Query<dto::SearchParams>,
) -> axum::response::Response {
    let query = params.text();
    debug!(kind = E::KIND, query, "REST request to search");

    match sync.search(query).await {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(e) => errors::sync_error_to_response(E::KIND, e),
    }
}
