//! Request bodies and response decoding for the Elasticsearch adapter.
//!
//! Searches are paged with `search_after` over the `id` sort, so result sets
//! are not capped by the cluster's `max_result_window`.

use std::future::Future;

use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use storefront_core::EntityId;

use crate::search_index::SearchIndexError;

/// Hits fetched per request.
pub const PAGE_SIZE: usize = 1_000;

pub fn index_name(prefix: &str, kind: &str) -> String {
    format!("{}-{}", prefix, kind).to_lowercase()
}

/// Body of a search request for `query` (empty or `*` means all documents).
pub fn search_body(query: &str) -> Value {
    let query = query.trim();
    let clause = if query.is_empty() || query == "*" {
        json!({ "match_all": {} })
    } else {
        json!({ "query_string": { "query": query, "default_operator": "OR" } })
    };
    json!({ "query": clause })
}

/// Body of a request listing every document id without sources.
pub fn ids_body() -> Value {
    json!({
        "query": { "match_all": {} },
        "_source": false
    })
}

/// `base` restricted to one page of `size` hits following `after`.
pub fn page_body(base: &Value, size: usize, after: Option<i64>) -> Value {
    let mut body = base.clone();
    body["size"] = json!(size);
    body["sort"] = json!([{ "id": { "order": "asc", "unmapped_type": "long" } }]);
    if let Some(after) = after {
        body["search_after"] = json!([after]);
    }
    body
}

fn hits(body: &Value) -> Result<&Vec<Value>, SearchIndexError> {
    body.pointer("/hits/hits")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchIndexError::Index("search response has no hits array".to_string()))
}

/// Sort value of a hit, used as the cursor for the next page.
fn cursor(hit: &Value) -> Result<i64, SearchIndexError> {
    hit.pointer("/sort/0")
        .and_then(Value::as_i64)
        .ok_or_else(|| SearchIndexError::Index("search hit has no id sort value".to_string()))
}

/// Fetch every page of `base`, `size` hits at a time, decoding each with
/// `decode`. `fetch` returns `None` when the index does not exist.
pub async fn paginate<T, F, Fut>(
    base: Value,
    size: usize,
    mut fetch: F,
    decode: fn(&[Value]) -> Result<Vec<T>, SearchIndexError>,
) -> Result<Vec<T>, SearchIndexError>
where
    F: FnMut(Value) -> Fut,
    Fut: Future<Output = Result<Option<Value>, SearchIndexError>>,
{
    let mut out = Vec::new();
    let mut after = None;
    loop {
        let Some(body) = fetch(page_body(&base, size, after)).await? else {
            return Ok(out);
        };
        let page = hits(&body)?;
        out.extend(decode(page)?);
        match page.last() {
            Some(last) if page.len() >= size => after = Some(cursor(last)?),
            _ => return Ok(out),
        }
    }
}

pub fn decode_hits<E: DeserializeOwned>(hits: &[Value]) -> Result<Vec<E>, SearchIndexError> {
    hits.iter()
        .map(|hit| {
            let source = hit
                .get("_source")
                .cloned()
                .ok_or_else(|| SearchIndexError::Index("search hit has no _source".to_string()))?;
            serde_json::from_value(source)
                .map_err(|e| SearchIndexError::Index(format!("failed to decode search hit: {e}")))
        })
        .collect()
}

pub fn decode_ids(hits: &[Value]) -> Result<Vec<EntityId>, SearchIndexError> {
    hits.iter()
        .map(|hit| {
            hit.get("_id")
                .and_then(Value::as_str)
                .ok_or_else(|| SearchIndexError::Index("search hit has no _id".to_string()))?
                .parse::<EntityId>()
                .map_err(|e| SearchIndexError::Index(e.to_string()))
        })
        .collect()
}

/// Whether an error response body says the index does not exist yet.
pub fn is_index_missing(body: &str) -> bool {
    body.contains("index_not_found_exception")
}
