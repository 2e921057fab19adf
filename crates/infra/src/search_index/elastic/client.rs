use std::marker::PhantomData;
use std::time::Duration;

use elasticsearch::http::Url;
use elasticsearch::http::response::Response;
use elasticsearch::http::transport::{SingleNodeConnectionPool, TransportBuilder};
use elasticsearch::{DeleteParts, Elasticsearch, IndexParts, SearchParts};
use serde_json::Value;
use tracing::instrument;

use storefront_core::{Entity, EntityId};

use super::wire;
use crate::search_index::r#trait::{SearchIndex, SearchIndexError, document_id};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Elasticsearch index for one entity kind.
pub struct ElasticsearchIndex<E> {
    client: Elasticsearch,
    index: String,
    _entity: PhantomData<fn() -> E>,
}

impl<E> std::fmt::Debug for ElasticsearchIndex<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticsearchIndex")
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl<E: Entity> ElasticsearchIndex<E> {
    /// Connect to a single node at `url`.
    pub fn connect(url: &str, prefix: &str) -> Result<Self, SearchIndexError> {
        Ok(Self::with_client(build_client(url)?, prefix))
    }

    /// Use an existing client; indexes for all kinds can share one.
    pub fn with_client(client: Elasticsearch, prefix: &str) -> Self {
        Self {
            client,
            index: wire::index_name(prefix, E::KIND),
            _entity: PhantomData,
        }
    }

    pub fn index_name(&self) -> &str {
        &self.index
    }
}

/// Build a client for the single node at `url`.
pub fn build_client(url: &str) -> Result<Elasticsearch, SearchIndexError> {
    let parsed: Url = url.parse().map_err(|e| {
        SearchIndexError::Unavailable(format!("invalid Elasticsearch URL '{url}': {e}"))
    })?;

    let transport = TransportBuilder::new(SingleNodeConnectionPool::new(parsed))
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| SearchIndexError::Unavailable(format!("failed to build transport: {e}")))?;

    Ok(Elasticsearch::new(transport))
}

fn unavailable(operation: &str, err: elasticsearch::Error) -> SearchIndexError {
    SearchIndexError::Unavailable(format!("{operation} failed: {err}"))
}

/// Outcome of a request whose error body has been read.
enum Failure {
    IndexMissing,
    NotFound,
    BadRequest(String),
    Other(SearchIndexError),
}

async fn check(operation: &str, response: Response) -> Result<Response, Failure> {
    let status = response.status_code();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if wire::is_index_missing(&body) {
        return Err(Failure::IndexMissing);
    }
    match status.as_u16() {
        404 => return Err(Failure::NotFound),
        400 => return Err(Failure::BadRequest(body)),
        _ => {}
    }
    Err(Failure::Other(SearchIndexError::Index(format!(
        "{operation} failed (status {status}): {body}"
    ))))
}

impl<E: Entity> ElasticsearchIndex<E> {
    async fn search_raw(&self, body: Value) -> Result<Option<Value>, SearchIndexError> {
        let response = self
            .client
            .search(SearchParts::Index(&[&self.index]))
            .body(body)
            .send()
            .await
            .map_err(|e| unavailable("search", e))?;

        match check("search", response).await {
            Ok(response) => response
                .json::<Value>()
                .await
                .map(Some)
                .map_err(|e| SearchIndexError::Index(format!("failed to read search response: {e}"))),
            // Nothing has been indexed for this kind yet.
            Err(Failure::IndexMissing) | Err(Failure::NotFound) => Ok(None),
            Err(Failure::BadRequest(body)) => Err(SearchIndexError::InvalidQuery(body)),
            Err(Failure::Other(err)) => Err(err),
        }
    }
}

#[async_trait::async_trait]
impl<E: Entity> SearchIndex<E> for ElasticsearchIndex<E> {
    #[instrument(skip(self, record), fields(index = %self.index), err)]
    async fn upsert(&self, record: &E) -> Result<(), SearchIndexError> {
        let id = document_id(record)?.to_string();
        let response = self
            .client
            .index(IndexParts::IndexId(&self.index, &id))
            .body(record)
            .send()
            .await
            .map_err(|e| unavailable("index", e))?;

        match check("index", response).await {
            Ok(_) => Ok(()),
            Err(Failure::Other(err)) => Err(err),
            Err(Failure::BadRequest(body)) => Err(SearchIndexError::Index(format!(
                "index {} rejected document {id}: {body}",
                self.index
            ))),
            Err(Failure::IndexMissing) | Err(Failure::NotFound) => Err(SearchIndexError::Index(
                format!("index {} is missing", self.index),
            )),
        }
    }

    #[instrument(skip(self, id), fields(index = %self.index, id = %id), err)]
    async fn delete_by_id(&self, id: EntityId) -> Result<(), SearchIndexError> {
        let doc_id = id.to_string();
        let response = self
            .client
            .delete(DeleteParts::IndexId(&self.index, &doc_id))
            .send()
            .await
            .map_err(|e| unavailable("delete", e))?;

        match check("delete", response).await {
            Ok(_) | Err(Failure::NotFound) | Err(Failure::IndexMissing) => Ok(()),
            Err(Failure::BadRequest(body)) => Err(SearchIndexError::Index(body)),
            Err(Failure::Other(err)) => Err(err),
        }
    }

    #[instrument(skip(self), fields(index = %self.index), err)]
    async fn search(&self, query: &str) -> Result<Vec<E>, SearchIndexError> {
        let fetch = |body| self.search_raw(body);
        wire::paginate(wire::search_body(query), wire::PAGE_SIZE, fetch, wire::decode_hits).await
    }

    #[instrument(skip(self), fields(index = %self.index), err)]
    async fn indexed_ids(&self) -> Result<Vec<EntityId>, SearchIndexError> {
        let fetch = |body| self.search_raw(body);
        wire::paginate(wire::ids_body(), wire::PAGE_SIZE, fetch, wire::decode_ids).await
    }
}
