use std::marker::PhantomData;
use std::sync::{Mutex, MutexGuard};

use tantivy::collector::{DocSetCollector, TopDocs};
use tantivy::query::{AllQuery, Query, QueryParser, TermQuery};
use tantivy::schema::IndexRecordOption;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument};
use tracing::debug;

use storefront_core::{Entity, EntityId};

use super::document::DocumentFields;
use super::r#trait::{SearchIndex, SearchIndexError, document_id};

/// Indexing arena for the single writer thread (tantivy's minimum is 15MB).
const WRITER_HEAP_BYTES: usize = 15_000_000;

struct Engine {
    fields: DocumentFields,
    index: Index,
    writer: IndexWriter,
    reader: IndexReader,
}

impl Engine {
    fn open<E: Entity>() -> Result<Self, SearchIndexError> {
        let fields = DocumentFields::for_entity::<E>()?;
        let index = Index::create_in_ram(fields.schema().clone());
        let writer = index
            .writer_with_num_threads(1, WRITER_HEAP_BYTES)
            .map_err(engine_error)?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(engine_error)?;
        debug!(kind = E::KIND, fields = fields.field_names().count(), "opened in-memory search index");
        Ok(Self {
            fields,
            index,
            writer,
            reader,
        })
    }

    /// Apply `stage` and commit it; a failed stage is rolled back so no
    /// half-applied delete survives into the next commit.
    fn write(
        &mut self,
        stage: impl FnOnce(&mut Self) -> Result<(), SearchIndexError>,
    ) -> Result<(), SearchIndexError> {
        if let Err(err) = stage(self) {
            let _ = self.writer.rollback();
            return Err(err);
        }
        self.writer.commit().map_err(engine_error)?;
        self.reader.reload().map_err(engine_error)
    }

    fn parse(&self, text: &str) -> Result<Box<dyn Query>, SearchIndexError> {
        let text = text.trim();
        if text.is_empty() || text == "*" {
            return Ok(Box::new(AllQuery));
        }
        QueryParser::for_index(&self.index, self.fields.default_fields())
            .parse_query(text)
            .map_err(|e| SearchIndexError::InvalidQuery(e.to_string()))
    }

    /// Matching records in ascending identity order.
    fn matching<E: Entity>(&self, query: &dyn Query) -> Result<Vec<(EntityId, E)>, SearchIndexError> {
        let searcher = self.reader.searcher();
        let addresses = searcher.search(query, &DocSetCollector).map_err(engine_error)?;
        let mut hits = addresses
            .into_iter()
            .map(|address| {
                let doc: TantivyDocument = searcher.doc(address).map_err(engine_error)?;
                let id = self.fields.id_of(&doc).ok_or_else(|| {
                    SearchIndexError::Index(format!("{} document without identity", E::KIND))
                })?;
                Ok((id, self.fields.decode(&doc)?))
            })
            .collect::<Result<Vec<_>, SearchIndexError>>()?;
        hits.sort_by_key(|(id, _)| *id);
        Ok(hits)
    }
}

fn engine_error(err: tantivy::TantivyError) -> SearchIndexError {
    SearchIndexError::Index(err.to_string())
}

fn poisoned() -> SearchIndexError {
    SearchIndexError::Index("search index lock poisoned".to_string())
}

/// In-memory search index backed by a tantivy RAM directory.
///
/// Intended for tests/dev and single-node deployments. The schema is derived
/// from the kind's `Default` record on first use; every write is committed
/// before the call returns, so searches observe it immediately.
pub struct InMemorySearchIndex<E> {
    engine: Mutex<Option<Engine>>,
    _kind: PhantomData<fn() -> E>,
}

impl<E> InMemorySearchIndex<E> {
    pub fn new() -> Self {
        Self {
            engine: Mutex::new(None),
            _kind: PhantomData,
        }
    }
}

impl<E> Default for InMemorySearchIndex<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for InMemorySearchIndex<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemorySearchIndex").finish_non_exhaustive()
    }
}

impl<E: Entity> InMemorySearchIndex<E> {
    fn engine(&self) -> Result<MutexGuard<'_, Option<Engine>>, SearchIndexError> {
        let mut guard = self.engine.lock().map_err(|_| poisoned())?;
        if guard.is_none() {
            *guard = Some(Engine::open::<E>()?);
        }
        Ok(guard)
    }

    fn with_engine<T>(
        &self,
        f: impl FnOnce(&mut Engine) -> Result<T, SearchIndexError>,
    ) -> Result<T, SearchIndexError> {
        let mut guard = self.engine()?;
        match guard.as_mut() {
            Some(engine) => f(engine),
            None => Err(SearchIndexError::Index("search index not opened".to_string())),
        }
    }

    pub fn len(&self) -> usize {
        self.with_engine(|engine| Ok(engine.reader.searcher().num_docs() as usize))
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Indexed copy of the record with `id`, if any.
    pub fn get(&self, id: EntityId) -> Option<E> {
        self.with_engine(|engine| {
            let query = TermQuery::new(engine.fields.id_term(id), IndexRecordOption::Basic);
            let searcher = engine.reader.searcher();
            let top = searcher
                .search(&query, &TopDocs::with_limit(1))
                .map_err(engine_error)?;
            match top.first() {
                Some((_, address)) => {
                    let doc: TantivyDocument = searcher.doc(*address).map_err(engine_error)?;
                    engine.fields.decode(&doc).map(Some)
                }
                None => Ok(None),
            }
        })
        .ok()
        .flatten()
    }
}

#[async_trait::async_trait]
impl<E: Entity> SearchIndex<E> for InMemorySearchIndex<E> {
    async fn upsert(&self, record: &E) -> Result<(), SearchIndexError> {
        let id = document_id(record)?;
        self.with_engine(|engine| {
            let doc = engine.fields.to_document(record)?;
            engine.write(|engine| {
                engine.writer.delete_term(engine.fields.id_term(id));
                engine.writer.add_document(doc).map_err(engine_error)?;
                Ok(())
            })
        })
    }

    async fn delete_by_id(&self, id: EntityId) -> Result<(), SearchIndexError> {
        self.with_engine(|engine| {
            engine.write(|engine| {
                engine.writer.delete_term(engine.fields.id_term(id));
                Ok(())
            })
        })
    }

    async fn search(&self, query: &str) -> Result<Vec<E>, SearchIndexError> {
        self.with_engine(|engine| {
            let query = engine.parse(query)?;
            let hits = engine.matching::<E>(query.as_ref())?;
            Ok(hits.into_iter().map(|(_, record)| record).collect())
        })
    }

    async fn indexed_ids(&self) -> Result<Vec<EntityId>, SearchIndexError> {
        self.with_engine(|engine| {
            let hits = engine.matching::<E>(&AllQuery)?;
            Ok(hits.into_iter().map(|(id, _)| id).collect())
        })
    }
}
