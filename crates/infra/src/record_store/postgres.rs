//! Postgres-backed record store.
//!
//! Every entity kind shares the `entity_records` table, keyed by
//! `(kind, id)`, with the record body stored as JSONB. Identities come from
//! one database sequence, so they are unique across kinds and never reused.
//! Unique references live in `entity_unique_refs` and are rewritten in the
//! same transaction as the record.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | RecordStoreError |
//! |------------|----------------------|------------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (other) | any other | `Storage` |
//! | PoolClosed / PoolTimedOut / Io | N/A | `Unavailable` |
//! | Other | N/A | `Storage` |

use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use sqlx::PgPool;
use tracing::{Span, instrument};

use storefront_core::{Entity, EntityId};

use super::r#trait::{RecordStore, RecordStoreError};

/// Schema applied by [`PostgresRecordStore::ensure_schema`].
pub const SCHEMA: &str = include_str!("../../migrations/0001_entity_records.sql");

/// Postgres-backed record store for one entity kind.
///
/// Uses the SQLx connection pool, which is `Send + Sync`; stores for different
/// kinds can share one pool.
pub struct PostgresRecordStore<E> {
    pool: Arc<PgPool>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for PostgresRecordStore<E> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E> std::fmt::Debug for PostgresRecordStore<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresRecordStore").finish_non_exhaustive()
    }
}

impl<E: Entity> PostgresRecordStore<E> {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }

    /// Create the record store tables if they do not exist yet.
    #[instrument(skip(pool), err)]
    pub async fn ensure_schema(pool: &PgPool) -> Result<(), RecordStoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }
}

fn decode<E: Entity>(body: JsonValue) -> Result<E, RecordStoreError> {
    serde_json::from_value(body)
        .map_err(|e| RecordStoreError::Storage(format!("failed to decode {} record: {e}", E::KIND)))
}

#[async_trait::async_trait]
impl<E: Entity> RecordStore<E> for PostgresRecordStore<E> {
    #[instrument(skip(self, record), fields(kind = E::KIND, id = tracing::field::Empty), err)]
    async fn save(&self, mut record: E) -> Result<E, RecordStoreError> {
        let span = Span::current();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let id = match record.id() {
            Some(id) => {
                check_explicit_identity::<E>(id)?;
                // Keep the sequence ahead of explicitly supplied identities.
                sqlx::query(
                    r#"
                    SELECT setval(
                        'entity_record_ids',
                        GREATEST($1, (SELECT last_value FROM entity_record_ids))
                    )
                    "#,
                )
                .bind(id.get())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("advance_sequence", e))?;
                id
            }
            None => {
                let next: i64 = sqlx::query_scalar("SELECT nextval('entity_record_ids')")
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error("next_identity", e))?;
                let id = EntityId::new(next);
                record.assign_id(id);
                id
            }
        };
        span.record("id", id.get());

        let body = serde_json::to_value(&record).map_err(|e| {
            RecordStoreError::Storage(format!("failed to encode {} record: {e}", E::KIND))
        })?;

        sqlx::query(
            r#"
            INSERT INTO entity_records (kind, id, body)
            VALUES ($1, $2, $3)
            ON CONFLICT (kind, id)
            DO UPDATE SET body = EXCLUDED.body, updated_at = now()
            "#,
        )
        .bind(E::KIND)
        .bind(id.get())
        .bind(&body)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("upsert_record", e))?;

        sqlx::query("DELETE FROM entity_unique_refs WHERE kind = $1 AND record_id = $2")
            .bind(E::KIND)
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("clear_unique_refs", e))?;

        for (field, value) in record.unique_references() {
            sqlx::query(
                r#"
                INSERT INTO entity_unique_refs (kind, field, value, record_id)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(E::KIND)
            .bind(field)
            .bind(value.get())
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    RecordStoreError::Conflict(format!(
                        "{} {field}={value} is already used by another record",
                        E::KIND
                    ))
                } else {
                    map_sqlx_error("insert_unique_ref", e)
                }
            })?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(record)
    }

    #[instrument(skip(self, id), fields(kind = E::KIND, id = %id), err)]
    async fn find_by_id(&self, id: EntityId) -> Result<Option<E>, RecordStoreError> {
        let body: Option<JsonValue> =
            sqlx::query_scalar("SELECT body FROM entity_records WHERE kind = $1 AND id = $2")
                .bind(E::KIND)
                .bind(id.get())
                .fetch_optional(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("find_by_id", e))?;

        body.map(decode).transpose()
    }

    #[instrument(skip(self), fields(kind = E::KIND, record_count = tracing::field::Empty), err)]
    async fn find_all(&self) -> Result<Vec<E>, RecordStoreError> {
        let bodies: Vec<JsonValue> =
            sqlx::query_scalar("SELECT body FROM entity_records WHERE kind = $1 ORDER BY id ASC")
                .bind(E::KIND)
                .fetch_all(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("find_all", e))?;

        Span::current().record("record_count", bodies.len());
        bodies.into_iter().map(decode).collect()
    }

    #[instrument(skip(self, id), fields(kind = E::KIND, id = %id), err)]
    async fn exists_by_id(&self, id: EntityId) -> Result<bool, RecordStoreError> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM entity_records WHERE kind = $1 AND id = $2)",
        )
        .bind(E::KIND)
        .bind(id.get())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("exists_by_id", e))
    }

    #[instrument(skip(self, id), fields(kind = E::KIND, id = %id), err)]
    async fn delete_by_id(&self, id: EntityId) -> Result<(), RecordStoreError> {
        sqlx::query("DELETE FROM entity_records WHERE kind = $1 AND id = $2")
            .bind(E::KIND)
            .bind(id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_by_id", e))?;
        Ok(())
    }
}

/// The shared sequence follows explicit identities, so one past the
/// assignable range would exhaust it for every kind.
fn check_explicit_identity<E: Entity>(id: EntityId) -> Result<(), RecordStoreError> {
    if id.is_assignable() {
        Ok(())
    } else {
        Err(RecordStoreError::Storage(format!(
            "{} identity {id} is outside 1..={}",
            E::KIND,
            EntityId::MAX_ASSIGNABLE
        )))
    }
}

/// Map SQLx errors to record store errors.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> RecordStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => RecordStoreError::Conflict(msg),
                _ => RecordStoreError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
            RecordStoreError::Unavailable(format!("{} in {}", err, operation))
        }
        _ => RecordStoreError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().as_deref() == Some("23505");
    }
    false
}
