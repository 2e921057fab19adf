use thiserror::Error;

use storefront_core::{DomainError, EntityId};

use crate::record_store::RecordStoreError;
use crate::search_index::SearchIndexError;

/// Error returned by synchronizer operations.
///
/// Index failures on the write path never show up here; they are queued for
/// retry instead. `SearchUnavailable` only comes from the read-only search path.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Caller error detected before any store was touched. `key` is a stable
    /// machine-readable reason (`idexists`, `idnull`, `badquery`, `invalidid`).
    #[error("{message}")]
    InvalidArgument { key: &'static str, message: String },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: EntityId },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    RecordStore(RecordStoreError),

    #[error("search unavailable: {0}")]
    SearchUnavailable(String),
}

impl SyncError {
    pub fn id_exists(kind: &str) -> Self {
        Self::InvalidArgument {
            key: "idexists",
            message: format!("a new {kind} cannot already have an identity"),
        }
    }

    pub fn id_null(kind: &str) -> Self {
        Self::InvalidArgument {
            key: "idnull",
            message: format!("{kind} identity must be present"),
        }
    }

    pub fn id_out_of_range(kind: &str, id: EntityId) -> Self {
        Self::InvalidArgument {
            key: "invalidid",
            message: format!(
                "{kind} identity {id} must be between 1 and {}",
                EntityId::MAX_ASSIGNABLE
            ),
        }
    }

    pub fn not_found(kind: &'static str, id: EntityId) -> Self {
        Self::NotFound { kind, id }
    }
}

impl From<DomainError> for SyncError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidArgument(msg) => Self::InvalidArgument {
                key: "invalidargument",
                message: msg,
            },
            DomainError::InvalidId(msg) => Self::InvalidArgument {
                key: "invalidid",
                message: msg,
            },
            DomainError::Validation(msg) => Self::Validation(msg),
            DomainError::Conflict(msg) => Self::Conflict(msg),
            DomainError::NotFound => Self::Validation("referenced record not found".to_string()),
        }
    }
}

impl From<RecordStoreError> for SyncError {
    fn from(err: RecordStoreError) -> Self {
        match err {
            RecordStoreError::Conflict(msg) => Self::Conflict(msg),
            other => Self::RecordStore(other),
        }
    }
}

impl From<SearchIndexError> for SyncError {
    fn from(err: SearchIndexError) -> Self {
        match err {
            SearchIndexError::InvalidQuery(msg) => Self::InvalidArgument {
                key: "badquery",
                message: format!("malformed query: {msg}"),
            },
            other => Self::SearchUnavailable(other.to_string()),
        }
    }
}
