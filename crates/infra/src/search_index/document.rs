//! Mapping between entity records and tantivy documents.
//!
//! Every top-level key of a kind's `Default` record becomes a text field
//! analyzed with tantivy's `default` tokenizer (split on non-alphanumerics,
//! lowercased), so numbers and strings are matched as tokens. The identity is
//! an `i64` field and the record itself is stored as JSON under `_source`.

use serde_json::Value as JsonValue;
use tantivy::schema::{
    FAST, Field, INDEXED, IndexRecordOption, STORED, Schema, TextFieldIndexing, TextOptions, Value,
};
use tantivy::{TantivyDocument, Term};

use storefront_core::{Entity, EntityId};

use super::r#trait::{SearchIndexError, document_id};

pub const ID_FIELD: &str = "id";
pub const SOURCE_FIELD: &str = "_source";

/// Schema and field handles for one entity kind.
#[derive(Debug, Clone)]
pub struct DocumentFields {
    schema: Schema,
    id: Field,
    source: Field,
    text: Vec<(String, Field)>,
}

impl DocumentFields {
    pub fn for_entity<E: Entity>() -> Result<Self, SearchIndexError> {
        let template = serde_json::to_value(E::default()).map_err(|e| {
            SearchIndexError::Index(format!("cannot derive {} search fields: {e}", E::KIND))
        })?;
        let JsonValue::Object(keys) = template else {
            return Err(SearchIndexError::Index(format!(
                "{} records must serialize as JSON objects",
                E::KIND
            )));
        };

        let mut builder = Schema::builder();
        let id = builder.add_i64_field(ID_FIELD, INDEXED | STORED | FAST);
        let source = builder.add_text_field(SOURCE_FIELD, STORED);

        let indexing = TextFieldIndexing::default()
            .set_tokenizer("default")
            .set_index_option(IndexRecordOption::WithFreqsAndPositions);
        let options = TextOptions::default().set_indexing_options(indexing);
        let text = keys
            .keys()
            .filter(|key| key.as_str() != ID_FIELD)
            .map(|key| (key.clone(), builder.add_text_field(key, options.clone())))
            .collect();

        Ok(Self {
            schema: builder.build(),
            id,
            source,
            text,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Fields searched by clauses that name no field.
    pub fn default_fields(&self) -> Vec<Field> {
        self.text.iter().map(|(_, field)| *field).collect()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.text.iter().map(|(name, _)| name.as_str())
    }

    pub fn id_term(&self, id: EntityId) -> Term {
        Term::from_field_i64(self.id, id.get())
    }

    pub fn to_document<E: Entity>(&self, record: &E) -> Result<TantivyDocument, SearchIndexError> {
        let id = document_id(record)?;
        let value = serde_json::to_value(record).map_err(|e| {
            SearchIndexError::Index(format!("failed to serialize {} {id}: {e}", E::KIND))
        })?;

        let mut doc = TantivyDocument::new();
        doc.add_i64(self.id, id.get());
        doc.add_text(self.source, value.to_string());
        for (name, field) in &self.text {
            if let Some(v) = value.get(name) {
                for text in scalars(v) {
                    doc.add_text(*field, text);
                }
            }
        }
        Ok(doc)
    }

    pub fn decode<E: Entity>(&self, doc: &TantivyDocument) -> Result<E, SearchIndexError> {
        let source = doc
            .get_first(self.source)
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                SearchIndexError::Index(format!("{} document without stored source", E::KIND))
            })?;
        serde_json::from_str(source).map_err(|e| {
            SearchIndexError::Index(format!("stored {} source is unreadable: {e}", E::KIND))
        })
    }

    pub fn id_of(&self, doc: &TantivyDocument) -> Option<EntityId> {
        doc.get_first(self.id)
            .and_then(|v| v.as_i64())
            .map(EntityId::new)
    }
}

/// Scalar leaves of `value` rendered as text. Nulls contribute nothing.
fn scalars(value: &JsonValue) -> Vec<String> {
    match value {
        JsonValue::Null => Vec::new(),
        JsonValue::String(s) => vec![s.clone()],
        JsonValue::Number(n) => vec![n.to_string()],
        JsonValue::Bool(b) => vec![b.to_string()],
        JsonValue::Array(items) => items.iter().flat_map(scalars).collect(),
        JsonValue::Object(map) => map.values().flat_map(scalars).collect(),
    }
}
