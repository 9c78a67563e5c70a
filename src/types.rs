use serde::{Deserialize, Serialize};

/// Destination index name, e.g. `"products"`.
pub type IndexName = String;
/// Optional document identifier; the backend assigns one when absent.
pub type DocumentId = String;

/// A single unit to be indexed.
///
/// Missing wire fields deserialize to empty values instead of failing, so the
/// validator is the one place that reports which field is absent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexRecord {
    #[serde(default)]
    pub index: IndexName,
    #[serde(rename = "type", default)]
    pub doc_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<DocumentId>,
    #[serde(default)]
    pub body: serde_json::Value,
}

impl IndexRecord {
    pub fn new(
        index: impl Into<String>,
        doc_type: impl Into<String>,
        body: serde_json::Value,
    ) -> Self {
        IndexRecord {
            index: index.into(),
            doc_type: doc_type.into(),
            id: None,
            body,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Parse a record from a JSON object such as
    /// `{"index": "products", "type": "product", "id": "1", "body": {...}}`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SinkError::Json`] if the value is not an object or a
    /// field has the wrong JSON type. Absent fields are not an error here.
    pub fn from_json(json: &serde_json::Value) -> crate::error::Result<Self> {
        if !json.is_object() {
            return Err(crate::error::SinkError::Json(
                "Expected JSON object".to_string(),
            ));
        }
        Ok(serde_json::from_value(json.clone())?)
    }

    /// The two NDJSON lines a bulk endpoint expects for this record:
    /// the action/metadata line and the document source line.
    pub fn to_bulk_lines(&self) -> (serde_json::Value, serde_json::Value) {
        let mut meta = serde_json::Map::new();
        meta.insert(
            "_index".to_string(),
            serde_json::Value::String(self.index.clone()),
        );
        meta.insert(
            "_type".to_string(),
            serde_json::Value::String(self.doc_type.clone()),
        );
        if let Some(id) = &self.id {
            meta.insert("_id".to_string(), serde_json::Value::String(id.clone()));
        }
        let action = serde_json::json!({ "index": serde_json::Value::Object(meta) });
        (action, self.body.clone())
    }
}

/// Structured outcome of one bulk call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BulkResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub took: Option<u64>,
    #[serde(default)]
    pub errors: bool,
    #[serde(default)]
    pub items: Vec<BulkItem>,
}

impl BulkResponse {
    /// A response where every one of `count` items succeeded.
    pub fn all_ok(count: usize) -> Self {
        BulkResponse {
            took: Some(0),
            errors: false,
            items: (0..count)
                .map(|_| BulkItem {
                    index: ItemOutcome {
                        status: 201,
                        ..Default::default()
                    },
                })
                .collect(),
        }
    }
}

/// One entry of `items`. The backend keys it by action name; all actions share
/// the same outcome shape, so they collapse into one field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BulkItem {
    #[serde(alias = "create", alias = "update", alias = "delete")]
    pub index: ItemOutcome,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ItemOutcome {
    #[serde(rename = "_index", default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ItemError>,
}

/// Item-level failure descriptor: either a bare label (`"Forbidden"`) or the
/// structured `{ "type": ..., "reason": ... }` form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ItemError {
    Label(String),
    Detail {
        #[serde(rename = "type")]
        kind: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl ItemError {
    pub fn identifier(&self) -> &str {
        match self {
            ItemError::Label(label) => label,
            ItemError::Detail { kind, .. } => kind,
        }
    }
}
