//! Record model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A business entity (product, invoice, ...) stored in a named collection.
///
/// Serialized as a flat JSON object: `id`, `createdAt` and `updatedAt` sit
/// next to the business fields. The sync engine treats `fields` as opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Identifier, unique within its collection. Empty when the source had none.
    #[serde(default, deserialize_with = "deserialize_id")]
    pub id: String,
    /// Creation timestamp
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp, the only ordering signal used by sync
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub updated_at: DateTime<Utc>,
    /// Business fields
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Create an empty record with both timestamps set to `at`
    #[must_use]
    pub fn new(id: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            created_at: at,
            updated_at: at,
            fields: Map::new(),
        }
    }

    /// Builder-style field setter
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Builder-style `updatedAt` setter
    #[must_use]
    pub fn updated(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = at;
        self
    }

    /// Look up a business field
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Whether the record carries a usable id (non-empty after trimming)
    pub fn has_valid_id(&self) -> bool {
        !self.id.trim().is_empty()
    }
}

/// Accepts strings, numbers, or `null`; anything else becomes an empty id.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(id)) => id,
        Some(Value::Number(id)) => id.to_string(),
        _ => String::new(),
    })
}

/// Accepts RFC 3339 strings or Unix milliseconds.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(DateTime::<Utc>::default()),
        Some(Value::String(raw)) => DateTime::parse_from_rfc3339(&raw)
            .map(|parsed| parsed.with_timezone(&Utc))
            .map_err(serde::de::Error::custom),
        Some(Value::Number(raw)) => raw
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}"))),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected timestamp, found {other}"
        ))),
    }
}
