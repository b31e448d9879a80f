// Record model - store-assigned identity plus an open payload

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{FormDbError, Result};
use crate::value::FieldValue;

/// Field id to value mapping carried by every record
pub type Payload = BTreeMap<String, FieldValue>;

/// A stored submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    #[serde(with = "iso_millis")]
    pub created_at: DateTime<Utc>,
    pub data: Payload,
}

impl Record {
    /// Top-level fields addressable by name when sorting
    pub const ID: &'static str = "id";
    pub const CREATED_AT: &'static str = "createdAt";

    /// Shallow merge: every key in `partial` replaces the existing value,
    /// including explicit nulls. Keys not in `partial` are left untouched.
    pub fn merge(&mut self, partial: Payload) {
        self.data.extend(partial);
    }

    pub fn created_at_iso(&self) -> String {
        self.created_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// How record ids are generated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdStrategy {
    #[default]
    Uuid,
    Ulid,
    Nanoid,
}

impl IdStrategy {
    pub fn generate(&self) -> String {
        match self {
            IdStrategy::Uuid => uuid::Uuid::new_v4().to_string(),
            IdStrategy::Ulid => ulid::Ulid::new().to_string(),
            IdStrategy::Nanoid => nanoid::nanoid!(),
        }
    }
}

impl std::str::FromStr for IdStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "uuid" => Ok(IdStrategy::Uuid),
            "ulid" => Ok(IdStrategy::Ulid),
            "nanoid" => Ok(IdStrategy::Nanoid),
            other => Err(format!("Unknown id strategy '{other}' (expected uuid, ulid or nanoid)")),
        }
    }
}

/// Convert a JSON body into a payload. The body must be an object whose
/// values are scalars or lists.
pub fn payload_from_json(value: serde_json::Value) -> Result<Payload> {
    match value {
        serde_json::Value::Object(map) => map
            .into_iter()
            .map(|(key, value)| {
                FieldValue::try_from(value)
                    .map(|v| (key.clone(), v))
                    .map_err(|e| match e {
                        FormDbError::Payload(msg) => {
                            FormDbError::Payload(format!("field '{key}': {msg}"))
                        }
                        other => other,
                    })
            })
            .collect(),
        other => Err(FormDbError::Payload(format!(
            "expected a JSON object, got {}",
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// `createdAt` on the wire: RFC 3339, millisecond precision, `Z` suffix
mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
