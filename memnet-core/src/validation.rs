//! Untyped record import.
//!
//! Producers that hand over loosely structured data (JSON from another
//! process, a dialogue layer, a file) go through [`Record::from_json_value`],
//! which checks the shape of every field before the value invariants.
//! Nothing here touches a store: a rejected value leaves no trace.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::record::Record;
use crate::types::RecordId;

impl Record {
    /// Build a record from an untyped JSON object.
    ///
    /// Required: `content`, `timestamp` (RFC 3339), `importance`,
    /// `emotional_valence`. Optional: `context` (object of strings), `tags`
    /// (array of strings), `retrieval_count`, `last_accessed`,
    /// `associations` (array of record ids).
    ///
    /// # Errors
    /// Returns the [`ValidationError`] for the first malformed field.
    pub fn from_json_value(value: &Value) -> Result<Self, ValidationError> {
        let obj = value
            .as_object()
            .ok_or(ValidationError::MissingField("content"))?;

        let content = match obj.get("content") {
            None | Some(Value::Null) => return Err(ValidationError::MissingField("content")),
            Some(Value::String(s)) => s.clone(),
            Some(other) => {
                return Err(ValidationError::InvalidContentType(format!(
                    "got {}",
                    kind(other)
                )));
            }
        };

        let timestamp = parse_timestamp(obj, "timestamp")?
            .ok_or(ValidationError::MissingField("timestamp"))?;

        let importance = match obj.get("importance") {
            None | Some(Value::Null) => return Err(ValidationError::MissingField("importance")),
            Some(v) => {
                number_in_range(v, 0.0, 1.0).map_err(ValidationError::ImportanceOutOfRange)?
            }
        };

        let emotional_valence = match obj.get("emotional_valence") {
            None | Some(Value::Null) => {
                return Err(ValidationError::MissingField("emotional_valence"));
            }
            Some(v) => {
                number_in_range(v, -1.0, 1.0).map_err(ValidationError::ValenceOutOfRange)?
            }
        };

        let record = Self {
            content,
            timestamp,
            importance,
            emotional_valence,
            context: parse_context(obj.get("context"))?,
            tags: parse_tags(obj.get("tags"))?,
            retrieval_count: parse_retrieval_count(obj.get("retrieval_count"))?,
            last_accessed: parse_timestamp(obj, "last_accessed")?,
            associations: parse_associations(obj.get("associations"))?,
        };
        record.validate()?;
        Ok(record)
    }
}

/// Narrow a JSON number to `f32` after checking `[min, max]` at full
/// precision. The error carries the offending value (NaN for non-numbers).
#[allow(clippy::cast_possible_truncation)]
fn number_in_range(value: &Value, min: f64, max: f64) -> Result<f32, f32> {
    match value.as_f64() {
        Some(v) if (min..=max).contains(&v) => Ok(v as f32),
        Some(v) => Err(v as f32),
        None => Err(f32::NAN),
    }
}

fn parse_timestamp(
    obj: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<DateTime<Utc>>, ValidationError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| ValidationError::InvalidTimestamp(format!("{field}: {e}"))),
        Some(other) => Err(ValidationError::InvalidTimestamp(format!(
            "{field}: expected RFC 3339 string, got {}",
            kind(other)
        ))),
    }
}

fn parse_context(value: Option<&Value>) -> Result<BTreeMap<String, String>, ValidationError> {
    let Some(value) = value.filter(|v| !v.is_null()) else {
        return Ok(BTreeMap::new());
    };
    let Value::Object(map) = value else {
        return Err(ValidationError::InvalidContextType(format!(
            "expected object, got {}",
            kind(value)
        )));
    };
    map.iter()
        .map(|(k, v)| match v {
            Value::String(s) => Ok((k.clone(), s.clone())),
            other => Err(ValidationError::InvalidContextType(format!(
                "value for '{k}' is {}",
                kind(other)
            ))),
        })
        .collect()
}

fn parse_tags(value: Option<&Value>) -> Result<BTreeSet<String>, ValidationError> {
    let Some(value) = value.filter(|v| !v.is_null()) else {
        return Ok(BTreeSet::new());
    };
    let Value::Array(items) = value else {
        return Err(ValidationError::InvalidTagType(format!(
            "expected array, got {}",
            kind(value)
        )));
    };
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(s.clone()),
            other => Err(ValidationError::InvalidTagType(format!(
                "tag is {}",
                kind(other)
            ))),
        })
        .collect()
}

fn parse_retrieval_count(value: Option<&Value>) -> Result<u32, ValidationError> {
    let Some(value) = value.filter(|v| !v.is_null()) else {
        return Ok(0);
    };
    if let Some(n) = value.as_i64() {
        if n < 0 {
            return Err(ValidationError::NegativeRetrievalCount(n));
        }
        return Ok(u32::try_from(n).unwrap_or(u32::MAX));
    }
    if value.as_u64().is_some() {
        return Ok(u32::MAX);
    }
    Err(ValidationError::InvalidRetrievalCount(kind(value).to_string()))
}

fn parse_associations(value: Option<&Value>) -> Result<BTreeSet<RecordId>, ValidationError> {
    let Some(value) = value.filter(|v| !v.is_null()) else {
        return Ok(BTreeSet::new());
    };
    let Value::Array(items) = value else {
        return Err(ValidationError::InvalidAssociationsType(format!(
            "expected array, got {}",
            kind(value)
        )));
    };
    items
        .iter()
        .map(|item| {
            item.as_str()
                .and_then(|s| RecordId::parse(s).ok())
                .ok_or_else(|| ValidationError::InvalidAssociationsType(item.to_string()))
        })
        .collect()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
