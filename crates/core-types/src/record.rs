use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

/// One row exactly as the exchange returned it.
///
/// The exchange sends numbers as JSON strings (`"closedPnl": "-1.25"`) on most
/// endpoints and as bare numbers on a few, so every accessor accepts both.
/// Missing or unparsable values read as zero / empty, never as an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(Map<String, Value>);

impl RawRecord {
    /// Synthetic field naming the endpoint a record came from.
    pub const SOURCE_FIELD: &'static str = "_source";

    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Returns a copy of the record with `field` set to `value`.
    pub fn with_field(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.0.insert(field.to_string(), value.into());
        self
    }

    /// The field rendered as text. Empty strings and nulls read as `None`.
    pub fn text(&self, field: &str) -> Option<String> {
        match self.0.get(field)? {
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn decimal(&self, field: &str) -> Decimal {
        let raw = match self.0.get(field) {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Decimal::ZERO,
        };
        if raw.is_empty() {
            return Decimal::ZERO;
        }
        Decimal::from_str(&raw)
            .or_else(|_| Decimal::from_scientific(&raw))
            .unwrap_or_else(|_| {
                tracing::debug!(field, value = %raw, "Unparsable decimal field, using zero.");
                Decimal::ZERO
            })
    }

    pub fn millis(&self, field: &str) -> Option<i64> {
        match self.0.get(field)? {
            Value::String(s) => s.trim().parse::<i64>().ok(),
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    /// The first present timestamp among `fields`, as a UTC instant.
    /// Records with no usable timestamp land on the Unix epoch.
    pub fn timestamp(&self, fields: &[&str]) -> DateTime<Utc> {
        fields
            .iter()
            .find_map(|f| self.millis(f))
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or_default()
    }

    pub fn flag(&self, field: &str) -> bool {
        match self.0.get(field) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true") || s == "1",
            Some(Value::Number(n)) => n.as_i64() == Some(1),
            _ => false,
        }
    }
}

impl From<Map<String, Value>> for RawRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}
