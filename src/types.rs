use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::ser::{Serialize, SerializeSeq, Serializer};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Values that can be stored in a database row or used as query parameters.
///
/// The same enum is used for positional arguments and for decoded column values:
/// ```rust
/// use pgpool_middleware::prelude::*;
///
/// let args = vec![
///     RowValues::Int(1),
///     RowValues::Text("alice".into()),
///     RowValues::from(true),
/// ];
/// # let _ = args;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Exact decimal, kept as its canonical text (`"-12.50"`, `"NaN"`)
    Numeric(String),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp without time zone
    Timestamp(NaiveDateTime),
    /// Timestamp with time zone, normalized to UTC
    TimestampTz(DateTime<Utc>),
    /// Calendar date
    Date(NaiveDate),
    /// Time of day without time zone
    Time(NaiveTime),
    /// UUID
    Uuid(Uuid),
    /// JSON value
    Json(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
    /// One-dimensional array
    Array(Vec<RowValues>),
    /// NULL value
    Null,
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RowValues::Text(value) | RowValues::Numeric(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let RowValues::Bool(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            RowValues::Float(value) => Some(*value),
            #[allow(clippy::cast_precision_loss)]
            RowValues::Int(value) => Some(*value as f64),
            RowValues::Numeric(value) => value.parse().ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            RowValues::Timestamp(value) => Some(*value),
            RowValues::TimestampTz(value) => Some(value.naive_utc()),
            RowValues::Text(s) => {
                // "YYYY-MM-DD HH:MM:SS" and "YYYY-MM-DD HH:MM:SS.SSS"
                NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                    .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
                    .ok()
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn as_uuid(&self) -> Option<Uuid> {
        if let RowValues::Uuid(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&[RowValues]> {
        if let RowValues::Array(items) = self {
            Some(items)
        } else {
            None
        }
    }

    /// Render as a plain JSON value, the shape handed back to embedding callers.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }
}

impl Serialize for RowValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RowValues::Int(v) => serializer.serialize_i64(*v),
            RowValues::Float(v) => serializer.serialize_f64(*v),
            RowValues::Numeric(v) | RowValues::Text(v) => serializer.serialize_str(v),
            RowValues::Bool(v) => serializer.serialize_bool(*v),
            RowValues::Timestamp(v) => v.serialize(serializer),
            RowValues::TimestampTz(v) => v.serialize(serializer),
            RowValues::Date(v) => v.serialize(serializer),
            RowValues::Time(v) => v.serialize(serializer),
            RowValues::Uuid(v) => serializer.collect_str(v),
            RowValues::Json(v) => v.serialize(serializer),
            RowValues::Blob(v) => serializer.serialize_bytes(v),
            RowValues::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            RowValues::Null => serializer.serialize_unit(),
        }
    }
}

impl From<i64> for RowValues {
    fn from(value: i64) -> Self {
        RowValues::Int(value)
    }
}

impl From<i32> for RowValues {
    fn from(value: i32) -> Self {
        RowValues::Int(i64::from(value))
    }
}

impl From<f64> for RowValues {
    fn from(value: f64) -> Self {
        RowValues::Float(value)
    }
}

impl From<bool> for RowValues {
    fn from(value: bool) -> Self {
        RowValues::Bool(value)
    }
}

impl From<&str> for RowValues {
    fn from(value: &str) -> Self {
        RowValues::Text(value.to_string())
    }
}

impl From<String> for RowValues {
    fn from(value: String) -> Self {
        RowValues::Text(value)
    }
}

impl From<Vec<u8>> for RowValues {
    fn from(value: Vec<u8>) -> Self {
        RowValues::Blob(value)
    }
}

impl From<NaiveDateTime> for RowValues {
    fn from(value: NaiveDateTime) -> Self {
        RowValues::Timestamp(value)
    }
}

impl From<DateTime<Utc>> for RowValues {
    fn from(value: DateTime<Utc>) -> Self {
        RowValues::TimestampTz(value)
    }
}

impl From<NaiveDate> for RowValues {
    fn from(value: NaiveDate) -> Self {
        RowValues::Date(value)
    }
}

impl From<NaiveTime> for RowValues {
    fn from(value: NaiveTime) -> Self {
        RowValues::Time(value)
    }
}

impl From<Uuid> for RowValues {
    fn from(value: Uuid) -> Self {
        RowValues::Uuid(value)
    }
}

impl From<JsonValue> for RowValues {
    fn from(value: JsonValue) -> Self {
        RowValues::Json(value)
    }
}

impl<T: Into<RowValues>> From<Option<T>> for RowValues {
    fn from(value: Option<T>) -> Self {
        value.map_or(RowValues::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_to_plain_values() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|d| d.and_hms_opt(12, 30, 0))
            .unwrap();
        let value = RowValues::Array(vec![
            RowValues::Int(1),
            RowValues::Null,
            RowValues::Text("a".into()),
            RowValues::Numeric("10.50".into()),
            RowValues::Timestamp(ts),
            RowValues::Json(json!({"k": [1, 2]})),
            RowValues::Time(ts.time()),
            RowValues::Uuid(Uuid::nil()),
        ]);
        assert_eq!(
            value.to_json(),
            json!([
                1,
                null,
                "a",
                "10.50",
                "2024-03-01T12:30:00",
                {"k": [1, 2]},
                "12:30:00",
                "00000000-0000-0000-0000-000000000000"
            ])
        );
    }

    #[test]
    fn option_conversion_maps_none_to_null() {
        assert_eq!(RowValues::from(None::<i64>), RowValues::Null);
        assert_eq!(RowValues::from(Some("x")), RowValues::Text("x".into()));
        assert_eq!(RowValues::from(7_i32), RowValues::Int(7));
    }

    #[test]
    fn accessors() {
        assert_eq!(RowValues::Int(3).as_float(), Some(3.0));
        assert_eq!(RowValues::Numeric("1.25".into()).as_float(), Some(1.25));
        assert_eq!(RowValues::Bool(true).as_bool(), Some(&true));
        assert!(RowValues::Text("x".into()).as_int().is_none());
        let parsed = RowValues::Text("2024-01-02 03:04:05.250".into()).as_timestamp();
        assert!(parsed.is_some());
    }
}
