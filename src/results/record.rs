use std::collections::HashMap;

use serde::Serialize;

use crate::types::RowValues;

/// One column of a query result. A result's descriptors are shared read-only
/// by every row of that result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Column name as reported by the engine (not necessarily unique)
    pub name: String,
    /// Zero-based position in the row
    pub position: usize,
    /// Engine type name, e.g. `int4`
    pub type_name: String,
    /// Engine type OID
    pub type_oid: u32,
}

impl FieldDescriptor {
    /// Descriptor with just a name and position; type information unknown.
    #[must_use]
    pub fn named(name: impl Into<String>, position: usize) -> Self {
        Self {
            name: name.into(),
            position,
            type_name: String::new(),
            type_oid: 0,
        }
    }
}

/// A single result row keyed by column name.
///
/// Keys are unique. When a query returns several columns with the same name,
/// the right-most one wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: HashMap<String, RowValues>,
}

impl Record {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: HashMap::with_capacity(capacity),
        }
    }

    /// Zip descriptors with positional values. Later duplicates overwrite earlier ones.
    #[must_use]
    pub fn from_row(fields: &[FieldDescriptor], values: Vec<RowValues>) -> Self {
        let mut record = Self::with_capacity(fields.len());
        for (field, value) in fields.iter().zip(values) {
            record.insert(field.name.clone(), value);
        }
        record
    }

    /// Insert a value, returning the one previously stored under `name`.
    pub fn insert(&mut self, name: impl Into<String>, value: RowValues) -> Option<RowValues> {
        self.fields.insert(name.into(), value)
    }

    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.fields.get(column_name)
    }

    #[must_use]
    pub fn contains(&self, column_name: &str) -> bool {
        self.fields.contains_key(column_name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowValues)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn into_inner(self) -> HashMap<String, RowValues> {
        self.fields
    }

    /// Render as a JSON object of plain values.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl From<HashMap<String, RowValues>> for Record {
    fn from(fields: HashMap<String, RowValues>) -> Self {
        Self { fields }
    }
}

impl<K: Into<String>> FromIterator<(K, RowValues)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, RowValues)>>(iter: I) -> Self {
        let mut record = Record::default();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}
