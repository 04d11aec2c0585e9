use futures_util::{Stream, TryStreamExt, pin_mut};

use super::record::{FieldDescriptor, Record};
use crate::error::PgPoolError;
use crate::types::RowValues;

/// A driver row that can describe its columns and decode its values.
pub trait DecodeRow {
    /// Column metadata in result order.
    fn field_descriptors(&self) -> Vec<FieldDescriptor>;

    /// Decode every column, left to right.
    ///
    /// # Errors
    /// Returns `PgPoolError::Decode` for the first column that cannot be read.
    fn decode_values(&self) -> Result<Vec<RowValues>, PgPoolError>;
}

/// Turn a finished set of rows into name-keyed records.
///
/// Descriptors are taken from `fields` when given (the statement description),
/// otherwise from the first row. Any decode failure discards the whole result.
///
/// # Errors
/// Returns the first decode error encountered.
pub fn materialize<R, I>(fields: Option<&[FieldDescriptor]>, rows: I) -> Result<Vec<Record>, PgPoolError>
where
    R: DecodeRow,
    I: IntoIterator<Item = R>,
{
    let mut described: Option<Vec<FieldDescriptor>> = fields.map(<[FieldDescriptor]>::to_vec);
    let mut out = Vec::new();
    for row in rows {
        let fields = described.get_or_insert_with(|| row.field_descriptors());
        out.push(Record::from_row(fields, row.decode_values()?));
    }
    Ok(out)
}

/// Drain a row stream into records.
///
/// The stream is consumed to the end before returning, so the connection it
/// reads from is free again once this resolves. A stream error or a decode
/// error drops everything collected so far.
///
/// # Errors
/// Returns the stream's error converted by `map_err`, or a decode error.
pub async fn materialize_stream<S, R, E, F>(rows: S, map_err: F) -> Result<Vec<Record>, PgPoolError>
where
    S: Stream<Item = Result<R, E>>,
    R: DecodeRow,
    F: Fn(E) -> PgPoolError,
{
    pin_mut!(rows);
    let mut fields: Option<Vec<FieldDescriptor>> = None;
    let mut out = Vec::new();
    while let Some(row) = rows.try_next().await.map_err(&map_err)? {
        let fields = fields.get_or_insert_with(|| row.field_descriptors());
        out.push(Record::from_row(fields, row.decode_values()?));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    /// In-memory row: a list of (name, value) pairs, or a poisoned column.
    struct MemRow {
        cols: Vec<(&'static str, Option<RowValues>)>,
    }

    impl MemRow {
        fn new(cols: Vec<(&'static str, RowValues)>) -> Self {
            Self {
                cols: cols.into_iter().map(|(n, v)| (n, Some(v))).collect(),
            }
        }
    }

    impl DecodeRow for MemRow {
        fn field_descriptors(&self) -> Vec<FieldDescriptor> {
            self.cols
                .iter()
                .enumerate()
                .map(|(i, (name, _))| FieldDescriptor::named(*name, i))
                .collect()
        }

        fn decode_values(&self) -> Result<Vec<RowValues>, PgPoolError> {
            self.cols
                .iter()
                .map(|(name, v)| {
                    v.clone().ok_or_else(|| PgPoolError::Decode {
                        column: (*name).to_string(),
                        type_name: "point".to_string(),
                        reason: "unsupported column type".to_string(),
                    })
                })
                .collect()
        }
    }

    #[test]
    fn rows_become_records_in_order() {
        let rows = vec![
            MemRow::new(vec![("id", RowValues::Int(1)), ("name", RowValues::Text("a".into()))]),
            MemRow::new(vec![("id", RowValues::Int(2)), ("name", RowValues::Null)]),
        ];
        let records = materialize(None, rows).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("id"), Some(&RowValues::Int(1)));
        assert_eq!(records[1].get("name"), Some(&RowValues::Null));
    }

    #[test]
    fn empty_result_is_an_empty_list() {
        let records = materialize::<MemRow, _>(None, Vec::new()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn duplicate_column_names_resolve_to_last() {
        let rows = vec![MemRow::new(vec![
            ("v", RowValues::Int(1)),
            ("v", RowValues::Int(2)),
        ])];
        let records = materialize(None, rows).unwrap();
        assert_eq!(records[0].len(), 1);
        assert_eq!(records[0].get("v"), Some(&RowValues::Int(2)));
    }

    #[test]
    fn decode_failure_discards_the_result() {
        let rows = vec![
            MemRow::new(vec![("id", RowValues::Int(1))]),
            MemRow {
                cols: vec![("id", None)],
            },
        ];
        let err = materialize(None, rows).unwrap_err();
        assert!(matches!(err, PgPoolError::Decode { ref column, .. } if column == "id"));
    }

    #[tokio::test]
    async fn stream_error_midway_discards_partial_rows() {
        let items: Vec<Result<MemRow, &str>> = vec![
            Ok(MemRow::new(vec![("id", RowValues::Int(1))])),
            Err("connection reset"),
        ];
        let err = materialize_stream(stream::iter(items), |e| PgPoolError::Acquire(e.to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), PgPoolError::Acquire("connection reset".into()).to_string());
    }

    #[tokio::test]
    async fn stream_is_drained_into_records() {
        let items: Vec<Result<MemRow, &str>> = (1..=3)
            .map(|i| Ok(MemRow::new(vec![("n", RowValues::Int(i))])))
            .collect();
        let records = materialize_stream(stream::iter(items), |e| PgPoolError::Acquire(e.to_string()))
            .await
            .unwrap();
        let ns: Vec<i64> = records.iter().filter_map(|r| r.get("n")?.as_int().copied()).collect();
        assert_eq!(ns, vec![1, 2, 3]);
    }
}
