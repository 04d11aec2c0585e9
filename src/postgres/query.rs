use std::error::Error;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, Kind, Type};
use uuid::Uuid;

use super::{binary, numeric};
use crate::error::PgPoolError;
use crate::results::{DecodeRow, FieldDescriptor};
use crate::types::RowValues;

type BoxError = Box<dyn Error + Sync + Send>;

/// One column value, decoded according to the engine-reported type.
struct Cell(RowValues);

impl<'a> FromSql<'a> for Cell {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        decode_raw(ty, raw).map(Cell)
    }

    fn from_sql_null(_: &Type) -> Result<Self, BoxError> {
        Ok(Cell(RowValues::Null))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

impl DecodeRow for Row {
    fn field_descriptors(&self) -> Vec<FieldDescriptor> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(position, col)| FieldDescriptor {
                name: col.name().to_string(),
                position,
                type_name: col.type_().name().to_string(),
                type_oid: col.type_().oid(),
            })
            .collect()
    }

    fn decode_values(&self) -> Result<Vec<RowValues>, PgPoolError> {
        (0..self.len())
            .map(|idx| postgres_extract_value(self, idx))
            .collect()
    }
}

/// Extracts a `RowValues` from a `tokio_postgres` Row at the given index,
/// choosing the variant from the engine-reported column type.
///
/// # Errors
/// Returns `PgPoolError::Decode` naming the column when the value cannot be read
/// or its type has no `RowValues` representation.
pub fn postgres_extract_value(row: &Row, idx: usize) -> Result<RowValues, PgPoolError> {
    row.try_get::<_, Cell>(idx)
        .map(|cell| cell.0)
        .map_err(|e| {
            let column = &row.columns()[idx];
            PgPoolError::Decode {
                column: column.name().to_string(),
                type_name: column.type_().name().to_string(),
                reason: e.source().map_or_else(|| e.to_string(), ToString::to_string),
            }
        })
}

fn is_textual(ty: &Type) -> bool {
    matches!(
        *ty,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN | Type::XML
    ) || ty.name() == "citext"
}

fn text(raw: &[u8]) -> Result<RowValues, BoxError> {
    Ok(RowValues::Text(std::str::from_utf8(raw)?.to_string()))
}

fn char_text(v: i8) -> RowValues {
    RowValues::Text(char::from(u8::from_ne_bytes(v.to_ne_bytes())).to_string())
}

fn decode_raw(ty: &Type, raw: &[u8]) -> Result<RowValues, BoxError> {
    match ty.kind() {
        Kind::Enum(_) => return text(raw),
        Kind::Domain(base) => return decode_raw(base, raw),
        Kind::Array(_) => {
            let items: Vec<Cell> = FromSql::from_sql(ty, raw)?;
            return Ok(RowValues::Array(items.into_iter().map(|cell| cell.0).collect()));
        }
        Kind::Composite(fields) => {
            return record(raw, |idx, oid| {
                fields
                    .get(idx)
                    .map(|field| field.type_().clone())
                    .or_else(|| Type::from_oid(oid))
            });
        }
        _ => {}
    }
    let value = match *ty {
        Type::INT2 => RowValues::Int(i16::from_sql(ty, raw)?.into()),
        Type::INT4 => RowValues::Int(i32::from_sql(ty, raw)?.into()),
        Type::INT8 => RowValues::Int(i64::from_sql(ty, raw)?),
        Type::OID => RowValues::Int(u32::from_sql(ty, raw)?.into()),
        Type::FLOAT4 => RowValues::Float(f32::from_sql(ty, raw)?.into()),
        Type::FLOAT8 => RowValues::Float(f64::from_sql(ty, raw)?),
        Type::NUMERIC => RowValues::Numeric(numeric::decode(raw)?),
        Type::CHAR => char_text(i8::from_sql(ty, raw)?),
        Type::BOOL => RowValues::Bool(bool::from_sql(ty, raw)?),
        Type::TIMESTAMP => RowValues::Timestamp(NaiveDateTime::from_sql(ty, raw)?),
        Type::TIMESTAMPTZ => RowValues::TimestampTz(DateTime::<Utc>::from_sql(ty, raw)?),
        Type::DATE => RowValues::Date(NaiveDate::from_sql(ty, raw)?),
        Type::TIME => RowValues::Time(NaiveTime::from_sql(ty, raw)?),
        Type::UUID => RowValues::Uuid(Uuid::from_sql(ty, raw)?),
        Type::JSON | Type::JSONB => RowValues::Json(serde_json::Value::from_sql(ty, raw)?),
        Type::BYTEA => RowValues::Blob(raw.to_vec()),
        Type::TIMETZ => RowValues::Text(binary::timetz(raw)?),
        Type::INTERVAL => RowValues::Text(binary::interval(raw)?),
        Type::INET | Type::CIDR => RowValues::Text(binary::inet(raw)?),
        Type::MACADDR | Type::MACADDR8 => RowValues::Text(binary::macaddr(raw)?),
        Type::BIT | Type::VARBIT => RowValues::Text(binary::bit_string(raw)?),
        Type::RECORD => return record(raw, |_, oid| Type::from_oid(oid)),
        _ if is_textual(ty) => text(raw)?,
        _ => return Err(format!("unsupported column type `{}`", ty.name()).into()),
    };
    Ok(value)
}

/// Composite and anonymous record values become an `Array` of their fields.
fn record<F>(raw: &[u8], field_type: F) -> Result<RowValues, BoxError>
where
    F: Fn(usize, u32) -> Option<Type>,
{
    binary::record_fields(raw)?
        .into_iter()
        .enumerate()
        .map(|(idx, (oid, payload))| {
            let Some(payload) = payload else {
                return Ok(RowValues::Null);
            };
            let ty = field_type(idx, oid)
                .ok_or_else(|| format!("record field {} has unknown type oid {oid}", idx + 1))?;
            decode_raw(&ty, payload)
        })
        .collect::<Result<Vec<_>, BoxError>>()
        .map(RowValues::Array)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_wire(fields: &[(u32, Option<&[u8]>)]) -> Vec<u8> {
        let mut raw = i32::try_from(fields.len()).unwrap().to_be_bytes().to_vec();
        for (oid, payload) in fields {
            raw.extend(oid.to_be_bytes());
            match payload {
                Some(bytes) => {
                    raw.extend(i32::try_from(bytes.len()).unwrap().to_be_bytes());
                    raw.extend_from_slice(bytes);
                }
                None => raw.extend((-1_i32).to_be_bytes()),
            }
        }
        raw
    }

    #[test]
    fn scalars_decode_from_binary_payloads() {
        assert_eq!(decode_raw(&Type::INT4, &7_i32.to_be_bytes()).unwrap(), RowValues::Int(7));
        assert_eq!(decode_raw(&Type::VARCHAR, b"hi").unwrap(), RowValues::Text("hi".into()));

        let id = Uuid::from_u128(0x0123_4567_89ab_cdef_0123_4567_89ab_cdef);
        assert_eq!(decode_raw(&Type::UUID, id.as_bytes()).unwrap(), RowValues::Uuid(id));

        let ten = (10 * 3_600_000_000_i64).to_be_bytes();
        assert_eq!(
            decode_raw(&Type::TIME, &ten).unwrap(),
            RowValues::Time(NaiveTime::from_hms_opt(10, 0, 0).unwrap())
        );

        let mut day = 0_i64.to_be_bytes().to_vec();
        day.extend(1_i32.to_be_bytes());
        day.extend(0_i32.to_be_bytes());
        assert_eq!(decode_raw(&Type::INTERVAL, &day).unwrap(), RowValues::Text("1 day".into()));
    }

    #[test]
    fn anonymous_records_become_arrays() {
        let one = 1_i32.to_be_bytes();
        let raw = record_wire(&[(23, Some(&one[..])), (25, Some(&b"a"[..])), (25, None)]);
        assert_eq!(
            decode_raw(&Type::RECORD, &raw).unwrap(),
            RowValues::Array(vec![RowValues::Int(1), RowValues::Text("a".into()), RowValues::Null])
        );
    }

    #[test]
    fn types_without_a_value_form_are_rejected() {
        let err = decode_raw(&Type::POINT, &[0; 16]).unwrap_err();
        assert_eq!(err.to_string(), "unsupported column type `point`");

        let raw = record_wire(&[(999_999, Some(&b""[..]))]);
        let err = decode_raw(&Type::RECORD, &raw).unwrap_err();
        assert_eq!(err.to_string(), "record field 1 has unknown type oid 999999");
    }
}
