use std::error::Error;

use tokio_postgres::types::{IsNull, Kind, ToSql, Type, to_sql_checked};
use tokio_util::bytes;

use super::numeric;
use crate::error::PgPoolError;
use crate::types::RowValues;

/// Pair every positional argument with the parameter type it is declared as.
///
/// Types are declared by the client so the statement can be sent unnamed, in a
/// single round trip, without asking the server to describe it first.
///
/// # Errors
/// Returns `PgPoolError::Param` for nested or mixed-type arrays.
pub fn typed_params(args: &[RowValues]) -> Result<Vec<(&RowValues, Type)>, PgPoolError> {
    args.iter()
        .enumerate()
        .map(|(idx, arg)| {
            param_type(arg)
                .map(|ty| (arg, ty))
                .map_err(|e| PgPoolError::Param(format!("argument ${}: {e}", idx + 1)))
        })
        .collect()
}

/// The parameter type a value is declared as.
fn param_type(value: &RowValues) -> Result<Type, String> {
    match value {
        RowValues::Array(items) => {
            let mut member: Option<Type> = None;
            for item in items {
                if matches!(item, RowValues::Array(_)) {
                    return Err("nested arrays are not supported".to_string());
                }
                let Some(ty) = scalar_type(item) else { continue };
                match &member {
                    Some(existing) if *existing != ty => {
                        return Err(format!(
                            "array mixes {} and {} elements",
                            existing.name(),
                            ty.name()
                        ));
                    }
                    Some(_) => {}
                    None => member = Some(ty),
                }
            }
            Ok(array_type(&member.unwrap_or(Type::TEXT)))
        }
        other => Ok(scalar_type(other).unwrap_or(Type::UNKNOWN)),
    }
}

/// `None` for NULL, whose type the server infers from context.
fn scalar_type(value: &RowValues) -> Option<Type> {
    let ty = match value {
        RowValues::Int(_) => Type::INT8,
        RowValues::Float(_) => Type::FLOAT8,
        RowValues::Numeric(_) => Type::NUMERIC,
        RowValues::Text(_) => Type::TEXT,
        RowValues::Bool(_) => Type::BOOL,
        RowValues::Timestamp(_) => Type::TIMESTAMP,
        RowValues::TimestampTz(_) => Type::TIMESTAMPTZ,
        RowValues::Date(_) => Type::DATE,
        RowValues::Time(_) => Type::TIME,
        RowValues::Uuid(_) => Type::UUID,
        RowValues::Json(_) => Type::JSONB,
        RowValues::Blob(_) => Type::BYTEA,
        RowValues::Array(_) | RowValues::Null => return None,
    };
    Some(ty)
}

fn array_type(member: &Type) -> Type {
    match *member {
        Type::INT8 => Type::INT8_ARRAY,
        Type::FLOAT8 => Type::FLOAT8_ARRAY,
        Type::NUMERIC => Type::NUMERIC_ARRAY,
        Type::BOOL => Type::BOOL_ARRAY,
        Type::TIMESTAMP => Type::TIMESTAMP_ARRAY,
        Type::TIMESTAMPTZ => Type::TIMESTAMPTZ_ARRAY,
        Type::DATE => Type::DATE_ARRAY,
        Type::TIME => Type::TIME_ARRAY,
        Type::UUID => Type::UUID_ARRAY,
        Type::JSONB => Type::JSONB_ARRAY,
        Type::BYTEA => Type::BYTEA_ARRAY,
        _ => Type::TEXT_ARRAY,
    }
}

impl ToSql for RowValues {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut bytes::BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            RowValues::Int(i) => match *ty {
                Type::INT2 => i16::try_from(*i)?.to_sql_checked(ty, out),
                Type::INT4 => i32::try_from(*i)?.to_sql_checked(ty, out),
                _ => i.to_sql_checked(ty, out),
            },
            RowValues::Float(f) => {
                if *ty == Type::FLOAT4 {
                    #[allow(clippy::cast_possible_truncation)]
                    let narrowed = *f as f32;
                    narrowed.to_sql_checked(ty, out)
                } else {
                    f.to_sql_checked(ty, out)
                }
            }
            RowValues::Numeric(text) => {
                if *ty == Type::NUMERIC {
                    numeric::encode(text, out)?;
                    Ok(IsNull::No)
                } else {
                    text.to_sql_checked(ty, out)
                }
            }
            RowValues::Text(s) => s.to_sql_checked(ty, out),
            RowValues::Bool(b) => b.to_sql_checked(ty, out),
            RowValues::Timestamp(dt) => dt.to_sql_checked(ty, out),
            RowValues::TimestampTz(dt) => dt.to_sql_checked(ty, out),
            RowValues::Date(d) => d.to_sql_checked(ty, out),
            RowValues::Time(t) => t.to_sql_checked(ty, out),
            RowValues::Uuid(u) => u.to_sql_checked(ty, out),
            RowValues::Json(value) => value.to_sql_checked(ty, out),
            RowValues::Blob(blob) => blob.to_sql_checked(ty, out),
            RowValues::Array(items) => items.to_sql(ty, out),
            RowValues::Null => Ok(IsNull::Yes),
        }
    }

    fn accepts(ty: &Type) -> bool {
        if let Kind::Array(member) = ty.kind() {
            return Self::accepts(member);
        }
        matches!(
            *ty,
            Type::INT2
                | Type::INT4
                | Type::INT8
                | Type::FLOAT4
                | Type::FLOAT8
                | Type::NUMERIC
                | Type::TEXT
                | Type::VARCHAR
                | Type::BPCHAR
                | Type::NAME
                | Type::UNKNOWN
                | Type::BOOL
                | Type::TIMESTAMP
                | Type::TIMESTAMPTZ
                | Type::DATE
                | Type::TIME
                | Type::UUID
                | Type::JSON
                | Type::JSONB
                | Type::BYTEA
        )
    }

    to_sql_checked!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_arguments_declare_their_own_types() {
        let args = vec![
            RowValues::Int(1),
            RowValues::Text("a".into()),
            RowValues::Null,
            RowValues::Numeric("1.5".into()),
        ];
        let types: Vec<Type> = typed_params(&args)
            .unwrap()
            .into_iter()
            .map(|(_, ty)| ty)
            .collect();
        assert_eq!(types, vec![Type::INT8, Type::TEXT, Type::UNKNOWN, Type::NUMERIC]);
    }

    #[test]
    fn array_type_follows_first_non_null_element() {
        let args = vec![
            RowValues::Array(vec![RowValues::Null, RowValues::Int(2)]),
            RowValues::Array(vec![]),
        ];
        let typed = typed_params(&args).unwrap();
        assert_eq!(typed[0].1, Type::INT8_ARRAY);
        assert_eq!(typed[1].1, Type::TEXT_ARRAY);
    }

    #[test]
    fn mixed_and_nested_arrays_are_rejected() {
        let mixed = vec![RowValues::Array(vec![RowValues::Int(1), RowValues::Text("x".into())])];
        let err = typed_params(&mixed).unwrap_err();
        assert_eq!(
            err.to_string(),
            "parameter error: argument $1: array mixes int8 and text elements"
        );

        let nested = vec![RowValues::Array(vec![RowValues::Array(vec![])])];
        assert!(matches!(typed_params(&nested), Err(PgPoolError::Param(_))));
    }

    #[test]
    fn encoding_checks_the_declared_type() {
        let mut buf = bytes::BytesMut::new();
        assert!(RowValues::Int(7).to_sql_checked(&Type::INT4, &mut buf).is_ok());
        assert_eq!(&buf[..], &7_i32.to_be_bytes());

        buf.clear();
        assert!(RowValues::Int(i64::from(i16::MAX) + 1)
            .to_sql_checked(&Type::INT2, &mut buf)
            .is_err());

        buf.clear();
        assert!(RowValues::Text("x".into()).to_sql_checked(&Type::INT8, &mut buf).is_err());
        assert!(matches!(
            RowValues::Null.to_sql_checked(&Type::UNKNOWN, &mut buf),
            Ok(IsNull::Yes)
        ));
    }
}
