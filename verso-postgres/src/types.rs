//! Type conversions for PostgreSQL.

use std::error::Error;

use bytes::BytesMut;
use chrono::{DateTime, NaiveDateTime, Utc};
use postgres_types::{IsNull, ToSql, Type, to_sql_checked};
use verso_migrate::{Row, SqlValue};

use crate::error::{PgError, PgResult};

/// A [`SqlValue`] bound as a statement parameter.
///
/// Values adapt to the parameter type the server inferred, so an integer
/// binds to `INT2`, `INT4` or `INT8` columns alike and a timestamp binds to
/// both `TIMESTAMP` and `TIMESTAMPTZ`.
#[derive(Debug)]
pub struct PgParam<'a>(pub &'a SqlValue);

impl ToSql for PgParam<'_> {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self.0 {
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Integer(i) => match *ty {
                Type::INT2 => i16::try_from(*i)?.to_sql_checked(ty, out),
                Type::INT4 => i32::try_from(*i)?.to_sql_checked(ty, out),
                Type::FLOAT4 => (*i as f32).to_sql_checked(ty, out),
                Type::FLOAT8 => (*i as f64).to_sql_checked(ty, out),
                Type::TEXT | Type::VARCHAR => i.to_string().to_sql_checked(ty, out),
                _ => i.to_sql_checked(ty, out),
            },
            SqlValue::Real(f) => match *ty {
                Type::FLOAT4 => (*f as f32).to_sql_checked(ty, out),
                _ => f.to_sql_checked(ty, out),
            },
            SqlValue::Text(s) => s.as_str().to_sql_checked(ty, out),
            SqlValue::Timestamp(ts) => match *ty {
                Type::TIMESTAMPTZ => ts.to_sql_checked(ty, out),
                Type::TEXT | Type::VARCHAR => ts.to_rfc3339().to_sql_checked(ty, out),
                _ => ts.naive_utc().to_sql_checked(ty, out),
            },
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Wrap parameters for binding.
pub fn bind(params: &[SqlValue]) -> Vec<PgParam<'_>> {
    params.iter().map(PgParam).collect()
}

/// Convert a driver row into an engine row.
pub fn from_pg_row(row: &tokio_postgres::Row) -> PgResult<Row> {
    let columns: Vec<String> = row
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();

    let values = row
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| column_value(row, idx, column.type_()))
        .collect::<PgResult<Vec<_>>>()?;

    Ok(Row::new(columns, values))
}

fn column_value(row: &tokio_postgres::Row, idx: usize, ty: &Type) -> PgResult<SqlValue> {
    let value = match *ty {
        Type::BOOL => row
            .try_get::<_, Option<bool>>(idx)?
            .map(|b| SqlValue::Integer(i64::from(b))),
        Type::INT2 => row
            .try_get::<_, Option<i16>>(idx)?
            .map(|v| SqlValue::Integer(v.into())),
        Type::INT4 => row
            .try_get::<_, Option<i32>>(idx)?
            .map(|v| SqlValue::Integer(v.into())),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.map(SqlValue::Integer),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)?
            .map(|v| SqlValue::Real(v.into())),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx)?.map(SqlValue::Real),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
            row.try_get::<_, Option<String>>(idx)?.map(SqlValue::Text)
        }
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(|v| SqlValue::Timestamp(v.and_utc())),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(SqlValue::Timestamp),
        _ => {
            return Err(PgError::type_conversion(format!(
                "unsupported column type '{}' at index {}",
                ty, idx
            )));
        }
    };
    Ok(value.unwrap_or(SqlValue::Null))
}
