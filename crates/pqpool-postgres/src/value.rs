//! Conversions between pqpool values and PostgreSQL wire values

use bytes::BytesMut;
use postgres_types::{IsNull, ToSql, Type};
use pqpool_core::Value;
use tokio_postgres::Row as PgRow;

/// Owned parameter wrapper, since tokio-postgres binds `&dyn ToSql`
#[derive(Debug)]
pub(crate) enum PgValue {
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    Json(serde_json::Value),
}

impl PgValue {
    pub(crate) fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => PgValue::Null,
            Value::Bool(v) => PgValue::Bool(*v),
            Value::Int16(v) => PgValue::Int16(*v),
            Value::Int32(v) => PgValue::Int32(*v),
            Value::Int64(v) => PgValue::Int64(*v),
            Value::Float32(v) => PgValue::Float32(*v),
            Value::Float64(v) => PgValue::Float64(*v),
            Value::Decimal(v) | Value::String(v) => PgValue::String(v.clone()),
            Value::Bytes(v) => PgValue::Bytes(v.clone()),
            Value::Uuid(v) => PgValue::Uuid(*v),
            Value::Json(v) => PgValue::Json(v.clone()),
        }
    }
}

impl ToSql for PgValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            PgValue::Null => Ok(IsNull::Yes),
            PgValue::Bool(v) => v.to_sql(ty, out),
            PgValue::Int16(v) => v.to_sql(ty, out),
            PgValue::Int32(v) => v.to_sql(ty, out),
            PgValue::Int64(v) => v.to_sql(ty, out),
            PgValue::Float32(v) => v.to_sql(ty, out),
            PgValue::Float64(v) => v.to_sql(ty, out),
            PgValue::String(v) => v.to_sql(ty, out),
            PgValue::Bytes(v) => v.to_sql(ty, out),
            PgValue::Uuid(v) => v.to_sql(ty, out),
            PgValue::Json(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_: &Type) -> bool {
        true
    }

    postgres_types::to_sql_checked!();
}

/// Decode one column of a result row
///
/// Types without a dedicated mapping are read as text when the server
/// allows it and become `Value::Null` otherwise.
pub(crate) fn decode_column(row: &PgRow, idx: usize) -> Value {
    let type_name = row.columns()[idx].type_().name();
    let decoded = match type_name {
        "bool" => row.try_get::<_, Option<bool>>(idx).map(|v| v.map(Value::Bool)),
        "int2" => row.try_get::<_, Option<i16>>(idx).map(|v| v.map(Value::Int16)),
        "int4" => row.try_get::<_, Option<i32>>(idx).map(|v| v.map(Value::Int32)),
        "int8" => row.try_get::<_, Option<i64>>(idx).map(|v| v.map(Value::Int64)),
        "float4" => row.try_get::<_, Option<f32>>(idx).map(|v| v.map(Value::Float32)),
        "float8" => row.try_get::<_, Option<f64>>(idx).map(|v| v.map(Value::Float64)),
        "bytea" => row.try_get::<_, Option<Vec<u8>>>(idx).map(|v| v.map(Value::Bytes)),
        "uuid" => row.try_get::<_, Option<uuid::Uuid>>(idx).map(|v| v.map(Value::Uuid)),
        "json" | "jsonb" => row
            .try_get::<_, Option<serde_json::Value>>(idx)
            .map(|v| v.map(Value::Json)),
        _ => row.try_get::<_, Option<String>>(idx).map(|v| v.map(Value::String)),
    };

    match decoded {
        Ok(Some(value)) => value,
        Ok(None) => Value::Null,
        Err(e) => {
            tracing::trace!(column = idx, type_name, error = %e, "undecodable column");
            Value::Null
        }
    }
}
