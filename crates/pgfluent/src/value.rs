//! Bound values.
//!
//! [`Value`] is the closed set of shapes the builder knows how to place into
//! a statement. Scalars become `$n` parameters, arrays expand into lists of
//! parameters, and [`Sql`] fragments / sub-[`Query`]s are spliced into the SQL
//! text with their own parameters renumbered in place.

use crate::qb::Query;
use crate::sql::Sql;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::ser::{Error as _, Serialize, Serializer};
use std::error::Error;
use std::sync::Arc;
use tokio_postgres::types::{IsNull, ToSql, Type};

/// A clone-friendly wrapper for any driver-bindable value.
///
/// Use this for types [`Value`] has no dedicated variant for, or to bind a
/// Rust `Vec<T>` as a single Postgres array parameter (e.g. `= ANY(?)`).
#[derive(Clone)]
pub struct Param(pub(crate) Arc<dyn ToSql + Send + Sync>);

impl Param {
    /// Create a new parameter from any ToSql value.
    pub fn new<T: ToSql + Send + Sync + 'static>(value: T) -> Self {
        Param(Arc::new(value))
    }

    /// Get a reference to the inner value as a ToSql trait object.
    pub fn as_ref(&self) -> &(dyn ToSql + Sync) {
        &*self.0 as &(dyn ToSql + Sync)
    }
}

impl PartialEq for Param {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for Param {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Param({:?})", self.0)
    }
}

/// A value bound into a query.
#[derive(Clone, Debug)]
pub enum Value {
    /// SQL `NULL`. As the sole parameter of a condition it infers `IS NULL`.
    Null,
    /// Boolean. Rendered as `TRUE`/`FALSE` literal text in data and select lists.
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    Uuid(uuid::Uuid),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    /// Expanded into a comma-separated list of placeholders.
    Array(Vec<Value>),
    /// Opaque driver value.
    Param(Param),
    /// Raw fragment spliced with its own parameters.
    Sql(Sql),
    /// Sub-query spliced with its own parameters.
    Query(Box<Query>),
}

impl Value {
    /// Build an array value from any iterator of convertible items.
    pub fn array<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }

    /// Build a `bytea` value.
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Value::Bytes(bytes.into())
    }

    /// Wrap an arbitrary driver value.
    pub fn param<T: ToSql + Send + Sync + 'static>(value: T) -> Self {
        Value::Param(Param::new(value))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether a lone parameter of this shape infers `IN (?)`.
    pub(crate) fn is_list_like(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Query(_))
    }

    /// Short human-readable description used in error messages.
    pub(crate) fn describe(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Json(_) => "json",
            Value::Uuid(_) => "uuid",
            Value::Date(_) => "date",
            Value::Timestamp(_) => "timestamp",
            Value::TimestampTz(_) => "timestamptz",
            Value::Array(_) => "array",
            Value::Param(_) => "param",
            Value::Sql(_) => "sql fragment",
            Value::Query(_) => "sub-query",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Text(a), Text(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            (Json(a), Json(b)) => a == b,
            (Uuid(a), Uuid(b)) => a == b,
            (Date(a), Date(b)) => a == b,
            (Timestamp(a), Timestamp(b)) => a == b,
            (TimestampTz(a), TimestampTz(b)) => a == b,
            (Array(a), Array(b)) => a == b,
            (Param(a), Param(b)) => a == b,
            (Sql(a), Sql(b)) => a == b,
            (Query(a), Query(b)) => a == b,
            _ => false,
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Int(i64::from(v))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u16, u32);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl From<uuid::Uuid> for Value {
    fn from(v: uuid::Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::TimestampTz(v)
    }
}

impl From<Param> for Value {
    fn from(v: Param) -> Self {
        Value::Param(v)
    }
}

impl From<Sql> for Value {
    fn from(v: Sql) -> Self {
        Value::Sql(v)
    }
}

impl From<Query> for Value {
    fn from(v: Query) -> Self {
        Value::Query(Box::new(v))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::array(v)
    }
}

fn not_bindable(what: &str) -> Box<dyn Error + Sync + Send> {
    format!("{what} values are spliced into the SQL text and cannot be bound as a parameter").into()
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => v.to_sql_checked(ty, out),
            Value::Int(v) => match *ty {
                Type::INT2 => i16::try_from(*v)?.to_sql_checked(ty, out),
                Type::INT4 => i32::try_from(*v)?.to_sql_checked(ty, out),
                Type::OID => u32::try_from(*v)?.to_sql_checked(ty, out),
                Type::FLOAT4 => (*v as f32).to_sql_checked(ty, out),
                Type::FLOAT8 => (*v as f64).to_sql_checked(ty, out),
                _ => v.to_sql_checked(ty, out),
            },
            Value::Float(v) => match *ty {
                Type::FLOAT4 => (*v as f32).to_sql_checked(ty, out),
                _ => v.to_sql_checked(ty, out),
            },
            Value::Text(v) => v.to_sql_checked(ty, out),
            Value::Bytes(v) => v.to_sql_checked(ty, out),
            Value::Json(v) => v.to_sql_checked(ty, out),
            Value::Uuid(v) => v.to_sql_checked(ty, out),
            Value::Date(v) => v.to_sql_checked(ty, out),
            Value::Timestamp(v) => v.to_sql_checked(ty, out),
            Value::TimestampTz(v) => v.to_sql_checked(ty, out),
            Value::Param(p) => p.0.to_sql_checked(ty, out),
            Value::Array(_) => Err(not_bindable("array")),
            Value::Sql(_) => Err(not_bindable("sql fragment")),
            Value::Query(_) => Err(not_bindable("sub-query")),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    // `accepts` is unconditional; each variant checks its own target type.
    fn to_sql_checked(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        self.to_sql(ty, out)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Text(v) => serializer.serialize_str(v),
            Value::Bytes(v) => serializer.serialize_bytes(v),
            Value::Json(v) => v.serialize(serializer),
            Value::Uuid(v) => v.serialize(serializer),
            Value::Date(v) => v.serialize(serializer),
            Value::Timestamp(v) => v.serialize(serializer),
            Value::TimestampTz(v) => v.serialize(serializer),
            Value::Array(v) => v.serialize(serializer),
            other => Err(S::Error::custom(format!(
                "{} values are not serializable",
                other.describe()
            ))),
        }
    }
}

/// Conversion into the positional parameter list of a condition.
///
/// Implemented for `()` (no parameters), single values, fixed-size arrays and
/// `Vec<Value>`. Use [`params!`](crate::params) for mixed types.
pub trait IntoParams {
    fn into_params(self) -> Vec<Value>;
}

impl IntoParams for () {
    fn into_params(self) -> Vec<Value> {
        Vec::new()
    }
}

impl IntoParams for Vec<Value> {
    fn into_params(self) -> Vec<Value> {
        self
    }
}

impl<T: Into<Value>, const N: usize> IntoParams for [T; N] {
    fn into_params(self) -> Vec<Value> {
        self.into_iter().map(Into::into).collect()
    }
}

impl<T: Into<Value>> IntoParams for Option<T> {
    fn into_params(self) -> Vec<Value> {
        vec![self.into()]
    }
}

macro_rules! impl_single_param {
    ($($t:ty),* $(,)?) => {
        $(
            impl IntoParams for $t {
                fn into_params(self) -> Vec<Value> {
                    vec![Value::from(self)]
                }
            }
        )*
    };
}

impl_single_param!(
    Value,
    bool,
    i8,
    i16,
    i32,
    i64,
    u16,
    u32,
    f32,
    f64,
    &str,
    String,
    serde_json::Value,
    uuid::Uuid,
    NaiveDate,
    NaiveDateTime,
    DateTime<Utc>,
    Param,
    Sql,
    Query,
);

/// Build a `Vec<Value>` from heterogeneous expressions.
///
/// ```ignore
/// q.where_("name = ? AND age > ?", pgfluent::params!["alice", 18])?;
/// ```
#[macro_export]
macro_rules! params {
    () => { ::std::vec::Vec::<$crate::Value>::new() };
    ($($v:expr),+ $(,)?) => {
        ::std::vec![$($crate::Value::from($v)),+]
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_none_becomes_null() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(3)), Value::Int(3));
    }

    #[test]
    fn vec_becomes_array() {
        assert_eq!(
            Value::from(vec![1, 2]),
            Value::Array(vec![Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn into_params_shapes() {
        assert!(().into_params().is_empty());
        assert_eq!(true.into_params(), vec![Value::Bool(true)]);
        assert_eq!([1, 2].into_params(), vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(
            crate::params![1, "x", None::<i32>],
            vec![Value::Int(1), Value::Text("x".into()), Value::Null]
        );
    }

    #[test]
    fn list_like_shapes() {
        assert!(Value::from(vec![1]).is_list_like());
        assert!(Value::from(crate::qb::select()).is_list_like());
        assert!(!Value::from(1).is_list_like());
        assert!(!Value::from(crate::sql::Sql::new("NOW()")).is_list_like());
    }

    #[test]
    fn int_adapts_to_int4() {
        let mut buf = BytesMut::new();
        let res = Value::Int(7).to_sql_checked(&Type::INT4, &mut buf);
        assert!(matches!(res, Ok(IsNull::No)));
        assert_eq!(buf.len(), 4);

        let mut buf = BytesMut::new();
        assert!(Value::Int(i64::MAX).to_sql_checked(&Type::INT4, &mut buf).is_err());
    }

    #[test]
    fn arrays_are_not_bindable() {
        let mut buf = BytesMut::new();
        assert!(Value::from(vec![1]).to_sql_checked(&Type::INT8, &mut buf).is_err());
    }

    #[test]
    fn serializes_scalars_and_arrays() {
        let json = serde_json::to_string(&Value::from(vec![Value::Int(1), Value::Null])).unwrap();
        assert_eq!(json, "[1,null]");
        assert!(serde_json::to_string(&Value::from(crate::sql::Sql::new("x"))).is_err());
    }
}
