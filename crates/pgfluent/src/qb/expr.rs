//! Select-list, grouping, ordering and table-source items.

use crate::error::{FluentError, FluentResult};
use crate::ident::Ident;
use crate::qb::Query;
use crate::sql::Sql;
use crate::value::Value;

/// One item of a select list, GROUP BY, ORDER BY or RETURNING list.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal SQL text such as `id`, `COUNT(*)` or `created_at DESC`.
    /// Question marks are literal.
    Raw(String),
    /// A value substituted like any other bound value: booleans become
    /// `TRUE`/`FALSE`, sub-queries `(...)`, everything else a placeholder.
    Value(Value),
}

impl Expr {
    pub fn raw(sql: impl Into<String>) -> Self {
        Expr::Raw(sql.into())
    }

    pub fn value(value: impl Into<Value>) -> Self {
        Expr::Value(value.into())
    }

    /// Column an INSERT ... SELECT can infer from an unaliased item
    /// (`u.name` gives `name`).
    pub(crate) fn column_ident(&self) -> Option<Ident> {
        match self {
            Expr::Raw(s) => {
                let last = Ident::parse(s).ok()?.parts.pop()?;
                Some(Ident { parts: vec![last] })
            }
            Expr::Value(_) => None,
        }
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        Expr::Raw(s.to_string())
    }
}

impl From<String> for Expr {
    fn from(s: String) -> Self {
        Expr::Raw(s)
    }
}

impl From<&String> for Expr {
    fn from(s: &String) -> Self {
        Expr::Raw(s.clone())
    }
}

impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        Expr::Value(v)
    }
}

impl From<Sql> for Expr {
    fn from(s: Sql) -> Self {
        Expr::Value(Value::Sql(s))
    }
}

impl From<Query> for Expr {
    fn from(q: Query) -> Self {
        Expr::Value(Value::Query(Box::new(q)))
    }
}

/// An expression with an optional output name (`expr AS "name"`).
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SelectItem {
    pub alias: Option<String>,
    pub expr: Expr,
}

/// What a table registration points at.
#[derive(Debug, Clone, PartialEq)]
pub enum TableSource {
    /// Table name or other literal text, e.g. `public.users`.
    Name(String),
    /// Raw fragment such as `generate_series(1, ?)`.
    Sql(Sql),
    /// Derived table.
    Query(Box<Query>),
}

impl TableSource {
    pub(crate) fn describe(&self) -> String {
        match self {
            TableSource::Name(name) => name.clone(),
            TableSource::Sql(fragment) => fragment.text().to_string(),
            TableSource::Query(_) => "sub-query".to_string(),
        }
    }
}

impl TryFrom<Value> for TableSource {
    type Error = FluentError;

    fn try_from(value: Value) -> FluentResult<Self> {
        match value {
            Value::Text(name) => Ok(TableSource::Name(name)),
            Value::Sql(fragment) => Ok(TableSource::Sql(fragment)),
            Value::Query(query) => Ok(TableSource::Query(query)),
            other => Err(FluentError::InvalidColumnType(format!(
                "{} cannot be used as a table source",
                other.describe()
            ))),
        }
    }
}

/// Join flavour of a registered table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl JoinKind {
    pub fn keyword(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Full => "FULL JOIN",
            JoinKind::Cross => "CROSS JOIN",
        }
    }
}

/// Role of a table in the statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Main,
    From,
    Join(JoinKind),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TableRef {
    pub alias: String,
    pub source: TableSource,
    pub kind: TableKind,
}

/// Set operation appended after a SELECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOp {
    Union,
    UnionAll,
    Intersect,
    Except,
}

impl SetOp {
    pub fn keyword(self) -> &'static str {
        match self {
            SetOp::Union => "UNION",
            SetOp::UnionAll => "UNION ALL",
            SetOp::Intersect => "INTERSECT",
            SetOp::Except => "EXCEPT",
        }
    }
}
