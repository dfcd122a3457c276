//! Builder state of a [`Query`](super::Query).

use super::expr::{Expr, SelectItem, SetOp, TableKind, TableRef};
use crate::condition::Condition;
use crate::error::{FluentError, FluentResult};
use crate::qb::Query;
use crate::sql::Sql;
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Statement kind a [`Query`](super::Query) compiles to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryType {
    #[default]
    Select,
    Insert,
    Update,
    Delete,
    Truncate,
}

impl QueryType {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryType::Select => "SELECT",
            QueryType::Insert => "INSERT",
            QueryType::Update => "UPDATE",
            QueryType::Delete => "DELETE",
            QueryType::Truncate => "TRUNCATE",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryType {
    type Err = FluentError;

    fn from_str(s: &str) -> FluentResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "select" => Ok(QueryType::Select),
            "insert" => Ok(QueryType::Insert),
            "update" => Ok(QueryType::Update),
            "delete" => Ok(QueryType::Delete),
            "truncate" => Ok(QueryType::Truncate),
            _ => Err(FluentError::BadQueryType(s.to_string())),
        }
    }
}

/// Individually resettable field of the builder state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamField {
    Select,
    Distinct,
    Tables,
    Joins,
    Where,
    GroupBy,
    Having,
    OrderBy,
    Limit,
    Offset,
    Combine,
    Columns,
    Source,
    Returning,
    Data,
    Rows,
    Prefix,
    Suffix,
}

impl FromStr for ParamField {
    type Err = FluentError;

    fn from_str(s: &str) -> FluentResult<Self> {
        let field = match s {
            "select" => ParamField::Select,
            "distinct" => ParamField::Distinct,
            "table" | "tables" => ParamField::Tables,
            "join" | "joins" => ParamField::Joins,
            "where" => ParamField::Where,
            "group" | "group_by" => ParamField::GroupBy,
            "having" => ParamField::Having,
            "order" | "order_by" => ParamField::OrderBy,
            "limit" => ParamField::Limit,
            "offset" => ParamField::Offset,
            "combine" => ParamField::Combine,
            "columns" => ParamField::Columns,
            "source" => ParamField::Source,
            "returning" => ParamField::Returning,
            "data" => ParamField::Data,
            "rows" => ParamField::Rows,
            "prefix" => ParamField::Prefix,
            "suffix" => ParamField::Suffix,
            _ => return Err(FluentError::UnknownParam(s.to_string())),
        };
        Ok(field)
    }
}

/// Column → value pairs in first-seen column order.
pub(crate) type DataRow = Vec<(String, Value)>;

/// Everything a [`Query`](super::Query) has been told so far.
///
/// Cloning deep-copies the condition trees; there is no sharing between a
/// query and its clone.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct QueryParams {
    pub select: Vec<SelectItem>,
    pub distinct: bool,
    pub tables: Vec<TableRef>,
    pub main: Option<String>,
    pub joins: HashMap<String, Condition>,
    pub where_: Option<Condition>,
    pub group_by: Vec<Expr>,
    pub having: Option<Condition>,
    pub order_by: Vec<Expr>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub combine: Vec<(SetOp, Value)>,
    pub columns: Vec<String>,
    pub source: Option<Box<Query>>,
    pub returning: Vec<SelectItem>,
    pub data: DataRow,
    pub rows: Vec<DataRow>,
    pub prefix: Vec<Sql>,
    pub suffix: Vec<Sql>,
}

impl QueryParams {
    pub fn reset(&mut self, field: ParamField) {
        match field {
            ParamField::Select => self.select.clear(),
            ParamField::Distinct => self.distinct = false,
            ParamField::Tables => {
                self.tables.clear();
                self.main = None;
            }
            ParamField::Joins => self.joins.clear(),
            ParamField::Where => self.where_ = None,
            ParamField::GroupBy => self.group_by.clear(),
            ParamField::Having => self.having = None,
            ParamField::OrderBy => self.order_by.clear(),
            ParamField::Limit => self.limit = None,
            ParamField::Offset => self.offset = None,
            ParamField::Combine => self.combine.clear(),
            ParamField::Columns => self.columns.clear(),
            ParamField::Source => self.source = None,
            ParamField::Returning => self.returning.clear(),
            ParamField::Data => self.data.clear(),
            ParamField::Rows => self.rows.clear(),
            ParamField::Prefix => self.prefix.clear(),
            ParamField::Suffix => self.suffix.clear(),
        }
    }

    pub fn table(&self, alias: &str) -> Option<&TableRef> {
        self.tables.iter().find(|t| t.alias == alias)
    }

    pub fn main_table(&self) -> Option<&TableRef> {
        self.main.as_deref().and_then(|alias| self.table(alias))
    }

    pub fn tables_of(&self, kind: TableKind) -> impl Iterator<Item = &TableRef> {
        self.tables.iter().filter(move |t| t.kind == kind)
    }

    pub fn joined_tables(&self) -> impl Iterator<Item = &TableRef> {
        self.tables
            .iter()
            .filter(|t| matches!(t.kind, TableKind::Join(_)))
    }

    /// Merge `pairs` into `row`: existing columns are overwritten in place,
    /// new ones appended.
    pub fn merge_into(row: &mut DataRow, pairs: DataRow) {
        for (column, value) in pairs {
            match row.iter_mut().find(|(c, _)| *c == column) {
                Some(slot) => slot.1 = value,
                None => row.push((column, value)),
            }
        }
    }
}
