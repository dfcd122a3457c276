//! Fluent query builder.
//!
//! A [`Query`] accumulates builder state (tables, select list, condition
//! trees, data rows, ...) through chained calls and compiles it on demand into
//! one parameterized statement. Compilation first produces `?`-form SQL with
//! every nested fragment and sub-query still embedded as a parameter, then a
//! single numbering pass turns it into `$1, $2, ...` with a flat parameter
//! list.
//!
//! # Usage
//!
//! ```ignore
//! use pgfluent::qb;
//!
//! // SELECT with a join
//! let mut q = qb::select();
//! q.select(["x.id", "y.total"])
//!     .from_as("accounts", "x")?
//!     .inner_join("orders", "y", "x.id = y.account_id")?
//!     .where_("x.status", "open")?;
//! let rows = q.fetch_all(&client).await?;
//!
//! // INSERT
//! let mut q = qb::insert("users");
//! q.values([("username", "alice"), ("email", "alice@example.com")])?
//!     .returning(["id"]);
//! let id: i64 = q.fetch_scalar_one(&client).await?;
//!
//! // UPDATE
//! let mut q = qb::update("users");
//! q.set("status", "inactive")?.where_("id", user_id)?;
//! q.execute(&client).await?;
//!
//! // DELETE
//! let mut q = qb::delete("users");
//! q.where_("id", user_id)?;
//! q.execute(&client).await?;
//! ```

mod compiler;
mod expr;
mod params;
mod query;


pub use expr::{Expr, JoinKind, SetOp, TableKind, TableSource};
pub use params::{ParamField, QueryType};
pub use query::Query;

/// Start a SELECT query.
pub fn select() -> Query {
    Query::new()
}

fn with_table(kind: QueryType, table: &str) -> Query {
    Query::with_main_table(kind, table)
}

/// Start an INSERT into `table`.
pub fn insert(table: &str) -> Query {
    with_table(QueryType::Insert, table)
}

/// Start an UPDATE of `table`.
pub fn update(table: &str) -> Query {
    with_table(QueryType::Update, table)
}

/// Start a DELETE from `table`.
pub fn delete(table: &str) -> Query {
    with_table(QueryType::Delete, table)
}

/// Start a TRUNCATE of `table`.
pub fn truncate(table: &str) -> Query {
    with_table(QueryType::Truncate, table)
}
