//! # pgfluent
//!
//! A PostgreSQL client with a fluent, parameter-safe SQL query builder.
//!
//! - **Fluent builder**: [`Query`] covers SELECT, INSERT, UPDATE, DELETE and
//!   TRUNCATE with joins, sub-queries, set operations and RETURNING.
//! - **Condition trees**: [`Condition`] nests AND/OR groups and infers
//!   `=`, `IN (...)` and `IS NULL` from the bound value.
//! - **Parameters only**: values never reach the SQL text; `?` markers are
//!   numbered into `$1, $2, ...` in textual order, arrays expand in place.
//! - **Transaction-friendly**: anything that runs SQL takes a
//!   [`GenericClient`], so connections, transactions, savepoints and pooled
//!   clients are interchangeable.
//!
//! ```ignore
//! use pgfluent::{Value, select};
//!
//! let mut q = select();
//! q.select(["u.id", "u.email"])
//!     .from_as("users", "u")?
//!     .left_join("orders", "o", "o.user_id = u.id")?
//!     .where_("u.status", Value::array(["active", "trial"]))?
//!     .order_by(["u.id"])
//!     .limit(20);
//!
//! assert_eq!(
//!     q.to_sql()?,
//!     "SELECT u.id, u.email FROM users AS u LEFT JOIN orders AS o ON o.user_id = u.id \
//!      WHERE u.status IN ($1, $2) ORDER BY u.id LIMIT $3"
//! );
//!
//! let rows = q.bind_to(&client).fetch_all().await?;
//! ```

pub mod error;
pub mod ident;
pub mod value;

#[macro_use]
pub mod sql;

pub mod client;
pub mod condition;
pub mod exec;
pub mod monitor;
pub mod prelude;
pub mod qb;
pub mod row;
pub mod transaction;

#[cfg(feature = "pool")]
pub mod pool;

pub use client::{GenericClient, RowStream, StreamingClient};
pub use condition::{Combinator, Cond, Condition, ConditionMut, Leaf, Node};
pub use error::{ErrorKind, FluentError, FluentResult};
pub use exec::Statement;
pub use ident::{Ident, IntoIdent};
pub use monitor::{InstrumentedClient, MonitorConfig, QueryMonitor, StatementKind, StatsMonitor};
pub use qb::{
    Expr, JoinKind, ParamField, Query, QueryType, SetOp, delete, insert, select, truncate, update,
};
pub use row::{FromRow, RowExt};
pub use sql::{CompiledQuery, Sql, number, sql};
pub use transaction::{Savepoint, TransactionExt};
pub use value::{IntoParams, Param, Value};

#[doc(hidden)]
pub use transaction::__next_savepoint_name;

#[cfg(feature = "pool")]
pub use pool::{
    create_pool, create_pool_with_config, create_pool_with_manager_config, create_pool_with_tls,
};
