//! Common imports.
//!
//! ```ignore
//! use pgfluent::prelude::*;
//! ```

pub use crate::{
    Cond, Condition, FluentError, FluentResult, FromRow, GenericClient, Query, RowExt, Sql,
    Statement, Value, delete, insert, select, sql, truncate, update,
};

#[cfg(feature = "pool")]
pub use crate::{create_pool, create_pool_with_config};
