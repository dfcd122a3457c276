//! Row mapping traits and utilities

use crate::error::{FluentError, FluentResult};
use tokio_postgres::Row;
use tokio_postgres::types::FromSql;

/// Build a value from a result row.
///
/// Implemented by hand for domain structs; tuples of [`FromSql`] types map
/// columns by position.
///
/// ```ignore
/// use pgfluent::{FromRow, FluentResult, RowExt};
///
/// struct User {
///     id: i64,
///     email: Option<String>,
/// }
///
/// impl FromRow for User {
///     fn from_row(row: &tokio_postgres::Row) -> FluentResult<Self> {
///         Ok(Self {
///             id: row.try_get_column("id")?,
///             email: row.try_get_column("email")?,
///         })
///     }
/// }
/// ```
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> FluentResult<Self>;
}

macro_rules! impl_from_row_tuple {
    ($($idx:tt => $t:ident),+) => {
        impl<$($t),+> FromRow for ($($t,)+)
        where
            $($t: for<'a> FromSql<'a>,)+
        {
            fn from_row(row: &Row) -> FluentResult<Self> {
                Ok(($(row.try_get_index::<$t>($idx)?,)+))
            }
        }
    };
}

impl_from_row_tuple!(0 => A);
impl_from_row_tuple!(0 => A, 1 => B);
impl_from_row_tuple!(0 => A, 1 => B, 2 => C);
impl_from_row_tuple!(0 => A, 1 => B, 2 => C, 3 => D);
impl_from_row_tuple!(0 => A, 1 => B, 2 => C, 3 => D, 4 => E);
impl_from_row_tuple!(0 => A, 1 => B, 2 => C, 3 => D, 4 => E, 5 => F);

/// Typed column access that reports [`FluentError::Decode`].
pub trait RowExt {
    /// Get a column by name.
    fn try_get_column<T>(&self, column: &str) -> FluentResult<T>
    where
        T: for<'a> FromSql<'a>;

    /// Get a column by position.
    fn try_get_index<T>(&self, index: usize) -> FluentResult<T>
    where
        T: for<'a> FromSql<'a>;
}

impl RowExt for Row {
    fn try_get_column<T>(&self, column: &str) -> FluentResult<T>
    where
        T: for<'a> FromSql<'a>,
    {
        self.try_get(column)
            .map_err(|e| FluentError::decode(column, e.to_string()))
    }

    fn try_get_index<T>(&self, index: usize) -> FluentResult<T>
    where
        T: for<'a> FromSql<'a>,
    {
        self.try_get(index)
            .map_err(|e| FluentError::decode(format!("#{index}"), e.to_string()))
    }
}
