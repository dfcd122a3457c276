//! Transaction helpers: macros and a savepoint handle.
//!
//! Everything that runs SQL accepts a [`GenericClient`](crate::GenericClient),
//! so passing a transaction instead of a connection is all it takes to make
//! builder queries transactional. The macros below take care of commit and
//! rollback.
//!
//! # Example
//!
//! ```ignore
//! use pgfluent::{update, FluentResult};
//!
//! # async fn demo(client: &mut tokio_postgres::Client) -> FluentResult<()> {
//! pgfluent::transaction!(client, tx, {
//!     let mut q = update("accounts");
//!     q.set("balance", pgfluent::sql("balance - ?").bind(100_i64))?
//!         .where_("id", 1_i64)?;
//!     q.bind_to(&tx).execute().await?;
//!     Ok(())
//! })?;
//! # Ok(()) }
//! ```

use crate::error::{FluentError, FluentResult};
use crate::value::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_postgres::Row;

static SAVEPOINT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Runs the given block inside a database transaction.
///
/// - Begins a transaction via `$client.transaction().await`.
/// - Commits on `Ok(_)`.
/// - Rolls back on `Err(_)`.
///
/// The block must evaluate to `pgfluent::FluentResult<T>`.
#[macro_export]
macro_rules! transaction {
    ($client:expr, $tx:ident, $body:block) => {{
        let mut $tx = ($client)
            .transaction()
            .await
            .map_err($crate::FluentError::from_db_error)?;

        let __pgfluent_tx_result = async { $body }.await;
        match __pgfluent_tx_result {
            Ok(value) => {
                $tx.commit()
                    .await
                    .map_err($crate::FluentError::from_db_error)?;
                Ok(value)
            }
            Err(error) => match $tx.rollback().await {
                Ok(()) => Err(error),
                Err(rollback_err) => Err($crate::FluentError::Transaction(format!(
                    "{error} (rollback failed: {rollback_err})"
                ))),
            },
        }
    }};
}

/// Runs the given block inside a savepoint of an existing transaction.
///
/// Releases on `Ok(_)`, rolls back to the savepoint on `Err(_)`. Without a
/// name an auto-numbered one is used.
///
/// ```ignore
/// pgfluent::transaction!(client, tx, {
///     let order_id = create_order(&tx).await?;
///
///     // A failed notification leaves the order in place.
///     let notified = pgfluent::savepoint!(tx, "notify", sp, {
///         notify(&sp, order_id).await?;
///         Ok(())
///     });
///     if let Err(e) = notified {
///         tracing::warn!("notification failed: {e}");
///     }
///     Ok(order_id)
/// })?;
/// ```
#[macro_export]
macro_rules! savepoint {
    ($tx:expr, $name:expr, $sp:ident, $body:block) => {{
        let mut $sp = ($tx)
            .savepoint($name)
            .await
            .map_err($crate::FluentError::from_db_error)?;

        let __pgfluent_sp_result = async { $body }.await;
        match __pgfluent_sp_result {
            Ok(value) => {
                $sp.commit()
                    .await
                    .map_err($crate::FluentError::from_db_error)?;
                Ok(value)
            }
            Err(error) => match $sp.rollback().await {
                Ok(()) => Err(error),
                Err(rollback_err) => Err($crate::FluentError::Transaction(format!(
                    "{error} (savepoint rollback failed: {rollback_err})"
                ))),
            },
        }
    }};
    ($tx:expr, $sp:ident, $body:block) => {{
        let __pgfluent_sp_name = $crate::__next_savepoint_name();
        $crate::savepoint!($tx, &__pgfluent_sp_name, $sp, $body)
    }};
}

/// Runs the given block as a nested transaction (an anonymous savepoint).
#[macro_export]
macro_rules! nested_transaction {
    ($tx:expr, $inner:ident, $body:block) => {{
        let __pgfluent_sp_name = $crate::__next_savepoint_name();
        $crate::savepoint!($tx, &__pgfluent_sp_name, $inner, $body)
    }};
}

#[doc(hidden)]
pub fn __next_savepoint_name() -> String {
    let n = SAVEPOINT_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("pgfluent_sp_{n}")
}

/// A savepoint within a transaction.
///
/// Implements [`GenericClient`](crate::GenericClient), so builder queries can
/// run inside it. Finish it with [`release`](Self::release) or
/// [`rollback`](Self::rollback); dropping it rolls back.
pub struct Savepoint<'a> {
    inner: Option<tokio_postgres::Transaction<'a>>,
    name: String,
}

impl<'a> Savepoint<'a> {
    fn new(inner: tokio_postgres::Transaction<'a>, name: String) -> Self {
        Self {
            inner: Some(inner),
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `RELEASE SAVEPOINT name`
    pub async fn release(mut self) -> FluentResult<()> {
        if let Some(tx) = self.inner.take() {
            tx.commit().await.map_err(FluentError::from_db_error)?;
        }
        Ok(())
    }

    /// `ROLLBACK TO SAVEPOINT name`
    pub async fn rollback(mut self) -> FluentResult<()> {
        if let Some(tx) = self.inner.take() {
            tx.rollback().await.map_err(FluentError::from_db_error)?;
        }
        Ok(())
    }

    fn active(&self) -> FluentResult<&tokio_postgres::Transaction<'a>> {
        self.inner
            .as_ref()
            .ok_or_else(|| FluentError::Transaction(format!("savepoint '{}' already consumed", self.name)))
    }
}

impl Drop for Savepoint<'_> {
    fn drop(&mut self) {
        if self.inner.is_some() {
            // tokio_postgres rolls the savepoint back when its transaction drops.
            #[cfg(feature = "tracing")]
            tracing::warn!(
                "Savepoint '{}' dropped without explicit release or rollback",
                self.name,
            );
        }
    }
}

impl crate::GenericClient for Savepoint<'_> {
    async fn query(&self, sql: &str, params: &[Value]) -> FluentResult<Vec<Row>> {
        crate::GenericClient::query(self.active()?, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> FluentResult<u64> {
        crate::GenericClient::execute(self.active()?, sql, params).await
    }

    fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
        self.inner
            .as_ref()
            .and_then(crate::GenericClient::cancel_token)
    }
}

/// Savepoint support for transactions.
///
/// ```ignore
/// use pgfluent::TransactionExt;
///
/// pgfluent::transaction!(client, tx, {
///     let sp = tx.open_savepoint("before_import").await?;
///     pgfluent::delete("staging").bind_to(&sp).execute().await?;
///     sp.release().await?;
///     Ok(())
/// })?;
/// ```
pub trait TransactionExt {
    /// Create a named savepoint.
    fn open_savepoint(
        &mut self,
        name: &str,
    ) -> impl std::future::Future<Output = FluentResult<Savepoint<'_>>> + Send;

    /// Create an auto-numbered savepoint.
    fn open_savepoint_anon(
        &mut self,
    ) -> impl std::future::Future<Output = FluentResult<Savepoint<'_>>> + Send;
}

impl TransactionExt for tokio_postgres::Transaction<'_> {
    async fn open_savepoint(&mut self, name: &str) -> FluentResult<Savepoint<'_>> {
        let inner = self
            .savepoint(name)
            .await
            .map_err(FluentError::from_db_error)?;
        Ok(Savepoint::new(inner, name.to_string()))
    }

    async fn open_savepoint_anon(&mut self) -> FluentResult<Savepoint<'_>> {
        let name = __next_savepoint_name();
        let inner = self
            .savepoint(&name)
            .await
            .map_err(FluentError::from_db_error)?;
        Ok(Savepoint::new(inner, name))
    }
}

#[cfg(feature = "pool")]
impl TransactionExt for deadpool_postgres::Transaction<'_> {
    async fn open_savepoint(&mut self, name: &str) -> FluentResult<Savepoint<'_>> {
        // Go through the inner tokio_postgres transaction, not the deadpool wrapper.
        let inner_tx: &mut tokio_postgres::Transaction<'_> = std::ops::DerefMut::deref_mut(self);
        let inner = inner_tx
            .savepoint(name)
            .await
            .map_err(FluentError::from_db_error)?;
        Ok(Savepoint::new(inner, name.to_string()))
    }

    async fn open_savepoint_anon(&mut self) -> FluentResult<Savepoint<'_>> {
        let name = __next_savepoint_name();
        let inner_tx: &mut tokio_postgres::Transaction<'_> = std::ops::DerefMut::deref_mut(self);
        let inner = inner_tx
            .savepoint(&name)
            .await
            .map_err(FluentError::from_db_error)?;
        Ok(Savepoint::new(inner, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_savepoint_names_are_unique() {
        let a = __next_savepoint_name();
        let b = __next_savepoint_name();
        assert!(a.starts_with("pgfluent_sp_"));
        assert_ne!(a, b);
    }

    #[test]
    fn transaction_errors_are_driver_errors() {
        let err = FluentError::Transaction("boom (rollback failed: closed)".into());
        assert_eq!(err.kind(), crate::error::ErrorKind::Driver);
        assert!(err.to_string().contains("rollback failed"));
    }
}
