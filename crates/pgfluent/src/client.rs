//! Generic client trait for unified database access.

use crate::error::{FluentError, FluentResult};
use crate::value::Value;
use futures_core::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

/// Borrow a compiled parameter list in the form `tokio-postgres` expects.
pub(crate) fn param_refs(params: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

fn first_row(rows: Vec<Row>) -> FluentResult<Row> {
    rows.into_iter()
        .next()
        .ok_or_else(|| FluentError::not_found("Expected one row, got none"))
}

fn exactly_one(rows: Vec<Row>) -> FluentResult<Row> {
    let got = rows.len();
    let mut rows = rows.into_iter();
    match (rows.next(), got) {
        (None, _) => Err(FluentError::not_found("Expected 1 row, got 0")),
        (Some(row), 1) => Ok(row),
        (Some(_), got) => Err(FluentError::too_many_rows(1, got)),
    }
}

/// A trait that unifies database clients and transactions.
///
/// Everything the builder produces ends up here as `$n` SQL plus a flat
/// [`Value`] list. Accepting either a connection or a transaction lets the
/// same query code run inside or outside a transaction.
pub trait GenericClient: Send + Sync {
    /// Execute a query and return all rows.
    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = FluentResult<Vec<Row>>> + Send;

    /// Execute a query and return all rows, associating a tag for monitoring.
    ///
    /// The default implementation ignores `tag`.
    fn query_tagged(
        &self,
        tag: &str,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = FluentResult<Vec<Row>>> + Send {
        let _ = tag;
        self.query(sql, params)
    }

    /// Execute a query and return the **first** row.
    ///
    /// - 0 rows: [`FluentError::NotFound`]
    /// - 1 or more rows: the first row
    ///
    /// Use [`GenericClient::query_one_strict`] to reject extra rows.
    fn query_one(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = FluentResult<Row>> + Send {
        async move { first_row(self.query(sql, params).await?) }
    }

    fn query_one_tagged(
        &self,
        tag: &str,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = FluentResult<Row>> + Send {
        async move { first_row(self.query_tagged(tag, sql, params).await?) }
    }

    /// Execute a query and require **exactly one** row.
    ///
    /// - 0 rows: [`FluentError::NotFound`]
    /// - 1 row: that row
    /// - more: [`FluentError::TooManyRows`]
    fn query_one_strict(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = FluentResult<Row>> + Send {
        async move { exactly_one(self.query(sql, params).await?) }
    }

    fn query_one_strict_tagged(
        &self,
        tag: &str,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = FluentResult<Row>> + Send {
        async move { exactly_one(self.query_tagged(tag, sql, params).await?) }
    }

    /// Execute a query and return the first row, if any.
    fn query_opt(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = FluentResult<Option<Row>>> + Send {
        async move { Ok(self.query(sql, params).await?.into_iter().next()) }
    }

    fn query_opt_tagged(
        &self,
        tag: &str,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = FluentResult<Option<Row>>> + Send {
        async move { Ok(self.query_tagged(tag, sql, params).await?.into_iter().next()) }
    }

    /// Execute a statement and return the number of affected rows.
    fn execute(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = FluentResult<u64>> + Send;

    /// The default implementation ignores `tag`.
    fn execute_tagged(
        &self,
        tag: &str,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = FluentResult<u64>> + Send {
        let _ = tag;
        self.execute(sql, params)
    }

    /// Cancellation token for the underlying connection, if supported.
    ///
    /// Used for best-effort server-side cancellation when a timeout fires.
    fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
        None
    }
}

impl GenericClient for tokio_postgres::Client {
    async fn query(&self, sql: &str, params: &[Value]) -> FluentResult<Vec<Row>> {
        tokio_postgres::Client::query(self, sql, &param_refs(params))
            .await
            .map_err(|e| FluentError::from_query_error(e, sql, params))
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> FluentResult<u64> {
        tokio_postgres::Client::execute(self, sql, &param_refs(params))
            .await
            .map_err(|e| FluentError::from_query_error(e, sql, params))
    }

    fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
        Some(tokio_postgres::Client::cancel_token(self))
    }
}

impl GenericClient for tokio_postgres::Transaction<'_> {
    async fn query(&self, sql: &str, params: &[Value]) -> FluentResult<Vec<Row>> {
        tokio_postgres::Transaction::query(self, sql, &param_refs(params))
            .await
            .map_err(|e| FluentError::from_query_error(e, sql, params))
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> FluentResult<u64> {
        tokio_postgres::Transaction::execute(self, sql, &param_refs(params))
            .await
            .map_err(|e| FluentError::from_query_error(e, sql, params))
    }

    fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
        Some(tokio_postgres::Transaction::cancel_token(self))
    }
}

/// A stream of database rows.
///
/// Type-erased so that every client returns the same streaming type.
#[must_use]
pub struct RowStream {
    inner: Pin<Box<dyn Stream<Item = FluentResult<Row>> + Send>>,
}

impl RowStream {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = FluentResult<Row>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }
}

impl Stream for RowStream {
    type Item = FluentResult<Row>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

/// Streaming query support.
///
/// Separate from [`GenericClient`] so only clients that can stream rows
/// incrementally (via `query_raw`) implement it.
pub trait StreamingClient: GenericClient {
    fn query_stream(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = FluentResult<RowStream>> + Send;

    /// The default implementation ignores `tag`.
    fn query_stream_tagged(
        &self,
        tag: &str,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = FluentResult<RowStream>> + Send {
        let _ = tag;
        self.query_stream(sql, params)
    }
}

struct MapDbRowStream<S> {
    inner: Pin<Box<S>>,
}

impl<S> Stream for MapDbRowStream<S>
where
    S: Stream<Item = Result<Row, tokio_postgres::Error>> + Send + 'static,
{
    type Item = FluentResult<Row>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(row))) => Poll::Ready(Some(Ok(row))),
            Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(FluentError::from_db_error(e)))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

fn row_stream<S>(stream: S) -> RowStream
where
    S: Stream<Item = Result<Row, tokio_postgres::Error>> + Send + 'static,
{
    RowStream::new(MapDbRowStream {
        inner: Box::pin(stream),
    })
}

impl StreamingClient for tokio_postgres::Client {
    async fn query_stream(&self, sql: &str, params: &[Value]) -> FluentResult<RowStream> {
        let stream = tokio_postgres::Client::query_raw(self, sql, param_refs(params))
            .await
            .map_err(|e| FluentError::from_query_error(e, sql, params))?;
        Ok(row_stream(stream))
    }
}

impl StreamingClient for tokio_postgres::Transaction<'_> {
    async fn query_stream(&self, sql: &str, params: &[Value]) -> FluentResult<RowStream> {
        let stream = tokio_postgres::Transaction::query_raw(self, sql, param_refs(params))
            .await
            .map_err(|e| FluentError::from_query_error(e, sql, params))?;
        Ok(row_stream(stream))
    }
}

// ===== deadpool-postgres support =====

/// Delegate both client traits to the deref target of a pooled wrapper.
#[cfg(feature = "pool")]
macro_rules! delegate_to_deref {
    ($($ty:ty),* $(,)?) => {
        $(
            impl GenericClient for $ty {
                async fn query(&self, sql: &str, params: &[Value]) -> FluentResult<Vec<Row>> {
                    GenericClient::query(&**self, sql, params).await
                }

                async fn execute(&self, sql: &str, params: &[Value]) -> FluentResult<u64> {
                    GenericClient::execute(&**self, sql, params).await
                }

                fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
                    GenericClient::cancel_token(&**self)
                }
            }

            impl StreamingClient for $ty {
                async fn query_stream(&self, sql: &str, params: &[Value]) -> FluentResult<RowStream> {
                    StreamingClient::query_stream(&**self, sql, params).await
                }
            }
        )*
    };
}

#[cfg(feature = "pool")]
delegate_to_deref!(
    deadpool_postgres::Client,
    deadpool_postgres::ClientWrapper,
    deadpool_postgres::Transaction<'_>,
);

// ===== Reference implementations =====
// These allow InstrumentedClient to wrap &Client instead of owned Client

impl<C: GenericClient> GenericClient for &C {
    async fn query(&self, sql: &str, params: &[Value]) -> FluentResult<Vec<Row>> {
        (*self).query(sql, params).await
    }

    fn query_tagged(
        &self,
        tag: &str,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = FluentResult<Vec<Row>>> + Send {
        (*self).query_tagged(tag, sql, params)
    }

    fn query_one(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = FluentResult<Row>> + Send {
        (*self).query_one(sql, params)
    }

    fn query_one_tagged(
        &self,
        tag: &str,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = FluentResult<Row>> + Send {
        (*self).query_one_tagged(tag, sql, params)
    }

    fn query_opt(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = FluentResult<Option<Row>>> + Send {
        (*self).query_opt(sql, params)
    }

    fn query_opt_tagged(
        &self,
        tag: &str,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = FluentResult<Option<Row>>> + Send {
        (*self).query_opt_tagged(tag, sql, params)
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> FluentResult<u64> {
        (*self).execute(sql, params).await
    }

    fn execute_tagged(
        &self,
        tag: &str,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = FluentResult<u64>> + Send {
        (*self).execute_tagged(tag, sql, params)
    }

    fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
        (*self).cancel_token()
    }
}

impl<C: StreamingClient> StreamingClient for &C {
    async fn query_stream(&self, sql: &str, params: &[Value]) -> FluentResult<RowStream> {
        (*self).query_stream(sql, params).await
    }

    fn query_stream_tagged(
        &self,
        tag: &str,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = FluentResult<RowStream>> + Send {
        (*self).query_stream_tagged(tag, sql, params)
    }
}
